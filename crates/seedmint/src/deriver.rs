//! The credential derivation seam.
//!
//! Producing a seed phrase and deriving its first address is chain-specific
//! math that lives outside this crate. The engine only sees the
//! [`WalletDeriver`] trait: one call, one [`CredentialRecord`]. Implementations
//! are expected to be pure apart from CPU time and entropy, and may be slow.
//!
//! The engine never caches, logs or retries a derived record.

use crate::chain::Chain;
use core::fmt;

/// One generated secret plus its derived public address.
///
/// Records only live inside an open chunk buffer until they are serialized;
/// the secret is redacted from the `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub chain: Chain,
    pub secret: String,
    pub address: String,
    pub derivation_path: String,
}

impl CredentialRecord {
    pub fn new(
        chain: Chain,
        secret: impl Into<String>,
        address: impl Into<String>,
        derivation_path: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            secret: secret.into(),
            address: address.into(),
            derivation_path: derivation_path.into(),
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("chain", &self.chain)
            .field("secret", &"<redacted>")
            .field("address", &self.address)
            .field("derivation_path", &self.derivation_path)
            .finish()
    }
}

/// Failure reported by a [`WalletDeriver`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{chain}: {reason}")]
pub struct DeriverError {
    pub chain: Chain,
    pub reason: String,
}

impl DeriverError {
    pub fn new(chain: Chain, reason: impl Into<String>) -> Self {
        Self {
            chain,
            reason: reason.into(),
        }
    }
}

/// Produces one credential record for a chain.
///
/// Implementations must be callable from several jobs at once.
pub trait WalletDeriver: Send + Sync {
    /// Generates a fresh secret and derives the first address on `chain`.
    ///
    /// # Errors
    ///
    /// Returns a [`DeriverError`] if entropy or derivation fails. The job that
    /// made the call is failed without retry.
    fn generate(&self, chain: Chain) -> Result<CredentialRecord, DeriverError>;
}

impl<F> WalletDeriver for F
where
    F: Fn(Chain) -> Result<CredentialRecord, DeriverError> + Send + Sync,
{
    fn generate(&self, chain: Chain) -> Result<CredentialRecord, DeriverError> {
        self(chain)
    }
}
