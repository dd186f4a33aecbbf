//! Quota ceilings by privilege tier.
//!
//! [`QuotaPolicy`] is a pure check with no I/O. Job requests are bounded by
//! a per-tier ceiling; small synchronous batches are bounded by a separate,
//! lower ceiling that applies to every tier.

use crate::config::QuotaConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Privilege classification governing quota ceilings and job visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    NonAdmin,
    Admin,
}

/// The caller of a control-plane operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Requester {
    pub user: u64,
    pub tier: Tier,
}

impl Requester {
    pub const fn new(user: u64, tier: Tier) -> Self {
        Self { user, tier }
    }

    pub const fn admin(user: u64) -> Self {
        Self::new(user, Tier::Admin)
    }

    pub const fn user(user: u64) -> Self {
        Self::new(user, Tier::NonAdmin)
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self.tier, Tier::Admin)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaPolicy {
    small_batch_max: u64,
    max_nonadmin: u64,
    max_admin: u64,
}

impl QuotaPolicy {
    pub const fn new(config: &QuotaConfig) -> Self {
        Self {
            small_batch_max: config.small_batch_max,
            max_nonadmin: config.max_nonadmin,
            max_admin: config.max_admin,
        }
    }

    /// The job ceiling for `tier`.
    pub const fn ceiling(&self, tier: Tier) -> u64 {
        match tier {
            Tier::NonAdmin => self.max_nonadmin,
            Tier::Admin => self.max_admin,
        }
    }

    /// Validates a job request and returns the accepted count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuotaExceeded`] unless `1 <= requested <=
    /// ceiling(tier)`.
    pub fn authorize(&self, tier: Tier, requested: u64) -> Result<u64> {
        Self::bounded(requested, self.ceiling(tier))
    }

    /// Validates a small synchronous batch request, independent of tier.
    pub fn authorize_small_batch(&self, requested: u64) -> Result<u64> {
        Self::bounded(requested, self.small_batch_max)
    }

    fn bounded(requested: u64, max: u64) -> Result<u64> {
        if requested >= 1 && requested <= max {
            Ok(requested)
        } else {
            Err(Error::QuotaExceeded {
                requested,
                min: 1,
                max,
            })
        }
    }
}
