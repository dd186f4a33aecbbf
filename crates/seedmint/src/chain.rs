//! The closed set of supported chains.
//!
//! Every chain is bound at compile time to the derivation path of its first
//! external address and to the strategy used to encode that address. EVM
//! networks share the Ethereum path and encoding so one seed yields the same
//! address on every EVM chain.
//!
//! Unknown identifiers are rejected when parsed, before any job exists:
//!
//! ```
//! use seedmint::Chain;
//!
//! let chain: Chain = "btc".parse().unwrap();
//! assert_eq!(chain, Chain::Btc);
//! assert_eq!(chain.derivation_path(), "m/84'/0'/0'/0/0");
//! assert!("DOT".parse::<Chain>().is_err());
//! ```

use crate::error::Error;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    Eth,
    Btc,
    Sol,
    Base,
    Bsc,
    Polygon,
    Avaxc,
    Tron,
    Xrp,
    Doge,
    Ltc,
    Ton,
}

/// How the public key at the chain's derivation path is turned into an
/// address string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressEncoding {
    /// `0x` + 40 hex chars (Keccak-256 of the uncompressed key).
    EvmHex,
    /// Native SegWit P2WPKH, `bc1...` / `ltc1...`.
    Bech32,
    /// Legacy P2PKH Base58Check, `D...`.
    Base58Check,
    /// Base58Check with the TRON `0x41` prefix, `T...`.
    TronBase58,
    /// Base58 over the Ripple alphabet, `r...`.
    RippleBase58,
    /// Raw Ed25519 public key in Base58.
    Ed25519Base58,
    /// TON user-friendly wallet address.
    TonFriendly,
}

/// Static description of a chain, as shown to operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain: Chain,
    pub name: &'static str,
    pub description: &'static str,
    pub derivation_path: &'static str,
    pub address_format: &'static str,
    pub encoding: AddressEncoding,
}

impl Chain {
    /// Every supported chain, in display order.
    pub const ALL: [Self; 12] = [
        Self::Eth,
        Self::Btc,
        Self::Sol,
        Self::Base,
        Self::Bsc,
        Self::Polygon,
        Self::Avaxc,
        Self::Tron,
        Self::Xrp,
        Self::Doge,
        Self::Ltc,
        Self::Ton,
    ];

    /// Canonical upper-case identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eth => "ETH",
            Self::Btc => "BTC",
            Self::Sol => "SOL",
            Self::Base => "BASE",
            Self::Bsc => "BSC",
            Self::Polygon => "POLYGON",
            Self::Avaxc => "AVAXC",
            Self::Tron => "TRON",
            Self::Xrp => "XRP",
            Self::Doge => "DOGE",
            Self::Ltc => "LTC",
            Self::Ton => "TON",
        }
    }

    pub const fn is_evm(self) -> bool {
        matches!(
            self,
            Self::Eth | Self::Base | Self::Bsc | Self::Polygon | Self::Avaxc
        )
    }

    /// Derivation path of the first external address.
    pub const fn derivation_path(self) -> &'static str {
        match self {
            Self::Eth | Self::Base | Self::Bsc | Self::Polygon | Self::Avaxc => "m/44'/60'/0'/0/0",
            Self::Btc => "m/84'/0'/0'/0/0",
            Self::Sol => "m/44'/501'/0'/0'",
            Self::Tron => "m/44'/195'/0'/0/0",
            Self::Xrp => "m/44'/144'/0'/0/0",
            Self::Doge => "m/44'/3'/0'/0/0",
            Self::Ltc => "m/84'/2'/0'/0/0",
            Self::Ton => "m/44'/607'/0'/0/0",
        }
    }

    pub const fn address_encoding(self) -> AddressEncoding {
        match self {
            Self::Eth | Self::Base | Self::Bsc | Self::Polygon | Self::Avaxc => {
                AddressEncoding::EvmHex
            }
            Self::Btc | Self::Ltc => AddressEncoding::Bech32,
            Self::Doge => AddressEncoding::Base58Check,
            Self::Tron => AddressEncoding::TronBase58,
            Self::Xrp => AddressEncoding::RippleBase58,
            Self::Sol => AddressEncoding::Ed25519Base58,
            Self::Ton => AddressEncoding::TonFriendly,
        }
    }

    pub const fn info(self) -> ChainInfo {
        let (name, description, address_format) = match self {
            Self::Eth => ("Ethereum", "Smart contracts, DeFi, NFTs", "0x + 40 hex chars"),
            Self::Btc => ("Bitcoin", "Digital gold, store of value", "bc1... (Bech32)"),
            Self::Sol => ("Solana", "Fast, low-cost transactions", "Base58 (32-44 chars)"),
            Self::Base => ("Base", "Ethereum L2 by Coinbase", "0x + 40 hex chars"),
            Self::Bsc => ("BNB Smart Chain", "EVM chain by Binance", "0x + 40 hex chars"),
            Self::Polygon => ("Polygon", "EVM sidechain", "0x + 40 hex chars"),
            Self::Avaxc => ("Avalanche C-Chain", "EVM chain on Avalanche", "0x + 40 hex chars"),
            Self::Tron => ("TRON", "Stablecoin transfers", "T... (Base58Check)"),
            Self::Xrp => ("XRP Ledger", "Payments and settlement", "r... (Base58)"),
            Self::Doge => ("Dogecoin", "Peer-to-peer payments", "D... (P2PKH)"),
            Self::Ltc => ("Litecoin", "Fast Bitcoin fork", "ltc1... (Bech32)"),
            Self::Ton => ("TON", "The Open Network", "User-friendly Base64"),
        };
        ChainInfo {
            chain: self,
            name,
            description,
            derivation_path: self.derivation_path(),
            address_format,
            encoding: self.address_encoding(),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|chain| chain.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidChain {
                chain: wanted.to_string(),
            })
    }
}
