//! # Types
//!
//! Shared data structures used across all modules of the CFP registry.
//!
//! ## Design decisions
//!
//! ### Fixed-width identifiers
//!
//! The ledger keys everything by two identifier widths: 20-byte account
//! addresses and 32-byte call/proposal identifiers (content hashes).  Both
//! are newtypes over fixed arrays so that a malformed identifier can never
//! reach a ledger call — parsing happens once, at the façade edge.
//!
//! ### Account state as a Finite-State Machine
//!
//! [`AccountState`] enforces the authorization lifecycle:
//!
//! ```text
//! Unregistered ──► Pending ──► Authorized
//!      ▲              │             │
//!      └──────────────┴─────────────┘  (owner revocation)
//! ```
//!
//! The owner may also authorize an unregistered account directly, skipping
//! `Pending`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to parse a fixed-width hex identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    #[error("expected {expected} hex characters, got {got}")]
    BadLength { expected: usize, got: usize },
    #[error("invalid hex encoding")]
    BadHex,
}

macro_rules! fixed_id {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Byte width of this identifier.
            pub const LEN: usize = $len;
            /// The all-zero sentinel value.
            pub const ZERO: Self = Self([0u8; $len]);

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let stripped = s.strip_prefix("0x").unwrap_or(s);
                if stripped.len() != $len * 2 {
                    return Err(ParseIdError::BadLength {
                        expected: $len * 2,
                        got: stripped.len(),
                    });
                }
                let bytes = hex::decode(stripped).map_err(|_| ParseIdError::BadHex)?;
                let mut out = [0u8; $len];
                out.copy_from_slice(&bytes);
                Ok(Self(out))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{self}")
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_id!(
    /// A 20-byte ledger account address.
    Address,
    20
);

fixed_id!(
    /// A 32-byte call identifier, chosen by the creator.
    CallId,
    32
);

fixed_id!(
    /// A 32-byte proposal identifier (typically a content hash).
    ProposalId,
    32
);

/// Authorization lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    /// Never registered, or revoked by the owner.
    Unregistered,
    /// Asked to become a creator; waiting for the owner's decision.
    Pending,
    /// Allowed to create calls.
    Authorized,
}

impl AccountState {
    /// `Pending` and `Authorized` both count as registered.
    pub fn is_registered(&self) -> bool {
        !matches!(self, AccountState::Unregistered)
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, AccountState::Authorized)
    }
}

/// A committed call-for-proposals entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Account the call is attributed to.
    pub creator: Address,
    /// Address of the per-call proposal registry instantiated by the ledger.
    pub cfp: Address,
    /// UNIX timestamp after which proposals are rejected.
    pub closing_time: u64,
}

/// A committed proposal entry, stamped by the ledger at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRecord {
    pub sender: Address,
    pub block_number: u64,
    pub timestamp: u64,
}

/// Current ledger position, used for closing-time checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerClock {
    pub block_number: u64,
    pub timestamp: u64,
}

/// Notification published on every successful proposal registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRegistered {
    pub proposal: ProposalId,
    pub sender: Address,
    pub block_number: u64,
}
