//! Registry-level error types.

use thiserror::Error;

use crate::store::{RejectReason, StoreError};

/// Outcome of a registry operation that did not succeed.
///
/// Every variant except `Unavailable` is terminal for the request; the
/// ledger never retries on the caller's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("caller is not allowed to perform this operation")]
    Unauthorized,

    #[error("a call with this id already exists")]
    CallAlreadyExists,

    #[error("closing time is not in the future")]
    ClosingTimeInPast,

    #[error("no call with this id")]
    UnknownCall,

    #[error("proposal has already been registered")]
    AlreadyRegistered,

    #[error("call is closed for new proposals")]
    CallClosed,

    #[error("index out of range")]
    IndexOutOfRange,

    /// Transport or timeout failure talking to the ledger; retryable.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Anything unexpected coming back from the ledger.
    #[error("ledger failure: {0}")]
    Ledger(String),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => RegistryError::Unavailable(msg),
            // The ledger re-validates every batch; a rejection here means the
            // state moved between our reads and the commit.
            StoreError::Rejected(reason) => match reason {
                RejectReason::CallExists => RegistryError::CallAlreadyExists,
                RejectReason::ClosingTimeInPast => RegistryError::ClosingTimeInPast,
                RejectReason::UnknownCall => RegistryError::UnknownCall,
                RejectReason::CallClosed => RegistryError::CallClosed,
                RejectReason::ProposalExists => RegistryError::AlreadyRegistered,
            },
            StoreError::Protocol(msg) => RegistryError::Ledger(msg),
        }
    }
}
