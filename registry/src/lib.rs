//! # CFP Registry
//!
//! Core of the Call-for-Proposals system: the authorization state machine,
//! the call registry, and the per-call proposal registries, all expressed as
//! operations against an external [`store::LedgerStore`].
//!
//! | Concern         | Module                                   |
//! |-----------------|------------------------------------------|
//! | Identifiers     | [`types`]                                |
//! | Ledger contract | [`store`]                                |
//! | Authorization   | [`authorization`]                        |
//! | Calls           | [`calls`]                                |
//! | Proposals       | [`proposals`]                            |
//! | Service layer   | [`facade`]                               |
//!
//! ## Architecture
//!
//! The ledger is the sole owner of durable state; this crate holds none.
//! Registry modules read fresh ledger state on every request, evaluate
//! invariants, and submit at most one atomic mutation per operation, waiting
//! for durable commitment before reporting success.  The [`facade::Facade`]
//! translates registry outcomes into a fixed externally visible error
//! taxonomy and publishes [`types::ProposalRegistered`] notifications.

pub mod authorization;
pub mod calls;
pub mod error;
pub mod facade;
pub mod proposals;
pub mod store;
pub mod types;

#[cfg(test)]
mod invariants;

pub use error::RegistryError;
pub use facade::{CallDetail, Facade, FacadeError};
pub use store::{Commitment, LedgerStore, MemoryLedger, RejectReason, StoreError, WriteBatch, WriteOp};
pub use types::{
    AccountState, Address, CallId, CallRecord, LedgerClock, ProposalId, ProposalRecord,
    ProposalRegistered,
};
