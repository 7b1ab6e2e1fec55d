//! # Façade
//!
//! Service layer between external callers (the REST gateway, tests) and the
//! registries.  Holds no authoritative state — only the shared ledger store
//! handle, the signer identity used for proxied operations, and the
//! notification channel for [`ProposalRegistered`] events.
//!
//! String identifiers are parsed here, before any ledger access, and every
//! registry outcome is mapped onto the fixed [`FacadeError`] taxonomy so
//! that ledger internals never leak to the caller.  A read addressing a
//! missing entity is [`FacadeError::NotFound`]; a valid-but-empty
//! enumeration is an empty `Ok`.

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use crate::error::RegistryError;
use crate::store::LedgerStore;
use crate::types::{AccountState, Address, CallId, ProposalId, ProposalRecord, ProposalRegistered};
use crate::{authorization, calls, proposals};

/// Externally visible error kinds.  Everything except `LedgerUnavailable`
/// is terminal for the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacadeError {
    /// Malformed identifier; detected before any ledger access.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("already exists")]
    AlreadyExists,

    #[error("proposal already registered")]
    AlreadyRegistered,

    #[error("call is closed")]
    CallClosed,

    #[error("closing time is not in the future")]
    ClosingTimeInPast,

    /// Retryable; the caller may back off and try again.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("internal error")]
    Internal,
}

impl From<RegistryError> for FacadeError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unauthorized => FacadeError::Unauthorized,
            RegistryError::CallAlreadyExists => FacadeError::AlreadyExists,
            RegistryError::ClosingTimeInPast => FacadeError::ClosingTimeInPast,
            RegistryError::UnknownCall => FacadeError::NotFound,
            RegistryError::AlreadyRegistered => FacadeError::AlreadyRegistered,
            RegistryError::CallClosed => FacadeError::CallClosed,
            RegistryError::IndexOutOfRange => FacadeError::NotFound,
            RegistryError::Unavailable(msg) => FacadeError::LedgerUnavailable(msg),
            RegistryError::Ledger(_) => FacadeError::Internal,
        }
    }
}

/// Full detail for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallDetail {
    pub call_id: CallId,
    pub creator: Address,
    pub cfp: Address,
    pub closing_time: u64,
}

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Request-facing service over a shared [`LedgerStore`].
pub struct Facade<L: LedgerStore> {
    store: Arc<L>,
    signer: Address,
    events: broadcast::Sender<ProposalRegistered>,
}

impl<L: LedgerStore> Facade<L> {
    /// `signer` is the gateway's own ledger identity: the caller for
    /// owner-only reads and the recorded sender for proxied registrations.
    pub fn new(store: Arc<L>, signer: Address) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Facade {
            store,
            signer,
            events,
        }
    }

    /// Subscribe to [`ProposalRegistered`] notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ProposalRegistered> {
        self.events.subscribe()
    }

    pub fn signer(&self) -> &Address {
        &self.signer
    }

    fn parse<T: FromStr>(&self, raw: &str) -> Result<T, FacadeError>
    where
        T::Err: std::fmt::Display,
    {
        raw.parse()
            .map_err(|e: T::Err| FacadeError::InvalidIdentifier(e.to_string()))
    }

    // ─────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────

    pub async fn call_detail(&self, call_id: &str) -> Result<CallDetail, FacadeError> {
        let id: CallId = self.parse(call_id)?;
        let record = calls::get(self.store.as_ref(), &id)
            .await?
            .ok_or(FacadeError::NotFound)?;
        Ok(CallDetail {
            call_id: id,
            creator: record.creator,
            cfp: record.cfp,
            closing_time: record.closing_time,
        })
    }

    /// Every call on the ledger, insertion order.  An empty ledger is an
    /// empty `Ok`, not an error.
    pub async fn list_calls(&self) -> Result<Vec<CallDetail>, FacadeError> {
        let store = self.store.as_ref();
        let ids = calls::all_call_ids(store).await?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            // Ids come from the ledger itself; a missing record here means
            // the ledger is inconsistent.
            let record = calls::get(store, &id).await?.ok_or(FacadeError::Internal)?;
            out.push(CallDetail {
                call_id: id,
                creator: record.creator,
                cfp: record.cfp,
                closing_time: record.closing_time,
            });
        }
        Ok(out)
    }

    pub async fn closing_time(&self, call_id: &str) -> Result<u64, FacadeError> {
        Ok(self.call_detail(call_id).await?.closing_time)
    }

    /// Accounts that have created at least one call.
    pub async fn creators(&self) -> Result<Vec<Address>, FacadeError> {
        Ok(self.store.creators().await.map_err(RegistryError::from)?)
    }

    /// Owner-only: accounts waiting for authorization.  Fails with
    /// `Unauthorized` when the gateway signer is not the registry owner.
    pub async fn pending_accounts(&self) -> Result<Vec<Address>, FacadeError> {
        Ok(authorization::all_pending(self.store.as_ref(), &self.signer).await?)
    }

    pub async fn is_registered(&self, account: &str) -> Result<bool, FacadeError> {
        let addr: Address = self.parse(account)?;
        Ok(authorization::is_registered(self.store.as_ref(), &addr).await?)
    }

    pub async fn is_authorized(&self, account: &str) -> Result<bool, FacadeError> {
        let addr: Address = self.parse(account)?;
        Ok(authorization::is_authorized(self.store.as_ref(), &addr).await?)
    }

    /// Submission record for a proposal.  `NotFound` covers both an unknown
    /// call and a never-registered proposal.
    pub async fn proposal_data(
        &self,
        call_id: &str,
        proposal: &str,
    ) -> Result<ProposalRecord, FacadeError> {
        let call: CallId = self.parse(call_id)?;
        let prop: ProposalId = self.parse(proposal)?;
        proposals::data(self.store.as_ref(), &call, &prop)
            .await?
            .ok_or(FacadeError::NotFound)
    }

    // ─────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────

    /// Register `caller` as a pending creator.
    pub async fn register(&self, caller: &Address) -> Result<AccountState, FacadeError> {
        Ok(authorization::register(self.store.as_ref(), caller).await?)
    }

    pub async fn authorize(&self, caller: &Address, target: &Address) -> Result<(), FacadeError> {
        Ok(authorization::authorize(self.store.as_ref(), caller, target).await?)
    }

    pub async fn unauthorize(&self, caller: &Address, target: &Address) -> Result<(), FacadeError> {
        Ok(authorization::unauthorize(self.store.as_ref(), caller, target).await?)
    }

    pub async fn create(
        &self,
        caller: &Address,
        call_id: &str,
        closing_time: u64,
    ) -> Result<CallDetail, FacadeError> {
        let id: CallId = self.parse(call_id)?;
        let record = calls::create(self.store.as_ref(), caller, &id, closing_time).await?;
        Ok(CallDetail {
            call_id: id,
            creator: record.creator,
            cfp: record.cfp,
            closing_time: record.closing_time,
        })
    }

    pub async fn create_for(
        &self,
        caller: &Address,
        call_id: &str,
        closing_time: u64,
        creator: &Address,
    ) -> Result<CallDetail, FacadeError> {
        let id: CallId = self.parse(call_id)?;
        let record =
            calls::create_for(self.store.as_ref(), caller, &id, closing_time, creator).await?;
        Ok(CallDetail {
            call_id: id,
            creator: record.creator,
            cfp: record.cfp,
            closing_time: record.closing_time,
        })
    }

    /// Register a proposal with the gateway signer as the recorded sender,
    /// then publish the notification.  Success is only reported once the
    /// mutation is durably committed.
    pub async fn register_proposal(
        &self,
        call_id: &str,
        proposal: &str,
    ) -> Result<ProposalRecord, FacadeError> {
        let call: CallId = self.parse(call_id)?;
        let prop: ProposalId = self.parse(proposal)?;

        let registered =
            proposals::register(self.store.as_ref(), &call, &self.signer, &prop).await?;

        info!(
            proposal = %registered.event.proposal,
            sender = %registered.event.sender,
            block = registered.event.block_number,
            "proposal registered"
        );
        // Nobody listening is fine.
        let _ = self.events.send(registered.event);

        Ok(registered.record)
    }
}
