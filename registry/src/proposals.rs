//! # Proposal registry
//!
//! Per-call mapping of proposal identifiers to their submission record.
//! A proposal registers at most once per call, and never at or after the
//! call's closing time.
//!
//! Call existence and closing time are re-validated inside every
//! registration path, regardless of what the caller checked upstream — this
//! operation is the sole enforcement point on its side of the ledger, and
//! the ledger re-validates once more at commit.

use crate::error::RegistryError;
use crate::store::{LedgerStore, WriteBatch, WriteOp};
use crate::types::{Address, CallId, CallRecord, ProposalId, ProposalRecord, ProposalRegistered};

/// Result of a successful registration: the committed record plus the
/// notification to publish to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    pub record: ProposalRecord,
    pub event: ProposalRegistered,
}

async fn require_call<L: LedgerStore + ?Sized>(
    store: &L,
    call_id: &CallId,
) -> Result<CallRecord, RegistryError> {
    store
        .call(call_id)
        .await?
        .ok_or(RegistryError::UnknownCall)
}

async fn commit_registration<L: LedgerStore + ?Sized>(
    store: &L,
    call: &CallRecord,
    call_id: &CallId,
    proposal_id: &ProposalId,
    sender: &Address,
) -> Result<Registered, RegistryError> {
    let clock = store.clock().await?;
    if clock.timestamp >= call.closing_time {
        return Err(RegistryError::CallClosed);
    }
    if store.proposal(call_id, proposal_id).await?.is_some() {
        return Err(RegistryError::AlreadyRegistered);
    }

    let commitment = store
        .submit(WriteBatch::single(WriteOp::RegisterProposal {
            call_id: *call_id,
            proposal_id: *proposal_id,
            sender: *sender,
        }))
        .await?;
    store.wait(&commitment).await?;

    // Block number and timestamp are stamped by the ledger; read them back.
    let record = store
        .proposal(call_id, proposal_id)
        .await?
        .ok_or_else(|| RegistryError::Ledger("proposal record missing after commit".into()))?;

    Ok(Registered {
        record,
        event: ProposalRegistered {
            proposal: *proposal_id,
            sender: record.sender,
            block_number: record.block_number,
        },
    })
}

/// Register a proposal; `sender` is recorded as the submitter.  Any account
/// may register against an open call.
pub async fn register<L: LedgerStore + ?Sized>(
    store: &L,
    call_id: &CallId,
    sender: &Address,
    proposal_id: &ProposalId,
) -> Result<Registered, RegistryError> {
    let call = require_call(store, call_id).await?;
    commit_registration(store, &call, call_id, proposal_id, sender).await
}

/// Register a proposal on behalf of `sender`.  Only the call's creator may
/// use this path; the attributed submitter is `sender`, not the caller.
pub async fn register_for<L: LedgerStore + ?Sized>(
    store: &L,
    call_id: &CallId,
    caller: &Address,
    proposal_id: &ProposalId,
    sender: &Address,
) -> Result<Registered, RegistryError> {
    let call = require_call(store, call_id).await?;
    if call.creator != *caller {
        return Err(RegistryError::Unauthorized);
    }
    commit_registration(store, &call, call_id, proposal_id, sender).await
}

/// Submission record for a proposal, or `None` when it was never registered
/// — absence is the canonical "not found" signal here, not an error.
/// Fails with `UnknownCall` when the call itself does not exist.
pub async fn data<L: LedgerStore + ?Sized>(
    store: &L,
    call_id: &CallId,
    proposal_id: &ProposalId,
) -> Result<Option<ProposalRecord>, RegistryError> {
    require_call(store, call_id).await?;
    Ok(store.proposal(call_id, proposal_id).await?)
}

/// Number of proposals registered against a call.
pub async fn count<L: LedgerStore + ?Sized>(
    store: &L,
    call_id: &CallId,
) -> Result<usize, RegistryError> {
    require_call(store, call_id).await?;
    Ok(store.proposals(call_id).await?.len())
}

/// The `index`-th proposal id, registration order.
pub async fn at<L: LedgerStore + ?Sized>(
    store: &L,
    call_id: &CallId,
    index: usize,
) -> Result<ProposalId, RegistryError> {
    require_call(store, call_id).await?;
    store
        .proposals(call_id)
        .await?
        .get(index)
        .copied()
        .ok_or(RegistryError::IndexOutOfRange)
}
