//! # Ledger store
//!
//! The ledger is the sole owner of durable state.  This module defines the
//! contract of operations against it — keyed reads, a clock, and atomic
//! mutation submission — plus [`MemoryLedger`], an in-process implementation
//! with a controllable clock used by every core test.
//!
//! ## Commitment model
//!
//! Mutations are submitted as a [`WriteBatch`] and acknowledged with a
//! [`Commitment`] handle.  The handle must be awaited via
//! [`LedgerStore::wait`] before the operation may be reported as successful;
//! the ledger serializes batches and re-validates data preconditions at
//! commit time, so a batch is either applied atomically in ledger order or
//! rejected outright with a typed [`RejectReason`].
//!
//! Role checks (owner-only operations, creator-only registration) are bound
//! to the caller identity and are performed by the registry modules against
//! fresh reads; the store itself only enforces data invariants.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    AccountState, Address, CallId, CallRecord, LedgerClock, ProposalId, ProposalRecord,
};

/// Why the ledger refused a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("call already exists")]
    CallExists,
    #[error("closing time is not in the future")]
    ClosingTimeInPast,
    #[error("unknown call")]
    UnknownCall,
    #[error("call is closed")]
    CallClosed,
    #[error("proposal already registered")]
    ProposalExists,
}

/// Failures crossing the store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transport or timeout failure; the caller may retry with backoff.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the batch at commit time.
    #[error("rejected by ledger: {0}")]
    Rejected(RejectReason),

    /// Malformed or unexpected data coming back from the ledger.
    #[error("ledger protocol error: {0}")]
    Protocol(String),
}

/// A single mutation intent.  The ledger stamps block number and timestamp
/// and assigns per-call registry addresses; clients never pick those values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WriteOp {
    SetAccountState {
        account: Address,
        state: AccountState,
    },
    CreateCall {
        call_id: CallId,
        creator: Address,
        closing_time: u64,
    },
    RegisterProposal {
        call_id: CallId,
        proposal_id: ProposalId,
        sender: Address,
    },
}

/// An atomic group of mutations, applied in ledger order or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn single(op: WriteOp) -> Self {
        WriteBatch { ops: vec![op] }
    }
}

/// Opaque handle for a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub handle: String,
}

/// Read/write contract against the authoritative external ledger.
///
/// All reads reflect the most recently committed mutation; callers must not
/// cache authorization or call state across requests.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// The privileged account controlling authorization and `create_for`.
    async fn owner(&self) -> Result<Address, StoreError>;

    async fn account_state(&self, account: &Address) -> Result<AccountState, StoreError>;

    /// Pending registrations, insertion order, unique by address.
    async fn pending(&self) -> Result<Vec<Address>, StoreError>;

    /// `None` when the id was never created (zero-creator sentinel decoded
    /// at this boundary).
    async fn call(&self, call_id: &CallId) -> Result<Option<CallRecord>, StoreError>;

    /// Every call id ever created, insertion order.  Unbounded.
    async fn all_call_ids(&self) -> Result<Vec<CallId>, StoreError>;

    /// Call ids attributed to `creator`, insertion order.
    async fn created_by(&self, creator: &Address) -> Result<Vec<CallId>, StoreError>;

    /// Accounts that have created at least one call, insertion order.
    async fn creators(&self) -> Result<Vec<Address>, StoreError>;

    /// `None` when the proposal was never registered against this call.
    async fn proposal(
        &self,
        call_id: &CallId,
        proposal_id: &ProposalId,
    ) -> Result<Option<ProposalRecord>, StoreError>;

    /// Proposal ids for a call, registration order.
    async fn proposals(&self, call_id: &CallId) -> Result<Vec<ProposalId>, StoreError>;

    async fn clock(&self) -> Result<LedgerClock, StoreError>;

    /// Submit a batch for commitment.  Acceptance of the handle does not
    /// imply the batch committed; await it with [`LedgerStore::wait`].
    async fn submit(&self, batch: WriteBatch) -> Result<Commitment, StoreError>;

    /// Block until the batch is durably committed or rejected.
    async fn wait(&self, commitment: &Commitment) -> Result<(), StoreError>;
}

// ─────────────────────────────────────────────────────────
// In-memory ledger
// ─────────────────────────────────────────────────────────

#[derive(Default)]
struct CallProposals {
    records: HashMap<ProposalId, ProposalRecord>,
    order: Vec<ProposalId>,
}

struct Inner {
    owner: Address,
    accounts: HashMap<Address, AccountState>,
    pending: Vec<Address>,
    calls: HashMap<CallId, CallRecord>,
    call_order: Vec<CallId>,
    created_by: HashMap<Address, Vec<CallId>>,
    creators: Vec<Address>,
    proposals: HashMap<CallId, CallProposals>,
    block_number: u64,
    timestamp: u64,
    next_handle: u64,
    outcomes: HashMap<String, Result<(), RejectReason>>,
}

/// In-process [`LedgerStore`] with a manually driven clock.
///
/// Commits are serialized under one lock; every committed batch advances the
/// block number by one.  The timestamp only moves through
/// [`MemoryLedger::advance_time`] / [`MemoryLedger::set_time`], which keeps
/// closing-time boundary tests deterministic.
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

/// Arbitrary but stable genesis timestamp.
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

impl MemoryLedger {
    pub fn new(owner: Address) -> Self {
        MemoryLedger {
            inner: Mutex::new(Inner {
                owner,
                accounts: HashMap::new(),
                pending: Vec::new(),
                calls: HashMap::new(),
                call_order: Vec::new(),
                created_by: HashMap::new(),
                creators: Vec::new(),
                proposals: HashMap::new(),
                block_number: 0,
                timestamp: GENESIS_TIMESTAMP,
                next_handle: 0,
                outcomes: HashMap::new(),
            }),
        }
    }

    /// Current ledger timestamp.
    pub fn now(&self) -> u64 {
        self.inner.lock().expect("ledger lock").timestamp
    }

    pub fn advance_time(&self, secs: u64) {
        let mut inner = self.inner.lock().expect("ledger lock");
        inner.timestamp += secs;
    }

    pub fn set_time(&self, timestamp: u64) {
        let mut inner = self.inner.lock().expect("ledger lock");
        inner.timestamp = timestamp;
    }
}

impl Inner {
    fn apply(&mut self, batch: &WriteBatch) -> Result<(), RejectReason> {
        // Validate the whole batch against current state before mutating
        // anything, so a rejected batch leaves no partial writes.
        for op in &batch.ops {
            match op {
                WriteOp::SetAccountState { .. } => {}
                WriteOp::CreateCall {
                    call_id,
                    closing_time,
                    ..
                } => {
                    if self.calls.contains_key(call_id) {
                        return Err(RejectReason::CallExists);
                    }
                    if *closing_time <= self.timestamp {
                        return Err(RejectReason::ClosingTimeInPast);
                    }
                }
                WriteOp::RegisterProposal {
                    call_id,
                    proposal_id,
                    ..
                } => {
                    let call = self.calls.get(call_id).ok_or(RejectReason::UnknownCall)?;
                    if self.timestamp >= call.closing_time {
                        return Err(RejectReason::CallClosed);
                    }
                    let registered = self
                        .proposals
                        .get(call_id)
                        .is_some_and(|p| p.records.contains_key(proposal_id));
                    if registered {
                        return Err(RejectReason::ProposalExists);
                    }
                }
            }
        }

        self.block_number += 1;
        let block_number = self.block_number;
        let timestamp = self.timestamp;

        for op in &batch.ops {
            match op {
                WriteOp::SetAccountState { account, state } => {
                    match state {
                        AccountState::Unregistered => {
                            self.accounts.remove(account);
                        }
                        _ => {
                            self.accounts.insert(*account, *state);
                        }
                    }
                    if matches!(state, AccountState::Pending) {
                        if !self.pending.contains(account) {
                            self.pending.push(*account);
                        }
                    } else {
                        self.pending.retain(|a| a != account);
                    }
                }
                WriteOp::CreateCall {
                    call_id,
                    creator,
                    closing_time,
                } => {
                    let cfp = derive_cfp_address(self.call_order.len() as u64 + 1);
                    self.calls.insert(
                        *call_id,
                        CallRecord {
                            creator: *creator,
                            cfp,
                            closing_time: *closing_time,
                        },
                    );
                    self.call_order.push(*call_id);
                    if !self.creators.contains(creator) {
                        self.creators.push(*creator);
                    }
                    self.created_by.entry(*creator).or_default().push(*call_id);
                    self.proposals.insert(*call_id, CallProposals::default());
                }
                WriteOp::RegisterProposal {
                    call_id,
                    proposal_id,
                    sender,
                } => {
                    let per_call = self.proposals.entry(*call_id).or_default();
                    per_call.records.insert(
                        *proposal_id,
                        ProposalRecord {
                            sender: *sender,
                            block_number,
                            timestamp,
                        },
                    );
                    per_call.order.push(*proposal_id);
                }
            }
        }

        Ok(())
    }
}

/// Deterministic address for the per-call registry instantiated on call
/// creation.  Nonzero for any sequence number.
fn derive_cfp_address(seq: u64) -> Address {
    let mut bytes = [0u8; Address::LEN];
    bytes[0] = 0xcf;
    bytes[Address::LEN - 8..].copy_from_slice(&seq.to_be_bytes());
    Address(bytes)
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn owner(&self) -> Result<Address, StoreError> {
        Ok(self.inner.lock().expect("ledger lock").owner)
    }

    async fn account_state(&self, account: &Address) -> Result<AccountState, StoreError> {
        let inner = self.inner.lock().expect("ledger lock");
        Ok(inner
            .accounts
            .get(account)
            .copied()
            .unwrap_or(AccountState::Unregistered))
    }

    async fn pending(&self) -> Result<Vec<Address>, StoreError> {
        Ok(self.inner.lock().expect("ledger lock").pending.clone())
    }

    async fn call(&self, call_id: &CallId) -> Result<Option<CallRecord>, StoreError> {
        let inner = self.inner.lock().expect("ledger lock");
        Ok(inner.calls.get(call_id).copied())
    }

    async fn all_call_ids(&self) -> Result<Vec<CallId>, StoreError> {
        Ok(self.inner.lock().expect("ledger lock").call_order.clone())
    }

    async fn created_by(&self, creator: &Address) -> Result<Vec<CallId>, StoreError> {
        let inner = self.inner.lock().expect("ledger lock");
        Ok(inner.created_by.get(creator).cloned().unwrap_or_default())
    }

    async fn creators(&self) -> Result<Vec<Address>, StoreError> {
        Ok(self.inner.lock().expect("ledger lock").creators.clone())
    }

    async fn proposal(
        &self,
        call_id: &CallId,
        proposal_id: &ProposalId,
    ) -> Result<Option<ProposalRecord>, StoreError> {
        let inner = self.inner.lock().expect("ledger lock");
        Ok(inner
            .proposals
            .get(call_id)
            .and_then(|p| p.records.get(proposal_id))
            .copied())
    }

    async fn proposals(&self, call_id: &CallId) -> Result<Vec<ProposalId>, StoreError> {
        let inner = self.inner.lock().expect("ledger lock");
        Ok(inner
            .proposals
            .get(call_id)
            .map(|p| p.order.clone())
            .unwrap_or_default())
    }

    async fn clock(&self) -> Result<LedgerClock, StoreError> {
        let inner = self.inner.lock().expect("ledger lock");
        Ok(LedgerClock {
            block_number: inner.block_number,
            timestamp: inner.timestamp,
        })
    }

    async fn submit(&self, batch: WriteBatch) -> Result<Commitment, StoreError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        inner.next_handle += 1;
        let handle = format!("mem-{}", inner.next_handle);
        let outcome = inner.apply(&batch);
        inner.outcomes.insert(handle.clone(), outcome);
        Ok(Commitment { handle })
    }

    async fn wait(&self, commitment: &Commitment) -> Result<(), StoreError> {
        let inner = self.inner.lock().expect("ledger lock");
        match inner.outcomes.get(&commitment.handle) {
            Some(Ok(())) => Ok(()),
            Some(Err(reason)) => Err(StoreError::Rejected(*reason)),
            None => Err(StoreError::Protocol(format!(
                "unknown commitment {}",
                commitment.handle
            ))),
        }
    }
}
