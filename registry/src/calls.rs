//! # Call registry
//!
//! Maps call identifiers to their creator, per-call proposal registry
//! address, and closing time.  Identifiers are caller-supplied and globally
//! unique; records are immutable once created and never deleted.

use crate::authorization;
use crate::error::RegistryError;
use crate::store::{LedgerStore, WriteBatch, WriteOp};
use crate::types::{Address, CallId, CallRecord};

/// Validate and commit a call creation attributed to `creator`.
async fn commit_create<L: LedgerStore + ?Sized>(
    store: &L,
    creator: &Address,
    call_id: &CallId,
    closing_time: u64,
) -> Result<CallRecord, RegistryError> {
    if store.call(call_id).await?.is_some() {
        return Err(RegistryError::CallAlreadyExists);
    }
    let clock = store.clock().await?;
    if closing_time <= clock.timestamp {
        return Err(RegistryError::ClosingTimeInPast);
    }

    let commitment = store
        .submit(WriteBatch::single(WriteOp::CreateCall {
            call_id: *call_id,
            creator: *creator,
            closing_time,
        }))
        .await?;
    store.wait(&commitment).await?;

    // The ledger assigns the per-call registry address at commit; read the
    // committed record back rather than guessing it.
    store
        .call(call_id)
        .await?
        .ok_or_else(|| RegistryError::Ledger("call record missing after commit".into()))
}

/// Create a call.  `caller` must be `Authorized` and becomes the creator.
pub async fn create<L: LedgerStore + ?Sized>(
    store: &L,
    caller: &Address,
    call_id: &CallId,
    closing_time: u64,
) -> Result<CallRecord, RegistryError> {
    if !authorization::is_authorized(store, caller).await? {
        return Err(RegistryError::Unauthorized);
    }
    commit_create(store, caller, call_id, closing_time).await
}

/// Owner-only: create a call attributed to `creator`.  The owner itself
/// need not be authorized, but `creator` must be.
pub async fn create_for<L: LedgerStore + ?Sized>(
    store: &L,
    caller: &Address,
    call_id: &CallId,
    closing_time: u64,
    creator: &Address,
) -> Result<CallRecord, RegistryError> {
    authorization::require_owner(store, caller).await?;
    if !authorization::is_authorized(store, creator).await? {
        return Err(RegistryError::Unauthorized);
    }
    commit_create(store, creator, call_id, closing_time).await
}

/// Look up a call.  `None` means the id was never created; callers must not
/// treat a zero creator address as a valid creator.
pub async fn get<L: LedgerStore + ?Sized>(
    store: &L,
    call_id: &CallId,
) -> Result<Option<CallRecord>, RegistryError> {
    Ok(store.call(call_id).await?)
}

/// Every call id ever created, insertion order.  Grows without bound.
pub async fn all_call_ids<L: LedgerStore + ?Sized>(
    store: &L,
) -> Result<Vec<CallId>, RegistryError> {
    Ok(store.all_call_ids().await?)
}

pub async fn created_by_count<L: LedgerStore + ?Sized>(
    store: &L,
    creator: &Address,
) -> Result<usize, RegistryError> {
    Ok(store.created_by(creator).await?.len())
}

/// The `index`-th call id created by `creator`, insertion order.
pub async fn created_by<L: LedgerStore + ?Sized>(
    store: &L,
    creator: &Address,
    index: usize,
) -> Result<CallId, RegistryError> {
    store
        .created_by(creator)
        .await?
        .get(index)
        .copied()
        .ok_or(RegistryError::IndexOutOfRange)
}

pub async fn creators_count<L: LedgerStore + ?Sized>(store: &L) -> Result<usize, RegistryError> {
    Ok(store.creators().await?.len())
}

/// The `index`-th account to have created a call.
pub async fn creator_at<L: LedgerStore + ?Sized>(
    store: &L,
    index: usize,
) -> Result<Address, RegistryError> {
    store
        .creators()
        .await?
        .get(index)
        .copied()
        .ok_or(RegistryError::IndexOutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedger;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; Address::LEN];
        bytes[Address::LEN - 1] = n;
        Address(bytes)
    }

    fn call_id(n: u8) -> CallId {
        let mut bytes = [0u8; CallId::LEN];
        bytes[CallId::LEN - 1] = n;
        CallId(bytes)
    }

    const OWNER: u8 = 1;
    const CREATOR: u8 = 2;

    async fn ledger_with_creator() -> MemoryLedger {
        let store = MemoryLedger::new(addr(OWNER));
        authorization::authorize(&store, &addr(OWNER), &addr(CREATOR))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn authorized_creator_can_create() {
        let store = ledger_with_creator().await;
        let closing = store.now() + 100;
        let record = create(&store, &addr(CREATOR), &call_id(1), closing)
            .await
            .unwrap();
        assert_eq!(record.creator, addr(CREATOR));
        assert_eq!(record.closing_time, closing);
        assert!(!record.cfp.is_zero());
        assert_eq!(get(&store, &call_id(1)).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn unauthorized_creation_leaves_no_trace() {
        let store = ledger_with_creator().await;
        let closing = store.now() + 100;
        let err = create(&store, &addr(9), &call_id(1), closing)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::Unauthorized);
        assert!(get(&store, &call_id(1)).await.unwrap().is_none());
        assert!(all_call_ids(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_account_may_not_create() {
        let store = ledger_with_creator().await;
        authorization::register(&store, &addr(5)).await.unwrap();
        let closing = store.now() + 100;
        let err = create(&store, &addr(5), &call_id(1), closing)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::Unauthorized);
    }

    #[tokio::test]
    async fn duplicate_call_id_fails_for_any_creator() {
        let store = ledger_with_creator().await;
        authorization::authorize(&store, &addr(OWNER), &addr(3))
            .await
            .unwrap();
        let closing = store.now() + 100;
        create(&store, &addr(CREATOR), &call_id(1), closing)
            .await
            .unwrap();

        let err = create(&store, &addr(3), &call_id(1), closing)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::CallAlreadyExists);
        let err = create_for(&store, &addr(OWNER), &call_id(1), closing, &addr(3))
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::CallAlreadyExists);
    }

    #[tokio::test]
    async fn closing_time_boundary_is_exclusive() {
        let store = ledger_with_creator().await;
        let now = store.now();
        let err = create(&store, &addr(CREATOR), &call_id(1), now)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::ClosingTimeInPast);
        // One second in the future is enough.
        create(&store, &addr(CREATOR), &call_id(1), now + 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_for_is_owner_only() {
        let store = ledger_with_creator().await;
        let closing = store.now() + 100;
        let err = create_for(&store, &addr(CREATOR), &call_id(1), closing, &addr(CREATOR))
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::Unauthorized);
    }

    #[tokio::test]
    async fn create_for_requires_authorized_creator() {
        let store = ledger_with_creator().await;
        let closing = store.now() + 100;
        let err = create_for(&store, &addr(OWNER), &call_id(1), closing, &addr(9))
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::Unauthorized);
    }

    #[tokio::test]
    async fn create_for_attributes_the_creator() {
        let store = ledger_with_creator().await;
        let closing = store.now() + 100;
        let record = create_for(&store, &addr(OWNER), &call_id(1), closing, &addr(CREATOR))
            .await
            .unwrap();
        assert_eq!(record.creator, addr(CREATOR));
        assert_eq!(
            created_by(&store, &addr(CREATOR), 0).await.unwrap(),
            call_id(1)
        );
    }

    #[tokio::test]
    async fn enumerations_follow_insertion_order() {
        let store = ledger_with_creator().await;
        authorization::authorize(&store, &addr(OWNER), &addr(3))
            .await
            .unwrap();
        let closing = store.now() + 100;
        create(&store, &addr(CREATOR), &call_id(1), closing)
            .await
            .unwrap();
        create(&store, &addr(3), &call_id(2), closing).await.unwrap();
        create(&store, &addr(CREATOR), &call_id(3), closing)
            .await
            .unwrap();

        assert_eq!(
            all_call_ids(&store).await.unwrap(),
            vec![call_id(1), call_id(2), call_id(3)]
        );
        assert_eq!(created_by_count(&store, &addr(CREATOR)).await.unwrap(), 2);
        assert_eq!(
            created_by(&store, &addr(CREATOR), 1).await.unwrap(),
            call_id(3)
        );
        let err = created_by(&store, &addr(CREATOR), 2).await.unwrap_err();
        assert_eq!(err, RegistryError::IndexOutOfRange);

        assert_eq!(creators_count(&store).await.unwrap(), 2);
        assert_eq!(creator_at(&store, 0).await.unwrap(), addr(CREATOR));
        assert_eq!(creator_at(&store, 1).await.unwrap(), addr(3));
        let err = creator_at(&store, 2).await.unwrap_err();
        assert_eq!(err, RegistryError::IndexOutOfRange);
    }

    #[tokio::test]
    async fn unknown_call_reads_as_none() {
        let store = ledger_with_creator().await;
        assert!(get(&store, &call_id(42)).await.unwrap().is_none());
        assert_eq!(created_by_count(&store, &addr(9)).await.unwrap(), 0);
    }
}
