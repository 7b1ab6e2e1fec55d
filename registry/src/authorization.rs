//! # Authorization state machine
//!
//! Tracks which accounts may create calls:
//! `Unregistered → Pending → Authorized`, with owner revocation returning an
//! account to `Unregistered` from either state.
//!
//! Every operation takes the caller identity explicitly; owner-only
//! operations compare it against [`LedgerStore::owner`] on every request and
//! fail with [`RegistryError::Unauthorized`] as a typed result.  No
//! authorization state is cached across requests.

use crate::error::RegistryError;
use crate::store::{LedgerStore, WriteBatch, WriteOp};
use crate::types::{AccountState, Address};

pub(crate) async fn require_owner<L: LedgerStore + ?Sized>(
    store: &L,
    caller: &Address,
) -> Result<(), RegistryError> {
    if store.owner().await? == *caller {
        Ok(())
    } else {
        Err(RegistryError::Unauthorized)
    }
}

async fn set_state<L: LedgerStore + ?Sized>(
    store: &L,
    account: &Address,
    state: AccountState,
) -> Result<(), RegistryError> {
    let commitment = store
        .submit(WriteBatch::single(WriteOp::SetAccountState {
            account: *account,
            state,
        }))
        .await?;
    store.wait(&commitment).await?;
    Ok(())
}

/// Ask to become a creator.  `Unregistered` accounts move to `Pending`;
/// re-registering a `Pending` or `Authorized` account is a no-op, so the
/// pending set stays unique by address.
///
/// Returns the account's state after the call.
pub async fn register<L: LedgerStore + ?Sized>(
    store: &L,
    caller: &Address,
) -> Result<AccountState, RegistryError> {
    match store.account_state(caller).await? {
        AccountState::Unregistered => {
            set_state(store, caller, AccountState::Pending).await?;
            Ok(AccountState::Pending)
        }
        state => Ok(state),
    }
}

/// Owner-only: move `target` to `Authorized` from any prior state.  An
/// unregistered account may be authorized directly, skipping `Pending`.
pub async fn authorize<L: LedgerStore + ?Sized>(
    store: &L,
    caller: &Address,
    target: &Address,
) -> Result<(), RegistryError> {
    require_owner(store, caller).await?;
    set_state(store, target, AccountState::Authorized).await
}

/// Owner-only: move `target` back to `Unregistered` — removes a `Pending`
/// request or revokes an `Authorized` creator.
pub async fn unauthorize<L: LedgerStore + ?Sized>(
    store: &L,
    caller: &Address,
    target: &Address,
) -> Result<(), RegistryError> {
    require_owner(store, caller).await?;
    set_state(store, target, AccountState::Unregistered).await
}

/// `true` when the account is `Pending` or `Authorized`.  Any caller.
pub async fn is_registered<L: LedgerStore + ?Sized>(
    store: &L,
    account: &Address,
) -> Result<bool, RegistryError> {
    Ok(store.account_state(account).await?.is_registered())
}

/// `true` when the account may create calls.  Any caller.
pub async fn is_authorized<L: LedgerStore + ?Sized>(
    store: &L,
    account: &Address,
) -> Result<bool, RegistryError> {
    Ok(store.account_state(account).await?.is_authorized())
}

/// Owner-only: number of pending registrations.
pub async fn pending_count<L: LedgerStore + ?Sized>(
    store: &L,
    caller: &Address,
) -> Result<usize, RegistryError> {
    require_owner(store, caller).await?;
    Ok(store.pending().await?.len())
}

/// Owner-only: the pending address at `index`, insertion order.
pub async fn get_pending<L: LedgerStore + ?Sized>(
    store: &L,
    caller: &Address,
    index: usize,
) -> Result<Address, RegistryError> {
    require_owner(store, caller).await?;
    store
        .pending()
        .await?
        .get(index)
        .copied()
        .ok_or(RegistryError::IndexOutOfRange)
}

/// Owner-only: every pending address, insertion order.
pub async fn all_pending<L: LedgerStore + ?Sized>(
    store: &L,
    caller: &Address,
) -> Result<Vec<Address>, RegistryError> {
    require_owner(store, caller).await?;
    Ok(store.pending().await?)
}
