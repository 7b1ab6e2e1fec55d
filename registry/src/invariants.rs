//! End-to-end lifecycle scenarios over the in-memory ledger, exercising the
//! registries through the façade exactly as the gateway does.

use std::sync::Arc;

use crate::facade::{Facade, FacadeError};
use crate::store::MemoryLedger;
use crate::types::Address;
use crate::{authorization, calls};

fn addr(n: u8) -> Address {
    let mut bytes = [0u8; Address::LEN];
    bytes[Address::LEN - 1] = n;
    Address(bytes)
}

fn hex32(n: u8) -> String {
    let mut bytes = [0u8; 32];
    bytes[31] = n;
    format!("0x{}", hex::encode(bytes))
}

const OWNER: u8 = 1;

fn setup() -> (Arc<MemoryLedger>, Facade<MemoryLedger>) {
    let store = Arc::new(MemoryLedger::new(addr(OWNER)));
    let facade = Facade::new(store.clone(), addr(OWNER));
    (store, facade)
}

/// Register → authorize → create → register proposal → read back sender.
#[tokio::test]
async fn full_creator_lifecycle() {
    let (store, facade) = setup();
    let x = addr(10);

    facade.register(&x).await.unwrap();
    assert!(facade.is_registered(&x.to_string()).await.unwrap());
    assert!(!facade.is_authorized(&x.to_string()).await.unwrap());

    facade.authorize(&addr(OWNER), &x).await.unwrap();
    assert!(facade.is_authorized(&x.to_string()).await.unwrap());
    assert!(facade.pending_accounts().await.unwrap().is_empty());

    let closing = store.now() + 100;
    let call = facade.create(&x, &hex32(1), closing).await.unwrap();
    assert_eq!(call.creator, x);

    // X submits its own proposal directly against the ledger.
    let registered = crate::proposals::register(
        store.as_ref(),
        &call.call_id,
        &x,
        &hex32(7).parse().unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(registered.record.sender, x);

    let data = facade.proposal_data(&hex32(1), &hex32(7)).await.unwrap();
    assert_eq!(data.sender, x);
}

/// An unauthorized create attempt leaves the ledger untouched.
#[tokio::test]
async fn rejected_creation_has_no_side_effects() {
    let (store, facade) = setup();
    let y = addr(20);

    let before = facade.list_calls().await.unwrap();
    let err = facade
        .create(&y, &hex32(1), store.now() + 100)
        .await
        .unwrap_err();
    assert_eq!(err, FacadeError::Unauthorized);

    let after = facade.list_calls().await.unwrap();
    assert_eq!(before, after);
    assert!(calls::all_call_ids(store.as_ref()).await.unwrap().is_empty());
}

/// A call created with `now + 1` rejects proposals once time has passed it.
#[tokio::test]
async fn call_closes_when_its_time_arrives() {
    let (store, facade) = setup();
    let x = addr(10);
    facade.authorize(&addr(OWNER), &x).await.unwrap();

    facade.create(&x, &hex32(2), store.now() + 1).await.unwrap();
    store.advance_time(1);

    let err = facade
        .register_proposal(&hex32(2), &hex32(5))
        .await
        .unwrap_err();
    assert_eq!(err, FacadeError::CallClosed);
}

/// Revocation flows back to `Unregistered` and re-authorization works.
#[tokio::test]
async fn revocation_and_reauthorization() {
    let (store, facade) = setup();
    let x = addr(10);

    facade.authorize(&addr(OWNER), &x).await.unwrap();
    facade.unauthorize(&addr(OWNER), &x).await.unwrap();
    assert!(!facade.is_registered(&x.to_string()).await.unwrap());
    assert!(!facade.is_authorized(&x.to_string()).await.unwrap());

    facade.authorize(&addr(OWNER), &x).await.unwrap();
    facade
        .create(&x, &hex32(3), store.now() + 100)
        .await
        .unwrap();
}

/// Authorization state is always re-read: a creator revoked between calls
/// cannot create again even though it could a moment earlier.
#[tokio::test]
async fn no_stale_authorization_across_requests() {
    let (store, facade) = setup();
    let x = addr(10);
    facade.authorize(&addr(OWNER), &x).await.unwrap();
    facade
        .create(&x, &hex32(1), store.now() + 100)
        .await
        .unwrap();

    facade.unauthorize(&addr(OWNER), &x).await.unwrap();
    let err = facade
        .create(&x, &hex32(2), store.now() + 100)
        .await
        .unwrap_err();
    assert_eq!(err, FacadeError::Unauthorized);
}

/// The pending queue holds each address once, in arrival order, and only
/// the owner may look at it.
#[tokio::test]
async fn pending_queue_discipline() {
    let (store, facade) = setup();
    for n in [10u8, 11, 12] {
        facade.register(&addr(n)).await.unwrap();
    }
    facade.register(&addr(11)).await.unwrap();

    assert_eq!(
        facade.pending_accounts().await.unwrap(),
        vec![addr(10), addr(11), addr(12)]
    );
    let err = authorization::pending_count(store.as_ref(), &addr(10))
        .await
        .unwrap_err();
    assert_eq!(err, crate::RegistryError::Unauthorized);
}
