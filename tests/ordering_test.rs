//! P11: for any interleaving of RPCs A then B, A completes before B even
//! sends its frame — the session's single-pending-request lock guarantees
//! this, not just response ordering.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::MockTransport;
use meshcore::{EventDispatcher, MeshCoreSession, MeshEvent, PacketType};
use tokio::sync::Mutex;

#[tokio::test]
async fn second_rpc_does_not_send_until_first_completes() {
    let (dispatcher, _rx) = EventDispatcher::new(16);
    let transport = MockTransport::new();
    let sent = transport.sent.clone();
    let transport = Arc::new(Mutex::new(transport));
    let session = Arc::new(MeshCoreSession::new(transport, dispatcher.clone()));

    let session_a = session.clone();
    let task_a = tokio::spawn(async move {
        session_a
            .send(bytes::Bytes::from_static(&[0x01]), &[PacketType::Ok], Duration::from_secs(5))
            .await
    });

    // Let A acquire the lock, subscribe, and write its frame before B exists.
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert_eq!(sent.lock().unwrap().len(), 1, "only A has sent so far");

    let session_b = session.clone();
    let task_b = tokio::spawn(async move {
        session_b
            .send(bytes::Bytes::from_static(&[0x02]), &[PacketType::Ok], Duration::from_secs(5))
            .await
    });

    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert_eq!(sent.lock().unwrap().len(), 1, "B is still blocked on the request lock held by A");

    dispatcher.dispatch(MeshEvent::Ok);
    let result_a = task_a.await.unwrap();
    assert!(matches!(result_a, Ok(MeshEvent::Ok)));

    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert_eq!(sent.lock().unwrap().len(), 2, "B only sends once A has fully completed");

    dispatcher.dispatch(MeshEvent::Ok);
    let result_b = task_b.await.unwrap();
    assert!(matches!(result_b, Ok(MeshEvent::Ok)));
}
