//! P8: retry semantics against a transport that never ACKs.

mod common;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::Bytes;
use common::MockTransport;
use meshcore::{Contact, ContactFlags, ContactType, EventDispatcher, MeshEvent, MeshCoreSession, MessageService, PublicKey};
use tokio::sync::Mutex;

fn flood_contact() -> Contact {
    Contact {
        public_key: PublicKey::from_bytes(&[9u8; 32]),
        device_type: ContactType::Node,
        flags: ContactFlags::NONE,
        out_path_len: -1,
        out_path: Bytes::new(),
        name: "Never-acks".into(),
        last_advert: 0,
        latitude: None,
        longitude: None,
        last_modified: 0,
    }
}

/// Reacts to every new frame the mock transport records by dispatching the
/// `MessageSent` ack the real device would send immediately, so the retry
/// loop always gets past the "did the write go out" step and into waiting
/// for an application ACK that never arrives.
async fn drive_send_acks(sent: Arc<StdMutex<Vec<Bytes>>>, dispatcher: EventDispatcher) {
    let mut seen = 0usize;
    let mut next_ack = 1u32;
    loop {
        tokio::time::sleep(Duration::from_millis(1)).await;
        let len = sent.lock().unwrap().len();
        if len > seen {
            seen = len;
            dispatcher.dispatch(MeshEvent::MessageSent {
                expected_ack: next_ack,
                timeout_ms: 0,
            });
            next_ack += 1;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn retry_exhausts_all_attempts_and_balances_events() {
    let (dispatcher, _rx) = EventDispatcher::new(64);
    let transport = MockTransport::new();
    let sent = transport.sent.clone();
    let transport = Arc::new(Mutex::new(transport));
    let session = Arc::new(MeshCoreSession::new(transport, dispatcher.clone()));
    let service = MessageService::new(session, dispatcher.clone());

    let driver = tokio::spawn(drive_send_acks(sent.clone(), dispatcher.clone()));

    let mut recorded = dispatcher.subscribe(None);
    let recorder = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = recorded.recv().await {
            let stop = matches!(event, MeshEvent::MessageFailed { .. });
            events.push(event);
            if stop {
                break;
            }
        }
        events
    });

    let contact = flood_contact();
    let status = service
        .send_message_with_retry(&contact.public_key, &contact, "hello", 1)
        .await
        .unwrap();

    driver.abort();
    let events = recorder.await.unwrap();

    assert_eq!(status, meshcore::DeliveryStatus::Failed);
    assert_eq!(sent.lock().unwrap().len(), 4, "exactly maxAttempts sends");

    let retry_count = events.iter().filter(|e| matches!(e, MeshEvent::RetryStatus { .. })).count();
    assert_eq!(retry_count, 3, "retryStatus fires maxAttempts-1 times");

    let routing_changed_count = events
        .iter()
        .filter(|e| matches!(e, MeshEvent::RoutingChanged { is_flood: true, .. }))
        .count();
    assert_eq!(routing_changed_count, 1, "routingChanged(flood) fires exactly once at the boundary");

    let failed_count = events.iter().filter(|e| matches!(e, MeshEvent::MessageFailed { .. })).count();
    assert_eq!(failed_count, 1);
}
