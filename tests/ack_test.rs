//! P9: an ACK matching `expectedAck` stops the retry loop immediately.

mod common;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::Bytes;
use common::MockTransport;
use meshcore::{
    Acknowledgment, Contact, ContactFlags, ContactType, DeliveryStatus, EventDispatcher, MeshCoreSession, MeshEvent,
    MessageService, PublicKey,
};
use tokio::sync::Mutex;

fn direct_contact() -> Contact {
    Contact {
        public_key: PublicKey::from_bytes(&[3u8; 32]),
        device_type: ContactType::Node,
        flags: ContactFlags::NONE,
        out_path_len: 0,
        out_path: Bytes::new(),
        name: "Direct".into(),
        last_advert: 0,
        latitude: None,
        longitude: None,
        last_modified: 0,
    }
}

/// Mimics the device: acks the write, then immediately acks the message
/// itself, on the very first attempt.
async fn drive_single_ack(sent: Arc<StdMutex<Vec<Bytes>>>, dispatcher: EventDispatcher) {
    loop {
        tokio::time::sleep(Duration::from_millis(1)).await;
        if !sent.lock().unwrap().is_empty() {
            dispatcher.dispatch(MeshEvent::MessageSent {
                expected_ack: 42,
                timeout_ms: 0,
            });
            dispatcher.dispatch(MeshEvent::Ack(Acknowledgment { code: 42 }));
            return;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn ack_stops_retry_loop_with_single_attempt() {
    let (dispatcher, _rx) = EventDispatcher::new(64);
    let transport = MockTransport::new();
    let sent = transport.sent.clone();
    let transport = Arc::new(Mutex::new(transport));
    let session = Arc::new(MeshCoreSession::new(transport, dispatcher.clone()));
    let service = MessageService::new(session, dispatcher.clone());

    let mut recorded = dispatcher.subscribe(None);
    let recorder = tokio::spawn(async move {
        let mut confirmations = Vec::new();
        while let Some(event) = recorded.recv().await {
            if matches!(event, MeshEvent::AckConfirmation { .. }) {
                confirmations.push(event);
                break;
            }
        }
        confirmations
    });

    tokio::spawn(drive_single_ack(sent.clone(), dispatcher.clone()));

    let contact = direct_contact();
    let status = service
        .send_message_with_retry(&contact.public_key, &contact, "hi", 7)
        .await
        .unwrap();

    let confirmations = recorder.await.unwrap();

    assert_eq!(status, DeliveryStatus::Delivered);
    assert_eq!(sent.lock().unwrap().len(), 1, "no further attempts after the ack arrives");
    assert_eq!(confirmations.len(), 1, "ackConfirmation fires exactly once");
    assert!(matches!(confirmations[0], MeshEvent::AckConfirmation { ack_code: 42, .. }));
}
