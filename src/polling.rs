//! Message drain loop with push-triggered re-entry (§4.12).
//!
//! Drains pending messages via [`SyncCoordinator::sync_messages`] once
//! after connect, then listens on the broadcast event stream and re-enters
//! the drain on `MSG_WAITING` pushes, routes `NEW_ADVERT` to contact
//! discovery, and tracks remote-node liveness from `keepAliveAck` pushes —
//! the same push-dispatch idiom `client.rs::process_frame` uses.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::event::{EventDispatcher, MeshEvent};
use crate::sync::SyncCoordinator;
use crate::transport::Transport;

/// Drains messages on connect and on `MSG_WAITING`/`NEW_ADVERT` pushes.
pub struct MessagePollingService<T> {
    sync: Arc<SyncCoordinator<T>>,
    dispatcher: EventDispatcher,
    last_keep_alive: Mutex<Option<Instant>>,
}

impl<T: Transport + 'static> MessagePollingService<T> {
    /// Creates a polling service over an existing sync coordinator.
    #[must_use]
    pub fn new(sync: Arc<SyncCoordinator<T>>, dispatcher: EventDispatcher) -> Self {
        Self {
            sync,
            dispatcher,
            last_keep_alive: Mutex::new(None),
        }
    }

    /// Instant of the most recently observed `keepAliveAck`, if any.
    pub async fn last_keep_alive(&self) -> Option<Instant> {
        *self.last_keep_alive.lock().await
    }

    /// Runs the initial drain, then loops on the broadcast stream forever,
    /// re-entering the drain and routing discovery/liveness pushes until
    /// the event channel closes (transport shutdown).
    pub async fn run(&self) {
        if let Err(err) = self.sync.sync_messages().await {
            tracing::warn!("initial message drain failed: {err}");
        }

        let mut events = self.dispatcher.subscribe(None);
        loop {
            match events.recv().await {
                Some(MeshEvent::MessagesWaiting) => {
                    if let Err(err) = self.sync.sync_messages().await {
                        tracing::warn!("re-entrant message drain failed: {err}");
                    }
                }
                Some(MeshEvent::NewContactAdvert(contact)) => {
                    tracing::debug!("contact discovery advert from {}", contact.public_key);
                }
                Some(MeshEvent::KeepAliveAck { timestamp }) => {
                    tracing::trace!("keep-alive ack at {timestamp}");
                    *self.last_keep_alive.lock().await = Some(Instant::now());
                }
                Some(_) => {}
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryStore, PersistenceStore};
    use crate::session::MeshCoreSession;
    use crate::transport::ConnectionState;
    use bytes::Bytes;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    struct MockTransport;

    impl Transport for MockTransport {
        fn connect(&mut self) -> Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
        fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
        fn send(&mut self, _data: Bytes) -> Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn connection_state(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
            tokio::sync::watch::channel(ConnectionState::Ready).1
        }
    }

    #[tokio::test]
    async fn test_run_tracks_keep_alive_and_then_stops_on_channel_close() {
        let (dispatcher, _rx) = EventDispatcher::new(16);
        let transport = Arc::new(Mutex::new(MockTransport));
        let session = Arc::new(MeshCoreSession::new(transport, dispatcher.clone()).with_timeout(Duration::from_millis(50)));
        let store: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::new());
        let sync = Arc::new(SyncCoordinator::new(session, store, dispatcher.clone()));
        let polling = Arc::new(MessagePollingService::new(sync, dispatcher.clone()));

        let runner = polling.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        // Initial drain needs a NoMoreMessages push to resolve get_message().
        dispatcher.dispatch(MeshEvent::NoMoreMessages);
        tokio::time::sleep(Duration::from_millis(10)).await;
        dispatcher.dispatch(MeshEvent::KeepAliveAck { timestamp: 123 });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(polling.last_keep_alive().await.is_some());
        drop(dispatcher);
        let _ = tokio::time::timeout(Duration::from_millis(200), handle).await;
    }
}
