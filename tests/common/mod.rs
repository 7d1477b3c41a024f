//! Shared mock transport for integration tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};

use bytes::Bytes;
use meshcore::transport::{ConnectionState, Transport};
use meshcore::Result;
use tokio::sync::watch;

/// A `Transport` that records every frame it is asked to send and never
/// produces a response on its own; tests drive responses by dispatching
/// events directly on the `EventDispatcher` the session/service was built
/// with.
pub struct MockTransport {
    pub sent: Arc<StdMutex<Vec<Bytes>>>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Ready);
        Self {
            sent: Arc::new(StdMutex::new(Vec::new())),
            state_tx,
            state_rx,
        }
    }

    #[must_use]
    pub fn sent_frames(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let _ = self.state_tx.send(ConnectionState::Ready);
        Box::pin(async { Ok(()) })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let _ = self.state_tx.send(ConnectionState::Idle);
        Box::pin(async { Ok(()) })
    }

    fn send(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.sent.lock().unwrap().push(data);
        Box::pin(async { Ok(()) })
    }

    fn is_connected(&self) -> bool {
        *self.state_rx.borrow() == ConnectionState::Ready
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}
