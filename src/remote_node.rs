//! Login/logout and the binary-request query family against a remote room
//! or repeater contact (§4.11).
//!
//! Builds on the `BinaryReqType` wire enum, decoding each typed response
//! instead of leaving callers with a raw `BinaryResponse(Vec<u8>)`.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::event::{MeshEvent, Subscription};
use crate::session::MeshCoreSession;
use crate::transport::Transport;
use crate::types::{AclEntry, DeviceStatus, MmaReading, NeighbourEntry, PublicKey, Telemetry};

/// How long `login` waits for the asynchronous `LoginResult` push after the
/// send-login RPC acks.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Extracts the raw payload from a `BinaryResponse`-shaped event.
fn binary_bytes(event: &MeshEvent) -> Vec<u8> {
    match event {
        MeshEvent::BinaryResponse(data) => data.clone(),
        _ => Vec::new(),
    }
}

/// Waits on `events` for the first event matching `pred`, or `timeout`.
async fn await_push<F>(events: &mut Subscription, timeout: Duration, pred: F) -> Result<MeshEvent>
where
    F: Fn(&MeshEvent) -> bool,
{
    tokio::select! {
        biased;
        result = async {
            loop {
                match events.recv().await {
                    Some(event) if pred(&event) => return Ok(event),
                    Some(_) => {}
                    None => return Err(Error::ChannelClosed),
                }
            }
        } => result,
        () = tokio::time::sleep(timeout) => Err(Error::RpcTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Login/logout plus the binary-request query family against a remote node.
pub struct RemoteNodeService<T> {
    session: Arc<MeshCoreSession<T>>,
}

impl<T: Transport> RemoteNodeService<T> {
    /// Creates a service bound to an existing session.
    #[must_use]
    pub const fn new(session: Arc<MeshCoreSession<T>>) -> Self {
        Self { session }
    }

    /// Logs in to a room/repeater contact, waiting for the asynchronous
    /// `LoginResult` push that follows the `sendLogin` ack.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails or no result arrives in time.
    pub async fn login(&self, destination: &PublicKey, password: &str) -> Result<MeshEvent> {
        let mut events = self.session.events();
        self.session.send_login(destination, password).await?;
        await_push(&mut events, DEFAULT_LOGIN_TIMEOUT, |event| {
            matches!(event, MeshEvent::LoginResult { .. })
        })
        .await
    }

    /// Logs out of a room/repeater contact. Fire-and-forget, per the wire
    /// protocol (no logout ack).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn logout(&self, destination: &PublicKey) -> Result<()> {
        self.session.send_logout(destination).await
    }

    /// Queries and decodes a remote node's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails or the response fails to parse.
    pub async fn query_status(&self, destination: &PublicKey) -> Result<DeviceStatus> {
        let event = self.session.request_status(destination).await?;
        let data = binary_bytes(&event);
        crate::protocol::parser::parse_device_status_binary(&data, destination.prefix())
    }

    /// Queries and decodes a remote node's telemetry.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn query_telemetry(&self, destination: &PublicKey) -> Result<Telemetry> {
        let event = self.session.request_telemetry(destination).await?;
        Ok(Telemetry::parse_lpp(&binary_bytes(&event)))
    }

    /// Queries and decodes a remote node's neighbour list. `prefix_len`
    /// must match the width the remote's firmware encodes (§9: the wire
    /// doesn't self-describe it).
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn query_neighbours(&self, destination: &PublicKey, prefix_len: usize) -> Result<Vec<NeighbourEntry>> {
        self.session.fetch_all_neighbours(destination, prefix_len).await
    }

    /// Queries and decodes a remote node's access-control list.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn query_acl(&self, destination: &PublicKey) -> Result<Vec<AclEntry>> {
        let event = self.session.request_acl(destination).await?;
        Ok(crate::protocol::parser::parse_acl_response(&binary_bytes(&event)))
    }

    /// Queries and decodes a remote node's min/max/avg telemetry summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn query_mma(&self, destination: &PublicKey) -> Result<Vec<MmaReading>> {
        let event = self.session.request_mma(destination).await?;
        Ok(crate::protocol::parser::parse_mma_response(&binary_bytes(&event)))
    }

    /// Pings a remote node with a binary keep-alive. The device doesn't ack
    /// this with a response frame; liveness is observed via the later
    /// `keepAliveAck` push on the session's event stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn keep_alive(&self, destination: &PublicKey) -> Result<()> {
        self.session.send_keep_alive(destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDispatcher;
    use crate::transport::ConnectionState;
    use bytes::Bytes;
    use std::future::Future;
    use std::pin::Pin;
    use tokio::sync::Mutex;

    struct MockTransport;

    impl Transport for MockTransport {
        fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
        fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
        fn send(&mut self, _data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
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
    async fn test_login_times_out_without_login_result() {
        let (dispatcher, _rx) = EventDispatcher::new(16);
        let transport = Arc::new(Mutex::new(MockTransport));
        let session = Arc::new(MeshCoreSession::new(transport, dispatcher).with_timeout(Duration::from_millis(20)));
        let remote = RemoteNodeService::new(session);

        let destination = PublicKey::from_bytes(&[3u8; 32]);
        let result = remote.login(&destination, "hunter2").await;
        assert!(matches!(result, Err(Error::RpcTimeout { .. })));
    }

    #[tokio::test]
    async fn test_login_resolves_on_login_result_push() {
        let (dispatcher, _rx) = EventDispatcher::new(16);
        let transport = Arc::new(Mutex::new(MockTransport));
        let session = Arc::new(MeshCoreSession::new(transport, dispatcher.clone()).with_timeout(Duration::from_millis(200)));
        let remote = RemoteNodeService::new(session);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            dispatcher.dispatch(MeshEvent::MessageSent {
                expected_ack: 0,
                timeout_ms: 0,
            });
            dispatcher.dispatch(MeshEvent::LoginResult {
                success: true,
                perm_level: Some(1),
                session_id: Some(42),
            });
        });

        let destination = PublicKey::from_bytes(&[3u8; 32]);
        let result = remote.login(&destination, "hunter2").await.unwrap();
        assert!(matches!(result, MeshEvent::LoginResult { success: true, .. }));
    }
}
