//! `MeshCoreSession`: single-pending-request RPC engine over a [`Transport`].
//!
//! Subscribes before sending, then races the matching response against a
//! timeout, and enforces exactly one concurrent RPC: every [`Self::send`]
//! call takes an internal request lock before writing to the transport, so
//! a second caller's write waits until the first caller's wait (success,
//! error, or timeout) has resolved. This is what gives the strict FIFO /
//! single-pending-request guarantee the higher-level services rely on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::event::{EventDispatcher, EventFilter, MeshEvent, Subscription};
use crate::protocol::{PacketType, builder, command::BinaryReqType, parser};
use crate::transport::Transport;
use crate::types::PublicKey;

/// Default timeout for a single request/response RPC.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Serializes request/response RPCs over a transport and exposes the full
/// broadcast event stream.
pub struct MeshCoreSession<T> {
    transport: Arc<Mutex<T>>,
    dispatcher: EventDispatcher,
    request_lock: Mutex<()>,
    default_timeout: Duration,
    binary_tag: AtomicU32,
}

impl<T: Transport> MeshCoreSession<T> {
    /// Creates a new session over the given transport and event dispatcher.
    #[must_use]
    pub fn new(transport: Arc<Mutex<T>>, dispatcher: EventDispatcher) -> Self {
        Self {
            transport,
            dispatcher,
            request_lock: Mutex::new(()),
            default_timeout: DEFAULT_RPC_TIMEOUT,
            binary_tag: AtomicU32::new(1),
        }
    }

    /// Overrides the default RPC timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn next_tag(&self) -> u32 {
        self.binary_tag.fetch_add(1, Ordering::SeqCst)
    }

    /// Sends `appStart` and awaits `SelfInfo`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTimeout`] if `SelfInfo` does not arrive in
    /// time, or [`Error::DeviceError`] if the device rejects the handshake.
    pub async fn start(&self) -> Result<MeshEvent> {
        self.send_timeout(
            builder::app_start(builder::DEFAULT_CLIENT_ID),
            &[PacketType::SelfInfo, PacketType::Error],
            self.default_timeout,
            Error::HandshakeTimeout {
                timeout_ms: self.default_timeout.as_millis() as u64,
            },
        )
        .await
    }

    /// The exclusive send/await-response primitive (§4.8).
    ///
    /// Takes the request lock, subscribes before writing (race-avoidance:
    /// a push that arrives immediately after the write must still be seen),
    /// writes the frame, then awaits the first event whose packet type is
    /// in `expect`, a `deviceError`, or the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RpcTimeout`] on timeout, [`Error::DeviceError`] if
    /// the device responds with an `ERROR` frame, or a transport error if
    /// the write fails.
    pub async fn send(&self, frame: Bytes, expect: &[PacketType], timeout: Duration) -> Result<MeshEvent> {
        self.send_timeout(
            frame,
            expect,
            timeout,
            Error::RpcTimeout {
                timeout_ms: timeout.as_millis() as u64,
            },
        )
        .await
    }

    async fn send_timeout(
        &self,
        frame: Bytes,
        expect: &[PacketType],
        timeout: Duration,
        timeout_err: Error,
    ) -> Result<MeshEvent> {
        let mut expect_with_error = expect.to_vec();
        expect_with_error.push(PacketType::Error);
        let filter = EventFilter::packet_types(expect_with_error);

        // Hold the lock for the entire send+wait so only one RPC is ever
        // in flight; FIFO order follows tokio::sync::Mutex's wait queue.
        let _guard = self.request_lock.lock().await;
        let mut subscription = self.dispatcher.subscribe(None);

        {
            let mut transport = self.transport.lock().await;
            transport.send(frame).await?;
        }

        let result = tokio::select! {
            biased;
            result = Self::wait_matching(&mut subscription, &filter) => result,
            () = tokio::time::sleep(timeout) => Err(timeout_err),
        }?;

        if let MeshEvent::Error { message } = &result {
            if let Ok(code) = message.parse::<u8>() {
                return Err(Error::DeviceError { code });
            }
        }
        Ok(result)
    }

    async fn wait_matching(subscription: &mut Subscription, filter: &EventFilter) -> Result<MeshEvent> {
        loop {
            match subscription.recv().await {
                Some(event) if filter.matches(&event) => return Ok(event),
                Some(_) => {}
                None => return Err(Error::ChannelClosed),
            }
        }
    }

    /// The full broadcast stream of inbound events, including those that
    /// also satisfied a pending request.
    #[must_use]
    pub fn events(&self) -> Subscription {
        self.dispatcher.subscribe(None)
    }

    /// Issues a neighbours request to `destination` and parses the
    /// response using the caller-provided prefix width (§9: the wire
    /// doesn't self-describe prefix width).
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn fetch_all_neighbours(
        &self,
        destination: &PublicKey,
        prefix_len: usize,
    ) -> Result<Vec<crate::types::NeighbourEntry>> {
        let event = self.binary_request(destination, BinaryReqType::Neighbours, &[]).await?;
        let data = binary_response_bytes(&event);
        Ok(parser::parse_neighbours_response(&data, prefix_len))
    }

    /// Issues a binary request and waits for the later `BinaryResponse`
    /// push. The immediate response to the request frame is only a
    /// `MsgSent` ack (the send succeeded); the actual payload arrives
    /// asynchronously, so this subscribes before sending (race-avoidance,
    /// as in [`Self::send_login`]) and awaits the push separately.
    ///
    /// # Errors
    ///
    /// Returns an error if the send ack fails or no push arrives in time.
    async fn binary_request(
        &self,
        destination: &PublicKey,
        request_type: BinaryReqType,
        extra: &[u8],
    ) -> Result<MeshEvent> {
        use bytes::{BufMut, BytesMut};
        let mut buf = BytesMut::with_capacity(34 + extra.len());
        buf.put_u8(crate::protocol::CommandOpcode::BinaryReq as u8);
        buf.put_slice(destination.as_bytes());
        buf.put_u8(request_type as u8);
        buf.put_slice(extra);

        let mut events = self.events();
        self.send(buf.freeze(), &[PacketType::MsgSent], self.default_timeout).await?;
        Self::await_push(&mut events, self.default_timeout, |event| {
            matches!(event, MeshEvent::BinaryResponse(_))
        })
        .await
    }

    /// Waits on `subscription` for the first event matching `pred`, or `timeout`.
    async fn await_push<F>(subscription: &mut Subscription, timeout: Duration, pred: F) -> Result<MeshEvent>
    where
        F: Fn(&MeshEvent) -> bool,
    {
        tokio::select! {
            biased;
            result = async {
                loop {
                    match subscription.recv().await {
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

    /// Gets channel information at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_channel(&self, index: u8) -> Result<MeshEvent> {
        self.send(
            builder::get_channel(index),
            &[PacketType::ChannelInfo],
            self.default_timeout,
        )
        .await
    }

    /// Sets channel configuration at `index`. Fire-and-forget; use
    /// `get_channel` to verify.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn set_channel(&self, index: u8, name: &str, secret: &[u8; 16]) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.send(builder::set_channel(index, name, secret)).await
    }

    /// Requests the contact list; contacts arrive as push events ending
    /// with `ContactListEnd`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_contacts(&self, since: u32) -> Result<MeshEvent> {
        self.send(
            builder::get_contacts(since),
            &[PacketType::ContactEnd],
            self.default_timeout,
        )
        .await
    }

    /// Removes a contact by public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn remove_contact(&self, public_key: &PublicKey) -> Result<MeshEvent> {
        self.send(
            builder::remove_contact(public_key.as_bytes()),
            &[PacketType::Ok],
            self.default_timeout,
        )
        .await
    }

    /// Resets the routing path for a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn reset_path(&self, public_key: &PublicKey) -> Result<MeshEvent> {
        self.send(
            builder::reset_path(public_key.as_bytes()),
            &[PacketType::Ok],
            self.default_timeout,
        )
        .await
    }

    /// Issues a path-discovery request to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_path_discovery(&self, destination: &PublicKey) -> Result<MeshEvent> {
        self.send(
            builder::send_path_discovery(destination.as_bytes()),
            &[PacketType::MsgSent],
            self.default_timeout,
        )
        .await
    }

    /// Sends a private message to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_message(
        &self,
        destination: &PublicKey,
        text: &str,
        timestamp: u32,
        attempt: u8,
    ) -> Result<MeshEvent> {
        self.send(
            builder::send_message(&destination.prefix(), text, timestamp, attempt),
            &[PacketType::MsgSent],
            self.default_timeout,
        )
        .await
    }

    /// Sends a message to a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_channel_message(&self, channel: u8, text: &str, timestamp: u32) -> Result<MeshEvent> {
        self.send(
            builder::send_channel_message(channel, text, timestamp),
            &[PacketType::Ok],
            self.default_timeout,
        )
        .await
    }

    /// Sends a CLI command string to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_command(&self, destination: &PublicKey, command: &str, timestamp: u32) -> Result<MeshEvent> {
        self.send(
            builder::send_command(&destination.prefix(), command, timestamp, 0),
            &[PacketType::MsgSent],
            self.default_timeout,
        )
        .await
    }

    /// Logs in to a room/repeater contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_login(&self, destination: &PublicKey, password: &str) -> Result<MeshEvent> {
        self.send(
            builder::send_login(destination.as_bytes(), password),
            &[PacketType::MsgSent],
            self.default_timeout,
        )
        .await
    }

    /// Logs out of a room/repeater contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn send_logout(&self, destination: &PublicKey) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.send(builder::send_logout(destination.as_bytes())).await
    }

    /// Requests the remote status of a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_status_request(&self, destination: &PublicKey) -> Result<MeshEvent> {
        self.send(
            builder::send_status_request(destination.as_bytes()),
            &[PacketType::MsgSent],
            self.default_timeout,
        )
        .await
    }

    /// Issues a binary status request, parsing the `StatusResponse` once
    /// the push arrives on the event stream (the ack only confirms send).
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn request_status(&self, destination: &PublicKey) -> Result<MeshEvent> {
        self.binary_request(destination, BinaryReqType::Status, &[]).await
    }

    /// Issues a binary telemetry request.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn request_telemetry(&self, destination: &PublicKey) -> Result<MeshEvent> {
        self.binary_request(destination, BinaryReqType::Telemetry, &[]).await
    }

    /// Issues a binary access-control-list request.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn request_acl(&self, destination: &PublicKey) -> Result<MeshEvent> {
        self.binary_request(destination, BinaryReqType::Acl, &[]).await
    }

    /// Issues a binary min/max/avg request.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn request_mma(&self, destination: &PublicKey) -> Result<MeshEvent> {
        self.binary_request(destination, BinaryReqType::Mma, &[]).await
    }

    /// Sends a binary keep-alive ping; the device does not ack a keep-alive
    /// with a response frame, so this is fire-and-forget (§4.11).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn send_keep_alive(&self, destination: &PublicKey) -> Result<()> {
        use bytes::{BufMut, BytesMut};
        let mut buf = BytesMut::with_capacity(34);
        buf.put_u8(crate::protocol::CommandOpcode::BinaryReq as u8);
        buf.put_slice(destination.as_bytes());
        buf.put_u8(BinaryReqType::KeepAlive as u8);
        let mut transport = self.transport.lock().await;
        transport.send(buf.freeze()).await
    }

    /// Sets the device clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn set_time(&self, timestamp: u32) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.send(builder::set_time(timestamp)).await
    }

    /// Gets the device clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_time(&self) -> Result<MeshEvent> {
        self.send(
            builder::get_time(),
            &[PacketType::CurrentTime],
            self.default_timeout,
        )
        .await
    }

    /// Sets the device name.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.send(builder::set_name(name)).await
    }

    /// Sets the device location.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn set_coordinates(&self, latitude: f64, longitude: f64) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.send(builder::set_coordinates(latitude, longitude)).await
    }

    /// Sets radio parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn set_radio(&self, freq_mhz: f64, bw_khz: f64, spreading_factor: u8, coding_rate: u8) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport
            .send(builder::set_radio(freq_mhz, bw_khz, spreading_factor, coding_rate))
            .await
    }

    /// Broadcasts an advertisement.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_advertisement(&self, flood: bool) -> Result<MeshEvent> {
        self.send(
            builder::send_advertisement(flood),
            &[PacketType::Ok],
            self.default_timeout,
        )
        .await
    }

    /// Reboots the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn reboot(&self) -> Result<MeshEvent> {
        self.send(builder::reboot(), &[PacketType::Ok], self.default_timeout).await
    }

    /// Queries device info.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn device_query(&self) -> Result<MeshEvent> {
        self.send(
            builder::device_query(),
            &[PacketType::DeviceInfo],
            self.default_timeout,
        )
        .await
    }

    /// Gets battery status.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_battery(&self) -> Result<MeshEvent> {
        self.send(builder::get_battery(), &[PacketType::Battery], self.default_timeout)
            .await
    }

    /// Issues a network trace with an auto-generated tag, expecting a
    /// `TraceData` push in response.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_trace(&self, auth_code: u32, flags: u8) -> Result<MeshEvent> {
        self.send(
            builder::send_trace(self.next_tag(), auth_code, flags),
            &[PacketType::TraceData],
            self.default_timeout,
        )
        .await
    }

    /// Requests a statistics snapshot of the given kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_stats(&self, stats_type: crate::protocol::StatsType) -> Result<MeshEvent> {
        use bytes::Bytes;
        self.send(
            Bytes::from(vec![crate::protocol::CommandOpcode::GetStats as u8, stats_type as u8]),
            &[PacketType::Stats],
            self.default_timeout,
        )
        .await
    }

    /// Gets this device's own telemetry reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_self_telemetry(&self) -> Result<MeshEvent> {
        use bytes::Bytes;
        self.send(
            Bytes::from_static(&[crate::protocol::CommandOpcode::Telemetry as u8, 0x00, 0x00, 0x00]),
            &[PacketType::TelemetryResponse],
            self.default_timeout,
        )
        .await
    }

    /// Requests telemetry from a remote contact over the non-binary path
    /// (the response arrives as an async `TelemetryResponse` push).
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_telemetry_request(&self, destination: &PublicKey) -> Result<MeshEvent> {
        use bytes::{BufMut, BytesMut};
        let mut buf = BytesMut::with_capacity(36);
        buf.put_u8(crate::protocol::CommandOpcode::Telemetry as u8);
        buf.put_u8(0x00);
        buf.put_u8(0x00);
        buf.put_u8(0x00);
        buf.put_slice(destination.as_bytes());
        self.send(buf.freeze(), &[PacketType::MsgSent], self.default_timeout).await
    }

    /// Fetches the next pending message (§4.12 drains via this in a loop).
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_message(&self) -> Result<MeshEvent> {
        self.send(
            builder::get_message(),
            &[
                PacketType::ContactMsgRecv,
                PacketType::ContactMsgRecvV3,
                PacketType::ChannelMsgRecv,
                PacketType::ChannelMsgRecvV3,
                PacketType::NoMoreMsgs,
            ],
            self.default_timeout,
        )
        .await
    }
}

/// Extracts the raw payload from a `BinaryResponse`-shaped event, or an
/// empty slice if the event carries no binary payload.
fn binary_response_bytes(event: &MeshEvent) -> Vec<u8> {
    match event {
        MeshEvent::BinaryResponse(data) => data.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectionState;
    use std::future::Future;
    use std::pin::Pin;

    struct MockTransport {
        connected: bool,
        sent: Vec<Bytes>,
    }

    impl Transport for MockTransport {
        fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.connected = true;
                Ok(())
            })
        }
        fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.connected = false;
                Ok(())
            })
        }
        fn send(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            self.sent.push(data);
            Box::pin(async move { Ok(()) })
        }
        fn is_connected(&self) -> bool {
            self.connected
        }
        fn connection_state(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
            tokio::sync::watch::channel(ConnectionState::Ready).1
        }
    }

    #[tokio::test]
    async fn test_start_times_out_without_self_info() {
        let transport = Arc::new(Mutex::new(MockTransport {
            connected: true,
            sent: Vec::new(),
        }));
        let (dispatcher, _rx) = EventDispatcher::new(16);
        let session = MeshCoreSession::new(transport, dispatcher).with_timeout(Duration::from_millis(20));

        let result = session.start().await;
        assert!(matches!(result, Err(Error::HandshakeTimeout { .. })));
    }

    #[tokio::test]
    async fn test_send_resolves_on_matching_event() {
        let transport = Arc::new(Mutex::new(MockTransport {
            connected: true,
            sent: Vec::new(),
        }));
        let (dispatcher, _rx) = EventDispatcher::new(16);
        let session = MeshCoreSession::new(transport, dispatcher.clone()).with_timeout(Duration::from_secs(1));

        let dispatch_task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            dispatcher.dispatch(MeshEvent::Ok);
        });

        let result = session
            .send(Bytes::from_static(&[0x07]), &[PacketType::Ok], Duration::from_millis(500))
            .await
            .unwrap();
        assert!(matches!(result, MeshEvent::Ok));
        dispatch_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_converts_error_event_to_device_error() {
        let transport = Arc::new(Mutex::new(MockTransport {
            connected: true,
            sent: Vec::new(),
        }));
        let (dispatcher, _rx) = EventDispatcher::new(16);
        let session = MeshCoreSession::new(transport, dispatcher.clone()).with_timeout(Duration::from_secs(1));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            dispatcher.dispatch(MeshEvent::Error { message: "10".into() });
        });

        let result = session
            .send(Bytes::from_static(&[0x1B]), &[PacketType::StatusResponse], Duration::from_millis(500))
            .await;
        assert!(matches!(result, Err(Error::DeviceError { code: 10 })));
    }

    #[tokio::test]
    async fn test_send_serializes_concurrent_callers() {
        let transport = Arc::new(Mutex::new(MockTransport {
            connected: true,
            sent: Vec::new(),
        }));
        let (dispatcher, _rx) = EventDispatcher::new(16);
        let session = Arc::new(MeshCoreSession::new(transport, dispatcher.clone()).with_timeout(Duration::from_millis(50)));

        let s1 = session.clone();
        let s2 = session.clone();
        let a = tokio::spawn(async move {
            s1.send(Bytes::from_static(&[0x01]), &[PacketType::SelfInfo], Duration::from_millis(30))
                .await
        });
        let b = tokio::spawn(async move {
            s2.send(Bytes::from_static(&[0x02]), &[PacketType::Ok], Duration::from_millis(30))
                .await
        });

        let (ra, rb) = tokio::join!(a, b);
        assert!(matches!(ra.unwrap(), Err(Error::RpcTimeout { .. })));
        assert!(matches!(rb.unwrap(), Err(Error::RpcTimeout { .. })));
    }
}
