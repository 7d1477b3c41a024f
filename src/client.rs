//! Top-level [`MeshCore`] facade wiring the transport, [`MeshCoreSession`],
//! and the higher-level services ([`MessageService`], [`SyncCoordinator`],
//! [`RemoteNodeService`], [`MessagePollingService`]) into one handle.
//!
//! Earlier revisions of this client drove request/response RPCs and
//! contact/self-info caching directly inline in `process_frame`. This
//! keeps the same read-loop/process-task shape but delegates
//! request/response RPCs to `session`, retry/ACK to `message_service`,
//! post-connect sync to `sync`, and remote-node queries to `remote_node`.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::event::{EventDispatcher, MeshEvent, StatsData, Subscription};
use crate::message_service::{DeliveryStatus, MessageService};
use crate::persistence::{InMemoryStore, PersistenceStore};
use crate::polling::MessagePollingService;
use crate::protocol::{
    PacketType, StatsType, parse_battery, parse_channel, parse_channel_message, parse_contact,
    parse_contact_message, parse_core_stats, parse_device_info, parse_device_status,
    parse_packet_stats, parse_radio_stats, parse_self_info,
};
use crate::remote_node::RemoteNodeService;
use crate::session::MeshCoreSession;
use crate::sync::SyncCoordinator;
use crate::transport::{BleTransport, TcpTransport, Transport};
use crate::types::{
    Acknowledgment, BatteryStatus, Channel, Contact, ContactFlags, ContactType, CoreStats,
    DeviceInfo, PacketStats, PublicKey, RadioStats, SelfInfo, Telemetry,
};

/// Gets the current Unix timestamp as a u32.
fn current_timestamp() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// A placeholder contact used when the retry engine needs a path length
/// for a destination that hasn't been synced into the contact cache yet.
/// `out_path_len = -1` makes `message_service::adaptive_direct_timeout`
/// fall back to its floor, which is the safe default for an unknown route.
fn unknown_contact(public_key: PublicKey) -> Contact {
    Contact {
        public_key,
        device_type: ContactType::Unknown,
        flags: ContactFlags::NONE,
        out_path_len: -1,
        out_path: Bytes::new(),
        name: String::new(),
        last_advert: 0,
        latitude: None,
        longitude: None,
        last_modified: 0,
    }
}

/// Client for communicating with a `MeshCore` device.
pub struct MeshCore<T> {
    transport: Arc<Mutex<T>>,
    dispatcher: EventDispatcher,
    session: Arc<MeshCoreSession<T>>,
    message_service: Arc<MessageService<T>>,
    remote_node: Arc<RemoteNodeService<T>>,
    sync: Arc<SyncCoordinator<T>>,
    polling: Arc<MessagePollingService<T>>,

    self_info: Arc<RwLock<Option<SelfInfo>>>,
    contacts: Arc<RwLock<HashMap<PublicKey, Contact>>>,

    read_task: Option<JoinHandle<()>>,
    process_task: Option<JoinHandle<()>>,
    sync_task: Option<JoinHandle<()>>,
    polling_task: Option<JoinHandle<()>>,
}

impl MeshCore<TcpTransport> {
    /// Creates a new client for a TCP-bridged device.
    #[must_use]
    pub fn tcp(config: crate::transport::tcp::TcpConfig) -> Self {
        let transport = TcpTransport::new(config);
        Self::new(transport)
    }
}

impl MeshCore<BleTransport> {
    /// Creates a new client for a BLE-connected device.
    #[must_use]
    pub fn ble(peripheral: btleplug::platform::Peripheral, config: crate::transport::ble::BleConfig) -> Self {
        let transport = BleTransport::new(peripheral, config);
        Self::new(transport)
    }
}

impl<T: Transport + 'static> MeshCore<T> {
    /// Creates a new client with the given transport and a fresh
    /// in-memory persistence store.
    fn new(transport: T) -> Self {
        let (dispatcher, _event_rx) = EventDispatcher::new(256);
        let transport = Arc::new(Mutex::new(transport));

        let session = Arc::new(MeshCoreSession::new(Arc::clone(&transport), dispatcher.clone()));
        let message_service = Arc::new(MessageService::new(Arc::clone(&session), dispatcher.clone()));
        let remote_node = Arc::new(RemoteNodeService::new(Arc::clone(&session)));
        let store: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::new());
        let sync = Arc::new(SyncCoordinator::new(Arc::clone(&session), store, dispatcher.clone()));
        let polling = Arc::new(MessagePollingService::new(Arc::clone(&sync), dispatcher.clone()));

        Self {
            transport,
            dispatcher,
            session,
            message_service,
            remote_node,
            sync,
            polling,
            self_info: Arc::new(RwLock::new(None)),
            contacts: Arc::new(RwLock::new(HashMap::new())),
            read_task: None,
            process_task: None,
            sync_task: None,
            polling_task: None,
        }
    }

    /// The session, for raw RPCs not covered by a high-level method.
    #[must_use]
    pub fn session(&self) -> &Arc<MeshCoreSession<T>> {
        &self.session
    }

    /// The retry/ACK message engine (§4.9).
    #[must_use]
    pub fn message_service(&self) -> &Arc<MessageService<T>> {
        &self.message_service
    }

    /// Login/logout and binary-response queries against a remote node (§4.11).
    #[must_use]
    pub fn remote_node(&self) -> &Arc<RemoteNodeService<T>> {
        &self.remote_node
    }

    /// The three-phase sync coordinator (§4.10).
    #[must_use]
    pub fn sync_coordinator(&self) -> &Arc<SyncCoordinator<T>> {
        &self.sync
    }

    /// Connects to the device, starts the read loop, performs the
    /// `appStart` handshake, and kicks off the background sync and
    /// polling services.
    ///
    /// # Errors
    ///
    /// Returns an error if connection or the handshake fails.
    pub async fn connect(&mut self) -> Result<SelfInfo> {
        self.start_read_loop().await?;

        {
            let mut transport = self.transport.lock().await;
            transport.connect().await?;
        }

        // Allow time for any stale data from a previous session to be
        // received and discarded before the handshake.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let event = self.session.start().await?;
        let MeshEvent::SelfInfo(info) = event else {
            return Err(Error::Protocol {
                message: "unexpected response to AppStart".into(),
            });
        };

        let cloned = (*info).clone();
        *self.self_info.write().await = Some(*info);
        self.dispatcher.dispatch(MeshEvent::Connected);

        let sync = Arc::clone(&self.sync);
        self.sync_task = Some(tokio::spawn(async move { sync.run().await }));

        let polling = Arc::clone(&self.polling);
        self.polling_task = Some(tokio::spawn(async move { polling.run().await }));

        Ok(cloned)
    }

    /// Starts the background read loop. For [`crate::transport::BleTransport`]
    /// frames arrive through its own internal notification pump (wired via
    /// `set_frame_sender` before `connect`); for [`TcpTransport`] the reader
    /// half is taken out and driven by a spawned task here, matching the
    /// teacher's `read_task`/`process_task` split.
    async fn start_read_loop(&mut self) -> Result<()> {
        let (frame_tx, mut frame_rx) = mpsc::channel::<Bytes>(256);

        {
            let mut transport = self.transport.lock().await;
            if let Some(ble) =
                ((&mut *transport) as &mut dyn std::any::Any).downcast_mut::<BleTransport>()
            {
                ble.set_frame_sender(frame_tx.clone());
            }
        }

        let reader_and_decoder = {
            let mut transport = self.transport.lock().await;
            if let Some(tcp) =
                ((&mut *transport) as &mut dyn std::any::Any).downcast_mut::<TcpTransport>()
            {
                let reader = tcp.take_reader();
                let decoder = std::mem::take(tcp.decoder_mut());
                reader.map(|r| (r, decoder))
            } else {
                None
            }
        };

        if let Some((reader, decoder)) = reader_and_decoder {
            let read_task = tokio::spawn(async move {
                if let Err(e) = TcpTransport::run_read_loop_with_reader(reader, decoder, frame_tx).await {
                    tracing::error!("read loop error: {}", e);
                }
            });
            self.read_task = Some(read_task);
        }

        let dispatcher = self.dispatcher.clone();
        let self_info = Arc::clone(&self.self_info);
        let contacts = Arc::clone(&self.contacts);

        let process_task = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                process_frame(&frame, &dispatcher, &self_info, &contacts).await;
            }
        });
        self.process_task = Some(process_task);

        Ok(())
    }

    /// Disconnects from the device and stops all background tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to disconnect cleanly.
    pub async fn disconnect(&mut self) -> Result<()> {
        for task in [
            self.read_task.take(),
            self.process_task.take(),
            self.sync_task.take(),
            self.polling_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }

        {
            let mut transport = self.transport.lock().await;
            transport.disconnect().await?;
        }

        self.dispatcher.dispatch(MeshEvent::Disconnected);
        Ok(())
    }

    /// Returns true if connected.
    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    /// Returns the device info if available.
    pub async fn self_info(&self) -> Option<SelfInfo> {
        self.self_info.read().await.clone()
    }

    /// Returns all known contacts.
    pub async fn contacts(&self) -> HashMap<PublicKey, Contact> {
        self.contacts.read().await.clone()
    }

    /// Gets a specific contact by public key.
    pub async fn get_contact(&self, public_key: &PublicKey) -> Option<Contact> {
        self.contacts.read().await.get(public_key).cloned()
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe(None)
    }

    // ==================== High-Level Device Methods ====================

    /// Gets the battery status.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_battery(&self) -> Result<BatteryStatus> {
        match self.session.get_battery().await? {
            MeshEvent::Battery(status) => Ok(status),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    /// Gets device information.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_device_info(&self) -> Result<DeviceInfo> {
        match self.session.device_query().await? {
            MeshEvent::DeviceInfo(info) => Ok(*info),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    /// Gets the current device time.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_time(&self) -> Result<u32> {
        match self.session.get_time().await? {
            MeshEvent::CurrentTime(time) => Ok(time),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    /// Sets the device time to the current system time.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn sync_time(&self) -> Result<()> {
        self.session.set_time(current_timestamp()).await
    }

    /// Gets core statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_core_stats(&self) -> Result<CoreStats> {
        match self.session.get_stats(StatsType::Core).await? {
            MeshEvent::Stats(StatsData::Core(core)) => Ok(core),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    /// Gets radio statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_radio_stats(&self) -> Result<RadioStats> {
        match self.session.get_stats(StatsType::Radio).await? {
            MeshEvent::Stats(StatsData::Radio(radio)) => Ok(radio),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    /// Gets packet statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_packet_stats(&self) -> Result<PacketStats> {
        match self.session.get_stats(StatsType::Packets).await? {
            MeshEvent::Stats(StatsData::Packets(packets)) => Ok(packets),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    // ==================== High-Level Contact Methods ====================

    /// Triggers the contacts sync phase and returns the resulting cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_contacts(&self) -> Result<HashMap<PublicKey, Contact>> {
        self.sync.sync_contacts().await?;
        Ok(self.contacts.read().await.clone())
    }

    // ==================== High-Level Messaging Methods ====================

    /// Sends a private message with the default direct-then-flood retry
    /// schedule (§4.9), returning once delivered or all attempts are
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error only if the transport write itself fails.
    pub async fn send_message(&self, destination: &PublicKey, message: &str) -> Result<DeliveryStatus> {
        let contact = self
            .contacts
            .read()
            .await
            .get(destination)
            .cloned()
            .unwrap_or_else(|| unknown_contact(destination.clone()));

        self.message_service
            .send_message_with_retry(destination, &contact, message, current_timestamp())
            .await
    }

    /// Sends a channel message.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn send_channel_message(&self, channel: u8, message: &str) -> Result<()> {
        match self.session.send_channel_message(channel, message, current_timestamp()).await? {
            MeshEvent::Ok => Ok(()),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    /// Fetches all waiting messages by draining the message phase directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn fetch_messages(&self) -> Result<Vec<MeshEvent>> {
        let mut messages = Vec::new();
        loop {
            match self.session.get_message().await? {
                event @ (MeshEvent::ContactMessage(_) | MeshEvent::ChannelMessage(_)) => {
                    messages.push(event);
                }
                _ => break,
            }
        }
        Ok(messages)
    }

    // ==================== High-Level Channel Methods ====================

    /// Gets channel information.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_channel(&self, index: u8) -> Result<Channel> {
        match self.session.get_channel(index).await? {
            MeshEvent::ChannelInfo(channel) => Ok(*channel),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    // ==================== High-Level Remote-Node Methods ====================

    /// Sends a status request to a remote device; the `StatusResponse`
    /// itself arrives as a later push on the event stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn request_remote_status(&self, destination: &PublicKey) -> Result<u32> {
        match self.session.send_status_request(destination).await? {
            MeshEvent::MessageSent { expected_ack, .. } => Ok(expected_ack),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    /// Sends a telemetry request to a remote device; the
    /// `TelemetryResponse` itself arrives as a later push.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn request_remote_telemetry(&self, destination: &PublicKey) -> Result<u32> {
        match self.session.send_telemetry_request(destination).await? {
            MeshEvent::MessageSent { expected_ack, .. } => Ok(expected_ack),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }

    /// Gets this device's own telemetry.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    pub async fn get_self_telemetry(&self) -> Result<Telemetry> {
        match self.session.get_self_telemetry().await? {
            MeshEvent::TelemetryResponse(telemetry) => Ok(*telemetry),
            _ => Err(Error::Protocol {
                message: "unexpected response".into(),
            }),
        }
    }
}

/// Processes a received frame and dispatches the appropriate event.
#[allow(clippy::too_many_lines)]
async fn process_frame(
    frame: &[u8],
    dispatcher: &EventDispatcher,
    self_info: &Arc<RwLock<Option<SelfInfo>>>,
    contacts: &Arc<RwLock<HashMap<PublicKey, Contact>>>,
) {
    if frame.is_empty() {
        return;
    }

    let packet_type = frame[0];
    let data = &frame[1..];

    tracing::trace!(
        "processing packet type 0x{packet_type:02x}, {} bytes",
        data.len()
    );

    let event = match PacketType::from_byte(packet_type) {
        Some(PacketType::Ok) => MeshEvent::Ok,
        Some(PacketType::Error) => {
            // Device ERROR responses carry a single-byte code (§7); stash it
            // as the decimal string so callers recover it via
            // `message.parse::<u8>()` without widening the event variant.
            let code = data.first().copied().unwrap_or(0);
            MeshEvent::Error {
                message: code.to_string(),
            }
        }
        Some(PacketType::SelfInfo) => match parse_self_info(data) {
            Ok(info) => {
                let mut cached = self_info.write().await;
                *cached = Some(info.clone());
                MeshEvent::SelfInfo(Box::new(info))
            }
            Err(e) => {
                tracing::warn!("failed to parse SelfInfo: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::DeviceInfo) => match parse_device_info(data) {
            Ok(info) => MeshEvent::DeviceInfo(Box::new(info)),
            Err(e) => {
                tracing::warn!("failed to parse DeviceInfo: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::Battery) => match parse_battery(data) {
            Ok(battery) => MeshEvent::Battery(battery),
            Err(e) => {
                tracing::warn!("failed to parse Battery: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::Contact) => match parse_contact(data) {
            Ok(contact) => {
                let mut cached = contacts.write().await;
                cached.insert(contact.public_key.clone(), contact.clone());
                MeshEvent::Contact(Box::new(contact))
            }
            Err(e) => {
                tracing::warn!("failed to parse Contact: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::PushNewAdvert) => match parse_contact(data) {
            Ok(contact) => {
                let mut cached = contacts.write().await;
                cached.insert(contact.public_key.clone(), contact.clone());
                MeshEvent::NewContactAdvert(Box::new(contact))
            }
            Err(e) => {
                tracing::warn!("failed to parse NewContactAdvert: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::Advertisement) => {
            if data.len() >= 32 {
                let mut key_bytes = [0u8; 32];
                key_bytes.copy_from_slice(&data[..32]);
                MeshEvent::Advertisement(PublicKey::from_bytes(&key_bytes))
            } else {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        }
        Some(PacketType::ContactStart) => {
            let count = if data.len() >= 4 {
                u32::from_le_bytes([data[0], data[1], data[2], data[3]])
            } else {
                0
            };
            MeshEvent::ContactListStart { count }
        }
        Some(PacketType::ContactEnd) => {
            let last_modified = if data.len() >= 4 {
                u32::from_le_bytes([data[0], data[1], data[2], data[3]])
            } else {
                0
            };
            MeshEvent::ContactListEnd { last_modified }
        }
        Some(PacketType::ContactMsgRecv) => match parse_contact_message(data, false) {
            Ok(msg) => MeshEvent::ContactMessage(Box::new(msg)),
            Err(e) => {
                tracing::warn!("failed to parse ContactMessage: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::ContactMsgRecvV3) => match parse_contact_message(data, true) {
            Ok(msg) => MeshEvent::ContactMessage(Box::new(msg)),
            Err(e) => {
                tracing::warn!("failed to parse ContactMessage v3: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::ChannelMsgRecv) => match parse_channel_message(data, false) {
            Ok(msg) => MeshEvent::ChannelMessage(Box::new(msg)),
            Err(e) => {
                tracing::warn!("failed to parse ChannelMessage: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::ChannelMsgRecvV3) => match parse_channel_message(data, true) {
            Ok(msg) => MeshEvent::ChannelMessage(Box::new(msg)),
            Err(e) => {
                tracing::warn!("failed to parse ChannelMessage v3: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::ChannelInfo) => match parse_channel(data) {
            Ok(channel) => MeshEvent::ChannelInfo(Box::new(channel)),
            Err(e) => {
                tracing::warn!("failed to parse Channel: {}", e);
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        },
        Some(PacketType::MsgSent) => {
            if data.len() >= 9 {
                let expected_ack = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
                let timeout_ms = u32::from_le_bytes([data[5], data[6], data[7], data[8]]);
                MeshEvent::MessageSent { expected_ack, timeout_ms }
            } else {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        }
        Some(PacketType::Ack) => {
            if data.len() >= 4 {
                let code = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                MeshEvent::Ack(Acknowledgment { code })
            } else {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        }
        Some(PacketType::NoMoreMsgs) => MeshEvent::NoMoreMessages,
        Some(PacketType::MessagesWaiting) => MeshEvent::MessagesWaiting,
        Some(PacketType::CurrentTime) => {
            if data.len() >= 4 {
                MeshEvent::CurrentTime(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            } else {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        }
        Some(PacketType::StatusResponse) => {
            if data.len() > 1 {
                match parse_device_status(&data[1..]) {
                    Ok(status) => MeshEvent::StatusResponse(Box::new(status)),
                    Err(e) => {
                        tracing::warn!("failed to parse DeviceStatus: {}", e);
                        MeshEvent::Raw { packet_type, data: data.to_vec() }
                    }
                }
            } else {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        }
        Some(PacketType::TelemetryResponse) => {
            if data.len() > 7 {
                MeshEvent::TelemetryResponse(Box::new(Telemetry::parse_lpp(&data[7..])))
            } else {
                MeshEvent::TelemetryResponse(Box::new(Telemetry::new()))
            }
        }
        Some(PacketType::Stats) => {
            if data.is_empty() {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            } else {
                let stats_type = crate::types::StatsType::from_byte(data[0]);
                let stats_data = &data[1..];
                let stats = match stats_type {
                    Some(crate::types::StatsType::Core) => parse_core_stats(stats_data).ok().map(StatsData::Core),
                    Some(crate::types::StatsType::Radio) => parse_radio_stats(stats_data).ok().map(StatsData::Radio),
                    Some(crate::types::StatsType::Packets) => {
                        parse_packet_stats(stats_data).ok().map(StatsData::Packets)
                    }
                    None => None,
                };
                stats.map_or_else(
                    || MeshEvent::Raw { packet_type, data: data.to_vec() },
                    MeshEvent::Stats,
                )
            }
        }
        Some(PacketType::LoginSuccess) => {
            let perm_level = data.first().copied();
            let session_id = if data.len() >= 5 {
                Some(u32::from_le_bytes([data[1], data[2], data[3], data[4]]))
            } else {
                None
            };
            MeshEvent::LoginResult {
                success: true,
                perm_level,
                session_id,
            }
        }
        Some(PacketType::LoginFailed) => MeshEvent::LoginResult {
            success: false,
            perm_level: None,
            session_id: None,
        },
        Some(PacketType::KeepAliveAck) => {
            let timestamp = if data.len() >= 4 {
                u32::from_le_bytes([data[0], data[1], data[2], data[3]])
            } else {
                0
            };
            MeshEvent::KeepAliveAck { timestamp }
        }
        Some(PacketType::PrivateKey) => {
            if data.len() >= 64 {
                let mut key = [0u8; 64];
                key.copy_from_slice(&data[..64]);
                MeshEvent::PrivateKey(key)
            } else {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        }
        Some(PacketType::Disabled) => MeshEvent::Disabled,
        Some(PacketType::Signature) => {
            if data.is_empty() {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            } else {
                MeshEvent::Signature(data.to_vec())
            }
        }
        Some(PacketType::ContactUri) => {
            let hex = hex::encode(data);
            MeshEvent::ContactUri(format!("meshcore://{hex}"))
        }
        Some(PacketType::PathUpdate) => {
            if data.len() >= 32 {
                let mut key_bytes = [0u8; 32];
                key_bytes.copy_from_slice(&data[..32]);
                MeshEvent::PathUpdate(PublicKey::from_bytes(&key_bytes))
            } else {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        }
        Some(PacketType::RawData) => MeshEvent::RawData(data.to_vec()),
        Some(PacketType::LogData) => MeshEvent::LogData(String::from_utf8_lossy(data).into_owned()),
        Some(PacketType::TraceData) => MeshEvent::TraceData(data.to_vec()),
        Some(PacketType::CustomVars) => MeshEvent::CustomVars(String::from_utf8_lossy(data).into_owned()),
        Some(PacketType::BinaryResponse) => MeshEvent::BinaryResponse(data.to_vec()),
        Some(PacketType::PathDiscoveryResponse) => MeshEvent::PathDiscoveryResponse(data.to_vec()),
        Some(PacketType::ControlData) => MeshEvent::ControlData(data.to_vec()),
        Some(PacketType::SignStart) => {
            if data.len() >= 5 {
                let max_length = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
                MeshEvent::SignStarted { max_length }
            } else {
                MeshEvent::Raw { packet_type, data: data.to_vec() }
            }
        }
        _ => MeshEvent::Raw { packet_type, data: data.to_vec() },
    };

    dispatcher.dispatch(event);
}

impl<T> Drop for MeshCore<T> {
    fn drop(&mut self) {
        for task in [
            self.read_task.take(),
            self.process_task.take(),
            self.sync_task.take(),
            self.polling_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}
