//! # meshcore
//!
//! A Rust client library for `MeshCore` companion radio devices.
//!
//! This library provides async communication with `MeshCore` devices over
//! a TCP companion bridge or a direct BLE connection.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - MeshEvent-driven architecture for handling device notifications
//! - Type-safe protocol implementation
//! - Direct-then-flood retry/ACK message delivery
//! - Contacts/channels/messages sync on every reconnect
//! - Comprehensive error handling
//!
//! ## Quick Start
//!
//! ```no_run
//! use meshcore::MeshCore;
//! use meshcore::transport::tcp::TcpConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), meshcore::Error> {
//!     // Connect to a `MeshCore` companion bridge
//!     let mut client = MeshCore::tcp(TcpConfig::new("192.168.1.50:5000".parse().unwrap()));
//!     let info = client.connect().await?;
//!
//!     println!("Connected to: {}", info.name);
//!     println!("Public key: {}", info.public_key);
//!
//!     // Get battery status
//!     let battery = client.get_battery().await?;
//!     println!("Battery: {}mV", battery.millivolts);
//!
//!     // Disconnect
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Low-level protocol types (frames, packets, commands)
//! - [`types`] - Data structures (contacts, devices, messages, statistics)
//! - [`transport`] - Transport implementations (TCP, BLE)
//! - [`event`] - Async event system for handling notifications
//! - [`session`] - Serialized request/response RPC engine
//! - [`message_service`] - Retry/ACK message delivery
//! - [`sync`] - Contacts/channels/messages sync coordinator
//! - [`remote_node`] - Login and binary-request queries against remote nodes
//! - [`polling`] - Message drain and liveness tracking
//! - [`persistence`] - Pluggable contact/channel/message storage
//! - [`client`] - High-level [`MeshCore`] client

pub mod client;
pub mod error;
pub mod event;
pub mod message_service;
pub mod persistence;
pub mod polling;
pub mod protocol;
pub mod remote_node;
pub mod session;
pub mod sync;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::MeshCore;
pub use error::{Error, FrameError, Result};
pub use event::{EventDispatcher, EventFilter, MeshEvent, StatsData, Subscription, SyncPhase};
pub use message_service::{DeliveryStatus, MessageService};
pub use persistence::{InMemoryStore, PersistenceStore};
pub use polling::MessagePollingService;
pub use protocol::{BinaryReqType, CommandOpcode, PacketType, StatsType};
pub use remote_node::RemoteNodeService;
pub use session::MeshCoreSession;
pub use sync::SyncCoordinator;
pub use transport::{BleTransport, ConnectionState, TcpTransport};
pub use types::{
    Acknowledgment, AclEntry, BatteryStatus, Channel, ChannelMessage, Contact, ContactFlags,
    ContactMessage, ContactType, CoreStats, DeviceInfo, DeviceStatus, MmaReading, NeighbourEntry,
    PacketStats, PublicKey, RadioConfig, RadioStats, SelfInfo, SignalQuality, Telemetry,
    TelemetryMode, TelemetryReading, TelemetryValue, TextType,
};
