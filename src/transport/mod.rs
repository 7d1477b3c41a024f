//! Transport layer for `MeshCore` communication.
//!
//! This module provides the abstraction for different transport methods:
//! TCP (desktop companion bridge) and BLE.

pub mod ble;
pub mod tcp;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::watch;

use crate::error::Result;

/// A state in the transport connection lifecycle (§4.7).
///
/// ```text
/// idle -> discoveringServices -> discoveringCharacteristics
///      -> subscribingToNotifications -> ready
///      -> (disconnecting | autoReconnecting) -> idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection attempt in progress.
    #[default]
    Idle,
    /// Transport-level connection established, negotiating services.
    DiscoveringServices,
    /// Services resolved, locating the required characteristics.
    DiscoveringCharacteristics,
    /// Characteristics found, subscribing to notifications.
    SubscribingToNotifications,
    /// Fully negotiated; frames may be sent and received.
    Ready,
    /// Shutting down on caller request.
    Disconnecting,
    /// Unexpected disconnect from `Ready` with a known device id; reconnecting.
    AutoReconnecting,
}

/// Trait for transport implementations.
///
/// Models the `send`/`receivedFrames`/`connectionState` contract (§4.6).
/// `receivedFrames` is realized out-of-band as an `mpsc::Sender<Bytes>`
/// configured via a transport-specific setter (e.g.
/// `BleTransport::set_frame_sender`), wired into the client's
/// frame-processing task.
pub trait Transport: Send + Sync {
    /// Connects to the device.
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Disconnects from the device.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Sends data to the device.
    fn send(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;

    /// A stream of connection-state transitions (§4.6/§4.7).
    fn connection_state(&self) -> watch::Receiver<ConnectionState>;
}

pub use ble::BleTransport;
pub use tcp::TcpTransport;
