//! Error types for the meshcore library.

use thiserror::Error;

/// The main error type for meshcore operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Protocol error from the device.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Command timed out waiting for response.
    #[error("command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,

    /// The peer disconnected while a request was in flight.
    #[error("peer disconnected")]
    PeerDisconnected,

    /// The OS reports the device is already owned by another application.
    #[error("device already connected to another app")]
    OtherAppOwnsDevice,

    /// Invalid public key format.
    #[error("invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    /// Invalid coordinates.
    #[error("invalid coordinates: {reason}")]
    InvalidCoordinates { reason: String },

    /// Response code received did not match any expected code.
    #[error("unexpected response code: {code:#04x}")]
    UnexpectedResponseCode { code: u8 },

    /// Payload shorter than the minimum required for its response code.
    #[error("short payload: need at least {need} bytes, got {got}")]
    ShortPayload { need: usize, got: usize },

    /// An unrecognised type byte was encountered while decoding.
    #[error("unknown type byte: {code:#04x}")]
    UnknownType { code: u8 },

    /// An RPC's response did not arrive before its deadline.
    #[error("RPC timed out after {timeout_ms}ms")]
    RpcTimeout { timeout_ms: u64 },

    /// No ACK arrived for a sent message before its deadline.
    #[error("ACK timed out after {timeout_ms}ms")]
    AckTimeout { timeout_ms: u64 },

    /// The initial `appStart` handshake did not complete before its deadline.
    #[error("handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout { timeout_ms: u64 },

    /// The device reported an `ERROR` response with this code.
    #[error("device error: code {code}")]
    DeviceError { code: u8 },

    /// The caller's wait was cancelled (shutdown, drop, or explicit cancel).
    #[error("operation cancelled")]
    Cancelled,

    /// Channel send error.
    #[error("channel send error")]
    ChannelSend,

    /// Channel receive error.
    #[error("channel closed")]
    ChannelClosed,
}

/// Frame-specific errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Frame too short to contain header and length.
    #[error("frame too short: need at least 3 bytes, got {0}")]
    TooShort(usize),

    /// Frame payload exceeds maximum size.
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    /// Incomplete frame data.
    #[error("incomplete frame: expected {expected} bytes, got {got}")]
    Incomplete { expected: usize, got: usize },
}

/// Result type alias for meshcore operations.
pub type Result<T> = std::result::Result<T, Error>;
