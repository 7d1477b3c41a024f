//! TCP transport implementation.
//!
//! MeshCore's desktop companion bridge speaks the same framed protocol as
//! the USB/serial firmware over a plain TCP socket. Structurally this is
//! the serial transport with the stream type swapped.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};

use crate::error::{Error, Result};
use crate::protocol::{FrameDecoder, encode_frame};
use crate::transport::{ConnectionState, Transport};

/// Configuration for TCP transport.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Address of the companion bridge, e.g. `192.168.1.50:5000`.
    pub addr: SocketAddr,
}

impl TcpConfig {
    /// Creates a new TCP configuration.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

/// TCP transport for `MeshCore` communication.
pub struct TcpTransport {
    config: TcpConfig,
    writer: Option<Arc<Mutex<WriteHalf<TcpStream>>>>,
    reader: Option<ReadHalf<TcpStream>>,
    decoder: FrameDecoder,
    frame_tx: Option<mpsc::Sender<Bytes>>,
    state_tx: watch::Sender<ConnectionState>,
}

impl TcpTransport {
    /// Creates a new TCP transport for the given address.
    #[must_use]
    pub fn new(config: TcpConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            config,
            writer: None,
            reader: None,
            decoder: FrameDecoder::new(),
            frame_tx: None,
            state_tx,
        }
    }

    /// Creates a new TCP transport for the given address with default settings.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self::new(TcpConfig::new(addr))
    }

    /// Sets the frame receiver channel.
    pub fn set_frame_sender(&mut self, tx: mpsc::Sender<Bytes>) {
        self.frame_tx = Some(tx);
    }

    /// Takes the reader half for use in a background task.
    pub fn take_reader(&mut self) -> Option<ReadHalf<TcpStream>> {
        self.reader.take()
    }

    /// Gets the frame decoder.
    pub fn decoder_mut(&mut self) -> &mut FrameDecoder {
        &mut self.decoder
    }

    /// Gets the frame sender channel.
    #[must_use]
    pub fn frame_tx(&self) -> Option<mpsc::Sender<Bytes>> {
        self.frame_tx.clone()
    }

    /// Runs the read loop with a given reader, processing incoming data.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the connection is lost.
    pub async fn run_read_loop_with_reader(
        mut reader: ReadHalf<TcpStream>,
        mut decoder: FrameDecoder,
        frame_tx: mpsc::Sender<Bytes>,
    ) -> Result<()> {
        let mut buf = [0u8; 1024];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    tracing::debug!("tcp connection closed");
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "tcp connection closed",
                    )));
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::error!("tcp read error: {}", e);
                    return Err(Error::Io(e));
                }
            };

            tracing::trace!("received {} bytes", n);
            decoder.feed(&buf[..n]);

            loop {
                match decoder.decode() {
                    Ok(Some(frame)) => {
                        tracing::trace!("decoded frame: {} bytes", frame.len());
                        if frame_tx.send(frame).await.is_err() {
                            tracing::debug!("frame receiver dropped");
                            return Ok(());
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("frame decode error: {}", e);
                    }
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.writer.is_some() {
                return Ok(());
            }

            tracing::info!("connecting to tcp bridge: {}", self.config.addr);
            self.state_tx.send_replace(ConnectionState::DiscoveringServices);

            let stream = TcpStream::connect(self.config.addr)
                .await
                .map_err(Error::Io)?;
            stream.set_nodelay(true).map_err(Error::Io)?;

            let (reader, writer) = tokio::io::split(stream);
            self.reader = Some(reader);
            self.writer = Some(Arc::new(Mutex::new(writer)));
            self.decoder.clear();

            tracing::info!("connected to tcp bridge");
            self.state_tx.send_replace(ConnectionState::Ready);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.writer.is_some() || self.reader.is_some() {
                tracing::info!("disconnecting from tcp bridge");
                self.state_tx.send_replace(ConnectionState::Disconnecting);
                self.writer = None;
                self.reader = None;
            }
            self.state_tx.send_replace(ConnectionState::Idle);
            Ok(())
        })
    }

    fn send(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let writer = self.writer.clone();
        Box::pin(async move {
            let writer = writer.ok_or(Error::NotConnected)?;
            let mut writer = writer.lock().await;

            let frame = encode_frame(&data);
            tracing::trace!("sending frame: {} bytes", frame.len());

            writer.write_all(&frame).await.map_err(Error::Io)?;
            writer.flush().await.map_err(Error::Io)?;

            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_config_holds_addr() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let config = TcpConfig::new(addr);
        assert_eq!(config.addr, addr);
    }

    #[test]
    fn test_initial_connection_state_is_idle() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let transport = TcpTransport::with_addr(addr);
        assert_eq!(*transport.connection_state().borrow(), ConnectionState::Idle);
        assert!(!transport.is_connected());
    }
}
