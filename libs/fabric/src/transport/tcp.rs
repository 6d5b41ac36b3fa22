use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::frame::{read_frame, with_timeout, write_frame, DEFAULT_MAX_FRAME_LEN};
use crate::transport::{FrameSink, FrameSource, Transport};

/// TCP transport with length-prefix framing
///
/// Messages are sent with a 4-byte big-endian length prefix
pub struct TcpTransport {
    stream: TcpStream,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    max_frame_len: usize,
}

impl TcpTransport {
    /// Connect to a remote TCP address with no timeouts
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::builder().address(addr).connect().await
    }

    /// Connect with a connect timeout
    pub async fn connect_timeout(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        Self::builder()
            .address(addr)
            .connect_timeout(timeout)
            .connect()
            .await
    }

    /// Create a builder for configuring the transport
    pub fn builder() -> TcpTransportBuilder {
        TcpTransportBuilder::new()
    }

    /// Create from an existing TcpStream
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            send_timeout: None,
            receive_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Get the remote address of this connection
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(Into::into)
    }

    /// Get the local address of this connection
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr().map_err(Into::into)
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let max = self.max_frame_len;
        with_timeout(self.send_timeout, "Send", write_frame(&mut self.stream, bytes, max)).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        let max = self.max_frame_len;
        with_timeout(self.receive_timeout, "Receive", read_frame(&mut self.stream, max)).await
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn into_split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameSource>) {
        let (read, write) = self.stream.into_split();
        let sink = TcpFrameSink {
            half: write,
            send_timeout: self.send_timeout,
            max_frame_len: self.max_frame_len,
        };
        let source = TcpFrameSource {
            half: read,
            receive_timeout: self.receive_timeout,
            max_frame_len: self.max_frame_len,
        };
        (Box::new(sink), Box::new(source))
    }
}

/// Write half of a split [`TcpTransport`]
pub struct TcpFrameSink {
    half: OwnedWriteHalf,
    send_timeout: Option<Duration>,
    max_frame_len: usize,
}

#[async_trait::async_trait]
impl FrameSink for TcpFrameSink {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let max = self.max_frame_len;
        with_timeout(self.send_timeout, "Send", write_frame(&mut self.half, bytes, max)).await
    }

    async fn close(&mut self) -> Result<()> {
        self.half.shutdown().await?;
        Ok(())
    }
}

/// Read half of a split [`TcpTransport`]
pub struct TcpFrameSource {
    half: OwnedReadHalf,
    receive_timeout: Option<Duration>,
    max_frame_len: usize,
}

#[async_trait::async_trait]
impl FrameSource for TcpFrameSource {
    async fn receive(&mut self) -> Result<Vec<u8>> {
        let max = self.max_frame_len;
        with_timeout(self.receive_timeout, "Receive", read_frame(&mut self.half, max)).await
    }
}

/// TCP listener for accepting incoming connections
pub struct TcpTransportListener {
    listener: TcpListener,
}

impl TcpTransportListener {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept an incoming connection
    pub async fn accept(&self) -> Result<(TcpTransport, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await?;
        debug!(peer = %addr, "Accepted TCP connection");
        Ok((TcpTransport::from_stream(stream), addr))
    }

    /// Get the local address this listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }

    /// Close the listener
    ///
    /// Tokio's TcpListener has no explicit close; the socket is released on
    /// drop.
    pub async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::transport::TransportListener for TcpTransportListener {
    type Transport = TcpTransport;

    async fn accept(&self) -> Result<Self::Transport> {
        let (stream, _) = self.listener.accept().await?;
        Ok(TcpTransport::from_stream(stream))
    }

    async fn close(&mut self) -> Result<()> {
        TcpTransportListener::close(self).await
    }
}

/// Builder for configuring TCP transport
pub struct TcpTransportBuilder {
    address: Option<SocketAddr>,
    connect_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    max_frame_len: usize,
}

impl Default for TcpTransportBuilder {
    fn default() -> Self {
        Self {
            address: None,
            connect_timeout: None,
            send_timeout: None,
            receive_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl TcpTransportBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address to connect to
    pub fn address(mut self, addr: SocketAddr) -> Self {
        self.address = Some(addr);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set the receive timeout
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Set the largest frame body accepted in either direction
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Connect with the configured settings
    pub async fn connect(self) -> Result<TcpTransport> {
        let addr = self
            .address
            .ok_or_else(|| Error::Custom("Address not set".to_string()))?;

        let connect_op = async { TcpStream::connect(addr).await.map_err(Error::from) };
        let stream = with_timeout(self.connect_timeout, "Connect", connect_op).await?;
        stream.set_nodelay(true)?;
        debug!(%addr, "TCP transport connected");

        Ok(TcpTransport {
            stream,
            send_timeout: self.send_timeout,
            receive_timeout: self.receive_timeout,
            max_frame_len: self.max_frame_len,
        })
    }
}
