use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::frame::{read_frame, with_timeout, write_frame, DEFAULT_MAX_FRAME_LEN};
use crate::transport::{FrameSink, FrameSource, Transport};

/// Unix domain socket transport with length-prefix framing
///
/// Messages are sent with a 4-byte big-endian length prefix
pub struct UnixTransport {
    stream: UnixStream,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    max_frame_len: usize,
}

impl UnixTransport {
    /// Connect to a Unix socket with no timeouts
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(path).connect().await
    }

    /// Connect with a connect timeout
    pub async fn connect_timeout(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        Self::builder()
            .path(path)
            .connect_timeout(timeout)
            .connect()
            .await
    }

    /// Create a builder for configuring the transport
    pub fn builder() -> UnixTransportBuilder {
        UnixTransportBuilder::new()
    }

    /// Create from an existing UnixStream
    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            stream,
            send_timeout: None,
            receive_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[async_trait::async_trait]
impl Transport for UnixTransport {
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
        let sink = UnixFrameSink {
            half: write,
            send_timeout: self.send_timeout,
            max_frame_len: self.max_frame_len,
        };
        let source = UnixFrameSource {
            half: read,
            receive_timeout: self.receive_timeout,
            max_frame_len: self.max_frame_len,
        };
        (Box::new(sink), Box::new(source))
    }
}

/// Write half of a split [`UnixTransport`]
pub struct UnixFrameSink {
    half: OwnedWriteHalf,
    send_timeout: Option<Duration>,
    max_frame_len: usize,
}

#[async_trait::async_trait]
impl FrameSink for UnixFrameSink {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let max = self.max_frame_len;
        with_timeout(self.send_timeout, "Send", write_frame(&mut self.half, bytes, max)).await
    }

    async fn close(&mut self) -> Result<()> {
        self.half.shutdown().await?;
        Ok(())
    }
}

/// Read half of a split [`UnixTransport`]
pub struct UnixFrameSource {
    half: OwnedReadHalf,
    receive_timeout: Option<Duration>,
    max_frame_len: usize,
}

#[async_trait::async_trait]
impl FrameSource for UnixFrameSource {
    async fn receive(&mut self) -> Result<Vec<u8>> {
        let max = self.max_frame_len;
        with_timeout(self.receive_timeout, "Receive", read_frame(&mut self.half, max)).await
    }
}

/// Unix socket listener for accepting incoming connections
pub struct UnixTransportListener {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixTransportListener {
    /// Bind to a Unix socket path
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // A stale socket file from a previous run blocks bind
        if path.exists() {
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path)?;
        Ok(Self { listener, path })
    }

    /// Accept an incoming connection
    pub async fn accept(&self) -> Result<UnixTransport> {
        let (stream, _) = self.listener.accept().await?;
        debug!(path = %self.path.display(), "Accepted Unix connection");
        Ok(UnixTransport::from_stream(stream))
    }

    /// Get the path this listener is bound to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the listener and remove the socket file
    pub async fn close(&mut self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Drop for UnixTransportListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[async_trait::async_trait]
impl crate::transport::TransportListener for UnixTransportListener {
    type Transport = UnixTransport;

    async fn accept(&self) -> Result<Self::Transport> {
        UnixTransportListener::accept(self).await
    }

    async fn close(&mut self) -> Result<()> {
        UnixTransportListener::close(self).await
    }
}

/// Builder for configuring Unix socket transport
pub struct UnixTransportBuilder {
    path: Option<PathBuf>,
    connect_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    max_frame_len: usize,
}

impl Default for UnixTransportBuilder {
    fn default() -> Self {
        Self {
            path: None,
            connect_timeout: None,
            send_timeout: None,
            receive_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl UnixTransportBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path to connect to
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
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
    pub async fn connect(self) -> Result<UnixTransport> {
        let path = self
            .path
            .ok_or_else(|| Error::Custom("Path not set".to_string()))?;

        let connect_op = async { UnixStream::connect(&path).await.map_err(Error::from) };
        let stream = with_timeout(self.connect_timeout, "Connect", connect_op).await?;
        debug!(path = %path.display(), "Unix transport connected");

        Ok(UnixTransport {
            stream,
            send_timeout: self.send_timeout,
            receive_timeout: self.receive_timeout,
            max_frame_len: self.max_frame_len,
        })
    }
}
