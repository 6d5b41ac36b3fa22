use crate::error::Result;

pub mod frame;
pub mod tcp;
pub mod unix;

pub use self::frame::DEFAULT_MAX_FRAME_LEN;
pub use self::tcp::{TcpTransport, TcpTransportBuilder, TcpTransportListener};
pub use self::unix::{UnixTransport, UnixTransportBuilder, UnixTransportListener};

/// Transport trait for sending and receiving raw bytes
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send bytes over the transport
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive bytes from the transport
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;

    /// Split into independently owned write and read halves
    ///
    /// The halves can live on different tasks, which is what a connection
    /// with one writer and one dedicated receive loop needs.
    fn into_split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameSource>);
}

/// Write half of a split transport
#[async_trait::async_trait]
pub trait FrameSink: Send {
    /// Send one frame
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Shut down the write direction
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a split transport
#[async_trait::async_trait]
pub trait FrameSource: Send {
    /// Receive one frame
    async fn receive(&mut self) -> Result<Vec<u8>>;
}

/// Listener accepting incoming transports
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Transport: Transport;

    /// Wait for the next connection
    async fn accept(&self) -> Result<Self::Transport>;

    /// Stop listening
    async fn close(&mut self) -> Result<()>;
}
