use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::Result;
use crate::transport::{FrameSink, FrameSource, TcpTransport, Transport, UnixTransport};

/// High-level channel for bidirectional communication
///
/// Combines a transport and codec for persistent connections
pub struct Channel<C> {
    transport: Box<dyn Transport>,
    codec: C,
}

impl<C: Codec> Channel<C> {
    /// Create a channel from an existing transport
    pub fn from_transport(transport: impl Transport + 'static, codec: C) -> Self {
        Self {
            transport: Box::new(transport),
            codec,
        }
    }

    /// Open a TCP channel
    pub async fn tcp(addr: SocketAddr, codec: C) -> Result<Self> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::from_transport(transport, codec))
    }

    /// Open a Unix socket channel
    pub async fn unix(path: impl AsRef<Path>, codec: C) -> Result<Self> {
        let transport = UnixTransport::connect(path).await?;
        Ok(Self::from_transport(transport, codec))
    }

    /// Send a message over the channel
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let bytes = self.codec.encode(message)?;
        self.transport.send(&bytes).await
    }

    /// Receive a message from the channel
    pub async fn receive<T: for<'de> Deserialize<'de>>(&mut self) -> Result<T> {
        let bytes = self.transport.receive().await?;
        self.codec.decode(&bytes)
    }

    /// Close the channel
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }
}

impl<C: Codec + Clone> Channel<C> {
    /// Split into a writer and a reader that can be driven from separate tasks
    pub fn into_split(self) -> (ChannelWriter<C>, ChannelReader<C>) {
        let (sink, source) = self.transport.into_split();
        (
            ChannelWriter {
                sink,
                codec: self.codec.clone(),
            },
            ChannelReader {
                source,
                codec: self.codec,
            },
        )
    }
}

/// Sending half of a split [`Channel`]
pub struct ChannelWriter<C> {
    sink: Box<dyn FrameSink>,
    codec: C,
}

impl<C: Codec> ChannelWriter<C> {
    /// Encode and send a message
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let bytes = self.codec.encode(message)?;
        self.sink.send(&bytes).await
    }

    /// Send bytes that were already encoded with this channel's codec
    pub async fn send_encoded(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.send(bytes).await
    }

    /// The codec used for this half
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Shut down the write direction
    pub async fn close(mut self) -> Result<()> {
        self.sink.close().await
    }
}

/// Receiving half of a split [`Channel`]
pub struct ChannelReader<C> {
    source: Box<dyn FrameSource>,
    codec: C,
}

impl<C: Codec> ChannelReader<C> {
    /// Receive and decode a message
    ///
    /// A decode failure consumes exactly one frame, so the reader can keep
    /// going after [`Error::Codec`](crate::Error::Codec).
    pub async fn receive<T: for<'de> Deserialize<'de>>(&mut self) -> Result<T> {
        let bytes = self.source.receive().await?;
        self.codec.decode(&bytes)
    }

    /// The codec used for this half
    pub fn codec(&self) -> &C {
        &self.codec
    }
}
