//! ripplefs Fabric - Low-level transport and codec layer
//!
//! Provides transport abstractions (TCP, Unix sockets) with length-prefixed
//! framing, a codec trait with a bincode implementation, and a typed
//! [`Channel`] that can be split into a writer and a reader for connections
//! that send and receive from different tasks.
//!
//! # Example
//!
//! ```no_run
//! use ripplefs_fabric::{Channel, codec::BincodeCodec};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Ping { seq: u64 }
//!
//! #[derive(Serialize, Deserialize)]
//! struct Pong { seq: u64 }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let addr = "127.0.0.1:10500".parse()?;
//! let channel = Channel::tcp(addr, BincodeCodec).await?;
//! let (mut writer, mut reader) = channel.into_split();
//!
//! writer.send(&Ping { seq: 1 }).await?;
//! let pong: Pong = reader.receive().await?;
//! assert_eq!(pong.seq, 1);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod codec;
pub mod error;
pub mod transport;

// Re-exports for convenience
pub use channel::{Channel, ChannelReader, ChannelWriter};
pub use error::{Error, Result};
