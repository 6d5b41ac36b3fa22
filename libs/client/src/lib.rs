//! ripplefs Client - async client for a remote filesystem coordinator
//!
//! One [`FsClient`] multiplexes every metadata operation and every open
//! stream over a single framed connection. Replies are matched to commands by
//! correlation id, so any number of tasks can share the client and replies may
//! arrive in any order.
//!
//! # Example
//!
//! ```no_run
//! use ripplefs_client::{ClientConfig, Endpoint, FsClient, FsPath};
//!
//! # async fn example() -> ripplefs_client::Result<()> {
//! let config = ClientConfig::new(Endpoint::Tcp("127.0.0.1:10500".parse().unwrap()))
//!     .with_fs_name("ripple");
//! let client = FsClient::connect(config).await?;
//!
//! let path = FsPath::new("/logs/today")?;
//! let stream = client.create(&path, true, false, 1, 0, None).await?;
//! client.write_data(&stream, b"hello")?;
//! client.close_stream(&stream).await?;
//!
//! let info = client.info(&path).await?;
//! println!("{} is {} bytes", info.path, info.length);
//! client.close().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Unwrap a reply into the variant the command expects
macro_rules! expect_reply {
    ($reply:expr, $variant:path) => {
        match $reply {
            $variant(value) => Ok(value),
            other => Err($crate::error::ClientError::Protocol(format!(
                "unexpected {:?} reply",
                other.kind()
            ))),
        }
    };
}

pub mod client;
pub mod config;
pub mod connection;
mod dispatcher;
pub mod error;
pub mod notifier;
pub mod protocol;
pub mod registry;
pub mod stream;

pub use client::FsClient;
pub use config::{ClientConfig, Endpoint};
pub use connection::ConnectionState;
pub use dispatcher::PendingCommand;
pub use error::{ClientError, Result};
pub use notifier::{StreamEvent, StreamEventListener};
pub use protocol::{Command, RemoteError, RemoteErrorKind, Reply};
pub use registry::{StreamDescriptor, StreamMode};
pub use stream::ReadData;

pub use ripplefs_core::{
    BlockLocation, FileInfo, FileKind, FsPath, FsStatus, HandshakeResponse, PathError,
    PathSummary, Properties,
};

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
