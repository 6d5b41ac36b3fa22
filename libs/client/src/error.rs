use std::time::Duration;

use ripplefs_core::PathError;
use ripplefs_discovery::DiscoveryError;
use thiserror::Error;

use crate::protocol::RemoteError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Invalid or missing setup, detected before any network activity
    #[error("{0}")]
    Configuration(String),

    #[error("Connection setup failed: {0}")]
    ConnectionSetup(String),

    /// The established connection died or was closed; the client is unusable
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Stale stream handle: {0}")]
    StaleHandle(u64),

    /// The server reported a filesystem-level failure for this operation
    #[error("Remote failure: {0}")]
    Remote(#[from] RemoteError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClientError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote(remote) if remote.is_not_found())
    }
}

impl From<PathError> for ClientError {
    fn from(e: PathError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<DiscoveryError> for ClientError {
    fn from(e: DiscoveryError) -> Self {
        if e.is_configuration() {
            Self::Configuration(e.to_string())
        } else {
            Self::ConnectionSetup(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
