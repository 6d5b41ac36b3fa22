use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Connection closed")]
    ConnectionClosed,

    /// The frame header could not be honoured; the byte stream is no longer
    /// aligned on a frame boundary.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("{0} timeout exceeded")]
    Timeout(&'static str),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Whether the byte stream can still be read after this error.
    ///
    /// Codec failures leave framing intact; everything else means the
    /// connection has to be abandoned.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Codec(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
