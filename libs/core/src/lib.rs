//! ripplefs Core - value objects shared by the client and its callers
//!
//! Everything here is an immutable snapshot: paths, file metadata, block
//! locations and status reports carry no link back to the connection that
//! produced them and can be freely cloned and sent across tasks.

pub mod block;
pub mod error;
pub mod file;
pub mod path;
pub mod props;
pub mod status;

pub use block::BlockLocation;
pub use error::PathError;
pub use file::{FileInfo, FileKind};
pub use path::FsPath;
pub use props::Properties;
pub use status::{FsStatus, HandshakeResponse, PathSummary};
