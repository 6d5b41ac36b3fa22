//! Wire messages exchanged with the coordinator
//!
//! Every client frame carries a correlation id. Replies travel as a
//! [`ServerFrame::Response`] envelope whose body is encoded separately, so a
//! body that fails to decode can still be routed to (and fail) the one
//! command it belongs to.

use std::fmt;

use ripplefs_core::{
    BlockLocation, FileInfo, FsPath, FsStatus, HandshakeResponse, PathSummary, Properties,
};
use ripplefs_fabric::codec::Codec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Correlation id used for frames that never get a reply
pub const NO_REPLY_ID: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub id: u64,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Handshake {
        fs_name: Option<String>,
        log_dir: Option<String>,
    },
    Info {
        path: FsPath,
    },
    Update {
        path: FsPath,
        properties: Properties,
    },
    SetTimes {
        path: FsPath,
        access_time: i64,
        modification_time: i64,
    },
    Rename {
        src: FsPath,
        dest: FsPath,
    },
    Delete {
        path: FsPath,
        recursive: bool,
    },
    Affinity {
        path: FsPath,
        start: u64,
        len: u64,
    },
    PathSummary {
        path: FsPath,
    },
    Mkdirs {
        path: FsPath,
        properties: Properties,
    },
    ListFiles {
        path: FsPath,
    },
    ListPaths {
        path: FsPath,
    },
    Status,
    OpenRead {
        path: FsPath,
        /// Sequential reads the server observes before it starts prefetching
        prefetch: Option<u32>,
    },
    OpenCreate {
        path: FsPath,
        overwrite: bool,
        colocate: bool,
        replication: u32,
        block_size: u64,
        properties: Option<Properties>,
    },
    OpenAppend {
        path: FsPath,
        create: bool,
        properties: Option<Properties>,
    },
    ReadBlock {
        stream_id: u64,
        pos: u64,
        len: u32,
    },
    WriteBlock {
        stream_id: u64,
        data: Vec<u8>,
    },
    CloseStream {
        stream_id: u64,
    },
}

impl Command {
    /// Reply kind the server answers with, `None` for fire-and-forget commands
    pub fn expected_reply(&self) -> Option<ReplyKind> {
        let kind = match self {
            Command::Handshake { .. } => ReplyKind::Handshake,
            Command::Info { .. } | Command::Update { .. } => ReplyKind::File,
            Command::SetTimes { .. }
            | Command::Rename { .. }
            | Command::Delete { .. }
            | Command::Mkdirs { .. }
            | Command::CloseStream { .. } => ReplyKind::Flag,
            Command::Affinity { .. } => ReplyKind::Blocks,
            Command::PathSummary { .. } => ReplyKind::Summary,
            Command::ListFiles { .. } => ReplyKind::Files,
            Command::ListPaths { .. } => ReplyKind::Paths,
            Command::Status => ReplyKind::Status,
            Command::OpenRead { .. } | Command::OpenCreate { .. } | Command::OpenAppend { .. } => {
                ReplyKind::Opened
            }
            Command::ReadBlock { .. } => ReplyKind::Data,
            Command::WriteBlock { .. } => return None,
        };
        Some(kind)
    }
}

/// Server stream id plus what the server knows about the opened file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedStream {
    pub stream_id: u64,
    /// File length at open time, reported for read streams
    pub length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Handshake(HandshakeResponse),
    File(FileInfo),
    Flag(bool),
    Blocks(Vec<BlockLocation>),
    Summary(PathSummary),
    Files(Vec<FileInfo>),
    Paths(Vec<FsPath>),
    Status(FsStatus),
    Opened(OpenedStream),
    Data(Vec<u8>),
}

impl Reply {
    pub fn kind(&self) -> ReplyKind {
        match self {
            Reply::Handshake(_) => ReplyKind::Handshake,
            Reply::File(_) => ReplyKind::File,
            Reply::Flag(_) => ReplyKind::Flag,
            Reply::Blocks(_) => ReplyKind::Blocks,
            Reply::Summary(_) => ReplyKind::Summary,
            Reply::Files(_) => ReplyKind::Files,
            Reply::Paths(_) => ReplyKind::Paths,
            Reply::Status(_) => ReplyKind::Status,
            Reply::Opened(_) => ReplyKind::Opened,
            Reply::Data(_) => ReplyKind::Data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Handshake,
    File,
    Flag,
    Blocks,
    Summary,
    Files,
    Paths,
    Status,
    Opened,
    Data,
}

/// Frames sent by the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerFrame {
    /// Reply to the command with the same id; `body` holds an encoded
    /// [`ReplyBody`]
    Response { id: u64, body: Vec<u8> },
    /// Out-of-band failure of a server-side stream, e.g. a write that could
    /// not be applied
    StreamNotice { stream_id: u64, message: String },
}

/// Decoded content of a response envelope
pub type ReplyBody = std::result::Result<Reply, RemoteError>;

impl ServerFrame {
    /// Build a response envelope with `codec`
    pub fn response<C: Codec>(
        codec: &C,
        id: u64,
        body: &ReplyBody,
    ) -> ripplefs_fabric::Result<Self> {
        Ok(ServerFrame::Response {
            id,
            body: codec.encode(body)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteErrorKind {
    NotFound,
    AlreadyExists,
    DirectoryNotEmpty,
    ParentNotDirectory,
    InvalidPath,
    Other,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::AlreadyExists => "already exists",
            RemoteErrorKind::DirectoryNotEmpty => "directory not empty",
            RemoteErrorKind::ParentNotDirectory => "parent is not a directory",
            RemoteErrorKind::InvalidPath => "invalid path",
            RemoteErrorKind::Other => "error",
        };
        f.write_str(label)
    }
}

/// Filesystem-level failure reported by the server
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(path: &FsPath) -> Self {
        Self::new(RemoteErrorKind::NotFound, path.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripplefs_fabric::codec::BincodeCodec;

    #[test]
    fn writes_expect_no_reply() {
        let write = Command::WriteBlock {
            stream_id: 1,
            data: vec![1],
        };
        assert_eq!(write.expected_reply(), None);
        assert_eq!(
            Command::CloseStream { stream_id: 1 }.expected_reply(),
            Some(ReplyKind::Flag)
        );
        assert_eq!(Command::Status.expected_reply(), Some(ReplyKind::Status));
    }

    #[test]
    fn response_body_is_decodable_on_its_own() {
        let codec = BincodeCodec;
        let body: ReplyBody = Err(RemoteError::not_found(&FsPath::new("/gone").unwrap()));
        let frame = ServerFrame::response(&codec, 7, &body).unwrap();

        let ServerFrame::Response { id, body: bytes } = frame else {
            panic!("expected a response frame");
        };
        assert_eq!(id, 7);
        let decoded: ReplyBody = codec.decode(&bytes).unwrap();
        assert!(decoded.unwrap_err().is_not_found());
    }

    #[test]
    fn remote_error_display() {
        let err = RemoteError::new(RemoteErrorKind::AlreadyExists, "/a");
        assert_eq!(err.to_string(), "already exists: /a");
    }
}
