//! Block-level stream I/O
//!
//! Streams are opened with one command and then addressed by descriptor.
//! Reads are request/response; writes are queued on the connection's single
//! writer and never answered, so failures come back as stream notices.

use ripplefs_core::{FsPath, Properties};
use tracing::debug;

use crate::client::FsClient;
use crate::error::{ClientError, Result};
use crate::protocol::{Command, OpenedStream, Reply};
use crate::registry::{StreamDescriptor, StreamMode};

/// Outcome of [`FsClient::read_data`]
///
/// `copied` bytes landed in the caller's buffer; anything that did not fit is
/// in `overflow`, which directly follows them in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadData {
    copied: usize,
    overflow: Vec<u8>,
}

impl ReadData {
    fn deliver(mut data: Vec<u8>, out: Option<&mut [u8]>) -> Self {
        match out {
            Some(buf) => {
                let copied = buf.len().min(data.len());
                buf[..copied].copy_from_slice(&data[..copied]);
                let overflow = data.split_off(copied);
                Self { copied, overflow }
            }
            None => Self {
                copied: 0,
                overflow: data,
            },
        }
    }

    pub fn copied(&self) -> usize {
        self.copied
    }

    pub fn overflow(&self) -> &[u8] {
        &self.overflow
    }

    pub fn into_overflow(self) -> Vec<u8> {
        self.overflow
    }

    /// Total bytes read
    pub fn len(&self) -> usize {
        self.copied + self.overflow.len()
    }

    /// Nothing left at this position
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FsClient {
    /// Open a file for reading
    ///
    /// `prefetch` is the number of sequential reads after which the server
    /// starts reading ahead.
    pub async fn open(&self, path: &FsPath, prefetch: Option<u32>) -> Result<StreamDescriptor> {
        let opened = self
            .open_stream(Command::OpenRead {
                path: path.clone(),
                prefetch,
            })
            .await?;
        self.track(path, StreamMode::Read, prefetch, opened)
    }

    /// Create a file, or truncate it when `overwrite` is set
    ///
    /// A `block_size` of 0 uses the filesystem default.
    pub async fn create(
        &self,
        path: &FsPath,
        overwrite: bool,
        colocate: bool,
        replication: u32,
        block_size: u64,
        properties: Option<Properties>,
    ) -> Result<StreamDescriptor> {
        let opened = self
            .open_stream(Command::OpenCreate {
                path: path.clone(),
                overwrite,
                colocate,
                replication,
                block_size,
                properties,
            })
            .await?;
        self.track(path, StreamMode::Write, None, opened)
    }

    pub async fn append(
        &self,
        path: &FsPath,
        create: bool,
        properties: Option<Properties>,
    ) -> Result<StreamDescriptor> {
        let opened = self
            .open_stream(Command::OpenAppend {
                path: path.clone(),
                create,
                properties,
            })
            .await?;
        self.track(path, StreamMode::Write, None, opened)
    }

    /// Read up to `len` bytes at `pos`
    ///
    /// Data goes into `out` first; whatever does not fit, or everything when
    /// `out` is `None`, is returned as overflow. Fewer than `len` bytes come
    /// back only at the end of the file. Reads longer than one frame can
    /// carry are split into consecutive block reads.
    pub async fn read_data(
        &self,
        desc: &StreamDescriptor,
        pos: u64,
        len: usize,
        out: Option<&mut [u8]>,
    ) -> Result<ReadData> {
        let conn = self.connection();
        let current = conn.registry().lookup(desc.local_id())?;
        if current.mode() != StreamMode::Read {
            return Err(ClientError::InvalidArgument(format!(
                "stream {} on {} is not open for reading",
                current.local_id(),
                current.path()
            )));
        }
        let chunk = conn.max_read_chunk()?.min(u32::MAX as usize);

        let mut data = Vec::with_capacity(len.min(chunk));
        let mut blocks = 0usize;
        while data.len() < len {
            let want = (len - data.len()).min(chunk);
            let reply = self
                .request(Command::ReadBlock {
                    stream_id: current.server_id(),
                    pos: pos + data.len() as u64,
                    len: want as u32,
                })
                .await?;
            let block = expect_reply!(reply, Reply::Data)?;
            if block.len() > want {
                return Err(ClientError::Protocol(format!(
                    "server returned {} bytes for a {want} byte read",
                    block.len()
                )));
            }
            blocks += 1;
            let at_end = block.len() < want;
            data.extend_from_slice(&block);
            if at_end {
                break;
            }
        }

        debug!(
            stream = current.local_id(),
            pos,
            requested = len,
            received = data.len(),
            blocks,
            "Read data"
        );
        Ok(ReadData::deliver(data, out))
    }

    /// Queue bytes for the end of a write stream
    ///
    /// Returns once the bytes are queued. Writes on one descriptor reach the
    /// server in calling order; a buffer larger than one frame can carry is
    /// split into consecutive blocks.
    pub fn write_data(&self, desc: &StreamDescriptor, data: &[u8]) -> Result<()> {
        let conn = self.connection();
        let current = conn.registry().lookup(desc.local_id())?;
        if current.mode() != StreamMode::Write {
            return Err(ClientError::InvalidArgument(format!(
                "stream {} on {} is not open for writing",
                current.local_id(),
                current.path()
            )));
        }

        let chunk = conn.max_write_chunk(current.server_id())?;
        let blocks: Vec<Command> = data
            .chunks(chunk)
            .map(|piece| Command::WriteBlock {
                stream_id: current.server_id(),
                data: piece.to_vec(),
            })
            .collect();
        let count = blocks.len();
        conn.send_oneway(blocks)?;
        debug!(stream = current.local_id(), len = data.len(), blocks = count, "Write queued");
        Ok(())
    }

    /// Close a stream on the server
    ///
    /// The descriptor is forgotten whatever the outcome, so it goes stale
    /// even when the close itself fails or times out.
    pub async fn close_stream(&self, desc: &StreamDescriptor) -> Result<bool> {
        let registry = self.connection().registry();
        let current = registry.lookup(desc.local_id())?;

        let outcome = self
            .request(Command::CloseStream {
                stream_id: current.server_id(),
            })
            .await
            .and_then(|reply| expect_reply!(reply, Reply::Flag));

        registry.unregister(current.local_id());
        debug!(stream = current.local_id(), ok = outcome.is_ok(), "Stream closed");
        outcome
    }

    async fn open_stream(&self, command: Command) -> Result<OpenedStream> {
        let reply = self.request(command).await?;
        expect_reply!(reply, Reply::Opened)
    }

    fn track(
        &self,
        path: &FsPath,
        mode: StreamMode,
        prefetch: Option<u32>,
        opened: OpenedStream,
    ) -> Result<StreamDescriptor> {
        let conn = self.connection();
        let desc = StreamDescriptor::new(
            conn.registry().allocate_id(),
            opened.stream_id,
            path.clone(),
            mode,
            prefetch,
            opened.length,
        );
        conn.register_stream(desc.clone())?;
        debug!(
            stream = desc.local_id(),
            server_stream = desc.server_id(),
            %path,
            ?mode,
            "Stream opened"
        );
        Ok(desc)
    }
}
