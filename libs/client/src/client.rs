use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ripplefs_core::{
    BlockLocation, FileInfo, FsPath, FsStatus, HandshakeResponse, PathSummary, Properties,
};
use ripplefs_discovery::AddressResolver;
use tracing::{debug, info};

use crate::config::{ClientConfig, Endpoint};
use crate::connection::{Connection, ConnectionState};
use crate::error::{ClientError, Result};
use crate::lock;
use crate::protocol::{Command, Reply};

/// Filesystem client bound to one coordinator connection
///
/// Every method takes `&self`; share the client between tasks with an `Arc`.
/// Once the connection is lost the client stays unusable and every call
/// fails with [`ClientError::ConnectionLost`].
pub struct FsClient {
    conn: Arc<Connection>,
    config: ClientConfig,
    handshake: Mutex<HandshakeResponse>,
}

impl FsClient {
    /// Connect and handshake
    ///
    /// # Errors
    /// - [`ClientError::Configuration`] if `config` does not validate
    /// - [`ClientError::ConnectionSetup`] if the connection or handshake fails
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let (conn, handshake) = Connection::open(&config).await?;
        Ok(Self {
            conn,
            config,
            handshake: Mutex::new(handshake),
        })
    }

    /// Connect to the lowest address reported by `resolver`
    pub async fn connect_discovered(
        config: ClientConfig,
        resolver: &dyn AddressResolver,
    ) -> Result<Self> {
        let addresses = resolver.registered_addresses().await?;
        let Some(addr) = addresses.iter().next().copied() else {
            return Err(ClientError::Configuration(
                "no registered coordinator addresses".to_string(),
            ));
        };
        info!(%addr, candidates = addresses.len(), "Resolved coordinator address");
        Self::connect(config.with_endpoint(Endpoint::Tcp(addr))).await
    }

    /// Re-identify this client, e.g. with a new log directory
    pub async fn handshake(&self, log_dir: Option<&str>) -> Result<HandshakeResponse> {
        let response = self
            .conn
            .handshake(
                self.config.fs_name.clone(),
                log_dir.map(str::to_string),
                Some(self.config.handshake_timeout()),
            )
            .await?;
        *lock(&self.handshake) = response.clone();
        Ok(response)
    }

    /// The most recent handshake response
    pub fn handshake_response(&self) -> HandshakeResponse {
        lock(&self.handshake).clone()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub async fn info(&self, path: &FsPath) -> Result<FileInfo> {
        let reply = self.request(Command::Info { path: path.clone() }).await?;
        expect_reply!(reply, Reply::File)
    }

    /// Merge `properties` into the file's properties
    pub async fn update(&self, path: &FsPath, properties: Properties) -> Result<FileInfo> {
        let reply = self
            .request(Command::Update {
                path: path.clone(),
                properties,
            })
            .await?;
        expect_reply!(reply, Reply::File)
    }

    /// Times are milliseconds since the Unix epoch
    pub async fn set_times(
        &self,
        path: &FsPath,
        access_time: i64,
        modification_time: i64,
    ) -> Result<bool> {
        let reply = self
            .request(Command::SetTimes {
                path: path.clone(),
                access_time,
                modification_time,
            })
            .await?;
        expect_reply!(reply, Reply::Flag)
    }

    pub async fn rename(&self, src: &FsPath, dest: &FsPath) -> Result<bool> {
        let reply = self
            .request(Command::Rename {
                src: src.clone(),
                dest: dest.clone(),
            })
            .await?;
        expect_reply!(reply, Reply::Flag)
    }

    pub async fn delete(&self, path: &FsPath, recursive: bool) -> Result<bool> {
        let reply = self
            .request(Command::Delete {
                path: path.clone(),
                recursive,
            })
            .await?;
        expect_reply!(reply, Reply::Flag)
    }

    /// Where the blocks covering `start..start + len` live, ordered by offset
    pub async fn affinity(
        &self,
        path: &FsPath,
        start: u64,
        len: u64,
    ) -> Result<Vec<BlockLocation>> {
        let reply = self
            .request(Command::Affinity {
                path: path.clone(),
                start,
                len,
            })
            .await?;
        let mut blocks = expect_reply!(reply, Reply::Blocks)?;
        blocks.sort_by_key(|block| block.start);
        Ok(blocks)
    }

    pub async fn content_summary(&self, path: &FsPath) -> Result<PathSummary> {
        let reply = self.request(Command::PathSummary { path: path.clone() }).await?;
        expect_reply!(reply, Reply::Summary)
    }

    /// Create a directory and any missing parents
    pub async fn mkdirs(&self, path: &FsPath, properties: Properties) -> Result<bool> {
        let reply = self
            .request(Command::Mkdirs {
                path: path.clone(),
                properties,
            })
            .await?;
        expect_reply!(reply, Reply::Flag)
    }

    pub async fn list_files(&self, path: &FsPath) -> Result<Vec<FileInfo>> {
        let reply = self.request(Command::ListFiles { path: path.clone() }).await?;
        expect_reply!(reply, Reply::Files)
    }

    pub async fn list_paths(&self, path: &FsPath) -> Result<Vec<FsPath>> {
        let reply = self.request(Command::ListPaths { path: path.clone() }).await?;
        expect_reply!(reply, Reply::Paths)
    }

    pub async fn fs_status(&self) -> Result<FsStatus> {
        let reply = self.request(Command::Status).await?;
        expect_reply!(reply, Reply::Status)
    }

    /// Send any command that expects a reply and wait up to `timeout`
    pub async fn execute(&self, command: Command, timeout: Option<Duration>) -> Result<Reply> {
        self.conn.issue(command)?.wait(timeout).await
    }

    /// Shut the connection down
    ///
    /// Queued writes are flushed first. Commands still waiting fail with
    /// [`ClientError::ConnectionLost`]; stream listeners are not notified.
    pub async fn close(&self) {
        self.conn.close().await;
    }

    pub(crate) async fn request(&self, command: Command) -> Result<Reply> {
        self.execute(command, self.config.request_timeout()).await
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl fmt::Debug for FsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsClient")
            .field("endpoint", &self.conn.endpoint())
            .field("state", &self.conn.state())
            .finish_non_exhaustive()
    }
}

impl Drop for FsClient {
    fn drop(&mut self) {
        self.conn.shutdown_now();
        debug!(endpoint = %self.conn.endpoint(), "Client dropped");
    }
}
