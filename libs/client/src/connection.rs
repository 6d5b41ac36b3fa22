//! One multiplexed connection to the coordinator
//!
//! A writer task owns the write half and drains an unbounded queue, so the
//! order frames are enqueued in is the order they hit the wire. A receive
//! task owns the read half and routes every server frame. The state mutex is
//! the single gate between issuing work and failing it: commands and streams
//! are only registered while the state is live, and the transition to
//! `Faulted` happens under the same lock before anything is swept.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ripplefs_core::HandshakeResponse;
use ripplefs_fabric::codec::{BincodeCodec, Codec};
use ripplefs_fabric::transport::{TcpTransport, UnixTransport};
use ripplefs_fabric::{Channel, ChannelReader, ChannelWriter, Error as FabricError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ClientConfig, Endpoint};
use crate::dispatcher::{Dispatcher, PendingCommand};
use crate::error::{ClientError, Result};
use crate::lock;
use crate::notifier;
use crate::protocol::{ClientFrame, Command, Reply, ReplyBody, ServerFrame, NO_REPLY_ID};
use crate::registry::{StreamDescriptor, StreamRegistry};

/// How long `close` waits for queued frames to be flushed
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Connected,
    Closing,
    Closed,
    /// Lost to an I/O error or an unrecoverable protocol violation
    Faulted,
}

impl ConnectionState {
    /// Whether new commands and streams are accepted
    pub fn is_live(self) -> bool {
        matches!(self, ConnectionState::Handshaking | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Faulted => "faulted",
        };
        f.write_str(label)
    }
}

enum Outbound {
    Frame(Vec<u8>),
    /// Flush everything queued before it, shut the write half, then ack
    Shutdown(oneshot::Sender<()>),
}

#[derive(Default)]
struct Tasks {
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

pub(crate) struct Connection {
    endpoint: String,
    state: Mutex<ConnectionState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    codec: BincodeCodec,
    /// Largest encoded frame either side may put on the wire
    max_frame_len: usize,
    dispatcher: Dispatcher,
    registry: StreamRegistry,
    tasks: Mutex<Tasks>,
}

impl Connection {
    /// Connect, start the I/O tasks and run the initial handshake
    pub(crate) async fn open(config: &ClientConfig) -> Result<(Arc<Self>, HandshakeResponse)> {
        config.validate()?;
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| ClientError::Configuration("endpoint is not set".to_string()))?;

        info!(%endpoint, fs_name = ?config.fs_name, "Connecting to coordinator");
        let channel = connect_channel(&endpoint, config).await.map_err(|e| {
            ClientError::ConnectionSetup(format!("failed to connect to {endpoint}: {e}"))
        })?;
        let (writer, reader) = channel.into_split();
        let (outbound, queue) = mpsc::unbounded_channel();

        let conn = Arc::new(Self {
            endpoint: endpoint.to_string(),
            state: Mutex::new(ConnectionState::Disconnected),
            outbound,
            codec: BincodeCodec,
            max_frame_len: config.max_frame_len,
            dispatcher: Dispatcher::new(),
            registry: StreamRegistry::new(),
            tasks: Mutex::new(Tasks::default()),
        });

        let writer_task = tokio::spawn(write_loop(Arc::clone(&conn), writer, queue));
        let reader_task = tokio::spawn(read_loop(Arc::clone(&conn), reader));
        {
            let mut tasks = lock(&conn.tasks);
            tasks.writer = Some(writer_task);
            tasks.reader = Some(reader_task);
        }

        conn.transition(ConnectionState::Disconnected, ConnectionState::Handshaking);
        let handshake = conn
            .handshake(
                config.fs_name.clone(),
                config.log_dir.clone(),
                Some(config.handshake_timeout()),
            )
            .await;

        match handshake {
            Ok(response) => {
                conn.transition(ConnectionState::Handshaking, ConnectionState::Connected);
                info!(
                    endpoint = %conn.endpoint,
                    fs_name = %response.fs_name,
                    block_size = response.block_size,
                    "Connected to coordinator"
                );
                Ok((conn, response))
            }
            Err(e) => {
                conn.fault(&format!("handshake failed: {e}"));
                // the receiver may have faulted before its handle was stored
                conn.abort_tasks();
                Err(ClientError::ConnectionSetup(format!(
                    "handshake with {endpoint} failed: {e}"
                )))
            }
        }
    }

    /// Identify the client and fetch the filesystem parameters
    pub(crate) async fn handshake(
        &self,
        fs_name: Option<String>,
        log_dir: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<HandshakeResponse> {
        let reply = self
            .issue(Command::Handshake { fs_name, log_dir })?
            .wait(timeout)
            .await?;
        expect_reply!(reply, Reply::Handshake)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Run `f` with `value` only while the connection is live, holding the
    /// state lock; otherwise hand `value` back
    pub(crate) fn if_live<T, R>(
        &self,
        value: T,
        f: impl FnOnce(T) -> R,
    ) -> std::result::Result<R, T> {
        let state = lock(&self.state);
        if state.is_live() {
            Ok(f(value))
        } else {
            Err(value)
        }
    }

    /// Send a command and register for its reply
    pub(crate) fn issue(&self, command: Command) -> Result<PendingCommand> {
        let expected = command.expected_reply().ok_or_else(|| {
            ClientError::InvalidArgument("command does not produce a reply".to_string())
        })?;
        let id = self.dispatcher.next_id();
        let bytes = self.encode(id, command)?;

        let state = lock(&self.state);
        if !state.is_live() {
            return Err(self.lost(*state));
        }
        let pending = self.dispatcher.insert(id, expected);
        if self.outbound.send(Outbound::Frame(bytes)).is_err() {
            self.dispatcher.discard(id);
            return Err(self.lost(*state));
        }
        trace!(id, ?expected, "Command queued");
        Ok(pending)
    }

    /// Queue commands the server never answers
    ///
    /// The frames are queued back to back under the state lock, so no other
    /// frame lands between them.
    pub(crate) fn send_oneway(&self, commands: impl IntoIterator<Item = Command>) -> Result<()> {
        let frames = commands
            .into_iter()
            .map(|command| self.encode(NO_REPLY_ID, command))
            .collect::<Result<Vec<_>>>()?;
        let sent = self.if_live(frames, |frames| {
            frames
                .into_iter()
                .all(|bytes| self.outbound.send(Outbound::Frame(bytes)).is_ok())
        });
        match sent {
            Ok(true) => Ok(()),
            _ => Err(self.lost(self.state())),
        }
    }

    /// Largest payload a single `WriteBlock` on `stream_id` can carry
    pub(crate) fn max_write_chunk(&self, stream_id: u64) -> Result<usize> {
        let empty = Command::WriteBlock {
            stream_id,
            data: Vec::new(),
        };
        let envelope = self.encode(NO_REPLY_ID, empty)?.len();
        self.room_after(envelope)
    }

    /// Largest `ReadBlock` length whose reply still fits in one frame
    pub(crate) fn max_read_chunk(&self) -> Result<usize> {
        let empty: ReplyBody = Ok(Reply::Data(Vec::new()));
        let envelope = ServerFrame::response(&self.codec, 0, &empty)
            .and_then(|frame| self.codec.encode(&frame))
            .map_err(|e| ClientError::Protocol(format!("failed to size a read reply: {e}")))?
            .len();
        self.room_after(envelope)
    }

    /// Track an opened stream, unless the connection has already gone down
    pub(crate) fn register_stream(&self, descriptor: StreamDescriptor) -> Result<()> {
        self.if_live(descriptor, |descriptor| self.registry.register(descriptor))
            .map_err(|_| self.lost(self.state()))
    }

    /// Move to `Faulted` and fail everything outstanding
    ///
    /// Only the first caller does the sweep; returns whether this call did.
    pub(crate) fn fault(&self, reason: &str) -> bool {
        {
            let mut state = lock(&self.state);
            if matches!(*state, ConnectionState::Faulted | ConnectionState::Closed) {
                return false;
            }
            *state = ConnectionState::Faulted;
        }

        error!(endpoint = %self.endpoint, reason, "Connection lost");
        let failed = self.dispatcher.fail_all(reason);
        notifier::notify_connection_lost(&self.registry);
        debug!(failed, "Failed pending commands");
        self.abort_tasks();
        true
    }

    /// Flush queued frames, shut the transport down and fail whatever is
    /// still pending, without notifying stream listeners
    pub(crate) async fn close(&self) {
        {
            let mut state = lock(&self.state);
            if !state.is_live() {
                debug!(state = %*state, "Close on a connection that is not live");
                return;
            }
            *state = ConnectionState::Closing;
        }
        info!(endpoint = %self.endpoint, "Closing connection");

        let (done, flushed) = oneshot::channel();
        if self.outbound.send(Outbound::Shutdown(done)).is_ok()
            && tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, flushed).await.is_err()
        {
            warn!(endpoint = %self.endpoint, "Outbound queue not flushed before close");
        }

        if !self.transition(ConnectionState::Closing, ConnectionState::Closed) {
            // faulted while flushing, the fault path already swept
            return;
        }
        let failed = self.dispatcher.fail_all("connection closed");
        let streams = self.registry.drain().len();
        self.abort_tasks();
        info!(endpoint = %self.endpoint, failed, streams, "Connection closed");
    }

    /// Synchronous teardown used when the client is dropped without `close`
    pub(crate) fn shutdown_now(&self) {
        let was = {
            let mut state = lock(&self.state);
            let was = *state;
            *state = ConnectionState::Closed;
            was
        };
        if was.is_live() || was == ConnectionState::Closing {
            self.dispatcher.fail_all("client dropped");
            self.registry.drain();
            debug!(endpoint = %self.endpoint, "Connection dropped without close");
        }
        self.abort_tasks();
    }

    fn dispatch(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Response { id, body } => {
                trace!(id, len = body.len(), "Response received");
                self.dispatcher.complete(id, &body, &self.codec);
            }
            ServerFrame::StreamNotice { stream_id, message } => {
                warn!(server_stream = stream_id, %message, "Server reported a stream failure");
                notifier::notify_stream_error(&self.registry, stream_id, &message);
            }
        }
    }

    /// Encode a frame, refusing anything the writer could not send
    fn encode(&self, id: u64, command: Command) -> Result<Vec<u8>> {
        let bytes = self
            .codec
            .encode(&ClientFrame { id, command })
            .map_err(|e| ClientError::Protocol(format!("failed to encode command {id}: {e}")))?;
        if bytes.len() > self.max_frame_len {
            return Err(ClientError::InvalidArgument(format!(
                "command encodes to {} bytes, over the {} byte frame limit",
                bytes.len(),
                self.max_frame_len
            )));
        }
        Ok(bytes)
    }

    fn room_after(&self, envelope: usize) -> Result<usize> {
        match self.max_frame_len.checked_sub(envelope) {
            Some(room) if room > 0 => Ok(room),
            _ => Err(ClientError::InvalidArgument(format!(
                "frame limit of {} bytes leaves no room for stream data",
                self.max_frame_len
            ))),
        }
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let mut state = lock(&self.state);
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    fn lost(&self, state: ConnectionState) -> ClientError {
        ClientError::ConnectionLost(format!("connection to {} is {state}", self.endpoint))
    }

    fn abort_tasks(&self) {
        let mut tasks = lock(&self.tasks);
        for task in [tasks.writer.take(), tasks.reader.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

async fn connect_channel(
    endpoint: &Endpoint,
    config: &ClientConfig,
) -> ripplefs_fabric::Result<Channel<BincodeCodec>> {
    match endpoint {
        Endpoint::Tcp(addr) => {
            let transport = TcpTransport::builder()
                .address(*addr)
                .connect_timeout(config.connect_timeout())
                .max_frame_len(config.max_frame_len)
                .connect()
                .await?;
            Ok(Channel::from_transport(transport, BincodeCodec))
        }
        Endpoint::Unix(path) => {
            let transport = UnixTransport::builder()
                .path(path)
                .connect_timeout(config.connect_timeout())
                .max_frame_len(config.max_frame_len)
                .connect()
                .await?;
            Ok(Channel::from_transport(transport, BincodeCodec))
        }
    }
}

async fn write_loop(
    conn: Arc<Connection>,
    mut writer: ChannelWriter<BincodeCodec>,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
) {
    debug!(endpoint = %conn.endpoint, "Writer started");
    while let Some(outbound) = queue.recv().await {
        match outbound {
            Outbound::Frame(bytes) => {
                if let Err(e) = writer.send_encoded(&bytes).await {
                    conn.fault(&format!("send failed: {e}"));
                    return;
                }
            }
            Outbound::Shutdown(done) => {
                if let Err(e) = writer.close().await {
                    debug!(error = %e, "Write half shutdown failed");
                }
                let _ = done.send(());
                debug!(endpoint = %conn.endpoint, "Writer stopped");
                return;
            }
        }
    }
}

async fn read_loop(conn: Arc<Connection>, mut reader: ChannelReader<BincodeCodec>) {
    debug!(endpoint = %conn.endpoint, "Receiver started");
    loop {
        match reader.receive::<ServerFrame>().await {
            Ok(frame) => conn.dispatch(frame),
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Skipping undecodable server frame");
            }
            Err(FabricError::ConnectionClosed)
                if matches!(
                    conn.state(),
                    ConnectionState::Closing | ConnectionState::Closed
                ) =>
            {
                debug!(endpoint = %conn.endpoint, "Receiver stopped");
                return;
            }
            Err(e) => {
                conn.fault(&format!("receive failed: {e}"));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_handshaking_and_connected_are_live() {
        assert!(ConnectionState::Handshaking.is_live());
        assert!(ConnectionState::Connected.is_live());
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Closing,
            ConnectionState::Closed,
            ConnectionState::Faulted,
        ] {
            assert!(!state.is_live(), "{state} should not be live");
        }
    }
}
