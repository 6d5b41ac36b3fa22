#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use ripplefs_client::protocol::{ClientFrame, OpenedStream, ReplyBody, ServerFrame};
use ripplefs_client::{
    ClientConfig, Command, ConnectionState, Endpoint, FileInfo, FileKind, FsClient, FsPath,
    HandshakeResponse, Properties, Reply, StreamDescriptor,
};
use ripplefs_fabric::codec::BincodeCodec;
use ripplefs_fabric::transport::TcpTransportListener;
use ripplefs_fabric::Channel;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn path(raw: &str) -> FsPath {
    FsPath::new(raw).unwrap()
}

pub fn handshake_response() -> HandshakeResponse {
    HandshakeResponse {
        fs_name: "ripple".to_string(),
        block_size: 64 * 1024,
        sampling: None,
        secondary_uri: None,
    }
}

pub fn file_info(path: &FsPath, length: u64) -> FileInfo {
    FileInfo {
        path: path.clone(),
        kind: FileKind::File,
        length,
        block_size: 64 * 1024,
        group_block_size: 1,
        access_time: 0,
        modification_time: 0,
        properties: Properties::new(),
    }
}

/// Scripted coordinator driving one client at a time
pub struct FakeCoordinator {
    listener: TcpTransportListener,
    addr: SocketAddr,
}

impl FakeCoordinator {
    pub async fn bind() -> Self {
        init_tracing();
        let listener = TcpTransportListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        Self { listener, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(Endpoint::Tcp(self.addr)).with_fs_name("ripple")
    }

    pub async fn accept(&self) -> Session {
        let (transport, _) = self.listener.accept().await.unwrap();
        Session {
            channel: Channel::from_transport(transport, BincodeCodec),
        }
    }

    /// Connect a client with `config` and complete its handshake
    pub async fn connect_with(&self, config: ClientConfig) -> (FsClient, Session) {
        let (client, session) = tokio::join!(FsClient::connect(config), async {
            let mut session = self.accept().await;
            session.expect_handshake().await;
            session
        });
        (client.unwrap(), session)
    }

    pub async fn connect(&self) -> (FsClient, Session) {
        self.connect_with(self.config()).await
    }
}

/// Server side of one accepted connection
pub struct Session {
    channel: Channel<BincodeCodec>,
}

impl Session {
    pub async fn recv(&mut self) -> ClientFrame {
        self.try_recv().await.unwrap()
    }

    pub async fn try_recv(&mut self) -> ripplefs_fabric::Result<ClientFrame> {
        self.channel.receive().await
    }

    pub async fn reply(&mut self, id: u64, body: ReplyBody) {
        let frame = ServerFrame::response(&BincodeCodec, id, &body).unwrap();
        self.channel.send(&frame).await.unwrap();
    }

    /// Send a response envelope with an arbitrary body
    pub async fn reply_raw(&mut self, id: u64, body: Vec<u8>) {
        self.channel
            .send(&ServerFrame::Response { id, body })
            .await
            .unwrap();
    }

    pub async fn notice(&mut self, stream_id: u64, message: &str) {
        let frame = ServerFrame::StreamNotice {
            stream_id,
            message: message.to_string(),
        };
        self.channel.send(&frame).await.unwrap();
    }

    /// Receive one command and answer it with whatever `respond` returns
    pub async fn serve_one(&mut self, respond: impl FnOnce(&Command) -> ReplyBody) -> Command {
        let frame = self.recv().await;
        let body = respond(&frame.command);
        self.reply(frame.id, body).await;
        frame.command
    }

    pub async fn expect_handshake(&mut self) -> Command {
        self.serve_one(|command| {
            assert!(
                matches!(command, Command::Handshake { .. }),
                "expected a handshake, got {command:?}"
            );
            Ok(Reply::Handshake(handshake_response()))
        })
        .await
    }

    /// Answer an open command with server stream `stream_id`
    pub async fn expect_open(&mut self, stream_id: u64, length: Option<u64>) -> Command {
        self.serve_one(|command| {
            assert!(
                matches!(
                    command,
                    Command::OpenRead { .. }
                        | Command::OpenCreate { .. }
                        | Command::OpenAppend { .. }
                ),
                "expected an open, got {command:?}"
            );
            Ok(Reply::Opened(OpenedStream { stream_id, length }))
        })
        .await
    }
}

pub async fn open_read(
    client: &FsClient,
    session: &mut Session,
    file: &str,
    stream_id: u64,
    length: u64,
) -> StreamDescriptor {
    let file = path(file);
    let (desc, _) = tokio::join!(
        client.open(&file, None),
        session.expect_open(stream_id, Some(length))
    );
    desc.unwrap()
}

pub async fn open_write(
    client: &FsClient,
    session: &mut Session,
    file: &str,
    stream_id: u64,
) -> StreamDescriptor {
    let file = path(file);
    let (desc, _) = tokio::join!(
        client.create(&file, true, false, 1, 0, None),
        session.expect_open(stream_id, None)
    );
    desc.unwrap()
}

pub async fn wait_for_state(client: &FsClient, want: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while client.state() != want {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("client never reached {want}, still {}", client.state()));
}
