//! Integration tests for GarageServer over real TCP sockets.

use garagedoor_control::DoorController;
use garagedoor_control::mock::RecordingEffects;
use garagedoor_hardware::mock::{BoardHandle, SimulatedBoard};
use garagedoor_network::{Acceptor, GarageServer, PlainAcceptor, TrustedSubnet};
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct Running {
    addr: SocketAddr,
    handle: BoardHandle,
    effects: Arc<RecordingEffects>,
    shutdown: CancellationToken,
    task: JoinHandle<garagedoor_network::Result<()>>,
}

async fn start<A: Acceptor>(acceptor: A) -> Running {
    let (board, handle) = SimulatedBoard::new();
    let effects = Arc::new(RecordingEffects::new());
    let controller = DoorController::builder(Arc::new(board), effects.clone())
        .with_disarm_file("/nonexistent/garagedoor-test-disarm")
        .build();

    let server = GarageServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        acceptor,
        controller,
        TrustedSubnet::loopback_only(),
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.run(shutdown.clone()));

    Running {
        addr,
        handle,
        effects,
        shutdown,
        task,
    }
}

async fn connect(addr: SocketAddr) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, write) = stream.into_split();
    (BufReader::new(read), write)
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> Option<String> {
    let mut line = String::new();
    let read = timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("read timed out")
        .unwrap();
    (read > 0).then_some(line)
}

#[tokio::test]
async fn test_greeting_then_toggle() {
    let server = start(PlainAcceptor).await;
    let (mut reader, mut writer) = connect(server.addr).await;

    assert_eq!(read_line(&mut reader).await.unwrap(), "GARAGEDOOR\r\n");
    writer.write_all(b"toggle\r\n").await.unwrap();
    assert_eq!(read_line(&mut reader).await.unwrap(), "TOGGLE DONE\r\n");
    assert_eq!(server.handle.relay_pulses(), 1);

    server.shutdown.cancel();
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_status_push_follows_door() {
    let server = start(PlainAcceptor).await;
    server.handle.set_rollup(false, true);
    let (mut reader, mut writer) = connect(server.addr).await;
    read_line(&mut reader).await.unwrap();

    writer.write_all(b"STATUS\r\n").await.unwrap();
    assert_eq!(
        read_line(&mut reader).await.unwrap(),
        "STATUS OPEN CLOSED CLEAR DISARMED\r\n"
    );

    writer.write_all(b"arm\r\n").await.unwrap();
    let mut pushes = Vec::new();
    while pushes.len() < 3 {
        let line = read_line(&mut reader).await.unwrap();
        if line == "STATUS OPEN CLOSED CLEAR ARMED\r\n" {
            break;
        }
        pushes.push(line);
    }
    assert!(pushes.len() < 3, "no armed push: {pushes:?}");

    writer.write_all(b"arm\r\n").await.unwrap();

    server.shutdown.cancel();
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_command_closes_connection() {
    let server = start(PlainAcceptor).await;
    let (mut reader, mut writer) = connect(server.addr).await;
    read_line(&mut reader).await.unwrap();

    writer.write_all(b"launch\r\n").await.unwrap();
    assert_eq!(read_line(&mut reader).await, None);

    // The server keeps accepting.
    let (mut reader, _writer) = connect(server.addr).await;
    assert_eq!(read_line(&mut reader).await.unwrap(), "GARAGEDOOR\r\n");

    server.shutdown.cancel();
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_concurrent_sessions_share_door() {
    let server = start(PlainAcceptor).await;
    let (mut first, mut first_writer) = connect(server.addr).await;
    let (mut second, mut second_writer) = connect(server.addr).await;
    read_line(&mut first).await.unwrap();
    read_line(&mut second).await.unwrap();

    first_writer.write_all(b"toggle\r\n").await.unwrap();
    second_writer.write_all(b"toggle\r\n").await.unwrap();
    assert_eq!(read_line(&mut first).await.unwrap(), "TOGGLE DONE\r\n");
    assert_eq!(read_line(&mut second).await.unwrap(), "TOGGLE DONE\r\n");
    assert_eq!(server.handle.relay_pulses(), 2);

    server.shutdown.cancel();
    server.task.await.unwrap().unwrap();
}

/// Rejects every handshake as unauthenticated.
struct RejectingAcceptor;

impl Acceptor for RejectingAcceptor {
    type Stream = TcpStream;

    fn accept(&self, _stream: TcpStream) -> impl Future<Output = io::Result<TcpStream>> + Send {
        std::future::ready(Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "peer sent no certificates",
        )))
    }
}

/// Fails every handshake with a network error.
struct ResettingAcceptor;

impl Acceptor for ResettingAcceptor {
    type Stream = TcpStream;

    fn accept(&self, _stream: TcpStream) -> impl Future<Output = io::Result<TcpStream>> + Send {
        std::future::ready(Err(io::Error::from(io::ErrorKind::ConnectionReset)))
    }
}

/// Never completes a handshake.
struct StallingAcceptor;

impl Acceptor for StallingAcceptor {
    type Stream = TcpStream;

    fn accept(&self, stream: TcpStream) -> impl Future<Output = io::Result<TcpStream>> + Send {
        async move {
            let _held = stream;
            std::future::pending().await
        }
    }
}

async fn wait_closed(addr: SocketAddr) {
    let (mut reader, _writer) = connect(addr).await;
    assert_eq!(read_line(&mut reader).await, None);
}

/// The socket closes before the ban is recorded, so poll for it.
async fn wait_bans(effects: &RecordingEffects, count: usize) -> Vec<IpAddr> {
    timeout(Duration::from_secs(5), async {
        loop {
            let bans = effects.bans();
            if bans.len() >= count {
                return bans;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("ban not recorded")
}

#[tokio::test]
async fn test_failed_authentication_bans_once() {
    let server = start(RejectingAcceptor).await;

    wait_closed(server.addr).await;
    wait_bans(&server.effects, 1).await;
    wait_closed(server.addr).await;
    wait_closed(server.addr).await;

    assert_eq!(server.effects.bans(), vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);

    server.shutdown.cancel();
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_ban_is_reissued_after_ban_time() {
    let (board, _handle) = SimulatedBoard::new();
    let effects = Arc::new(RecordingEffects::new());
    let controller = DoorController::builder(Arc::new(board), effects.clone()).build();
    let server = GarageServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        RejectingAcceptor,
        controller,
        TrustedSubnet::loopback_only(),
    )
    .await
    .unwrap()
    .with_ban_time(Duration::from_millis(200));
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.run(shutdown.clone()));

    wait_closed(addr).await;
    wait_bans(&effects, 1).await;
    wait_closed(addr).await;
    assert_eq!(effects.bans().len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    wait_closed(addr).await;
    assert_eq!(
        wait_bans(&effects, 2).await,
        vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V4(Ipv4Addr::LOCALHOST)]
    );

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_network_errors_never_ban() {
    let server = start(ResettingAcceptor).await;

    wait_closed(server.addr).await;
    wait_closed(server.addr).await;
    assert!(server.effects.bans().is_empty());

    server.shutdown.cancel();
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_handshake_timeout_drops_connection() {
    let (board, _handle) = SimulatedBoard::new();
    let effects = Arc::new(RecordingEffects::new());
    let controller = DoorController::builder(Arc::new(board), effects.clone()).build();
    let server = GarageServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        StallingAcceptor,
        controller,
        TrustedSubnet::loopback_only(),
    )
    .await
    .unwrap()
    .with_handshake_timeout(Duration::from_millis(100));
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.run(shutdown.clone()));

    let started = tokio::time::Instant::now();
    wait_closed(addr).await;
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(effects.bans().is_empty());

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let server = start(PlainAcceptor).await;
    let (board, _handle) = SimulatedBoard::new();
    let controller = DoorController::builder(Arc::new(board), Arc::new(RecordingEffects::new())).build();

    let err = GarageServer::bind(server.addr, PlainAcceptor, controller, TrustedSubnet::loopback_only())
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("Failed to bind"));

    server.shutdown.cancel();
    server.task.await.unwrap().unwrap();
}
