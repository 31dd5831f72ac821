//! Integration tests for LineCodec over Tokio streams.

use futures::{SinkExt, StreamExt};
use garagedoor_core::{ArmedStatus, BeamStatus, DoorStatus, Error, RollupStatus, StatusReport};
use garagedoor_protocol::{Command, LineCodec, Reply};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Framed, FramedRead};

fn create_framed_duplex(
    buffer_size: usize,
) -> (Framed<DuplexStream, LineCodec>, Framed<DuplexStream, LineCodec>) {
    let (client, server) = tokio::io::duplex(buffer_size);
    (
        Framed::new(client, LineCodec::new()),
        Framed::new(server, LineCodec::new()),
    )
}

#[tokio::test]
async fn test_greeting_then_command() {
    let (mut client, mut server) = create_framed_duplex(1024);

    server.send(Reply::Greeting).await.unwrap();
    assert_eq!(client.next().await.unwrap().unwrap(), "GARAGEDOOR");

    client.send(Command::Toggle).await.unwrap();
    let line = server.next().await.unwrap().unwrap();
    assert_eq!(Command::parse(&line).unwrap(), Command::Toggle);

    server.send(Command::Toggle.reply().unwrap()).await.unwrap();
    assert_eq!(client.next().await.unwrap().unwrap(), "TOGGLE DONE");
}

#[tokio::test]
async fn test_status_line_parses_back() {
    let (mut client, mut server) = create_framed_duplex(1024);
    let report = StatusReport {
        rollup: RollupStatus::Open,
        door: DoorStatus::Closed,
        beam: BeamStatus::Clear,
        armed: ArmedStatus::Armed,
    };

    server.send(Reply::Status(report)).await.unwrap();
    let line = client.next().await.unwrap().unwrap();
    assert_eq!(StatusReport::parse_line(&line).unwrap(), report);
}

#[tokio::test]
async fn test_lines_split_across_writes() {
    let (mut raw, server) = tokio::io::duplex(64);
    let mut lines = FramedRead::new(server, LineCodec::new());

    raw.write_all(b"sta").await.unwrap();
    raw.write_all(b"tus\r").await.unwrap();
    raw.write_all(b"\nping\n").await.unwrap();
    drop(raw);

    assert_eq!(lines.next().await.unwrap().unwrap(), "status");
    assert_eq!(lines.next().await.unwrap().unwrap(), "ping");
    assert!(lines.next().await.is_none());
}

#[tokio::test]
async fn test_oversized_line_is_an_error() {
    let (mut raw, server) = tokio::io::duplex(64 * 1024);
    let mut lines = FramedRead::new(server, LineCodec::new());

    raw.write_all(&vec![b'a'; 10_000]).await.unwrap();

    let result = lines.next().await.unwrap();
    assert!(matches!(result, Err(Error::LineTooLong { .. })));
}

#[tokio::test]
async fn test_encoded_bytes_use_crlf() {
    let (client, mut raw) = tokio::io::duplex(1024);
    let mut framed = Framed::new(client, LineCodec::new());

    framed.send(Reply::OpenDone).await.unwrap();
    drop(framed);

    let mut bytes = Vec::new();
    raw.read_to_end(&mut bytes).await.unwrap();
    assert_eq!(bytes, b"OPEN DONE\r\n");
}
