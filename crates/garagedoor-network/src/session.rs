//! One command session per connection.
//!
//! The session owns the framed stream. Inbound lines are handled in order
//! on the session task; outbound lines (command replies and status pushes)
//! go through a channel to a writer task, so a status subscription can push
//! while a command is still running.
//!
//! # Lifecycle
//!
//! 1. Send `GARAGEDOOR`
//! 2. Handle lines until the peer disconnects, sends an unknown command, or
//!    breaks framing
//! 3. Stop the status subscription, flush queued replies, close

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use garagedoor_control::{DoorController, StatusSubscription};
use garagedoor_protocol::{Command, LineCodec, Reply};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Outbound replies buffered per session.
const REPLY_QUEUE: usize = 32;

/// Log at `debug` for local peers and `info` for remote ones.
macro_rules! peer_log {
    ($local:expr, $($arg:tt)+) => {
        if $local {
            debug!($($arg)+);
        } else {
            info!($($arg)+);
        }
    };
}

/// Session metadata snapshot.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: Uuid,
    pub peer: SocketAddr,
    pub local: bool,
    pub connected_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn new(peer: SocketAddr, local: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            local,
            connected_at: Utc::now(),
        }
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.connected_at
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Closed {
    PeerDisconnected,
    UnknownCommand(String),
    Protocol(String),
}

/// Command session over any byte stream.
pub struct CommandSession<S> {
    framed: Framed<S, LineCodec>,
    controller: Arc<DoorController>,
    info: SessionInfo,
    subscription: Option<StatusSubscription>,
}

impl<S> CommandSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stream: S, controller: Arc<DoorController>, info: SessionInfo) -> Self {
        Self {
            framed: Framed::new(stream, LineCodec::new()),
            controller,
            info,
            subscription: None,
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Run the session to completion.
    pub async fn run(self) {
        let Self {
            framed,
            controller,
            info,
            mut subscription,
        } = self;
        let local = info.local;
        peer_log!(local, session = %info.id, peer = %info.peer, "Channel active");

        let (mut sink, mut lines) = framed.split::<Reply>();
        let (replies, mut queue) = mpsc::channel::<Reply>(REPLY_QUEUE);

        let writer = tokio::spawn(async move {
            while let Some(reply) = queue.recv().await {
                if let Err(e) = sink.send(reply).await {
                    debug!(error = %e, "Write failed");
                    return;
                }
            }
            let _ = sink.close().await;
        });

        let closed = if replies.send(Reply::Greeting).await.is_err() {
            Closed::PeerDisconnected
        } else {
            loop {
                let line = match lines.next().await {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => break Closed::Protocol(e.to_string()),
                    None => break Closed::PeerDisconnected,
                };
                if line.is_empty() {
                    continue;
                }

                match Command::parse(&line) {
                    Ok(command) => {
                        dispatch(command, &controller, &info, &replies, &mut subscription).await;
                    }
                    Err(_) => break Closed::UnknownCommand(line),
                }
            }
        };

        match &closed {
            Closed::PeerDisconnected => {}
            Closed::UnknownCommand(line) => {
                warn!(session = %info.id, peer = %info.peer, command = %line.to_lowercase(), "Unknown command");
            }
            Closed::Protocol(reason) => {
                warn!(session = %info.id, peer = %info.peer, %reason, "Protocol error");
            }
        }

        if let Some(subscription) = subscription.take() {
            subscription.stop().await;
            peer_log!(local, session = %info.id, "Status task done");
        }
        drop(replies);
        drop(lines);
        if let Err(e) = writer.await {
            warn!(session = %info.id, error = %e, "Writer task failed");
        }

        peer_log!(
            local,
            session = %info.id,
            peer = %info.peer,
            uptime_secs = info.uptime().num_seconds(),
            "Channel inactive"
        );
    }
}

async fn dispatch(
    command: Command,
    controller: &Arc<DoorController>,
    info: &SessionInfo,
    replies: &mpsc::Sender<Reply>,
    subscription: &mut Option<StatusSubscription>,
) {
    let local = info.local;
    match command {
        Command::Arm => {
            peer_log!(local, session = %info.id, "Execute arm");
            controller.toggle_close_task();
        }
        Command::Open => {
            peer_log!(local, session = %info.id, "Execute open");
            controller.open_door().await;
        }
        Command::Close => {
            peer_log!(local, session = %info.id, "Execute close");
            controller.close_door().await;
        }
        Command::OpenClose => {
            peer_log!(local, session = %info.id, "Execute open/close");
            controller.start_close_task();
        }
        Command::Toggle => {
            peer_log!(local, session = %info.id, "Execute toggle");
            controller.press_button().await;
        }
        Command::Ping => trace!(session = %info.id, "ping"),
        Command::Status => {
            peer_log!(local, session = %info.id, "Execute status");
            let active = subscription.as_ref().is_some_and(|s| !s.is_finished());
            if !active {
                *subscription = Some(controller.subscribe_status(replies.clone()));
                peer_log!(local, session = %info.id, "Status task start");
            }
        }
    }

    if let Some(reply) = command.reply() {
        // A closed queue means the writer already gave up on the peer.
        let _ = replies.send(reply).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garagedoor_control::mock::RecordingEffects;
    use garagedoor_hardware::mock::{BoardHandle, SimulatedBoard};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    fn controller() -> (Arc<DoorController>, BoardHandle) {
        let (board, handle) = SimulatedBoard::new();
        let controller = DoorController::builder(Arc::new(board), Arc::new(RecordingEffects::new()))
            .with_disarm_file("/nonexistent/garagedoor-test-disarm")
            .build();
        (controller, handle)
    }

    fn start(controller: Arc<DoorController>) -> (BufReader<DuplexStream>, tokio::task::JoinHandle<()>) {
        let (client, server) = tokio::io::duplex(4096);
        let info = SessionInfo::new("127.0.0.1:50000".parse().unwrap(), true);
        let session = CommandSession::new(server, controller, info);
        (BufReader::new(client), tokio::spawn(session.run()))
    }

    async fn read_line(client: &mut BufReader<DuplexStream>) -> Option<String> {
        let mut line = String::new();
        match client.read_line(&mut line).await.unwrap() {
            0 => None,
            _ => Some(line),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_and_toggle() {
        let (controller, handle) = controller();
        let (mut client, _task) = start(controller);

        assert_eq!(read_line(&mut client).await.unwrap(), "GARAGEDOOR\r\n");
        client.get_mut().write_all(b"TOGGLE\r\n").await.unwrap();
        assert_eq!(read_line(&mut client).await.unwrap(), "TOGGLE DONE\r\n");
        assert_eq!(handle.relay_pulses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_on_open_door_does_not_press() {
        let (controller, handle) = controller();
        handle.set_rollup(false, true);
        let (mut client, _task) = start(controller);
        read_line(&mut client).await.unwrap();

        client.get_mut().write_all(b"open\n").await.unwrap();
        assert_eq!(read_line(&mut client).await.unwrap(), "OPEN DONE\r\n");
        assert_eq!(handle.relay_pulses(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_lines_and_ping_are_silent() {
        let (controller, _handle) = controller();
        let (mut client, _task) = start(controller);
        read_line(&mut client).await.unwrap();

        client
            .get_mut()
            .write_all(b"\r\n\r\nping\r\nclose\r\n")
            .await
            .unwrap();
        assert_eq!(read_line(&mut client).await.unwrap(), "CLOSE DONE\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_command_closes_without_reply() {
        let (controller, _handle) = controller();
        let (mut client, task) = start(controller);
        read_line(&mut client).await.unwrap();

        client.get_mut().write_all(b"foo\r\n").await.unwrap();
        assert_eq!(read_line(&mut client).await, None);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_padded_command_closes_without_effect() {
        let (controller, handle) = controller();
        let (mut client, task) = start(controller);
        read_line(&mut client).await.unwrap();

        client.get_mut().write_all(b"toggle \r\n").await.unwrap();
        assert_eq!(read_line(&mut client).await, None);
        task.await.unwrap();
        assert_eq!(handle.relay_pulses(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_subscription_lifecycle() {
        let (controller, handle) = controller();
        let (mut client, task) = start(Arc::clone(&controller));
        read_line(&mut client).await.unwrap();

        client.get_mut().write_all(b"status\r\nstatus\r\n").await.unwrap();
        assert_eq!(
            read_line(&mut client).await.unwrap(),
            "STATUS CLOSED CLOSED CLEAR DISARMED\r\n"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(controller.registry().len(), 1);
        assert!(handle.is_on(garagedoor_hardware::OutputPin::LedStatus));

        drop(client);
        task.await.unwrap();
        assert!(controller.registry().is_empty());
        assert!(!handle.is_on(garagedoor_hardware::OutputPin::LedStatus));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_line_closes_session() {
        let (controller, _handle) = controller();
        let (mut client, task) = start(controller);
        read_line(&mut client).await.unwrap();

        let junk = vec![b'x'; 9000];
        client.get_mut().write_all(&junk).await.unwrap();
        assert_eq!(read_line(&mut client).await, None);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_toggles_without_reply() {
        let (controller, handle) = controller();
        handle.set_rollup(false, true);
        let (mut client, _task) = start(Arc::clone(&controller));
        read_line(&mut client).await.unwrap();

        client.get_mut().write_all(b"arm\r\nopenclose\r\n").await.unwrap();
        assert_eq!(read_line(&mut client).await.unwrap(), "OPENCLOSE DONE\r\n");
        assert!(controller.is_armed());

        client.get_mut().write_all(b"arm\r\nclose\r\n").await.unwrap();
        assert_eq!(read_line(&mut client).await.unwrap(), "CLOSE DONE\r\n");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!controller.is_armed());
    }
}
