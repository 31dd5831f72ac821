//! Accept loop.
//!
//! Every accepted socket gets its own task: the [`Acceptor`] runs the
//! handshake under a timeout, then a [`CommandSession`] takes over. A peer
//! whose handshake fails authentication is banned. Repeat failures from the
//! same address are not banned again until the ban time has passed.

use crate::error::{Result, ServerError};
use crate::peer::TrustedSubnet;
use crate::session::{CommandSession, SessionInfo};
use garagedoor_control::DoorController;
use garagedoor_core::constants::{DEFAULT_BAN_TIME_MS, HANDSHAKE_TIMEOUT_MS};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Turns an accepted socket into a session stream.
///
/// An error of kind [`io::ErrorKind::InvalidData`] means the peer failed
/// authentication; any other error is treated as a plain network failure.
pub trait Acceptor: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&self, stream: TcpStream) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Accepts every connection as-is, without TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainAcceptor;

impl Acceptor for PlainAcceptor {
    type Stream = TcpStream;

    fn accept(&self, stream: TcpStream) -> impl Future<Output = io::Result<TcpStream>> + Send {
        std::future::ready(Ok(stream))
    }
}

/// Listening server bound to one port.
pub struct GarageServer<A> {
    listener: TcpListener,
    acceptor: Arc<A>,
    controller: Arc<DoorController>,
    subnet: TrustedSubnet,
    bans: Arc<BanRecord>,
    handshake_timeout: Duration,
}

impl<A: Acceptor> GarageServer<A> {
    /// Bind the listening socket.
    ///
    /// # Errors
    /// Returns [`ServerError::BindFailed`] if the address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        acceptor: A,
        controller: Arc<DoorController>,
        subnet: TrustedSubnet,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::BindFailed { addr, source })?;
        info!(addr = %addr, "Listening");

        Ok(Self {
            listener,
            acceptor: Arc::new(acceptor),
            controller,
            subnet,
            bans: Arc::new(BanRecord::new(Duration::from_millis(DEFAULT_BAN_TIME_MS))),
            handshake_timeout: Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
        })
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_ban_time(mut self, ban_time: Duration) -> Self {
        self.bans = Arc::new(BanRecord::new(ban_time));
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Open sessions are aborted on shutdown.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let connection = Connection {
                            acceptor: Arc::clone(&self.acceptor),
                            controller: Arc::clone(&self.controller),
                            bans: Arc::clone(&self.bans),
                            local: self.subnet.is_local(peer.ip()),
                            handshake_timeout: self.handshake_timeout,
                            peer,
                        };
                        connections.spawn(connection.serve(stream));
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    match joined {
                        Err(e) if e.is_panic() => error!(error = %e, "Connection task panicked"),
                        _ => {}
                    }
                }
            }
        }

        debug!(open = connections.len(), "Stopping accept loop");
        connections.shutdown().await;
        Ok(())
    }
}

/// Everything one connection task needs.
struct Connection<A> {
    acceptor: Arc<A>,
    controller: Arc<DoorController>,
    bans: Arc<BanRecord>,
    local: bool,
    handshake_timeout: Duration,
    peer: SocketAddr,
}

impl<A: Acceptor> Connection<A> {
    async fn serve(self, stream: TcpStream) {
        let peer = self.peer;
        if self.local {
            debug!(peer = %peer, "Connection from");
        } else {
            info!(peer = %peer, "Connection from");
        }
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Unable to set TCP_NODELAY");
        }

        let handshake = tokio::time::timeout(self.handshake_timeout, self.acceptor.accept(stream));
        match handshake.await {
            Ok(Ok(stream)) => {
                let info = SessionInfo::new(peer, self.local);
                CommandSession::new(stream, self.controller, info).run().await;
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                warn!(peer = %peer, error = %e, "Invalid connection from");
                let ip = canonical(peer.ip());
                if self.bans.record(ip) {
                    self.controller.effects().ban(ip);
                } else {
                    debug!(peer = %peer, "Already banned");
                }
            }
            Ok(Err(e)) => warn!(peer = %peer, error = %e, "Connection error"),
            Err(_) => warn!(peer = %peer, "Handshake timed out"),
        }
    }
}

/// Addresses banned recently, with the time of each ban.
#[derive(Debug)]
struct BanRecord {
    ban_time: Duration,
    banned: Mutex<HashMap<IpAddr, Instant>>,
}

impl BanRecord {
    fn new(ban_time: Duration) -> Self {
        Self {
            ban_time,
            banned: Mutex::new(HashMap::new()),
        }
    }

    /// Note a failure from `ip`. Returns true when a ban should be issued.
    fn record(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut banned = self.banned.lock();
        banned.retain(|_, at| now.duration_since(*at) < self.ban_time);
        if banned.contains_key(&ip) {
            return false;
        }
        banned.insert(ip, now);
        true
    }
}

fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        v4 => v4,
    }
}
