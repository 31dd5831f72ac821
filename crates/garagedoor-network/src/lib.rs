//! Network front end of the garage door daemon.
//!
//! Accepts connections, authenticates them with mutual TLS, and runs one
//! [`CommandSession`] per connection against the shared
//! [`DoorController`](garagedoor_control::DoorController).
//!
//! # Components
//!
//! - **GarageServer**: accept loop, handshake timeout, bans on failed
//!   authentication
//! - **CommandSession**: greeting, command dispatch, status pushes
//! - **TrustedSubnet**: local/remote peer classification for logging
//! - **tls**: PEM loading and the client-verifying acceptor
//!
//! # Example
//!
//! ```no_run
//! use garagedoor_network::{GarageServer, TlsAcceptor, TrustedSubnet};
//! # use garagedoor_control::DoorController;
//! # use std::sync::Arc;
//! # use tokio_util::sync::CancellationToken;
//!
//! # async fn example(controller: Arc<DoorController>) -> Result<(), Box<dyn std::error::Error>> {
//! let acceptor = TlsAcceptor::from_files(
//!     "/etc/garagedoor/key-server.pem",
//!     "/etc/garagedoor/cert-server.pem",
//!     "/etc/garagedoor/cert-client.pem",
//! )?;
//! let server = GarageServer::bind(
//!     "0.0.0.0:17000".parse()?,
//!     acceptor,
//!     controller,
//!     TrustedSubnet::detect(),
//! )
//! .await?;
//! server.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod peer;
mod server;
mod session;
pub mod tls;

pub use error::{Result, ServerError};
pub use peer::TrustedSubnet;
pub use server::{Acceptor, GarageServer, PlainAcceptor};
pub use session::{CommandSession, SessionInfo};
pub use tls::TlsAcceptor;
