//! Connected byte-stream transports for bitrpc.
//!
//! Everything above this layer only needs a stream that can be read, written,
//! cloned into independent halves, and shut down from another thread. This
//! crate provides that as [`RpcStream`], over:
//! - Unix domain sockets (Linux/macOS)
//! - TCP
//!
//! [`Endpoint`] parses the textual address forms accepted by the CLI.

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, Listener};
pub use error::{Result, TransportError};
pub use stream::RpcStream;
pub use tcp::TcpEndpoint;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
