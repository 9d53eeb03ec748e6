use std::fmt;
use std::path::PathBuf;

use crate::error::{Result, TransportError};
use crate::stream::RpcStream;
use crate::tcp::TcpEndpoint;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// A transport address in one of the accepted textual forms.
///
/// - `unix:<path>`: Unix domain socket
/// - `tcp:<host:port>`: TCP
/// - anything else: treated as a Unix domain socket path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// Parse an endpoint string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Some(path) = input.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(input.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = input.strip_prefix("tcp:") {
            if !addr.contains(':') {
                return Err(TransportError::InvalidEndpoint(input.to_string()));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }
        if input.is_empty() {
            return Err(TransportError::InvalidEndpoint(input.to_string()));
        }
        Ok(Self::Unix(PathBuf::from(input)))
    }

    /// Connect to this endpoint (blocking).
    pub fn connect(&self) -> Result<RpcStream> {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => UnixDomainSocket::connect(path),
            #[cfg(not(unix))]
            Self::Unix(_) => Err(TransportError::Unsupported("unix")),
            Self::Tcp(addr) => TcpEndpoint::connect(addr),
        }
    }

    /// Bind a listener on this endpoint.
    pub fn bind(&self) -> Result<Listener> {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => Ok(Listener::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Self::Unix(_) => Err(TransportError::Unsupported("unix")),
            Self::Tcp(addr) => Ok(Listener::Tcp(TcpEndpoint::bind(addr)?)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// A bound listener for either transport.
pub enum Listener {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(TcpEndpoint),
}

impl Listener {
    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<RpcStream> {
        match self {
            #[cfg(unix)]
            Self::Unix(socket) => socket.accept(),
            Self::Tcp(endpoint) => endpoint.accept(),
        }
    }

    /// The endpoint actually bound (TCP port 0 resolves to the real port).
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            #[cfg(unix)]
            Self::Unix(socket) => Endpoint::Unix(socket.path().to_path_buf()),
            Self::Tcp(endpoint) => Endpoint::Tcp(endpoint.local_addr().to_string()),
        }
    }
}
