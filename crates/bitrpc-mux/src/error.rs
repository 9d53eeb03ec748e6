/// Errors raised by the framing and multiplexing layer.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4252 \"BR\")")]
    InvalidMagic,

    /// A frame payload exceeds the configured maximum size.
    #[error("frame payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A message does not fit a fixed channel.
    #[error("message of {size} bytes exceeds the channel maximum of {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// The requested fixed channel does not exist.
    #[error("no fixed channel {index} (multiplexer has {count})")]
    UnknownChannel { index: u16, count: u16 },

    /// The transport ended before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// Invalid multiplexer configuration.
    #[error("invalid multiplexer configuration: {0}")]
    InvalidConfig(String),

    /// The multiplexer has been closed locally or by the peer.
    #[error("multiplexer closed")]
    Closed,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Setting up the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] bitrpc_transport::TransportError),
}

impl From<MuxError> for std::io::Error {
    fn from(err: MuxError) -> Self {
        match err {
            MuxError::Io(err) => err,
            MuxError::Closed | MuxError::ConnectionClosed => {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, err)
            }
            other => std::io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
