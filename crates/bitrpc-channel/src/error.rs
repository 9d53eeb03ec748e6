use std::time::Duration;

use uuid::Uuid;

/// Errors raised by the call channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Multiplexer error.
    #[error("multiplexer error: {0}")]
    Mux(#[from] bitrpc_mux::MuxError),

    /// Transport error while connecting or accepting.
    #[error("transport error: {0}")]
    Transport(#[from] bitrpc_transport::TransportError),

    /// Bit-level decode or encode failure.
    #[error("bit stream error: {0}")]
    Bits(#[from] bitrpc_bits::BitsError),

    /// Schema or value serialization error.
    #[error("serialization error: {0}")]
    Schema(#[from] bitrpc_schema::SchemaError),

    /// I/O error on a call stream.
    #[error("call stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every call id is taken by a pending call.
    #[error("an outbound call id could not be allocated: all {capacity} ids are pending")]
    CallTableExhausted { capacity: usize },

    /// The call was aborted, by the peer or locally.
    #[error("call aborted: {0}")]
    Aborted(String),

    /// The channel closed before the call completed.
    #[error("channel closed")]
    ChannelClosed,

    /// No response arrived in time. The call is still pending.
    #[error("no response after {0:?}")]
    Timeout(Duration),

    /// A call frame header is malformed.
    #[error("invalid call header: {0}")]
    InvalidHeader(String),

    /// A control request carries an unknown selector.
    #[error("unknown control request {0}")]
    UnknownControl(u8),

    /// No receiver is registered under a short-form target id.
    #[error("no target registered with id {0}")]
    UnknownTarget(u32),

    /// No receiver serves the interface at the path.
    #[error("no receiver for interface {interface_id} at \"{path}\"")]
    UnresolvedTarget { path: String, interface_id: Uuid },

    /// A target path is empty or too long.
    #[error("invalid target path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// An operation was used out of order, such as reading the response of a
    /// one-way call.
    #[error("invalid request state: {0}")]
    InvalidState(&'static str),

    /// A service handler reported a failure.
    #[error("handler failed: {0}")]
    Handler(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
