//! The multiplexer interface consumed by the RPC layer.

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

/// A fixed logical channel carrying whole, bounded messages.
pub trait FixedChannel: Send + Sync {
    /// Send one message. Messages over [`max_payload_length`](Self::max_payload_length)
    /// are rejected.
    fn send(&self, message: &[u8]) -> Result<()>;

    /// Block until the next message arrives.
    ///
    /// Fails with [`MuxError::Closed`](crate::MuxError::Closed) once the
    /// multiplexer is torn down and no buffered messages remain.
    fn receive(&self) -> Result<Bytes>;

    /// Largest message [`send`](Self::send) accepts.
    fn max_payload_length(&self) -> usize;
}

/// One physical connection split into fixed channels and a stream pool.
pub trait Multiplexer: Send + Sync {
    /// The fixed channel at `index`.
    fn fixed_channel(&self, index: u16) -> Result<Arc<dyn FixedChannel>>;

    /// Open an outbound pooled stream, blocking until a slot is free.
    ///
    /// Dropping the writer ends the stream on the peer.
    fn pooled_stream(&self) -> Result<Box<dyn Write + Send>>;

    /// Block until the peer opens a pooled stream.
    fn receive_stream(&self) -> Result<Box<dyn Read + Send>>;

    /// Tear the connection down. Idempotent.
    fn close(&self);

    /// Whether [`close`](Self::close) ran or the connection was lost.
    fn is_closed(&self) -> bool;
}
