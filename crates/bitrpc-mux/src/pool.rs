//! Pooled unidirectional streams.
//!
//! Each side owns the outbound slots it writes on. A writer holds its slot
//! until it finishes, then the slot goes back to the pool. The reader side
//! learns about a stream from its first frame and sees EOF at the empty end
//! frame.

use std::io::{self, Read, Write};
use std::sync::Arc;

use bytes::{Buf, Bytes};
use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use crate::channel::ChannelId;
use crate::error::{MuxError, Result};
use crate::queue::{Pop, Queue};

/// Where a [`PooledWriter`] sends its frames.
pub(crate) trait StreamSink: Send + Sync {
    fn send_frame(&self, channel: u16, payload: &[u8]) -> Result<()>;
    fn release_slot(&self, slot: u16);
}

struct SlotState {
    free: Vec<u16>,
    closed: bool,
}

/// Outbound stream slots. `acquire` blocks while all are in use.
pub(crate) struct SlotPool {
    state: Mutex<SlotState>,
    available: Condvar,
}

impl SlotPool {
    pub(crate) fn new(count: u16) -> Self {
        Self {
            state: Mutex::new(SlotState {
                free: (0..count).rev().collect(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    pub(crate) fn acquire(&self) -> Result<u16> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(MuxError::Closed);
            }
            if let Some(slot) = state.free.pop() {
                return Ok(slot);
            }
            self.available.wait(&mut state);
        }
    }

    pub(crate) fn release(&self, slot: u16) {
        self.state.lock().free.push(slot);
        self.available.notify_one();
    }

    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }
}

/// Writable end of an outbound pooled stream.
///
/// Data is sent in chunks of at most the configured chunk length. Call
/// [`finish`](Self::finish) to end the stream and see errors; dropping the
/// writer also ends it, logging any failure.
pub struct PooledWriter {
    slot: u16,
    sink: Arc<dyn StreamSink>,
    buf: Vec<u8>,
    chunk_len: usize,
    finished: bool,
}

impl PooledWriter {
    pub(crate) fn new(slot: u16, sink: Arc<dyn StreamSink>, chunk_len: usize) -> Self {
        let chunk_len = chunk_len.max(1);
        Self {
            slot,
            sink,
            buf: Vec::with_capacity(chunk_len.min(64 * 1024)),
            chunk_len,
            finished: false,
        }
    }

    /// Stream slot this writer occupies.
    pub fn slot(&self) -> u16 {
        self.slot
    }

    /// Send buffered data and the end marker, then give the slot back.
    pub fn finish(mut self) -> Result<()> {
        self.complete()
    }

    fn channel(&self) -> u16 {
        ChannelId::Stream(self.slot).to_wire()
    }

    fn send_buffered(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = self.sink.send_frame(self.channel(), &self.buf);
        self.buf.clear();
        result
    }

    fn complete(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let result = self
            .send_buffered()
            .and_then(|()| self.sink.send_frame(self.channel(), &[]));
        self.sink.release_slot(self.slot);
        trace!(slot = self.slot, "pooled stream finished");
        result
    }
}

impl Write for PooledWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        if data.is_empty() {
            return Ok(0);
        }
        let take = data.len().min(self.chunk_len - self.buf.len());
        self.buf.extend_from_slice(&data[..take]);
        if self.buf.len() == self.chunk_len {
            self.send_buffered()?;
        }
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        Ok(self.send_buffered()?)
    }
}

impl Drop for PooledWriter {
    fn drop(&mut self) {
        if let Err(err) = self.complete() {
            warn!(slot = self.slot, error = %err, "failed to end pooled stream");
        }
    }
}

/// Readable end of an inbound pooled stream.
///
/// Reads return `Ok(0)` at the end marker and fail with
/// `ConnectionAborted` if the connection is lost first. Dropping an
/// unfinished stream discards the rest of its data.
pub struct InboundStream {
    slot: u16,
    chunks: Arc<Queue<Bytes>>,
    current: Bytes,
}

impl InboundStream {
    pub(crate) fn new(slot: u16, chunks: Arc<Queue<Bytes>>) -> Self {
        Self {
            slot,
            chunks,
            current: Bytes::new(),
        }
    }

    /// Stream slot the peer sent this stream on.
    pub fn slot(&self) -> u16 {
        self.slot
    }
}

impl Read for InboundStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.current.is_empty() {
            match self.chunks.pop() {
                Pop::Item(chunk) => self.current = chunk,
                Pop::Ended => return Ok(0),
                Pop::Aborted => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "connection lost before end of pooled stream",
                    ))
                }
            }
        }
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

impl Drop for InboundStream {
    fn drop(&mut self) {
        self.chunks.close();
    }
}

impl std::fmt::Debug for InboundStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundStream").field("slot", &self.slot).finish()
    }
}
