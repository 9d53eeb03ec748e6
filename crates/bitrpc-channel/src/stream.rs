//! Outbound call bodies.
//!
//! A call is buffered until it outgrows one short-channel message. Calls that
//! fit are sent whole on the short channel; larger ones move to a pooled
//! stream as soon as the buffer overflows, so small calls never pay for a
//! stream slot.

use std::io::{self, Write};
use std::sync::Arc;

use bitrpc_bits::BitWriter;
use bitrpc_mux::{FixedChannel, Multiplexer};
use tracing::{trace, warn};

use crate::error::Result;
use crate::header::CallHeader;

/// Where call bodies go.
#[derive(Clone)]
pub(crate) struct CallRoute {
    pub(crate) mux: Arc<dyn Multiplexer>,
    pub(crate) short: Option<Arc<dyn FixedChannel>>,
    pub(crate) fallback_len: usize,
}

impl CallRoute {
    fn buffer_len(&self) -> usize {
        self.short
            .as_ref()
            .map_or(self.fallback_len, |channel| channel.max_payload_length())
    }
}

enum State {
    Buffering(Vec<u8>),
    Streaming(Box<dyn Write + Send>),
    Finished,
}

/// The writable body of an outbound request or response, header included.
///
/// Nothing reaches the peer until the buffer overflows or the stream is
/// finished. Dropping an unfinished stream finishes it.
pub struct CallStream {
    route: CallRoute,
    limit: usize,
    state: State,
}

impl CallStream {
    pub(crate) fn open(route: CallRoute, header: &CallHeader) -> Result<Self> {
        let limit = route.buffer_len();
        let mut stream = Self {
            route,
            limit,
            state: State::Buffering(Vec::with_capacity(limit.min(4096))),
        };
        header.write(&mut BitWriter::new(&mut stream))?;
        Ok(stream)
    }

    /// Whether the body has moved to a pooled stream.
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, State::Streaming(_))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Send whatever is buffered and end the body.
    pub fn finish(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Finished) {
            State::Buffering(pending) => match &self.route.short {
                Some(channel) if pending.len() <= channel.max_payload_length() => {
                    trace!(bytes = pending.len(), "sending call on the short channel");
                    channel.send(&pending)?;
                }
                _ => {
                    let mut stream = self.route.mux.pooled_stream()?;
                    stream.write_all(&pending)?;
                    stream.flush()?;
                }
            },
            State::Streaming(mut stream) => stream.flush()?,
            State::Finished => {}
        }
        Ok(())
    }

    /// Drop a body that was never sent. A body already streaming is ended
    /// as it is.
    pub(crate) fn abandon(&mut self) {
        self.state = State::Finished;
    }
}

impl Write for CallStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let limit = self.limit;
        match &mut self.state {
            State::Buffering(pending) => {
                if pending.len() + buf.len() <= limit {
                    pending.extend_from_slice(buf);
                    return Ok(buf.len());
                }
                let mut stream = self.route.mux.pooled_stream().map_err(io::Error::from)?;
                stream.write_all(pending)?;
                stream.write_all(buf)?;
                trace!(buffered = pending.len(), "call moved to a pooled stream");
                self.state = State::Streaming(stream);
                Ok(buf.len())
            }
            State::Streaming(stream) => stream.write(buf),
            State::Finished => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "call stream already finished",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.state {
            State::Streaming(stream) => stream.flush(),
            _ => Ok(()),
        }
    }
}

impl Drop for CallStream {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            warn!(error = %err, "failed to send call body");
        }
    }
}

impl std::fmt::Debug for CallStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Buffering(_) => "buffering",
            State::Streaming(_) => "streaming",
            State::Finished => "finished",
        };
        f.debug_struct("CallStream")
            .field("limit", &self.limit)
            .field("state", &state)
            .finish()
    }
}
