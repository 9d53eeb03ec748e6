//! The two ends of a call.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::calls::{Failure, PendingCall, ResponseStream};
use crate::channel::ChannelInner;
use crate::control::ControlMessage;
use crate::error::{ChannelError, Result};
use crate::header::{Addressing, CallHeader};
use crate::stream::CallStream;

/// What both ends of a call have in common.
pub trait StreamRequest {
    /// The call id on the wire. One-way requests carry 0.
    fn call_id(&self) -> u32;

    /// Whether this end started the call.
    fn is_outbound(&self) -> bool;

    fn is_one_way(&self) -> bool;
}

/// A call this end is making.
///
/// Write the request body to [`request_stream`](Self::request_stream), then
/// either [`finish_request`](Self::finish_request) (one-way) or
/// [`wait_response`](Self::wait_response). Dropping the request sends any
/// unsent body and forgets the call.
#[derive(Debug)]
pub struct OutboundRequest {
    channel: Arc<ChannelInner>,
    call_id: u32,
    one_way: bool,
    body: CallStream,
    pending: Option<Arc<PendingCall>>,
}

impl OutboundRequest {
    pub(crate) fn new(
        channel: Arc<ChannelInner>,
        call_id: u32,
        one_way: bool,
        body: CallStream,
        pending: Option<Arc<PendingCall>>,
    ) -> Self {
        Self {
            channel,
            call_id,
            one_way,
            body,
            pending,
        }
    }

    /// The request body. Fails once the body has been sent.
    pub fn request_stream(&mut self) -> Result<&mut CallStream> {
        if self.body.is_finished() {
            return Err(ChannelError::InvalidState("the request stream is finished"));
        }
        Ok(&mut self.body)
    }

    /// Send the rest of the body. Idempotent.
    pub fn finish_request(&mut self) -> Result<()> {
        if let Err(err) = self.body.finish() {
            self.forget();
            return Err(err);
        }
        Ok(())
    }

    /// Finish the body if needed and block until the response arrives.
    ///
    /// On [`ChannelError::Timeout`] the call stays pending; wait again or
    /// [`abort`](Self::abort) it.
    pub fn wait_response(&mut self, timeout: Option<Duration>) -> Result<ResponseStream> {
        let pending = self
            .pending
            .clone()
            .ok_or(ChannelError::InvalidState("one-way calls have no response"))?;
        self.finish_request()?;
        pending.wait(timeout)
    }

    /// Give up on the call.
    ///
    /// A body that was never sent is discarded. If the peer already has the
    /// request it is told with `AbortRequest`, and the local wait fails with
    /// `message`.
    pub fn abort(&mut self, message: &str) -> Result<()> {
        let sent = self.body.is_finished() || self.body.is_streaming();
        self.body.abandon();

        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        self.channel.forget_call(self.call_id, &pending);
        if !pending.fail(Failure::Aborted(message.to_string())) {
            return Ok(());
        }
        debug!(call_id = self.call_id, message, "outbound request aborted locally");
        if sent {
            self.channel.send_control(&ControlMessage::AbortRequest {
                outbound: true,
                call_id: self.call_id,
                message: message.to_string(),
            })?;
        }
        Ok(())
    }

    fn forget(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.channel.forget_call(self.call_id, &pending);
            pending.fail(Failure::Closed);
        }
    }
}

impl StreamRequest for OutboundRequest {
    fn call_id(&self) -> u32 {
        self.call_id
    }

    fn is_outbound(&self) -> bool {
        true
    }

    fn is_one_way(&self) -> bool {
        self.one_way
    }
}

impl Drop for OutboundRequest {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.channel.forget_call(self.call_id, &pending);
        }
    }
}

/// Body of an inbound request. Remembers whether it was read to the end.
pub struct RequestBody {
    inner: Box<dyn Read + Send>,
    ended: bool,
}

impl RequestBody {
    fn new(inner: Box<dyn Read + Send>) -> Self {
        Self {
            inner,
            ended: false,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Read and discard the rest of the body.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }
}

impl Read for RequestBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.ended = true;
        }
        Ok(n)
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBody")
            .field("ended", &self.ended)
            .finish()
    }
}

/// A call the peer is making to this end.
///
/// A two-way request must be answered with
/// [`response_stream`](Self::response_stream) or [`abort`](Self::abort).
/// Dropping it unanswered aborts it so the caller does not wait forever.
#[derive(Debug)]
pub struct InboundRequest {
    channel: Arc<ChannelInner>,
    call_id: u32,
    one_way: bool,
    context_id: u16,
    target: Addressing,
    body: RequestBody,
    answered: bool,
}

impl InboundRequest {
    pub(crate) fn new(
        channel: Arc<ChannelInner>,
        call_id: u32,
        one_way: bool,
        context_id: u16,
        target: Addressing,
        body: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            channel,
            call_id,
            one_way,
            context_id,
            target,
            body: RequestBody::new(body),
            answered: false,
        }
    }

    pub fn context_id(&self) -> u16 {
        self.context_id
    }

    /// How the caller addressed this request.
    pub fn target(&self) -> &Addressing {
        &self.target
    }

    pub fn request_stream(&mut self) -> &mut RequestBody {
        &mut self.body
    }

    /// Start the response. The unread rest of the request body is discarded
    /// first.
    pub fn response_stream(&mut self) -> Result<CallStream> {
        if self.one_way {
            return Err(ChannelError::InvalidState("one-way calls have no response"));
        }
        if self.answered {
            return Err(ChannelError::InvalidState("the request was already answered"));
        }
        self.body.drain()?;
        let stream = CallStream::open(
            self.channel.route(),
            &CallHeader::Response {
                call_id: self.call_id,
            },
        )?;
        self.answered = true;
        Ok(stream)
    }

    /// Fail the caller's wait with `message` instead of responding.
    ///
    /// One-way requests have nobody waiting; the abort is only logged.
    pub fn abort(&mut self, message: &str) -> Result<()> {
        if self.one_way {
            debug!(message, "not reporting failure of a one-way request");
            return Ok(());
        }
        if self.answered {
            return Err(ChannelError::InvalidState("the request was already answered"));
        }
        self.answered = true;
        self.channel.send_control(&ControlMessage::AbortRequest {
            outbound: false,
            call_id: self.call_id,
            message: message.to_string(),
        })
    }

    pub(crate) fn channel(&self) -> &Arc<ChannelInner> {
        &self.channel
    }
}

impl StreamRequest for InboundRequest {
    fn call_id(&self) -> u32 {
        self.call_id
    }

    fn is_outbound(&self) -> bool {
        false
    }

    fn is_one_way(&self) -> bool {
        self.one_way
    }
}

impl Drop for InboundRequest {
    fn drop(&mut self) {
        if self.one_way || self.answered {
            return;
        }
        warn!(call_id = self.call_id, "request dropped without a response");
        if let Err(err) = self.abort("the request was dropped without a response") {
            debug!(call_id = self.call_id, error = %err, "failed to abort dropped request");
        }
    }
}
