//! The request channel: correlated calls over one multiplexer.
//!
//! Two receive loops feed the channel, one on the short channel and one
//! accepting pooled streams. Each loop takes the next unit off the
//! multiplexer before the previous one is handled, so one bad frame never
//! stops the channel from listening.
//!
//! - Responses are matched to pending calls by call id. A response for an
//!   unknown id is drained and reported to the peer with `AbortResponse`.
//! - Requests are resolved to a receiver and handed over on a thread of
//!   their own. An unresolvable two-way request is reported with
//!   `AbortRequest` and drained.
//! - Control requests are applied in arrival order on the loop itself.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use bitrpc_bits::BitReader;
use bitrpc_mux::{FixedChannel, Multiplexer};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::calls::{CallTable, Failure, PendingCall, ResponseStream};
use crate::config::ChannelConfig;
use crate::control::{ControlMessage, ControlReceiver, CONTROL_INTERFACE_ID};
use crate::error::{ChannelError, Result};
use crate::header::{check_path_len, Addressing, CallHeader};
use crate::receiver::{RequestReceiver, TargetResolver};
use crate::request::{InboundRequest, OutboundRequest, StreamRequest};
use crate::stream::{CallRoute, CallStream};
use crate::target::{LongTarget, ShortTarget};

/// One end of an RPC connection. Cheap to clone.
#[derive(Clone)]
pub struct RequestChannel {
    inner: Arc<ChannelInner>,
}

pub(crate) struct ChannelInner {
    label: String,
    route: CallRoute,
    context_id: u16,
    calls: Mutex<CallTable<Arc<PendingCall>>>,
    targets: RwLock<HashMap<u32, Arc<dyn RequestReceiver>>>,
    resolver: Arc<dyn TargetResolver>,
    control: Arc<ControlReceiver>,
}

impl RequestChannel {
    /// Start a channel over `mux`, serving requests through `resolver`.
    pub fn new(
        mux: Arc<dyn Multiplexer>,
        resolver: Arc<dyn TargetResolver>,
        config: ChannelConfig,
    ) -> Result<Self> {
        Self::named("channel", mux, resolver, config)
    }

    /// Like [`new`](Self::new), with a label for log records.
    pub fn named(
        label: impl Into<String>,
        mux: Arc<dyn Multiplexer>,
        resolver: Arc<dyn TargetResolver>,
        config: ChannelConfig,
    ) -> Result<Self> {
        let short = config
            .short_channel
            .map(|index| mux.fixed_channel(index))
            .transpose()?;
        let inner = Arc::new(ChannelInner {
            label: label.into(),
            route: CallRoute {
                mux,
                short: short.clone(),
                fallback_len: config.fallback_len.max(1),
            },
            context_id: config.context_id,
            calls: Mutex::new(CallTable::default()),
            targets: RwLock::new(HashMap::new()),
            resolver,
            control: Arc::new(ControlReceiver),
        });

        if let Some(channel) = short {
            let loop_inner = Arc::clone(&inner);
            std::thread::Builder::new()
                .name("bitrpc-rpc-short".to_string())
                .spawn(move || loop_inner.receive_messages(channel))?;
        }
        let loop_inner = Arc::clone(&inner);
        std::thread::Builder::new()
            .name("bitrpc-rpc-streams".to_string())
            .spawn(move || loop_inner.receive_streams())?;

        info!(
            channel = %inner.label,
            short_channel = ?config.short_channel,
            "request channel started"
        );
        Ok(Self { inner })
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// A long-form target for `interface_id` at `path` on the peer.
    pub fn target(&self, path: impl Into<String>, interface_id: Uuid) -> Result<LongTarget> {
        LongTarget::new(self.clone(), path, interface_id)
    }

    /// A short-form target the peer registered as `target_id`.
    pub fn short_target(
        &self,
        target_id: u32,
        path: impl Into<String>,
        interface_id: Uuid,
    ) -> ShortTarget {
        ShortTarget::new(self.clone(), target_id, path, interface_id)
    }

    /// Start a call to `target`. Two-way calls claim a call id here.
    pub fn start_request(&self, target: Addressing, one_way: bool) -> Result<OutboundRequest> {
        self.inner.start_request(target, one_way)
    }

    /// Serve short-form requests for `target_id` with `receiver`, returning
    /// the receiver it replaces.
    pub fn register_receiver(
        &self,
        target_id: u32,
        receiver: Arc<dyn RequestReceiver>,
    ) -> Option<Arc<dyn RequestReceiver>> {
        debug!(channel = %self.inner.label, target_id, "registering short-form target");
        self.inner.targets.write().insert(target_id, receiver)
    }

    pub fn unregister_receiver(&self, target_id: u32) -> Option<Arc<dyn RequestReceiver>> {
        self.inner.targets.write().remove(&target_id)
    }

    /// Send a control message to the peer.
    pub fn send_control(&self, message: &ControlMessage) -> Result<()> {
        self.inner.send_control(message)
    }

    /// Send an advisory warning to the peer.
    pub fn report_warning(&self, message: &str) -> Result<()> {
        self.send_control(&ControlMessage::ReportWarning {
            message: message.to_string(),
        })
    }

    /// Ask the peer to tear the connection down, then close this end.
    pub fn abort_channel(&self, message: &str) -> Result<()> {
        let sent = self.send_control(&ControlMessage::AbortChannel {
            message: message.to_string(),
        });
        self.close();
        sent
    }

    /// Apply an `AbortRequest` from the peer. `outbound` is from this end's
    /// point of view.
    pub fn abort_local_request(&self, outbound: bool, call_id: u32, message: &str) {
        self.inner.abort_local_request(outbound, call_id, message);
    }

    /// Apply an `AbortResponse` from the peer. Only logged.
    pub fn abort_local_response(&self, outbound: bool, call_id: u32, message: &str) {
        self.inner.abort_local_response(outbound, call_id, message);
    }

    /// Apply an `AbortChannel` from the peer: close the connection.
    pub fn abort_local_channel(&self, message: &str) {
        self.inner.abort_local_channel(message);
    }

    pub fn report_local_warning(&self, message: &str) {
        self.inner.report_local_warning(message);
    }

    /// Number of two-way calls waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.calls.lock().len()
    }

    /// Close the multiplexer. Pending calls fail with
    /// [`ChannelError::ChannelClosed`].
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.route.mux.is_closed()
    }

    pub fn multiplexer(&self) -> &Arc<dyn Multiplexer> {
        &self.inner.route.mux
    }
}

impl std::fmt::Debug for RequestChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl ChannelInner {
    pub(crate) fn route(&self) -> CallRoute {
        self.route.clone()
    }

    fn start_request(self: &Arc<Self>, target: Addressing, one_way: bool) -> Result<OutboundRequest> {
        if self.route.mux.is_closed() {
            return Err(ChannelError::ChannelClosed);
        }
        if let Addressing::Long { path, .. } = &target {
            check_path_len(path)?;
        }

        let (call_id, pending) = if one_way {
            (0, None)
        } else {
            let call = Arc::new(PendingCall::new());
            let call_id = self.calls.lock().allocate(Arc::clone(&call))?;
            (call_id, Some(call))
        };
        let release = |pending: &Option<Arc<PendingCall>>| {
            if let Some(call) = pending {
                self.forget_call(call_id, call);
            }
        };
        // The receive loops fail whatever is pending when they stop; a call
        // registered after that would wait forever.
        if self.route.mux.is_closed() {
            release(&pending);
            return Err(ChannelError::ChannelClosed);
        }

        let header = CallHeader::Request {
            call_id,
            one_way,
            context_id: self.context_id,
            target,
        };
        let body = match CallStream::open(self.route(), &header) {
            Ok(body) => body,
            Err(err) => {
                release(&pending);
                return Err(err);
            }
        };
        debug!(channel = %self.label, call_id, one_way, "request started");
        Ok(OutboundRequest::new(
            Arc::clone(self),
            call_id,
            one_way,
            body,
            pending,
        ))
    }

    /// Drop `call` from the table if it still holds `call_id`.
    pub(crate) fn forget_call(&self, call_id: u32, call: &Arc<PendingCall>) {
        let mut calls = self.calls.lock();
        if calls
            .get(call_id)
            .is_some_and(|current| Arc::ptr_eq(current, call))
        {
            calls.remove(call_id);
        }
    }

    pub(crate) fn send_control(self: &Arc<Self>, message: &ControlMessage) -> Result<()> {
        debug!(channel = %self.label, selector = message.selector(), "sending control message");
        let bytes = message.to_bytes()?;
        let mut request = self.start_request(Addressing::long(CONTROL_INTERFACE_ID, ""), true)?;
        request.request_stream()?.write_all(&bytes)?;
        request.finish_request()
    }

    fn send_control_logged(self: &Arc<Self>, message: ControlMessage) {
        if let Err(err) = self.send_control(&message) {
            warn!(channel = %self.label, error = %err, "failed to send control message");
        }
    }

    pub(crate) fn apply_control(&self, message: ControlMessage) {
        // The sender speaks from its own side of the call.
        match message {
            ControlMessage::AbortRequest {
                outbound,
                call_id,
                message,
            } => self.abort_local_request(!outbound, call_id, &message),
            ControlMessage::AbortResponse {
                outbound,
                call_id,
                message,
            } => self.abort_local_response(!outbound, call_id, &message),
            ControlMessage::AbortChannel { message } => self.abort_local_channel(&message),
            ControlMessage::ReportWarning { message } => self.report_local_warning(&message),
        }
    }

    fn abort_local_request(&self, outbound: bool, call_id: u32, message: &str) {
        if !outbound {
            warn!(
                channel = %self.label,
                call_id,
                message,
                "peer aborted an inbound request; in-flight cancellation is not supported"
            );
            return;
        }
        let Some(call) = self.calls.lock().remove(call_id) else {
            warn!(
                channel = %self.label,
                call_id,
                message,
                "attempt to abort a nonexistent outbound request"
            );
            return;
        };
        call.fail(Failure::Aborted(message.to_string()));
        info!(channel = %self.label, call_id, message, "outbound request aborted by peer");
    }

    fn abort_local_response(&self, outbound: bool, call_id: u32, message: &str) {
        let direction = if outbound { "outbound" } else { "inbound" };
        warn!(channel = %self.label, call_id, direction, message, "peer aborted a response");
    }

    fn abort_local_channel(&self, message: &str) {
        error!(channel = %self.label, message, "channel aborted by peer");
        self.close();
    }

    fn report_local_warning(&self, message: &str) {
        warn!(channel = %self.label, message, "peer reports a warning");
    }

    fn close(&self) {
        self.route.mux.close();
        self.fail_pending();
    }

    fn fail_pending(&self) {
        let drained = self.calls.lock().drain();
        if drained.is_empty() {
            return;
        }
        debug!(channel = %self.label, count = drained.len(), "failing pending calls");
        for (_, call) in drained {
            call.fail(Failure::Closed);
        }
    }

    fn receive_messages(self: Arc<Self>, channel: Arc<dyn FixedChannel>) {
        loop {
            match channel.receive() {
                Ok(message) => self.handle_inbound(Box::new(Cursor::new(message)), false),
                Err(err) => {
                    debug!(channel = %self.label, error = %err, "short channel closed");
                    break;
                }
            }
        }
        self.fail_pending();
    }

    fn receive_streams(self: Arc<Self>) {
        loop {
            match self.route.mux.receive_stream() {
                Ok(stream) => {
                    let inner = Arc::clone(&self);
                    let spawned = std::thread::Builder::new()
                        .name("bitrpc-rpc-inbound".to_string())
                        .spawn(move || inner.handle_inbound(stream, true));
                    if let Err(err) = spawned {
                        error!(channel = %self.label, error = %err, "failed to start inbound stream handler");
                    }
                }
                Err(err) => {
                    debug!(channel = %self.label, error = %err, "stream pool closed");
                    break;
                }
            }
        }
        self.fail_pending();
        info!(channel = %self.label, "request channel closed");
    }

    /// Handle one inbound call unit. `own_thread` says whether the caller
    /// may block for as long as a receiver takes.
    fn handle_inbound(self: &Arc<Self>, stream: ResponseStream, own_thread: bool) {
        let mut reader = BitReader::new(stream);
        let header = match CallHeader::read(&mut reader) {
            Ok(header) => header,
            Err(err) => {
                error!(channel = %self.label, error = %err, "inbound stream could not be understood");
                drain(reader.into_inner());
                return;
            }
        };
        let body = reader.into_inner();

        match header {
            CallHeader::Response { call_id } => self.deliver_response(call_id, body),
            CallHeader::Request {
                call_id,
                one_way,
                context_id,
                target,
            } => {
                let receiver = match self.resolve(&target) {
                    Ok(receiver) => receiver,
                    Err(err) => {
                        warn!(channel = %self.label, call_id, error = %err, "rejecting inbound request");
                        if !one_way {
                            self.send_control_logged(ControlMessage::AbortRequest {
                                outbound: false,
                                call_id,
                                message: err.to_string(),
                            });
                        }
                        drain(body);
                        return;
                    }
                };
                let inline = own_thread || is_control(&target);
                let request =
                    InboundRequest::new(Arc::clone(self), call_id, one_way, context_id, target, body);
                self.dispatch(receiver, request, inline);
            }
        }
    }

    fn deliver_response(self: &Arc<Self>, call_id: u32, body: ResponseStream) {
        let call = self.calls.lock().remove(call_id);
        match call {
            Some(call) => {
                debug!(channel = %self.label, call_id, "response received");
                if let Err(body) = call.complete(body) {
                    debug!(channel = %self.label, call_id, "call ended before its response");
                    drain(body);
                }
            }
            None => {
                warn!(channel = %self.label, call_id, "response received for an unknown call");
                self.send_control_logged(ControlMessage::AbortResponse {
                    outbound: false,
                    call_id,
                    message: format!("response received for an invalid call #{call_id}"),
                });
                drain(body);
            }
        }
    }

    fn resolve(&self, target: &Addressing) -> Result<Arc<dyn RequestReceiver>> {
        match target {
            Addressing::Short { target_id } => self
                .targets
                .read()
                .get(target_id)
                .cloned()
                .ok_or(ChannelError::UnknownTarget(*target_id)),
            Addressing::Long { interface_id, path } => {
                let resolved = if path.is_empty() {
                    (*interface_id == CONTROL_INTERFACE_ID)
                        .then(|| Arc::clone(&self.control) as Arc<dyn RequestReceiver>)
                } else {
                    self.resolver.resolve(path, *interface_id)
                };
                resolved.ok_or_else(|| ChannelError::UnresolvedTarget {
                    path: path.clone(),
                    interface_id: *interface_id,
                })
            }
        }
    }

    fn dispatch(&self, receiver: Arc<dyn RequestReceiver>, request: InboundRequest, inline: bool) {
        let label = self.label.clone();
        let run = move || {
            let call_id = request.call_id();
            if let Err(err) = receiver.process_request(request) {
                warn!(channel = %label, call_id, error = %err, "request receiver failed");
            }
        };
        if inline {
            run();
            return;
        }
        if let Err(err) = std::thread::Builder::new()
            .name("bitrpc-rpc-call".to_string())
            .spawn(run)
        {
            error!(channel = %self.label, error = %err, "failed to start request handler");
        }
    }
}

impl std::fmt::Debug for ChannelInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestChannel")
            .field("label", &self.label)
            .field("closed", &self.route.mux.is_closed())
            .finish()
    }
}

fn is_control(target: &Addressing) -> bool {
    matches!(
        target,
        Addressing::Long { interface_id, path }
            if path.is_empty() && *interface_id == CONTROL_INTERFACE_ID
    )
}

fn drain(mut stream: impl Read) {
    if let Err(err) = io::copy(&mut stream, &mut io::sink()) {
        debug!(error = %err, "failed to drain inbound stream");
    }
}
