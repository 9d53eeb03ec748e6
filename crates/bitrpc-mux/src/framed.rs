//! [`Multiplexer`] over one framed byte stream.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bitrpc_transport::RpcStream;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::channel::{ChannelId, MAX_STREAM_SLOTS, STREAM_CHANNEL_START};
use crate::error::{MuxError, Result};
use crate::frame::{Frame, FrameConfig};
use crate::mux::{FixedChannel, Multiplexer};
use crate::pool::{InboundStream, PooledWriter, SlotPool, StreamSink};
use crate::queue::{Pop, Queue};
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

/// Default cap on a fixed-channel message: 16 KiB.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 16 * 1024;

/// Multiplexer layout and limits. Both peers must agree on the channel counts.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Framing limits and transport timeouts.
    pub frame: FrameConfig,
    /// Number of fixed message channels. Default: 4.
    pub fixed_channels: u16,
    /// Number of outbound stream slots. Default: 16.
    pub stream_slots: u16,
    /// Largest message on a fixed channel. Default: 16 KiB.
    pub max_message_len: usize,
    /// Largest data frame a pooled stream sends. Default: 16 KiB.
    pub stream_chunk_len: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            fixed_channels: 4,
            stream_slots: 16,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            stream_chunk_len: 16 * 1024,
        }
    }
}

/// A multiplexer running over a `Read` half and a `Write` half of one
/// connection.
///
/// A background thread reads frames and routes them to fixed-channel
/// inboxes and inbound streams. Handles are cheap to clone; the connection
/// stays up until [`close`](Multiplexer::close) is called or the peer goes
/// away.
#[derive(Clone)]
pub struct FramedMux {
    shared: Arc<Shared>,
}

struct Shared {
    writer: Mutex<FrameWriter<Box<dyn Write + Send>>>,
    inboxes: Vec<Queue<Bytes>>,
    accepted: Queue<InboundStream>,
    inbound: Mutex<HashMap<u16, Arc<Queue<Bytes>>>>,
    slots: SlotPool,
    closed: AtomicBool,
    shutdown: Box<dyn Fn() + Send + Sync>,
    max_message_len: usize,
    stream_chunk_len: usize,
}

impl FramedMux {
    /// Start a multiplexer over a connected transport stream.
    pub fn over(stream: RpcStream, config: MuxConfig) -> Result<Self> {
        stream.set_write_timeout(config.frame.write_timeout)?;
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;
        let peer = stream.peer_label();
        debug!(%peer, "starting multiplexer");

        Self::new(
            reader,
            stream,
            move || {
                if let Err(err) = control.shutdown() {
                    debug!(error = %err, "transport shutdown failed");
                }
            },
            config,
        )
    }

    /// Start a multiplexer over explicit halves.
    ///
    /// `shutdown` must unblock a read in progress on `reader`; it runs once
    /// when the multiplexer closes.
    pub fn new<R, W, F>(reader: R, writer: W, shutdown: F, config: MuxConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        F: Fn() + Send + Sync + 'static,
    {
        if config.fixed_channels > STREAM_CHANNEL_START {
            return Err(MuxError::InvalidConfig(format!(
                "{} fixed channels exceed the limit of {STREAM_CHANNEL_START}",
                config.fixed_channels
            )));
        }
        if config.stream_slots > MAX_STREAM_SLOTS {
            return Err(MuxError::InvalidConfig(format!(
                "{} stream slots exceed the limit of {MAX_STREAM_SLOTS}",
                config.stream_slots
            )));
        }

        let frame_max = config.frame.max_payload_size;
        let shared = Arc::new(Shared {
            writer: Mutex::new(FrameWriter::with_config(
                Box::new(writer) as Box<dyn Write + Send>,
                &config.frame,
            )),
            inboxes: (0..config.fixed_channels).map(|_| Queue::new()).collect(),
            accepted: Queue::new(),
            inbound: Mutex::new(HashMap::new()),
            slots: SlotPool::new(config.stream_slots),
            closed: AtomicBool::new(false),
            shutdown: Box::new(shutdown),
            max_message_len: config.max_message_len.min(frame_max),
            stream_chunk_len: config.stream_chunk_len.clamp(1, frame_max.max(1)),
        });

        let frames = FrameReader::with_config(reader, &config.frame);
        let demux_shared = Arc::clone(&shared);
        std::thread::Builder::new()
            .name("bitrpc-mux-demux".to_string())
            .spawn(move || demux(demux_shared, frames))?;

        info!(
            fixed_channels = config.fixed_channels,
            stream_slots = config.stream_slots,
            "multiplexer started"
        );
        Ok(Self { shared })
    }

    /// Number of fixed channels.
    pub fn fixed_channel_count(&self) -> u16 {
        self.shared.inboxes.len() as u16
    }
}

impl Multiplexer for FramedMux {
    fn fixed_channel(&self, index: u16) -> Result<Arc<dyn FixedChannel>> {
        let count = self.fixed_channel_count();
        if index >= count {
            return Err(MuxError::UnknownChannel { index, count });
        }
        Ok(Arc::new(FramedChannel {
            index,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn pooled_stream(&self) -> Result<Box<dyn Write + Send>> {
        let slot = self.shared.slots.acquire()?;
        trace!(slot, "opened pooled stream");
        let sink: Arc<dyn StreamSink> = self.shared.clone();
        Ok(Box::new(PooledWriter::new(
            slot,
            sink,
            self.shared.stream_chunk_len,
        )))
    }

    fn receive_stream(&self) -> Result<Box<dyn Read + Send>> {
        match self.shared.accepted.pop() {
            Pop::Item(stream) => Ok(Box::new(stream)),
            Pop::Ended | Pop::Aborted => Err(MuxError::Closed),
        }
    }

    fn close(&self) {
        self.shared.teardown();
    }

    fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

struct FramedChannel {
    index: u16,
    shared: Arc<Shared>,
}

impl FixedChannel for FramedChannel {
    fn send(&self, message: &[u8]) -> Result<()> {
        let max = self.max_payload_length();
        if message.len() > max {
            return Err(MuxError::MessageTooLarge {
                size: message.len(),
                max,
            });
        }
        self.shared.send_frame(self.index, message)
    }

    fn receive(&self) -> Result<Bytes> {
        match self.shared.inboxes[usize::from(self.index)].pop() {
            Pop::Item(message) => Ok(message),
            Pop::Ended | Pop::Aborted => Err(MuxError::Closed),
        }
    }

    fn max_payload_length(&self) -> usize {
        self.shared.max_message_len
    }
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn route(&self, frame: Frame) {
        match ChannelId::from_wire(frame.channel) {
            ChannelId::Fixed(index) => match self.inboxes.get(usize::from(index)) {
                Some(inbox) => {
                    inbox.push(frame.payload);
                }
                None => warn!(channel = index, "dropping frame for unknown fixed channel"),
            },
            ChannelId::Stream(slot) => self.route_stream(slot, frame.payload),
        }
    }

    fn route_stream(&self, slot: u16, payload: Bytes) {
        let mut inbound = self.inbound.lock();
        if self.is_closed() {
            return;
        }

        if payload.is_empty() {
            match inbound.remove(&slot) {
                Some(pipe) => pipe.close(),
                None => {
                    let pipe = Arc::new(Queue::new());
                    pipe.close();
                    self.accepted.push(InboundStream::new(slot, pipe));
                }
            }
            trace!(slot, "inbound stream ended");
            return;
        }

        let pipe = inbound.entry(slot).or_insert_with(|| {
            trace!(slot, "inbound stream opened");
            let pipe = Arc::new(Queue::new());
            self.accepted
                .push(InboundStream::new(slot, Arc::clone(&pipe)));
            pipe
        });
        pipe.push(payload);
    }

    fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        (self.shutdown)();

        for inbox in &self.inboxes {
            inbox.close();
        }
        self.accepted.close();
        for (_, pipe) in self.inbound.lock().drain() {
            pipe.abort();
        }
        self.slots.close();
        info!("multiplexer closed");
    }
}

impl StreamSink for Shared {
    fn send_frame(&self, channel: u16, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(MuxError::Closed);
        }
        let result = self.writer.lock().send(channel, payload);
        if let Err(err) = &result {
            // A partially written frame leaves the byte stream unusable.
            warn!(channel, error = %err, "frame write failed; closing multiplexer");
            self.teardown();
        }
        result
    }

    fn release_slot(&self, slot: u16) {
        self.slots.release(slot);
    }
}

fn demux<R: Read>(shared: Arc<Shared>, mut frames: FrameReader<R>) {
    loop {
        match frames.read_frame() {
            Ok(frame) => shared.route(frame),
            Err(MuxError::ConnectionClosed) => {
                if !shared.is_closed() {
                    info!("peer closed the connection");
                }
                break;
            }
            Err(err) => {
                if !shared.is_closed() {
                    warn!(error = %err, "demultiplexer stopped");
                }
                break;
            }
        }
    }
    shared.teardown();
}
