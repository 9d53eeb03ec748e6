//! Channel multiplexing over a single byte stream.
//!
//! Every unit on the wire is a frame:
//! - a 2-byte magic number (`"BR"`) for stream synchronization
//! - a 4-byte little-endian payload length
//! - a 2-byte little-endian channel id
//!
//! Channel ids below [`STREAM_CHANNEL_START`] are fixed logical channels that
//! carry whole, bounded messages. Ids from there on are pooled stream slots:
//! unidirectional byte streams of any length, opened implicitly by their first
//! frame and ended by an empty one.
//!
//! [`Multiplexer`] and [`FixedChannel`] are the interface the RPC layer
//! consumes; [`FramedMux`] implements them over an [`RpcStream`] or any pair of
//! `Read`/`Write` halves.
//!
//! [`RpcStream`]: bitrpc_transport::RpcStream

pub mod channel;
pub mod error;
pub mod frame;
pub mod framed;
pub mod mux;
pub mod pool;
mod queue;
pub mod reader;
pub mod writer;

pub use channel::{ChannelId, MAX_STREAM_SLOTS, STREAM_CHANNEL_START};
pub use error::{MuxError, Result};
pub use frame::{
    decode_frame, encode_frame, encode_header, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use framed::{FramedMux, MuxConfig, DEFAULT_MAX_MESSAGE_LEN};
pub use mux::{FixedChannel, Multiplexer};
pub use pool::{InboundStream, PooledWriter};
pub use reader::FrameReader;
pub use writer::FrameWriter;
