//! Correlated RPC calls over a multiplexer.
//!
//! A [`RequestChannel`] turns one [`Multiplexer`](bitrpc_mux::Multiplexer)
//! into a two-way call channel:
//! - every call starts with a bit-packed [`CallHeader`]
//! - small calls travel as one message on the short channel
//! - calls that outgrow it continue on a pooled stream
//!
//! Two-way calls get a 24-bit call id, and the response carries it back.
//! Failures travel out of band as [`ControlMessage`]s to a reserved control
//! target that every channel serves.
//!
//! ```text
//! caller                                 callee
//!   start_request ── header + body ──▶  TargetResolver ─▶ RequestReceiver
//!   wait_response ◀── response ──────    response_stream
//!                 ◀── AbortRequest ──    abort
//! ```
//!
//! [`ServiceProxy`] and [`ServiceDispatcher`] add typed calls on top, using
//! the interface contracts of `bitrpc-schema`.

pub mod calls;
pub mod channel;
pub mod config;
pub mod connector;
pub mod control;
pub mod error;
pub mod header;
pub mod listener;
pub mod receiver;
pub mod request;
pub mod service;
pub mod stream;
pub mod target;

pub use calls::{CallTable, ResponseStream};
pub use channel::RequestChannel;
pub use config::{ChannelConfig, DEFAULT_FALLBACK_LEN};
pub use connector::{connect, connect_with_config};
pub use control::{ControlMessage, ControlReceiver, CONTROL_INTERFACE_ID};
pub use error::{ChannelError, Result};
pub use header::{Addressing, CallFlags, CallHeader, MAX_CALL_ID, MAX_PATH_LEN};
pub use listener::ChannelListener;
pub use receiver::{NoTargets, RequestReceiver, TargetResolver};
pub use request::{InboundRequest, OutboundRequest, RequestBody, StreamRequest};
pub use service::{ServiceDirectory, ServiceDispatcher, ServiceHandler, ServiceProxy};
pub use stream::CallStream;
pub use target::{LongTarget, RequestTarget, ShortTarget};
