//! Bit-packed RPC over a multiplexed byte stream.
//!
//! bitrpc encodes call arguments at the bit level (integers take exactly the
//! width their declared range needs) and carries the calls over a single
//! connection split into message channels and pooled streams.
//!
//! # Crate Structure
//!
//! - [`transport`]: connected byte streams (Unix domain sockets, TCP)
//! - [`bits`]: the bit stream codec
//! - [`mux`]: fixed channels and pooled streams over one framed connection
//! - [`schema`]: field descriptors, the value serializer and interface contracts
//! - [`channel`]: correlated calls and the control protocol (behind `channel` feature)

/// Re-export transport types.
pub mod transport {
    pub use bitrpc_transport::*;
}

/// Re-export bit codec types.
pub mod bits {
    pub use bitrpc_bits::*;
}

/// Re-export multiplexer types.
pub mod mux {
    pub use bitrpc_mux::*;
}

/// Re-export serializer and contract types.
pub mod schema {
    pub use bitrpc_schema::*;
}

/// Re-export call channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use bitrpc_channel::*;
}
