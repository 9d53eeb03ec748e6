//! Bit-granular stream codec.
//!
//! [`BitWriter`] packs values of any width from 0 to 64 bits onto a byte
//! stream, most-significant bit first within each byte. [`BitReader`] mirrors it
//! exactly. There are no self-synchronizing markers: a reader must request the
//! same widths the writer used, in the same order, or the rest of the stream is
//! garbage.
//!
//! ```text
//! write(0b101, 3); write(0b1, 1); flush()
//! byte 0: 1 0 1 1 0 0 0 0
//!         └─┬─┘ │ └──┬──┘
//!          3b  1b  zero padding
//! ```

pub mod error;
pub mod precision;
pub mod reader;
pub mod writer;

pub use error::{BitsError, Result};
pub use precision::{max_utf8_bytes, precision, precision_for_span, string_length_bits};
pub use reader::BitReader;
pub use writer::BitWriter;
