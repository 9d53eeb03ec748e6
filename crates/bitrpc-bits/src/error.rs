/// Errors raised while packing or unpacking bits.
#[derive(Debug, thiserror::Error)]
pub enum BitsError {
    /// A single field wider than 64 bits was requested.
    #[error("bit width {0} exceeds 64")]
    WidthTooLarge(u32),

    /// A string exceeds the declared maximum length.
    #[error("string length {len} exceeds maximum {max}")]
    StringTooLong { len: usize, max: usize },

    /// A decoded string length prefix is larger than the declared maximum allows.
    #[error("string length prefix {len} exceeds maximum of {max} bytes")]
    InvalidStringLength { len: u64, max: u64 },

    /// Decoded string bytes are not UTF-8.
    #[error("string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The underlying stream ended in the middle of a field.
    #[error("end of stream with {needed} bits still to read")]
    EndOfStream { needed: u32 },

    /// An I/O error occurred on the underlying stream.
    #[error("bit stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BitsError>;
