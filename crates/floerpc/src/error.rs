//! # Error Definitions
//!
//! Framing and encoding failures. None of these are retried by the invocation
//! layer: a frame that fails here failed for good.

/// Failures while reading or writing wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The underlying buffer rejected an access (overflow, underflow, range).
    #[error("buffer error: {0}")]
    Buffer(#[from] floepack::Error),
    /// The first four bytes were not the protocol magic.
    #[error("bad magic: {0:02x?}")]
    BadMagic([u8; 4]),
    /// The peer speaks a protocol version this side does not.
    #[error("unsupported protocol {major}.{minor}")]
    UnsupportedProtocol { major: u8, minor: u8 },
    /// A frame or encapsulation uses an encoding version this side does not.
    #[error("unsupported encoding {major}.{minor}")]
    UnsupportedEncoding { major: u8, minor: u8 },
    /// The reply status byte is outside the known set.
    #[error("unknown reply status {0}")]
    UnknownReplyStatus(u8),
    /// The operation mode byte is outside the known set.
    #[error("unknown operation mode {0}")]
    UnknownOperationMode(u8),
    /// String data is not valid UTF-8.
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    /// A size or count field was negative.
    #[error("negative size {0}")]
    NegativeSize(i32),
    /// A size field disagrees with the number of bytes actually present.
    #[error("size mismatch: declared {declared}, actual {actual}")]
    SizeMismatch { declared: usize, actual: usize },
    /// The structure of the frame is inconsistent.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// An identity string could not be parsed.
    #[error("invalid identity `{input}`: {reason}")]
    IdentityParse { input: String, reason: String },
}

/// A specialized Result type for wire operations.
pub type Result<T> = std::result::Result<T, Error>;
