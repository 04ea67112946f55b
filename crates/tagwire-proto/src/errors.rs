//! Error types for the wire codec.
//!
//! Every failure the writer or reader can hit is a distinct variant so that
//! callers (usually a message's `merge_from`) can decide whether to abort the
//! whole parse or to fall back to unknown-field storage. The codec itself
//! never retries, never recovers silently and never logs.

use std::io;

use thiserror::Error;

/// Errors raised while encoding or decoding the wire format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    // Writer errors
    /// A fixed-capacity sink cannot take the bytes of the current write
    #[error("out of space: write needs {needed} bytes, only {remaining} remain")]
    OutOfSpace {
        /// Bytes the failed write needed
        needed: usize,
        /// Capacity left for new bytes when the write was attempted
        remaining: usize,
    },

    /// The writer was asked to emit a tag for an impossible field number
    #[error("invalid field number: {0} (must be 1..=536870911)")]
    InvalidFieldNumber(u32),

    /// A length-prefixed value wrote a different number of bytes than its
    /// precomputed length claimed
    #[error("length mismatch: declared {declared} bytes, wrote {written}")]
    LengthMismatch {
        /// Length emitted in the prefix
        declared: usize,
        /// Bytes actually written for the value
        written: usize,
    },

    // Reader errors
    /// A varint ran past ten bytes without a terminating byte
    #[error("malformed varint: more than 10 continuation bytes")]
    MalformedVarint,

    /// The source (or the active limit) ended in the middle of a value
    #[error("truncated input: the input ended in the middle of a value")]
    TruncatedInput,

    /// Nested messages or groups went deeper than the configured limit
    #[error("recursion limit exceeded: nesting deeper than {limit}")]
    RecursionLimitExceeded {
        /// The configured maximum depth
        limit: u32,
    },

    /// The parse consumed more bytes than the configured total-size limit
    #[error("size limit exceeded: more than {limit} bytes read")]
    SizeLimitExceeded {
        /// The configured maximum number of bytes
        limit: usize,
    },

    /// A tag carried one of the two unassigned wire-type values (6 or 7)
    #[error("invalid wire type: {0}")]
    InvalidWireType(u8),

    /// A tag decoded to field number zero or overflowed 32 bits
    #[error("invalid tag: {0:#x}")]
    InvalidTag(u64),

    /// Structural violation (mismatched group end, growing limit, ...)
    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),

    /// A string field did not hold well-formed UTF-8
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    // Stream errors (flattened so the enum stays `Clone + Eq`)
    /// The underlying stream sink or source failed
    #[error("I/O error ({kind:?}): {message}")]
    Io {
        /// Kind reported by the stream
        kind: io::ErrorKind,
        /// Rendered error message
        message: String,
    },
}

impl WireError {
    /// Returns true if the error means the input bytes are bad, as opposed
    /// to the destination being too small or the stream failing.
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedVarint
                | Self::TruncatedInput
                | Self::InvalidWireType(_)
                | Self::InvalidTag(_)
                | Self::MalformedMessage(_)
                | Self::InvalidUtf8
        )
    }
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return WireError::TruncatedInput;
        }
        WireError::Io { kind: err.kind(), message: err.to_string() }
    }
}

/// Convert back to `io::Error` at stream boundaries.
impl From<WireError> for io::Error {
    fn from(err: WireError) -> Self {
        let kind = match &err {
            WireError::Io { kind, .. } => *kind,
            WireError::OutOfSpace { .. } => io::ErrorKind::WriteZero,
            WireError::TruncatedInput => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err.to_string())
    }
}

/// Convenient Result type alias for codec operations
pub type Result<T> = std::result::Result<T, WireError>;
