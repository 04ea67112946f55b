//! Error types for the message model.
//!
//! Wire-level failures come from [`tagwire_proto::WireError`] and pass
//! through unchanged. Everything else here is a misuse of the schema or of a
//! builder handle, detected before any state is modified.

use tagwire_proto::WireError;
use thiserror::Error;

use crate::schema::FieldKind;

/// Errors raised by field access, builders and snapshot parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    /// The message type declares no field with this number
    #[error("{message} has no field {number}")]
    UnknownField {
        /// Name of the message type
        message: &'static str,
        /// Requested field number
        number: u32,
    },

    /// The value does not fit the declared field kind
    #[error("field {number} is {expected:?}, got a {found} value")]
    KindMismatch {
        /// Field number
        number: u32,
        /// Declared kind
        expected: FieldKind,
        /// Kind of the offered value
        found: &'static str,
    },

    /// A repeated-only operation was used on a singular field
    #[error("field {0} is not repeated")]
    NotRepeated(u32),

    /// A singular-only operation was used on a repeated field
    #[error("field {0} is repeated")]
    NotSingular(u32),

    /// A message of one type was offered where another type is required
    #[error("expected a {expected} message, got {found}")]
    TypeMismatch {
        /// Required message type
        expected: &'static str,
        /// Type of the offered message
        found: &'static str,
    },

    /// A builder was requested for a field that does not hold a message
    #[error("field {0} does not hold a message")]
    NotMessage(u32),

    /// Repeated-field index past the end
    #[error("index {index} out of range for field {number} with {len} elements")]
    IndexOutOfRange {
        /// Field number
        number: u32,
        /// Requested index
        index: usize,
        /// Current number of elements
        len: usize,
    },

    /// The builder handle refers to a node that was removed or detached
    #[error("builder handle is stale")]
    StaleNode,

    /// Encoding or decoding failed
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Result alias for message-model operations
pub type Result<T> = std::result::Result<T, FieldError>;
