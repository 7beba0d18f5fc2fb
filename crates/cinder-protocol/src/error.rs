//! Protocol error types for reply parsing.

use thiserror::Error;

/// Errors that can occur when parsing a reply off the wire.
///
/// Any of these leaves the connection's read position undefined, so the
/// caller must treat the connection as desynchronized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The first byte of a frame didn't match any known type prefix.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// Failed to parse an integer value from the frame content.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// Failed to parse a double value from the frame content.
    #[error("invalid double encoding")]
    InvalidDouble,

    /// A boolean frame held something other than `t` or `f`.
    #[error("invalid boolean encoding")]
    InvalidBoolean,

    /// A simple string or error line was not valid utf-8.
    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),

    /// A bulk string or aggregate declared an invalid length.
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i64),

    /// A bulk string exceeded the maximum allowed size.
    #[error("bulk string too large: {0} bytes")]
    BulkStringTooLarge(usize),

    /// An array or map declared more elements than allowed.
    #[error("too many elements: {0}")]
    TooManyElements(usize),

    /// Aggregates were nested deeper than allowed.
    #[error("frame nesting exceeds {0} levels")]
    NestingTooDeep(usize),
}
