//! Reply frame types.
//!
//! A [`Frame`] is one decoded reply from a store node. Bulk payloads are
//! held as `Bytes` so decoders can hand them to callers without copying.

use bytes::Bytes;

/// A single reply frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Status reply, e.g. `+OK\r\n`.
    Simple(String),

    /// Error reply, e.g. `-WRONGTYPE Operation against a key\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Binary-safe string, e.g. `$5\r\nhello\r\n`.
    Bulk(Bytes),

    /// Ordered array of frames.
    Array(Vec<Frame>),

    /// Null. Produced by RESP3 `_\r\n` and by the RESP2 forms `$-1\r\n`
    /// and `*-1\r\n`.
    Null,

    /// Ordered map of key-value frame pairs (RESP3 `%`).
    Map(Vec<(Frame, Frame)>),

    /// RESP3 boolean, `#t\r\n` or `#f\r\n`.
    Boolean(bool),

    /// RESP3 double, e.g. `,3.14\r\n`.
    Double(f64),
}

impl Frame {
    /// Returns `true` if this frame is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null)
    }

    /// Returns `true` if this frame is an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// Short name of the frame type, used in decode error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "bulk string",
            Frame::Array(_) => "array",
            Frame::Null => "null",
            Frame::Map(_) => "map",
            Frame::Boolean(_) => "boolean",
            Frame::Double(_) => "double",
        }
    }

    /// Returns the raw bytes of a bulk or simple string frame.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Frame::Bulk(b) => Some(b),
            Frame::Simple(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}
