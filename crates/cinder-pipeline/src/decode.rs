//! Reusable reply decoders.
//!
//! Each decoder takes ownership of the reply frame. Error replies never
//! reach a decoder: the pipeline turns them into
//! [`ReplyError::Server`](crate::ReplyError::Server) first.

use bytes::Bytes;
use cinder_protocol::Frame;

use crate::error::DecodeError;

/// Hands the frame back unchanged.
pub fn frame(frame: Frame) -> Result<Frame, DecodeError> {
    Ok(frame)
}

/// Expects the `+OK` status reply.
pub fn ok(frame: Frame) -> Result<(), DecodeError> {
    match frame {
        Frame::Simple(s) if s == "OK" => Ok(()),
        other => Err(DecodeError::unexpected("OK", &other)),
    }
}

pub fn integer(frame: Frame) -> Result<i64, DecodeError> {
    match frame {
        Frame::Integer(n) => Ok(n),
        other => Err(DecodeError::unexpected("integer", &other)),
    }
}

/// Accepts a RESP3 boolean or the RESP2 convention of integer 0/1.
pub fn boolean(frame: Frame) -> Result<bool, DecodeError> {
    match frame {
        Frame::Boolean(b) => Ok(b),
        Frame::Integer(0) => Ok(false),
        Frame::Integer(1) => Ok(true),
        Frame::Integer(n) => Err(DecodeError::Custom(format!(
            "expected 0 or 1, got integer {n}"
        ))),
        other => Err(DecodeError::unexpected("boolean", &other)),
    }
}

/// A bulk or status string as raw bytes.
pub fn bytes(frame: Frame) -> Result<Bytes, DecodeError> {
    match frame {
        Frame::Bulk(b) => Ok(b),
        Frame::Simple(s) => Ok(Bytes::from(s)),
        other => Err(DecodeError::unexpected("bulk string", &other)),
    }
}

/// Like [`bytes`], with null mapped to `None`.
pub fn optional_bytes(frame: Frame) -> Result<Option<Bytes>, DecodeError> {
    match frame {
        Frame::Null => Ok(None),
        other => bytes(other).map(Some),
    }
}

/// A bulk or status string that must be valid utf-8.
pub fn string(frame: Frame) -> Result<String, DecodeError> {
    let raw = bytes(frame)?;
    String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}

pub fn double(frame: Frame) -> Result<f64, DecodeError> {
    match frame {
        Frame::Double(d) => Ok(d),
        Frame::Bulk(ref b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DecodeError::Custom("bulk string is not a number".into())),
        other => Err(DecodeError::unexpected("double", &other)),
    }
}

/// Decodes an array reply element by element.
///
/// The first element that fails to decode fails the whole reply.
pub fn array<T, F>(item: F) -> impl FnOnce(Frame) -> Result<Vec<T>, DecodeError> + Send + 'static
where
    T: 'static,
    F: Fn(Frame) -> Result<T, DecodeError> + Send + 'static,
{
    move |frame| match frame {
        Frame::Array(items) => items.into_iter().map(&item).collect(),
        other => Err(DecodeError::unexpected("array", &other)),
    }
}
