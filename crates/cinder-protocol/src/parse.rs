//! Reply parser.
//!
//! [`parse_frame`] is a pure function over a byte slice: it either yields a
//! complete frame plus the number of bytes it occupied, reports that more
//! data is needed, or fails on malformed input. [`FrameReader`] wraps it
//! with an owned receive buffer for use on a socket.
//!
//! Pipelined replies arrive back to back on the same stream, so the parser
//! never consumes past the end of the first frame.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::types::Frame;

/// Maximum nesting depth for arrays and maps.
const MAX_NESTING_DEPTH: usize = 64;

/// Maximum number of elements in an array or map.
const MAX_AGGREGATE_ELEMENTS: usize = 1_048_576;

/// Maximum length of a bulk string in bytes (512 MB, same as the server).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Cap for up-front aggregate allocation. The vec still grows past this
/// as elements are actually parsed.
const PREALLOC_CAP: usize = 1024;

/// Parses one frame from the front of `buf`.
///
/// Returns `Ok(Some((frame, consumed)))` for a complete frame, `Ok(None)`
/// if `buf` ends before the frame does, or an error for malformed data.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut parser = Parser { buf, pos: 0 };
    match parser.frame(0) {
        Ok(frame) => Ok(Some((frame, parser.pos))),
        Err(Halt::Incomplete) => Ok(None),
        Err(Halt::Invalid(e)) => Err(e),
    }
}

/// Buffered frame reader for a byte stream.
///
/// Bytes read from the socket are appended to [`buffer_mut`](Self::buffer_mut);
/// [`next_frame`](Self::next_frame) pops whole frames off the front.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
}

impl FrameReader {
    /// Creates a reader with the given initial buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// The receive buffer. Socket reads append here.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Number of buffered bytes not yet consumed as frames.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pops the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        match parse_frame(&self.buf)? {
            Some((frame, consumed)) => {
                self.buf.advance(consumed);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

/// Why the parser stopped without producing a frame.
enum Halt {
    Incomplete,
    Invalid(ProtocolError),
}

impl From<ProtocolError> for Halt {
    fn from(e: ProtocolError) -> Self {
        Halt::Invalid(e)
    }
}

struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn frame(&mut self, depth: usize) -> Result<Frame, Halt> {
        let prefix = self.byte()?;
        match prefix {
            b'+' => Ok(Frame::Simple(self.utf8_line("simple string")?)),
            b'-' => Ok(Frame::Error(self.utf8_line("error reply")?)),
            b':' => Ok(Frame::Integer(self.integer_line()?)),
            b'$' => self.bulk(),
            b'*' => {
                let Some(count) = self.aggregate_len(depth)? else {
                    return Ok(Frame::Null);
                };
                let mut items = Vec::with_capacity(count.min(PREALLOC_CAP));
                for _ in 0..count {
                    items.push(self.frame(depth + 1)?);
                }
                Ok(Frame::Array(items))
            }
            b'%' => {
                let Some(count) = self.aggregate_len(depth)? else {
                    return Ok(Frame::Null);
                };
                let mut pairs = Vec::with_capacity(count.min(PREALLOC_CAP));
                for _ in 0..count {
                    let key = self.frame(depth + 1)?;
                    let val = self.frame(depth + 1)?;
                    pairs.push((key, val));
                }
                Ok(Frame::Map(pairs))
            }
            b'_' => {
                self.line()?;
                Ok(Frame::Null)
            }
            b'#' => match self.line()? {
                b"t" => Ok(Frame::Boolean(true)),
                b"f" => Ok(Frame::Boolean(false)),
                _ => Err(ProtocolError::InvalidBoolean.into()),
            },
            b',' => {
                let line = self.line()?;
                let val = std::str::from_utf8(line)
                    .ok()
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or(ProtocolError::InvalidDouble)?;
                Ok(Frame::Double(val))
            }
            other => Err(ProtocolError::InvalidPrefix(other).into()),
        }
    }

    fn bulk(&mut self) -> Result<Frame, Halt> {
        let len = self.integer_line()?;
        if len == -1 {
            // RESP2 null bulk string
            return Ok(Frame::Null);
        }
        if len < 0 {
            return Err(ProtocolError::InvalidFrameLength(len).into());
        }
        if len > MAX_BULK_LEN {
            return Err(ProtocolError::BulkStringTooLarge(len as usize).into());
        }

        let len = len as usize;
        let start = self.pos;
        let end = start + len;
        if self.buf.len() < end + 2 {
            return Err(Halt::Incomplete);
        }
        if &self.buf[end..end + 2] != b"\r\n" {
            return Err(ProtocolError::InvalidFrameLength(len as i64).into());
        }
        self.pos = end + 2;
        Ok(Frame::Bulk(Bytes::copy_from_slice(&self.buf[start..end])))
    }

    /// Reads an aggregate header. `None` means the RESP2 null form (`-1`).
    fn aggregate_len(&mut self, depth: usize) -> Result<Option<usize>, Halt> {
        if depth + 1 > MAX_NESTING_DEPTH {
            return Err(ProtocolError::NestingTooDeep(MAX_NESTING_DEPTH).into());
        }
        let count = self.integer_line()?;
        if count == -1 {
            return Ok(None);
        }
        if count < 0 {
            return Err(ProtocolError::InvalidFrameLength(count).into());
        }
        if count as usize > MAX_AGGREGATE_ELEMENTS {
            return Err(ProtocolError::TooManyElements(count as usize).into());
        }
        Ok(Some(count as usize))
    }

    fn byte(&mut self) -> Result<u8, Halt> {
        let b = *self.buf.get(self.pos).ok_or(Halt::Incomplete)?;
        self.pos += 1;
        Ok(b)
    }

    /// Returns the bytes up to the next `\r\n` and moves past it.
    fn line(&mut self) -> Result<&'a [u8], Halt> {
        let start = self.pos;
        let mut from = start;
        while let Some(offset) = memchr::memchr(b'\r', &self.buf[from..]) {
            let cr = from + offset;
            match self.buf.get(cr + 1) {
                Some(b'\n') => {
                    self.pos = cr + 2;
                    return Ok(&self.buf[start..cr]);
                }
                Some(_) => from = cr + 1,
                None => break,
            }
        }
        Err(Halt::Incomplete)
    }

    fn utf8_line(&mut self, what: &'static str) -> Result<String, Halt> {
        let line = self.line()?;
        let s = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8(what))?;
        Ok(s.to_owned())
    }

    fn integer_line(&mut self) -> Result<i64, Halt> {
        let line = self.line()?;
        Ok(parse_i64(line)?)
    }
}

/// Parses a decimal i64 without going through `str`.
///
/// Negative values accumulate downward so `i64::MIN` does not overflow.
fn parse_i64(digits: &[u8]) -> Result<i64, ProtocolError> {
    let (negative, digits) = match digits.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, digits),
    };
    if digits.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::InvalidInteger);
        }
        let d = (b - b'0') as i64;
        n = n
            .checked_mul(10)
            .and_then(|n| if negative { n.checked_sub(d) } else { n.checked_add(d) })
            .ok_or(ProtocolError::InvalidInteger)?;
    }
    Ok(n)
}
