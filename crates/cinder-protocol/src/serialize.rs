//! Direct-to-buffer serialization.
//!
//! Requests go out as arrays of bulk strings via [`encode_command`], which
//! skips building an intermediate [`Frame`]. `Frame::serialize` covers the
//! reply side and is what test doubles use to answer like a real node.

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::Frame;

/// Encodes a request as an array of bulk strings into `dst`.
pub fn encode_command(args: &[Bytes], dst: &mut BytesMut) {
    let payload: usize = args.iter().map(|a| a.len() + 16).sum();
    dst.reserve(payload + 16);

    dst.put_u8(b'*');
    write_len(args.len(), dst);
    for arg in args {
        dst.put_u8(b'$');
        write_len(arg.len(), dst);
        dst.put_slice(arg);
        dst.put_slice(b"\r\n");
    }
}

impl Frame {
    /// Serializes this frame, including type prefix and trailing `\r\n`.
    pub fn serialize(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Error(msg) => {
                dst.put_u8(b'-');
                dst.put_slice(msg.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(n) => {
                dst.put_u8(b':');
                let mut buf = itoa::Buffer::new();
                dst.put_slice(buf.format(*n).as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Bulk(data) => {
                dst.put_u8(b'$');
                write_len(data.len(), dst);
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Frame::Array(items) => {
                dst.put_u8(b'*');
                write_len(items.len(), dst);
                for item in items {
                    item.serialize(dst);
                }
            }
            Frame::Null => dst.put_slice(b"_\r\n"),
            Frame::Map(pairs) => {
                dst.put_u8(b'%');
                write_len(pairs.len(), dst);
                for (key, val) in pairs {
                    key.serialize(dst);
                    val.serialize(dst);
                }
            }
            Frame::Boolean(b) => dst.put_slice(if *b { b"#t\r\n" } else { b"#f\r\n" }),
            Frame::Double(d) => {
                dst.put_u8(b',');
                if d.is_nan() {
                    dst.put_slice(b"nan");
                } else if d.is_infinite() {
                    dst.put_slice(if *d > 0.0 { &b"inf"[..] } else { &b"-inf"[..] });
                } else {
                    dst.put_slice(d.to_string().as_bytes());
                }
                dst.put_slice(b"\r\n");
            }
        }
    }
}

/// Writes a length followed by `\r\n`.
fn write_len(len: usize, dst: &mut BytesMut) {
    let mut buf = itoa::Buffer::new();
    dst.put_slice(buf.format(len).as_bytes());
    dst.put_slice(b"\r\n");
}
