//! cinder-protocol: RESP wire codec for the pipelining client.
//!
//! Encodes outgoing requests as arrays of bulk strings and parses the
//! replies a store node sends back. Replies may use either RESP2 or RESP3
//! framing; RESP2 null bulk strings and null arrays both map to
//! [`Frame::Null`].
//!
//! # quick start
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use cinder_protocol::{encode_command, parse_frame, Frame};
//!
//! let mut out = BytesMut::new();
//! encode_command(&[Bytes::from_static(b"GET"), Bytes::from_static(b"k")], &mut out);
//! assert_eq!(&out[..], b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
//!
//! let (frame, consumed) = parse_frame(b"$-1\r\n").unwrap().unwrap();
//! assert_eq!(frame, Frame::Null);
//! assert_eq!(consumed, 5);
//! ```

pub mod error;
pub mod parse;
mod serialize;
pub mod types;

pub use error::ProtocolError;
pub use parse::{parse_frame, FrameReader};
pub use serialize::encode_command;
pub use types::Frame;
