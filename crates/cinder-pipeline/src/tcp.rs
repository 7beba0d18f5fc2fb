//! TCP transport.
//!
//! [`TcpConnection`] speaks RESP over a plain `TcpStream`: requests are
//! encoded into a reusable write buffer and flushed one by one, replies
//! are parsed out of a [`FrameReader`] as they arrive. [`TcpConnector`]
//! dials nodes on demand for a pipeline.

use std::time::Duration;

use bytes::BytesMut;
use cinder_protocol::{encode_command, Frame, FrameReader};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::command::CommandArgs;
use crate::connection::{Connection, ConnectionProvider};
use crate::error::TransportError;
use crate::node::NodeAddr;

/// Socket options for dialed connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TcpConfig {
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<Duration>,

    /// Disable Nagle's algorithm so each pipelined write leaves promptly.
    pub nodelay: bool,

    /// Initial receive buffer size in bytes.
    pub read_buffer_size: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            nodelay: true,
            read_buffer_size: 4096,
        }
    }
}

/// A RESP connection to one node.
#[derive(Debug)]
pub struct TcpConnection {
    node: NodeAddr,
    stream: TcpStream,
    reader: FrameReader,
    write_buf: BytesMut,
}

impl TcpConnection {
    /// Dials `node`.
    pub async fn connect(node: NodeAddr, config: &TcpConfig) -> Result<Self, TransportError> {
        let dial = TcpStream::connect(node.socket_addr());
        let stream = match config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, dial)
                .await
                .map_err(|_| TransportError::Timeout(limit))??,
            None => dial.await?,
        };
        stream.set_nodelay(config.nodelay)?;
        debug!(%node, "connected");

        Ok(Self {
            node,
            stream,
            reader: FrameReader::with_capacity(config.read_buffer_size),
            write_buf: BytesMut::with_capacity(1024),
        })
    }

    /// The node this connection is attached to.
    pub fn node(&self) -> NodeAddr {
        self.node
    }

    /// Reads one complete reply.
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            if let Some(frame) = self.reader.next_frame()? {
                return Ok(frame);
            }

            let n = self.stream.read_buf(self.reader.buffer_mut()).await?;
            if n == 0 {
                return Err(TransportError::Disconnected);
            }
        }
    }
}

impl Connection for TcpConnection {
    async fn write(&mut self, args: &CommandArgs) -> Result<(), TransportError> {
        self.write_buf.clear();
        encode_command(args.as_slice(), &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_many(&mut self, n: usize) -> Result<Vec<Frame>, TransportError> {
        let mut replies = Vec::with_capacity(n);
        while replies.len() < n {
            replies.push(self.read_frame().await?);
        }
        Ok(replies)
    }

    async fn release(mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        debug!(node = %self.node, "connection released");
        Ok(())
    }
}

/// Dials a fresh [`TcpConnection`] for every node a pipeline touches.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    config: TcpConfig,
}

impl TcpConnector {
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }
}

impl ConnectionProvider for TcpConnector {
    type Conn = TcpConnection;

    async fn acquire(&self, node: NodeAddr) -> Result<TcpConnection, TransportError> {
        TcpConnection::connect(node, &self.config).await
    }
}
