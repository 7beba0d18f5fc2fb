//! Connection seams.
//!
//! A pipeline owns one [`Connection`] per node for its whole lifetime and
//! is the only reader and writer on it. That exclusivity is what lets
//! replies be matched to requests purely by position: the n-th reply read
//! from a connection belongs to the n-th request written to it.

use std::future::Future;

use cinder_protocol::Frame;

use crate::command::CommandArgs;
use crate::error::TransportError;
use crate::node::NodeAddr;

/// A duplex, in-order channel to one node.
pub trait Connection: Send + 'static {
    /// Sends one request. Completes once the request is flushed; never
    /// waits for the reply.
    fn write(
        &mut self,
        args: &CommandArgs,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Reads exactly `n` replies in the order their requests were written.
    ///
    /// On error the connection's read position is undefined and none of
    /// the `n` replies are returned.
    fn read_many(&mut self, n: usize)
        -> impl Future<Output = Result<Vec<Frame>, TransportError>> + Send;

    /// Closes the connection or hands it back to its owner.
    fn release(self) -> impl Future<Output = Result<(), TransportError>> + Send
    where
        Self: Sized;
}

/// Hands out connections to nodes.
pub trait ConnectionProvider {
    type Conn: Connection;

    /// Returns a usable connection to `node`. May dial the node.
    fn acquire(
        &self,
        node: NodeAddr,
    ) -> impl Future<Output = Result<Self::Conn, TransportError>> + Send;
}
