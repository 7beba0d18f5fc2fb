//! Per-node connection and reply-queue bookkeeping.
//!
//! The registry is an insertion-ordered map from [`NodeAddr`] to the node's
//! connection plus the FIFO of replies still owed on it. Entries live in a
//! `Vec` arena in the order nodes were first addressed, with a hash index
//! on the side, so draining walks nodes in a fixed, reproducible order.

use std::collections::VecDeque;
use std::time::Duration;

use ahash::AHashMap;
use cinder_protocol::Frame;
use tracing::{debug, warn};

use crate::command::{CommandArgs, Decoder};
use crate::connection::Connection;
use crate::deferred::Resolver;
use crate::error::{ReplyError, TransportError};
use crate::node::NodeAddr;

/// One reply owed to a caller.
///
/// Owns the command's decoder and the write half of its deferred result,
/// with the reply type erased so one queue can hold any mix of commands.
pub(crate) struct PendingReply {
    settle: Box<dyn FnOnce(Result<Frame, TransportError>) + Send>,
}

impl PendingReply {
    pub(crate) fn new<T>(decoder: Decoder<T>, resolver: Resolver<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let settle = move |reply: Result<Frame, TransportError>| {
            let outcome = match reply {
                Ok(Frame::Error(msg)) => Err(ReplyError::Server(msg)),
                Ok(frame) => decoder(frame).map_err(ReplyError::Decode),
                Err(e) => Err(ReplyError::Transport(e)),
            };
            resolver.resolve(outcome);
        };
        Self {
            settle: Box::new(settle),
        }
    }

    fn complete(self, frame: Frame) {
        (self.settle)(Ok(frame))
    }

    fn fail(self, err: TransportError) {
        (self.settle)(Err(err))
    }
}

/// What draining one node produced.
#[derive(Debug)]
pub(crate) enum NodeDrain {
    /// Nothing was queued; no I/O happened.
    Idle,
    /// Every queued reply was read and handed to its decoder.
    Complete { replies: usize },
    /// The node failed; every queued reply got this error.
    Failed {
        node: NodeAddr,
        error: TransportError,
    },
}

/// A node's connection and the replies still owed on it.
pub(crate) struct NodeEntry<C> {
    node: NodeAddr,
    conn: C,
    queue: VecDeque<PendingReply>,
    /// Set once the connection can no longer be trusted to stay in step
    /// with the queue. No further reads or writes are attempted.
    broken: Option<TransportError>,
}

impl<C: Connection> NodeEntry<C> {
    fn new(node: NodeAddr, conn: C, queue_capacity: usize) -> Self {
        Self {
            node,
            conn,
            queue: VecDeque::with_capacity(queue_capacity),
            broken: None,
        }
    }

    pub(crate) fn node(&self) -> NodeAddr {
        self.node
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    /// Writes a request and queues its reply slot.
    ///
    /// A failed write marks the node broken rather than failing the
    /// submission; the reply slot is queued either way and fails at drain.
    pub(crate) async fn send(&mut self, args: &CommandArgs, reply: PendingReply) {
        if self.broken.is_none() {
            if let Err(e) = self.conn.write(args).await {
                warn!(node = %self.node, error = %e, "pipelined write failed, node marked broken");
                self.broken = Some(e);
            }
        }
        self.queue.push_back(reply);
    }

    /// Reads every owed reply and resolves the queue front to back.
    pub(crate) async fn drain(&mut self, read_timeout: Option<Duration>) -> NodeDrain {
        let expected = self.queue.len();
        if expected == 0 {
            return NodeDrain::Idle;
        }

        if let Some(err) = self.broken.clone() {
            return self.fail_all(err);
        }

        let read = self.conn.read_many(expected);
        let result = match read_timeout {
            Some(limit) => match tokio::time::timeout(limit, read).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(limit)),
            },
            None => read.await,
        };

        match result {
            Ok(replies) if replies.len() == expected => {
                for (frame, pending) in replies.into_iter().zip(self.queue.drain(..)) {
                    pending.complete(frame);
                }
                debug!(node = %self.node, replies = expected, "node drained");
                NodeDrain::Complete { replies: expected }
            }
            Ok(replies) => {
                let err = TransportError::ShortRead {
                    expected,
                    got: replies.len(),
                };
                self.broken = Some(err.clone());
                self.fail_all(err)
            }
            Err(err) => {
                self.broken = Some(err.clone());
                self.fail_all(err)
            }
        }
    }

    fn fail_all(&mut self, error: TransportError) -> NodeDrain {
        debug!(node = %self.node, pending = self.queue.len(), "failing queued replies");
        for pending in self.queue.drain(..) {
            pending.fail(error.clone());
        }
        NodeDrain::Failed {
            node: self.node,
            error,
        }
    }

    /// Releases the connection. Replies still queued are dropped
    /// unresolved, so callers drain first.
    pub(crate) async fn release(self) -> Result<(), TransportError> {
        self.conn.release().await
    }
}

/// Insertion-ordered `NodeAddr → NodeEntry` map.
pub(crate) struct NodeRegistry<C> {
    index: AHashMap<NodeAddr, usize>,
    entries: Vec<NodeEntry<C>>,
    queue_capacity: usize,
}

impl<C: Connection> NodeRegistry<C> {
    pub(crate) fn new(queue_capacity: usize) -> Self {
        Self {
            index: AHashMap::new(),
            entries: Vec::new(),
            queue_capacity,
        }
    }

    /// Position of `node` in first-seen order, if it has an entry.
    pub(crate) fn position(&self, node: &NodeAddr) -> Option<usize> {
        self.index.get(node).copied()
    }

    /// Appends an entry for a node seen for the first time.
    ///
    /// Returns its position. Callers check [`position`](Self::position)
    /// first; inserting a node twice is a bug.
    pub(crate) fn insert(&mut self, node: NodeAddr, conn: C) -> usize {
        debug_assert!(!self.index.contains_key(&node), "node {node} registered twice");
        let pos = self.entries.len();
        self.entries
            .push(NodeEntry::new(node, conn, self.queue_capacity));
        self.index.insert(node, pos);
        pos
    }

    pub(crate) fn entry_mut(&mut self, pos: usize) -> &mut NodeEntry<C> {
        &mut self.entries[pos]
    }

    /// Entries in first-seen order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &NodeEntry<C>> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut NodeEntry<C>> {
        self.entries.iter_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total replies still owed across all nodes.
    pub(crate) fn pending(&self) -> usize {
        self.entries.iter().map(NodeEntry::pending).sum()
    }

    /// Removes every entry, in first-seen order.
    pub(crate) fn take_all(&mut self) -> Vec<NodeEntry<C>> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}
