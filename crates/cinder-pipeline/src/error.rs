//! Error types for pipelined execution.
//!
//! Errors are split by how far they reach: a [`RoutingError`] or
//! acquisition failure rejects a single `submit` call, a [`TransportError`]
//! poisons the remaining replies of one node, and a [`DecodeError`] or
//! server error reply affects exactly one command.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use cinder_protocol::ProtocolError;
use thiserror::Error;

use crate::node::NodeAddr;

/// A command could not be mapped to exactly one node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The command names no keys, so there is nothing to route on.
    #[error("command has no keys to route on")]
    NoKeys,

    /// The command's keys live on more than one node.
    #[error("keys span multiple nodes ({first} and {second})")]
    CrossNode { first: NodeAddr, second: NodeAddr },

    /// The router has no owner for a key.
    #[error("no node owns key '{0}'")]
    Unroutable(String),
}

/// I/O or framing failure on a node connection.
///
/// Cloneable so one failure can be attached to every reply still
/// queued on the affected node.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(Arc<io::Error>),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("node disconnected")]
    Disconnected,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The connection returned fewer replies than were requested.
    #[error("expected {expected} replies, connection returned {got}")]
    ShortRead { expected: usize, got: usize },
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(Arc::new(e))
    }
}

/// A reply did not have the shape a command's decoder expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected}, got {got}")]
    UnexpectedFrame {
        expected: &'static str,
        got: &'static str,
    },

    #[error("reply is not valid utf-8")]
    InvalidUtf8,

    #[error("{0}")]
    Custom(String),
}

impl DecodeError {
    /// Shorthand for an unexpected frame type.
    pub fn unexpected(expected: &'static str, got: &cinder_protocol::Frame) -> Self {
        DecodeError::UnexpectedFrame {
            expected,
            got: got.kind(),
        }
    }
}

/// Why a [`Deferred`](crate::Deferred) holds no value.
#[derive(Debug, Clone, Error)]
pub enum ReplyError {
    /// The result was read before the pipeline was synced or closed.
    #[error("reply not available yet; sync or close the pipeline first")]
    NotReady,

    /// The node answered with an error reply.
    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ReplyError {
    /// Returns true for caller mistakes, as opposed to failures
    /// reported by the node or the transport.
    pub fn is_usage(&self) -> bool {
        matches!(self, ReplyError::NotReady)
    }
}

/// Errors returned synchronously by [`Pipeline::submit`](crate::Pipeline::submit).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Commands were submitted after `sync()` already drained the pipeline.
    #[error("pipeline already synced; start a new pipeline for more commands")]
    AlreadySynced,

    /// Commands were submitted after `close()`.
    #[error("pipeline is closed")]
    Closed,

    #[error("routing failed: {0}")]
    Routing(#[from] RoutingError),

    /// No connection could be obtained for the owning node.
    #[error("could not acquire connection to {node}: {source}")]
    Acquire {
        node: NodeAddr,
        #[source]
        source: TransportError,
    },
}

impl PipelineError {
    /// Returns true for caller mistakes (using a drained or closed pipeline).
    pub fn is_usage(&self) -> bool {
        matches!(self, PipelineError::AlreadySynced | PipelineError::Closed)
    }
}

/// One or more connections failed to release during `close()`.
///
/// Every connection was still attempted; this lists the ones that failed.
#[derive(Debug, Error)]
#[error("failed to release {} connection(s): {}", .failures.len(), summarize(.failures))]
pub struct CloseError {
    pub failures: Vec<(NodeAddr, TransportError)>,
}

fn summarize(failures: &[(NodeAddr, TransportError)]) -> String {
    failures
        .iter()
        .map(|(node, e)| format!("{node}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A configuration file could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
