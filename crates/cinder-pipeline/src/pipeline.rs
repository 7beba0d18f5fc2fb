//! The pipeline session.
//!
//! A [`Pipeline`] accepts commands for any node of a sharded store, writes
//! each one to its owner straight away, and hands back a [`Deferred`]. No
//! reply is read until [`sync`](Pipeline::sync), which walks the nodes in
//! the order they were first addressed and resolves every node's queue
//! front to back. [`close`](Pipeline::close) syncs and then releases every
//! connection.
//!
//! # Failure isolation
//!
//! A node whose connection breaks fails only its own queued replies; the
//! other nodes are still drained. A reply the decoder rejects, or an error
//! reply from the node, fails only that one command.
//!
//! # State machine
//!
//! ```text
//!   Open ──sync()──▶ Synced
//!     │                │
//!     └──close()──┬────┘
//!                 ▼
//!               Closed
//! ```
//!
//! Submitting after `Synced` or `Closed` is rejected; a pipeline is
//! single-use.

use std::fmt;

use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::config::{DrainMode, PipelineConfig};
use crate::connection::ConnectionProvider;
use crate::deferred::{self, Deferred};
use crate::error::{CloseError, PipelineError};
use crate::node::NodeAddr;
use crate::registry::{NodeDrain, NodeRegistry, PendingReply};
use crate::route::Router;

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Accepting commands.
    Open,
    /// Drained; every submitted command is resolved.
    Synced,
    /// Drained and connections released.
    Closed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Open => write!(f, "open"),
            PipelineState::Synced => write!(f, "synced"),
            PipelineState::Closed => write!(f, "closed"),
        }
    }
}

/// Summary of one drain.
///
/// A `sync()` that had nothing to do (already synced or closed) returns
/// the default, all-zero report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Nodes that had replies owed and were read (or failed).
    pub nodes_drained: usize,
    /// Replies read off the wire and handed to decoders.
    pub replies_read: usize,
    /// Nodes whose queued replies all failed, in drain order.
    pub failed_nodes: Vec<NodeAddr>,
}

impl SyncReport {
    /// True if no node failed.
    pub fn is_clean(&self) -> bool {
        self.failed_nodes.is_empty()
    }

    fn record(&mut self, outcome: NodeDrain) {
        match outcome {
            NodeDrain::Idle => {}
            NodeDrain::Complete { replies } => {
                self.nodes_drained += 1;
                self.replies_read += replies;
            }
            NodeDrain::Failed { node, error } => {
                warn!(%node, %error, "node drain failed");
                self.nodes_drained += 1;
                self.failed_nodes.push(node);
            }
        }
    }
}

/// A single-use batch of pipelined commands across many nodes.
///
/// `R` decides which node owns a command; `P` supplies a connection the
/// first time a node is addressed. Connections stay owned by the pipeline
/// until [`close`](Self::close).
pub struct Pipeline<R, P: ConnectionProvider> {
    router: R,
    provider: P,
    config: PipelineConfig,
    registry: NodeRegistry<P::Conn>,
    state: PipelineState,
}

impl<R, P> Pipeline<R, P>
where
    R: Router,
    P: ConnectionProvider,
{
    /// Creates a pipeline with the default config.
    pub fn new(router: R, provider: P) -> Self {
        Self::with_config(router, provider, PipelineConfig::default())
    }

    pub fn with_config(router: R, provider: P, config: PipelineConfig) -> Self {
        Self {
            router,
            provider,
            registry: NodeRegistry::new(config.initial_queue_capacity),
            config,
            state: PipelineState::Open,
        }
    }

    /// Routes `command`, writes it to its node, and returns a handle to its
    /// eventual result.
    ///
    /// Never reads from the connection. The first command for a node
    /// acquires that node's connection.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadySynced`] / [`PipelineError::Closed`] if the
    ///   pipeline is no longer open.
    /// - [`PipelineError::Routing`] if the command has no single owner.
    /// - [`PipelineError::Acquire`] if the owner cannot be reached.
    ///
    /// None of these leave anything queued. A failed write is not an error
    /// here: the node is marked broken and the command fails at drain.
    pub async fn submit<T>(&mut self, command: Command<T>) -> Result<Deferred<T>, PipelineError>
    where
        T: Send + Sync + 'static,
    {
        match self.state {
            PipelineState::Open => {}
            PipelineState::Synced => return Err(PipelineError::AlreadySynced),
            PipelineState::Closed => return Err(PipelineError::Closed),
        }

        let node = self.router.route(command.args())?;
        let pos = match self.registry.position(&node) {
            Some(pos) => pos,
            None => {
                let conn = self
                    .provider
                    .acquire(node)
                    .await
                    .map_err(|source| PipelineError::Acquire { node, source })?;
                debug!(%node, "node added to pipeline");
                self.registry.insert(node, conn)
            }
        };

        let (args, decoder) = command.into_parts();
        trace!(%node, ?args, "pipelined");
        let (deferred, resolver) = deferred::pair();
        self.registry
            .entry_mut(pos)
            .send(&args, PendingReply::new(decoder, resolver))
            .await;
        Ok(deferred)
    }

    /// Reads every outstanding reply and resolves all deferred results.
    ///
    /// Only the first call does any I/O; later calls return an empty
    /// report. Failures are recorded in the affected deferred results and
    /// listed in the report, never returned.
    pub async fn sync(&mut self) -> SyncReport {
        if self.state != PipelineState::Open {
            return SyncReport::default();
        }

        let read_timeout = self.config.read_timeout;
        let mut report = SyncReport::default();
        match self.config.drain_mode {
            DrainMode::Sequential => {
                for entry in self.registry.iter_mut() {
                    report.record(entry.drain(read_timeout).await);
                }
            }
            DrainMode::Concurrent => {
                let drains = self
                    .registry
                    .iter_mut()
                    .map(|entry| entry.drain(read_timeout));
                for outcome in futures::future::join_all(drains).await {
                    report.record(outcome);
                }
            }
        }

        self.state = PipelineState::Synced;
        debug!(
            nodes = report.nodes_drained,
            replies = report.replies_read,
            failed = report.failed_nodes.len(),
            "pipeline synced"
        );
        report
    }

    /// Syncs, then releases every node connection.
    ///
    /// Every connection is released even if draining it failed. Release
    /// failures are collected and returned together once all connections
    /// have been attempted. Calling `close` again is a no-op.
    pub async fn close(&mut self) -> Result<(), CloseError> {
        if self.state == PipelineState::Closed {
            return Ok(());
        }

        self.sync().await;
        self.state = PipelineState::Closed;

        let mut failures = Vec::new();
        for entry in self.registry.take_all() {
            let node = entry.node();
            if let Err(e) = entry.release().await {
                warn!(%node, error = %e, "failed to release connection");
                failures.push((node, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CloseError { failures })
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Replies written but not yet read.
    pub fn pending(&self) -> usize {
        self.registry.pending()
    }

    /// Number of nodes this pipeline holds connections to.
    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    /// Nodes in the order they were first addressed (the drain order).
    pub fn nodes(&self) -> Vec<NodeAddr> {
        self.registry.iter().map(|entry| entry.node()).collect()
    }

    /// Nodes whose connection failed and can no longer be read.
    pub fn broken_nodes(&self) -> Vec<NodeAddr> {
        self.registry
            .iter()
            .filter(|entry| entry.is_broken())
            .map(|entry| entry.node())
            .collect()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl<R, P: ConnectionProvider> Drop for Pipeline<R, P> {
    fn drop(&mut self) {
        if self.state != PipelineState::Closed && !self.registry.is_empty() {
            warn!(
                nodes = self.registry.len(),
                unread = self.registry.pending(),
                "pipeline dropped without close; connections dropped undrained"
            );
        }
    }
}

impl<R, P: ConnectionProvider> fmt::Debug for Pipeline<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("nodes", &self.registry.len())
            .field("pending", &self.registry.pending())
            .finish_non_exhaustive()
    }
}
