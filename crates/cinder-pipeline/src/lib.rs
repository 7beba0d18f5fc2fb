//! cinder-pipeline: multi-node command pipelining for sharded clusters.
//!
//! A [`Pipeline`] batches commands for many nodes of a sharded key-value
//! store. Each command is routed to its owning node and written at once;
//! the caller gets a [`Deferred`] back. Replies are only read when the
//! pipeline is synced, one bulk read per node, and matched to requests by
//! position.
//!
//! # quick start
//!
//! ```no_run
//! use cinder_pipeline::{commands, KeyRouter, NodeAddr, Pipeline, TcpConnector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let a: NodeAddr = "127.0.0.1:7001".parse()?;
//! let b: NodeAddr = "127.0.0.1:7002".parse()?;
//! let router = KeyRouter::new(move |key: &[u8]| {
//!     Some(if key.first() < Some(&b'n') { a } else { b })
//! });
//!
//! let mut pipeline = Pipeline::new(router, TcpConnector::default());
//! let hits = pipeline.submit(commands::incr("hits")).await?;
//! let name = pipeline.submit(commands::get("name")).await?;
//! pipeline.close().await?;
//!
//! println!("hits = {}", hits.get()?);
//! println!("name = {:?}", name.get()?);
//! # Ok(())
//! # }
//! ```

mod command;
mod config;
mod connection;
pub mod decode;
mod deferred;
mod error;
mod node;
mod pipeline;
mod registry;
mod route;
mod tcp;

#[cfg(test)]
mod testing;

pub use cinder_protocol::Frame;
pub use command::{commands, Command, CommandArgs, Decoder};
pub use config::{DrainMode, PipelineConfig};
pub use connection::{Connection, ConnectionProvider};
pub use deferred::Deferred;
pub use error::{
    CloseError, ConfigError, DecodeError, PipelineError, ReplyError, RoutingError, TransportError,
};
pub use node::NodeAddr;
pub use pipeline::{Pipeline, PipelineState, SyncReport};
pub use route::{KeyRouter, Router};
pub use tcp::{TcpConfig, TcpConnection, TcpConnector};
