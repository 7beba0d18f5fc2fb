//! In-memory cluster for unit tests.
//!
//! Each fake node executes a handful of key commands against its own map
//! at write time and queues the reply, so replies come back in request
//! order exactly like a real pipelined connection. Nodes can be told to
//! misbehave through [`NodeBehavior`], and everything a connection does is
//! recorded in a [`NodeLog`].

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use cinder_protocol::Frame;

use crate::command::CommandArgs;
use crate::connection::{Connection, ConnectionProvider};
use crate::error::TransportError;
use crate::node::NodeAddr;

#[derive(Debug, Clone, Default)]
pub(crate) struct NodeBehavior {
    pub unreachable: bool,
    pub fail_write: bool,
    pub fail_read: bool,
    /// `read_many` never completes.
    pub stall_read: bool,
    /// `read_many` returns one reply fewer than asked for.
    pub short_read: bool,
    pub fail_release: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NodeLog {
    pub acquisitions: usize,
    /// Requests in the order they were written, space-joined.
    pub writes: Vec<String>,
    /// The `n` of every `read_many` call.
    pub read_calls: Vec<usize>,
    pub released: bool,
}

#[derive(Default)]
struct NodeState {
    store: HashMap<Bytes, Bytes>,
    behavior: NodeBehavior,
    log: NodeLog,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<NodeAddr, NodeState>,
    /// Node of every `read_many` call, across the whole cluster.
    read_order: Vec<NodeAddr>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeCluster {
    inner: Arc<Mutex<Inner>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behavior(&self, node: NodeAddr, behavior: NodeBehavior) {
        self.with_node(node, |state| state.behavior = behavior);
    }

    pub fn seed(&self, node: NodeAddr, key: &str, value: &str) {
        self.with_node(node, |state| {
            state
                .store
                .insert(Bytes::copy_from_slice(key.as_bytes()), Bytes::copy_from_slice(value.as_bytes()));
        });
    }

    pub fn log(&self, node: NodeAddr) -> NodeLog {
        self.with_node(node, |state| state.log.clone())
    }

    pub fn read_order(&self) -> Vec<NodeAddr> {
        self.inner.lock().unwrap().read_order.clone()
    }

    /// Opens a connection without going through `acquire`.
    pub fn connect(&self, node: NodeAddr) -> FakeConnection {
        FakeConnection {
            node,
            cluster: self.clone(),
            outbox: VecDeque::new(),
        }
    }

    fn with_node<R>(&self, node: NodeAddr, f: impl FnOnce(&mut NodeState) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(inner.nodes.entry(node).or_default())
    }
}

impl ConnectionProvider for FakeCluster {
    type Conn = FakeConnection;

    async fn acquire(&self, node: NodeAddr) -> Result<FakeConnection, TransportError> {
        let unreachable = self.with_node(node, |state| {
            state.log.acquisitions += 1;
            state.behavior.unreachable
        });
        if unreachable {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused").into());
        }
        Ok(self.connect(node))
    }
}

pub(crate) struct FakeConnection {
    node: NodeAddr,
    cluster: FakeCluster,
    outbox: VecDeque<Frame>,
}

enum ReadPlan {
    Stall,
    Fail,
    Serve(usize),
}

impl Connection for FakeConnection {
    async fn write(&mut self, args: &CommandArgs) -> Result<(), TransportError> {
        let reply = self.cluster.with_node(self.node, |state| {
            if state.behavior.fail_write {
                return None;
            }
            state.log.writes.push(render(args));
            Some(execute(&mut state.store, args))
        });
        match reply {
            Some(frame) => {
                self.outbox.push_back(frame);
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe").into()),
        }
    }

    async fn read_many(&mut self, n: usize) -> Result<Vec<Frame>, TransportError> {
        let plan = {
            let mut inner = self.cluster.inner.lock().unwrap();
            inner.read_order.push(self.node);
            let state = inner.nodes.entry(self.node).or_default();
            state.log.read_calls.push(n);
            if state.behavior.stall_read {
                ReadPlan::Stall
            } else if state.behavior.fail_read {
                ReadPlan::Fail
            } else if state.behavior.short_read {
                ReadPlan::Serve(n.saturating_sub(1))
            } else {
                ReadPlan::Serve(n)
            }
        };

        match plan {
            ReadPlan::Stall => std::future::pending().await,
            ReadPlan::Fail => Err(TransportError::Disconnected),
            ReadPlan::Serve(count) => {
                let count = count.min(self.outbox.len());
                Ok(self.outbox.drain(..count).collect())
            }
        }
    }

    async fn release(self) -> Result<(), TransportError> {
        let fail = self.cluster.with_node(self.node, |state| {
            state.log.released = true;
            state.behavior.fail_release
        });
        if fail {
            return Err(io::Error::other("release failed").into());
        }
        Ok(())
    }
}

fn render(args: &CommandArgs) -> String {
    args.as_slice()
        .iter()
        .map(|a| String::from_utf8_lossy(a).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Executes the handful of commands the fake nodes understand.
fn execute(store: &mut HashMap<Bytes, Bytes>, args: &CommandArgs) -> Frame {
    let argv = args.as_slice();
    let name = String::from_utf8_lossy(&argv[0]).to_ascii_uppercase();
    match (name.as_str(), argv.len()) {
        ("GET", 2) => match store.get(&argv[1]) {
            Some(v) => Frame::Bulk(v.clone()),
            None => Frame::Null,
        },
        ("SET", 3) => {
            store.insert(argv[1].clone(), argv[2].clone());
            Frame::Simple("OK".into())
        }
        ("INCR", 2) => {
            let current = match store.get(&argv[1]) {
                Some(v) => match std::str::from_utf8(v).ok().and_then(|s| s.parse::<i64>().ok()) {
                    Some(n) => n,
                    None => return Frame::Error("ERR value is not an integer or out of range".into()),
                },
                None => 0,
            };
            let next = current + 1;
            store.insert(argv[1].clone(), Bytes::from(next.to_string()));
            Frame::Integer(next)
        }
        ("DEL", n) if n > 1 => {
            let removed = argv[1..].iter().filter(|k| store.remove(*k).is_some()).count();
            Frame::Integer(removed as i64)
        }
        ("EXISTS", 2) => Frame::Integer(store.contains_key(&argv[1]) as i64),
        ("MGET", n) if n > 1 => Frame::Array(
            argv[1..]
                .iter()
                .map(|k| store.get(k).map_or(Frame::Null, |v| Frame::Bulk(v.clone())))
                .collect(),
        ),
        _ => Frame::Error(format!("ERR unknown command '{name}'")),
    }
}
