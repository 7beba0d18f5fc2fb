//! Command routing.
//!
//! The pipeline does not know how keys map to shards. It asks a [`Router`]
//! for the owning node of each command and trusts the answer. Any closure
//! over [`CommandArgs`] is a router; [`KeyRouter`] builds one from a
//! per-key lookup and enforces that multi-key commands stay on one node.

use crate::command::CommandArgs;
use crate::error::RoutingError;
use crate::node::NodeAddr;

/// Maps a command to the node that must execute it.
///
/// Routing must be deterministic and free of side effects: the same
/// arguments always route to the same node within one pipeline.
pub trait Router {
    fn route(&self, args: &CommandArgs) -> Result<NodeAddr, RoutingError>;
}

impl<F> Router for F
where
    F: Fn(&CommandArgs) -> Result<NodeAddr, RoutingError>,
{
    fn route(&self, args: &CommandArgs) -> Result<NodeAddr, RoutingError> {
        self(args)
    }
}

/// Routes by looking up every key and requiring a single owner.
#[derive(Debug, Clone)]
pub struct KeyRouter<F> {
    lookup: F,
}

impl<F> KeyRouter<F>
where
    F: Fn(&[u8]) -> Option<NodeAddr>,
{
    /// `lookup` returns the owner of a key, or `None` if no node owns it.
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

impl<F> Router for KeyRouter<F>
where
    F: Fn(&[u8]) -> Option<NodeAddr>,
{
    fn route(&self, args: &CommandArgs) -> Result<NodeAddr, RoutingError> {
        let mut owner: Option<NodeAddr> = None;
        for key in args.keys() {
            let node = (self.lookup)(&key[..]).ok_or_else(|| {
                RoutingError::Unroutable(String::from_utf8_lossy(key).into_owned())
            })?;
            match owner {
                None => owner = Some(node),
                Some(first) if first != node => {
                    return Err(RoutingError::CrossNode {
                        first,
                        second: node,
                    });
                }
                Some(_) => {}
            }
        }
        owner.ok_or(RoutingError::NoKeys)
    }
}
