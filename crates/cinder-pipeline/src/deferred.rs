//! Write-once reply placeholders.
//!
//! [`Deferred<T>`] is what `submit` hands back. The pipeline keeps the
//! matching [`Resolver<T>`] in the node's queue and fills it in while
//! draining. The cell moves from empty to resolved exactly once and is
//! never written again.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::ReplyError;

/// The eventual result of one pipelined command.
///
/// Cloning shares the same underlying cell.
pub struct Deferred<T> {
    cell: Arc<OnceLock<Result<T, ReplyError>>>,
}

/// Write half of a [`Deferred`], held by the pipeline.
pub(crate) struct Resolver<T> {
    cell: Arc<OnceLock<Result<T, ReplyError>>>,
}

/// Creates an empty deferred result and the resolver that fills it.
pub(crate) fn pair<T>() -> (Deferred<T>, Resolver<T>) {
    let cell = Arc::new(OnceLock::new());
    (
        Deferred {
            cell: Arc::clone(&cell),
        },
        Resolver { cell },
    )
}

impl<T> Resolver<T> {
    /// Stores the outcome.
    ///
    /// # Panics
    ///
    /// Panics if the cell was already resolved. Each command gets exactly
    /// one resolver, so this indicates a bookkeeping bug in the drain loop.
    pub(crate) fn resolve(self, outcome: Result<T, ReplyError>) {
        if self.cell.set(outcome).is_err() {
            panic!("deferred result resolved twice");
        }
    }
}

impl<T> Deferred<T> {
    /// Returns the decoded value, or why there is none.
    ///
    /// Before the pipeline has been synced this returns
    /// [`ReplyError::NotReady`].
    pub fn get(&self) -> Result<&T, ReplyError> {
        match self.cell.get() {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(e.clone()),
            None => Err(ReplyError::NotReady),
        }
    }

    /// Returns true once the result is resolved, successfully or not.
    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns true if the result resolved to an error.
    pub fn is_failed(&self) -> bool {
        matches!(self.cell.get(), Some(Err(_)))
    }

    /// Takes the result out, cloning it if other handles still share it.
    pub fn into_result(self) -> Result<T, ReplyError>
    where
        T: Clone,
    {
        match Arc::try_unwrap(self.cell) {
            Ok(cell) => cell.into_inner().unwrap_or(Err(ReplyError::NotReady)),
            Err(shared) => shared.get().cloned().unwrap_or(Err(ReplyError::NotReady)),
        }
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(Ok(v)) => f.debug_tuple("Deferred::Resolved").field(v).finish(),
            Some(Err(e)) => f.debug_tuple("Deferred::Failed").field(e).finish(),
            None => f.write_str("Deferred::Pending"),
        }
    }
}
