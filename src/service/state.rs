//! Service state management.

use std::sync::Arc;

use crate::engine::TreeEngine;
use crate::store::TreeStore;

/// Shared state for the REST service: the engine and, through it, the store.
pub struct ServiceState<S: TreeStore> {
    /// The tree engine the handlers operate through.
    pub engine: Arc<TreeEngine<S>>,
}

impl<S: TreeStore> ServiceState<S> {
    /// Wrap an engine.
    pub fn new(engine: Arc<TreeEngine<S>>) -> Self {
        Self { engine }
    }
}

impl<S: TreeStore> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}
