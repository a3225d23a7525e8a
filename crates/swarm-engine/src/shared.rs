use crate::coordinator::SwarmCoordinator;
use parking_lot::RwLock;
use std::sync::Arc;

/// A cloneable, thread-safe handle to one coordinator.
///
/// Mutating calls run under the write lock, so a distribution cycle is never
/// interleaved with another mutation. Queries share the read lock.
#[derive(Debug, Clone)]
pub struct SharedCoordinator {
    inner: Arc<RwLock<SwarmCoordinator>>,
}

impl SharedCoordinator {
    pub fn new(coordinator: SwarmCoordinator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(coordinator)),
        }
    }

    /// Run a query under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&SwarmCoordinator) -> R) -> R {
        f(&*self.inner.read())
    }

    /// Run a mutation under the write lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut SwarmCoordinator) -> R) -> R {
        f(&mut *self.inner.write())
    }
}

impl From<SwarmCoordinator> for SharedCoordinator {
    fn from(coordinator: SwarmCoordinator) -> Self {
        Self::new(coordinator)
    }
}
