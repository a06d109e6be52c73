//! Copy-on-write endpoint→executor table owned by the dispatcher.

use crate::data_plane::endpoint_executor::EndpointExecutor;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) type ExecutorMap = HashMap<String, Arc<dyn EndpointExecutor>>;

/// Readers take a snapshot without locking; writers publish a whole new map.
pub(crate) struct EndpointTable {
    executors: ArcSwap<ExecutorMap>,
}

impl EndpointTable {
    pub(crate) fn new(executors: ExecutorMap) -> Self {
        Self {
            executors: ArcSwap::from_pointee(executors),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<ExecutorMap> {
        self.executors.load_full()
    }

    pub(crate) fn get(&self, endpoint_id: &str) -> Option<Arc<dyn EndpointExecutor>> {
        self.executors.load().get(endpoint_id).cloned()
    }

    /// Publishes `next` only if the table still holds `expected`.
    /// Returns `false` when another writer got there first.
    pub(crate) fn publish(&self, expected: &Arc<ExecutorMap>, next: ExecutorMap) -> bool {
        let previous = self.executors.compare_and_swap(expected, Arc::new(next));
        Arc::ptr_eq(&previous, expected)
    }

    /// Empties the table and returns what it held.
    pub(crate) fn take(&self) -> Arc<ExecutorMap> {
        self.executors.swap(Arc::new(HashMap::new()))
    }
}
