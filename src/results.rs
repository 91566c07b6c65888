use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::types::Endpoint;

/// Deduplicated, insertion-ordered set of discovered endpoints.
///
/// Any worker may insert; removal happens only through the coordinator once
/// the collaborator has acted on an endpoint.
#[derive(Debug, Default)]
pub struct ResultSet {
    inner: Mutex<IndexSet<Endpoint>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the endpoint was not already present.
    pub fn insert(&self, endpoint: Endpoint) -> bool {
        self.inner.lock().insert(endpoint)
    }

    /// Remove an endpoint, keeping the relative order of the rest.
    pub fn remove(&self, endpoint: &Endpoint) -> bool {
        self.inner.lock().shift_remove(endpoint)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Current contents in insertion order.
    pub fn snapshot(&self) -> Vec<Endpoint> {
        self.inner.lock().iter().copied().collect()
    }
}
