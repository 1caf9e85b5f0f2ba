//! Shared client registry
//!
//! A mutex-guarded mapping from assigned identity to value, owning
//! identity assignment. The hub is its only writer; clients read through
//! it for peer lookups.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::ClientId;

/// Thread-safe id -> value collection that owns identity assignment
///
/// Identities come from a monotonically increasing counter starting at 1,
/// so they are strictly positive and never reused within a process
/// lifetime. Every operation takes the lock for a minimal critical
/// section and none of them can fail.
#[derive(Debug)]
pub struct Registry<T> {
    inner: Mutex<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    entries: HashMap<ClientId, T>,
    next_id: u64,
}

impl<T: Clone> Registry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty registry with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                next_id: 1,
            }),
        }
    }

    /// Insert a value under the next unused identity and return that identity
    pub fn add(&self, value: T) -> ClientId {
        let mut inner = self.inner.lock().unwrap();
        let id = ClientId(inner.next_id);
        inner.next_id += 1;
        inner.entries.insert(id, value);
        id
    }

    /// Remove the entry for `id`; a no-op if it is absent
    pub fn remove(&self, id: ClientId) {
        self.inner.lock().unwrap().entries.remove(&id);
    }

    /// Look up the value registered under `id`
    pub fn get(&self, id: ClientId) -> Option<T> {
        self.inner.lock().unwrap().entries.get(&id).cloned()
    }

    /// Visit every entry of a point-in-time snapshot
    ///
    /// The snapshot is copied under the lock and the visitor runs after
    /// the lock is released, so visitors may call back into the registry
    /// (including removing entries) without deadlocking. Iteration order
    /// is unspecified.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(ClientId, &T),
    {
        let snapshot: Vec<(ClientId, T)> = {
            let inner = self.inner.lock().unwrap();
            inner
                .entries
                .iter()
                .map(|(id, value)| (*id, value.clone()))
                .collect()
        };

        for (id, value) in &snapshot {
            visitor(*id, value);
        }
    }

    /// Current entry count (observational; not synchronized with snapshots)
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Whether the registry currently has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
