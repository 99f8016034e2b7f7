use crate::cache::CacheId;
use crate::field::{FieldId, FieldState};
use std::collections::BTreeSet;

/// Per-field record of the caches holding entries that depend on the field.
///
/// The tracker holds cache *handles* only. It also remembers the last observed
/// `(identity, state)` snapshot of the field, which is compared against the current snapshot
/// whenever a mutation of the field may have taken place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTracker {
    field: FieldId,
    snapshot: FieldState,
    caches: BTreeSet<CacheId>,
}

impl DependencyTracker {
    pub(crate) fn new(field: FieldId, snapshot: FieldState) -> Self {
        Self {
            field,
            snapshot,
            caches: BTreeSet::new(),
        }
    }

    pub fn field(&self) -> FieldId {
        self.field
    }

    /// The last observed snapshot.
    pub fn snapshot(&self) -> FieldState {
        self.snapshot
    }

    /// Handles of the registered caches, in ascending order.
    pub fn caches(&self) -> impl Iterator<Item = CacheId> + '_ {
        self.caches.iter().copied()
    }

    pub fn contains(&self, cache: CacheId) -> bool {
        self.caches.contains(&cache)
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Idempotent.
    pub(crate) fn register(&mut self, cache: CacheId) {
        self.caches.insert(cache);
    }

    /// Remove a cache handle. The handle must be present.
    pub(crate) fn unregister(&mut self, cache: CacheId) {
        let removed = self.caches.remove(&cache);
        debug_assert!(
            removed,
            "Cache {:?} is not registered with the tracker of field {}",
            cache, self.field
        );
    }

    /// Remove a handle which may already be gone.
    pub(crate) fn discard(&mut self, cache: CacheId) {
        self.caches.remove(&cache);
    }

    pub(crate) fn needs_update(&self, snapshot: &FieldState) -> bool {
        self.snapshot != *snapshot
    }

    pub(crate) fn set_snapshot(&mut self, snapshot: FieldState) {
        self.snapshot = snapshot;
    }
}
