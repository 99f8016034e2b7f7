//! Arena owning the storage of every cache and the tracker of every field.
use crate::cache::{CacheRef, DependencyTracker};
use crate::error::CacheError;
use crate::field::{Field, FieldId, FieldState};
use itertools::Itertools;
use log::debug;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// Handle of a cache in a [`CacheRegistry`]. Ordinals are unique within a registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheId(pub(crate) usize);

impl CacheId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Type-erased interface the registry uses to invalidate cache storage.
pub(crate) trait DependentStore: Any {
    fn len(&self) -> usize;

    /// Invalidate and remove every entry. Returns the dependencies the store was registered with.
    fn clear_all(&mut self) -> Vec<FieldId>;

    /// Invalidate and remove every entry depending on `dependency`. Returns the dependencies
    /// which no longer have any entries in the store, including `dependency` itself if it had any.
    fn clear_dependency(&mut self, dependency: FieldId) -> Vec<FieldId>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Keyed storage with a reverse index from dependencies to keys.
pub(crate) struct CacheStore<K, V> {
    entries: FxHashMap<K, CacheRef<V>>,
    /// For every dependency, the keys depending on it, each with *all* of its dependencies.
    dependents: FxHashMap<FieldId, FxHashMap<K, Rc<[FieldId]>>>,
}

impl<K, V> Default for CacheStore<K, V> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            dependents: FxHashMap::default(),
        }
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Clone + Eq + Hash,
{
    pub(crate) fn get(&self, key: &K) -> Option<&CacheRef<V>> {
        self.entries.get(key)
    }

    pub(crate) fn num_entries(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// `dependencies` must not contain duplicates.
    pub(crate) fn insert(
        &mut self,
        key: K,
        value: Rc<V>,
        dependencies: Rc<[FieldId]>,
    ) -> Result<CacheRef<V>, CacheError> {
        if self.entries.contains_key(&key) {
            return Err(CacheError::DuplicateKey);
        }
        let entry = CacheRef::new_shared(value);
        for dependency in dependencies.iter() {
            self.dependents
                .entry(*dependency)
                .or_default()
                .insert(key.clone(), Rc::clone(&dependencies));
        }
        self.entries.insert(key, entry.clone());
        Ok(entry)
    }

    pub(crate) fn num_dependencies(&self) -> usize {
        self.dependents.len()
    }

    /// Check that every entry is indexed under each of its dependencies and vice versa.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let indexed = self.dependents.iter().all(|(dependency, keys)| {
            !keys.is_empty()
                && keys
                    .iter()
                    .all(|(key, all)| self.entries.contains_key(key) && all.contains(dependency))
        });
        let complete = self.dependents.values().all(|keys| {
            keys.iter().all(|(key, all)| {
                all.iter()
                    .all(|d| self.dependents.get(d).map_or(false, |k| k.contains_key(key)))
            })
        });
        indexed && complete
    }
}

impl<K, V> DependentStore for CacheStore<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: 'static,
{
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear_all(&mut self) -> Vec<FieldId> {
        for entry in self.entries.values() {
            entry.clear();
        }
        self.entries.clear();
        self.dependents.drain().map(|(dependency, _)| dependency).collect()
    }

    fn clear_dependency(&mut self, dependency: FieldId) -> Vec<FieldId> {
        let keys = match self.dependents.remove(&dependency) {
            Some(keys) => keys,
            None => return Vec::new(),
        };

        let mut released = vec![dependency];
        for (key, all_dependencies) in keys {
            // Invalidate the entry for every holder, then forget it
            if let Some(entry) = self.entries.remove(&key) {
                entry.clear();
            }
            // Remove the key from the reverse index of every other dependency
            for other in all_dependencies.iter().filter(|&&other| other != dependency) {
                let other_keys = self.dependents.get_mut(other);
                debug_assert!(other_keys.is_some(), "Reverse index of dependency {} is missing", other);
                if let Some(other_keys) = other_keys {
                    other_keys.remove(&key);
                    if other_keys.is_empty() {
                        self.dependents.remove(other);
                        released.push(*other);
                    }
                }
            }
        }
        released
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
struct RegistryState {
    next_cache_id: usize,
    caches: BTreeMap<CacheId, Box<dyn DependentStore>>,
    trackers: FxHashMap<FieldId, DependencyTracker>,
}

impl RegistryState {
    fn unregister(&mut self, cache: CacheId, dependencies: &[FieldId]) {
        for dependency in dependencies {
            if let Some(tracker) = self.trackers.get_mut(dependency) {
                tracker.unregister(cache);
            }
        }
    }

    /// Invalidate the entries of every cache depending on `field`.
    fn invalidate_field(&mut self, field: FieldId) {
        let Self { caches, trackers, .. } = self;
        // Copy the handles, the set shrinks as the caches release the field
        let cache_ids: Vec<_> = match trackers.get(&field) {
            Some(tracker) => tracker.caches().collect(),
            None => return,
        };

        for cache_id in cache_ids {
            let store = caches.get_mut(&cache_id);
            debug_assert!(store.is_some(), "Tracker of field {} refers to a dropped cache", field);
            if let Some(store) = store {
                let released = store.clear_dependency(field);
                debug!(
                    "Invalidated cache {} with respect to field {}, {} entries remain",
                    cache_id.0,
                    field,
                    store.len()
                );
                for dependency in released {
                    if let Some(tracker) = trackers.get_mut(&dependency) {
                        tracker.unregister(cache_id);
                    }
                }
            }
            // The handle is gone even if the cache held no entries for the field
            if let Some(tracker) = trackers.get_mut(&field) {
                tracker.discard(cache_id);
            }
        }
    }
}

/// An arena owning the storage of a set of caches and the dependency trackers of every field
/// the caches depend on.
///
/// `CacheRegistry` is a cheap, shared handle: clones refer to the same arena. Caches and
/// trackers refer to each other only through [`CacheId`] and [`FieldId`] handles, so dropping
/// a cache or releasing a field never leaves dangling references behind.
#[derive(Clone, Default)]
pub struct CacheRegistry {
    state: Rc<RefCell<RegistryState>>,
    // Caches dropped while the state was borrowed
    pending_removals: Rc<RefCell<Vec<CacheId>>>,
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("CacheRegistry")
            .field("caches", &state.caches.keys().collect::<Vec<_>>())
            .field("trackers", &state.trackers.len())
            .finish()
    }
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both handles refer to the same arena.
    pub fn ptr_eq(&self, other: &CacheRegistry) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn create_store<K, V>(&self) -> CacheId
    where
        K: Clone + Eq + Hash + 'static,
        V: 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = CacheId(state.next_cache_id);
        state.next_cache_id += 1;
        state
            .caches
            .insert(id, Box::new(CacheStore::<K, V>::default()));
        id
    }

    /// Run `f` on the typed storage of a cache.
    ///
    /// # Panics
    ///
    /// Panics if the cache does not exist or has different key or value types.
    pub(crate) fn with_store<K, V, R>(&self, id: CacheId, f: impl FnOnce(&CacheStore<K, V>) -> R) -> R
    where
        K: Clone + Eq + Hash + 'static,
        V: 'static,
    {
        let state = self.state.borrow();
        let store = state
            .caches
            .get(&id)
            .expect("Internal error: Cache handles are removed from the registry only on drop");
        let store: &CacheStore<K, V> = store
            .as_any()
            .downcast_ref()
            .expect("Internal error: Downcasting can by definition not fail");
        f(store)
    }

    /// Insert an entry into the storage of a cache and register the cache with the tracker of
    /// every dependency.
    pub(crate) fn insert<K, V>(
        &self,
        id: CacheId,
        key: K,
        value: Rc<V>,
        dependencies: &[&dyn Field],
    ) -> Result<CacheRef<V>, CacheError>
    where
        K: Clone + Eq + Hash + 'static,
        V: 'static,
    {
        let snapshots: Vec<FieldState> = dependencies
            .iter()
            .map(|dependency| dependency.snapshot())
            // Replacements carry no state to compare against
            .filter(|snapshot| snapshot.state.is_some())
            .unique_by(|snapshot| snapshot.id)
            .collect();
        let dependency_ids: Rc<[FieldId]> = snapshots.iter().map(|snapshot| snapshot.id).collect();

        self.mutate(|state| -> Result<CacheRef<V>, CacheError> {
            let RegistryState { caches, trackers, .. } = state;
            let store: &mut CacheStore<K, V> = caches
                .get_mut(&id)
                .expect("Internal error: Cache handles are removed from the registry only on drop")
                .as_any_mut()
                .downcast_mut()
                .expect("Internal error: Downcasting can by definition not fail");
            let entry = store.insert(key, value, dependency_ids)?;

            for snapshot in snapshots {
                trackers
                    .entry(snapshot.id)
                    .or_insert_with(|| DependencyTracker::new(snapshot.id, snapshot))
                    .register(id);
            }
            debug!(
                "Inserted entry into cache {} ({} entries, {} dependencies)",
                id.0,
                store.len(),
                store.num_dependencies()
            );
            Ok(entry)
        })
    }

    /// Invalidate every entry of a cache and unregister it from all trackers.
    pub(crate) fn clear_cache(&self, id: CacheId) {
        self.mutate(|state| {
            let dependencies = match state.caches.get_mut(&id) {
                Some(store) => store.clear_all(),
                None => return,
            };
            state.unregister(id, &dependencies);
            debug!("Cleared cache {}", id.0);
        })
    }

    /// Invalidate the entries of a cache depending on any of the given fields.
    pub(crate) fn clear_cache_dependencies(&self, id: CacheId, fields: &[FieldId]) {
        self.mutate(|state| {
            for field in fields {
                let released = match state.caches.get_mut(&id) {
                    Some(store) => store.clear_dependency(*field),
                    None => return,
                };
                state.unregister(id, &released);
            }
        })
    }

    /// Run `f` with exclusive access to the state, then remove the caches that were dropped in
    /// the meantime.
    fn mutate<R>(&self, f: impl FnOnce(&mut RegistryState) -> R) -> R {
        let result = f(&mut self.state.borrow_mut());
        self.remove_pending_caches();
        result
    }

    fn remove_pending_caches(&self) {
        loop {
            // The queue must not stay borrowed while a removal drops further caches
            let next = self.pending_removals.borrow_mut().pop();
            match next {
                Some(id) => self.remove_cache(id),
                None => break,
            }
        }
    }

    /// Remove a cache from the arena, invalidating all of its entries.
    ///
    /// A cache dropped while the registry is borrowed, for example because it was stored in an
    /// entry of another cache that is being invalidated, is queued and removed as soon as the
    /// borrow ends.
    pub(crate) fn remove_cache(&self, id: CacheId) {
        let removed = match self.state.try_borrow_mut() {
            Ok(mut state) => state.caches.remove(&id).map(|mut store| {
                let dependencies = store.clear_all();
                state.unregister(id, &dependencies);
                store
            }),
            Err(_) => {
                debug!("Registry is borrowed, deferring removal of cache {}", id.0);
                self.pending_removals.borrow_mut().push(id);
                return;
            }
        };
        // Entries of the store may have owned further cache handles
        if removed.is_some() {
            debug!("Dropped cache {}", id.0);
            self.remove_pending_caches();
        }
    }

    /// The number of dropped caches still waiting to be removed from the arena.
    pub fn num_pending_removals(&self) -> usize {
        self.pending_removals.borrow().len()
    }

    /// Invalidate every entry, in every cache, that depends on `field`.
    ///
    /// Afterwards the tracker of the field refers to no caches.
    pub fn invalidate_field(&self, field: FieldId) {
        self.mutate(|state| state.invalidate_field(field))
    }

    /// Compare the snapshot of the tracker of `field` with `snapshot`. If they differ, every entry
    /// depending on `field` is invalidated and the tracker takes the new snapshot.
    ///
    /// Fields without a tracker, and replacements, have nothing to invalidate.
    pub fn on_possible_mutation(&self, field: FieldId, snapshot: FieldState) {
        if snapshot.state.is_none() {
            return;
        }
        self.mutate(|state| {
            let needs_update = match state.trackers.get(&field) {
                Some(tracker) => tracker.needs_update(&snapshot),
                None => return,
            };
            if needs_update {
                debug!("Field {} changed, invalidating dependent cache entries", field);
                state.invalidate_field(field);
                if let Some(tracker) = state.trackers.get_mut(&field) {
                    tracker.set_snapshot(snapshot);
                }
            }
        })
    }

    /// Fully clear every live cache in the registry.
    pub fn clear_all_caches(&self) {
        self.mutate(|state| {
            let ids: Vec<_> = state.caches.keys().copied().collect();
            for id in ids {
                let dependencies = match state.caches.get_mut(&id) {
                    Some(store) => store.clear_all(),
                    None => continue,
                };
                state.unregister(id, &dependencies);
            }
            debug!("Cleared all caches");
        })
    }

    /// Forget the tracker of a field which will no longer be used.
    ///
    /// Entries depending on the field are invalidated first.
    pub fn release_field(&self, field: FieldId) {
        self.mutate(|state| {
            state.invalidate_field(field);
            state.trackers.remove(&field);
        })
    }

    /// A copy of the tracker of a field, if the field has one.
    pub fn tracker(&self, field: FieldId) -> Option<DependencyTracker> {
        self.state.borrow().trackers.get(&field).cloned()
    }

    /// Number of live caches.
    pub fn num_caches(&self) -> usize {
        self.state.borrow().caches.len()
    }

    pub fn cache_ids(&self) -> Vec<CacheId> {
        self.state.borrow().caches.keys().copied().collect()
    }

    /// Number of entries in a cache, or `None` if the cache no longer exists.
    pub fn cache_len(&self, id: CacheId) -> Option<usize> {
        self.state.borrow().caches.get(&id).map(|store| store.len())
    }
}
