//! Keyed caches with dependency tracking.
//!
//! A [`Cache`] maps keys to values, where every value is declared to depend on a set of
//! [fields](crate::field::Field). The storage of every cache lives in a [`CacheRegistry`],
//! together with one [`DependencyTracker`] per field. When a field is reported as (possibly)
//! mutated, every entry depending on the field is invalidated in every cache of the registry.
//!
//! Values are handed out as [`CacheRef`]s. Invalidating an entry empties the shared slot, so
//! every holder of the reference observes the invalidation without polling the cache.
mod assembly;
mod linear_solver;
mod registry;
mod tracker;

pub use assembly::*;
pub use linear_solver::*;
pub use registry::{CacheId, CacheRegistry};
pub use tracker::*;

use crate::error::CacheError;
use crate::field::{Field, FieldId};
use crate::form::{form_dependencies, Form};
use log::trace;
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::rc::Rc;

/// A shared reference to a cached value, or to nothing once the entry has been invalidated.
pub struct CacheRef<V> {
    slot: Rc<RefCell<Option<Rc<V>>>>,
}

impl<V> Clone for CacheRef<V> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for CacheRef<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheRef").field(&self.slot.borrow()).finish()
    }
}

impl<V> CacheRef<V> {
    pub fn new(value: V) -> Self {
        Self::new_shared(Rc::new(value))
    }

    pub fn new_shared(value: Rc<V>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Some(value))),
        }
    }

    /// The value, or `None` if the entry has been invalidated.
    pub fn get(&self) -> Option<Rc<V>> {
        self.slot.borrow().clone()
    }

    pub fn is_cleared(&self) -> bool {
        self.slot.borrow().is_none()
    }

    /// Whether both references observe the same slot.
    pub fn ptr_eq(&self, other: &CacheRef<V>) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }

    /// Empty the slot for every holder. Idempotent.
    pub(crate) fn clear(&self) {
        // Release the borrow before the value is dropped
        let value = self.slot.borrow_mut().take();
        drop(value);
    }
}

/// A typed handle to a cache stored in a [`CacheRegistry`].
///
/// Dropping the handle invalidates every entry of the cache and removes the cache from the
/// registry and from every dependency tracker.
pub struct Cache<K, V> {
    id: CacheId,
    registry: CacheRegistry,
    marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("id", &self.id).finish()
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: 'static,
{
    /// Create a new, empty cache in the given registry.
    pub fn new(registry: &CacheRegistry) -> Self {
        Self {
            id: registry.create_store::<K, V>(),
            registry: registry.clone(),
            marker: PhantomData,
        }
    }

    pub fn id(&self) -> CacheId {
        self.id
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.registry
            .with_store(self.id, |store: &registry::CacheStore<K, V>| store.num_entries())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.registry
            .with_store(self.id, |store: &registry::CacheStore<K, V>| store.contains_key(key))
    }

    /// Insert a value which depends on the given fields.
    ///
    /// Fields appearing several times are registered once. Returns
    /// [`CacheError::DuplicateKey`] if the key is already present; entries are never
    /// overwritten.
    pub fn insert(&self, key: K, value: V, dependencies: &[&dyn Field]) -> Result<CacheRef<V>, CacheError> {
        self.insert_shared(key, Rc::new(value), dependencies)
    }

    pub fn insert_shared(
        &self,
        key: K,
        value: Rc<V>,
        dependencies: &[&dyn Field],
    ) -> Result<CacheRef<V>, CacheError> {
        self.registry.insert(self.id, key, value, dependencies)
    }

    /// Look up an entry. Has no side effects.
    pub fn get(&self, key: &K) -> Option<CacheRef<V>> {
        let entry = self
            .registry
            .with_store(self.id, |store: &registry::CacheStore<K, V>| store.get(key).cloned());
        if entry.is_some() {
            trace!("Cache {} hit", self.id.index());
        }
        entry
    }

    /// Look up an entry whose value has not been invalidated.
    pub fn get_value(&self, key: &K) -> Option<(CacheRef<V>, Rc<V>)> {
        let entry = self.get(key)?;
        let value = entry.get()?;
        Some((entry, value))
    }

    /// Insert a value which depends on every field `form` depends on.
    pub(crate) fn insert_for_form(&self, key: K, form: &Form, value: V) -> Result<(CacheRef<V>, Rc<V>), CacheError> {
        let dependencies = form_dependencies(form);
        let dependencies: Vec<&dyn Field> = dependencies
            .iter()
            .map(|function| function as &dyn Field)
            .collect();
        let value = Rc::new(value);
        let entry = self.insert_shared(key, Rc::clone(&value), &dependencies)?;
        Ok((entry, value))
    }

    /// Invalidate and remove every entry.
    pub fn clear(&self) {
        self.registry.clear_cache(self.id);
    }

    /// Invalidate and remove every entry depending on any of the given fields.
    pub fn clear_dependencies(&self, fields: &[FieldId]) {
        self.registry.clear_cache_dependencies(self.id, fields);
    }
}

impl<K, V> Drop for Cache<K, V> {
    fn drop(&mut self) {
        self.registry.remove_cache(self.id);
    }
}

/// Invalidate every entry depending on any of the given fields, or every entry of every cache in
/// the registry if `fields` is empty.
pub fn clear_caches(registry: &CacheRegistry, fields: &[&dyn Field]) {
    if fields.is_empty() {
        registry.clear_all_caches();
    } else {
        for field in fields {
            registry.invalidate_field(field.id());
        }
    }
}

/// Report that the fields `eq_dependencies` may have changed.
///
/// The tracker of each field is compared against the current snapshot of the field, or, if
/// `dependencies` is given, against the snapshot of the corresponding entry of `dependencies`.
/// Entries depending on fields whose snapshot changed are invalidated.
pub fn update_caches(
    registry: &CacheRegistry,
    eq_dependencies: &[&dyn Field],
    dependencies: Option<&[&dyn Field]>,
) -> Result<(), CacheError> {
    match dependencies {
        None => {
            for field in eq_dependencies {
                registry.on_possible_mutation(field.id(), field.snapshot());
            }
        }
        Some(dependencies) => {
            if dependencies.len() != eq_dependencies.len() {
                return Err(CacheError::invalid_argument(format!(
                    "expected {} dependencies, got {}",
                    eq_dependencies.len(),
                    dependencies.len()
                )));
            }
            for (eq_dependency, dependency) in eq_dependencies.iter().zip(dependencies) {
                registry.on_possible_mutation(eq_dependency.id(), dependency.snapshot());
            }
        }
    }
    Ok(())
}
