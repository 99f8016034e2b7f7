use fenris_adjoint::cache::{clear_caches, update_caches, Cache, CacheRef, CacheRegistry};
use fenris_adjoint::error::CacheError;
use fenris_adjoint::field::{Field, FieldFlags, Function};
use fenris_adjoint::space::FunctionSpace;
use std::rc::Rc;

fn field(name: &str) -> Function {
    Function::with_flags(&FunctionSpace::real(), name, FieldFlags::default().with_cache(true))
}

#[test]
fn cache_ref_clones_observe_the_same_slot() {
    let entry = CacheRef::new(5);
    let clone = entry.clone();
    assert!(entry.ptr_eq(&clone));
    assert_eq!(clone.get().as_deref(), Some(&5));
    assert!(!clone.is_cleared());
    assert!(!entry.ptr_eq(&CacheRef::new(5)));
}

#[test]
fn insert_then_get() {
    let registry = CacheRegistry::new();
    let cache = Cache::<&str, i32>::new(&registry);
    let x = field("x");
    assert!(cache.is_empty());

    let entry = cache.insert("k1", 10, &[&x]).unwrap();
    assert_eq!(entry.get().as_deref(), Some(&10));
    assert_eq!(cache.len(), 1);
    assert!(cache.contains_key(&"k1"));
    assert!(cache.get(&"k1").unwrap().ptr_eq(&entry));
    assert!(cache.get(&"k2").is_none());

    let tracker = registry.tracker(x.id()).unwrap();
    assert!(tracker.contains(cache.id()));
    assert_eq!(tracker.snapshot(), x.snapshot());
}

#[test]
fn duplicate_insert_is_rejected_and_keeps_the_original() {
    let registry = CacheRegistry::new();
    let cache = Cache::<&str, i32>::new(&registry);
    let x = field("x");
    let entry = cache.insert("k", 1, &[&x]).unwrap();

    let result = cache.insert("k", 2, &[&x]);
    assert!(matches!(result, Err(CacheError::DuplicateKey)));
    assert_eq!(entry.get().as_deref(), Some(&1));
    assert_eq!(cache.get(&"k").unwrap().get().as_deref(), Some(&1));
    assert_eq!(cache.len(), 1);
}

#[test]
fn insert_without_dependencies_survives_field_invalidation() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, f64>::new(&registry);
    let x = field("x");
    let entry = cache.insert(0, 1.0, &[]).unwrap();
    registry.invalidate_field(x.id());
    assert!(!entry.is_cleared());
    assert!(registry.tracker(x.id()).is_none());
}

#[test]
fn mutation_scenario_invalidates_the_entry() {
    let registry = CacheRegistry::new();
    let cache = Cache::<&str, i32>::new(&registry);
    let x = field("x");

    let entry = cache.insert("k1", 10, &[&x]).unwrap();
    assert_eq!(cache.get(&"k1").and_then(|e| e.get()).as_deref(), Some(&10));

    x.update_state();
    registry.on_possible_mutation(x.id(), x.snapshot());
    assert!(cache.get(&"k1").is_none());
    assert!(entry.is_cleared());
    assert_eq!(cache.len(), 0);
    assert_eq!(registry.tracker(x.id()).unwrap().snapshot(), x.snapshot());
}

#[test]
fn invalidating_one_of_two_dependencies_releases_the_other() {
    let registry = CacheRegistry::new();
    let cache = Cache::<&str, i32>::new(&registry);
    let (x, y) = (field("x"), field("y"));

    let entry = cache.insert("k2", 2, &[&x, &y]).unwrap();
    assert!(registry.tracker(y.id()).unwrap().contains(cache.id()));

    registry.invalidate_field(x.id());
    assert!(entry.is_cleared());
    assert!(!cache.contains_key(&"k2"));
    assert!(!registry.tracker(y.id()).unwrap().contains(cache.id()));
    assert!(registry.tracker(x.id()).unwrap().is_empty());
}

#[test]
fn invalidation_is_idempotent() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, u32>::new(&registry);
    let (x, y) = (field("x"), field("y"));
    cache.insert(0, 0, &[&x]).unwrap();
    let survivor = cache.insert(1, 1, &[&y]).unwrap();

    registry.invalidate_field(x.id());
    let len = cache.len();
    let tracker = registry.tracker(y.id());
    registry.invalidate_field(x.id());
    assert_eq!(cache.len(), len);
    assert_eq!(registry.tracker(y.id()), tracker);
    assert!(!survivor.is_cleared());
}

#[test]
fn dependency_isolation() {
    let registry = CacheRegistry::new();
    let cache = Cache::<&str, i32>::new(&registry);
    let (a, b) = (field("a"), field("b"));
    let k1 = cache.insert("k1", 1, &[&a]).unwrap();
    let k2 = cache.insert("k2", 2, &[&b]).unwrap();

    registry.invalidate_field(a.id());
    assert!(k1.is_cleared());
    assert_eq!(k2.get().as_deref(), Some(&2));
    assert_eq!(cache.get(&"k2").and_then(|e| e.get()).as_deref(), Some(&2));
}

#[test]
fn partial_dependency_survival() {
    let registry = CacheRegistry::new();
    let cache = Cache::<&str, i32>::new(&registry);
    let (a, b, c) = (field("a"), field("b"), field("c"));
    let k1 = cache.insert("k1", 1, &[&a, &b]).unwrap();
    let k2 = cache.insert("k2", 2, &[&b, &c]).unwrap();

    registry.invalidate_field(a.id());
    assert!(k1.is_cleared());
    assert!(!k2.is_cleared());
    // b still has k2, so the cache stays registered with it
    assert!(registry.tracker(b.id()).unwrap().contains(cache.id()));
    assert!(registry.tracker(c.id()).unwrap().contains(cache.id()));
    assert!(!registry.tracker(a.id()).unwrap().contains(cache.id()));
}

#[test]
fn duplicate_dependencies_are_registered_once() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, u32>::new(&registry);
    let x = field("x");
    let alias = x.clone();
    let entry = cache.insert(0, 0, &[&x, &alias, &x.replacement()]).unwrap();
    assert_eq!(registry.tracker(x.id()).unwrap().len(), 1);

    registry.invalidate_field(x.id());
    assert!(entry.is_cleared());
    assert!(registry.tracker(x.id()).unwrap().is_empty());
}

#[test]
fn snapshot_gating() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, u32>::new(&registry);
    let x = field("x");
    let entry = cache.insert(0, 0, &[&x]).unwrap();

    // Unchanged state: nothing happens
    update_caches(&registry, &[&x], None).unwrap();
    registry.on_possible_mutation(x.id(), x.snapshot());
    assert!(!entry.is_cleared());

    x.set_values(nalgebra::DVector::from_element(1, 3.0));
    update_caches(&registry, &[&x], None).unwrap();
    assert!(entry.is_cleared());
}

#[test]
fn update_caches_compares_against_given_dependencies() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, u32>::new(&registry);
    let (x, y) = (field("x"), field("y"));
    let entry = cache.insert(0, 0, &[&x]).unwrap();

    // The snapshot of y differs from the one recorded for x
    let dependencies: [&dyn Field; 1] = [&y];
    update_caches(&registry, &[&x], Some(&dependencies[..])).unwrap();
    assert!(entry.is_cleared());
    assert_eq!(registry.tracker(x.id()).unwrap().snapshot(), y.snapshot());
}

#[test]
fn update_caches_rejects_mismatched_lengths() {
    let registry = CacheRegistry::new();
    let (x, y) = (field("x"), field("y"));
    let dependencies: [&dyn Field; 1] = [&x];
    let result = update_caches(&registry, &[&x, &y], Some(&dependencies[..]));
    assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
}

#[test]
fn clear_caches_with_fields_clears_only_dependents() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, u32>::new(&registry);
    let other = Cache::<u32, u32>::new(&registry);
    let (x, y) = (field("x"), field("y"));
    let a = cache.insert(0, 0, &[&x]).unwrap();
    let b = other.insert(0, 0, &[&x]).unwrap();
    let c = other.insert(1, 1, &[&y]).unwrap();

    clear_caches(&registry, &[&x]);
    assert!(a.is_cleared() && b.is_cleared());
    assert!(!c.is_cleared());

    clear_caches(&registry, &[]);
    assert!(c.is_cleared());
    assert!(cache.is_empty() && other.is_empty());
    assert!(registry.tracker(y.id()).unwrap().is_empty());
}

#[test]
fn clear_dependencies_handles_keys_with_several_named_dependencies() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, u32>::new(&registry);
    let (x, y, z) = (field("x"), field("y"), field("z"));
    let a = cache.insert(0, 0, &[&x, &y]).unwrap();
    let b = cache.insert(1, 1, &[&y, &z]).unwrap();
    let c = cache.insert(2, 2, &[&z]).unwrap();

    cache.clear_dependencies(&[x.id(), y.id()]);
    assert!(a.is_cleared() && b.is_cleared());
    assert!(!c.is_cleared());
    assert_eq!(cache.len(), 1);
    assert!(!registry.tracker(x.id()).unwrap().contains(cache.id()));
    assert!(!registry.tracker(y.id()).unwrap().contains(cache.id()));
    assert!(registry.tracker(z.id()).unwrap().contains(cache.id()));
}

#[test]
fn clear_invalidates_every_entry() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, String>::new(&registry);
    let x = field("x");
    let a = cache.insert(0, "a".to_string(), &[&x]).unwrap();
    let b = cache.insert(1, "b".to_string(), &[]).unwrap();

    cache.clear();
    assert!(a.is_cleared() && b.is_cleared());
    assert!(cache.is_empty());
    assert!(registry.tracker(x.id()).unwrap().is_empty());

    // The cache remains usable
    cache.insert(0, "c".to_string(), &[&x]).unwrap();
    assert_eq!(cache.len(), 1);
}

#[test]
fn dropping_a_cache_invalidates_and_unregisters_it() {
    let registry = CacheRegistry::new();
    let x = field("x");
    let cache = Cache::<u32, u32>::new(&registry);
    let id = cache.id();
    let entry = cache.insert(0, 0, &[&x]).unwrap();
    assert_eq!(registry.num_caches(), 1);

    drop(cache);
    assert!(entry.is_cleared());
    assert_eq!(registry.num_caches(), 0);
    assert_eq!(registry.cache_len(id), None);
    assert!(!registry.tracker(x.id()).unwrap().contains(id));

    // Mutating the field afterwards finds nothing to invalidate
    x.update_state();
    update_caches(&registry, &[&x], None).unwrap();
}

#[test]
fn caches_owned_by_entries_are_removed_when_the_entries_are() {
    let registry = CacheRegistry::new();
    let (x, y) = (field("x"), field("y"));
    let outer = Cache::<u32, Cache<u32, u32>>::new(&registry);
    let inner = Cache::<u32, u32>::new(&registry);
    let inner_id = inner.id();
    let inner_entry = inner.insert(0, 0, &[&y]).unwrap();
    outer.insert(0, inner, &[&x]).unwrap();
    assert_eq!(registry.num_caches(), 2);

    // The inner cache is dropped while the registry invalidates the outer entry
    x.update_state();
    update_caches(&registry, &[&x], None).unwrap();
    assert!(outer.is_empty());
    assert!(inner_entry.is_cleared());
    assert_eq!(registry.num_pending_removals(), 0);
    assert_eq!(registry.cache_ids(), vec![outer.id()]);
    assert!(!registry.tracker(y.id()).unwrap().contains(inner_id));

    // Same when the outer cache itself is dropped
    let inner = Cache::<u32, u32>::new(&registry);
    let inner_entry = inner.insert(0, 0, &[&y]).unwrap();
    outer.insert(1, inner, &[]).unwrap();
    drop(outer);
    assert!(inner_entry.is_cleared());
    assert_eq!(registry.num_pending_removals(), 0);
    assert_eq!(registry.num_caches(), 0);
    assert!(registry.tracker(y.id()).unwrap().is_empty());
}

#[test]
fn cache_ids_are_unique_within_a_registry() {
    let registry = CacheRegistry::new();
    let a = Cache::<u32, u32>::new(&registry);
    let b = Cache::<u32, u32>::new(&registry);
    let a_id = a.id();
    drop(a);
    let c = Cache::<u32, u32>::new(&registry);
    assert_ne!(a_id, b.id());
    assert_ne!(a_id, c.id());
    assert_ne!(b.id(), c.id());
    assert_eq!(registry.cache_ids(), vec![b.id(), c.id()]);
}

#[test]
fn released_field_forgets_its_tracker() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, u32>::new(&registry);
    let x = field("x");
    let entry = cache.insert(0, 0, &[&x]).unwrap();

    registry.release_field(x.id());
    assert!(entry.is_cleared());
    assert!(registry.tracker(x.id()).is_none());
}

#[test]
fn shared_values_are_not_copied() {
    let registry = CacheRegistry::new();
    let cache = Cache::<u32, Vec<f64>>::new(&registry);
    let value = Rc::new(vec![1.0, 2.0]);
    let entry = cache.insert_shared(0, Rc::clone(&value), &[]).unwrap();
    assert!(Rc::ptr_eq(&entry.get().unwrap(), &value));
    assert!(Rc::ptr_eq(&cache.get_value(&0).unwrap().1, &value));
}
