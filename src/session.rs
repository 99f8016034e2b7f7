use crate::cache::{clear_caches, update_caches, AssemblyCache, CacheRegistry, LinearSolverCache};
use crate::error::CacheError;
use crate::field::Field;
use std::mem;

/// Owns a [`CacheRegistry`] together with the default assembly and linear solver caches.
///
/// Every cache handed to a session must live in the session's registry, so that mutations
/// reported through the session reach it.
#[derive(Debug)]
pub struct Session {
    assembly_cache: AssemblyCache,
    linear_solver_cache: LinearSolverCache,
    registry: CacheRegistry,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let registry = CacheRegistry::new();
        Self {
            assembly_cache: AssemblyCache::new(&registry),
            linear_solver_cache: LinearSolverCache::new(&registry),
            registry,
        }
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub fn assembly_cache(&self) -> &AssemblyCache {
        &self.assembly_cache
    }

    pub fn linear_solver_cache(&self) -> &LinearSolverCache {
        &self.linear_solver_cache
    }

    fn check_registry(&self, registry: &CacheRegistry) -> Result<(), CacheError> {
        if registry.ptr_eq(&self.registry) {
            Ok(())
        } else {
            Err(CacheError::invalid_argument("cache belongs to a different registry"))
        }
    }

    /// Replace the default assembly cache, returning the previous one.
    pub fn set_assembly_cache(&mut self, cache: AssemblyCache) -> Result<AssemblyCache, CacheError> {
        self.check_registry(cache.registry())?;
        Ok(mem::replace(&mut self.assembly_cache, cache))
    }

    /// Replace the default linear solver cache, returning the previous one.
    pub fn set_linear_solver_cache(&mut self, cache: LinearSolverCache) -> Result<LinearSolverCache, CacheError> {
        self.check_registry(cache.registry())?;
        Ok(mem::replace(&mut self.linear_solver_cache, cache))
    }

    /// See [`clear_caches`].
    pub fn clear_caches(&self, fields: &[&dyn Field]) {
        clear_caches(&self.registry, fields)
    }

    /// See [`update_caches`].
    pub fn update_caches(
        &self,
        eq_dependencies: &[&dyn Field],
        dependencies: Option<&[&dyn Field]>,
    ) -> Result<(), CacheError> {
        update_caches(&self.registry, eq_dependencies, dependencies)
    }
}
