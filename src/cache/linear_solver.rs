use crate::assembly::Backend;
use crate::bc::{BcId, DirichletBc};
use crate::cache::{Cache, CacheRef, CacheRegistry};
use crate::error::CacheError;
use crate::form::{form_key, Form, FormKey};
use crate::parameters::{parameters_key, LinearSolverParameters, Parameters, ParametersKey};
use crate::solver::LinearSolver;
use log::debug;
use nalgebra_sparse::CsrMatrix;
use std::ops::Deref;
use std::rc::Rc;

/// Key of a linear solver: the canonical bilinear form, the boundary conditions, the linear
/// solver parameters and the form compiler parameters.
pub type LinearSolverKey = (FormKey, Vec<BcId>, ParametersKey, ParametersKey);

pub fn linear_solver_key(
    form: &Form,
    bcs: &[DirichletBc],
    linear_solver_parameters: &Parameters,
    form_compiler_parameters: &Parameters,
) -> LinearSolverKey {
    (
        form_key(form),
        bcs.iter().map(DirichletBc::id).collect(),
        parameters_key(linear_solver_parameters),
        parameters_key(form_compiler_parameters),
    )
}

/// A cache of linear solvers, keyed by the bilinear form defining the matrix.
#[derive(Debug)]
pub struct LinearSolverCache {
    cache: Cache<LinearSolverKey, LinearSolver>,
}

impl LinearSolverCache {
    pub fn new(registry: &CacheRegistry) -> Self {
        Self {
            cache: Cache::new(registry),
        }
    }

    /// Return the cached solver for `form`, or build one for `matrix`.
    ///
    /// `matrix` must be the assembled matrix of `form` with `bcs` applied. It is only used when
    /// no live solver is cached.
    pub fn linear_solver(
        &self,
        backend: &dyn Backend,
        form: &Form,
        matrix: &CsrMatrix<f64>,
        bcs: &[DirichletBc],
        form_compiler_parameters: &Parameters,
        linear_solver_parameters: &Parameters,
    ) -> Result<(CacheRef<LinearSolver>, Rc<LinearSolver>), CacheError> {
        let parameters = LinearSolverParameters::from_parameters(linear_solver_parameters)?;
        let key = linear_solver_key(form, bcs, linear_solver_parameters, form_compiler_parameters);
        if let Some(entry) = self.cache.get_value(&key) {
            return Ok(entry);
        }

        let solver = backend.build_linear_solver(matrix, &parameters)?;
        debug!(
            "Caching {:?} linear solver in cache {}",
            solver.method(),
            self.cache.id().index()
        );
        self.cache.insert_for_form(key, form, solver)
    }
}

impl Deref for LinearSolverCache {
    type Target = Cache<LinearSolverKey, LinearSolver>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
