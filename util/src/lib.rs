use fenris_adjoint::assembly::{Backend, FiniteElementBackend, Tensor};
use fenris_adjoint::bc::DirichletBc;
use fenris_adjoint::form::Form;
use fenris_adjoint::mesh::IntervalMesh;
use fenris_adjoint::parameters::{FormCompilerParameters, LinearSolverParameters};
use fenris_adjoint::solver::LinearSolver;
use fenris_adjoint::space::FunctionSpace;
use nalgebra_sparse::CsrMatrix;
use std::cell::Cell;
use std::rc::Rc;

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// A uniform mesh of the unit interval.
pub fn unit_interval(num_cells: usize) -> Rc<IntervalMesh> {
    Rc::new(IntervalMesh::uniform(0.0, 1.0, num_cells))
}

/// A P1 space on a uniform mesh of the unit interval.
pub fn p1_space(num_cells: usize) -> FunctionSpace {
    FunctionSpace::p1(unit_interval(num_cells))
}

/// Number of calls made to each operation of a [`CountingBackend`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackendCalls {
    pub assemble: usize,
    pub assemble_matrix: usize,
    pub build_linear_solver: usize,
}

/// A backend which forwards to another backend and counts the calls made to it.
#[derive(Debug, Default)]
pub struct CountingBackend<B = FiniteElementBackend> {
    backend: B,
    calls: Cell<BackendCalls>,
}

impl<B: Backend> CountingBackend<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            calls: Cell::new(BackendCalls::default()),
        }
    }

    pub fn calls(&self) -> BackendCalls {
        self.calls.get()
    }

    /// Total number of forwarded calls.
    pub fn total_calls(&self) -> usize {
        let calls = self.calls();
        calls.assemble + calls.assemble_matrix + calls.build_linear_solver
    }

    fn record(&self, f: impl FnOnce(&mut BackendCalls)) {
        let mut calls = self.calls.get();
        f(&mut calls);
        self.calls.set(calls);
    }
}

impl<B: Backend> Backend for CountingBackend<B> {
    fn assemble(&self, form: &Form, parameters: &FormCompilerParameters) -> eyre::Result<Tensor> {
        self.record(|calls| calls.assemble += 1);
        self.backend.assemble(form, parameters)
    }

    fn assemble_matrix(
        &self,
        form: &Form,
        bcs: &[DirichletBc],
        force_evaluation: bool,
        parameters: &FormCompilerParameters,
    ) -> eyre::Result<CsrMatrix<f64>> {
        self.record(|calls| calls.assemble_matrix += 1);
        self.backend
            .assemble_matrix(form, bcs, force_evaluation, parameters)
    }

    fn build_linear_solver(
        &self,
        matrix: &CsrMatrix<f64>,
        parameters: &LinearSolverParameters,
    ) -> eyre::Result<LinearSolver> {
        self.record(|calls| calls.build_linear_solver += 1);
        self.backend.build_linear_solver(matrix, parameters)
    }
}
