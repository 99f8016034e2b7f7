//! Linear solvers for assembled systems.
use crate::parameters::{LinearSolverMethod, LinearSolverParameters};
use eyre::{bail, eyre};
use fenris_sparse::cg::{ConjugateGradient, RelativeResidualCriterion};
use log::debug;
use nalgebra::{DMatrix, DVector, Dyn, LU};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// A linear solver prepared for a fixed matrix.
///
/// Direct solvers hold the factorization, so that repeated solves with the same matrix only pay
/// for the forward and backward substitution.
#[derive(Debug, Clone)]
pub enum LinearSolver {
    Cholesky(CscCholesky<f64>),
    Lu(LU<f64, Dyn, Dyn>),
    ConjugateGradient {
        matrix: CsrMatrix<f64>,
        relative_tolerance: f64,
        max_iterations: usize,
    },
}

impl LinearSolver {
    /// Build a solver for the given square matrix.
    pub fn new(matrix: &CsrMatrix<f64>, parameters: &LinearSolverParameters) -> eyre::Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            bail!(
                "Cannot build a linear solver for a non-square {}x{} matrix",
                matrix.nrows(),
                matrix.ncols()
            );
        }

        debug!(
            "Building {:?} linear solver for {}x{} matrix",
            parameters.method,
            matrix.nrows(),
            matrix.ncols()
        );
        match parameters.method {
            LinearSolverMethod::Cholesky => {
                let csc = CscMatrix::from(matrix);
                let factorization =
                    CscCholesky::factor(&csc).map_err(|err| eyre!("Cholesky factorization failed: {:?}", err))?;
                Ok(Self::Cholesky(factorization))
            }
            LinearSolverMethod::Lu => {
                let lu = DMatrix::from(matrix).lu();
                if !lu.is_invertible() {
                    bail!("LU factorization failed: matrix is singular");
                }
                Ok(Self::Lu(lu))
            }
            LinearSolverMethod::ConjugateGradient => Ok(Self::ConjugateGradient {
                matrix: matrix.clone(),
                relative_tolerance: parameters.relative_tolerance,
                max_iterations: parameters.max_iterations,
            }),
        }
    }

    pub fn method(&self) -> LinearSolverMethod {
        match self {
            Self::Cholesky(_) => LinearSolverMethod::Cholesky,
            Self::Lu(_) => LinearSolverMethod::Lu,
            Self::ConjugateGradient { .. } => LinearSolverMethod::ConjugateGradient,
        }
    }

    /// Dimension of the system.
    pub fn dim(&self) -> usize {
        match self {
            Self::Cholesky(factorization) => factorization.l().nrows(),
            Self::Lu(lu) => lu.u().nrows(),
            Self::ConjugateGradient { matrix, .. } => matrix.nrows(),
        }
    }

    pub fn solve(&self, rhs: &DVector<f64>) -> eyre::Result<DVector<f64>> {
        if rhs.len() != self.dim() {
            bail!(
                "Right-hand side has dimension {}, expected {}",
                rhs.len(),
                self.dim()
            );
        }

        match self {
            Self::Cholesky(factorization) => {
                let b = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
                let x = factorization.solve(&b);
                Ok(DVector::from_column_slice(x.as_slice()))
            }
            Self::Lu(lu) => lu
                .solve(rhs)
                .ok_or_else(|| eyre!("LU solve failed: matrix is singular")),
            Self::ConjugateGradient {
                matrix,
                relative_tolerance,
                max_iterations,
            } => {
                let mut x = DVector::zeros(rhs.len());
                let output = ConjugateGradient::new()
                    .with_operator(matrix)
                    .with_stopping_criterion(RelativeResidualCriterion::new(*relative_tolerance))
                    .with_max_iter(*max_iterations)
                    .solve_with_guess(rhs, &mut x)
                    .map_err(|err| eyre!("Conjugate gradient solve failed: {}", err))?;
                debug!("Conjugate gradient converged after {} iterations", output.num_iterations);
                Ok(x)
            }
        }
    }
}
