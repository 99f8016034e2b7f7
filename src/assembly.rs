//! Assembly of forms into scalars, vectors and sparse matrices.
//!
//! Caches are agnostic to how forms are assembled: they talk to a [`Backend`]. The
//! [`FiniteElementBackend`] assembles forms on [interval meshes](crate::mesh::IntervalMesh)
//! with continuous piecewise linear and spatially constant function spaces.
mod evaluate;
mod global;
mod quadrature;

pub use quadrature::{estimate_degree, gauss_legendre, Quadrature};

use crate::bc::{apply_dirichlet_bcs_csr, DirichletBc};
use crate::form::{arguments, coefficients, expand_compounds, expand_derivatives, expand_indices, Argument, Form};
use crate::mesh::IntervalMesh;
use crate::parameters::{FormCompilerParameters, LinearSolverParameters};
use crate::solver::LinearSolver;
use eyre::bail;
use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use std::rc::Rc;

/// The result of assembling a form of rank 0, 1 or 2.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    Scalar(f64),
    Vector(DVector<f64>),
    Matrix(CsrMatrix<f64>),
}

impl Tensor {
    pub fn rank(&self) -> usize {
        match self {
            Self::Scalar(_) => 0,
            Self::Vector(_) => 1,
            Self::Matrix(_) => 2,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&DVector<f64>> {
        match self {
            Self::Vector(vector) => Some(vector),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&CsrMatrix<f64>> {
        match self {
            Self::Matrix(matrix) => Some(matrix),
            _ => None,
        }
    }
}

/// Assembly and solver construction used by the caches.
pub trait Backend {
    /// Assemble a form of rank 0, 1 or 2, without boundary conditions.
    fn assemble(&self, form: &Form, parameters: &FormCompilerParameters) -> eyre::Result<Tensor>;

    /// Assemble a bilinear form and apply the boundary conditions to the matrix.
    ///
    /// With `force_evaluation`, the matrix must be fully assembled on return. Backends which
    /// always assemble eagerly may ignore the flag.
    fn assemble_matrix(
        &self,
        form: &Form,
        bcs: &[DirichletBc],
        force_evaluation: bool,
        parameters: &FormCompilerParameters,
    ) -> eyre::Result<CsrMatrix<f64>>;

    fn build_linear_solver(
        &self,
        matrix: &CsrMatrix<f64>,
        parameters: &LinearSolverParameters,
    ) -> eyre::Result<LinearSolver> {
        LinearSolver::new(matrix, parameters)
    }
}

/// Assembles forms over an interval mesh by Gauss-Legendre quadrature.
///
/// Forms are lowered by expanding derivatives, compound products and indices before they are
/// evaluated point-wise.
#[derive(Debug, Copy, Clone, Default)]
pub struct FiniteElementBackend;

impl FiniteElementBackend {
    pub fn new() -> Self {
        Self
    }
}

fn lower(form: &Form) -> Form {
    expand_indices(&expand_compounds(&expand_derivatives(form)))
}

/// The mesh every space of the form is defined on, if any.
fn form_mesh(arguments: &[Argument], form: &Form) -> eyre::Result<Option<Rc<IntervalMesh>>> {
    let coefficients = coefficients(form);
    let spaces = arguments
        .iter()
        .map(Argument::space)
        .chain(coefficients.iter().map(|c| c.space()));

    let mut mesh: Option<&Rc<IntervalMesh>> = None;
    for space in spaces {
        if let Some(space_mesh) = space.mesh() {
            match mesh {
                None => mesh = Some(space_mesh),
                Some(mesh) if Rc::ptr_eq(mesh, space_mesh) || mesh == space_mesh => {}
                Some(_) => bail!("Form is defined on more than one mesh"),
            }
        }
    }
    Ok(mesh.cloned())
}

/// Check that the arguments are numbered consecutively from zero.
fn check_argument_numbers(arguments: &[Argument]) -> eyre::Result<()> {
    for (expected, argument) in arguments.iter().enumerate() {
        if argument.number() != expected {
            bail!(
                "Form has arguments {:?}, expected consecutive numbers from zero",
                arguments.iter().map(Argument::number).collect::<Vec<_>>()
            );
        }
    }
    Ok(())
}

impl FiniteElementBackend {
    fn assemble_csr(
        &self,
        form: &Form,
        bcs: &[DirichletBc],
        parameters: &FormCompilerParameters,
    ) -> eyre::Result<CsrMatrix<f64>> {
        let arguments = arguments(form);
        check_argument_numbers(&arguments)?;
        if arguments.len() != 2 {
            bail!("Expected a bilinear form, got a form of rank {}", arguments.len());
        }
        let mesh = form_mesh(&arguments, form)?;
        let (test_space, trial_space) = (arguments[0].space(), arguments[1].space());

        let mut coo = global::assemble_coo(mesh.as_deref(), &lower(form), test_space, trial_space, parameters)?;
        if !bcs.is_empty() {
            if test_space.dim() != trial_space.dim() {
                bail!("Boundary conditions require a square matrix");
            }
            for bc in bcs {
                if bc.space().dim() != test_space.dim() {
                    bail!("Boundary condition space does not match the test space");
                }
                // Constrained diagonal entries must be stored
                for &node in bc.nodes() {
                    coo.push(node, node, 0.0);
                }
            }
        }

        let mut matrix = CsrMatrix::from(&coo);
        apply_dirichlet_bcs_csr(&mut matrix, bcs);
        Ok(matrix)
    }
}

impl Backend for FiniteElementBackend {
    fn assemble(&self, form: &Form, parameters: &FormCompilerParameters) -> eyre::Result<Tensor> {
        let arguments = arguments(form);
        check_argument_numbers(&arguments)?;
        let mesh = form_mesh(&arguments, form)?;
        debug!(
            "Assembling form of rank {} with {} integrals",
            arguments.len(),
            form.integrals().len()
        );

        match arguments.len() {
            0 => Ok(Tensor::Scalar(global::assemble_scalar(
                mesh.as_deref(),
                &lower(form),
                parameters,
            )?)),
            1 => Ok(Tensor::Vector(global::assemble_vector(
                mesh.as_deref(),
                &lower(form),
                arguments[0].space(),
                parameters,
            )?)),
            2 => Ok(Tensor::Matrix(self.assemble_csr(form, &[], parameters)?)),
            rank => bail!("Cannot assemble a form of rank {}", rank),
        }
    }

    fn assemble_matrix(
        &self,
        form: &Form,
        bcs: &[DirichletBc],
        _force_evaluation: bool,
        parameters: &FormCompilerParameters,
    ) -> eyre::Result<CsrMatrix<f64>> {
        self.assemble_csr(form, bcs, parameters)
    }
}
