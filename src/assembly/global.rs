//! Global assembly of scalars, vectors and sparse matrices over an interval mesh.
use crate::assembly::evaluate::{evaluate, PointContext};
use crate::assembly::quadrature::{estimate_degree, Quadrature};
use crate::form::{Expr, Form, Measure};
use crate::mesh::IntervalMesh;
use crate::parameters::{FormCompilerParameters, MAX_QUADRATURE_DEGREE};
use crate::space::FunctionSpace;
use eyre::eyre;
use log::warn;
use nalgebra::DVector;
use nalgebra_sparse::CooMatrix;

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct QuadraturePoint {
    pub cell: usize,
    pub x: f64,
    pub weight: f64,
}

/// Quadrature points of a measure, mapped to physical coordinates.
///
/// Boundary integrals are point evaluations at the two boundary vertices, evaluated in the
/// adjacent cell.
pub(crate) fn quadrature_points(
    mesh: Option<&IntervalMesh>,
    measure: Measure,
    degree: usize,
) -> eyre::Result<Vec<QuadraturePoint>> {
    let mesh = mesh.ok_or_else(|| eyre!("Cannot integrate a form which is not defined on a mesh"))?;
    let points = match measure {
        Measure::Cell => {
            let rule = Quadrature::for_degree(degree);
            (0..mesh.num_cells())
                .flat_map(|cell| {
                    let (x0, x1) = mesh.cell(cell);
                    let h = x1 - x0;
                    rule.points
                        .iter()
                        .zip(&rule.weights)
                        .map(move |(xi, w)| QuadraturePoint {
                            cell,
                            x: x0 + 0.5 * (xi + 1.0) * h,
                            weight: 0.5 * w * h,
                        })
                })
                .collect()
        }
        Measure::Boundary => mesh
            .boundary_vertices()
            .iter()
            .map(|&(vertex, cell)| QuadraturePoint {
                cell,
                x: mesh.vertices()[vertex],
                weight: 1.0,
            })
            .collect(),
    };
    Ok(points)
}

fn integral_degree(integrand: &Expr, parameters: &FormCompilerParameters) -> usize {
    parameters.quadrature_degree.unwrap_or_else(|| {
        let degree = estimate_degree(integrand);
        if degree > MAX_QUADRATURE_DEGREE {
            warn!(
                "Estimated quadrature degree {} exceeds {}, integrating inexactly",
                degree, MAX_QUADRATURE_DEGREE
            );
        }
        degree.min(MAX_QUADRATURE_DEGREE)
    })
}

/// Integrate a form without arguments.
pub(crate) fn assemble_scalar(
    mesh: Option<&IntervalMesh>,
    form: &Form,
    parameters: &FormCompilerParameters,
) -> eyre::Result<f64> {
    let mut result = 0.0;
    for integral in form.integrals() {
        let degree = integral_degree(integral.integrand(), parameters);
        for point in quadrature_points(mesh, integral.measure(), degree)? {
            let ctx = PointContext {
                mesh,
                cell: point.cell,
                x: point.x,
                arguments: [None, None],
            };
            result += point.weight * evaluate(integral.integrand(), &ctx)?;
        }
    }
    Ok(result)
}

/// Assemble a linear form into a vector indexed by the degrees of freedom of `test_space`.
pub(crate) fn assemble_vector(
    mesh: Option<&IntervalMesh>,
    form: &Form,
    test_space: &FunctionSpace,
    parameters: &FormCompilerParameters,
) -> eyre::Result<DVector<f64>> {
    let mut vector = DVector::zeros(test_space.dim());
    for integral in form.integrals() {
        let degree = integral_degree(integral.integrand(), parameters);
        for point in quadrature_points(mesh, integral.measure(), degree)? {
            for (local, dof) in test_space.cell_dofs(point.cell).into_iter().enumerate() {
                let ctx = PointContext {
                    mesh,
                    cell: point.cell,
                    x: point.x,
                    arguments: [Some(local), None],
                };
                vector[dof] += point.weight * evaluate(integral.integrand(), &ctx)?;
            }
        }
    }
    Ok(vector)
}

/// Assemble a bilinear form into a matrix in coordinate format, with rows indexed by the
/// degrees of freedom of `test_space` and columns by those of `trial_space`.
///
/// Duplicate entries are summed on conversion to compressed format.
pub(crate) fn assemble_coo(
    mesh: Option<&IntervalMesh>,
    form: &Form,
    test_space: &FunctionSpace,
    trial_space: &FunctionSpace,
    parameters: &FormCompilerParameters,
) -> eyre::Result<CooMatrix<f64>> {
    let mut coo = CooMatrix::new(test_space.dim(), trial_space.dim());
    for integral in form.integrals() {
        let degree = integral_degree(integral.integrand(), parameters);
        for point in quadrature_points(mesh, integral.measure(), degree)? {
            let test_dofs = test_space.cell_dofs(point.cell);
            let trial_dofs = trial_space.cell_dofs(point.cell);
            for (i_local, &i) in test_dofs.iter().enumerate() {
                for (j_local, &j) in trial_dofs.iter().enumerate() {
                    let ctx = PointContext {
                        mesh,
                        cell: point.cell,
                        x: point.x,
                        arguments: [Some(i_local), Some(j_local)],
                    };
                    coo.push(i, j, point.weight * evaluate(integral.integrand(), &ctx)?);
                }
            }
        }
    }
    Ok(coo)
}
