//! Point evaluation of expanded scalar integrands.
use crate::field::Function;
use crate::form::{Argument, Coefficient, Expr, ExprKind};
use crate::mesh::IntervalMesh;
use eyre::{bail, eyre};

/// A point inside a cell, together with the local basis functions selected for the arguments.
#[derive(Debug, Copy, Clone)]
pub(crate) struct PointContext<'a> {
    pub mesh: Option<&'a IntervalMesh>,
    pub cell: usize,
    pub x: f64,
    /// Local basis function index for each argument number.
    pub arguments: [Option<usize>; 2],
}

fn coefficient_function<'a>(coefficient: &'a Coefficient) -> eyre::Result<&'a Function> {
    coefficient.as_function().ok_or_else(|| {
        eyre!(
            "Cannot evaluate placeholder coefficient {}: supply a replace map with its value",
            coefficient.name()
        )
    })
}

fn evaluate_function(function: &Function, ctx: &PointContext, derivative: bool) -> eyre::Result<f64> {
    let space = function.space();
    if space.is_real() {
        return Ok(if derivative { 0.0 } else { function.values()[0] });
    }
    let mesh = ctx
        .mesh
        .ok_or_else(|| eyre!("Cannot evaluate {} without a mesh", function.name()))?;
    let values = function.values();
    let value = space
        .cell_dofs(ctx.cell)
        .into_iter()
        .enumerate()
        .map(|(local, dof)| {
            let basis = space.evaluate_basis(mesh, ctx.cell, local, ctx.x);
            values[dof] * if derivative { basis.gradient } else { basis.value }
        })
        .sum();
    Ok(value)
}

fn evaluate_argument(argument: &Argument, ctx: &PointContext, derivative: bool) -> eyre::Result<f64> {
    let local = ctx
        .arguments
        .get(argument.number())
        .copied()
        .flatten()
        .ok_or_else(|| eyre!("Unexpected argument {} in integrand", argument.number()))?;
    let space = argument.space();
    if space.is_real() {
        return Ok(if derivative { 0.0 } else { 1.0 });
    }
    let mesh = ctx
        .mesh
        .ok_or_else(|| eyre!("Cannot evaluate argument {} without a mesh", argument.number()))?;
    let basis = space.evaluate_basis(mesh, ctx.cell, local, ctx.x);
    Ok(if derivative { basis.gradient } else { basis.value })
}

/// Evaluate the spatial derivative of `expr`, which must be a terminal or a gradient.
fn evaluate_gradient(expr: &Expr, ctx: &PointContext) -> eyre::Result<f64> {
    match expr.kind() {
        ExprKind::Zero | ExprKind::Int(_) | ExprKind::Float(_) => Ok(0.0),
        ExprKind::Argument(argument) => evaluate_argument(argument, ctx, true),
        ExprKind::Coefficient(coefficient) => evaluate_function(coefficient_function(coefficient)?, ctx, true),
        // Second derivatives of piecewise linear functions vanish
        ExprKind::Grad(_) => Ok(0.0),
        _ => bail!("Cannot evaluate the gradient of {}: expand derivatives first", expr),
    }
}

/// Evaluate a scalar integrand whose derivatives, compounds and indices have been expanded.
pub(crate) fn evaluate(expr: &Expr, ctx: &PointContext) -> eyre::Result<f64> {
    match expr.kind() {
        ExprKind::Zero => Ok(0.0),
        ExprKind::Int(value) => Ok(*value as f64),
        ExprKind::Float(value) => Ok(value.into_inner()),
        ExprKind::Argument(argument) => evaluate_argument(argument, ctx, false),
        ExprKind::Coefficient(coefficient) => evaluate_function(coefficient_function(coefficient)?, ctx, false),
        ExprKind::Sum(a, b) => Ok(evaluate(a, ctx)? + evaluate(b, ctx)?),
        ExprKind::Product(a, b) => Ok(evaluate(a, ctx)? * evaluate(b, ctx)?),
        ExprKind::Division(a, b) => Ok(evaluate(a, ctx)? / evaluate(b, ctx)?),
        ExprKind::Power(e, p) => Ok(evaluate(e, ctx)?.powi(*p)),
        ExprKind::Math(function, e) => Ok(function.apply(evaluate(e, ctx)?)),
        ExprKind::Grad(e) => evaluate_gradient(e, ctx),
        ExprKind::ListTensor(_) => bail!("Cannot integrate the vector-valued expression {}", expr),
        ExprKind::Indexed(..)
        | ExprKind::IndexSum { .. }
        | ExprKind::Inner(..)
        | ExprKind::Dot(..)
        | ExprKind::CoefficientDerivative { .. } => {
            bail!("Cannot evaluate unexpanded expression {}", expr)
        }
    }
}
