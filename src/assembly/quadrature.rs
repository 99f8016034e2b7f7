use crate::form::{Expr, ExprKind};
use fenris_quadrature::univariate;

/// Points and weights of a quadrature rule on the reference interval $[-1, 1]$.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadrature {
    pub points: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Quadrature {
    /// The Gauss-Legendre rule with the fewest points that integrates polynomials of the given
    /// degree exactly.
    pub fn for_degree(degree: usize) -> Self {
        gauss_legendre(degree / 2 + 1)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The `n`-point Gauss-Legendre rule, with points in ascending order.
///
/// # Panics
///
/// Panics if `n` is zero.
pub fn gauss_legendre(n: usize) -> Quadrature {
    let (weights, points) = univariate::gauss(n);
    let mut rule: Vec<_> = points.into_iter().map(|[x]| x).zip(weights).collect();
    rule.sort_by(|(x1, _), (x2, _)| x1.total_cmp(x2));
    let (points, weights) = rule.into_iter().unzip();
    Quadrature { points, weights }
}

/// Polynomial degree of an integrand, used to choose a quadrature rule when none is requested.
///
/// Non-polynomial functions are counted as two degrees above their argument.
pub fn estimate_degree(expr: &Expr) -> usize {
    match expr.kind() {
        ExprKind::Zero | ExprKind::Int(_) | ExprKind::Float(_) => 0,
        ExprKind::Argument(argument) => argument.space().degree(),
        ExprKind::Coefficient(coefficient) => coefficient.space().degree(),
        ExprKind::Sum(a, b) => estimate_degree(a).max(estimate_degree(b)),
        ExprKind::Product(a, b) | ExprKind::Division(a, b) | ExprKind::Inner(a, b) | ExprKind::Dot(a, b) => {
            estimate_degree(a).saturating_add(estimate_degree(b))
        }
        ExprKind::Power(e, p) => estimate_degree(e).saturating_mul(p.unsigned_abs() as usize),
        ExprKind::Math(_, e) => estimate_degree(e).saturating_add(2),
        ExprKind::Grad(e) => estimate_degree(e).saturating_sub(1),
        ExprKind::ListTensor(components) => components.iter().map(estimate_degree).max().unwrap_or(0),
        ExprKind::Indexed(e, _) => estimate_degree(e),
        ExprKind::IndexSum { summand, .. } => estimate_degree(summand),
        ExprKind::CoefficientDerivative { expr, direction, .. } => {
            estimate_degree(expr).max(estimate_degree(direction))
        }
    }
}
