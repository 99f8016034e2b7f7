//! Traversal and transformation of forms.
use crate::field::{Field, FieldId};
use crate::form::{Argument, Coefficient, Expr, ExprKind, Form, Index, IndexValue};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

/// Substitution of coefficients, keyed by field identity.
///
/// Since a [`Replacement`](crate::field::Replacement) shares the identity of the field it
/// stands in for, an entry matches both the field and its replacement.
pub type ReplaceMap = FxHashMap<FieldId, Expr>;

fn collect_coefficients(expr: &Expr, seen: &mut FxHashSet<FieldId>, coefficients: &mut Vec<Coefficient>) {
    expr.visit_pre_order(&mut |node| {
        let coefficient = match node.kind() {
            ExprKind::Coefficient(coefficient) => coefficient,
            ExprKind::CoefficientDerivative { coefficient, .. } => coefficient,
            _ => return,
        };
        if seen.insert(coefficient.id()) {
            coefficients.push(coefficient.clone());
        }
    });
}

/// The unique coefficients of an expression, in the order they are first encountered.
pub fn expr_coefficients(expr: &Expr) -> Vec<Coefficient> {
    let mut coefficients = Vec::new();
    collect_coefficients(expr, &mut FxHashSet::default(), &mut coefficients);
    coefficients
}

/// The unique coefficients of a form, in the order they are first encountered.
pub fn coefficients(form: &Form) -> Vec<Coefficient> {
    let mut seen = FxHashSet::default();
    let mut coefficients = Vec::new();
    for integral in form.integrals() {
        collect_coefficients(integral.integrand(), &mut seen, &mut coefficients);
    }
    coefficients
}

fn collect_arguments(expr: &Expr, arguments: &mut BTreeSet<Argument>) {
    expr.visit_pre_order(&mut |node| {
        if let ExprKind::Argument(argument) = node.kind() {
            arguments.insert(argument.clone());
        }
    });
}

pub fn expr_arguments(expr: &Expr) -> Vec<Argument> {
    let mut arguments = BTreeSet::new();
    collect_arguments(expr, &mut arguments);
    arguments.into_iter().collect()
}

/// The arguments of a form, sorted by argument number.
pub fn arguments(form: &Form) -> Vec<Argument> {
    let mut arguments = BTreeSet::new();
    for integral in form.integrals() {
        collect_arguments(integral.integrand(), &mut arguments);
    }
    arguments.into_iter().collect()
}

pub fn replace_expr(expr: &Expr, map: &ReplaceMap) -> Expr {
    match expr.kind() {
        ExprKind::Coefficient(coefficient) => map
            .get(&coefficient.id())
            .cloned()
            .unwrap_or_else(|| expr.clone()),
        // Derivatives with respect to a replaced coefficient are only meaningful once expanded
        ExprKind::CoefficientDerivative { .. } => replace_expr(&expand_derivatives_expr(expr), map),
        _ => expr.map_operands(|operand| replace_expr(operand, map)),
    }
}

/// Substitute coefficients according to `map`.
pub fn replace(form: &Form, map: &ReplaceMap) -> Form {
    if map.is_empty() {
        return form.clone();
    }
    form.map_integrands(|integrand| replace_expr(integrand, map))
}

/// The Gateaux derivative of `form` with respect to `coefficient` in the direction `argument`.
///
/// The derivative is kept symbolic; see [`expand_derivatives`].
pub fn derivative(form: &Form, coefficient: impl Into<Coefficient>, argument: impl Into<Expr>) -> Form {
    let coefficient = coefficient.into();
    let argument = argument.into();
    form.map_integrands(|integrand| {
        Expr::coefficient_derivative(integrand.clone(), coefficient.clone(), argument.clone())
    })
}

fn is_constant_in_space(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::Argument(argument) => argument.space().is_real(),
        ExprKind::Coefficient(coefficient) => coefficient.space().is_real(),
        _ => false,
    }
}

/// Gradient of an expression whose derivatives have already been expanded.
fn propagate_grad(expr: &Expr) -> Expr {
    match expr.kind() {
        ExprKind::Zero | ExprKind::Int(_) | ExprKind::Float(_) => Expr::zero(),
        ExprKind::Argument(_) | ExprKind::Coefficient(_) if is_constant_in_space(expr) => Expr::zero(),
        ExprKind::Argument(_) | ExprKind::Coefficient(_) | ExprKind::Grad(_) => Expr::grad(expr.clone()),
        ExprKind::Sum(a, b) => propagate_grad(a) + propagate_grad(b),
        ExprKind::Product(a, b) => propagate_grad(a) * b.clone() + a.clone() * propagate_grad(b),
        ExprKind::Division(a, b) => {
            let da = Expr::division(propagate_grad(a), b.clone());
            let db = Expr::division(a.clone() * propagate_grad(b), Expr::power(b.clone(), 2));
            da - db
        }
        ExprKind::Power(e, p) => Expr::int(i64::from(*p)) * Expr::power(e.clone(), p - 1) * propagate_grad(e),
        ExprKind::Math(function, e) => function.derivative(e) * propagate_grad(e),
        ExprKind::ListTensor(_) => expr.map_operands(propagate_grad),
        ExprKind::Indexed(e, index) => Expr::indexed(propagate_grad(e), *index),
        ExprKind::IndexSum { summand, index, extent } => {
            Expr::index_sum(propagate_grad(summand), *index, *extent)
        }
        ExprKind::Inner(..) | ExprKind::Dot(..) => propagate_grad(&expand_compounds_expr(expr)),
        ExprKind::CoefficientDerivative { .. } => propagate_grad(&expand_derivatives_expr(expr)),
    }
}

/// Gateaux derivative of an expression whose derivatives have already been expanded.
fn gateaux(expr: &Expr, coefficient: FieldId, direction: &Expr) -> Expr {
    let d = |e: &Expr| gateaux(e, coefficient, direction);
    match expr.kind() {
        ExprKind::Zero | ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Argument(_) => Expr::zero(),
        ExprKind::Coefficient(c) if c.id() == coefficient => direction.clone(),
        ExprKind::Coefficient(_) => Expr::zero(),
        ExprKind::Sum(a, b) => d(a) + d(b),
        ExprKind::Product(a, b) => d(a) * b.clone() + a.clone() * d(b),
        ExprKind::Division(a, b) => {
            let da = Expr::division(d(a), b.clone());
            let db = Expr::division(a.clone() * d(b), Expr::power(b.clone(), 2));
            da - db
        }
        ExprKind::Power(e, p) => Expr::int(i64::from(*p)) * Expr::power(e.clone(), p - 1) * d(e),
        ExprKind::Math(function, e) => function.derivative(e) * d(e),
        ExprKind::Grad(e) => propagate_grad(&d(e)),
        ExprKind::ListTensor(_) => expr.map_operands(d),
        ExprKind::Indexed(e, index) => Expr::indexed(d(e), *index),
        ExprKind::IndexSum { summand, index, extent } => Expr::index_sum(d(summand), *index, *extent),
        ExprKind::Inner(a, b) => Expr::inner(d(a), b.clone()) + Expr::inner(a.clone(), d(b)),
        ExprKind::Dot(a, b) => Expr::dot(d(a), b.clone()) + Expr::dot(a.clone(), d(b)),
        ExprKind::CoefficientDerivative { .. } => d(&expand_derivatives_expr(expr)),
    }
}

pub fn expand_derivatives_expr(expr: &Expr) -> Expr {
    match expr.kind() {
        ExprKind::CoefficientDerivative {
            expr,
            coefficient,
            direction,
        } => {
            let expr = expand_derivatives_expr(expr);
            let direction = expand_derivatives_expr(direction);
            gateaux(&expr, coefficient.id(), &direction)
        }
        ExprKind::Grad(e) => propagate_grad(&expand_derivatives_expr(e)),
        _ => expr.map_operands(expand_derivatives_expr),
    }
}

/// Evaluate Gateaux derivatives and propagate gradients to the terminals.
pub fn expand_derivatives(form: &Form) -> Form {
    form.map_integrands(expand_derivatives_expr)
}

pub fn expand_compounds_expr(expr: &Expr) -> Expr {
    let expr = expr.map_operands(expand_compounds_expr);
    match expr.kind() {
        ExprKind::Inner(a, b) | ExprKind::Dot(a, b) => {
            let extent = a.dim().expect("compound products of scalars are plain products");
            let i = Index::new();
            let summand =
                Expr::indexed(a.clone(), IndexValue::Free(i)) * Expr::indexed(b.clone(), IndexValue::Free(i));
            Expr::index_sum(summand, i, extent)
        }
        _ => expr,
    }
}

/// Rewrite inner and dot products in index notation.
pub fn expand_compounds(form: &Form) -> Form {
    form.map_integrands(expand_compounds_expr)
}

fn substitute_index(expr: &Expr, index: Index, value: usize) -> Expr {
    match expr.kind() {
        ExprKind::Indexed(e, IndexValue::Free(i)) if *i == index => {
            Expr::indexed(substitute_index(e, index, value), IndexValue::Fixed(value))
        }
        _ => expr.map_operands(|operand| substitute_index(operand, index, value)),
    }
}

pub fn expand_indices_expr(expr: &Expr) -> Expr {
    let expr = expr.map_operands(expand_indices_expr);
    match expr.kind() {
        ExprKind::IndexSum { summand, index, extent } => (0..*extent)
            .map(|k| substitute_index(summand, *index, k))
            .fold(Expr::zero(), Expr::sum),
        _ => expr,
    }
}

/// Unroll index sums and resolve vector components.
pub fn expand_indices(form: &Form) -> Form {
    form.map_integrands(expand_indices_expr)
}
