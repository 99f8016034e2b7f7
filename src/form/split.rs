//! Splitting forms into cacheable and non-cacheable parts.
use crate::field::{Field, Function};
use crate::form::{
    arguments, coefficients, derivative, expand_compounds_expr, expand_derivatives, expand_derivatives_expr,
    expand_indices_expr, expr_arguments, expr_coefficients, replace, trial_function, Expr, ExprKind, Form, Integral,
    ReplaceMap,
};
use log::debug;
use std::error::Error;
use std::fmt;

/// Whether every field `expr` depends on may be cached.
pub fn is_cached(expr: &Expr) -> bool {
    expr_coefficients(expr)
        .iter()
        .all(|coefficient| coefficient.is_cached())
}

pub fn form_is_cached(form: &Form) -> bool {
    coefficients(form)
        .iter()
        .all(|coefficient| coefficient.is_cached())
}

fn sum_terms(expr: &Expr, terms: &mut Vec<Expr>) {
    match expr.kind() {
        ExprKind::Sum(a, b) => {
            sum_terms(a, terms);
            sum_terms(b, terms);
        }
        _ => terms.push(expr.clone()),
    }
}

fn sum_of(terms: impl IntoIterator<Item = Expr>) -> Expr {
    terms.into_iter().fold(Expr::zero(), Expr::sum)
}

/// Split `form` into a form containing the cacheable terms and a form containing the remaining
/// terms.
///
/// Only top-level sums in the integrands are split; no further expansion takes place.
pub fn split_form(form: &Form) -> (Form, Form) {
    let mut cached_integrals = Vec::new();
    let mut non_cached_integrals = Vec::new();

    for integral in form.integrals() {
        let mut terms = Vec::new();
        sum_terms(integral.integrand(), &mut terms);
        let (cached, non_cached): (Vec<_>, Vec<_>) = terms.into_iter().partition(is_cached);
        if !cached.is_empty() {
            cached_integrals.push(integral.reconstruct(sum_of(cached)));
        }
        if !non_cached.is_empty() {
            non_cached_integrals.push(integral.reconstruct(sum_of(non_cached)));
        }
    }

    (Form::new(cached_integrals), Form::new(non_cached_integrals))
}

fn is_minus_one(expr: &Expr) -> bool {
    matches!(expr.kind(), ExprKind::Int(-1))
}

/// Strip leading factors of `-1` from every integrand, moving them into an explicit sign.
///
/// If `sign` is given, the stripped sign is multiplied by it. An integral whose integrand
/// carries no leading `-1` factor is left untouched unless `sign` is given.
pub fn normalize_sign(form: &Form, sign: Option<i64>) -> Form {
    let integrals = form.integrals().iter().map(|integral| {
        let mut integrand = integral.integrand().clone();
        let mut integral_sign = sign;
        while let ExprKind::Product(a, b) = integrand.kind() {
            let stripped = if is_minus_one(a) {
                b.clone()
            } else if is_minus_one(b) {
                a.clone()
            } else {
                break;
            };
            integral_sign = Some(-integral_sign.unwrap_or(1));
            integrand = stripped;
        }

        match integral_sign {
            Some(s) if s < 0 => integral.reconstruct(-integrand),
            Some(_) => integral.reconstruct(integrand),
            None => integral.clone(),
        }
    });
    Form::new(integrals.collect::<Vec<_>>())
}

/// Negate every integrand, with sign normalization.
pub fn form_neg(form: &Form) -> Form {
    normalize_sign(form, Some(-1))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolicError {
    /// An argument appears non-linearly, e.g. as a factor twice or inside a non-linear function.
    NonLinearInArguments(String),
    /// A term carries arguments other than those of a linear or bilinear form.
    MismatchedArguments(String),
}

impl fmt::Display for SymbolicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonLinearInArguments(term) => write!(f, "Term is not linear in its arguments: {}", term),
            Self::MismatchedArguments(term) => write!(f, "Term has unexpected arguments: {}", term),
        }
    }
}

impl Error for SymbolicError {}

fn contains_arguments(expr: &Expr) -> bool {
    !expr_arguments(expr).is_empty()
}

/// Expand products over sums containing arguments, producing a list of terms each of which is a
/// monomial in the arguments.
fn distribute(expr: &Expr) -> Vec<Expr> {
    match expr.kind() {
        ExprKind::Sum(a, b) if contains_arguments(expr) => {
            let mut terms = distribute(a);
            terms.extend(distribute(b));
            terms
        }
        ExprKind::Product(a, b) if contains_arguments(expr) => {
            let a_terms = distribute(a);
            let b_terms = distribute(b);
            a_terms
                .iter()
                .flat_map(|a| b_terms.iter().map(move |b| a.clone() * b.clone()))
                .collect()
        }
        ExprKind::Division(a, b) if contains_arguments(a) => distribute(a)
            .into_iter()
            .map(|a| Expr::division(a, b.clone()))
            .collect(),
        _ => vec![expr.clone()],
    }
}

/// The argument numbers of a single term, checking that it is linear in each of them.
fn term_arguments(term: &Expr) -> Result<Vec<usize>, SymbolicError> {
    let non_linear = || SymbolicError::NonLinearInArguments(term.to_string());
    let numbers = |e: &Expr| -> Vec<usize> { expr_arguments(e).iter().map(|a| a.number()).collect() };
    match term.kind() {
        ExprKind::Argument(argument) => Ok(vec![argument.number()]),
        ExprKind::Product(a, b) => {
            let mut a_numbers = term_arguments(a)?;
            let b_numbers = term_arguments(b)?;
            if a_numbers.iter().any(|n| b_numbers.contains(n)) {
                return Err(non_linear());
            }
            a_numbers.extend(b_numbers);
            a_numbers.sort_unstable();
            Ok(a_numbers)
        }
        ExprKind::Division(a, b) => {
            if contains_arguments(b) {
                return Err(non_linear());
            }
            term_arguments(a)
        }
        ExprKind::Sum(a, b) => {
            let a_numbers = term_arguments(a)?;
            if a_numbers != term_arguments(b)? {
                return Err(SymbolicError::MismatchedArguments(term.to_string()));
            }
            Ok(a_numbers)
        }
        ExprKind::Grad(e) => term_arguments(e),
        _ if !contains_arguments(term) => Ok(Vec::new()),
        ExprKind::Power(..) | ExprKind::Math(..) => Err(non_linear()),
        _ => Err(SymbolicError::MismatchedArguments(format!(
            "{} (arguments {:?})",
            term,
            numbers(term)
        ))),
    }
}

/// Split a form with test function (argument 0) and trial function (argument 1) into its
/// bilinear part `a` and linear part `L`, such that `form == a - L`.
pub fn system(form: &Form) -> Result<(Form, Form), SymbolicError> {
    let mut bilinear = Vec::new();
    let mut linear = Vec::new();

    for integral in form.integrals() {
        let integrand = expand_derivatives_expr(integral.integrand());
        let integrand = expand_indices_expr(&expand_compounds_expr(&integrand));

        let mut bilinear_terms = Vec::new();
        let mut linear_terms = Vec::new();
        for term in distribute(&integrand) {
            match term_arguments(&term)?.as_slice() {
                [0, 1] => bilinear_terms.push(term),
                [0] => linear_terms.push(-term),
                _ => return Err(SymbolicError::MismatchedArguments(term.to_string())),
            }
        }

        if !bilinear_terms.is_empty() {
            bilinear.push(Integral::new(sum_of(bilinear_terms), integral.measure()));
        }
        if !linear_terms.is_empty() {
            linear.push(Integral::new(sum_of(linear_terms), integral.measure()));
        }
    }

    Ok((Form::new(bilinear), Form::new(linear)))
}

/// Reasons why [`try_split_action`] could not split a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitFailure {
    /// The form does not have exactly one argument.
    NotLinearForm,
    /// The form does not depend on the field.
    NoDependence,
    /// The form depends non-linearly on the field.
    NonLinear,
    /// The bilinear part depends on fields which may not be cached.
    NotCacheable,
    Symbolic(SymbolicError),
}

impl fmt::Display for SplitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLinearForm => write!(f, "Not a linear form"),
            Self::NoDependence => write!(f, "No dependence on the field"),
            Self::NonLinear => write!(f, "Non-linear dependence on the field"),
            Self::NotCacheable => write!(f, "Bilinear part depends on non-cached fields"),
            Self::Symbolic(err) => write!(f, "Symbolic error: {}", err),
        }
    }
}

impl Error for SplitFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Symbolic(err) => Some(err),
            _ => None,
        }
    }
}

/// Split a linear form `form`, which depends linearly on `x`, into a cacheable bilinear form `a`
/// and a remainder `r` such that `form == a(x) + r`.
pub fn try_split_action(form: &Form, x: &Function) -> Result<(Form, Form), SplitFailure> {
    if arguments(form).len() != 1 {
        return Err(SplitFailure::NotLinearForm);
    }

    let depends_on = |form: &Form| coefficients(form).iter().any(|c| c.id() == x.id());
    if !depends_on(form) {
        return Err(SplitFailure::NoDependence);
    }

    let trial = trial_function(x.space());
    let form_derivative = expand_derivatives(&derivative(form, x, trial.clone()));
    if depends_on(&form_derivative) {
        return Err(SplitFailure::NonLinear);
    }

    let mut map = ReplaceMap::default();
    map.insert(x.id(), trial);
    let (lhs, rhs) = system(&replace(form, &map)).map_err(SplitFailure::Symbolic)?;

    if !form_is_cached(&lhs) {
        return Err(SplitFailure::NotCacheable);
    }

    Ok((normalize_sign(&lhs, None), form_neg(&rhs)))
}

/// Like [`try_split_action`], but returns `(empty, form)` when the form cannot be split.
pub fn split_action(form: &Form, x: &Function) -> (Form, Form) {
    match try_split_action(form, x) {
        Ok(split) => split,
        Err(failure) => {
            debug!("Cannot split action with respect to {}: {}", x.name(), failure);
            (Form::empty(), form.clone())
        }
    }
}
