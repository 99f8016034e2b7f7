use fenris_adjoint::field::{FieldFlags, Function};
use fenris_adjoint::form::{
    dx, form_is_cached, form_neg, is_cached, normalize_sign, split_action, split_form, system, test_function,
    trial_function, try_split_action, Expr, Form, SplitFailure, SymbolicError,
};
use fenris_adjoint::space::FunctionSpace;
use util::p1_space;

fn coefficient(function: &Function) -> Expr {
    Expr::from(function)
}

fn cached_function(space: &FunctionSpace, name: &str) -> Function {
    Function::with_flags(space, name, FieldFlags::default().with_cache(true))
}

#[test]
fn cached_expressions() {
    let space = p1_space(2);
    let f = Function::new(&space, "f");
    let k = cached_function(&space, "k");
    let c = Function::constant(1.5, "c", FieldFlags::static_field());
    let v = test_function(&space);

    assert!(is_cached(&Expr::float(2.0)));
    assert!(is_cached(&(coefficient(&k) * coefficient(&c))));
    assert!(!is_cached(&(coefficient(&k) * coefficient(&f))));
    assert!(form_is_cached(&(coefficient(&c) * v.clone() * dx())));
    assert!(!form_is_cached(&(coefficient(&f) * v * dx())));
}

#[test]
fn split_form_separates_cached_terms() {
    let space = p1_space(3);
    let f = Function::new(&space, "f");
    let k = cached_function(&space, "k");
    let v = test_function(&space);

    let form = (coefficient(&k) * v.clone() + coefficient(&f) * v.clone()) * dx();
    let (cached, non_cached) = split_form(&form);
    assert_eq!(cached, coefficient(&k) * v.clone() * dx());
    assert_eq!(non_cached, coefficient(&f) * v.clone() * dx());

    let (cached, non_cached) = split_form(&(coefficient(&f) * v * dx()));
    assert!(cached.is_empty());
    assert_eq!(non_cached.integrals().len(), 1);
}

#[test]
fn sign_normalization() {
    let space = p1_space(2);
    let f = Function::new(&space, "f");
    let v = test_function(&space);
    let integrand = coefficient(&f) * v;

    let doubly_negated = (-(-integrand.clone())) * dx();
    assert_eq!(normalize_sign(&doubly_negated, None), integrand.clone() * dx());

    let form = integrand.clone() * dx();
    assert_eq!(normalize_sign(&form, None), form);
    assert_eq!(form_neg(&form), (-integrand.clone()) * dx());
    assert_eq!(form_neg(&form_neg(&form)), form);
    assert_eq!(normalize_sign(&form, Some(-1)), form_neg(&form));
}

#[test]
fn system_splits_bilinear_and_linear_parts() {
    let space = p1_space(3);
    let f = Function::new(&space, "f");
    let (u, v) = (trial_function(&space), test_function(&space));

    let form = (&u * &v - coefficient(&f) * v.clone()) * dx();
    let (a, l) = system(&form).unwrap();
    assert_eq!(a, u.clone() * v.clone() * dx());
    assert_eq!(normalize_sign(&l, None), coefficient(&f) * v * dx());
}

#[test]
fn system_rejects_non_linear_terms() {
    let space = p1_space(3);
    let (u, v) = (trial_function(&space), test_function(&space));

    let form = (&u * &u) * v.clone() * dx();
    assert!(matches!(system(&form), Err(SymbolicError::NonLinearInArguments(_))));

    let form = u.clone() * dx();
    assert!(matches!(system(&form), Err(SymbolicError::MismatchedArguments(_))));

    let form = Expr::power(v, 2) * dx();
    assert!(matches!(system(&form), Err(SymbolicError::NonLinearInArguments(_))));
}

#[test]
fn try_split_action_failures() {
    let space = p1_space(3);
    let x = Function::new(&space, "x");
    let g = Function::new(&space, "g");
    let (u, v) = (trial_function(&space), test_function(&space));

    let bilinear = u.clone() * v.clone() * dx();
    assert_eq!(try_split_action(&bilinear, &x), Err(SplitFailure::NotLinearForm));
    let functional = coefficient(&x) * dx();
    assert_eq!(try_split_action(&functional, &x), Err(SplitFailure::NotLinearForm));

    let independent = coefficient(&g) * v.clone() * dx();
    assert_eq!(try_split_action(&independent, &x), Err(SplitFailure::NoDependence));

    let quadratic = Expr::power(coefficient(&x), 2) * v.clone() * dx();
    assert_eq!(try_split_action(&quadratic, &x), Err(SplitFailure::NonLinear));

    // g is not cached, so the bilinear part g * u * v may not be cached either
    let uncacheable = coefficient(&g) * coefficient(&x) * v.clone() * dx();
    assert_eq!(try_split_action(&uncacheable, &x), Err(SplitFailure::NotCacheable));

    let non_linear_in_test_function = coefficient(&x) * v.clone() * v * dx();
    assert!(matches!(
        try_split_action(&non_linear_in_test_function, &x),
        Err(SplitFailure::Symbolic(SymbolicError::NonLinearInArguments(_)))
    ));
}

#[test]
fn try_split_action_separates_the_action_from_the_remainder() {
    let space = p1_space(3);
    let k = cached_function(&space, "k");
    let x = Function::new(&space, "x");
    let g = Function::new(&space, "g");
    let (u, v) = (trial_function(&space), test_function(&space));

    let form = (coefficient(&k) * coefficient(&x) * v.clone() + coefficient(&g) * v.clone()) * dx();
    let (a, r) = try_split_action(&form, &x).unwrap();
    assert_eq!(a, coefficient(&k) * u * v.clone() * dx());
    assert_eq!(r, coefficient(&g) * v * dx());
}

#[test]
fn split_action_falls_back_to_the_whole_form() {
    let space = p1_space(3);
    let x = Function::new(&space, "x");
    let (u, v) = (trial_function(&space), test_function(&space));

    let bilinear = u * v * dx();
    let (a, r) = split_action(&bilinear, &x);
    assert_eq!(a, Form::empty());
    assert_eq!(r, bilinear);
}
