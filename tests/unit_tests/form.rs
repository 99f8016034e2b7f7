use fenris_adjoint::field::{Field, FieldFlags, Function};
use fenris_adjoint::form::{
    arguments, as_vector, coefficients, component, derivative, dot, ds, dx, exp, expand_compounds, expand_derivatives,
    expand_indices, form_dependencies, form_key, grad, inner, replace, replaced_form, test_function, trial_function,
    Coefficient, Expr, ExprKind, Form, ReplaceMap,
};
use util::p1_space;

fn coefficient(function: &Function) -> Expr {
    Expr::from(function)
}

#[test]
fn smart_constructors_simplify() {
    let space = p1_space(2);
    let f = coefficient(&Function::new(&space, "f"));

    assert!((Expr::zero() * f.clone()).is_zero());
    assert_eq!(Expr::int(1) * f.clone(), f);
    assert_eq!(Expr::zero() + f.clone(), f);
    assert_eq!((Expr::int(2) + Expr::int(3)).literal_value(), Some(5.0));
    assert_eq!((Expr::float(0.5) * Expr::int(4)).literal_value(), Some(2.0));
    assert!(matches!((Expr::int(6) / Expr::int(3)).kind(), ExprKind::Int(2)));
    assert!(matches!((Expr::int(1) / Expr::int(2)).kind(), ExprKind::Float(_)));
    assert!(grad(Expr::float(3.0)).is_zero());
}

#[test]
fn commutative_operands_are_sorted() {
    let space = p1_space(2);
    let f = coefficient(&Function::new(&space, "f"));
    let g = coefficient(&Function::new(&space, "g"));
    assert_eq!(&f * &g, &g * &f);
    assert_eq!(&f + &g, &g + &f);
    assert_ne!(&f / &g, &g / &f);
}

#[test]
fn negation_keeps_the_literal_first() {
    let space = p1_space(2);
    let f = coefficient(&Function::new(&space, "f"));
    match (-f.clone()).kind() {
        ExprKind::Product(a, b) => {
            assert!(matches!(a.kind(), ExprKind::Int(-1)));
            assert_eq!(b, &f);
        }
        kind => panic!("unexpected negation {:?}", kind),
    }
}

#[test]
fn form_rank_and_arguments() {
    let space = p1_space(3);
    let (u, v) = (trial_function(&space), test_function(&space));
    let f = Function::new(&space, "f");

    let functional = coefficient(&f) * dx();
    let linear = coefficient(&f) * v.clone() * dx();
    let bilinear = inner(grad(&u), grad(&v)) * dx() + u * v * ds();

    assert_eq!(functional.rank(), 0);
    assert_eq!(linear.rank(), 1);
    assert_eq!(bilinear.rank(), 2);
    let numbers: Vec<_> = arguments(&bilinear).iter().map(|a| a.number()).collect();
    assert_eq!(numbers, vec![0, 1]);
}

#[test]
fn zero_integrands_are_dropped() {
    let form = Expr::zero() * dx() + Expr::int(0) * ds();
    assert!(form.is_empty());
    assert_eq!(form, Form::empty());
}

#[test]
fn coefficients_are_unique_in_first_encountered_order() {
    let space = p1_space(2);
    let f = Function::new(&space, "f");
    let g = Function::new(&space, "g");
    let v = test_function(&space);
    let form = (coefficient(&g) * v.clone() + coefficient(&f) * coefficient(&g) * v) * dx() + coefficient(&f) * ds();

    let ids: Vec<_> = coefficients(&form).iter().map(|c| c.id()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&f.id()) && ids.contains(&g.id()));

    let dependencies: Vec<_> = form_dependencies(&form).iter().map(|c| c.id()).collect();
    assert_eq!(dependencies, ids);
}

#[test]
fn replaced_form_substitutes_every_function() {
    let space = p1_space(2);
    let f = Function::new(&space, "f");
    let v = test_function(&space);
    let form = coefficient(&f) * v * dx();

    let replaced = replaced_form(&form);
    let replaced_coefficients = coefficients(&replaced);
    assert_eq!(replaced_coefficients.len(), 1);
    assert!(matches!(&replaced_coefficients[0], Coefficient::Replacement(_)));
    assert_eq!(replaced_coefficients[0].id(), f.id());
    assert_eq!(replaced_coefficients[0].state(), None);
}

#[test]
fn form_key_is_stable_under_aliasing_and_values() {
    let space = p1_space(4);
    let f = Function::new(&space, "f");
    let alias = f.clone();
    let v = test_function(&space);

    let form = coefficient(&f) * v.clone() * dx();
    let aliased = coefficient(&alias) * v.clone() * dx();
    let placeholder = Expr::from(&f.replacement()) * v.clone() * dx();
    assert_eq!(form_key(&form), form_key(&aliased));
    assert_eq!(form_key(&form), form_key(&placeholder));

    f.set_values(nalgebra::DVector::from_element(5, 2.0));
    assert_eq!(form_key(&form), form_key(&aliased));

    let g = Function::new(&space, "f");
    let other = coefficient(&g) * v * dx();
    assert_ne!(form_key(&form), form_key(&other));
}

#[test]
fn form_key_is_stable_under_reordering_of_commutative_operators() {
    let space = p1_space(4);
    let f = coefficient(&Function::new(&space, "f"));
    let g = coefficient(&Function::new(&space, "g"));
    let (u, v) = (trial_function(&space), test_function(&space));

    let a = (&f * &g) * (&u * &v) * dx();
    let b = (&v * &u) * (&g * &f) * dx();
    assert_eq!(form_key(&a), form_key(&b));

    let c = (f.clone() + g.clone()) * v.clone() * dx();
    let d = (g + f) * v * dx();
    assert_eq!(form_key(&c), form_key(&d));
}

#[test]
fn form_key_expands_compounds_and_indices() {
    let space = p1_space(4);
    let f = coefficient(&Function::new(&space, "f"));
    let g = coefficient(&Function::new(&space, "g"));
    let v = test_function(&space);

    let vector = as_vector(vec![f.clone(), g.clone()]);
    let compound = inner(vector.clone(), vector.clone()) * v.clone() * dx();
    let expanded = (&f * &f + &g * &g) * v.clone() * dx();
    assert_eq!(form_key(&compound), form_key(&expanded));

    let dotted = dot(vector.clone(), as_vector(vec![Expr::int(1), Expr::zero()])) * v.clone() * dx();
    assert_eq!(form_key(&dotted), form_key(&(f.clone() * v.clone() * dx())));
    assert_eq!(component(vector, 1), g);
}

#[test]
fn expanded_compound_forms_do_not_depend_on_fresh_indices() {
    let space = p1_space(2);
    let f = coefficient(&Function::new(&space, "f"));
    let vector = as_vector(vec![f.clone(), f]);
    let form = inner(vector.clone(), vector) * dx();

    let first = expand_indices(&expand_compounds(&form));
    let second = expand_indices(&expand_compounds(&form));
    assert_eq!(first, second);
    assert_ne!(expand_compounds(&form), expand_compounds(&form));
}

#[test]
fn form_key_expands_derivatives() {
    let space = p1_space(4);
    let f = Function::new(&space, "f");
    let (u, v) = (trial_function(&space), test_function(&space));

    // d/df [f^2 v] in direction u = 2 f u v
    let form = Expr::power(coefficient(&f), 2) * v.clone() * dx();
    let d = derivative(&form, &f, u.clone());
    let expected = Expr::int(2) * coefficient(&f) * u.clone() * v.clone() * dx();
    assert_eq!(form_key(&d), form_key(&expected));
    assert_eq!(expand_derivatives(&d).rank(), 2);

    // Chain rule through a nonlinear function and a gradient
    let form = exp(coefficient(&f)) * grad(coefficient(&f)) * v * dx();
    let d = derivative(&form, &f, u.clone());
    let aliased = derivative(&form, &f.clone(), u);
    assert_eq!(form_key(&d), form_key(&aliased));
    assert_eq!(form_key(&d).form().rank(), 2);
    assert!(coefficients(form_key(&d).form()).iter().all(|c| c.id() == f.id()));
}

#[test]
fn derivative_with_respect_to_absent_field_vanishes() {
    let space = p1_space(4);
    let f = Function::new(&space, "f");
    let g = Function::new(&space, "g");
    let v = test_function(&space);
    let form = coefficient(&f) * v * dx();
    let d = expand_derivatives(&derivative(&form, &g, trial_function(&space)));
    assert!(d.is_empty());
}

#[test]
fn gradients_of_constants_vanish() {
    let c = Function::constant(2.0, "c", FieldFlags::static_field());
    let space = p1_space(2);
    let v = test_function(&space);
    let form = grad(coefficient(&c)) * v * dx();
    assert!(expand_derivatives(&form).is_empty());
}

#[test]
fn replace_substitutes_by_identity() {
    let space = p1_space(2);
    let f = Function::new(&space, "f");
    let g = Function::new(&space, "g");
    let v = test_function(&space);
    let form = Expr::from(&f.replacement()) * v.clone() * dx();

    let mut map = ReplaceMap::default();
    map.insert(f.id(), coefficient(&g));
    let replaced = replace(&form, &map);
    assert_eq!(replaced, coefficient(&g) * v * dx());
    assert_eq!(replace(&form, &ReplaceMap::default()), form);
}

#[test]
fn display_names_terminals() {
    let space = p1_space(2);
    let f = Function::new(&space, "f");
    let v = test_function(&space);
    let text = (coefficient(&f) * v.clone()).to_string();
    assert!(text.contains('f') && text.contains("v_0"));
    assert_eq!(Expr::from(&f.replacement()).to_string(), "f'");
}
