//! Structural keys of forms.
use crate::field::{Field, Function};
use crate::form::{
    coefficients, expand_compounds, expand_derivatives, expand_indices, replace, Coefficient, Expr, ExprKind, Form,
    ReplaceMap,
};
use rustc_hash::FxHashSet;

/// A canonical representation of a form, suitable as (part of) a cache key.
///
/// Two forms have equal keys when they are structurally equal after every field has been
/// substituted with its [`Replacement`](crate::field::Replacement) and derivatives, compound
/// operators and index notation have been expanded. Keys therefore do not depend on the values
/// held by the fields, only on their identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormKey(Form);

impl FormKey {
    pub fn form(&self) -> &Form {
        &self.0
    }
}

/// Substitute every function in the form with its value-less replacement.
pub fn replaced_form(form: &Form) -> Form {
    let map: ReplaceMap = coefficients(form)
        .iter()
        .filter_map(|coefficient| match coefficient {
            Coefficient::Function(function) => Some((function.id(), Expr::from(&function.replacement()))),
            Coefficient::Replacement(_) => None,
        })
        .collect();
    replace(form, &map)
}

pub fn form_key(form: &Form) -> FormKey {
    let form = replaced_form(form);
    let form = expand_derivatives(&form);
    let form = expand_compounds(&form);
    let form = expand_indices(&form);
    FormKey(form)
}

/// The functions the value of `form` depends on, unique and in the order they are first
/// encountered.
///
/// Replacements carry no values and are not dependencies, even when their function also
/// appears in the form.
pub fn form_dependencies(form: &Form) -> Vec<Function> {
    let mut seen = FxHashSet::default();
    let mut dependencies = Vec::new();
    for integral in form.integrals() {
        integral.integrand().visit_pre_order(&mut |node| {
            let coefficient = match node.kind() {
                ExprKind::Coefficient(coefficient) => coefficient,
                ExprKind::CoefficientDerivative { coefficient, .. } => coefficient,
                _ => return,
            };
            if let Coefficient::Function(function) = coefficient {
                if seen.insert(function.id()) {
                    dependencies.push(function.clone());
                }
            }
        });
    }
    dependencies
}
