//! Nested parameter maps for form compilers and linear solvers.
//!
//! [`Parameters`] is an ordered string-keyed map which can be (de)serialized with `serde`, so
//! that solver configurations can be loaded from e.g. JSON. Cache keys use the canonical,
//! hashable [`ParametersKey`] derived from it.
use crate::error::CacheError;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameter {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Nested(Parameters),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: BTreeMap<String, Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Parameter>) -> Option<Parameter> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Parameter {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Parameters> for Parameter {
    fn from(value: Parameters) -> Self {
        Self::Nested(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum ParameterKey {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Text(String),
    Nested(ParametersKey),
}

/// Canonical hashable representation of a [`Parameters`] map.
///
/// Two parameter maps produce equal keys if and only if they hold the same entries, regardless
/// of the order in which the entries were inserted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParametersKey(Vec<(String, ParameterKey)>);

pub fn parameters_key(parameters: &Parameters) -> ParametersKey {
    let entries = parameters
        .values
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Parameter::Bool(value) => ParameterKey::Bool(*value),
                Parameter::Int(value) => ParameterKey::Int(*value),
                Parameter::Float(value) => ParameterKey::Float(OrderedFloat(*value)),
                Parameter::Text(value) => ParameterKey::Text(value.clone()),
                Parameter::Nested(nested) => ParameterKey::Nested(parameters_key(nested)),
            };
            (key.clone(), value)
        })
        .collect();
    ParametersKey(entries)
}

fn non_negative_integer(key: &str, value: &Parameter) -> Result<usize, CacheError> {
    match value {
        Parameter::Int(value) if *value >= 0 => Ok(*value as usize),
        _ => Err(CacheError::invalid_argument(format!(
            "parameter '{}' must be a non-negative integer, got {:?}",
            key, value
        ))),
    }
}

fn positive_float(key: &str, value: &Parameter) -> Result<f64, CacheError> {
    let value = match value {
        Parameter::Float(value) => *value,
        Parameter::Int(value) => *value as f64,
        _ => {
            return Err(CacheError::invalid_argument(format!(
                "parameter '{}' must be a number, got {:?}",
                key, value
            )))
        }
    };
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(CacheError::invalid_argument(format!(
            "parameter '{}' must be positive and finite, got {}",
            key, value
        )))
    }
}

fn unknown_parameter(key: &str) -> CacheError {
    CacheError::invalid_argument(format!("unknown parameter '{}'", key))
}

/// Largest quadrature degree accepted by [`FormCompilerParameters`].
pub const MAX_QUADRATURE_DEGREE: usize = 128;

/// Settings recognised by the form compiler.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FormCompilerParameters {
    /// Degree of polynomials integrated exactly. Estimated from the form when absent.
    pub quadrature_degree: Option<usize>,
}

impl FormCompilerParameters {
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, CacheError> {
        let mut result = Self::default();
        for (key, value) in parameters.iter() {
            match key {
                "quadrature_degree" => {
                    let degree = non_negative_integer(key, value)?;
                    if degree > MAX_QUADRATURE_DEGREE {
                        return Err(CacheError::invalid_argument(format!(
                            "parameter '{}' must not exceed {}, got {}",
                            key, MAX_QUADRATURE_DEGREE, degree
                        )));
                    }
                    result.quadrature_degree = Some(degree);
                }
                _ => return Err(unknown_parameter(key)),
            }
        }
        Ok(result)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LinearSolverMethod {
    /// Conjugate gradient iteration on the sparse matrix.
    ConjugateGradient,
    /// Sparse Cholesky factorization.
    Cholesky,
    /// Dense LU factorization with partial pivoting.
    #[default]
    Lu,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LinearSolverParameters {
    pub method: LinearSolverMethod,
    /// Relative residual tolerance of iterative methods.
    pub relative_tolerance: f64,
    pub max_iterations: usize,
}

impl Default for LinearSolverParameters {
    fn default() -> Self {
        Self {
            method: LinearSolverMethod::default(),
            relative_tolerance: 1e-10,
            max_iterations: 1000,
        }
    }
}

impl LinearSolverParameters {
    /// Interpret a parameter map of the form
    ///
    /// ```json
    /// {
    ///     "linear_solver": "cg",
    ///     "krylov_solver": { "relative_tolerance": 1e-12, "maximum_iterations": 500 }
    /// }
    /// ```
    ///
    /// where `linear_solver` is one of `"cg"`, `"cholesky"`, `"lu"` or `"default"`.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, CacheError> {
        let mut result = Self::default();
        for (key, value) in parameters.iter() {
            match (key, value) {
                ("linear_solver", Parameter::Text(method)) => {
                    result.method = match method.as_str() {
                        "cg" => LinearSolverMethod::ConjugateGradient,
                        "cholesky" => LinearSolverMethod::Cholesky,
                        "lu" | "default" => LinearSolverMethod::Lu,
                        _ => {
                            return Err(CacheError::invalid_argument(format!(
                                "unknown linear solver '{}'",
                                method
                            )))
                        }
                    };
                }
                ("krylov_solver", Parameter::Nested(krylov)) => {
                    for (key, value) in krylov.iter() {
                        match key {
                            "relative_tolerance" => result.relative_tolerance = positive_float(key, value)?,
                            "maximum_iterations" => result.max_iterations = non_negative_integer(key, value)?,
                            _ => return Err(unknown_parameter(key)),
                        }
                    }
                }
                ("linear_solver", _) | ("krylov_solver", _) => {
                    return Err(CacheError::invalid_argument(format!(
                        "parameter '{}' has the wrong type: {:?}",
                        key, value
                    )))
                }
                _ => return Err(unknown_parameter(key)),
            }
        }
        Ok(result)
    }
}
