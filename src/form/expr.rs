use crate::field::{Field, FieldId, FieldState, Function, Replacement};
use crate::space::FunctionSpace;
use ordered_float::OrderedFloat;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// A test (`number == 0`) or trial (`number == 1`) function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Argument {
    number: usize,
    space: FunctionSpace,
}

impl Argument {
    pub fn new(number: usize, space: &FunctionSpace) -> Self {
        Self {
            number,
            space: space.clone(),
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn space(&self) -> &FunctionSpace {
        &self.space
    }
}

/// A field appearing in a form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Coefficient {
    Function(Function),
    Replacement(Replacement),
}

impl Coefficient {
    pub fn space(&self) -> &FunctionSpace {
        match self {
            Self::Function(function) => function.space(),
            Self::Replacement(replacement) => replacement.space(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Function(function) => function.name(),
            Self::Replacement(replacement) => replacement.name(),
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            Self::Replacement(_) => None,
        }
    }

    fn as_field(&self) -> &dyn Field {
        match self {
            Self::Function(function) => function,
            Self::Replacement(replacement) => replacement,
        }
    }
}

impl Field for Coefficient {
    fn id(&self) -> FieldId {
        self.as_field().id()
    }

    fn state(&self) -> Option<u64> {
        self.as_field().state()
    }

    fn is_static(&self) -> bool {
        self.as_field().is_static()
    }

    fn is_cached(&self) -> bool {
        self.as_field().is_cached()
    }

    fn is_checkpointed(&self) -> bool {
        self.as_field().is_checkpointed()
    }

    fn tlm_depth(&self) -> usize {
        self.as_field().tlm_depth()
    }

    fn snapshot(&self) -> FieldState {
        self.as_field().snapshot()
    }
}

impl From<&Function> for Coefficient {
    fn from(function: &Function) -> Self {
        Self::Function(function.clone())
    }
}

impl From<&Replacement> for Coefficient {
    fn from(replacement: &Replacement) -> Self {
        Self::Replacement(replacement.clone())
    }
}

/// A free index used in index notation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index(usize);

impl Index {
    pub fn new() -> Self {
        static NEXT_INDEX: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT_INDEX.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexValue {
    Fixed(usize),
    Free(Index),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MathFunction {
    Exp,
    Sin,
    Cos,
    Ln,
    Sqrt,
}

impl MathFunction {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Exp => x.exp(),
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Ln => x.ln(),
            Self::Sqrt => x.sqrt(),
        }
    }

    /// The symbolic derivative $f'(e)$.
    pub fn derivative(self, e: &Expr) -> Expr {
        match self {
            Self::Exp => Expr::math(Self::Exp, e.clone()),
            Self::Sin => Expr::math(Self::Cos, e.clone()),
            Self::Cos => -Expr::math(Self::Sin, e.clone()),
            Self::Ln => Expr::division(Expr::int(1), e.clone()),
            Self::Sqrt => Expr::division(Expr::float(0.5), Expr::math(Self::Sqrt, e.clone())),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Exp => "exp",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Ln => "ln",
            Self::Sqrt => "sqrt",
        }
    }
}

/// Expression nodes.
///
/// The variant order determines the canonical ordering of operands of commutative operators.
/// In particular literals sort before every other node, so that e.g. a negation `-1 * x` always
/// carries its literal as the first operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExprKind {
    Zero,
    Int(i64),
    Float(OrderedFloat<f64>),
    Argument(Argument),
    Coefficient(Coefficient),
    Sum(Expr, Expr),
    Product(Expr, Expr),
    Division(Expr, Expr),
    Power(Expr, i32),
    Math(MathFunction, Expr),
    /// Spatial derivative of a scalar expression.
    Grad(Expr),
    /// A vector with scalar components.
    ListTensor(Vec<Expr>),
    /// Component of a vector expression.
    Indexed(Expr, IndexValue),
    IndexSum {
        summand: Expr,
        index: Index,
        extent: usize,
    },
    Inner(Expr, Expr),
    Dot(Expr, Expr),
    /// Gateaux derivative of `expr` with respect to `coefficient` in the given direction.
    CoefficientDerivative {
        expr: Expr,
        coefficient: Coefficient,
        direction: Expr,
    },
}

/// An immutable, shared symbolic expression.
///
/// Expressions are built through smart constructors which perform the light-weight
/// simplifications every structural comparison relies on: zero elimination, folding of
/// literals, elimination of multiplication by one and sorting of the operands of sums and
/// products. Vector expressions are always [`ExprKind::ListTensor`]s; sums, products,
/// divisions and gradients are distributed over their components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Expr(Rc<ExprKind>);

#[derive(Debug, Copy, Clone)]
enum Literal {
    Int(i64),
    Float(f64),
}

impl Literal {
    fn value(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }
}

fn fold(a: Literal, b: Literal, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Expr {
    match (a, b) {
        (Literal::Int(a), Literal::Int(b)) => match int_op(a, b) {
            Some(value) => Expr::int(value),
            None => Expr::float(float_op(a as f64, b as f64)),
        },
        _ => Expr::float(float_op(a.value(), b.value())),
    }
}

impl Expr {
    fn new(kind: ExprKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    pub fn zero() -> Self {
        Self::new(ExprKind::Zero)
    }

    pub fn int(value: i64) -> Self {
        if value == 0 {
            Self::zero()
        } else {
            Self::new(ExprKind::Int(value))
        }
    }

    pub fn float(value: f64) -> Self {
        if value == 0.0 {
            Self::zero()
        } else {
            Self::new(ExprKind::Float(OrderedFloat(value)))
        }
    }

    pub fn argument(argument: Argument) -> Self {
        Self::new(ExprKind::Argument(argument))
    }

    pub fn coefficient(coefficient: Coefficient) -> Self {
        Self::new(ExprKind::Coefficient(coefficient))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.kind(), ExprKind::Zero)
    }

    fn literal(&self) -> Option<Literal> {
        match self.kind() {
            ExprKind::Zero => Some(Literal::Int(0)),
            ExprKind::Int(value) => Some(Literal::Int(*value)),
            ExprKind::Float(value) => Some(Literal::Float(value.into_inner())),
            _ => None,
        }
    }

    /// The value of a literal expression.
    pub fn literal_value(&self) -> Option<f64> {
        self.literal().map(Literal::value)
    }

    fn is_one(&self) -> bool {
        self.literal_value() == Some(1.0)
    }

    /// Number of components of a vector expression, `None` for scalars.
    pub fn dim(&self) -> Option<usize> {
        self.components().map(|components| components.len())
    }

    pub fn components(&self) -> Option<&[Expr]> {
        match self.kind() {
            ExprKind::ListTensor(components) => Some(components),
            _ => None,
        }
    }

    fn assert_scalar(&self, operation: &str) {
        assert!(self.dim().is_none(), "{} is only defined for scalar expressions", operation);
    }

    pub fn sum(a: Expr, b: Expr) -> Expr {
        match (a.components(), b.components()) {
            (Some(a), Some(b)) => {
                assert_eq!(a.len(), b.len(), "Can not add vectors of different dimension");
                let components = a.iter().zip(b).map(|(a, b)| Self::sum(a.clone(), b.clone()));
                return Self::list_tensor(components.collect());
            }
            (None, None) => {}
            _ => panic!("Can not add a scalar and a vector"),
        }

        if a.is_zero() {
            return b;
        }
        if b.is_zero() {
            return a;
        }
        if let (Some(x), Some(y)) = (a.literal(), b.literal()) {
            return fold(x, y, i64::checked_add, |x, y| x + y);
        }
        let (a, b) = if b < a { (b, a) } else { (a, b) };
        Self::new(ExprKind::Sum(a, b))
    }

    pub fn product(a: Expr, b: Expr) -> Expr {
        match (a.components(), b.components()) {
            (Some(_), Some(_)) => panic!("Use inner or dot to multiply two vectors"),
            (Some(components), None) => {
                let components = components.iter().map(|c| Self::product(c.clone(), b.clone()));
                return Self::list_tensor(components.collect());
            }
            (None, Some(components)) => {
                let components = components.iter().map(|c| Self::product(a.clone(), c.clone()));
                return Self::list_tensor(components.collect());
            }
            (None, None) => {}
        }

        if a.is_zero() || b.is_zero() {
            return Self::zero();
        }
        if a.is_one() {
            return b;
        }
        if b.is_one() {
            return a;
        }
        if let (Some(x), Some(y)) = (a.literal(), b.literal()) {
            return fold(x, y, i64::checked_mul, |x, y| x * y);
        }
        let (a, b) = if b < a { (b, a) } else { (a, b) };
        Self::new(ExprKind::Product(a, b))
    }

    pub fn division(a: Expr, b: Expr) -> Expr {
        b.assert_scalar("Division by an expression");
        if let Some(components) = a.components() {
            let components = components.iter().map(|c| Self::division(c.clone(), b.clone()));
            return Self::list_tensor(components.collect());
        }

        assert!(!b.is_zero(), "Division by zero");
        if a.is_zero() {
            return Self::zero();
        }
        if b.is_one() {
            return a;
        }
        if let (Some(x), Some(y)) = (a.literal(), b.literal()) {
            return fold(
                x,
                y,
                |x, y| match x.checked_rem(y) {
                    Some(0) => x.checked_div(y),
                    _ => None,
                },
                |x, y| x / y,
            );
        }
        Self::new(ExprKind::Division(a, b))
    }

    pub fn power(base: Expr, exponent: i32) -> Expr {
        base.assert_scalar("Exponentiation");
        if exponent == 0 {
            return Self::int(1);
        }
        if exponent == 1 {
            return base;
        }
        if base.is_zero() {
            assert!(exponent > 0, "Division by zero");
            return Self::zero();
        }
        match base.literal() {
            Some(Literal::Int(value)) if exponent > 0 => match value.checked_pow(exponent as u32) {
                Some(result) => Self::int(result),
                None => Self::float((value as f64).powi(exponent)),
            },
            Some(literal) => Self::float(literal.value().powi(exponent)),
            None => Self::new(ExprKind::Power(base, exponent)),
        }
    }

    pub fn math(function: MathFunction, argument: Expr) -> Expr {
        argument.assert_scalar(function.name());
        match argument.literal_value() {
            Some(value) => Self::float(function.apply(value)),
            None => Self::new(ExprKind::Math(function, argument)),
        }
    }

    pub fn grad(e: Expr) -> Expr {
        if let Some(components) = e.components() {
            let components = components.iter().map(|c| Self::grad(c.clone()));
            return Self::list_tensor(components.collect());
        }
        if e.literal().is_some() {
            return Self::zero();
        }
        Self::new(ExprKind::Grad(e))
    }

    /// # Panics
    ///
    /// Panics if there are no components or if a component is not a scalar.
    pub fn list_tensor(components: Vec<Expr>) -> Expr {
        assert!(!components.is_empty(), "A vector needs at least one component");
        for component in &components {
            component.assert_scalar("A vector component");
        }
        Self::new(ExprKind::ListTensor(components))
    }

    pub fn indexed(e: Expr, index: IndexValue) -> Expr {
        let components = e.components().expect("Can only index vector expressions");
        match index {
            IndexValue::Fixed(i) => {
                assert!(i < components.len(), "Index out of bounds");
                components[i].clone()
            }
            IndexValue::Free(_) => Self::new(ExprKind::Indexed(e, index)),
        }
    }

    pub fn index_sum(summand: Expr, index: Index, extent: usize) -> Expr {
        summand.assert_scalar("Index sum");
        if summand.is_zero() || extent == 0 {
            return Self::zero();
        }
        Self::new(ExprKind::IndexSum { summand, index, extent })
    }

    pub fn inner(a: Expr, b: Expr) -> Expr {
        assert_eq!(a.dim(), b.dim(), "Shape mismatch in inner product");
        if a.dim().is_none() {
            Self::product(a, b)
        } else {
            Self::new(ExprKind::Inner(a, b))
        }
    }

    pub fn dot(a: Expr, b: Expr) -> Expr {
        assert_eq!(a.dim(), b.dim(), "Shape mismatch in dot product");
        if a.dim().is_none() {
            Self::product(a, b)
        } else {
            Self::new(ExprKind::Dot(a, b))
        }
    }

    pub fn coefficient_derivative(expr: Expr, coefficient: Coefficient, direction: Expr) -> Expr {
        if expr.is_zero() {
            return Self::zero();
        }
        Self::new(ExprKind::CoefficientDerivative {
            expr,
            coefficient,
            direction,
        })
    }

    /// Immediate sub-expressions, in operand order.
    pub fn operands(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::Zero
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Argument(_)
            | ExprKind::Coefficient(_) => Vec::new(),
            ExprKind::Sum(a, b)
            | ExprKind::Product(a, b)
            | ExprKind::Division(a, b)
            | ExprKind::Inner(a, b)
            | ExprKind::Dot(a, b) => vec![a, b],
            ExprKind::Power(e, _) | ExprKind::Math(_, e) | ExprKind::Grad(e) | ExprKind::Indexed(e, _) => vec![e],
            ExprKind::ListTensor(components) => components.iter().collect(),
            ExprKind::IndexSum { summand, .. } => vec![summand],
            ExprKind::CoefficientDerivative { expr, direction, .. } => vec![expr, direction],
        }
    }

    /// Rebuild the expression with every operand mapped through `f`.
    ///
    /// The result is reconstructed through the smart constructors, so that simplifications
    /// enabled by the new operands are applied.
    pub fn map_operands<F>(&self, mut f: F) -> Expr
    where
        F: FnMut(&Expr) -> Expr,
    {
        match self.kind() {
            ExprKind::Zero
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Argument(_)
            | ExprKind::Coefficient(_) => self.clone(),
            ExprKind::Sum(a, b) => Self::sum(f(a), f(b)),
            ExprKind::Product(a, b) => Self::product(f(a), f(b)),
            ExprKind::Division(a, b) => Self::division(f(a), f(b)),
            ExprKind::Power(e, p) => Self::power(f(e), *p),
            ExprKind::Math(function, e) => Self::math(*function, f(e)),
            ExprKind::Grad(e) => Self::grad(f(e)),
            ExprKind::ListTensor(components) => Self::list_tensor(components.iter().map(f).collect()),
            ExprKind::Indexed(e, index) => Self::indexed(f(e), *index),
            ExprKind::IndexSum { summand, index, extent } => Self::index_sum(f(summand), *index, *extent),
            ExprKind::Inner(a, b) => Self::inner(f(a), f(b)),
            ExprKind::Dot(a, b) => Self::dot(f(a), f(b)),
            ExprKind::CoefficientDerivative {
                expr,
                coefficient,
                direction,
            } => Self::coefficient_derivative(f(expr), coefficient.clone(), f(direction)),
        }
    }

    /// Visit every node of the expression tree in pre-order.
    pub fn visit_pre_order<F>(&self, f: &mut F)
    where
        F: FnMut(&Expr),
    {
        f(self);
        for operand in self.operands() {
            operand.visit_pre_order(f);
        }
    }
}

pub fn test_function(space: &FunctionSpace) -> Expr {
    Expr::argument(Argument::new(0, space))
}

pub fn trial_function(space: &FunctionSpace) -> Expr {
    Expr::argument(Argument::new(1, space))
}

pub fn grad(e: impl Into<Expr>) -> Expr {
    Expr::grad(e.into())
}

pub fn inner(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    Expr::inner(a.into(), b.into())
}

pub fn dot(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    Expr::dot(a.into(), b.into())
}

pub fn exp(e: impl Into<Expr>) -> Expr {
    Expr::math(MathFunction::Exp, e.into())
}

pub fn sin(e: impl Into<Expr>) -> Expr {
    Expr::math(MathFunction::Sin, e.into())
}

pub fn cos(e: impl Into<Expr>) -> Expr {
    Expr::math(MathFunction::Cos, e.into())
}

pub fn ln(e: impl Into<Expr>) -> Expr {
    Expr::math(MathFunction::Ln, e.into())
}

pub fn sqrt(e: impl Into<Expr>) -> Expr {
    Expr::math(MathFunction::Sqrt, e.into())
}

pub fn as_vector(components: Vec<Expr>) -> Expr {
    Expr::list_tensor(components)
}

/// The `i`-th component of a vector expression.
pub fn component(e: impl Into<Expr>, i: usize) -> Expr {
    Expr::indexed(e.into(), IndexValue::Fixed(i))
}

impl From<&Function> for Expr {
    fn from(function: &Function) -> Self {
        Self::coefficient(function.into())
    }
}

impl From<&Replacement> for Expr {
    fn from(replacement: &Replacement) -> Self {
        Self::coefficient(replacement.into())
    }
}

impl From<Coefficient> for Expr {
    fn from(coefficient: Coefficient) -> Self {
        Self::coefficient(coefficient)
    }
}

impl From<Argument> for Expr {
    fn from(argument: Argument) -> Self {
        Self::argument(argument)
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::float(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::int(value)
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $constructor:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                $constructor(self, rhs)
            }
        }

        impl<'a> $trait<&'a Expr> for &'a Expr {
            type Output = Expr;

            fn $method(self, rhs: &'a Expr) -> Expr {
                $constructor(self.clone(), rhs.clone())
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;

            fn $method(self, rhs: f64) -> Expr {
                $constructor(self, Expr::float(rhs))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                $constructor(Expr::float(self), rhs)
            }
        }
    };
}

impl_binary_operator!(Add, add, Expr::sum);
impl_binary_operator!(Sub, sub, |a: Expr, b: Expr| Expr::sum(a, -b));
impl_binary_operator!(Mul, mul, Expr::product);
impl_binary_operator!(Div, div, Expr::division);

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::product(Expr::int(-1), self)
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        -self.clone()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Zero => write!(f, "0"),
            ExprKind::Int(value) => write!(f, "{}", value),
            ExprKind::Float(value) => write!(f, "{}", value),
            ExprKind::Argument(argument) => write!(f, "v_{}", argument.number()),
            ExprKind::Coefficient(Coefficient::Function(function)) => write!(f, "{}", function.name()),
            ExprKind::Coefficient(Coefficient::Replacement(replacement)) => {
                write!(f, "{}'", replacement.name())
            }
            ExprKind::Sum(a, b) => write!(f, "({} + {})", a, b),
            ExprKind::Product(a, b) => write!(f, "{} * {}", a, b),
            ExprKind::Division(a, b) => write!(f, "({}) / ({})", a, b),
            ExprKind::Power(e, p) => write!(f, "({})^{}", e, p),
            ExprKind::Math(function, e) => write!(f, "{}({})", function.name(), e),
            ExprKind::Grad(e) => write!(f, "grad({})", e),
            ExprKind::ListTensor(components) => {
                write!(f, "[")?;
                for (i, component) in components.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", component)?;
                }
                write!(f, "]")
            }
            ExprKind::Indexed(e, IndexValue::Fixed(i)) => write!(f, "{}[{}]", e, i),
            ExprKind::Indexed(e, IndexValue::Free(index)) => write!(f, "{}[i_{}]", e, index.0),
            ExprKind::IndexSum { summand, index, extent } => {
                write!(f, "sum_{{i_{} < {}}} {}", index.0, extent, summand)
            }
            ExprKind::Inner(a, b) => write!(f, "inner({}, {})", a, b),
            ExprKind::Dot(a, b) => write!(f, "dot({}, {})", a, b),
            ExprKind::CoefficientDerivative {
                expr,
                coefficient,
                direction,
            } => write!(f, "d/d{}[{}]({})", coefficient.name(), direction, expr),
        }
    }
}
