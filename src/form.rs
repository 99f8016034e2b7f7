//! Symbolic variational forms.
//!
//! A [`Form`] is a sum of [`Integral`]s, each an [`Expr`] integrated over either the cells or
//! the boundary of the mesh. Forms are built with ordinary arithmetic:
//!
//! ```
//! use fenris_adjoint::form::{dx, grad, inner, test_function, trial_function, Expr};
//! use fenris_adjoint::mesh::IntervalMesh;
//! use fenris_adjoint::space::FunctionSpace;
//! use std::rc::Rc;
//!
//! let space = FunctionSpace::p1(Rc::new(IntervalMesh::uniform(0.0, 1.0, 4)));
//! let (u, v) = (trial_function(&space), test_function(&space));
//! let a = inner(grad(&u), grad(&v)) * dx() + u * v * dx();
//! assert_eq!(a.rank(), 2);
//! ```
mod algorithms;
mod canonical;
mod expr;
mod split;

pub use algorithms::*;
pub use canonical::*;
pub use expr::*;
pub use split::*;

use std::ops::{Add, Mul, Neg, Sub};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Measure {
    /// Integration over the cells of the mesh.
    Cell,
    /// Point evaluation at the boundary vertices of the mesh.
    Boundary,
}

pub fn dx() -> Measure {
    Measure::Cell
}

pub fn ds() -> Measure {
    Measure::Boundary
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Integral {
    integrand: Expr,
    measure: Measure,
}

impl Integral {
    /// # Panics
    ///
    /// Panics if the integrand is not a scalar.
    pub fn new(integrand: Expr, measure: Measure) -> Self {
        assert!(integrand.dim().is_none(), "Integrands must be scalar");
        Self { integrand, measure }
    }

    pub fn integrand(&self) -> &Expr {
        &self.integrand
    }

    pub fn measure(&self) -> Measure {
        self.measure
    }

    /// The same integral with a different integrand.
    pub fn reconstruct(&self, integrand: Expr) -> Self {
        Self::new(integrand, self.measure)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Form {
    integrals: Vec<Integral>,
}

impl Form {
    /// Integrals with a zero integrand are dropped.
    pub fn new(integrals: impl IntoIterator<Item = Integral>) -> Self {
        Self {
            integrals: integrals
                .into_iter()
                .filter(|integral| !integral.integrand.is_zero())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn integrals(&self) -> &[Integral] {
        &self.integrals
    }

    pub fn is_empty(&self) -> bool {
        self.integrals.is_empty()
    }

    /// The number of distinct arguments: 0 for functionals, 1 for linear and 2 for bilinear forms.
    pub fn rank(&self) -> usize {
        arguments(self).len()
    }

    /// Apply `f` to every integrand.
    pub fn map_integrands<F>(&self, mut f: F) -> Form
    where
        F: FnMut(&Expr) -> Expr,
    {
        Self::new(
            self.integrals
                .iter()
                .map(|integral| integral.reconstruct(f(&integral.integrand))),
        )
    }
}

impl Mul<Measure> for Expr {
    type Output = Form;

    fn mul(self, measure: Measure) -> Form {
        Form::new([Integral::new(self, measure)])
    }
}

impl Mul<Measure> for &Expr {
    type Output = Form;

    fn mul(self, measure: Measure) -> Form {
        self.clone() * measure
    }
}

impl Add for Form {
    type Output = Form;

    fn add(mut self, rhs: Form) -> Form {
        self.integrals.extend(rhs.integrals);
        self
    }
}

impl<'a> Add<&'a Form> for &'a Form {
    type Output = Form;

    fn add(self, rhs: &'a Form) -> Form {
        self.clone() + rhs.clone()
    }
}

impl Neg for Form {
    type Output = Form;

    fn neg(self) -> Form {
        self.map_integrands(|integrand| -integrand)
    }
}

impl Neg for &Form {
    type Output = Form;

    fn neg(self) -> Form {
        -self.clone()
    }
}

impl Sub for Form {
    type Output = Form;

    fn sub(self, rhs: Form) -> Form {
        self + (-rhs)
    }
}

impl<'a> Sub<&'a Form> for &'a Form {
    type Output = Form;

    fn sub(self, rhs: &'a Form) -> Form {
        self.clone() - rhs.clone()
    }
}
