//! Dependency-tracked caches of assembled finite element forms and linear solvers.
//!
//! Adjoint and tangent-linear computations replay the same equation solves many times. The
//! caches in this crate make repeated assembly and solver construction cheap, while staying
//! correct when the [fields](field::Field) an entry was computed from change. See the
//! [`cache`] module for the invalidation model and [`form`] for how forms are turned into
//! cache keys.
pub mod assembly;
pub mod bc;
pub mod cache;
pub mod error;
pub mod field;
pub mod form;
pub mod mesh;
pub mod parameters;
pub mod session;
pub mod solver;
pub mod space;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
