//! Dirichlet boundary conditions.
use crate::space::FunctionSpace;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity of a boundary condition, used in cache keys.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BcId(usize);

impl BcId {
    fn new_unique() -> Self {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Prescribes a constant value at a set of degrees of freedom.
///
/// A boundary condition is identified by its [`BcId`]: a homogenized boundary condition is a new
/// boundary condition with its own identity.
#[derive(Debug, Clone)]
pub struct DirichletBc {
    id: BcId,
    space: FunctionSpace,
    nodes: Vec<usize>,
    value: f64,
    is_static: bool,
    cache: bool,
    homogeneous: bool,
}

impl DirichletBc {
    /// # Panics
    ///
    /// Panics if a node is not a degree of freedom of the space.
    pub fn new(space: &FunctionSpace, nodes: impl IntoIterator<Item = usize>, value: f64) -> Self {
        let mut nodes: Vec<_> = nodes.into_iter().collect();
        nodes.sort_unstable();
        nodes.dedup();
        assert!(
            nodes.iter().all(|&node| node < space.dim()),
            "Boundary condition node out of bounds"
        );
        Self {
            id: BcId::new_unique(),
            space: space.clone(),
            nodes,
            value,
            is_static: false,
            cache: false,
            homogeneous: value == 0.0,
        }
    }

    /// A boundary condition on both boundary vertices of the mesh of a P1 space.
    ///
    /// # Panics
    ///
    /// Panics if the space is not defined on a mesh.
    pub fn on_boundary(space: &FunctionSpace, value: f64) -> Self {
        let mesh = space
            .mesh()
            .expect("Boundary conditions on the boundary require a space defined on a mesh");
        let nodes = mesh.boundary_vertices().map(|(vertex, _)| vertex);
        Self::new(space, nodes, value)
    }

    /// Mark the boundary condition as static, which by default also makes it cacheable.
    pub fn with_static(self, is_static: bool) -> Self {
        Self {
            is_static,
            cache: is_static,
            ..self
        }
    }

    pub fn with_cache(self, cache: bool) -> Self {
        Self { cache, ..self }
    }

    pub fn id(&self) -> BcId {
        self.id
    }

    pub fn space(&self) -> &FunctionSpace {
        &self.space
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn value(&self) -> f64 {
        if self.homogeneous {
            0.0
        } else {
            self.value
        }
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_cached(&self) -> bool {
        self.cache
    }

    pub fn is_homogeneous(&self) -> bool {
        self.homogeneous
    }

    /// The homogeneous counterpart of this boundary condition.
    ///
    /// Returns a copy with the same identity if the boundary condition is already homogeneous.
    pub fn homogenized(&self) -> Self {
        let mut bc = self.clone();
        bc.homogenize();
        bc
    }

    /// Set the prescribed value to zero. Idempotent.
    pub fn homogenize(&mut self) {
        if !self.homogeneous {
            self.homogeneous = true;
            self.id = BcId::new_unique();
        }
    }

    /// Overwrite the constrained entries of a vector with the prescribed value.
    ///
    /// # Panics
    ///
    /// Panics if the vector does not have the dimension of the space.
    pub fn apply(&self, vector: &mut DVector<f64>) {
        assert_eq!(vector.len(), self.space.dim(), "Vector dimension mismatch");
        let value = self.value();
        for &node in &self.nodes {
            vector[node] = value;
        }
    }
}

/// Whether every boundary condition is static.
pub fn bcs_is_static(bcs: &[DirichletBc]) -> bool {
    bcs.iter().all(DirichletBc::is_static)
}

/// Whether every boundary condition may be cached.
pub fn bcs_is_cached(bcs: &[DirichletBc]) -> bool {
    bcs.iter().all(DirichletBc::is_cached)
}

/// Apply Dirichlet boundary conditions to a square matrix, preserving symmetry.
///
/// Rows and columns of constrained degrees of freedom are zeroed and their diagonal entries are
/// set to one. The diagonal entries must be explicitly stored.
pub fn apply_dirichlet_bcs_csr(matrix: &mut CsrMatrix<f64>, bcs: &[DirichletBc]) {
    assert_eq!(matrix.nrows(), matrix.ncols(), "Matrix must be square");
    let mut is_constrained = vec![false; matrix.nrows()];
    for bc in bcs {
        for &node in bc.nodes() {
            is_constrained[node] = true;
        }
    }

    // Constrained rows are zeroed entirely, the remaining rows only in constrained columns
    for (row_index, mut row) in matrix.row_iter_mut().enumerate() {
        let row_is_constrained = is_constrained[row_index];
        let (cols, values) = row.cols_and_values_mut();
        for (&col_index, value) in cols.iter().zip(values) {
            if row_is_constrained {
                *value = if col_index == row_index { 1.0 } else { 0.0 };
            } else if is_constrained[col_index] {
                *value = 0.0;
            }
        }
    }
}
