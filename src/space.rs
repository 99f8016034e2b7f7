use crate::mesh::IntervalMesh;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// Process-unique identity of a function space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceId(usize);

impl SpaceId {
    fn new_unique() -> Self {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

#[derive(Debug, Clone)]
enum SpaceKind {
    /// Continuous piecewise linear Lagrange elements, one degree of freedom per vertex.
    P1(Rc<IntervalMesh>),
    /// Spatially constant functions with a single degree of freedom.
    Real,
}

/// A finite element function space.
///
/// Spaces compare by identity: two spaces constructed separately on the same mesh are
/// considered different.
#[derive(Debug, Clone)]
pub struct FunctionSpace {
    id: SpaceId,
    kind: SpaceKind,
}

/// Value and derivative of a basis function at a point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BasisValue {
    pub value: f64,
    pub gradient: f64,
}

impl FunctionSpace {
    pub fn p1(mesh: Rc<IntervalMesh>) -> Self {
        Self {
            id: SpaceId::new_unique(),
            kind: SpaceKind::P1(mesh),
        }
    }

    pub fn real() -> Self {
        Self {
            id: SpaceId::new_unique(),
            kind: SpaceKind::Real,
        }
    }

    pub fn id(&self) -> SpaceId {
        self.id
    }

    pub fn is_real(&self) -> bool {
        matches!(self.kind, SpaceKind::Real)
    }

    /// The mesh the space is defined on, if any.
    pub fn mesh(&self) -> Option<&Rc<IntervalMesh>> {
        match &self.kind {
            SpaceKind::P1(mesh) => Some(mesh),
            SpaceKind::Real => None,
        }
    }

    /// Number of degrees of freedom.
    pub fn dim(&self) -> usize {
        match &self.kind {
            SpaceKind::P1(mesh) => mesh.num_vertices(),
            SpaceKind::Real => 1,
        }
    }

    /// Polynomial degree of the basis functions.
    pub fn degree(&self) -> usize {
        match &self.kind {
            SpaceKind::P1(_) => 1,
            SpaceKind::Real => 0,
        }
    }

    /// Global degrees of freedom associated with a cell of the given mesh.
    pub(crate) fn cell_dofs(&self, cell: usize) -> Vec<usize> {
        match &self.kind {
            SpaceKind::P1(_) => vec![cell, cell + 1],
            SpaceKind::Real => vec![0],
        }
    }

    /// Evaluate the local basis function `local` on `cell` at the point `x`.
    pub(crate) fn evaluate_basis(&self, mesh: &IntervalMesh, cell: usize, local: usize, x: f64) -> BasisValue {
        match &self.kind {
            SpaceKind::P1(_) => {
                let (x0, x1) = mesh.cell(cell);
                let h = x1 - x0;
                if local == 0 {
                    BasisValue {
                        value: (x1 - x) / h,
                        gradient: -1.0 / h,
                    }
                } else {
                    BasisValue {
                        value: (x - x0) / h,
                        gradient: 1.0 / h,
                    }
                }
            }
            SpaceKind::Real => BasisValue {
                value: 1.0,
                gradient: 0.0,
            },
        }
    }
}

impl PartialEq for FunctionSpace {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FunctionSpace {}

impl Hash for FunctionSpace {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialOrd for FunctionSpace {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FunctionSpace {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}
