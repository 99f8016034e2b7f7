use eyre::eyre;
use serde::{Deserialize, Serialize};

/// A mesh of the interval $[a, b]$, given by its sorted vertex coordinates.
///
/// Cell `i` spans the vertices `i` and `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalMesh {
    vertices: Vec<f64>,
}

impl IntervalMesh {
    /// Construct a mesh from vertex coordinates.
    ///
    /// Returns an error unless there are at least two vertices and the coordinates are finite
    /// and strictly increasing.
    pub fn from_vertices(vertices: Vec<f64>) -> eyre::Result<Self> {
        if vertices.len() < 2 {
            return Err(eyre!("an interval mesh needs at least two vertices"));
        }
        if vertices.iter().any(|x| !x.is_finite()) {
            return Err(eyre!("mesh vertices must be finite"));
        }
        if vertices.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(eyre!("mesh vertices must be strictly increasing"));
        }
        Ok(Self { vertices })
    }

    /// A uniform mesh of $[a, b]$ with the given number of cells.
    ///
    /// # Panics
    ///
    /// Panics if `num_cells` is zero or if `a >= b`.
    pub fn uniform(a: f64, b: f64, num_cells: usize) -> Self {
        assert!(num_cells > 0, "number of cells must be positive");
        assert!(a < b, "interval must be non-empty");
        let h = (b - a) / num_cells as f64;
        let mut vertices: Vec<_> = (0..num_cells).map(|i| a + i as f64 * h).collect();
        // Avoid round-off in the last vertex
        vertices.push(b);
        Self { vertices }
    }

    pub fn vertices(&self) -> &[f64] {
        &self.vertices
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_cells(&self) -> usize {
        self.vertices.len() - 1
    }

    /// The end points of the given cell.
    pub fn cell(&self, index: usize) -> (f64, f64) {
        (self.vertices[index], self.vertices[index + 1])
    }

    /// The two boundary vertices, each paired with its adjacent cell.
    pub fn boundary_vertices(&self) -> [(usize, usize); 2] {
        let last = self.num_vertices() - 1;
        [(0, 0), (last, last - 1)]
    }
}
