//! Grid topology: the face-to-adjacent-cell table the runtime operates on.
//!
//! Geometry (measures, centroids) belongs to the grid collaborator and is
//! passed into generated programs as plain value collections; the runtime
//! itself only needs connectivity.

use crate::entity::{Cell, Face};
use serde::{Deserialize, Serialize};

/// Connectivity of an unstructured grid with cells and faces.
///
/// Every face has a first and a second adjacent cell; on the domain boundary
/// exactly one of the two is absent. The orientation convention is that a
/// positive flux on a face flows from the first cell towards the second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridTopology {
    num_cells: usize,
    face_cells: Vec<(Option<Cell>, Option<Cell>)>,
}

impl GridTopology {
    /// Constructs a topology from its adjacency table.
    ///
    /// # Panics
    ///
    /// Panics if a face references a cell out of bounds or has no adjacent
    /// cell at all. Violations indicate a defective grid loader.
    pub fn new(num_cells: usize, face_cells: Vec<(Option<Cell>, Option<Cell>)>) -> Self {
        for (face, &(first, second)) in face_cells.iter().enumerate() {
            assert!(
                first.is_some() || second.is_some(),
                "GridTopology: face {} has no adjacent cell",
                face
            );
            for cell in [first, second].into_iter().flatten() {
                assert!(
                    cell.0 < num_cells,
                    "GridTopology: face {} references cell {} but the grid has {} cells",
                    face,
                    cell.0,
                    num_cells
                );
            }
        }
        Self { num_cells, face_cells }
    }

    /// A one-dimensional grid of `num_cells` cells in a row.
    ///
    /// Face `f` separates cell `f - 1` from cell `f`; faces `0` and
    /// `num_cells` are the two boundary faces.
    pub fn line(num_cells: usize) -> Self {
        assert!(num_cells > 0, "GridTopology: a line grid needs at least one cell");
        let face_cells = (0..=num_cells)
            .map(|f| {
                let first = (f > 0).then(|| Cell(f - 1));
                let second = (f < num_cells).then(|| Cell(f));
                (first, second)
            })
            .collect();
        Self { num_cells, face_cells }
    }

    /// A two-dimensional Cartesian grid of `nx` by `ny` cells.
    ///
    /// Cells are numbered row-major. Vertical faces come first (column by
    /// column within each row), horizontal faces after them, so face indices
    /// are strictly increasing in construction order.
    pub fn cartesian(nx: usize, ny: usize) -> Self {
        assert!(nx > 0 && ny > 0, "GridTopology: a Cartesian grid needs at least one cell");
        let cell = |i: usize, j: usize| Cell(j * nx + i);
        let mut face_cells = Vec::with_capacity((nx + 1) * ny + nx * (ny + 1));
        for j in 0..ny {
            for i in 0..=nx {
                let first = (i > 0).then(|| cell(i - 1, j));
                let second = (i < nx).then(|| cell(i, j));
                face_cells.push((first, second));
            }
        }
        for j in 0..=ny {
            for i in 0..nx {
                let first = (j > 0).then(|| cell(i, j - 1));
                let second = (j < ny).then(|| cell(i, j));
                face_cells.push((first, second));
            }
        }
        Self { num_cells: nx * ny, face_cells }
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn num_faces(&self) -> usize {
        self.face_cells.len()
    }

    /// The two adjacent cells of a face, in orientation order.
    pub fn adjacent_cells(&self, face: Face) -> (Option<Cell>, Option<Cell>) {
        self.face_cells[face.0]
    }

    /// Whether the face lies on the domain boundary (one adjacent cell).
    pub fn is_boundary(&self, face: Face) -> bool {
        let (first, second) = self.face_cells[face.0];
        first.is_none() || second.is_none()
    }
}
