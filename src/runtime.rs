//! The runtime facade generated programs call into.
//!
//! A [`Runtime`] owns the grid topology and the linear solver, hands out the
//! entity sets and adjacency lookups the generated call sequence starts
//! from, and forwards to the collection operators and the Newton solver.
//! The discrete gradient and divergence operators are assembled as sparse
//! matrices once per topology and applied to both plain and differentiable
//! collections.

use crate::autodiff::{spmv, AdVector};
use crate::entity::{Cell, Entity, EntitySet, Face};
use crate::newton::{newton_solve, DenseLuSolver, LinearSolver, NewtonSolution};
use crate::operators::{broadcast, operator_on, trinary_if, Remap, Select};
use crate::topology::GridTopology;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// A value collection a sparse discrete operator can be applied to.
pub trait LinearOperand: Sized {
    fn len(&self) -> usize;

    /// `matrix * x`, with the Jacobian mapped through the same matrix for
    /// differentiable collections.
    fn apply(matrix: &CsrMatrix<f64>, x: &Self) -> Self;
}

impl LinearOperand for DVector<f64> {
    fn len(&self) -> usize {
        self.nrows()
    }

    fn apply(matrix: &CsrMatrix<f64>, x: &Self) -> Self {
        spmv(matrix, x)
    }
}

impl LinearOperand for AdVector {
    fn len(&self) -> usize {
        AdVector::len(self)
    }

    fn apply(matrix: &CsrMatrix<f64>, x: &Self) -> Self {
        AdVector::new(spmv(matrix, x.values()), matrix * x.jacobian())
    }
}

/// Runtime state for one generated program: topology, discrete operators
/// and the delegated linear solver.
pub struct Runtime {
    topology: GridTopology,
    gradient_matrix: CsrMatrix<f64>,
    divergence_matrix: CsrMatrix<f64>,
    solver: Box<dyn LinearSolver>,
}

impl Runtime {
    /// Runtime over the given topology with the default dense LU solver.
    pub fn new(topology: GridTopology) -> Self {
        Self::with_solver(topology, Box::new(DenseLuSolver))
    }

    /// Runtime delegating Newton updates to an external linear solver.
    pub fn with_solver(topology: GridTopology, solver: Box<dyn LinearSolver>) -> Self {
        let gradient_matrix = build_gradient_matrix(&topology);
        let divergence_matrix = build_divergence_matrix(&topology);
        Self {
            topology,
            gradient_matrix,
            divergence_matrix,
            solver,
        }
    }

    pub fn topology(&self) -> &GridTopology {
        &self.topology
    }

    /// The canonical set of all cells.
    pub fn all_cells(&self) -> EntitySet<Cell> {
        EntitySet::canonical((0..self.topology.num_cells()).map(Cell).collect())
    }

    /// The canonical set of all faces.
    pub fn all_faces(&self) -> EntitySet<Face> {
        EntitySet::canonical((0..self.topology.num_faces()).map(Face).collect())
    }

    /// The canonical set of faces with cells on both sides.
    pub fn interior_faces(&self) -> EntitySet<Face> {
        EntitySet::canonical(
            (0..self.topology.num_faces())
                .map(Face)
                .filter(|&f| !self.topology.is_boundary(f))
                .collect(),
        )
    }

    /// The canonical set of faces on the domain boundary.
    pub fn boundary_faces(&self) -> EntitySet<Face> {
        EntitySet::canonical(
            (0..self.topology.num_faces())
                .map(Face)
                .filter(|&f| self.topology.is_boundary(f))
                .collect(),
        )
    }

    /// First adjacent cell of each face in the set; `None` marks faces with
    /// no cell on that side.
    pub fn first_cell(&self, faces: &EntitySet<Face>) -> Vec<Option<Cell>> {
        faces.iter().map(|&f| self.topology.adjacent_cells(f).0).collect()
    }

    /// Second adjacent cell of each face in the set.
    pub fn second_cell(&self, faces: &EntitySet<Face>) -> Vec<Option<Cell>> {
        faces.iter().map(|&f| self.topology.adjacent_cells(f).1).collect()
    }

    /// See [`crate::entity::is_empty`].
    pub fn is_empty<E: Entity>(&self, lookup: &[Option<E>]) -> Vec<bool> {
        crate::entity::is_empty(lookup)
    }

    /// See [`crate::operators::broadcast`].
    pub fn broadcast<E: Entity>(&self, value: f64, to_set: &EntitySet<E>) -> DVector<f64> {
        broadcast(value, to_set)
    }

    /// See [`crate::operators::operator_on`].
    pub fn operator_on<E: Entity, D: Remap>(&self, data: &D, from_set: &EntitySet<E>, to_set: &EntitySet<E>) -> D {
        operator_on(data, from_set, to_set)
    }

    /// See [`crate::operators::trinary_if`].
    pub fn trinary_if<C: Select>(&self, predicate: &[bool], if_true: &C, if_false: &C) -> C {
        trinary_if(predicate, if_true, if_false)
    }

    /// Differences of a cell collection across interior faces:
    /// `u[second] - u[first]` per interior face, in face-index order.
    ///
    /// # Panics
    ///
    /// Panics if `u` is not defined over all cells.
    pub fn gradient<F: LinearOperand>(&self, u: &F) -> F {
        assert!(
            u.len() == self.topology.num_cells(),
            "gradient: collection of length {} is not defined over all {} cells",
            u.len(),
            self.topology.num_cells()
        );
        F::apply(&self.gradient_matrix, u)
    }

    /// Signed sum of face fluxes per cell: a flux counts positively for its
    /// first cell and negatively for its second.
    ///
    /// # Panics
    ///
    /// Panics if `fluxes` is not defined over all faces.
    pub fn divergence<F: LinearOperand>(&self, fluxes: &F) -> F {
        assert!(
            fluxes.len() == self.topology.num_faces(),
            "divergence: collection of length {} is not defined over all {} faces",
            fluxes.len(),
            self.topology.num_faces()
        );
        F::apply(&self.divergence_matrix, fluxes)
    }

    /// See [`crate::newton::newton_solve`]; uses this runtime's linear
    /// solver.
    pub fn newton_solve<F>(&self, residual: F, initial_guess: &DVector<f64>) -> eyre::Result<NewtonSolution>
    where
        F: Fn(&AdVector) -> AdVector,
    {
        newton_solve(residual, initial_guess, self.solver.as_ref())
    }
}

fn build_gradient_matrix(topology: &GridTopology) -> CsrMatrix<f64> {
    let num_interior = (0..topology.num_faces())
        .filter(|&f| !topology.is_boundary(Face(f)))
        .count();
    let mut coo = CooMatrix::new(num_interior, topology.num_cells());
    let mut row = 0;
    for f in 0..topology.num_faces() {
        if let (Some(first), Some(second)) = topology.adjacent_cells(Face(f)) {
            coo.push(row, second.0, 1.0);
            coo.push(row, first.0, -1.0);
            row += 1;
        }
    }
    CsrMatrix::from(&coo)
}

fn build_divergence_matrix(topology: &GridTopology) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(topology.num_cells(), topology.num_faces());
    for f in 0..topology.num_faces() {
        let (first, second) = topology.adjacent_cells(Face(f));
        if let Some(cell) = first {
            coo.push(cell.0, f, 1.0);
        }
        if let Some(cell) = second {
            coo.push(cell.0, f, -1.0);
        }
    }
    CsrMatrix::from(&coo)
}
