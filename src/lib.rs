//! Runtime primitives for generated finite-volume simulators.
//!
//! `undine` is the runtime layer that code generated from an equation-oriented
//! PDE description calls into. It supplies entity-indexed collections over an
//! unstructured grid, restriction/extension between such collections
//! ([`operator_on`](operators::operator_on)), differentiable elementwise
//! selection ([`trinary_if`](operators::trinary_if)) and a Newton-Raphson
//! solver ([`newton_solve`](newton::newton_solve)) that drives an
//! automatically differentiated residual to zero.
//!
//! A generated program constructs a [`Runtime`] over a [`GridTopology`],
//! builds value collections over entity sets, combines them into a residual
//! with the collection operators and hands the residual to the Newton solver.
//! Everything else (parsing, grid geometry, file I/O) belongs to the
//! surrounding toolchain, not to this crate.

pub mod autodiff;
pub mod entity;
pub mod newton;
pub mod operators;
pub mod runtime;
pub mod topology;

pub use autodiff::AdVector;
pub use entity::{is_empty, Cell, Entity, EntitySet, Face};
pub use newton::{DenseLuSolver, LinearSolver, NewtonSolution, NewtonStatus};
pub use operators::{broadcast, operator_on, trinary_if};
pub use runtime::Runtime;
pub use topology::GridTopology;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
