//! Newton-Raphson solver over differentiable collections.
//!
//! The solver drives a user-supplied residual to zero by a sequential
//! fixed-point iteration, delegating each linearized solve to a
//! [`LinearSolver`]. Tolerance and iteration cap are fixed constants of the
//! algorithm; reaching the cap is a reported outcome rather than an error,
//! so callers can still inspect and output the last iterate.

use crate::autodiff::AdVector;
use eyre::{eyre, WrapErr};
use log::{debug, info};
use nalgebra::DVector;
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::CsrMatrix;

/// Convergence threshold on the Euclidean norm of the residual.
pub const TOLERANCE: f64 = 1e-6;

/// Maximum number of Newton updates before giving up.
pub const MAX_ITERATIONS: usize = 10;

/// Solves the linear system implied by a residual's Jacobian for a Newton
/// update. Called once per iteration; a failure (singular or diverging
/// system) is fatal to the enclosing Newton run.
pub trait LinearSolver {
    fn solve(&self, jacobian: &CsrMatrix<f64>, rhs: &DVector<f64>) -> eyre::Result<DVector<f64>>;
}

/// Default solver: densifies the Jacobian and factorizes with LU.
///
/// Adequate for the moderate problem sizes the runtime is exercised on;
/// production deployments plug a sparse solver in through [`LinearSolver`].
#[derive(Debug, Clone, Default)]
pub struct DenseLuSolver;

impl LinearSolver for DenseLuSolver {
    fn solve(&self, jacobian: &CsrMatrix<f64>, rhs: &DVector<f64>) -> eyre::Result<DVector<f64>> {
        let dense = convert_csr_dense(jacobian);
        dense
            .lu()
            .solve(rhs)
            .ok_or_else(|| eyre!("Jacobian system of {} unknowns is singular", rhs.nrows()))
    }
}

/// Terminal state of a Newton run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NewtonStatus {
    Converged,
    /// The iteration cap was reached before the residual norm met the
    /// tolerance. The last iterate is still part of the solution.
    MaxIterationsReached,
}

/// Outcome of [`newton_solve`]: the plain value of the final iterate,
/// whether or not convergence was reached, plus diagnostics.
#[derive(Debug, Clone)]
pub struct NewtonSolution {
    pub u: DVector<f64>,
    pub status: NewtonStatus,
    pub iterations: usize,
    pub residual_norm: f64,
}

impl NewtonSolution {
    pub fn converged(&self) -> bool {
        self.status == NewtonStatus::Converged
    }
}

/// Attempts to solve the nonlinear equation `residual(u) = 0`.
///
/// The initial guess is lifted into the primary differentiable variable, so
/// the residual closure receives an [`AdVector`] whose Jacobian is taken
/// with respect to the unknown itself. Each iteration solves `J du = r` and
/// rebinds `u <- u - du`; the iterate is replaced wholesale, never mutated.
///
/// Returns `Err` only if the linear solver fails; non-convergence within
/// [`MAX_ITERATIONS`] is reported through [`NewtonStatus`] with the last
/// iterate attached.
///
/// # Panics
///
/// Panics if the residual's length does not match the unknown's.
pub fn newton_solve<F>(
    residual: F,
    initial_guess: &DVector<f64>,
    solver: &dyn LinearSolver,
) -> eyre::Result<NewtonSolution>
where
    F: Fn(&AdVector) -> AdVector,
{
    let mut u = AdVector::primary(initial_guess.clone());
    let mut r = residual(&u);
    assert!(
        r.len() == u.len(),
        "newton_solve: residual of length {} for unknown of length {}",
        r.len(),
        u.len()
    );
    debug!(
        "newton_solve: initial residual norm {:.3e} (tolerance {:.1e})",
        r.norm(),
        TOLERANCE
    );

    let mut iterations = 0;
    loop {
        let residual_norm = r.norm();
        if residual_norm <= TOLERANCE {
            info!("newton_solve: converged after {} iterations, residual norm {:.3e}", iterations, residual_norm);
            return Ok(NewtonSolution {
                u: u.into_values(),
                status: NewtonStatus::Converged,
                iterations,
                residual_norm,
            });
        }
        if iterations == MAX_ITERATIONS {
            info!(
                "newton_solve: no convergence within {} iterations, residual norm {:.3e}",
                MAX_ITERATIONS, residual_norm
            );
            return Ok(NewtonSolution {
                u: u.into_values(),
                status: NewtonStatus::MaxIterationsReached,
                iterations,
                residual_norm,
            });
        }

        let du = solver
            .solve(r.jacobian(), r.values())
            .wrap_err_with(|| format!("linear solve failed at Newton iteration {}", iterations))?;
        u = &u - &du;
        r = residual(&u);
        iterations += 1;
        debug!(
            "newton_solve: iteration {}/{}, residual norm {:.3e}",
            iterations,
            MAX_ITERATIONS,
            r.norm()
        );
    }
}
