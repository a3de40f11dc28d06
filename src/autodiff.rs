//! Differentiable value collections.
//!
//! An [`AdVector`] is a per-entity scalar collection that carries, alongside
//! its values, a sparse Jacobian with respect to a designated set of primary
//! unknowns. Arithmetic composes derivatives by the chain rule, so a residual
//! assembled from `AdVector` expressions arrives at the Newton solver with
//! its Jacobian already in place.
//!
//! This module stands in for the automatic-differentiation collaborator of
//! the runtime: the generated code only ever sees the operations exposed
//! here, and a different backend (e.g. a GPU-resident one) can be swapped in
//! behind the same surface.

use crate::operators::{selection_masks, Remap, Select};
use itertools::izip;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A scalar collection with a sparse Jacobian w.r.t. the primary unknowns.
///
/// Row `i` of the Jacobian holds the partial derivatives of entry `i` with
/// respect to each primary unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct AdVector {
    values: DVector<f64>,
    jacobian: CsrMatrix<f64>,
}

impl AdVector {
    /// Constructs a collection from its value vector and Jacobian.
    ///
    /// # Panics
    ///
    /// Panics if the Jacobian row count does not match the value length.
    pub fn new(values: DVector<f64>, jacobian: CsrMatrix<f64>) -> Self {
        assert!(
            values.nrows() == jacobian.nrows(),
            "AdVector: {} values but {} Jacobian rows",
            values.nrows(),
            jacobian.nrows()
        );
        Self { values, jacobian }
    }

    /// Lifts a plain collection into the primary variable: the collection
    /// whose identity is the distinguished unknown, seeded with the identity
    /// Jacobian with respect to itself.
    pub fn primary(values: DVector<f64>) -> Self {
        let n = values.nrows();
        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            coo.push(i, i, 1.0);
        }
        Self { values, jacobian: CsrMatrix::from(&coo) }
    }

    /// Lifts a plain collection into a constant with respect to
    /// `num_primary` unknowns (zero Jacobian).
    pub fn constant(values: DVector<f64>, num_primary: usize) -> Self {
        let n = values.nrows();
        Self { values, jacobian: CsrMatrix::zeros(n, num_primary) }
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    /// Number of primary unknowns the Jacobian is taken with respect to.
    pub fn num_primary(&self) -> usize {
        self.jacobian.ncols()
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn jacobian(&self) -> &CsrMatrix<f64> {
        &self.jacobian
    }

    /// Discards derivative information, keeping the plain values.
    pub fn into_values(self) -> DVector<f64> {
        self.values
    }

    /// Euclidean norm of the value vector.
    pub fn norm(&self) -> f64 {
        self.values.norm()
    }

    /// Elementwise square root; entries must be positive for the derivative
    /// to be finite.
    pub fn sqrt(&self) -> Self {
        let roots = self.values.map(f64::sqrt);
        let slope = roots.map(|r| 0.5 / r);
        Self {
            jacobian: row_scaled(&self.jacobian, &slope),
            values: roots,
        }
    }

    pub fn lt(&self, other: &AdVector) -> Vec<bool> {
        self.compare(other, |a, b| a < b)
    }

    pub fn le(&self, other: &AdVector) -> Vec<bool> {
        self.compare(other, |a, b| a <= b)
    }

    pub fn gt(&self, other: &AdVector) -> Vec<bool> {
        self.compare(other, |a, b| a > b)
    }

    pub fn ge(&self, other: &AdVector) -> Vec<bool> {
        self.compare(other, |a, b| a >= b)
    }

    fn compare(&self, other: &AdVector, op: impl Fn(f64, f64) -> bool) -> Vec<bool> {
        self.assert_compatible(other, "compare");
        izip!(self.values.iter(), other.values.iter())
            .map(|(a, b)| op(*a, *b))
            .collect()
    }

    fn assert_compatible(&self, other: &AdVector, op: &str) {
        assert!(
            self.len() == other.len() && self.num_primary() == other.num_primary(),
            "AdVector {}: incompatible operands ({} x {} vs {} x {})",
            op,
            self.len(),
            self.num_primary(),
            other.len(),
            other.num_primary()
        );
    }
}

/// Sparse matrix-vector product. `nalgebra-sparse` routes CSR-times-dense
/// through a matrix product; for the vectors used here an explicit triplet
/// accumulation is both simpler and allocation-free beyond the result.
pub(crate) fn spmv(matrix: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    assert_eq!(matrix.ncols(), x.nrows());
    let mut out = DVector::zeros(matrix.nrows());
    for (i, j, v) in matrix.triplet_iter() {
        out[i] += v * x[j];
    }
    out
}

/// Scales row `i` of the matrix by `factors[i]`, i.e. `diag(factors) * m`.
fn row_scaled(m: &CsrMatrix<f64>, factors: &DVector<f64>) -> CsrMatrix<f64> {
    assert_eq!(m.nrows(), factors.nrows());
    let mut out = m.clone();
    let (offsets, _, values) = out.csr_data_mut();
    for i in 0..factors.nrows() {
        for k in offsets[i]..offsets[i + 1] {
            values[k] *= factors[i];
        }
    }
    out
}

fn scaled(m: &CsrMatrix<f64>, factor: f64) -> CsrMatrix<f64> {
    let mut out = m.clone();
    for v in out.values_mut() {
        *v *= factor;
    }
    out
}

fn gather_rows(m: &CsrMatrix<f64>, positions: &[usize]) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(positions.len(), m.ncols());
    for (i, &p) in positions.iter().enumerate() {
        let row = m.row(p);
        for (&j, &v) in row.col_indices().iter().zip(row.values()) {
            coo.push(i, j, v);
        }
    }
    CsrMatrix::from(&coo)
}

fn scatter_rows(m: &CsrMatrix<f64>, positions: &[usize], num_rows: usize) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(num_rows, m.ncols());
    for (i, j, &v) in m.triplet_iter() {
        coo.push(positions[i], j, v);
    }
    CsrMatrix::from(&coo)
}

impl Add<&AdVector> for &AdVector {
    type Output = AdVector;

    fn add(self, rhs: &AdVector) -> AdVector {
        self.assert_compatible(rhs, "add");
        AdVector {
            values: &self.values + &rhs.values,
            jacobian: &self.jacobian + &rhs.jacobian,
        }
    }
}

impl Sub<&AdVector> for &AdVector {
    type Output = AdVector;

    fn sub(self, rhs: &AdVector) -> AdVector {
        self.assert_compatible(rhs, "sub");
        AdVector {
            values: &self.values - &rhs.values,
            jacobian: &self.jacobian - &rhs.jacobian,
        }
    }
}

/// Adding a plain collection leaves the Jacobian untouched.
impl Add<&DVector<f64>> for &AdVector {
    type Output = AdVector;

    fn add(self, rhs: &DVector<f64>) -> AdVector {
        AdVector {
            values: &self.values + rhs,
            jacobian: self.jacobian.clone(),
        }
    }
}

/// Subtracting a plain collection leaves the Jacobian untouched. This is the
/// Newton update `u - du`: the primary variable stays primary.
impl Sub<&DVector<f64>> for &AdVector {
    type Output = AdVector;

    fn sub(self, rhs: &DVector<f64>) -> AdVector {
        AdVector {
            values: &self.values - rhs,
            jacobian: self.jacobian.clone(),
        }
    }
}

impl Neg for &AdVector {
    type Output = AdVector;

    fn neg(self) -> AdVector {
        AdVector {
            values: -&self.values,
            jacobian: scaled(&self.jacobian, -1.0),
        }
    }
}

/// Product rule: `d(a*b) = diag(b) da + diag(a) db`.
impl Mul<&AdVector> for &AdVector {
    type Output = AdVector;

    fn mul(self, rhs: &AdVector) -> AdVector {
        self.assert_compatible(rhs, "mul");
        AdVector {
            values: self.values.component_mul(&rhs.values),
            jacobian: &row_scaled(&self.jacobian, &rhs.values) + &row_scaled(&rhs.jacobian, &self.values),
        }
    }
}

/// Elementwise product with a plain collection.
impl Mul<&DVector<f64>> for &AdVector {
    type Output = AdVector;

    fn mul(self, rhs: &DVector<f64>) -> AdVector {
        assert!(
            self.len() == rhs.nrows(),
            "AdVector mul: length {} does not match plain collection of {}",
            self.len(),
            rhs.nrows()
        );
        AdVector {
            values: self.values.component_mul(rhs),
            jacobian: row_scaled(&self.jacobian, rhs),
        }
    }
}

impl Mul<f64> for &AdVector {
    type Output = AdVector;

    fn mul(self, rhs: f64) -> AdVector {
        AdVector {
            values: &self.values * rhs,
            jacobian: scaled(&self.jacobian, rhs),
        }
    }
}

impl Mul<&AdVector> for f64 {
    type Output = AdVector;

    fn mul(self, rhs: &AdVector) -> AdVector {
        rhs * self
    }
}

/// Quotient rule: `d(a/b) = diag(1/b) da - diag(a/b^2) db`.
impl Div<&AdVector> for &AdVector {
    type Output = AdVector;

    fn div(self, rhs: &AdVector) -> AdVector {
        self.assert_compatible(rhs, "div");
        let reciprocal = rhs.values.map(|b| 1.0 / b);
        let ratio = self.values.component_div(&rhs.values.component_mul(&rhs.values));
        AdVector {
            values: self.values.component_div(&rhs.values),
            jacobian: &row_scaled(&self.jacobian, &reciprocal) - &row_scaled(&rhs.jacobian, &ratio),
        }
    }
}

impl Div<f64> for &AdVector {
    type Output = AdVector;

    fn div(self, rhs: f64) -> AdVector {
        self * (1.0 / rhs)
    }
}

macro_rules! forward_owned_binop {
    ($trait:ident, $method:ident, $Rhs:ty) => {
        impl $trait<$Rhs> for AdVector {
            type Output = AdVector;

            fn $method(self, rhs: $Rhs) -> AdVector {
                (&self).$method(&rhs)
            }
        }
    };
}

forward_owned_binop!(Add, add, AdVector);
forward_owned_binop!(Sub, sub, AdVector);
forward_owned_binop!(Mul, mul, AdVector);
forward_owned_binop!(Div, div, AdVector);
forward_owned_binop!(Sub, sub, DVector<f64>);

impl Select for AdVector {
    fn len(&self) -> usize {
        AdVector::len(self)
    }

    /// The derivative-preserving specialization: both branches are kept in
    /// the expression graph and the non-selected branch is annihilated per
    /// position by a 0/1 mask, so the chain rule zeroes its contribution
    /// instead of silently copying derivatives from the wrong branch.
    fn select(predicate: &[bool], if_true: &Self, if_false: &Self) -> Self {
        let (mask_true, mask_false) = selection_masks(predicate);
        &(if_true * &mask_true) + &(if_false * &mask_false)
    }
}

impl Remap for AdVector {
    fn len(&self) -> usize {
        AdVector::len(self)
    }

    fn gather(&self, positions: &[usize]) -> Self {
        AdVector {
            values: Remap::gather(&self.values, positions),
            jacobian: gather_rows(&self.jacobian, positions),
        }
    }

    fn scatter(&self, positions: &[usize], len: usize) -> Self {
        AdVector {
            values: Remap::scatter(&self.values, positions, len),
            jacobian: scatter_rows(&self.jacobian, positions, len),
        }
    }
}
