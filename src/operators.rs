//! The collection-algebra operators invoked by generated code.
//!
//! [`operator_on`] reinterprets a value collection defined over one entity
//! set as defined over another (restriction or extension with neutral fill),
//! and [`trinary_if`] performs elementwise conditional selection. Both are
//! generic over the collection representation through small traits so that
//! the differentiable representation can supply derivative-preserving
//! implementations.

use crate::entity::{subset_positions, Entity, EntitySet};
use nalgebra::DVector;

/// A value collection that can be moved between entity sets by gathering or
/// scattering positions.
///
/// `scatter` must fill uncovered positions with the representation's neutral
/// element (zero for scalars, the additive identity for differentiable
/// collections, the empty sentinel for adjacency lookups).
pub trait Remap: Clone {
    fn len(&self) -> usize;

    /// Collection with entry `i` taken from `self[positions[i]]`.
    fn gather(&self, positions: &[usize]) -> Self;

    /// Collection of length `len` with `self[i]` placed at `positions[i]`
    /// and the neutral element elsewhere.
    fn scatter(&self, positions: &[usize], len: usize) -> Self;
}

impl Remap for DVector<f64> {
    fn len(&self) -> usize {
        self.nrows()
    }

    fn gather(&self, positions: &[usize]) -> Self {
        DVector::from_iterator(positions.len(), positions.iter().map(|&p| self[p]))
    }

    fn scatter(&self, positions: &[usize], len: usize) -> Self {
        let mut out = DVector::zeros(len);
        for (i, &p) in positions.iter().enumerate() {
            out[p] = self[i];
        }
        out
    }
}

impl<E: Entity> Remap for Vec<Option<E>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn gather(&self, positions: &[usize]) -> Self {
        positions.iter().map(|&p| self[p]).collect()
    }

    fn scatter(&self, positions: &[usize], len: usize) -> Self {
        let mut out = vec![None; len];
        for (i, &p) in positions.iter().enumerate() {
            out[p] = self[i];
        }
        out
    }
}

/// Broadcast form of `operator_on`: a constant collection over `to_set`.
pub fn broadcast<E: Entity>(value: f64, to_set: &EntitySet<E>) -> DVector<f64> {
    DVector::from_element(to_set.len(), value)
}

/// Reinterprets `data`, defined over `from_set`, as defined over `to_set`.
///
/// * Equal sizes: the sets must hold identical entities in identical order
///   and the data is returned unchanged.
/// * `to_set` larger: `from_set` must be a subset of `to_set`; the data is
///   extended, uncovered positions holding the neutral element.
/// * `to_set` smaller: `to_set` must be a subset of `from_set`; the
///   corresponding entries are selected.
///
/// # Panics
///
/// Panics if `data` does not match `from_set` in length, or if the subset
/// precondition of the applicable case is violated. These indicate a defect
/// in the generated program or in set bookkeeping and are not recoverable.
pub fn operator_on<E: Entity, D: Remap>(data: &D, from_set: &EntitySet<E>, to_set: &EntitySet<E>) -> D {
    assert!(
        data.len() == from_set.len(),
        "operator_on: data length {} does not match from_set of {} {}s",
        data.len(),
        from_set.len(),
        E::KIND
    );
    if to_set.len() == from_set.len() {
        assert!(
            from_set.as_slice() == to_set.as_slice(),
            "operator_on: equally sized {} sets ({}) hold different entities",
            E::KIND,
            to_set.len()
        );
        data.clone()
    } else if to_set.len() > from_set.len() {
        // Extension with neutral fill.
        let positions = subset_positions(to_set, from_set);
        data.scatter(&positions, to_set.len())
    } else {
        // Restriction.
        let positions = subset_positions(from_set, to_set);
        data.gather(&positions)
    }
}

/// A value collection supporting elementwise conditional selection.
pub trait Select: Sized {
    fn len(&self) -> usize;

    /// Entry `i` of the result is `if_true[i]` where `predicate[i]` holds
    /// and `if_false[i]` elsewhere. Lengths are already checked by
    /// [`trinary_if`].
    fn select(predicate: &[bool], if_true: &Self, if_false: &Self) -> Self;
}

impl Select for DVector<f64> {
    fn len(&self) -> usize {
        self.nrows()
    }

    fn select(predicate: &[bool], if_true: &Self, if_false: &Self) -> Self {
        DVector::from_iterator(
            predicate.len(),
            predicate
                .iter()
                .enumerate()
                .map(|(i, &p)| if p { if_true[i] } else { if_false[i] }),
        )
    }
}

impl<E: Entity> Select for Vec<Option<E>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn select(predicate: &[bool], if_true: &Self, if_false: &Self) -> Self {
        predicate
            .iter()
            .enumerate()
            .map(|(i, &p)| if p { if_true[i] } else { if_false[i] })
            .collect()
    }
}

/// Elementwise ternary selection.
///
/// For differentiable collections the selection is computed as
/// `if_true * mask_true + if_false * mask_false` with 0/1 masks, so that the
/// partial derivatives of both branches thread through the chain rule and
/// the non-selected branch contributes exactly zero at each position. A
/// naive per-element copy would let the wrong branch's derivative survive
/// once the result recombines with other differentiable values.
///
/// # Panics
///
/// Panics if the three collections differ in length.
pub fn trinary_if<C: Select>(predicate: &[bool], if_true: &C, if_false: &C) -> C {
    assert!(
        predicate.len() == Select::len(if_true) && predicate.len() == Select::len(if_false),
        "trinary_if: mismatched lengths (predicate {}, if_true {}, if_false {})",
        predicate.len(),
        Select::len(if_true),
        Select::len(if_false)
    );
    C::select(predicate, if_true, if_false)
}

/// Builds the complementary 0/1 selection masks for a predicate collection.
pub(crate) fn selection_masks(predicate: &[bool]) -> (DVector<f64>, DVector<f64>) {
    let mask_true = DVector::from_iterator(predicate.len(), predicate.iter().map(|&p| if p { 1.0 } else { 0.0 }));
    let mask_false = DVector::from_iterator(predicate.len(), predicate.iter().map(|&p| if p { 0.0 } else { 1.0 }));
    (mask_true, mask_false)
}
