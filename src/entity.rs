//! Mesh entities, entity sets and the index-correspondence resolver.
//!
//! An entity is a single mesh element (a cell or a face) identified by a
//! nonnegative index. Collections never mix kinds: an [`EntitySet`] is
//! parameterized by its entity type, so "ordered by kind, then by index"
//! reduces to index order within each set.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A mesh element identified by a nonnegative index.
///
/// Implemented by [`Cell`] and [`Face`]. The ordering of the implementing
/// type must coincide with the ordering of its indices.
pub trait Entity: Copy + Ord + Eq + Debug {
    /// Name of the entity kind, used in diagnostics.
    const KIND: &'static str;

    fn index(&self) -> usize;
}

/// A grid cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell(pub usize);

/// A grid face.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Face(pub usize);

impl Entity for Cell {
    const KIND: &'static str = "cell";

    fn index(&self) -> usize {
        self.0
    }
}

impl Entity for Face {
    const KIND: &'static str = "face";

    fn index(&self) -> usize {
        self.0
    }
}

/// An ordered sequence of entities defining the domain of a value collection.
///
/// Canonical sets (e.g. "all cells", "all interior faces") are strictly
/// increasing by index and duplicate-free; this is validated at construction.
/// Derived sets (e.g. "first cell of each boundary face") may be unordered
/// and may repeat entities, but their element set must still be contained in
/// some canonical set for [`operator_on`](crate::operators::operator_on) to
/// apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet<E> {
    entities: Vec<E>,
    canonical: bool,
}

impl<E: Entity> EntitySet<E> {
    /// Constructs a canonical set.
    ///
    /// # Panics
    ///
    /// Panics if the entities are not strictly increasing by index. A
    /// violation indicates a defect in grid bookkeeping, not bad input.
    pub fn canonical(entities: Vec<E>) -> Self {
        for pair in entities.windows(2) {
            assert!(
                pair[0] < pair[1],
                "canonical {} set is not strictly increasing: {:?} precedes {:?}",
                E::KIND,
                pair[0],
                pair[1]
            );
        }
        Self { entities, canonical: true }
    }

    /// Constructs a derived set. No ordering or uniqueness is required.
    pub fn derived(entities: Vec<E>) -> Self {
        Self { entities, canonical: false }
    }

    /// Resolves an adjacency lookup into a derived set.
    ///
    /// # Panics
    ///
    /// Panics if any position still holds the empty sentinel. Generated code
    /// must select away sentinels (e.g. with
    /// [`trinary_if`](crate::operators::trinary_if) over an
    /// [`is_empty`] predicate) before using a lookup as a set.
    pub fn resolve(lookup: &[Option<E>]) -> Self {
        let entities = lookup
            .iter()
            .enumerate()
            .map(|(i, e)| {
                e.unwrap_or_else(|| {
                    panic!("resolve: empty {} sentinel at position {} of {}", E::KIND, i, lookup.len())
                })
            })
            .collect();
        Self::derived(entities)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn is_canonical(&self) -> bool {
        self.canonical
    }

    pub fn as_slice(&self) -> &[E] {
        &self.entities
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entities.iter()
    }
}

/// Maps an adjacency lookup to a boolean collection that is `true` wherever
/// the lookup holds the empty sentinel (a face with no cell on that side).
pub fn is_empty<E: Entity>(lookup: &[Option<E>]) -> Vec<bool> {
    lookup.iter().map(Option::is_none).collect()
}

/// Computes the index correspondence between a canonical superset and a
/// subset of its elements.
///
/// Returns `positions` with `positions.len() == subset.len()` such that
/// `subset[i] == superset[positions[i]]` for every `i`. The subset may be
/// unordered and may contain repeated elements (several positions may map to
/// the same superset position).
///
/// The algorithm tags each subset element with its original position, sorts
/// the tagged pairs and consumes them in a single linear merge against the
/// superset, so the cost is O(N + M log M) for sizes N and M.
///
/// # Panics
///
/// Panics if the superset is not canonical, or if any subset element is not
/// a member of the superset. Either violation is an internal-consistency
/// failure of the calling code.
pub fn subset_positions<E: Entity>(superset: &EntitySet<E>, subset: &EntitySet<E>) -> Vec<usize> {
    if subset.is_empty() {
        return Vec::new();
    }
    assert!(
        superset.is_canonical(),
        "subset_positions: superset of {} {}s is not canonical",
        superset.len(),
        E::KIND
    );
    let mut tagged: Vec<(E, usize)> = subset.iter().copied().zip(0..).collect();
    tagged.sort_unstable();

    let mut positions = vec![0; subset.len()];
    let mut next = 0;
    for (pos, entity) in superset.iter().enumerate() {
        while next < tagged.len() && tagged[next].0 == *entity {
            positions[tagged[next].1] = pos;
            next += 1;
        }
        if next == tagged.len() {
            break;
        }
    }
    assert!(
        next == tagged.len(),
        "subset_positions: {} of {} {}s not found in superset of {}",
        tagged.len() - next,
        subset.len(),
        E::KIND,
        superset.len()
    );
    positions
}
