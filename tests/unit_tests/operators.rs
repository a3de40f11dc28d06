use matrixcompare::assert_matrix_eq;
use nalgebra::DVector;
use nalgebra_sparse::convert::serial::convert_csr_dense;
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use undine::entity::{Cell, EntitySet, Face};
use undine::operators::{broadcast, operator_on, trinary_if};
use undine::AdVector;

#[test]
fn broadcast_fills_every_position_with_the_scalar() {
    let faces = EntitySet::canonical(vec![Face(0), Face(3), Face(4)]);
    assert_eq!(broadcast(2.5, &faces), DVector::from_element(3, 2.5));
}

#[test]
fn operator_on_is_the_identity_for_matching_sets() {
    let cells = EntitySet::canonical(vec![Cell(0), Cell(1), Cell(3)]);
    let data = DVector::from_vec(vec![1.0, -2.0, 4.0]);
    assert_eq!(operator_on(&data, &cells, &cells), data);
}

#[test]
fn operator_on_extends_with_zero_fill() {
    let all = EntitySet::canonical(vec![Cell(0), Cell(1), Cell(2), Cell(3)]);
    let sub = EntitySet::canonical(vec![Cell(1), Cell(3)]);
    let data = DVector::from_vec(vec![5.0, 7.0]);
    let extended = operator_on(&data, &sub, &all);
    assert_eq!(extended, DVector::from_vec(vec![0.0, 5.0, 0.0, 7.0]));
}

#[test]
fn operator_on_restricts_by_selecting_corresponding_entries() {
    let all = EntitySet::canonical(vec![Cell(0), Cell(1), Cell(2), Cell(3)]);
    let sub = EntitySet::canonical(vec![Cell(0), Cell(2)]);
    let data = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let restricted = operator_on(&data, &all, &sub);
    assert_eq!(restricted, DVector::from_vec(vec![1.0, 3.0]));
}

#[test]
fn operator_on_restricts_to_unordered_derived_sets() {
    let all = EntitySet::canonical(vec![Cell(0), Cell(1), Cell(2), Cell(3)]);
    let derived = EntitySet::derived(vec![Cell(3), Cell(0), Cell(3)]);
    let data = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let restricted = operator_on(&data, &all, &derived);
    assert_eq!(restricted, DVector::from_vec(vec![4.0, 1.0, 4.0]));
}

#[test]
fn operator_on_remaps_adjacency_lookups() {
    let all = EntitySet::canonical(vec![Face(0), Face(1), Face(2)]);
    let sub = EntitySet::canonical(vec![Face(1)]);
    let lookup = vec![Some(Cell(4))];
    let extended = operator_on(&lookup, &sub, &all);
    assert_eq!(extended, vec![None, Some(Cell(4)), None]);
    let restricted = operator_on(&extended, &all, &sub);
    assert_eq!(restricted, lookup);
}

#[test]
fn operator_on_extends_differentiable_collections_with_zero_rows() {
    let all = EntitySet::canonical(vec![Cell(0), Cell(1), Cell(2)]);
    let sub = EntitySet::canonical(vec![Cell(0), Cell(2)]);
    let u = AdVector::primary(DVector::from_vec(vec![3.0, 4.0]));
    let extended = operator_on(&u, &sub, &all);

    assert_eq!(extended.values(), &DVector::from_vec(vec![3.0, 0.0, 4.0]));
    let jacobian = convert_csr_dense(extended.jacobian());
    let expected = nalgebra::DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    assert_matrix_eq!(jacobian, expected, comp = abs, tol = 0.0);
}

#[test]
#[should_panic(expected = "hold different entities")]
fn operator_on_rejects_equally_sized_mismatched_sets() {
    let a = EntitySet::canonical(vec![Cell(0), Cell(1)]);
    let b = EntitySet::canonical(vec![Cell(0), Cell(2)]);
    let data = DVector::from_vec(vec![1.0, 2.0]);
    operator_on(&data, &a, &b);
}

#[test]
#[should_panic(expected = "not found in superset")]
fn operator_on_rejects_non_subset_extension() {
    let to = EntitySet::canonical(vec![Cell(0), Cell(1), Cell(2)]);
    let from = EntitySet::canonical(vec![Cell(1), Cell(5)]);
    let data = DVector::from_vec(vec![1.0, 2.0]);
    operator_on(&data, &from, &to);
}

#[test]
fn trinary_if_selects_elementwise_on_plain_collections() {
    let predicate = vec![true, false, true];
    let a = DVector::from_vec(vec![1.0, 2.0, 3.0]);
    let b = DVector::from_vec(vec![-1.0, -2.0, -3.0]);
    assert_eq!(trinary_if(&predicate, &a, &b), DVector::from_vec(vec![1.0, -2.0, 3.0]));
}

#[test]
fn trinary_if_selects_on_adjacency_lookups() {
    let predicate = vec![true, false];
    let a = vec![None, Some(Cell(1))];
    let b = vec![Some(Cell(7)), Some(Cell(2))];
    assert_eq!(trinary_if(&predicate, &a, &b), vec![None, Some(Cell(2))]);
}

#[test]
#[should_panic(expected = "mismatched lengths")]
fn trinary_if_rejects_mismatched_lengths() {
    let predicate = vec![true, false];
    let a = DVector::from_vec(vec![1.0, 2.0, 3.0]);
    let b = DVector::from_vec(vec![1.0, 2.0]);
    trinary_if(&predicate, &a, &b);
}

#[test]
fn trinary_if_agrees_with_plain_selection_on_differentiable_values() {
    let predicate = vec![true, false, false, true];
    let a_plain = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let b_plain = DVector::from_vec(vec![5.0, 6.0, 7.0, 8.0]);
    let a = AdVector::primary(a_plain.clone());
    let b = AdVector::constant(b_plain.clone(), 4);

    let selected = trinary_if(&predicate, &a, &b);
    let selected_plain = trinary_if(&predicate, &a_plain, &b_plain);
    assert_eq!(selected.values(), &selected_plain);
}

#[test]
fn trinary_if_takes_each_derivative_from_the_selected_branch() {
    // Two branches with different dependencies on the same primary: the
    // derivative at each position must equal the selected branch's row, and
    // the other branch must not leak through.
    let u = AdVector::primary(DVector::from_vec(vec![2.0, 3.0]));
    let squared = &u * &u; // d/du = diag(2u)
    let tripled = &u * 3.0; // d/du = 3 I

    let selected = trinary_if(&[true, false], &squared, &tripled);
    assert_eq!(selected.values(), &DVector::from_vec(vec![4.0, 9.0]));

    let jacobian = convert_csr_dense(selected.jacobian());
    let expected = nalgebra::DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 3.0]);
    assert_matrix_eq!(jacobian, expected, comp = abs, tol = 1e-14);
}

proptest! {
    /// Restriction undoes extension exactly: positions outside the original
    /// domain carry the neutral fill and are discarded, not compared.
    #[test]
    fn operator_on_round_trip_restores_the_original_collection(
        (to_indices, from_picks, values) in btree_set(0usize..200, 1..30)
            .prop_flat_map(|to| {
                let to: Vec<_> = to.into_iter().collect();
                let len = to.len();
                (Just(to), btree_set(0..len, 1..=len))
            })
            .prop_flat_map(|(to, picks)| {
                let picks: Vec<_> = picks.into_iter().collect();
                let n = picks.len();
                (Just(to), Just(picks), vec(-1e3f64..1e3, n..=n))
            })
    ) {
        let to_set = EntitySet::canonical(to_indices.iter().copied().map(Cell).collect());
        let from_set = EntitySet::canonical(from_picks.iter().map(|&p| Cell(to_indices[p])).collect());
        let data = DVector::from_vec(values);

        let extended = operator_on(&data, &from_set, &to_set);
        let restored = operator_on(&extended, &to_set, &from_set);
        prop_assert_eq!(restored, data);
    }

    /// `operator_on(d, s, s) == d` for any canonical set and matching data.
    #[test]
    fn operator_on_identity_property(
        (indices, values) in btree_set(0usize..200, 0..30)
            .prop_flat_map(|s| {
                let s: Vec<_> = s.into_iter().collect();
                let n = s.len();
                (Just(s), vec(-1e3f64..1e3, n..=n))
            })
    ) {
        let set = EntitySet::canonical(indices.into_iter().map(Cell).collect());
        let data = DVector::from_vec(values);
        prop_assert_eq!(operator_on(&data, &set, &set), data);
    }
}
