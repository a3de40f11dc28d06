use undine::entity::{Cell, Face};
use undine::GridTopology;

#[test]
fn line_grid_has_one_more_face_than_cells() {
    let topology = GridTopology::line(4);
    assert_eq!(topology.num_cells(), 4);
    assert_eq!(topology.num_faces(), 5);
}

#[test]
fn line_grid_adjacency_follows_the_orientation_convention() {
    let topology = GridTopology::line(3);
    assert_eq!(topology.adjacent_cells(Face(0)), (None, Some(Cell(0))));
    assert_eq!(topology.adjacent_cells(Face(1)), (Some(Cell(0)), Some(Cell(1))));
    assert_eq!(topology.adjacent_cells(Face(3)), (Some(Cell(2)), None));
    assert!(topology.is_boundary(Face(0)));
    assert!(!topology.is_boundary(Face(2)));
    assert!(topology.is_boundary(Face(3)));
}

#[test]
fn cartesian_grid_counts_cells_and_faces() {
    let topology = GridTopology::cartesian(3, 2);
    assert_eq!(topology.num_cells(), 6);
    // 4 * 2 vertical faces plus 3 * 3 horizontal faces.
    assert_eq!(topology.num_faces(), 17);
    let boundary = (0..topology.num_faces()).filter(|&f| topology.is_boundary(Face(f))).count();
    assert_eq!(boundary, 10);
}

#[test]
fn cartesian_grid_interior_faces_connect_neighboring_cells() {
    let topology = GridTopology::cartesian(2, 2);
    // Second vertical face of the bottom row separates cells 0 and 1.
    assert_eq!(topology.adjacent_cells(Face(1)), (Some(Cell(0)), Some(Cell(1))));
    // Horizontal faces start after the 3 * 2 vertical ones; the middle row
    // separates the bottom cells from the top cells.
    assert_eq!(topology.adjacent_cells(Face(6 + 2)), (Some(Cell(0)), Some(Cell(2))));
}

#[test]
fn construction_accepts_a_valid_adjacency_table() {
    let topology = GridTopology::new(2, vec![
        (None, Some(Cell(0))),
        (Some(Cell(0)), Some(Cell(1))),
        (Some(Cell(1)), None),
    ]);
    assert_eq!(topology.num_faces(), 3);
}

#[test]
#[should_panic(expected = "has no adjacent cell")]
fn construction_rejects_detached_faces() {
    GridTopology::new(1, vec![(None, None)]);
}

#[test]
#[should_panic(expected = "references cell 3")]
fn construction_rejects_out_of_bounds_cells() {
    GridTopology::new(2, vec![(Some(Cell(3)), None)]);
}
