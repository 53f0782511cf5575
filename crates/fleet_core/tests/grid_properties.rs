//! Property tests for grid geometry and placement.

use std::collections::BTreeSet;

use fleet_core::entities::{Behavior, Shape};
use fleet_core::grid::{CubeCell, HexGrid};
use fleet_core::placement::shape_cells;
use fleet_core::zone::move_zone;
use fleet_test_utils::determinism::strategies::{arb_cell, arb_direction, arb_layout};
use fleet_test_utils::fixtures::{radius_board, ShipBuilder};
use proptest::prelude::*;

proptest! {
    /// Every generated cell satisfies the cube constraint.
    #[test]
    fn prop_generated_cells_sum_to_zero(layout in arb_layout()) {
        let grid = HexGrid::generate(layout).unwrap();
        prop_assert!(!grid.is_empty());
        for cell in grid.cells() {
            prop_assert_eq!(cell.q + cell.r + cell.s, 0);
        }
    }

    #[test]
    fn prop_distance_is_symmetric(a in arb_cell(10), b in arb_cell(10)) {
        prop_assert_eq!(a.hex_distance(a), 0);
        prop_assert_eq!(a.hex_distance(b), b.hex_distance(a));
        prop_assert_eq!(a.range_distance(b), a.hex_distance(b) + 1);
    }

    /// Lines run from start to end with one cell per step.
    #[test]
    fn prop_line_endpoints_and_length(a in arb_cell(8), b in arb_cell(8)) {
        let grid = HexGrid::radius(8).unwrap();
        let line = grid.line(a, b);
        prop_assert_eq!(line.first().copied(), Some(a));
        prop_assert_eq!(line.last().copied(), Some(b));
        prop_assert!(line.len() as u32 <= a.hex_distance(b) + 1);
        for pair in line.windows(2) {
            prop_assert_eq!(pair[0].hex_distance(pair[1]), 1);
        }
    }

    #[test]
    fn prop_neighbors_bounded(cell in arb_cell(6)) {
        let grid = HexGrid::radius(5).unwrap();
        let neighbors = grid.neighbors(cell);
        prop_assert!(neighbors.len() <= 6);
        prop_assert!(!neighbors.contains(&cell));
    }

    #[test]
    fn prop_step_and_back(cell in arb_cell(10), dir in arb_direction()) {
        prop_assert_eq!(cell.step(dir).step(dir.opposite()), cell);
        prop_assert_eq!(cell.hex_distance(cell.step(dir)), 1);
    }

    #[test]
    fn prop_single_shape_is_head(cell in arb_cell(4)) {
        let grid = HexGrid::radius(4).unwrap();
        prop_assert_eq!(shape_cells(&grid, Shape::Single, cell), vec![cell]);
    }

    /// HorizontalR fails exactly when the western cell is missing.
    #[test]
    fn prop_horizontal_r_fails_empty(cell in arb_cell(4)) {
        let grid = HexGrid::radius(4).unwrap();
        let west = CubeCell::new(cell.q - 1, cell.r, cell.s + 1);
        let cells = shape_cells(&grid, Shape::HorizontalR, cell);
        prop_assert_eq!(cells.is_empty(), !grid.contains(west));
    }

    /// A single-cell ship's move zone is its radius minus obstacles.
    #[test]
    fn prop_single_move_zone_is_radius(
        head in arb_cell(5),
        radius in 0u32..4,
        blocked in proptest::collection::vec(arb_cell(6), 0..8),
    ) {
        let mut board = radius_board(6);
        for (i, cell) in blocked.iter().enumerate() {
            board.add_obstacle(100 + i as u64, *cell);
        }
        let ship = ShipBuilder::new(Behavior::Player).at(head).moves(radius).build();

        let zone = move_zone(&board, &ship);
        let expected: BTreeSet<CubeCell> = board
            .grid()
            .cells_in_radius(head, radius)
            .into_iter()
            .filter(|c| !board.has_obstacle(*c))
            .collect();
        prop_assert_eq!(zone.cells, expected);
    }
}
