//! Ship footprint and placement validation.
//!
//! Placement failures are answers, not errors: an impossible footprint is an
//! empty cell list and an illegal stand is `false`.

use crate::board::Board;
use crate::entities::{Shape, Ship};
use crate::grid::{CubeCell, HexGrid};

/// Cells a ship of `shape` occupies with its head at `head`.
///
/// Empty when any required cell is missing from the grid.
#[must_use]
pub fn shape_cells(grid: &HexGrid, shape: Shape, head: CubeCell) -> Vec<CubeCell> {
    let cells: Vec<CubeCell> = shape.offsets().iter().map(|offset| head + *offset).collect();
    if cells.iter().all(|cell| grid.contains(*cell)) {
        cells
    } else {
        Vec::new()
    }
}

/// Whether a ship of `shape` can stand with its head at `head`.
#[must_use]
pub fn can_stand(board: &Board, shape: Shape, head: CubeCell) -> bool {
    if !board.is_open(head) {
        return false;
    }
    let cells = shape_cells(board.grid(), shape, head);
    !cells.is_empty() && cells.iter().all(|cell| !board.has_obstacle(*cell))
}

/// First orientation that can stand at `head`, trying `preferred` first.
///
/// Only orientations with as many cells as `preferred` are considered, so a
/// hull never changes size.
#[must_use]
pub fn fitting_shape(board: &Board, head: CubeCell, preferred: Shape) -> Option<Shape> {
    preferred
        .orientations()
        .find(|shape| can_stand(board, *shape, head))
}

/// Whether the ship could stand at `head` in any of its orientations.
///
/// The search never touches `ship.shape`.
#[must_use]
pub fn can_stand_any_orientation(board: &Board, ship: &Ship, head: CubeCell) -> bool {
    fitting_shape(board, head, ship.shape).is_some()
}

/// Whether the ship's footprint can be translated so one of its cells lands
/// on `candidate`.
///
/// Each occupied cell is tried as the anchor and each orientation of the
/// same size is tried at the translated head.
#[must_use]
pub fn fits_at_candidate(board: &Board, ship: &Ship, candidate: CubeCell) -> bool {
    resolve_destination(board, ship, candidate).is_some()
}

/// Head and orientation the ship lands with when ordered onto `candidate`.
///
/// Anchors are tried in footprint order (head first), orientations with the
/// current shape first. Agrees with [`fits_at_candidate`].
#[must_use]
pub fn resolve_destination(board: &Board, ship: &Ship, candidate: CubeCell) -> Option<(CubeCell, Shape)> {
    ship.occupied(board.grid()).into_iter().find_map(|anchor| {
        let head = ship.head + (candidate - anchor);
        fitting_shape(board, head, ship.shape).map(|shape| (head, shape))
    })
}

/// Cells the ship would occupy after moving onto `candidate`, or its
/// current footprint when it cannot land there.
#[must_use]
pub fn footprint_at(board: &Board, ship: &Ship, candidate: CubeCell) -> Vec<CubeCell> {
    resolve_destination(board, ship, candidate)
        .map(|(head, shape)| shape_cells(board.grid(), shape, head))
        .filter(|cells| !cells.is_empty())
        .unwrap_or_else(|| ship.occupied(board.grid()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Behavior, Facing, Health};

    fn board() -> Board {
        Board::new(HexGrid::radius(2).unwrap())
    }

    fn ship_at(head: CubeCell, shape: Shape) -> Ship {
        Ship {
            id: 1,
            name: "Hull".into(),
            behavior: Behavior::Player,
            head,
            shape,
            facing: Facing::Up,
            health: Health::new(5),
            score: 0,
            weapons: Vec::new(),
            move_distance: 1,
            move_cell: None,
        }
    }

    #[test]
    fn test_single_shape_is_head() {
        let board = board();
        let head = CubeCell::new(1, -1, 0);
        assert_eq!(shape_cells(board.grid(), Shape::Single, head), vec![head]);
    }

    #[test]
    fn test_horizontal_shapes() {
        let board = board();
        let head = CubeCell::ORIGIN;
        assert_eq!(
            shape_cells(board.grid(), Shape::HorizontalR, head),
            vec![head, CubeCell::new(-1, 0, 1)]
        );
        assert_eq!(
            shape_cells(board.grid(), Shape::HorizontalL, head),
            vec![head, CubeCell::new(1, 0, -1)]
        );
    }

    #[test]
    fn test_shape_fails_empty_at_edge() {
        let board = board();
        let west_edge = CubeCell::new(-2, 0, 2);
        assert!(shape_cells(board.grid(), Shape::HorizontalR, west_edge).is_empty());
        assert_eq!(shape_cells(board.grid(), Shape::HorizontalL, west_edge).len(), 2);
    }

    #[test]
    fn test_can_stand_respects_obstacles() {
        let mut board = board();
        board.add_obstacle(9, CubeCell::new(-1, 0, 1));
        assert!(can_stand(&board, Shape::Single, CubeCell::ORIGIN));
        assert!(!can_stand(&board, Shape::HorizontalR, CubeCell::ORIGIN));
        assert!(can_stand(&board, Shape::HorizontalL, CubeCell::ORIGIN));
        assert!(!can_stand(&board, Shape::Single, CubeCell::new(-1, 0, 1)));
        assert!(!can_stand(&board, Shape::Single, CubeCell::new(7, 0, -7)));
    }

    #[test]
    fn test_any_orientation_leaves_shape_alone() {
        let mut board = board();
        let head = CubeCell::ORIGIN;
        board.add_obstacle(9, CubeCell::new(-1, 0, 1));
        let ship = ship_at(CubeCell::new(0, 1, -1), Shape::HorizontalR);

        assert!(can_stand_any_orientation(&board, &ship, head));
        assert_eq!(ship.shape, Shape::HorizontalR);
        assert_eq!(
            fitting_shape(&board, head, Shape::HorizontalR),
            Some(Shape::HorizontalL)
        );

        board.add_obstacle(10, head);
        assert!(!can_stand_any_orientation(&board, &ship, head));
        assert_eq!(ship.shape, Shape::HorizontalR);
    }

    #[test]
    fn test_fits_at_candidate() {
        let mut board = board();
        let ship = ship_at(CubeCell::ORIGIN, Shape::HorizontalL);

        // Head anchor lands directly on the candidate.
        assert!(fits_at_candidate(&board, &ship, CubeCell::new(2, -1, -1)));

        // Head anchor hits the obstacle, tail anchor pushes the head off the grid.
        let target = CubeCell::new(0, -2, 2);
        board.add_obstacle(20, target);
        assert!(!fits_at_candidate(&board, &ship, target));
    }

    #[test]
    fn test_resolve_destination_prefers_head_anchor() {
        let mut board = board();
        let ship = ship_at(CubeCell::ORIGIN, Shape::HorizontalL);
        let dest = CubeCell::new(0, 1, -1);
        assert_eq!(
            resolve_destination(&board, &ship, dest),
            Some((dest, Shape::HorizontalL))
        );

        // Tail cell of HorizontalL at (1,1,-2) blocked; rotate instead.
        board.add_obstacle(30, CubeCell::new(1, 1, -2));
        assert_eq!(
            resolve_destination(&board, &ship, dest),
            Some((dest, Shape::HorizontalR))
        );
        assert_eq!(
            footprint_at(&board, &ship, dest),
            vec![dest, CubeCell::new(-1, 1, 0)]
        );
    }

    #[test]
    fn test_hull_never_shrinks_to_fit() {
        let mut board = board();
        let ship = ship_at(CubeCell::ORIGIN, Shape::HorizontalL);
        let dest = CubeCell::new(0, -1, 1);
        board.add_obstacle(40, CubeCell::new(1, -1, 0));
        board.add_obstacle(41, CubeCell::new(-1, -1, 2));

        // Only a single cell would fit at `dest`.
        assert!(can_stand(&board, Shape::Single, dest));
        assert_eq!(fitting_shape(&board, dest, Shape::HorizontalL), None);
        assert_eq!(resolve_destination(&board, &ship, dest), None);
        assert!(!fits_at_candidate(&board, &ship, dest));
        assert_eq!(footprint_at(&board, &ship, dest).len(), 2);
        assert_eq!(fitting_shape(&board, dest, Shape::Single), Some(Shape::Single));
    }

    #[test]
    fn test_footprint_falls_back_to_current() {
        let board = board();
        let ship = ship_at(CubeCell::ORIGIN, Shape::Single);
        let off_grid = CubeCell::new(5, 0, -5);
        assert_eq!(footprint_at(&board, &ship, off_grid), vec![CubeCell::ORIGIN]);
    }
}
