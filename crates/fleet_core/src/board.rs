//! The static playing field: grid plus obstacles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::{EntityId, Obstacle};
use crate::grid::{CubeCell, HexGrid};

/// Grid and the obstacles placed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    grid: HexGrid,
    obstacles: BTreeMap<CubeCell, Obstacle>,
}

impl Board {
    /// Board with no obstacles.
    #[must_use]
    pub fn new(grid: HexGrid) -> Self {
        Self {
            grid,
            obstacles: BTreeMap::new(),
        }
    }

    /// The underlying grid.
    #[must_use]
    pub const fn grid(&self) -> &HexGrid {
        &self.grid
    }

    /// Place an obstacle. Returns `false` if the cell is off the grid or
    /// already blocked.
    pub fn add_obstacle(&mut self, id: EntityId, cell: CubeCell) -> bool {
        if !self.grid.contains(cell) || self.obstacles.contains_key(&cell) {
            return false;
        }
        self.obstacles.insert(cell, Obstacle { id, cell });
        true
    }

    /// Whether an obstacle sits on `cell`.
    #[must_use]
    pub fn has_obstacle(&self, cell: CubeCell) -> bool {
        self.obstacles.contains_key(&cell)
    }

    /// Whether `cell` exists and is not blocked.
    #[must_use]
    pub fn is_open(&self, cell: CubeCell) -> bool {
        self.grid.contains(cell) && !self.has_obstacle(cell)
    }

    /// All obstacles in cell order.
    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obstacle_blocks_cell() {
        let mut board = Board::new(HexGrid::radius(2).unwrap());
        let cell = CubeCell::new(1, 0, -1);
        assert!(board.is_open(cell));
        assert!(board.add_obstacle(10, cell));
        assert!(!board.add_obstacle(11, cell));
        assert!(board.has_obstacle(cell));
        assert!(!board.is_open(cell));
        assert_eq!(board.obstacles().count(), 1);
    }

    #[test]
    fn test_obstacle_off_grid_rejected() {
        let mut board = Board::new(HexGrid::radius(1).unwrap());
        assert!(!board.add_obstacle(1, CubeCell::new(5, 0, -5)));
        assert!(!board.is_open(CubeCell::new(5, 0, -5)));
    }
}
