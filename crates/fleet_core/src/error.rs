//! Error types for the turn engine.
//!
//! Geometry misses (a coordinate that is not on the grid, a shape that does
//! not fit) are ordinary results and come back as `Option` or empty
//! collections. `GameError` is reserved for requests the engine refuses.

use thiserror::Error;

use crate::entities::EntityId;
use crate::grid::CubeCell;
use crate::turn::TurnPhase;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Grid dimensions or match configuration are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A coordinate lookup missed the grid.
    #[error("Cell not found: {0}")]
    CellNotFound(CubeCell),

    /// The ship cannot be placed or moved onto this cell.
    #[error("Move destination unreachable: {0}")]
    IllegalPlacement(CubeCell),

    /// The target cell lies outside the weapon's reach.
    #[error("Target {cell} is out of range (range {range})")]
    OutOfRange {
        /// Requested target.
        cell: CubeCell,
        /// Weapon range.
        range: u32,
    },

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The ship has no weapon at this index.
    #[error("Ship {ship} has no weapon {index}")]
    WeaponNotFound {
        /// Ship that was asked.
        ship: EntityId,
        /// Requested weapon slot.
        index: usize,
    },

    /// The ship is driven by AI and does not accept orders.
    #[error("Entity {0} is not controlled by the player")]
    NotControllable(EntityId),

    /// Selection input arrived while a turn is being resolved.
    #[error("Turn resolution in progress ({0:?})")]
    TurnInProgress(TurnPhase),

    /// Match configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),
}
