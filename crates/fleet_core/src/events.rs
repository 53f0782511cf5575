//! Outbound events and per-entity deltas.
//!
//! The view layer consumes these to trigger effects and animation; the
//! engine never calls into rendering directly.

use serde::{Deserialize, Serialize};

use crate::entities::{EntityId, Facing, WeaponKind};
use crate::grid::CubeCell;

/// Discrete things that happened during a turn, in resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// An entity finished moving.
    EntityMoved {
        /// Entity that moved.
        id: EntityId,
        /// Cells travelled, start included.
        path: Vec<CubeCell>,
        /// Facing after arrival.
        facing: Facing,
    },
    /// A weapon resolved against its target.
    ShotFired {
        /// Firing ship.
        shooter: EntityId,
        /// Shooter cell closest to the target.
        origin: CubeCell,
        /// Cells the shot affected, in order.
        cells: Vec<CubeCell>,
        /// Weapon kind.
        weapon: WeaponKind,
    },
    /// Two ships ended up on a shared cell.
    ShipsCollided {
        /// Lower id.
        first: EntityId,
        /// Higher id.
        second: EntityId,
    },
    /// A big asteroid broke apart.
    AsteroidFragmented {
        /// Destroyed asteroid.
        parent: EntityId,
        /// Newly spawned small asteroids.
        children: Vec<EntityId>,
    },
    /// An entity left the match.
    EntityDestroyed {
        /// Removed entity.
        id: EntityId,
    },
}

/// Kind of entity a delta describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// A ship.
    Ship,
    /// An asteroid.
    Asteroid,
}

/// Post-turn state of one entity for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDelta {
    /// Entity.
    pub id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Position after the turn (last known position if destroyed).
    pub cell: CubeCell,
    /// Hit points after the turn.
    pub health: u32,
    /// Score after the turn; zero for asteroids.
    pub score: i64,
    /// Whether the entity was removed this turn.
    pub destroyed: bool,
}
