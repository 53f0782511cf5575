//! # Fleet Core
//!
//! Deterministic turn engine for hex-grid fleet tactics.
//!
//! This crate contains **only** game rules:
//! - No rendering or animation timing
//! - No IO (configuration arrives as data)
//! - No system randomness (every match owns a seeded RNG)
//! - No floating-point math in resolution (uses fixed-point)
//!
//! The presentation layer talks to a [`turn::Battle`] through its selection
//! API and consumes the [`turn::TurnReport`] it hands back after each turn.
//!
//! ## Crate Structure
//!
//! - [`grid`] - Cube coordinates, lines and A* pathfinding
//! - [`placement`] - Ship footprints and placement checks
//! - [`zone`] - Move/weapon zones and highlight classification
//! - [`ai`] - Enemy and ally decision policies
//! - [`movement`] - Cooperative motion tasks and the movement barrier
//! - [`turn`] - The turn resolution state machine
//! - [`config`] - Match configuration

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod board;
pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod grid;
pub mod math;
pub mod movement;
pub mod placement;
pub mod turn;
pub mod zone;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::board::Board;
    pub use crate::config::{BattleRules, GameConfig, ShipTemplate, SpawnCounts, WeaponTemplate};
    pub use crate::entities::{
        Asteroid, AsteroidSize, Behavior, EntityId, Facing, Health, Lifecycle, Shape, Ship, Spin,
        Weapon, WeaponKind,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EntityDelta, EntityKind, GameEvent};
    pub use crate::grid::{CubeCell, GridLayout, HexDirection, HexGrid};
    pub use crate::math::Fixed;
    pub use crate::turn::{Battle, BattleOutcome, TurnPhase, TurnReport};
    pub use crate::zone::{Highlight, HighlightMap, Zone, ZoneKind};
}
