//! Test fixtures and helpers.
//!
//! Pre-built boards, ships and battles for consistent testing.

use fleet_core::board::Board;
use fleet_core::config::{BattleRules, GameConfig, SpawnCounts};
use fleet_core::entities::{Behavior, Facing, Health, Shape, Ship, Weapon, WeaponKind};
use fleet_core::grid::{CubeCell, GridLayout, HexGrid};
use fleet_core::turn::Battle;

/// Obstacle-free hexagonal board.
///
/// # Panics
///
/// Panics on a negative radius.
#[must_use]
pub fn radius_board(radius: i32) -> Board {
    Board::new(HexGrid::radius(radius).expect("valid radius"))
}

/// Obstacle-free rectangular board centred on the origin.
///
/// # Panics
///
/// Panics on non-positive dimensions.
#[must_use]
pub fn rect_board(width: i32, height: i32) -> Board {
    Board::new(HexGrid::rect(width, height).expect("valid dimensions"))
}

/// Point weapon with no target.
#[must_use]
pub fn point(damage: u32, range: u32) -> Weapon {
    Weapon {
        name: "Cannon".into(),
        damage,
        range,
        kind: WeaponKind::Point,
        reload: 0,
        shoot_cell: None,
    }
}

/// Beam weapon with no target.
#[must_use]
pub fn beam(damage: u32, range: u32) -> Weapon {
    Weapon {
        name: "Lance".into(),
        damage,
        range,
        kind: WeaponKind::Beam,
        reload: 0,
        shoot_cell: None,
    }
}

/// Builder for test ships.
///
/// Defaults: single cell at the origin, 10 hp, move distance 1, unarmed.
#[derive(Debug, Clone)]
pub struct ShipBuilder {
    ship: Ship,
}

impl ShipBuilder {
    /// Start a ship for `behavior`.
    #[must_use]
    pub fn new(behavior: Behavior) -> Self {
        Self {
            ship: Ship {
                id: 0,
                name: format!("{behavior:?}"),
                behavior,
                head: CubeCell::ORIGIN,
                shape: Shape::Single,
                facing: Facing::Up,
                health: Health::new(10),
                score: 0,
                weapons: Vec::new(),
                move_distance: 1,
                move_cell: None,
            },
        }
    }

    /// Head cell.
    #[must_use]
    pub fn at(mut self, head: CubeCell) -> Self {
        self.ship.head = head;
        self
    }

    /// Footprint orientation.
    #[must_use]
    pub fn shape(mut self, shape: Shape) -> Self {
        self.ship.shape = shape;
        self
    }

    /// Maximum (and current) hit points.
    #[must_use]
    pub fn health(mut self, hp: u32) -> Self {
        self.ship.health = Health::new(hp);
        self
    }

    /// Movement radius.
    #[must_use]
    pub fn moves(mut self, distance: u32) -> Self {
        self.ship.move_distance = distance;
        self
    }

    /// Mount a weapon.
    #[must_use]
    pub fn weapon(mut self, weapon: Weapon) -> Self {
        self.ship.weapons.push(weapon);
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> Ship {
        self.ship
    }
}

/// Empty battle on `board` with default rules.
#[must_use]
pub fn battle_on(board: Board, seed: u64) -> Battle {
    Battle::with_board(board, seed, BattleRules::default())
}

/// Small match config: radius 6, one ally, two enemies.
#[must_use]
pub fn skirmish_config() -> GameConfig {
    GameConfig {
        layout: GridLayout::Radius(6),
        spawn: SpawnCounts {
            allies: 1,
            enemies: 2,
            asteroids: 3,
            obstacles: 6,
        },
        ..GameConfig::default()
    }
}

/// Seeded skirmish battle.
///
/// # Panics
///
/// Panics if the skirmish config no longer fits its board.
#[must_use]
pub fn skirmish(seed: u64) -> Battle {
    Battle::setup(&skirmish_config(), seed).expect("skirmish config fits")
}
