//! Entity records mutated by the turn engine.
//!
//! Entities are plain data. They refer to their position by cell
//! coordinate, never by a handle into the grid, and are re-resolved through
//! the [`HexGrid`] whenever a phase needs their footprint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::GameEvent;
use crate::grid::{CubeCell, HexDirection, HexGrid};
use crate::math::{fixed_serde, Fixed};
use crate::placement::shape_cells;

/// Unique identifier for entities.
pub type EntityId = u64;

/// Which side drives a ship's decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Behavior {
    /// Orders come from the user through the selection API.
    Player,
    /// AI that fights alongside the player.
    Ally,
    /// AI that hunts the player.
    Enemy,
}

impl Behavior {
    /// Facing the ship returns to after moving.
    #[must_use]
    pub const fn canonical_facing(self) -> Facing {
        match self {
            Self::Player => Facing::Up,
            Self::Ally | Self::Enemy => Facing::Down,
        }
    }
}

/// Cells a ship occupies relative to its head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Shape {
    /// Head cell only.
    #[default]
    Single,
    /// Head plus the cell at `(q+1, r, s-1)`.
    HorizontalL,
    /// Head plus the cell at `(q-1, r, s+1)`.
    HorizontalR,
}

impl Shape {
    /// Every orientation, in search order.
    pub const ALL: [Self; 3] = [Self::Single, Self::HorizontalL, Self::HorizontalR];

    /// Offsets from the head, head first.
    #[must_use]
    pub fn offsets(self) -> &'static [CubeCell] {
        const SINGLE: [CubeCell; 1] = [CubeCell::ORIGIN];
        const LEFT: [CubeCell; 2] = [CubeCell::ORIGIN, CubeCell::axial(1, 0)];
        const RIGHT: [CubeCell; 2] = [CubeCell::ORIGIN, CubeCell::axial(-1, 0)];
        match self {
            Self::Single => &SINGLE,
            Self::HorizontalL => &LEFT,
            Self::HorizontalR => &RIGHT,
        }
    }

    /// Number of cells in the shape.
    #[must_use]
    pub fn size(self) -> usize {
        self.offsets().len()
    }

    /// Orientations a hull of this shape may take: `self` first, then the
    /// others with the same number of cells.
    pub fn orientations(self) -> impl Iterator<Item = Self> {
        std::iter::once(self).chain(
            Self::ALL
                .into_iter()
                .filter(move |shape| *shape != self && shape.size() == self.size()),
        )
    }
}

/// Which way a ship's sprite points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    /// Toward negative `r`.
    Up,
    /// Toward positive `r`.
    Down,
    /// Along a direction of travel.
    Toward(HexDirection),
}

/// Hit points, clamped to `0..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points.
    pub current: u32,
    /// Maximum hit points.
    pub max: u32,
}

impl Health {
    /// Full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Subtract damage, saturating at zero.
    pub fn apply_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    /// Whether the entity is out of hit points.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.current == 0
    }
}

/// How a weapon's effect spreads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    /// Hits the target cell only.
    Point,
    /// Hits every cell on the line from the shooter to the target.
    Beam,
}

/// A weapon mounted on one ship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    /// Display name.
    pub name: String,
    /// Damage per hit.
    pub damage: u32,
    /// Reach in cells.
    pub range: u32,
    /// Point or beam.
    pub kind: WeaponKind,
    /// Turns between shots. Carried as data; resolution never reads it.
    #[serde(default)]
    pub reload: u32,
    /// Target chosen for this turn.
    #[serde(skip)]
    pub shoot_cell: Option<CubeCell>,
}

/// Scoring multiplier applied by [`Ship::add_score`].
pub const SCORE_MULTIPLIER: i64 = 10;

/// A ship on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    /// Unique id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Controller strategy.
    pub behavior: Behavior,
    /// Head cell; the shape hangs off it.
    pub head: CubeCell,
    /// Footprint orientation.
    pub shape: Shape,
    /// Current facing.
    pub facing: Facing,
    /// Hit points.
    pub health: Health,
    /// Net score, never negative.
    pub score: i64,
    /// Mounted weapons.
    pub weapons: Vec<Weapon>,
    /// Movement radius per turn.
    pub move_distance: u32,
    /// Destination chosen for this turn.
    pub move_cell: Option<CubeCell>,
}

impl Ship {
    /// Cells occupied at the current head.
    #[must_use]
    pub fn occupied(&self, grid: &HexGrid) -> Vec<CubeCell> {
        shape_cells(grid, self.shape, self.head)
    }

    /// Add `points` scaled by [`SCORE_MULTIPLIER`]. Negative points
    /// subtract, stopping at zero.
    pub fn add_score(&mut self, points: i64) {
        self.score = (self.score + points * SCORE_MULTIPLIER).max(0);
    }

    /// Add a flat bonus without the multiplier.
    pub fn award_bonus(&mut self, points: i64) {
        self.score = (self.score + points).max(0);
    }

    /// Whether any weapon has a target this turn.
    #[must_use]
    pub fn has_pending_shots(&self) -> bool {
        self.weapons.iter().any(|w| w.shoot_cell.is_some())
    }
}

/// Asteroid size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsteroidSize {
    /// Breaks into small asteroids when destroyed.
    Big,
    /// Vanishes when destroyed.
    Small,
}

/// Rotation sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spin {
    /// Negative half turns.
    Clockwise,
    /// Positive half turns.
    CounterClockwise,
}

impl Spin {
    /// Signed half-turn step.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Clockwise => -1,
            Self::CounterClockwise => 1,
        }
    }
}

/// A drifting asteroid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asteroid {
    /// Unique id.
    pub id: EntityId,
    /// Occupied cell.
    pub cell: CubeCell,
    /// Size class.
    pub size: AsteroidSize,
    /// Hit points.
    pub health: Health,
    /// Mass.
    #[serde(with = "fixed_serde")]
    pub mass: Fixed,
    /// Drift direction, `None` for a stationary rock.
    pub direction: Option<HexDirection>,
    /// Rotation sense.
    pub spin: Spin,
    /// Accumulated signed half turns.
    pub half_turns: i64,
}

/// A static blocker occupying one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Obstacle {
    /// Unique id.
    pub id: EntityId,
    /// Blocked cell.
    pub cell: CubeCell,
}

/// Explicit lifecycle hooks driven by the turn engine.
pub trait Lifecycle {
    /// Called once when the entity joins the match.
    fn on_create(&mut self) {}

    /// Called during cleanup at the end of every turn.
    fn on_turn_tick(&mut self) {}

    /// Called when the entity leaves the match.
    fn on_destroy(&self) -> GameEvent;
}

impl Lifecycle for Ship {
    fn on_create(&mut self) {
        self.facing = self.behavior.canonical_facing();
        self.health.current = self.health.current.min(self.health.max);
    }

    fn on_turn_tick(&mut self) {
        self.move_cell = None;
        for weapon in &mut self.weapons {
            weapon.shoot_cell = None;
        }
    }

    fn on_destroy(&self) -> GameEvent {
        GameEvent::EntityDestroyed { id: self.id }
    }
}

impl Lifecycle for Asteroid {
    fn on_destroy(&self) -> GameEvent {
        GameEvent::EntityDestroyed { id: self.id }
    }
}

/// Storage for one kind of entity.
///
/// Iteration through [`sorted_ids`](Self::sorted_ids) is in ascending id
/// order so every phase visits entities deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStorage<T> {
    entities: BTreeMap<EntityId, T>,
}

impl<T> Default for EntityStorage<T> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }
}

impl<T> EntityStorage<T> {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity under `id`.
    pub fn insert(&mut self, id: EntityId, entity: T) {
        self.entities.insert(id, entity);
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity IDs in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Iterate in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &T)> {
        self.entities.iter()
    }

    /// Iterate mutably in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&EntityId, &mut T)> {
        self.entities.iter_mut()
    }

    /// All entities in ascending id order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }
}
