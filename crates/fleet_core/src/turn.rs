//! Turn resolution state machine.
//!
//! A [`Battle`] sits in [`TurnPhase::Idle`] while the player plans. The
//! selection API (`select_ship`, `request_move_zone`, `commit_move`, ...)
//! only works there. [`Battle::end_turn`] then walks the phases in strict
//! order:
//!
//! ```text
//! Idle -> Enemy -> Ally -> Movement -> Attack -> Collision -> Cleanup -> Idle
//! ```
//!
//! Hosts that animate phase by phase call [`Battle::begin_turn`] and then
//! [`Battle::step_phase`] until it hands back the [`TurnReport`].
//!
//! # Determinism
//!
//! - Entities are visited in ascending id order
//! - All randomness comes from the battle's seeded [`ChaCha8Rng`]
//! - Interpolation uses fixed-point math
//!
//! Two battles built from the same config and seed and fed the same orders
//! produce the same [`Battle::state_hash`] after every turn.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ai;
use crate::board::Board;
use crate::config::{BattleRules, GameConfig, ShipTemplate};
use crate::entities::{
    Asteroid, AsteroidSize, Behavior, EntityId, EntityStorage, Facing, Health, Lifecycle, Shape,
    Ship, Spin, WeaponKind,
};
use crate::error::{GameError, Result};
use crate::events::{EntityDelta, EntityKind, GameEvent};
use crate::grid::{CubeCell, HexDirection, HexGrid};
use crate::math::{scaled_floor, Fixed};
use crate::movement::{drift_step, CancelToken, Drift, MotionTask, MovementBarrier};
use crate::placement::{can_stand, resolve_destination, shape_cells};
use crate::zone::{classify, move_zone, planned_origin, weapon_zone, HighlightMap, Markers, Zone};

/// Phases of one turn, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Waiting for player input.
    #[default]
    Idle,
    /// Enemies pick destinations and targets.
    Enemy,
    /// Allies pick destinations and targets.
    Ally,
    /// Ships and asteroids move.
    Movement,
    /// Pending shots resolve.
    Attack,
    /// Ships sharing a cell damage each other.
    Collision,
    /// Wrecks are removed and orders reset.
    Cleanup,
}

impl TurnPhase {
    /// The phase that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Idle => Self::Enemy,
            Self::Enemy => Self::Ally,
            Self::Ally => Self::Movement,
            Self::Movement => Self::Attack,
            Self::Attack => Self::Collision,
            Self::Collision => Self::Cleanup,
            Self::Cleanup => Self::Idle,
        }
    }
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    /// Every enemy is gone.
    Victory,
    /// The player's ship is gone.
    Defeat,
}

/// Everything that happened during one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    /// Turn number, starting at 1.
    pub turn: u64,
    /// Events in resolution order.
    pub events: Vec<GameEvent>,
    /// Post-turn state per entity, sorted by id. Removed entities are
    /// included once with `destroyed` set.
    pub deltas: Vec<EntityDelta>,
    /// Interpolation frames the movement phase took.
    pub movement_frames: u32,
}

/// Player-side UI state. Lives only between turns.
#[derive(Debug, Clone, Default)]
struct Selection {
    ship: Option<EntityId>,
    zone: Option<Zone>,
    hover: Option<CubeCell>,
    markers: Markers,
}

#[derive(Debug, Clone, Copy)]
struct Shot {
    damage: u32,
    range: u32,
    kind: WeaponKind,
    target: CubeCell,
}

/// One match: board, entities, RNG and turn state.
#[derive(Debug, Clone)]
pub struct Battle {
    board: Board,
    ships: EntityStorage<Ship>,
    asteroids: EntityStorage<Asteroid>,
    rng: ChaCha8Rng,
    rules: BattleRules,
    phase: TurnPhase,
    turn: u64,
    next_id: EntityId,
    selection: Selection,
    skip: CancelToken,
    events: Vec<GameEvent>,
    removed: Vec<EntityDelta>,
    movement_frames: u32,
}

impl Battle {
    /// Empty battle on `board`.
    #[must_use]
    pub fn with_board(board: Board, seed: u64, rules: BattleRules) -> Self {
        Self {
            board,
            ships: EntityStorage::new(),
            asteroids: EntityStorage::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            rules,
            phase: TurnPhase::Idle,
            turn: 0,
            next_id: 1,
            selection: Selection::default(),
            skip: CancelToken::new(),
            events: Vec::new(),
            removed: Vec::new(),
            movement_frames: 0,
        }
    }

    /// Build a match from `config`, placing everything on random free cells.
    ///
    /// The player spawns in the southern half (`r > 0`), allies at `r >= 0`
    /// and enemies in the north when there is room; otherwise anywhere free.
    pub fn setup(config: &GameConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let grid = HexGrid::generate(config.layout)?;
        let mut battle = Self::with_board(Board::new(grid), seed, config.rules);

        for _ in 0..config.spawn.obstacles {
            let cell = battle
                .random_free_cell(|_| true)
                .ok_or_else(|| GameError::InvalidConfiguration("no room for obstacles".into()))?;
            battle.add_obstacle(cell);
        }

        battle.spawn_from_template(&config.player, |c| c.r > 0)?;

        let allies: Vec<&ShipTemplate> = config.templates_for(Behavior::Ally).collect();
        for _ in 0..config.spawn.allies {
            let template = pick(&allies, &mut battle.rng)?;
            battle.spawn_from_template(template, |c| c.r >= 0)?;
        }

        let enemies: Vec<&ShipTemplate> = config.templates_for(Behavior::Enemy).collect();
        for _ in 0..config.spawn.enemies {
            let template = pick(&enemies, &mut battle.rng)?;
            battle.spawn_from_template(template, |c| c.r < 0)?;
        }

        let rocks = config.asteroids;
        for _ in 0..config.spawn.asteroids {
            let cell = battle
                .random_free_cell(|_| true)
                .ok_or_else(|| GameError::InvalidConfiguration("no room for asteroids".into()))?;
            let rng = &mut battle.rng;
            let big = rng.gen_range(0..100) < rocks.big_percent;
            let (size, hp) = if big {
                (AsteroidSize::Big, rocks.big_hp)
            } else {
                (AsteroidSize::Small, rocks.small_hp)
            };
            let asteroid = Asteroid {
                id: 0,
                cell,
                size,
                health: Health::new(rng.gen_range(hp.0..=hp.1)),
                mass: Fixed::from_num(rng.gen_range(rocks.mass.0..=rocks.mass.1)),
                direction: Some(HexDirection::ALL[rng.gen_range(0..HexDirection::ALL.len())]),
                spin: if rng.gen() { Spin::Clockwise } else { Spin::CounterClockwise },
                half_turns: 0,
            };
            battle.add_asteroid(asteroid);
        }

        tracing::info!(
            seed,
            cells = battle.board.grid().len(),
            ships = battle.ships.len(),
            asteroids = battle.asteroids.len(),
            "Battle set up"
        );
        Ok(battle)
    }

    fn spawn_from_template(
        &mut self,
        template: &ShipTemplate,
        region: impl Fn(CubeCell) -> bool,
    ) -> Result<EntityId> {
        let preferred = template.shape;
        let fits = |battle: &Self, cell: CubeCell| battle.spawn_shape(cell, preferred).is_some();

        let head = self
            .random_cell(|battle, cell| region(cell) && fits(battle, cell))
            .or_else(|| self.random_cell(fits))
            .ok_or_else(|| {
                GameError::InvalidConfiguration(format!("no room for ship '{}'", template.name))
            })?;
        let shape = self.spawn_shape(head, preferred).unwrap_or(preferred);
        Ok(self.add_ship(template.spawn(0, head, shape)))
    }

    fn spawn_shape(&self, head: CubeCell, preferred: Shape) -> Option<Shape> {
        preferred.orientations().find(|shape| {
            can_stand(&self.board, *shape, head)
                && shape_cells(self.board.grid(), *shape, head)
                    .iter()
                    .all(|cell| self.is_free(*cell))
        })
    }

    fn random_cell(&mut self, accept: impl Fn(&Self, CubeCell) -> bool) -> Option<CubeCell> {
        let candidates: Vec<CubeCell> = {
            let this: &Self = self;
            this.board.grid().cells().filter(|cell| accept(this, *cell)).collect()
        };
        candidates.choose(&mut self.rng).copied()
    }

    fn random_free_cell(&mut self, region: impl Fn(CubeCell) -> bool) -> Option<CubeCell> {
        self.random_cell(|battle, cell| region(cell) && battle.is_free(cell))
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a ship, assigning it a fresh id and running its create hook.
    pub fn add_ship(&mut self, mut ship: Ship) -> EntityId {
        let id = self.allocate_id();
        ship.id = id;
        ship.on_create();
        tracing::debug!(id, name = %ship.name, behavior = ?ship.behavior, head = %ship.head, "Ship spawned");
        self.ships.insert(id, ship);
        id
    }

    /// Add an asteroid, assigning it a fresh id.
    pub fn add_asteroid(&mut self, mut asteroid: Asteroid) -> EntityId {
        let id = self.allocate_id();
        asteroid.id = id;
        asteroid.on_create();
        self.asteroids.insert(id, asteroid);
        id
    }

    /// Place an obstacle on an open cell.
    pub fn add_obstacle(&mut self, cell: CubeCell) -> Option<EntityId> {
        if !self.board.is_open(cell) {
            return None;
        }
        let id = self.allocate_id();
        self.board.add_obstacle(id, cell);
        Some(id)
    }

    // ---- queries ----

    /// The playing field.
    #[must_use]
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// All ships.
    #[must_use]
    pub const fn ships(&self) -> &EntityStorage<Ship> {
        &self.ships
    }

    /// All asteroids.
    #[must_use]
    pub const fn asteroids(&self) -> &EntityStorage<Asteroid> {
        &self.asteroids
    }

    /// Ship by id.
    #[must_use]
    pub fn ship(&self, id: EntityId) -> Option<&Ship> {
        self.ships.get(id)
    }

    /// Mutable ship by id, for hosts that script state between turns.
    pub fn ship_mut(&mut self, id: EntityId) -> Option<&mut Ship> {
        self.ships.get_mut(id)
    }

    /// The player's ship, if it is still in play.
    #[must_use]
    pub fn player(&self) -> Option<&Ship> {
        self.ships.values().find(|s| s.behavior == Behavior::Player)
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Number of turns started so far.
    #[must_use]
    pub const fn turn(&self) -> u64 {
        self.turn
    }

    /// Resolution constants.
    #[must_use]
    pub const fn rules(&self) -> &BattleRules {
        &self.rules
    }

    /// Currently selected ship.
    #[must_use]
    pub const fn selected(&self) -> Option<EntityId> {
        self.selection.ship
    }

    /// Zone of the current selection, if one was requested.
    #[must_use]
    pub const fn zone(&self) -> Option<&Zone> {
        self.selection.zone.as_ref()
    }

    /// Committed orders of player ships.
    #[must_use]
    pub const fn markers(&self) -> &Markers {
        &self.selection.markers
    }

    /// Token that skips movement animation for the next movement phase.
    #[must_use]
    pub fn skip_token(&self) -> CancelToken {
        self.skip.clone()
    }

    /// Whether the match is decided.
    #[must_use]
    pub fn outcome(&self) -> Option<BattleOutcome> {
        if self.player().is_none() {
            Some(BattleOutcome::Defeat)
        } else if !self.ships.values().any(|s| s.behavior == Behavior::Enemy) {
            Some(BattleOutcome::Victory)
        } else {
            None
        }
    }

    fn is_free(&self, cell: CubeCell) -> bool {
        self.board.is_open(cell)
            && self.asteroids.values().all(|a| a.cell != cell)
            && self.ships_at(cell).is_empty()
    }

    fn ships_at(&self, cell: CubeCell) -> Vec<EntityId> {
        let grid = self.board.grid();
        self.ships
            .values()
            .filter(|s| !s.health.is_destroyed() && s.occupied(grid).contains(&cell))
            .map(|s| s.id)
            .collect()
    }

    fn asteroids_at(&self, cell: CubeCell) -> Vec<EntityId> {
        self.asteroids
            .values()
            .filter(|a| a.cell == cell)
            .map(|a| a.id)
            .collect()
    }

    fn living(&self, behavior: Behavior) -> Vec<EntityId> {
        self.ships
            .values()
            .filter(|s| s.behavior == behavior && !s.health.is_destroyed())
            .map(|s| s.id)
            .collect()
    }

    // ---- selection API ----

    fn ensure_idle(&self) -> Result<()> {
        if self.phase == TurnPhase::Idle {
            Ok(())
        } else {
            Err(GameError::TurnInProgress(self.phase))
        }
    }

    fn controllable(&self, id: EntityId) -> Result<&Ship> {
        self.ensure_idle()?;
        let ship = self.ships.get(id).ok_or(GameError::EntityNotFound(id))?;
        if ship.behavior != Behavior::Player {
            return Err(GameError::NotControllable(id));
        }
        Ok(ship)
    }

    /// Select a player ship. Drops any open zone.
    pub fn select_ship(&mut self, id: EntityId) -> Result<()> {
        self.controllable(id)?;
        self.selection.ship = Some(id);
        self.selection.zone = None;
        self.selection.hover = None;
        Ok(())
    }

    /// Select `id` and open its move zone.
    pub fn request_move_zone(&mut self, id: EntityId) -> Result<&Zone> {
        let zone = move_zone(&self.board, self.controllable(id)?);
        self.selection.ship = Some(id);
        let zone: &Zone = self.selection.zone.insert(zone);
        Ok(zone)
    }

    /// Select `id` and open the target zone of weapon `index`.
    ///
    /// The zone is measured from where the ship will stand after its
    /// pending move.
    pub fn request_weapon_zone(&mut self, id: EntityId, index: usize) -> Result<&Zone> {
        let ship = self.controllable(id)?;
        let weapon = ship
            .weapons
            .get(index)
            .ok_or(GameError::WeaponNotFound { ship: id, index })?;
        let origin = planned_origin(&self.board, ship);
        let zone = weapon_zone(self.board.grid(), &origin, weapon.range, weapon.kind);
        self.selection.ship = Some(id);
        let zone: &Zone = self.selection.zone.insert(zone);
        Ok(zone)
    }

    /// Set or clear the hovered cell. Off-grid cells clear the hover.
    pub fn hover(&mut self, cell: Option<CubeCell>) -> Result<()> {
        self.ensure_idle()?;
        self.selection.hover = cell.filter(|c| self.board.grid().contains(*c));
        Ok(())
    }

    /// Order `id` to move to `target` this turn.
    ///
    /// Rejects cells off the grid or outside the move zone and leaves
    /// state unchanged.
    pub fn commit_move(&mut self, id: EntityId, target: CubeCell) -> Result<()> {
        let ship = self.controllable(id)?;
        if !self.board.grid().contains(target) {
            return Err(GameError::CellNotFound(target));
        }
        let zone = move_zone(&self.board, ship);
        if !zone.contains(target) {
            tracing::info!(ship = id, %target, "Move destination unreachable");
            return Err(GameError::IllegalPlacement(target));
        }
        if let Some(ship) = self.ships.get_mut(id) {
            ship.move_cell = Some(target);
        }
        self.selection.zone = None;
        self.selection.hover = None;
        self.refresh_markers();
        tracing::debug!(ship = id, %target, "Move committed");
        Ok(())
    }

    /// Order weapon `index` of `id` to fire at `target` this turn.
    ///
    /// Rejects cells off the grid or outside the weapon zone and leaves
    /// state unchanged.
    pub fn commit_shot(&mut self, id: EntityId, index: usize, target: CubeCell) -> Result<()> {
        let ship = self.controllable(id)?;
        let weapon = ship
            .weapons
            .get(index)
            .ok_or(GameError::WeaponNotFound { ship: id, index })?;
        if !self.board.grid().contains(target) {
            return Err(GameError::CellNotFound(target));
        }
        let origin = planned_origin(&self.board, ship);
        let zone = weapon_zone(self.board.grid(), &origin, weapon.range, weapon.kind);
        if !zone.contains(target) {
            tracing::info!(ship = id, weapon = index, %target, "Target out of range");
            return Err(GameError::OutOfRange {
                cell: target,
                range: weapon.range,
            });
        }
        if let Some(weapon) = self.ships.get_mut(id).and_then(|s| s.weapons.get_mut(index)) {
            weapon.shoot_cell = Some(target);
        }
        self.selection.zone = None;
        self.selection.hover = None;
        self.refresh_markers();
        tracing::debug!(ship = id, weapon = index, %target, "Shot committed");
        Ok(())
    }

    fn refresh_markers(&mut self) {
        let markers = &mut self.selection.markers;
        markers.clear();
        for ship in self.ships.values().filter(|s| s.behavior == Behavior::Player) {
            markers.move_active.extend(ship.move_cell);
            markers
                .weapon_active
                .extend(ship.weapons.iter().filter_map(|w| w.shoot_cell));
        }
    }

    /// Display class of every cell for the current selection.
    #[must_use]
    pub fn highlights(&self) -> HighlightMap {
        classify(
            self.board.grid(),
            self.selection.zone.as_ref(),
            self.selection.hover,
            &self.selection.markers,
        )
    }

    // ---- turn resolution ----

    /// Resolve a whole turn.
    pub fn end_turn(&mut self) -> Result<TurnReport> {
        self.begin_turn()?;
        loop {
            if let Some(report) = self.step_phase() {
                return Ok(report);
            }
        }
    }

    /// Leave `Idle` and enter the enemy phase. Selection input is refused
    /// until the turn completes.
    pub fn begin_turn(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.turn += 1;
        self.phase = TurnPhase::Enemy;
        self.selection.zone = None;
        self.selection.hover = None;
        tracing::debug!(turn = self.turn, "Turn started");
        Ok(())
    }

    /// Run the current phase and advance to the next.
    ///
    /// Returns the report once cleanup finishes, `None` in between or when
    /// idle.
    pub fn step_phase(&mut self) -> Option<TurnReport> {
        match self.phase {
            TurnPhase::Idle => return None,
            TurnPhase::Enemy => self.enemy_phase(),
            TurnPhase::Ally => self.ally_phase(),
            TurnPhase::Movement => self.movement_phase(),
            TurnPhase::Attack => self.attack_phase(),
            TurnPhase::Collision => self.collision_phase(),
            TurnPhase::Cleanup => self.cleanup_phase(),
        }
        self.phase = self.phase.next();
        (self.phase == TurnPhase::Idle).then(|| self.finish_turn())
    }

    fn give_orders(&mut self, id: EntityId, destination: CubeCell, shots: Vec<Option<CubeCell>>) {
        if let Some(ship) = self.ships.get_mut(id) {
            ship.move_cell = Some(destination);
            for (weapon, shot) in ship.weapons.iter_mut().zip(shots) {
                weapon.shoot_cell = shot;
            }
            tracing::debug!(ship = id, %destination, "AI orders issued");
        }
    }

    fn enemy_phase(&mut self) {
        assert_eq!(self.phase, TurnPhase::Enemy, "enemy phase entered out of order");
        for id in self.living(Behavior::Enemy) {
            let Some(ship) = self.ships.get(id) else {
                continue;
            };
            let destination = ai::choose_move(&self.board, ship, &mut self.rng);
            let player = self
                .ships
                .values()
                .find(|s| s.behavior == Behavior::Player && !s.health.is_destroyed());
            let shots = ai::enemy_shots(&self.board, ship, destination, player, &mut self.rng);
            self.give_orders(id, destination, shots);
        }
    }

    fn ally_phase(&mut self) {
        assert_eq!(self.phase, TurnPhase::Ally, "ally phase entered out of order");
        for id in self.living(Behavior::Ally) {
            let Some(ship) = self.ships.get(id) else {
                continue;
            };
            let destination = ai::choose_move(&self.board, ship, &mut self.rng);
            let enemies: Vec<&Ship> = self
                .ships
                .values()
                .filter(|s| s.behavior == Behavior::Enemy && !s.health.is_destroyed())
                .collect();
            let shots = ai::ally_shots(&self.board, ship, destination, &enemies, &mut self.rng);
            self.give_orders(id, destination, shots);
        }
    }

    fn movement_phase(&mut self) {
        assert_eq!(self.phase, TurnPhase::Movement, "movement phase entered out of order");
        let frames = self.rules.frames_per_step;
        let mut barrier = MovementBarrier::new();
        let mut landings: BTreeMap<EntityId, (CubeCell, Shape)> = BTreeMap::new();

        for ship in self.ships.values() {
            let Some(dest) = ship.move_cell else {
                continue;
            };
            let Some((head, shape)) = resolve_destination(&self.board, ship, dest) else {
                tracing::debug!(ship = ship.id, %dest, "Destination no longer fits, holding position");
                continue;
            };
            if head == ship.head && shape == ship.shape {
                continue;
            }
            let facing = ship.behavior.canonical_facing();
            let task = MotionTask::routed(&self.board, ship.id, ship.head, head, facing, frames);
            barrier.push(task.with_cancel(self.skip.clone()));
            landings.insert(ship.id, (head, shape));
        }

        let mut lost = Vec::new();
        for asteroid in self.asteroids.values() {
            match drift_step(&self.board, asteroid) {
                Drift::Moved(next) => {
                    let facing = asteroid.direction.map_or(Facing::Up, Facing::Toward);
                    let task = MotionTask::new(asteroid.id, vec![asteroid.cell, next], facing, frames);
                    barrier.push(task.with_cancel(self.skip.clone()));
                }
                Drift::LeftGrid => lost.push(asteroid.id),
                Drift::Blocked | Drift::Stationary => {}
            }
        }
        for id in lost {
            tracing::debug!(asteroid = id, "Asteroid drifted off the grid");
            self.remove_asteroid(id);
        }

        let (outcomes, rounds) = barrier.join();
        self.movement_frames = rounds;

        for outcome in outcomes {
            let Some(arrival) = outcome.arrival() else {
                continue;
            };
            if let Some(ship) = self.ships.get_mut(outcome.id) {
                if let Some((head, shape)) = landings.get(&outcome.id) {
                    ship.head = *head;
                    ship.shape = *shape;
                }
                ship.facing = outcome.facing;
            } else if let Some(asteroid) = self.asteroids.get_mut(outcome.id) {
                asteroid.cell = arrival;
                asteroid.half_turns += asteroid.spin.sign();
            }
            self.events.push(GameEvent::EntityMoved {
                id: outcome.id,
                path: outcome.path,
                facing: outcome.facing,
            });
        }

        self.skip = CancelToken::new();
    }

    fn attack_phase(&mut self) {
        assert_eq!(self.phase, TurnPhase::Attack, "attack phase entered out of order");
        for id in self.ships.sorted_ids() {
            let Some(shooter) = self.ships.get(id) else {
                continue;
            };
            // Ships fire in id order, so a ship sunk by a lower id earlier in
            // this phase holds its queued shots.
            let armed = !shooter.health.is_destroyed();
            let origin = shooter.occupied(self.board.grid());
            let shots: Vec<Shot> = shooter
                .weapons
                .iter()
                .filter_map(|w| {
                    w.shoot_cell.map(|target| Shot {
                        damage: w.damage,
                        range: w.range,
                        kind: w.kind,
                        target,
                    })
                })
                .collect();

            if armed {
                for shot in shots {
                    self.resolve_shot(id, &origin, shot);
                }
            }

            if let Some(shooter) = self.ships.get_mut(id) {
                for weapon in &mut shooter.weapons {
                    weapon.shoot_cell = None;
                }
            }
        }
    }

    fn resolve_shot(&mut self, shooter: EntityId, origin: &[CubeCell], shot: Shot) {
        let Some(&closest) = origin
            .iter()
            .min_by_key(|cell| cell.hex_distance(shot.target))
        else {
            return;
        };
        // Same metric as the weapon zone, so every accepted target connects.
        let distance = closest.hex_distance(shot.target);
        if distance > shot.range {
            tracing::debug!(shooter, target = %shot.target, distance, range = shot.range, "Shot out of range, skipped");
            return;
        }

        let cells = match shot.kind {
            WeaponKind::Point => vec![shot.target],
            WeaponKind::Beam => {
                let mut line = self.board.grid().line(closest, shot.target);
                line.retain(|cell| *cell != closest);
                line
            }
        };
        tracing::debug!(shooter, origin = %closest, target = %shot.target, cells = cells.len(), "Shot fired");
        self.events.push(GameEvent::ShotFired {
            shooter,
            origin: closest,
            cells: cells.clone(),
            weapon: shot.kind,
        });

        let mut hit = BTreeSet::new();
        for cell in cells {
            for target in self.ships_at(cell) {
                if hit.insert(target) {
                    self.damage_ship(shooter, target, shot.damage);
                }
            }
            for target in self.asteroids_at(cell) {
                if hit.insert(target) {
                    self.damage_asteroid(shooter, target, shot.damage);
                }
            }
        }
    }

    fn damage_ship(&mut self, shooter: EntityId, target: EntityId, damage: u32) {
        if let Some(ship) = self.ships.get_mut(target) {
            ship.health.apply_damage(damage);
            tracing::debug!(shooter, target, damage, remaining = ship.health.current, "Ship hit");
        }
        let points = i64::from(damage);
        if let Some(ship) = self.ships.get_mut(shooter) {
            ship.add_score(if shooter == target { -points } else { points });
        }
    }

    fn damage_asteroid(&mut self, shooter: EntityId, target: EntityId, damage: u32) {
        let Some(asteroid) = self.asteroids.get_mut(target) else {
            return;
        };
        asteroid.health.apply_damage(damage);
        if asteroid.health.is_destroyed() {
            if let Some(parent) = self.remove_asteroid(target) {
                self.fragment(&parent);
            }
        } else if let Some(ship) = self.ships.get_mut(shooter) {
            ship.award_bonus(self.rules.asteroid_hit_bonus);
        }
    }

    fn remove_asteroid(&mut self, id: EntityId) -> Option<Asteroid> {
        let asteroid = self.asteroids.remove(id)?;
        self.events.push(asteroid.on_destroy());
        self.removed.push(EntityDelta {
            id,
            kind: EntityKind::Asteroid,
            cell: asteroid.cell,
            health: asteroid.health.current,
            score: 0,
            destroyed: true,
        });
        Some(asteroid)
    }

    /// Break a big asteroid into small ones on free neighbouring cells.
    fn fragment(&mut self, parent: &Asteroid) {
        if parent.size != AsteroidSize::Big {
            return;
        }
        let mut free: Vec<CubeCell> = self
            .board
            .grid()
            .neighbors(parent.cell)
            .into_iter()
            .filter(|cell| self.is_free(*cell))
            .collect();
        if free.is_empty() {
            return;
        }

        let wanted = self.rng.gen_range(1..=self.rules.max_fragments.max(1)) as usize;
        free.shuffle(&mut self.rng);
        free.truncate(wanted);

        let health = Health::new((parent.health.max / 10).max(1));
        let mass = scaled_floor(parent.mass, 10, Fixed::from_num(0.1));
        let children: Vec<EntityId> = free
            .into_iter()
            .map(|cell| {
                self.add_asteroid(Asteroid {
                    id: 0,
                    cell,
                    size: AsteroidSize::Small,
                    health,
                    mass,
                    direction: HexDirection::between(parent.cell, cell),
                    spin: parent.spin,
                    half_turns: 0,
                })
            })
            .collect();

        tracing::debug!(parent = parent.id, fragments = children.len(), "Asteroid fragmented");
        self.events.push(GameEvent::AsteroidFragmented {
            parent: parent.id,
            children,
        });
    }

    fn collision_phase(&mut self) {
        assert_eq!(self.phase, TurnPhase::Collision, "collision phase entered out of order");
        let grid = self.board.grid();
        let mut occupancy: BTreeMap<CubeCell, Vec<EntityId>> = BTreeMap::new();
        let mut snapshot: BTreeMap<EntityId, u32> = BTreeMap::new();
        for ship in self.ships.values().filter(|s| !s.health.is_destroyed()) {
            snapshot.insert(ship.id, ship.health.current);
            for cell in ship.occupied(grid) {
                occupancy.entry(cell).or_default().push(ship.id);
            }
        }

        let mut pairs = BTreeSet::new();
        for ids in occupancy.values() {
            for (i, first) in ids.iter().enumerate() {
                for second in &ids[i + 1..] {
                    pairs.insert((*first, *second));
                }
            }
        }

        for (first, second) in pairs {
            let first_hp = snapshot.get(&first).copied().unwrap_or(0);
            let second_hp = snapshot.get(&second).copied().unwrap_or(0);
            if let Some(ship) = self.ships.get_mut(first) {
                ship.health.apply_damage(second_hp);
            }
            if let Some(ship) = self.ships.get_mut(second) {
                ship.health.apply_damage(first_hp);
            }
            tracing::debug!(first, second, "Ships collided");
            self.events.push(GameEvent::ShipsCollided { first, second });
        }
    }

    fn cleanup_phase(&mut self) {
        assert_eq!(self.phase, TurnPhase::Cleanup, "cleanup phase entered out of order");
        for id in self.ships.sorted_ids() {
            let wrecked = self.ships.get(id).is_some_and(|s| s.health.is_destroyed());
            if !wrecked {
                continue;
            }
            if let Some(ship) = self.ships.remove(id) {
                tracing::debug!(id, name = %ship.name, "Ship destroyed");
                self.events.push(ship.on_destroy());
                self.removed.push(EntityDelta {
                    id,
                    kind: EntityKind::Ship,
                    cell: ship.head,
                    health: 0,
                    score: ship.score,
                    destroyed: true,
                });
            }
        }
        for id in self.asteroids.sorted_ids() {
            if self.asteroids.get(id).is_some_and(|a| a.health.is_destroyed()) {
                self.remove_asteroid(id);
            }
        }

        for (_, ship) in self.ships.iter_mut() {
            ship.on_turn_tick();
        }
        for (_, asteroid) in self.asteroids.iter_mut() {
            asteroid.on_turn_tick();
        }
        self.selection = Selection::default();
    }

    fn finish_turn(&mut self) -> TurnReport {
        let mut deltas: BTreeMap<EntityId, EntityDelta> = BTreeMap::new();
        for ship in self.ships.values() {
            deltas.insert(
                ship.id,
                EntityDelta {
                    id: ship.id,
                    kind: EntityKind::Ship,
                    cell: ship.head,
                    health: ship.health.current,
                    score: ship.score,
                    destroyed: false,
                },
            );
        }
        for asteroid in self.asteroids.values() {
            deltas.insert(
                asteroid.id,
                EntityDelta {
                    id: asteroid.id,
                    kind: EntityKind::Asteroid,
                    cell: asteroid.cell,
                    health: asteroid.health.current,
                    score: 0,
                    destroyed: false,
                },
            );
        }
        for delta in self.removed.drain(..) {
            deltas.insert(delta.id, delta);
        }

        let report = TurnReport {
            turn: self.turn,
            events: std::mem::take(&mut self.events),
            deltas: deltas.into_values().collect(),
            movement_frames: self.movement_frames,
        };
        tracing::info!(
            turn = report.turn,
            events = report.events.len(),
            ships = self.ships.len(),
            asteroids = self.asteroids.len(),
            "Turn resolved"
        );
        tracing::trace!(turn = self.turn, state_hash = self.state_hash(), "Battle state hash");
        report
    }

    /// Hash of everything turn resolution depends on.
    ///
    /// Two battles with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.turn.hash(&mut hasher);
        self.phase.hash(&mut hasher);

        self.ships.len().hash(&mut hasher);
        for ship in self.ships.values() {
            ship.id.hash(&mut hasher);
            ship.head.hash(&mut hasher);
            ship.shape.hash(&mut hasher);
            ship.facing.hash(&mut hasher);
            ship.health.hash(&mut hasher);
            ship.score.hash(&mut hasher);
            ship.move_cell.hash(&mut hasher);
            for weapon in &ship.weapons {
                weapon.shoot_cell.hash(&mut hasher);
            }
        }

        self.asteroids.len().hash(&mut hasher);
        for asteroid in self.asteroids.values() {
            asteroid.id.hash(&mut hasher);
            asteroid.cell.hash(&mut hasher);
            asteroid.health.hash(&mut hasher);
            asteroid.mass.to_bits().hash(&mut hasher);
            asteroid.direction.hash(&mut hasher);
            asteroid.half_turns.hash(&mut hasher);
        }

        for obstacle in self.board.obstacles() {
            obstacle.cell.hash(&mut hasher);
        }
        hasher.finish()
    }
}

fn pick<'a>(templates: &[&'a ShipTemplate], rng: &mut ChaCha8Rng) -> Result<&'a ShipTemplate> {
    templates
        .choose(rng)
        .copied()
        .ok_or_else(|| GameError::InvalidConfiguration("empty roster".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Weapon;
    use crate::zone::Highlight;

    fn weapon(kind: WeaponKind, damage: u32, range: u32) -> Weapon {
        Weapon {
            name: format!("{kind:?}"),
            damage,
            range,
            kind,
            reload: 0,
            shoot_cell: None,
        }
    }

    fn ship(behavior: Behavior, head: CubeCell, hp: u32, weapons: Vec<Weapon>) -> Ship {
        Ship {
            id: 0,
            name: format!("{behavior:?}"),
            behavior,
            head,
            shape: Shape::Single,
            facing: Facing::Up,
            health: Health::new(hp),
            score: 0,
            weapons,
            move_distance: 1,
            move_cell: None,
        }
    }

    fn battle() -> Battle {
        Battle::with_board(Board::new(HexGrid::radius(5).unwrap()), 9, BattleRules::default())
    }

    fn rock(cell: CubeCell, size: AsteroidSize, hp: u32) -> Asteroid {
        Asteroid {
            id: 0,
            cell,
            size,
            health: Health::new(hp),
            mass: Fixed::from_num(40),
            direction: None,
            spin: Spin::Clockwise,
            half_turns: 0,
        }
    }

    #[test]
    fn test_phase_order() {
        let mut phase = TurnPhase::Idle;
        let mut seen = vec![phase];
        for _ in 0..7 {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                TurnPhase::Idle,
                TurnPhase::Enemy,
                TurnPhase::Ally,
                TurnPhase::Movement,
                TurnPhase::Attack,
                TurnPhase::Collision,
                TurnPhase::Cleanup,
                TurnPhase::Idle,
            ]
        );
    }

    #[test]
    fn test_only_player_ships_take_orders() {
        let mut battle = battle();
        let enemy = battle.add_ship(ship(Behavior::Enemy, CubeCell::new(0, -3, 3), 5, vec![]));
        assert_eq!(battle.select_ship(enemy), Err(GameError::NotControllable(enemy)));
        assert_eq!(battle.select_ship(99), Err(GameError::EntityNotFound(99)));

        let player = battle.add_ship(ship(Behavior::Player, CubeCell::ORIGIN, 5, vec![]));
        assert!(battle.select_ship(player).is_ok());
        assert_eq!(battle.selected(), Some(player));
        assert_eq!(
            battle.request_weapon_zone(player, 0).unwrap_err(),
            GameError::WeaponNotFound { ship: player, index: 0 }
        );
    }

    #[test]
    fn test_rejected_move_leaves_state() {
        let mut battle = battle();
        let player = battle.add_ship(ship(Behavior::Player, CubeCell::ORIGIN, 5, vec![]));
        let before = battle.state_hash();

        let far = CubeCell::new(3, 0, -3);
        assert_eq!(battle.commit_move(player, far), Err(GameError::IllegalPlacement(far)));
        assert_eq!(battle.state_hash(), before);
        assert!(battle.markers().move_active.is_empty());
    }

    #[test]
    fn test_rejected_shot_reports_range() {
        let mut battle = battle();
        let player = battle.add_ship(ship(
            Behavior::Player,
            CubeCell::ORIGIN,
            5,
            vec![weapon(WeaponKind::Point, 2, 2)],
        ));
        let far = CubeCell::new(4, -4, 0);
        assert_eq!(
            battle.commit_shot(player, 0, far),
            Err(GameError::OutOfRange { cell: far, range: 2 })
        );
        assert_eq!(battle.ship(player).unwrap().weapons[0].shoot_cell, None);
    }

    #[test]
    fn test_sunk_ship_holds_fire() {
        let mut battle = battle();
        let first = battle.add_ship(ship(
            Behavior::Player,
            CubeCell::ORIGIN,
            10,
            vec![weapon(WeaponKind::Point, 10, 2)],
        ));
        let second_cell = CubeCell::new(1, -1, 0);
        let second = battle.add_ship(ship(
            Behavior::Player,
            second_cell,
            5,
            vec![weapon(WeaponKind::Point, 10, 2)],
        ));
        assert!(first < second);
        battle.commit_shot(first, 0, second_cell).unwrap();
        battle.commit_shot(second, 0, CubeCell::ORIGIN).unwrap();

        battle.end_turn().unwrap();

        assert!(battle.ship(second).map_or(true, |s| s.health.is_destroyed()));
        assert_eq!(battle.ship(first).unwrap().health.current, 10);
    }

    #[test]
    fn test_orders_off_grid_are_not_found() {
        let mut battle = battle();
        let player = battle.add_ship(ship(
            Behavior::Player,
            CubeCell::ORIGIN,
            5,
            vec![weapon(WeaponKind::Point, 2, 9)],
        ));
        let before = battle.state_hash();

        let off = CubeCell::new(6, -6, 0);
        assert_eq!(battle.commit_move(player, off), Err(GameError::CellNotFound(off)));
        assert_eq!(battle.commit_shot(player, 0, off), Err(GameError::CellNotFound(off)));
        assert_eq!(battle.state_hash(), before);
    }

    #[test]
    fn test_zone_and_markers_drive_highlights() {
        let mut battle = battle();
        let player = battle.add_ship(ship(Behavior::Player, CubeCell::ORIGIN, 5, vec![]));

        assert_eq!(battle.request_move_zone(player).unwrap().len(), 7);
        let dest = CubeCell::new(1, -1, 0);
        battle.hover(Some(dest)).unwrap();
        assert_eq!(battle.highlights().get(dest), Highlight::MoveHover);

        battle.commit_move(player, dest).unwrap();
        assert!(battle.zone().is_none());
        let highlights = battle.highlights();
        assert_eq!(highlights.get(dest), Highlight::MoveActive);
        assert_eq!(highlights.len(), 1);
    }

    #[test]
    fn test_turn_moves_player_and_resets_orders() {
        let mut battle = battle();
        let player = battle.add_ship(ship(Behavior::Player, CubeCell::ORIGIN, 5, vec![]));
        let dest = CubeCell::new(0, -1, 1);
        battle.commit_move(player, dest).unwrap();

        let report = battle.end_turn().unwrap();
        assert_eq!(report.turn, 1);
        assert_eq!(battle.phase(), TurnPhase::Idle);
        assert_eq!(report.movement_frames, battle.rules().frames_per_step);

        let ship = battle.ship(player).unwrap();
        assert_eq!(ship.head, dest);
        assert_eq!(ship.facing, Facing::Up);
        assert_eq!(ship.move_cell, None);
        assert!(battle.highlights().is_empty());
        assert!(report.events.iter().any(|e| matches!(
            e,
            GameEvent::EntityMoved { id, .. } if *id == player
        )));
    }

    #[test]
    fn test_selection_refused_mid_turn() {
        let mut battle = battle();
        let player = battle.add_ship(ship(Behavior::Player, CubeCell::ORIGIN, 5, vec![]));
        battle.begin_turn().unwrap();
        assert_eq!(
            battle.select_ship(player),
            Err(GameError::TurnInProgress(TurnPhase::Enemy))
        );
        assert_eq!(battle.step_phase(), None);
        assert_eq!(
            battle.hover(None),
            Err(GameError::TurnInProgress(TurnPhase::Ally))
        );
        assert_eq!(battle.begin_turn(), Err(GameError::TurnInProgress(TurnPhase::Ally)));

        let mut report = None;
        while report.is_none() {
            report = battle.step_phase();
        }
        assert_eq!(battle.phase(), TurnPhase::Idle);
        assert!(battle.select_ship(player).is_ok());
    }

    #[test]
    fn test_hit_scores_times_ten() {
        let mut battle = battle();
        let player = battle.add_ship(ship(
            Behavior::Player,
            CubeCell::ORIGIN,
            10,
            vec![weapon(WeaponKind::Point, 3, 3)],
        ));
        let mut dummy = ship(Behavior::Enemy, CubeCell::new(2, 0, -2), 10, vec![]);
        dummy.move_distance = 0;
        let dummy = battle.add_ship(dummy);

        battle.commit_shot(player, 0, CubeCell::new(2, 0, -2)).unwrap();
        let report = battle.end_turn().unwrap();

        assert_eq!(battle.ship(dummy).unwrap().health.current, 7);
        assert_eq!(battle.ship(player).unwrap().score, 30);
        assert!(!battle.ship(player).unwrap().has_pending_shots());
        assert!(report.events.iter().any(|e| matches!(e, GameEvent::ShotFired { .. })));
    }

    #[test]
    fn test_self_hit_costs_score() {
        let mut battle = battle();
        let player = battle.add_ship(ship(
            Behavior::Player,
            CubeCell::ORIGIN,
            10,
            vec![weapon(WeaponKind::Point, 3, 3)],
        ));
        battle.ship_mut(player).unwrap().score = 100;
        battle.commit_shot(player, 0, CubeCell::ORIGIN).unwrap();
        battle.end_turn().unwrap();

        let ship = battle.ship(player).unwrap();
        assert_eq!(ship.health.current, 7);
        assert_eq!(ship.score, 70);
    }

    #[test]
    fn test_surviving_asteroid_pays_flat_bonus() {
        let mut battle = battle();
        let player = battle.add_ship(ship(
            Behavior::Player,
            CubeCell::ORIGIN,
            10,
            vec![weapon(WeaponKind::Point, 3, 3)],
        ));
        let target = CubeCell::new(-2, 0, 2);
        let asteroid = battle.add_asteroid(rock(target, AsteroidSize::Small, 10));
        battle.commit_shot(player, 0, target).unwrap();
        battle.end_turn().unwrap();

        assert_eq!(battle.asteroids().get(asteroid).unwrap().health.current, 7);
        assert_eq!(battle.ship(player).unwrap().score, 5);
    }

    #[test]
    fn test_destroyed_big_asteroid_fragments() {
        let mut battle = battle();
        let player = battle.add_ship(ship(
            Behavior::Player,
            CubeCell::ORIGIN,
            10,
            vec![weapon(WeaponKind::Point, 50, 4)],
        ));
        let target = CubeCell::new(0, 2, -2);
        let parent = battle.add_asteroid(rock(target, AsteroidSize::Big, 30));
        battle.commit_shot(player, 0, target).unwrap();
        let report = battle.end_turn().unwrap();

        assert!(battle.asteroids().get(parent).is_none());
        let children = report
            .events
            .iter()
            .find_map(|e| match e {
                GameEvent::AsteroidFragmented { parent: p, children } if *p == parent => {
                    Some(children.clone())
                }
                _ => None,
            })
            .expect("parent fragments");
        assert!((1..=6).contains(&children.len()));
        for id in &children {
            let child = battle.asteroids().get(*id).unwrap();
            assert_eq!(child.size, AsteroidSize::Small);
            assert_eq!(child.health.max, 3);
            assert_eq!(child.mass, Fixed::from_num(4));
        }
        assert!(report.deltas.iter().any(|d| d.id == parent && d.destroyed));
    }

    #[test]
    fn test_small_asteroid_vanishes() {
        let mut battle = battle();
        let player = battle.add_ship(ship(
            Behavior::Player,
            CubeCell::ORIGIN,
            10,
            vec![weapon(WeaponKind::Point, 50, 4)],
        ));
        let target = CubeCell::new(0, 2, -2);
        battle.add_asteroid(rock(target, AsteroidSize::Small, 5));
        battle.commit_shot(player, 0, target).unwrap();
        let report = battle.end_turn().unwrap();

        assert!(battle.asteroids().is_empty());
        assert!(!report
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::AsteroidFragmented { .. })));
        assert_eq!(battle.ship(player).unwrap().score, 0);
    }

    #[test]
    fn test_asteroid_drifts_and_spins() {
        let mut battle = battle();
        let mut drifting = rock(CubeCell::ORIGIN, AsteroidSize::Small, 5);
        drifting.direction = Some(HexDirection::East);
        let id = battle.add_asteroid(drifting);

        let mut edge = rock(CubeCell::new(5, 0, -5), AsteroidSize::Small, 5);
        edge.direction = Some(HexDirection::East);
        let lost = battle.add_asteroid(edge);

        battle.end_turn().unwrap();
        let asteroid = battle.asteroids().get(id).unwrap();
        assert_eq!(asteroid.cell, CubeCell::new(1, 0, -1));
        assert_eq!(asteroid.half_turns, -1);
        assert!(battle.asteroids().get(lost).is_none());
    }

    #[test]
    fn test_blocked_asteroid_holds_still() {
        let mut battle = battle();
        battle.add_obstacle(CubeCell::new(1, 0, -1)).unwrap();
        let mut blocked = rock(CubeCell::ORIGIN, AsteroidSize::Small, 5);
        blocked.direction = Some(HexDirection::East);
        let id = battle.add_asteroid(blocked);

        battle.end_turn().unwrap();
        let asteroid = battle.asteroids().get(id).unwrap();
        assert_eq!(asteroid.cell, CubeCell::ORIGIN);
        assert_eq!(asteroid.half_turns, 0);
    }

    #[test]
    fn test_skip_token_finishes_in_one_round() {
        let mut battle = battle();
        let player = battle.add_ship(ship(Behavior::Player, CubeCell::ORIGIN, 5, vec![]));
        battle.commit_move(player, CubeCell::new(1, 0, -1)).unwrap();
        battle.skip_token().cancel();
        let report = battle.end_turn().unwrap();
        assert_eq!(report.movement_frames, 1);
        assert!(!battle.skip_token().is_cancelled());
    }

    #[test]
    fn test_outcome() {
        let mut battle = battle();
        assert_eq!(battle.outcome(), Some(BattleOutcome::Defeat));
        battle.add_ship(ship(Behavior::Player, CubeCell::ORIGIN, 5, vec![]));
        assert_eq!(battle.outcome(), Some(BattleOutcome::Victory));
        battle.add_ship(ship(Behavior::Enemy, CubeCell::new(0, -3, 3), 5, vec![]));
        assert_eq!(battle.outcome(), None);
    }

    #[test]
    fn test_setup_spawns_requested_counts() {
        let config = GameConfig::default();
        let battle = Battle::setup(&config, 17).unwrap();
        assert_eq!(battle.ships().len(), 5);
        assert_eq!(battle.asteroids().len(), 4);
        assert_eq!(battle.board().obstacles().count(), 15);
        assert_eq!(battle.board().grid().len(), 750);

        let player = battle.player().unwrap();
        assert_eq!(player.facing, Facing::Up);
        assert!(player.head.r > 0);
        for ship in battle.ships().values() {
            for cell in ship.occupied(battle.board().grid()) {
                assert!(!battle.board().has_obstacle(cell));
            }
        }
    }

    #[test]
    fn test_setup_rejects_overfull_board() {
        let mut config = GameConfig::default();
        config.layout = crate::grid::GridLayout::Radius(1);
        config.spawn.obstacles = 10;
        assert!(matches!(
            Battle::setup(&config, 1),
            Err(GameError::InvalidConfiguration(_))
        ));
    }
}
