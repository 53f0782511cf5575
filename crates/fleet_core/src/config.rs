//! Match configuration.
//!
//! Pure data handed to [`Battle::setup`](crate::turn::Battle::setup); the
//! engine never reaches for global tables. All structs deserialize from
//! RON. File loading is the caller's job.
//!
//! # Example RON
//!
//! ```ron
//! GameConfig(
//!     layout: Rect(width: 30, height: 25),
//!     player: ShipTemplate(
//!         name: "Vanguard",
//!         behavior: Player,
//!         health: 30,
//!         move_distance: 2,
//!         shape: HorizontalL,
//!         weapons: [WeaponTemplate(name: "Lance", damage: 4, range: 4, kind: Beam)],
//!     ),
//!     roster: [],
//!     spawn: SpawnCounts(allies: 0, enemies: 2, asteroids: 3, obstacles: 12),
//! )
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::{Behavior, EntityId, Health, Shape, Ship, Weapon, WeaponKind};
use crate::error::{GameError, Result};
use crate::grid::{CubeCell, GridLayout};

/// Stat block for one weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponTemplate {
    /// Display name.
    pub name: String,
    /// Damage per hit.
    pub damage: u32,
    /// Reach in cells.
    pub range: u32,
    /// Point or beam.
    pub kind: WeaponKind,
    /// Turns between shots (informational).
    #[serde(default)]
    pub reload: u32,
}

impl WeaponTemplate {
    /// Build a mounted weapon with no target.
    #[must_use]
    pub fn build(&self) -> Weapon {
        Weapon {
            name: self.name.clone(),
            damage: self.damage,
            range: self.range,
            kind: self.kind,
            reload: self.reload,
            shoot_cell: None,
        }
    }
}

/// Stat block for one ship class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipTemplate {
    /// Display name.
    pub name: String,
    /// Which side the class is used for.
    pub behavior: Behavior,
    /// Maximum hit points.
    pub health: u32,
    /// Movement radius.
    pub move_distance: u32,
    /// Preferred footprint.
    #[serde(default)]
    pub shape: Shape,
    /// Mounted weapons.
    #[serde(default)]
    pub weapons: Vec<WeaponTemplate>,
}

impl ShipTemplate {
    /// Fresh ship of this class at full health with no orders.
    #[must_use]
    pub fn spawn(&self, id: EntityId, head: CubeCell, shape: Shape) -> Ship {
        Ship {
            id,
            name: self.name.clone(),
            behavior: self.behavior,
            head,
            shape,
            facing: self.behavior.canonical_facing(),
            health: Health::new(self.health),
            score: 0,
            weapons: self.weapons.iter().map(WeaponTemplate::build).collect(),
            move_distance: self.move_distance,
            move_cell: None,
        }
    }
}

/// How many entities of each kind setup spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnCounts {
    /// AI allies.
    pub allies: u32,
    /// AI enemies.
    pub enemies: u32,
    /// Asteroids.
    pub asteroids: u32,
    /// Obstacles.
    pub obstacles: u32,
}

impl Default for SpawnCounts {
    fn default() -> Self {
        Self {
            allies: 1,
            enemies: 3,
            asteroids: 4,
            obstacles: 15,
        }
    }
}

/// Randomization ranges for spawned asteroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsteroidTemplate {
    /// Inclusive HP range for big asteroids.
    pub big_hp: (u32, u32),
    /// Inclusive HP range for small asteroids.
    pub small_hp: (u32, u32),
    /// Inclusive mass range in whole units.
    pub mass: (u32, u32),
    /// Percent chance a spawned asteroid is big.
    pub big_percent: u32,
}

impl Default for AsteroidTemplate {
    fn default() -> Self {
        Self {
            big_hp: (20, 40),
            small_hp: (3, 8),
            mass: (10, 50),
            big_percent: 50,
        }
    }
}

/// Resolution constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRules {
    /// Flat score bonus for hitting an asteroid that survives.
    pub asteroid_hit_bonus: i64,
    /// Most fragments a big asteroid can split into.
    pub max_fragments: u32,
    /// Interpolation frames per cell of movement.
    pub frames_per_step: u32,
}

impl Default for BattleRules {
    fn default() -> Self {
        Self {
            asteroid_hit_bonus: 5,
            max_fragments: 6,
            frames_per_step: 8,
        }
    }
}

/// Everything needed to start a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Grid layout.
    #[serde(default)]
    pub layout: GridLayout,
    /// The player's ship.
    pub player: ShipTemplate,
    /// Classes available for AI ships; matched by behavior.
    #[serde(default)]
    pub roster: Vec<ShipTemplate>,
    /// Spawn counts.
    #[serde(default)]
    pub spawn: SpawnCounts,
    /// Asteroid randomization.
    #[serde(default)]
    pub asteroids: AsteroidTemplate,
    /// Resolution constants.
    #[serde(default)]
    pub rules: BattleRules,
    /// Display colour per side, passed through to the view layer.
    #[serde(default)]
    pub palette: BTreeMap<Behavior, String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let cannon = WeaponTemplate {
            name: "Cannon".into(),
            damage: 3,
            range: 3,
            kind: WeaponKind::Point,
            reload: 1,
        };
        let lance = WeaponTemplate {
            name: "Lance".into(),
            damage: 4,
            range: 4,
            kind: WeaponKind::Beam,
            reload: 2,
        };

        Self {
            layout: GridLayout::default(),
            player: ShipTemplate {
                name: "Vanguard".into(),
                behavior: Behavior::Player,
                health: 30,
                move_distance: 2,
                shape: Shape::HorizontalL,
                weapons: vec![cannon.clone(), lance.clone()],
            },
            roster: vec![
                ShipTemplate {
                    name: "Escort".into(),
                    behavior: Behavior::Ally,
                    health: 15,
                    move_distance: 2,
                    shape: Shape::Single,
                    weapons: vec![cannon.clone()],
                },
                ShipTemplate {
                    name: "Raider".into(),
                    behavior: Behavior::Enemy,
                    health: 12,
                    move_distance: 2,
                    shape: Shape::Single,
                    weapons: vec![cannon],
                },
                ShipTemplate {
                    name: "Destroyer".into(),
                    behavior: Behavior::Enemy,
                    health: 20,
                    move_distance: 1,
                    shape: Shape::HorizontalR,
                    weapons: vec![lance],
                },
            ],
            spawn: SpawnCounts::default(),
            asteroids: AsteroidTemplate::default(),
            rules: BattleRules::default(),
            palette: BTreeMap::from([
                (Behavior::Player, "#4fc3f7".to_string()),
                (Behavior::Ally, "#81c784".to_string()),
                (Behavior::Enemy, "#e57373".to_string()),
            ]),
        }
    }
}

impl GameConfig {
    /// Parse from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron).map_err(|e| GameError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Ship classes for one side.
    pub fn templates_for(&self, behavior: Behavior) -> impl Iterator<Item = &ShipTemplate> {
        self.roster.iter().filter(move |t| t.behavior == behavior)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfiguration`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(GameError::InvalidConfiguration(msg)) };

        if self.player.behavior != Behavior::Player {
            return invalid(format!(
                "player template '{}' must have Player behavior",
                self.player.name
            ));
        }
        for template in std::iter::once(&self.player).chain(&self.roster) {
            if template.health == 0 {
                return invalid(format!("ship '{}' has zero health", template.name));
            }
        }
        if self.spawn.allies > 0 && self.templates_for(Behavior::Ally).next().is_none() {
            return invalid("allies requested but roster has no Ally class".into());
        }
        if self.spawn.enemies > 0 && self.templates_for(Behavior::Enemy).next().is_none() {
            return invalid("enemies requested but roster has no Enemy class".into());
        }
        let a = &self.asteroids;
        if a.big_hp.0 > a.big_hp.1 || a.small_hp.0 > a.small_hp.1 || a.mass.0 > a.mass.1 {
            return invalid("asteroid ranges must be (min, max)".into());
        }
        if a.big_percent > 100 {
            return invalid(format!("big_percent {} exceeds 100", a.big_percent));
        }
        if self.rules.frames_per_step == 0 {
            return invalid("frames_per_step must be positive".into());
        }
        Ok(())
    }
}
