//! Headless match runner.
//!
//! Plays the player's ship with the ally policy, resolves turns and emits
//! one JSON summary line per turn.

use std::io::Write;

use fleet_core::ai::autopilot;
use fleet_core::entities::EntityId;
use fleet_core::error::GameError;
use fleet_core::events::GameEvent;
use fleet_core::turn::{Battle, BattleOutcome, TurnReport};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ascii::{render_ascii, AsciiConfig};
use crate::scenario::Scenario;

/// Error type for runner operations.
#[derive(Error, Debug)]
pub enum RunError {
    /// Writing output failed.
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    /// Serializing a summary failed.
    #[error("Failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
    /// The engine rejected the match or an order.
    #[error("Game error: {0}")]
    Game(#[from] GameError),
}

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Match seed.
    pub seed: u64,
    /// Turn limit.
    pub max_turns: u64,
    /// Print an ASCII board after each turn instead of JSON.
    pub ascii: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_turns: 50,
            ascii: false,
        }
    }
}

/// Per-turn summary written as one JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSummary {
    /// Turn number.
    pub turn: u64,
    /// Shots that resolved.
    pub shots: usize,
    /// Ship collisions.
    pub collisions: usize,
    /// Entities removed this turn.
    pub destroyed: Vec<EntityId>,
    /// Interpolation frames the movement phase took.
    pub movement_frames: u32,
    /// Player hit points, `None` once the player is gone.
    pub player_health: Option<u32>,
    /// Player score.
    pub player_score: i64,
    /// State hash after the turn.
    pub state_hash: u64,
}

impl TurnSummary {
    fn from_report(report: &TurnReport, battle: &Battle) -> Self {
        let count = |pred: fn(&GameEvent) -> bool| report.events.iter().filter(|e| pred(e)).count();
        let destroyed = report
            .events
            .iter()
            .filter_map(|e| match e {
                GameEvent::EntityDestroyed { id } => Some(*id),
                _ => None,
            })
            .collect();
        let player = battle.player();

        Self {
            turn: report.turn,
            shots: count(|e| matches!(e, GameEvent::ShotFired { .. })),
            collisions: count(|e| matches!(e, GameEvent::ShipsCollided { .. })),
            destroyed,
            movement_frames: report.movement_frames,
            player_health: player.map(|p| p.health.current),
            player_score: player.map_or(0, |p| p.score),
            state_hash: battle.state_hash(),
        }
    }
}

/// Final result of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Winner, `None` if the turn limit was hit first.
    pub outcome: Option<BattleOutcome>,
    /// Turns played.
    pub turns: u64,
    /// State hash at the end.
    pub final_hash: u64,
}

/// Drives one battle.
#[derive(Debug)]
pub struct HeadlessRunner {
    battle: Battle,
    config: RunConfig,
    ascii: AsciiConfig,
}

impl HeadlessRunner {
    /// Set up the scenario's battle with `config.seed`.
    pub fn new(scenario: &Scenario, config: RunConfig) -> Result<Self, RunError> {
        let battle = Battle::setup(&scenario.config, config.seed)?;
        tracing::info!(
            scenario = %scenario.name,
            seed = config.seed,
            ships = battle.ships().len(),
            asteroids = battle.asteroids().len(),
            "Match ready"
        );
        let ascii = AsciiConfig::default().with_palette(&scenario.config.palette);
        Ok(Self {
            battle,
            config,
            ascii,
        })
    }

    /// The battle being played.
    #[must_use]
    pub const fn battle(&self) -> &Battle {
        &self.battle
    }

    /// Select the player and open its move zone so the board shows it.
    pub fn show_move_zone(&mut self) -> Result<(), RunError> {
        let Some(player) = self.battle.player().map(|p| p.id) else {
            return Ok(());
        };
        self.battle.select_ship(player)?;
        self.battle.request_move_zone(player)?;
        Ok(())
    }

    /// Give the player's orders and resolve one turn.
    ///
    /// The autopilot RNG is derived from the seed and turn number so a
    /// replay gives the same orders.
    pub fn play_turn(&mut self) -> Result<TurnReport, RunError> {
        let turn = self.battle.turn();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed ^ turn.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        autopilot(&mut self.battle, &mut rng)?;
        Ok(self.battle.end_turn()?)
    }

    /// Play until the match is decided or the turn limit is hit, writing
    /// one line (or board) per turn to `out`.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<MatchResult, RunError> {
        if self.config.ascii {
            write!(out, "{}", render_ascii(&self.battle, &self.ascii))?;
        }

        while self.battle.outcome().is_none() && self.battle.turn() < self.config.max_turns {
            let report = self.play_turn()?;
            if self.config.ascii {
                writeln!(out)?;
                write!(out, "{}", render_ascii(&self.battle, &self.ascii))?;
            } else {
                let summary = TurnSummary::from_report(&report, &self.battle);
                writeln!(out, "{}", serde_json::to_string(&summary)?)?;
            }
        }

        let result = MatchResult {
            outcome: self.battle.outcome(),
            turns: self.battle.turn(),
            final_hash: self.battle.state_hash(),
        };
        tracing::info!(outcome = ?result.outcome, turns = result.turns, "Match finished");
        Ok(result)
    }
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Whether every run ended with the same hash.
    pub is_deterministic: bool,
    /// Final hash per run.
    pub hashes: Vec<u64>,
}

/// Play the scenario `runs` times with the same seed and compare hashes.
pub fn verify(scenario: &Scenario, seed: u64, runs: u32, turns: u64) -> Result<VerifyResult, RunError> {
    let config = RunConfig {
        seed,
        max_turns: turns,
        ascii: false,
    };

    let mut hashes = Vec::with_capacity(runs as usize);
    for run in 0..runs {
        let mut runner = HeadlessRunner::new(scenario, config.clone())?;
        let result = runner.run(&mut std::io::sink())?;
        tracing::debug!(run, hash = result.final_hash, turns = result.turns, "Run complete");
        hashes.push(result.final_hash);
    }

    Ok(VerifyResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
    })
}
