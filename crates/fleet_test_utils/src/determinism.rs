//! Determinism testing utilities.
//!
//! Provides a harness for verifying that turn resolution produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! A seeded match must replay exactly. Sources of non-determinism include:
//!
//! - **Floating-point math**: interpolation and asteroid mass use
//!   [`fleet_core::math::Fixed`] instead.
//!
//! - **HashMap iteration order**: entities, zones and occupancy maps are
//!   all `BTreeMap`/`BTreeSet` and visited in id or coordinate order.
//!
//! - **System randomness**: AI choices and setup draw from the battle's
//!   seeded `ChaCha8Rng` only.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use fleet_core::ai::autopilot;
use fleet_core::turn::Battle;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of turns resolved per run.
    pub turns: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Turns: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `turns` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance by one step
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    turns: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for turn in 0..turns {
            step(&mut state, turn);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        turns,
    }
}

/// Play one turn: the player follows the autopilot, then the turn resolves.
///
/// The autopilot RNG is derived from `seed` and `turn` so replays agree.
/// Finished matches are left alone.
pub fn play_turn(battle: &mut Battle, seed: u64, turn: u64) {
    if battle.outcome().is_some() {
        return;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ turn.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    if let Err(err) = autopilot(battle, &mut rng) {
        tracing::warn!(turn, %err, "Autopilot failed");
    }
    if let Err(err) = battle.end_turn() {
        tracing::warn!(turn, %err, "Turn failed");
    }
}

/// Verify that two battles from the same setup stay identical over `turns`.
pub fn verify_battle_determinism<F>(setup_fn: F, seed: u64, turns: u64) -> DeterminismResult
where
    F: Fn() -> Battle,
{
    verify_determinism(
        2,
        turns,
        &setup_fn,
        |battle, turn| play_turn(battle, seed, turn),
        Battle::state_hash,
    )
}

/// Play battles on scoped threads and collect their final hashes.
///
/// Catches non-determinism that only shows up under different memory
/// layouts or scheduling.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_battles<F>(setup_fn: F, seed: u64, count: usize, turns: u64) -> DeterminismResult
where
    F: Fn() -> Battle + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..count)
            .map(|_| {
                s.spawn(|| {
                    let mut battle = setup_fn();
                    for turn in 0..turns {
                        play_turn(&mut battle, seed, turn);
                    }
                    battle.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("battle thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        turns,
    }
}

/// Compare two battles turn by turn, finding the first divergence.
///
/// Returns `None` if they agree throughout, `Some(turn)` otherwise (0 means
/// the initial states already differ).
pub fn find_first_divergence<F>(setup_fn: F, seed: u64, turns: u64) -> Option<u64>
where
    F: Fn() -> Battle,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for turn in 0..turns {
        play_turn(&mut first, seed, turn);
        play_turn(&mut second, seed, turn);
        if first.state_hash() != second.state_hash() {
            tracing::warn!(turn = turn + 1, "Battles diverged");
            return Some(turn + 1);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for grid and battle inputs.
pub mod strategies {
    use fleet_core::grid::{CubeCell, GridLayout, HexDirection};
    use proptest::prelude::*;

    /// Any cell within `radius` of the origin.
    pub fn arb_cell(radius: i32) -> impl Strategy<Value = CubeCell> {
        (-radius..=radius, -radius..=radius)
            .prop_filter("inside hexagon", move |(q, r)| (q + r).abs() <= radius)
            .prop_map(|(q, r)| CubeCell::axial(q, r))
    }

    /// A grid layout small enough for fast tests.
    pub fn arb_layout() -> impl Strategy<Value = GridLayout> {
        prop_oneof![
            (0i32..8).prop_map(GridLayout::Radius),
            (1i32..16, 1i32..16).prop_map(|(width, height)| GridLayout::Rect { width, height }),
        ]
    }

    /// One of the six directions.
    pub fn arb_direction() -> impl Strategy<Value = HexDirection> {
        prop::sample::select(HexDirection::ALL.to_vec())
    }

    /// A match seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }
}
