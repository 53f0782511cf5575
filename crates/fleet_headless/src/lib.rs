//! Headless match runner for AI-vs-AI play and CI verification.
//!
//! Loads a RON scenario, plays the player's ship with the ally policy and
//! resolves turns until the match is decided or the turn limit is hit.
//!
//! - **stdout**: one JSON turn summary per line, or ASCII boards
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Play a scenario for 20 turns
//! cargo run -p fleet_headless -- run --scenario crates/fleet_headless/scenarios/default.ron --turns 20
//!
//! # Verify determinism
//! cargo run -p fleet_headless -- verify --seed 42 --runs 5
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ascii;
pub mod runner;
pub mod scenario;
