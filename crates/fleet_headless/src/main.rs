//! Headless fleet battle runner.
//!
//! # Usage
//!
//! ```bash
//! # Play the built-in scenario, one JSON summary per turn
//! cargo run -p fleet_headless -- run --seed 7
//!
//! # Play a scenario file and draw the board after every turn
//! cargo run -p fleet_headless -- run --scenario scenarios/default.ron --ascii
//!
//! # Verify determinism
//! cargo run -p fleet_headless -- verify --seed 12345 --runs 5
//!
//! # Show the starting board
//! cargo run -p fleet_headless -- show --seed 7
//! ```
//!
//! Output goes to stdout, logs to stderr. `RUST_LOG` overrides `-v`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fleet_headless::{
    ascii::{render_ascii, AsciiConfig},
    runner::{verify, HeadlessRunner, RunConfig},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "fleet_headless")]
#[command(about = "Headless hex fleet battle runner for AI play and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a match with the player on autopilot
    Run {
        /// Scenario file to load (built-in default if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Match seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Turn limit
        #[arg(short, long, default_value = "50")]
        turns: u64,

        /// Draw the board after every turn instead of JSON summaries
        #[arg(long)]
        ascii: bool,
    },

    /// Verify determinism by playing the same seed multiple times
    Verify {
        /// Scenario file to load (built-in default if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Turns per run
        #[arg(short, long, default_value = "30")]
        turns: u64,
    },

    /// Print the starting board with the player's move zone
    Show {
        /// Scenario file to load (built-in default if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Match seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Use ANSI colors
        #[arg(long)]
        color: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries output
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            seed,
            turns,
            ascii,
        } => cmd_run(scenario, seed, turns, ascii),
        Commands::Verify {
            scenario,
            seed,
            runs,
            turns,
        } => cmd_verify(scenario, seed, runs, turns),
        Commands::Show {
            scenario,
            seed,
            color,
        } => cmd_show(scenario, seed, color),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(%err, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn load(path: Option<PathBuf>) -> Result<Scenario, Box<dyn std::error::Error>> {
    Ok(Scenario::load_or_default(path.as_deref())?)
}

/// Play a single match
fn cmd_run(
    scenario: Option<PathBuf>,
    seed: u64,
    turns: u64,
    ascii: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let scenario = load(scenario)?;
    let config = RunConfig {
        seed,
        max_turns: turns,
        ascii,
    };
    let mut runner = HeadlessRunner::new(&scenario, config)?;
    let stdout = std::io::stdout();
    let result = runner.run(&mut stdout.lock())?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(ExitCode::SUCCESS)
}

/// Verify determinism
fn cmd_verify(
    scenario: Option<PathBuf>,
    seed: u64,
    runs: u32,
    turns: u64,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let scenario = load(scenario)?;
    tracing::info!(seed, runs, turns, "Verifying determinism");

    let result = verify(&scenario, seed, runs, turns)?;
    if result.is_deterministic {
        println!(
            "PASS: {} runs agree on hash {:#018x}",
            result.hashes.len(),
            result.hashes.first().copied().unwrap_or_default()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        println!("FAIL: runs disagree");
        for (run, hash) in result.hashes.iter().enumerate() {
            println!("  run {run}: {hash:#018x}");
        }
        Ok(ExitCode::FAILURE)
    }
}

/// Print the starting board
fn cmd_show(
    scenario: Option<PathBuf>,
    seed: u64,
    color: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let scenario = load(scenario)?;
    let config = RunConfig {
        seed,
        max_turns: 0,
        ascii: true,
    };
    let mut runner = HeadlessRunner::new(&scenario, config)?;
    runner.show_move_zone()?;

    let ascii = AsciiConfig {
        show_legend: true,
        use_color: color,
        ..AsciiConfig::default()
    }
    .with_palette(&scenario.config.palette);
    print!("{}", render_ascii(runner.battle(), &ascii));
    Ok(ExitCode::SUCCESS)
}
