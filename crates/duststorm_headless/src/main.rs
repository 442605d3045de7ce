//! Headless simulation runner.
//!
//! Runs scenarios without graphics for CI determinism checks, balance
//! sweeps, and throughput benchmarks.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in skirmish, summary only
//! cargo run -p duststorm_headless -- run
//!
//! # Run a scenario file with the full event stream
//! cargo run -p duststorm_headless -- run scenarios/rush.ron --events
//!
//! # Verify determinism across repeated runs
//! cargo run -p duststorm_headless -- verify --runs 10
//!
//! # Measure ticks per second
//! cargo run -p duststorm_headless -- benchmark --ticks 36000
//! ```
//!
//! JSON records go to stdout, one object per line; logs go to stderr.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duststorm_headless::{Runner, Scenario};

#[derive(Parser)]
#[command(name = "duststorm_headless")]
#[command(about = "Headless simulation runner for CI and balance checks")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario once, writing JSON records to stdout
    Run {
        /// Scenario RON file (omit for the built-in skirmish)
        scenario: Option<PathBuf>,

        /// Emit every simulation event, not just start and summary
        #[arg(long)]
        events: bool,

        /// Override the scenario's tick count
        #[arg(long)]
        ticks: Option<u64>,

        /// Override the scenario's seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Verify determinism by running the same scenario multiple times
    Verify {
        /// Scenario RON file (omit for the built-in skirmish)
        scenario: Option<PathBuf>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Run N ticks for benchmarking
    Benchmark {
        /// Number of ticks to run
        #[arg(short, long, default_value = "36000")]
        ticks: u64,

        /// Scenario RON file (omit for the built-in skirmish)
        scenario: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logging goes to stderr; stdout carries the record stream.
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            events,
            ticks,
            seed,
        }) => {
            cmd_run(scenario, events, ticks, seed);
        }
        Some(Commands::Verify { scenario, runs }) => {
            cmd_verify(scenario, runs);
        }
        Some(Commands::Benchmark { ticks, scenario }) => {
            cmd_benchmark(ticks, scenario);
        }
        None => {
            cmd_run(None, false, None, None);
        }
    }
}

fn load_scenario(path: Option<&PathBuf>) -> Scenario {
    match path {
        Some(p) => match Scenario::load(p) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to load scenario: {e}");
                std::process::exit(1);
            }
        },
        None => Scenario::skirmish(),
    }
}

fn build_runner(scenario: &Scenario) -> Runner {
    match Runner::new(scenario) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to build scenario: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a single scenario to stdout.
fn cmd_run(scenario: Option<PathBuf>, events: bool, ticks: Option<u64>, seed: Option<u64>) {
    let mut scenario = load_scenario(scenario.as_ref());
    if let Some(t) = ticks {
        scenario.ticks = t;
    }
    if let Some(s) = seed {
        scenario.seed = s;
    }

    let mut runner = build_runner(&scenario);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match runner.run(&mut out, events) {
        Ok(summary) => {
            tracing::info!(
                ticks = summary.ticks_run,
                units_alive = summary.units_alive,
                hash = format!("{:016x}", summary.hash),
                "run complete"
            );
        }
        Err(e) => {
            eprintln!("Run failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Verify determinism by comparing final hashes of repeated runs.
fn cmd_verify(scenario: Option<PathBuf>, runs: u32) {
    let scenario = load_scenario(scenario.as_ref());

    tracing::info!(
        scenario = %scenario.name,
        seed = scenario.seed,
        runs,
        "verifying determinism"
    );

    let mut hashes = Vec::with_capacity(runs as usize);
    for _ in 0..runs {
        let mut runner = build_runner(&scenario);
        for _ in 0..scenario.ticks {
            runner.step();
        }
        hashes.push(runner.hash());
    }

    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if deterministic {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (i, hash) in hashes.iter().enumerate() {
            eprintln!("  run {i}: {hash:016x}");
        }
        std::process::exit(1);
    }
}

/// Measure raw simulation throughput.
fn cmd_benchmark(ticks: u64, scenario: Option<PathBuf>) {
    let scenario = load_scenario(scenario.as_ref());
    let mut runner = build_runner(&scenario);

    eprintln!(
        "Starting benchmark with {} units",
        runner.world().unit_count()
    );
    eprintln!("Running {ticks} ticks...");

    // Warmup
    for _ in 0..100 {
        runner.step();
    }

    let start = Instant::now();
    for _ in 0..ticks {
        runner.step();
    }
    let elapsed = start.elapsed();

    let tps = ticks as f64 / elapsed.as_secs_f64();

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Ticks: {ticks}");
    eprintln!("Duration: {:.3}s", elapsed.as_secs_f64());
    eprintln!("Ticks/second: {tps:.1}");
    eprintln!("ms/tick: {:.4}", elapsed.as_millis() as f64 / ticks as f64);
    eprintln!("Final units: {}", runner.world().unit_count());
    eprintln!("State hash: {:016x}", runner.hash());
}
