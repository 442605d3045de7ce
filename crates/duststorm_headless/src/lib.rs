//! Headless scenario runner for CI verification and balance checks.
//!
//! Runs the simulation without any rendering, driven by RON scenario
//! files. This enables:
//!
//! - **CI verification**: determinism checks across repeated runs
//! - **Balance sweeps**: scripted battles with machine-readable results
//! - **Throughput measurement**: raw ticks-per-second benchmarks
//!
//! # Output
//!
//! Each run writes JSON lines to stdout (see [`report`]): a start
//! record, optional per-tick event records, and a closing summary with
//! the final state hash. Logs go to stderr.
//!
//! # Example
//!
//! ```bash
//! # Run the built-in skirmish
//! cargo run -p duststorm_headless -- run
//!
//! # Run a scenario file with the full event stream
//! cargo run -p duststorm_headless -- run scenarios/rush.ron --events
//!
//! # Verify determinism across 10 runs
//! cargo run -p duststorm_headless -- verify scenarios/rush.ron --runs 10
//!
//! # Measure simulation throughput
//! cargo run -p duststorm_headless -- benchmark --ticks 36000
//! ```

pub mod report;
pub mod runner;
pub mod scenario;

pub use report::{PlayerReport, Record};
pub use runner::{RunSummary, Runner};
pub use scenario::{
    PlayerSetup, Scenario, ScenarioError, ScriptAction, ScriptedOrder, UnitPlacement,
};
