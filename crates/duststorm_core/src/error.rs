//! Error types for the simulation core.
//!
//! In-simulation failures (bad order targets, unaffordable actions, stale
//! references) never surface as errors: they are logged warnings and
//! no-ops, per the command-handling contract. [`SimError`] covers fallible
//! *construction* paths: spawning from an unknown template, looking up a
//! despawned unit through the public API, decoding data or snapshots.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// Unit reference that no longer resolves.
    #[error("Unit not found: {0}")]
    UnitNotFound(u64),

    /// Player id that was never registered with the world.
    #[error("Player not found: {0}")]
    PlayerNotFound(u8),

    /// Spawn request named a template the registry does not hold.
    #[error("Unknown unit template: {0}")]
    UnknownTemplate(String),

    /// Template data failed to parse.
    #[error("Failed to parse template data: {0}")]
    TemplateParse(String),

    /// World snapshot could not be encoded or decoded.
    #[error("Snapshot codec error: {0}")]
    Snapshot(String),

    /// A world operation was requested in a state that cannot honor it.
    #[error("Invalid world state: {0}")]
    InvalidState(String),
}
