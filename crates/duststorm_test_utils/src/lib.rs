//! # Duststorm Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Template and world fixtures
//! - Scripted balance battles
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod balance;
pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
