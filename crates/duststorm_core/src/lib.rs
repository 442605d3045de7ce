//! # Duststorm Core
//!
//! Tick-based RTS simulation core for Duststorm.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No input polling
//! - No file IO (data types are serde/RON friendly; loading lives in the host)
//!
//! All game state lives in an explicit [`world::World`] advanced by a
//! fixed-step [`world::World::tick`]. Units compose behavior from optional
//! capability modules (movement, combat, harvesting, production, carrying)
//! instead of type hierarchies, and every command is a queued [`orders::Order`]
//! executed head-first with start-once semantics.
//!
//! ## Crate Structure
//!
//! - [`unit`] - units and the capability module registry
//! - [`orders`] - the order queue and per-tick order execution
//! - [`movement`] - movement controller and the navigation seam
//! - [`combat`] - target acquisition, turrets, firing, projectiles
//! - [`economy`] - harvesters, refineries, resource fields, repair
//! - [`production`] - build queues and unit spawning
//! - [`carry`] - transport capability
//! - [`selection`] - selection set and control groups
//! - [`formation`] - group-move waypoint solvers
//! - [`visibility`] - fog-of-war gating
//! - [`world`] - the simulation world and tick loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod carry;
pub mod combat;
pub mod config;
pub mod economy;
pub mod error;
pub mod events;
pub mod formation;
pub mod math;
pub mod movement;
pub mod orders;
pub mod player;
pub mod production;
pub mod selection;
pub mod templates;
pub mod unit;
pub mod visibility;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WorldConfig;
    pub use crate::error::{Result, SimError};
    pub use crate::events::SimEvent;
    pub use crate::math::{SimRng, Vec2, Vec3};
    pub use crate::movement::{Navigator, StraightLineNav};
    pub use crate::orders::{Order, OrderKind, OrderQueue};
    pub use crate::player::{Player, PlayerId, TeamId};
    pub use crate::selection::ScreenProjector;
    pub use crate::templates::{
        MoveKind, TargetKind, TemplateRegistry, UnitCategory, UnitTemplate,
    };
    pub use crate::unit::{Module, ModuleSet, Unit, UnitId};
    pub use crate::world::{World, TICK_RATE, TICK_SECONDS};
}
