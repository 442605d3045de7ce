//! Simulation events.
//!
//! Every observable side effect of a tick (and of selection calls) is
//! recorded as a [`SimEvent`] in emission order. The world owns the event
//! buffer; [`crate::world::World::tick`] drains it and hands the batch to
//! the host, which fans events out to presentation (sounds, bars, minimap,
//! camera) and to any recording layer. There are no stored callbacks, so
//! there is nothing to unsubscribe when a unit dies.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::economy::FieldId;
use crate::player::PlayerId;
use crate::unit::UnitId;

/// A single observable simulation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A unit entered the world.
    UnitSpawned {
        /// The new unit.
        unit: UnitId,
        /// Owning player.
        owner: PlayerId,
    },
    /// A unit left the world (death or explicit despawn).
    UnitDied {
        /// The removed unit.
        unit: UnitId,
    },
    /// A locally owned unit accepted a direct command (acknowledgement
    /// sound cue).
    OrderAcknowledged {
        /// The commanded unit.
        unit: UnitId,
    },
    /// A unit started moving (edge-triggered).
    MovementStarted {
        /// The moving unit.
        unit: UnitId,
    },
    /// A unit stopped moving (edge-triggered).
    MovementStopped {
        /// The stopped unit.
        unit: UnitId,
    },
    /// A unit opened fire on a target it was not already engaging
    /// (once per engagement, not per shot).
    AttackStarted {
        /// Entity performing the attack.
        attacker: UnitId,
        /// Entity being attacked.
        target: UnitId,
    },
    /// A shot left a shoot point (every shot).
    ShotFired {
        /// Entity performing the attack.
        attacker: UnitId,
        /// Entity being attacked.
        target: UnitId,
        /// Index of the shoot point used, for muzzle effects.
        shoot_point: usize,
    },
    /// A projectile connected and damage was applied.
    UnitDamaged {
        /// Entity that received damage.
        unit: UnitId,
        /// Damage applied, after overrides.
        amount: f32,
        /// Entity that fired the projectile, if it still exists.
        source: Option<UnitId>,
    },
    /// A harvester finished loading and is leaving for delivery.
    ResourceHarvested {
        /// The harvesting unit.
        harvester: UnitId,
        /// Field the load came from.
        field: FieldId,
        /// Load carried when the harvester left the field.
        amount: f32,
    },
    /// A harvester finished unloading at a refinery.
    ResourceDelivered {
        /// The delivering unit.
        harvester: UnitId,
        /// The receiving refinery.
        refinery: UnitId,
        /// Amount handed over.
        amount: f32,
    },
    /// A resource field ran dry.
    FieldDepleted {
        /// Field identifier.
        field: FieldId,
    },
    /// An item was accepted into a production queue.
    ProductionQueued {
        /// The producing building.
        building: UnitId,
        /// Template id of the queued item.
        template: String,
    },
    /// A non-building production item finished and spawned.
    ProductionCompleted {
        /// The producing building.
        building: UnitId,
        /// Template id of the finished item.
        template: String,
        /// The spawned unit.
        unit: UnitId,
    },
    /// A building-category item finished and is waiting for placement.
    BuildingReady {
        /// The producing building.
        building: UnitId,
        /// Template id of the ready building.
        template: String,
    },
    /// A queued item was cancelled and refunded.
    ProductionCancelled {
        /// The producing building.
        building: UnitId,
        /// Template id of the cancelled item.
        template: String,
        /// Money returned to the player.
        refund: u32,
    },
    /// A player's electricity bookkeeping changed.
    PowerChanged {
        /// The affected player.
        player: PlayerId,
        /// New total supply.
        supply: u32,
        /// New total demand.
        demand: u32,
    },
    /// The selection set changed and is non-empty.
    SelectionChanged,
    /// The selection set became empty.
    SelectionCleared,
    /// The camera should re-center on a position (control group
    /// double-press, cycle selection).
    CameraCenter {
        /// World position to center on.
        position: Vec3,
    },
    /// An enemy unit became visible to the local team.
    UnitRevealed {
        /// The revealed unit.
        unit: UnitId,
    },
    /// An enemy unit dropped out of the local team's sight.
    UnitConcealed {
        /// The concealed unit.
        unit: UnitId,
    },
    /// A carrier loaded a passenger.
    UnitLoaded {
        /// The transporting unit.
        carrier: UnitId,
        /// The loaded unit.
        passenger: UnitId,
    },
    /// A carrier released a passenger.
    UnitUnloaded {
        /// The transporting unit.
        carrier: UnitId,
        /// The released unit.
        passenger: UnitId,
    },
    /// A player lost their last unit.
    PlayerDefeated {
        /// The defeated player.
        player: PlayerId,
    },
}
