//! Units and the capability module registry.
//!
//! A [`Unit`] is identity, transform and transient flags; everything it can
//! *do* comes from the optional capability modules in its [`ModuleSet`].
//! The set is assembled once from the unit's template during spawn and is
//! fixed afterwards: at most one module per capability, attached through
//! [`ModuleSet::attach`] before any system sees the unit.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::carry::Carrier;
use crate::combat::{Attackable, Damageable, Turret};
use crate::economy::{Harvester, Refinery};
use crate::movement::Movable;
use crate::orders::OrderQueue;
use crate::player::{PlayerId, TeamId};
use crate::production::Production;
use crate::templates::{MoveKind, UnitCategory};
use crate::visibility::FogOfWar;

/// Stable unit identifier. Never reused within a world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct UnitId(pub u64);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A capability module being attached to a unit.
///
/// The variants mirror the slots of [`ModuleSet`]; attach consumes the
/// value and routes it into the matching slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Module {
    /// Movement controller.
    Movable(Movable),
    /// Weapon and targeting state.
    Attackable(Attackable),
    /// Rotating weapon mount.
    Turret(Turret),
    /// Health and repair state.
    Damageable(Damageable),
    /// Resource gathering state machine.
    Harvester(Harvester),
    /// Resource intake building role.
    Refinery(Refinery),
    /// Unit production queue.
    Production(Production),
    /// Passenger transport.
    Carrier(Carrier),
    /// Fog-of-war visibility flag.
    FogOfWar(FogOfWar),
    /// Electricity contribution, applied on spawn and removed on death.
    Electricity {
        /// Supply added to the owner.
        supply: u32,
        /// Demand added to the owner.
        demand: u32,
    },
}

impl Module {
    /// Capability name for diagnostics.
    #[must_use]
    pub fn capability(&self) -> &'static str {
        match self {
            Self::Movable(_) => "movable",
            Self::Attackable(_) => "attackable",
            Self::Turret(_) => "turret",
            Self::Damageable(_) => "damageable",
            Self::Harvester(_) => "harvester",
            Self::Refinery(_) => "refinery",
            Self::Production(_) => "production",
            Self::Carrier(_) => "carrier",
            Self::FogOfWar(_) => "fog_of_war",
            Self::Electricity { .. } => "electricity",
        }
    }
}

/// Electricity bookkeeping carried by a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Electricity {
    /// Supply added to the owner while the unit lives.
    pub supply: u32,
    /// Demand added to the owner while the unit lives.
    pub demand: u32,
}

/// The capability modules attached to one unit; one slot per capability.
///
/// Slots are public so systems can borrow them directly, but population
/// goes through [`ModuleSet::attach`], which enforces the one-per-type
/// rule at spawn time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleSet {
    /// Movement controller.
    pub movable: Option<Movable>,
    /// Weapon and targeting state.
    pub attackable: Option<Attackable>,
    /// Rotating weapon mount.
    pub turret: Option<Turret>,
    /// Health and repair state.
    pub damageable: Option<Damageable>,
    /// Resource gathering state machine.
    pub harvester: Option<Harvester>,
    /// Resource intake building role.
    pub refinery: Option<Refinery>,
    /// Unit production queue.
    pub production: Option<Production>,
    /// Passenger transport.
    pub carrier: Option<Carrier>,
    /// Fog-of-war visibility flag.
    pub fog_of_war: Option<FogOfWar>,
    /// Electricity contribution.
    pub electricity: Option<Electricity>,
}

impl ModuleSet {
    /// Attach a module. Returns `false` (and logs a warning) if the slot
    /// is already occupied; the original module is kept.
    pub fn attach(&mut self, module: Module) -> bool {
        let occupied = match &module {
            Module::Movable(_) => self.movable.is_some(),
            Module::Attackable(_) => self.attackable.is_some(),
            Module::Turret(_) => self.turret.is_some(),
            Module::Damageable(_) => self.damageable.is_some(),
            Module::Harvester(_) => self.harvester.is_some(),
            Module::Refinery(_) => self.refinery.is_some(),
            Module::Production(_) => self.production.is_some(),
            Module::Carrier(_) => self.carrier.is_some(),
            Module::FogOfWar(_) => self.fog_of_war.is_some(),
            Module::Electricity { .. } => self.electricity.is_some(),
        };
        if occupied {
            warn!(capability = module.capability(), "duplicate module attach ignored");
            return false;
        }
        match module {
            Module::Movable(m) => self.movable = Some(m),
            Module::Attackable(m) => self.attackable = Some(m),
            Module::Turret(m) => self.turret = Some(m),
            Module::Damageable(m) => self.damageable = Some(m),
            Module::Harvester(m) => self.harvester = Some(m),
            Module::Refinery(m) => self.refinery = Some(m),
            Module::Production(m) => self.production = Some(m),
            Module::Carrier(m) => self.carrier = Some(m),
            Module::FogOfWar(m) => self.fog_of_war = Some(m),
            Module::Electricity { supply, demand } => {
                self.electricity = Some(Electricity { supply, demand });
            }
        }
        true
    }
}

/// A controllable entity in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    /// Stable identifier.
    pub id: UnitId,
    /// Template id this unit was spawned from.
    pub template: String,
    /// Owning player.
    pub owner: PlayerId,
    /// Owner's team, copied at spawn for cheap hostility checks.
    pub team: TeamId,
    /// Category, copied from the template.
    pub category: UnitCategory,
    /// Movement kind, copied from the template.
    pub move_kind: MoveKind,
    /// World position.
    pub position: Vec3,
    /// Hull facing, radians around Y.
    pub yaw: f32,
    /// Sight range, copied from the template.
    pub vision_radius: f32,
    /// Collision sphere radius, copied from the template.
    pub collision_radius: f32,
    /// Liveness flag; systems check this before using any unit reference.
    pub alive: bool,
    /// Transporting unit, while loaded.
    pub carried_by: Option<UnitId>,
    /// Whether fire-line casts can hit this unit.
    pub collidable: bool,
    /// Control group tag (0-9).
    pub group: Option<u8>,
    /// Queued orders; only the head executes.
    pub orders: OrderQueue,
    /// Attached capability modules.
    pub modules: ModuleSet,
}

impl Unit {
    /// Whether the unit is alive and present in the world.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Whether the unit is currently loaded into a carrier.
    #[must_use]
    pub fn is_carried(&self) -> bool {
        self.carried_by.is_some()
    }

    /// Whether this unit is a structure.
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.category == UnitCategory::Building
    }

    /// Whether the unit is currently in motion.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.modules.movable.as_ref().is_some_and(|m| m.moving)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::Movable;
    use crate::templates::MoveKind;

    fn movable() -> Movable {
        Movable::new(MoveKind::Ground, 5.0, 8.0, 2.25, 0.0)
    }

    #[test]
    fn test_attach_rejects_duplicate_capability() {
        let mut modules = ModuleSet::default();
        assert!(modules.attach(Module::Movable(movable())));
        assert!(!modules.attach(Module::Movable(movable())));
        assert!(modules.movable.is_some());
    }

    #[test]
    fn test_missing_capability_reads_as_none() {
        let modules = ModuleSet::default();
        assert!(modules.attackable.is_none());
        assert!(modules.harvester.is_none());
    }

    #[test]
    fn test_electricity_attach() {
        let mut modules = ModuleSet::default();
        assert!(modules.attach(Module::Electricity {
            supply: 100,
            demand: 0
        }));
        let power = modules.electricity.unwrap();
        assert_eq!(power.supply, 100);
        assert_eq!(power.demand, 0);
    }
}
