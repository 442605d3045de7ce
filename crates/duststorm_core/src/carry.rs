//! Passenger transport.
//!
//! Boarding is a two-step handshake: [`prepare_to_carry`] sends each
//! passenger walking toward the carrier with a follow order, and the carry
//! phase loads whoever gets close enough. A loaded unit stops colliding,
//! loses its orders and selection membership, and rides parented to the
//! carrier at a small per-slot offset until it exits.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::SimEvent;
use crate::math::level_distance_sq;
use crate::movement::Navigator;
use crate::orders::{end_all, Order, OrderKind};
use crate::templates::CarrySpec;
use crate::unit::{Unit, UnitId};
use crate::world::World;

/// Passenger transport capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carrier {
    /// Maximum number of passengers.
    pub capacity: usize,
    /// Loaded passengers with their ride offsets.
    pub passengers: Vec<(UnitId, Vec3)>,
    /// Units walking over after a [`prepare_to_carry`] call.
    pub pending: Vec<UnitId>,
}

impl Carrier {
    /// Build carrier state from a template spec.
    #[must_use]
    pub fn from_spec(spec: &CarrySpec) -> Self {
        Self {
            capacity: spec.capacity,
            passengers: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Number of loaded passengers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passengers.len()
    }

    /// Whether nothing is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passengers.is_empty()
    }

    /// Whether every slot is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.passengers.len() >= self.capacity
    }

    /// Ride offset of a loaded passenger.
    #[must_use]
    pub fn slot_offset(&self, passenger: UnitId) -> Option<Vec3> {
        self.passengers
            .iter()
            .find(|(id, _)| *id == passenger)
            .map(|(_, offset)| *offset)
    }
}

/// Send `passengers` walking toward the carrier for pickup.
///
/// Skips anything dead, already riding, immobile, or beyond the carrier's
/// remaining capacity (loaded plus already inbound). Returns how many
/// units were accepted.
pub(crate) fn prepare_to_carry(world: &mut World, carrier_id: UnitId, passengers: &[UnitId]) -> usize {
    let Some(carrier_unit) = world.live_unit(carrier_id) else {
        debug!(%carrier_id, "prepare_to_carry on missing carrier");
        return 0;
    };
    let Some(carrier) = carrier_unit.modules.carrier.as_ref() else {
        debug!(%carrier_id, "prepare_to_carry on non-carrier");
        return 0;
    };
    let mut room = carrier
        .capacity
        .saturating_sub(carrier.passengers.len() + carrier.pending.len());

    let mut accepted = Vec::new();
    for &id in passengers {
        if room == 0 {
            break;
        }
        if id == carrier_id {
            continue;
        }
        let Some(unit) = world.live_unit(id) else {
            continue;
        };
        if unit.is_carried() || unit.modules.movable.is_none() {
            continue;
        }
        let carrier = world
            .live_unit(carrier_id)
            .and_then(|u| u.modules.carrier.as_ref());
        let already_inbound = carrier.map_or(false, |c| {
            c.pending.contains(&id) || c.slot_offset(id).is_some()
        });
        if already_inbound {
            continue;
        }
        accepted.push(id);
        room -= 1;
    }

    for &id in &accepted {
        world.issue_order(id, Order::new(OrderKind::Follow(carrier_id)), false);
    }
    if let Some(carrier) = world
        .units
        .get_mut(&carrier_id)
        .and_then(|u| u.modules.carrier.as_mut())
    {
        carrier.pending.extend(accepted.iter().copied());
    }
    accepted.len()
}

/// Load any pending passenger that reached its carrier.
pub(crate) fn carry_phase(world: &mut World, nav: &mut dyn Navigator) {
    let pickup_sq = world.config.carry_pickup_distance * world.config.carry_pickup_distance;
    for id in world.sorted_unit_ids() {
        let Some(mut unit) = world.units.remove(&id) else {
            continue;
        };
        if unit.alive && unit.modules.carrier.is_some() {
            tick_pickups(&mut unit, world, nav, pickup_sq);
        }
        world.units.insert(id, unit);
    }
}

fn tick_pickups(carrier_unit: &mut Unit, world: &mut World, nav: &mut dyn Navigator, pickup_sq: f32) {
    let carrier_id = carrier_unit.id;
    let carrier_pos = carrier_unit.position;
    let Some(carrier) = carrier_unit.modules.carrier.as_mut() else {
        return;
    };
    let pending = std::mem::take(&mut carrier.pending);

    for pid in pending {
        let close = match world.live_unit(pid) {
            Some(p) if !p.is_carried() => level_distance_sq(p.position, carrier_pos) <= pickup_sq,
            _ => {
                // Passenger died or got grabbed elsewhere; forget it.
                continue;
            }
        };

        if carrier.passengers.len() >= carrier.capacity {
            // Out of room: cancel the stragglers' approach.
            if let Some(p) = world.units.get_mut(&pid) {
                end_all(p, nav, &mut world.events);
            }
            continue;
        }
        if !close {
            carrier.pending.push(pid);
            continue;
        }

        let offset = world.rng.offset_in_disc(world.config.carry_slot_spread);
        if let Some(p) = world.units.get_mut(&pid) {
            end_all(p, nav, &mut world.events);
            p.carried_by = Some(carrier_id);
            p.collidable = false;
        }
        carrier.passengers.push((pid, offset));
        crate::selection::drop_unit(world, pid);
        world.events.push(SimEvent::UnitLoaded {
            carrier: carrier_id,
            passenger: pid,
        });
    }
}

/// Unload one passenger next to the carrier and send it a short move away.
pub(crate) fn exit_unit(world: &mut World, carrier_id: UnitId, passenger: UnitId) -> bool {
    let Some(carrier_unit) = world.live_unit(carrier_id) else {
        return false;
    };
    let carrier_pos = carrier_unit.position;
    let Some(carrier) = world
        .units
        .get_mut(&carrier_id)
        .and_then(|u| u.modules.carrier.as_mut())
    else {
        return false;
    };
    let Some(index) = carrier.passengers.iter().position(|(id, _)| *id == passenger) else {
        return false;
    };
    let (_, slot) = carrier.passengers.remove(index);

    let mut dir = world.rng.offset_in_disc(1.0);
    if dir.length_squared() < 1e-6 {
        dir = Vec3::Z;
    }
    let destination = carrier_pos + dir.normalize() * world.config.exit_move_distance;

    if let Some(p) = world.units.get_mut(&passenger) {
        p.carried_by = None;
        p.collidable = true;
        p.position = carrier_pos + slot;
    }
    world.events.push(SimEvent::UnitUnloaded {
        carrier: carrier_id,
        passenger,
    });
    world.issue_order(passenger, Order::new(OrderKind::Move(destination)), false);
    true
}

/// Unload every passenger.
pub(crate) fn exit_all(world: &mut World, carrier_id: UnitId) {
    let passengers: Vec<UnitId> = world
        .units
        .get(&carrier_id)
        .and_then(|u| u.modules.carrier.as_ref())
        .map(|c| c.passengers.iter().map(|(id, _)| *id).collect())
        .unwrap_or_default();
    for passenger in passengers {
        exit_unit(world, carrier_id, passenger);
    }
}

/// Drop every passenger at the carrier's final position when it dies.
///
/// Unlike [`exit_unit`] this issues no move orders; survivors are simply
/// set down where the carrier stopped existing.
pub(crate) fn release_on_death(world: &mut World, carrier_unit: &Unit) {
    let Some(carrier) = carrier_unit.modules.carrier.as_ref() else {
        return;
    };
    for (pid, slot) in &carrier.passengers {
        if let Some(p) = world.units.get_mut(pid) {
            p.carried_by = None;
            p.collidable = true;
            p.position = carrier_unit.position + *slot;
        }
        world.events.push(SimEvent::UnitUnloaded {
            carrier: carrier_unit.id,
            passenger: *pid,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_offset_lookup() {
        let mut carrier = Carrier::from_spec(&CarrySpec { capacity: 4 });
        carrier.passengers.push((UnitId(7), Vec3::new(0.2, 0.0, -0.1)));
        carrier.passengers.push((UnitId(9), Vec3::new(-0.3, 0.0, 0.4)));

        assert_eq!(
            carrier.slot_offset(UnitId(9)),
            Some(Vec3::new(-0.3, 0.0, 0.4))
        );
        assert_eq!(carrier.slot_offset(UnitId(8)), None);
    }

    #[test]
    fn test_capacity_tracking() {
        let mut carrier = Carrier::from_spec(&CarrySpec { capacity: 2 });
        assert!(carrier.is_empty());
        assert!(!carrier.is_full());

        carrier.passengers.push((UnitId(1), Vec3::ZERO));
        carrier.passengers.push((UnitId(2), Vec3::ZERO));
        assert!(carrier.is_full());
        assert_eq!(carrier.len(), 2);
    }
}
