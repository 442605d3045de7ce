//! Fog-of-war visibility.
//!
//! Hostile units carry a [`FogOfWar`] flag that a periodic sweep keeps in
//! sync: visible while inside the horizontal vision circle of any local
//! team unit, hidden otherwise. The local team never runs the check on its
//! own units. Combat targeting reads the flag through
//! [`crate::world::World::is_visible_to_team`], so an unseen enemy cannot
//! be acquired by the local player's units.

use serde::{Deserialize, Serialize};

use crate::events::SimEvent;
use crate::math::ground_distance_sq;
use crate::world::{World, TICK_SECONDS};

/// Per-unit fog-of-war flag, swept on a fixed cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FogOfWar {
    /// Whether the local team currently sees this unit.
    pub visible_to_local: bool,
}

impl FogOfWar {
    /// New units start hidden until the next sweep finds them.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Re-evaluate visibility for every hostile unit when the sweep timer
/// elapses. Flag flips emit reveal/conceal events for the presentation
/// layer.
pub(crate) fn vision_phase(world: &mut World) {
    world.vision_timer -= TICK_SECONDS;
    if world.vision_timer > 0.0 {
        return;
    }
    world.vision_timer = world.config.vision_seconds;

    let observers: Vec<(glam::Vec3, f32)> = world
        .units
        .values()
        .filter(|u| u.alive && !u.is_carried() && u.team == world.local_team)
        .map(|u| (u.position, u.vision_radius))
        .collect();

    for id in world.sorted_unit_ids() {
        let local_team = world.local_team;
        let Some(unit) = world.units.get_mut(&id) else {
            continue;
        };
        if !unit.alive || unit.is_carried() || unit.team == local_team {
            continue;
        }
        let position = unit.position;
        let Some(fog) = unit.modules.fog_of_war.as_mut() else {
            continue;
        };
        let visible = observers
            .iter()
            .any(|(eye, radius)| ground_distance_sq(*eye, position) <= radius * radius);
        if visible == fog.visible_to_local {
            continue;
        }
        fog.visible_to_local = visible;
        let event = if visible {
            SimEvent::UnitRevealed { unit: id }
        } else {
            SimEvent::UnitConcealed { unit: id }
        };
        world.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_start_hidden() {
        assert!(!FogOfWar::new().visible_to_local);
    }
}
