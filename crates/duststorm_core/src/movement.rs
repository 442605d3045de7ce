//! Movement controller and the navigation seam.
//!
//! Ground units steer through a [`Navigator`], the external pathfinding
//! collaborator: the sim hands it destinations and follows the directions
//! it returns, treating it as a black box. Flying units bypass navigation
//! entirely: their position interpolates straight at the destination while
//! the yaw lerps toward the heading, and they hold their own cruise height.
//!
//! Start/stop events are edge-triggered on the moving flag so animation
//! and combat eligibility can rely on them firing exactly once per change.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::events::SimEvent;
use crate::math::{level_distance_sq, move_toward, rotate_toward, yaw_of};
use crate::templates::MoveKind;
use crate::unit::{Unit, UnitId};
use crate::world::{World, TICK_SECONDS};

/// Path-following primitive provided by the host.
///
/// The simulation never sees paths: it reports where a unit wants to go,
/// then asks for a steering direction and the remaining travel distance
/// every tick. Implementations may plan around terrain however they like.
pub trait Navigator {
    /// A unit wants to travel from `from` to `to`.
    fn set_destination(&mut self, unit: UnitId, from: Vec3, to: Vec3);

    /// Unit-length direction to steer along this tick, or `None` when the
    /// navigator has nothing for it.
    fn desired_direction(&mut self, unit: UnitId, position: Vec3) -> Option<Vec3>;

    /// Remaining travel distance along the planned route.
    fn remaining_distance(&mut self, unit: UnitId, position: Vec3) -> f32;

    /// The unit no longer needs a route (stopped, died, got carried).
    fn release(&mut self, unit: UnitId);
}

/// Terrain-free reference navigator: straight lines on the ground plane.
///
/// Used by tests and the headless runner; a real host supplies a
/// pathfinding-backed implementation instead.
#[derive(Debug, Default)]
pub struct StraightLineNav {
    routes: HashMap<UnitId, Vec3>,
}

impl StraightLineNav {
    /// Create an empty navigator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Navigator for StraightLineNav {
    fn set_destination(&mut self, unit: UnitId, _from: Vec3, to: Vec3) {
        self.routes.insert(unit, to);
    }

    fn desired_direction(&mut self, unit: UnitId, position: Vec3) -> Option<Vec3> {
        let goal = self.routes.get(&unit)?;
        let delta = Vec3::new(goal.x - position.x, 0.0, goal.z - position.z);
        let length = delta.length();
        if length < 1e-4 {
            return None;
        }
        Some(delta / length)
    }

    fn remaining_distance(&mut self, unit: UnitId, position: Vec3) -> f32 {
        self.routes
            .get(&unit)
            .map_or(0.0, |goal| {
                Vec3::new(goal.x - position.x, 0.0, goal.z - position.z).length()
            })
    }

    fn release(&mut self, unit: UnitId) {
        self.routes.remove(&unit);
    }
}

/// Movement capability state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movable {
    /// How this unit travels.
    pub kind: MoveKind,
    /// Speed in world units per second.
    pub speed: f32,
    /// Yaw rate in radians per second.
    pub turn_rate: f32,
    /// Squared arrival tolerance, fixed at attach time.
    pub arrive_sq: f32,
    /// Cruise height for flying units.
    pub fly_height: f32,
    /// Where the unit is heading, if anywhere.
    pub destination: Option<Vec3>,
    /// Whether the unit is in motion. Edge changes emit events.
    pub moving: bool,
    /// External movement lock (carried, scripted); makes `move_to` a no-op.
    pub locked: bool,
}

impl Movable {
    /// Create a movement module.
    #[must_use]
    pub fn new(kind: MoveKind, speed: f32, turn_rate: f32, arrive_sq: f32, fly_height: f32) -> Self {
        Self {
            kind,
            speed,
            turn_rate,
            arrive_sq,
            fly_height,
            destination: None,
            moving: false,
            locked: false,
        }
    }
}

/// Point a unit at a destination.
///
/// No-op when the unit is carried, movement-locked, lacks movement, or is
/// already inside its arrival tolerance of the destination.
pub(crate) fn move_unit_to(
    unit: &mut Unit,
    destination: Vec3,
    nav: &mut dyn Navigator,
    events: &mut Vec<SimEvent>,
) {
    if unit.is_carried() {
        return;
    }
    let id = unit.id;
    let position = unit.position;
    let Some(movable) = unit.modules.movable.as_mut() else {
        return;
    };
    if movable.locked || movable.kind == MoveKind::Immobile {
        return;
    }

    let mut goal = destination;
    if movable.kind == MoveKind::Air {
        goal.y = movable.fly_height;
    }

    if level_distance_sq(position, goal) <= movable.arrive_sq {
        return;
    }
    if movable
        .destination
        .is_some_and(|current| current.distance_squared(goal) < 1e-6)
    {
        return;
    }

    movable.destination = Some(goal);
    if movable.kind == MoveKind::Ground {
        nav.set_destination(id, position, goal);
    }
    if !movable.moving {
        movable.moving = true;
        events.push(SimEvent::MovementStarted { unit: id });
    }
}

/// Stop a unit where it stands. Idempotent.
pub(crate) fn stop_unit(unit: &mut Unit, nav: &mut dyn Navigator, events: &mut Vec<SimEvent>) {
    let id = unit.id;
    let Some(movable) = unit.modules.movable.as_mut() else {
        return;
    };
    movable.destination = None;
    if movable.kind == MoveKind::Ground {
        nav.release(id);
    }
    if movable.moving {
        movable.moving = false;
        events.push(SimEvent::MovementStopped { unit: id });
    }
}

/// Integrate one tick of motion for every unit.
///
/// Carried units are parented to their carrier instead of moving
/// themselves.
pub(crate) fn movement_phase(world: &mut World, nav: &mut dyn Navigator) {
    for id in world.sorted_unit_ids() {
        let Some(mut unit) = world.units.remove(&id) else {
            continue;
        };
        if unit.alive {
            if let Some(carrier_id) = unit.carried_by {
                follow_carrier(&mut unit, carrier_id, world);
            } else {
                integrate(&mut unit, world, nav);
            }
        }
        world.units.insert(id, unit);
    }
}

/// Keep a loaded passenger glued to its carrier at its slot offset.
fn follow_carrier(unit: &mut Unit, carrier_id: UnitId, world: &World) {
    let Some(carrier) = world.units.get(&carrier_id) else {
        return;
    };
    let offset = carrier
        .modules
        .carrier
        .as_ref()
        .and_then(|c| c.slot_offset(unit.id))
        .unwrap_or(Vec3::ZERO);
    unit.position = carrier.position + offset;
    unit.yaw = carrier.yaw;
}

/// Advance a unit along its destination, if it has one.
fn integrate(unit: &mut Unit, world: &mut World, nav: &mut dyn Navigator) {
    let id = unit.id;
    let position = unit.position;
    let yaw = unit.yaw;
    let Some(movable) = unit.modules.movable.as_mut() else {
        return;
    };
    if !movable.moving {
        return;
    }
    let Some(destination) = movable.destination else {
        movable.moving = false;
        return;
    };

    let step = movable.speed * TICK_SECONDS;
    match movable.kind {
        MoveKind::Ground => {
            if let Some(dir) = nav.desired_direction(id, position) {
                unit.position = position + dir * step;
                unit.yaw = yaw_of(dir);
                let remaining = nav.remaining_distance(id, unit.position);
                if remaining * remaining <= movable.arrive_sq {
                    movable.destination = None;
                    movable.moving = false;
                    nav.release(id);
                    world.events.push(SimEvent::MovementStopped { unit: id });
                }
            } else if level_distance_sq(position, destination) <= movable.arrive_sq {
                movable.destination = None;
                movable.moving = false;
                nav.release(id);
                world.events.push(SimEvent::MovementStopped { unit: id });
            } else {
                // The navigator holds no route for us (fresh host after a
                // snapshot restore, or a dropped request). Re-submit and
                // steer next tick.
                nav.set_destination(id, position, destination);
            }
        }
        MoveKind::Air => {
            let heading = destination - position;
            if heading.length_squared() > 1e-6 {
                unit.yaw = rotate_toward(yaw, yaw_of(heading), movable.turn_rate * TICK_SECONDS);
            }
            unit.position = move_toward(position, destination, step);
            if level_distance_sq(unit.position, destination) <= movable.arrive_sq {
                movable.destination = None;
                movable.moving = false;
                world.events.push(SimEvent::MovementStopped { unit: id });
            }
        }
        MoveKind::Immobile => {
            movable.destination = None;
            movable.moving = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderQueue;
    use crate::player::{PlayerId, TeamId};
    use crate::templates::UnitCategory;
    use crate::unit::ModuleSet;

    fn ground_unit(id: u64) -> Unit {
        let mut modules = ModuleSet::default();
        modules.movable = Some(Movable::new(MoveKind::Ground, 5.0, 8.0, 2.25, 0.0));
        Unit {
            id: UnitId(id),
            template: "rover".to_string(),
            owner: PlayerId(0),
            team: TeamId(0),
            category: UnitCategory::Vehicle,
            move_kind: MoveKind::Ground,
            position: Vec3::ZERO,
            yaw: 0.0,
            vision_radius: 10.0,
            collision_radius: 0.75,
            alive: true,
            carried_by: None,
            collidable: true,
            group: None,
            orders: OrderQueue::new(),
            modules,
        }
    }

    #[test]
    fn test_move_to_sets_destination_and_fires_started_once() {
        let mut unit = ground_unit(1);
        let mut nav = StraightLineNav::new();
        let mut events = Vec::new();

        move_unit_to(&mut unit, Vec3::new(10.0, 0.0, 0.0), &mut nav, &mut events);
        move_unit_to(&mut unit, Vec3::new(10.0, 0.0, 0.0), &mut nav, &mut events);

        assert!(unit.modules.movable.as_ref().unwrap().moving);
        let starts = events
            .iter()
            .filter(|e| matches!(e, SimEvent::MovementStarted { .. }))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_move_to_is_noop_when_locked_or_carried() {
        let mut nav = StraightLineNav::new();
        let mut events = Vec::new();

        let mut locked = ground_unit(1);
        locked.modules.movable.as_mut().unwrap().locked = true;
        move_unit_to(&mut locked, Vec3::new(10.0, 0.0, 0.0), &mut nav, &mut events);
        assert!(!locked.modules.movable.as_ref().unwrap().moving);

        let mut carried = ground_unit(2);
        carried.carried_by = Some(UnitId(9));
        move_unit_to(&mut carried, Vec3::new(10.0, 0.0, 0.0), &mut nav, &mut events);
        assert!(!carried.modules.movable.as_ref().unwrap().moving);

        assert!(events.is_empty());
    }

    #[test]
    fn test_move_to_is_noop_inside_arrival_tolerance() {
        let mut unit = ground_unit(1);
        let mut nav = StraightLineNav::new();
        let mut events = Vec::new();

        move_unit_to(&mut unit, Vec3::new(1.0, 0.0, 0.0), &mut nav, &mut events);
        assert!(!unit.modules.movable.as_ref().unwrap().moving);
        assert!(events.is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut unit = ground_unit(1);
        let mut nav = StraightLineNav::new();
        let mut events = Vec::new();

        move_unit_to(&mut unit, Vec3::new(10.0, 0.0, 0.0), &mut nav, &mut events);
        stop_unit(&mut unit, &mut nav, &mut events);
        stop_unit(&mut unit, &mut nav, &mut events);

        let stops = events
            .iter()
            .filter(|e| matches!(e, SimEvent::MovementStopped { .. }))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_straight_line_nav_direction() {
        let mut nav = StraightLineNav::new();
        nav.set_destination(UnitId(1), Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        let dir = nav.desired_direction(UnitId(1), Vec3::ZERO).unwrap();
        assert!((dir.x - 1.0).abs() < 1e-5);
        assert!(dir.y.abs() < 1e-5 && dir.z.abs() < 1e-5);

        nav.release(UnitId(1));
        assert!(nav.desired_direction(UnitId(1), Vec3::ZERO).is_none());
    }
}
