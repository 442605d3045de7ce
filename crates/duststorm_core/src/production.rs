//! Unit production queues.
//!
//! Each producing building owns a FIFO queue. Enqueueing debits the owner
//! up front (atomically: if any cost cannot be paid, nothing is taken) and
//! cancelling refunds it. The head item counts down in real time, slowed
//! by the owner's electricity shortage multiplier. Finished mobile units
//! appear at the building's exit and walk to its rally point, shoving
//! loitering friendlies aside; finished buildings wait as a ready item
//! until the player places them.

use std::collections::{BTreeMap, VecDeque};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::SimEvent;
use crate::math::yaw_of;
use crate::orders::{Order, OrderKind};
use crate::player::PlayerId;
use crate::templates::{MoveKind, ProductionSpec, UnitCategory};
use crate::unit::UnitId;
use crate::world::{World, TICK_SECONDS};

/// Levels of recursive exit-clearing before giving up.
const NUDGE_DEPTH: u8 = 2;

/// One queued (or ready) production item.
///
/// Price and resource costs are captured at enqueue time so the refund on
/// cancel always matches what was debited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionItem {
    /// Template to produce.
    pub template: String,
    /// Category of the template, cached for the queue rules.
    pub category: UnitCategory,
    /// Build time left, in seconds.
    pub remaining_seconds: f32,
    /// Money debited at enqueue.
    pub price: u32,
    /// Named resources debited at enqueue.
    pub resource_costs: BTreeMap<String, u32>,
}

/// Unit production capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Production {
    /// Categories this building can produce.
    pub categories: Vec<UnitCategory>,
    /// Exit point offset from the building origin, in hull space.
    pub spawn_offset: Vec3,
    /// Rally point offset from the building origin, in hull space.
    pub rally_offset: Vec3,
    /// Queued items; the head is being built.
    pub queue: VecDeque<ProductionItem>,
    /// Finished building waiting for placement.
    pub ready: Option<ProductionItem>,
}

impl Production {
    /// Build production state from a template spec.
    #[must_use]
    pub fn from_spec(spec: &ProductionSpec) -> Self {
        Self {
            categories: spec.categories.clone(),
            spawn_offset: spec.spawn_offset,
            rally_offset: spec.rally_offset,
            queue: VecDeque::new(),
            ready: None,
        }
    }

    /// Whether a building item is already queued or awaiting placement.
    #[must_use]
    pub fn has_pending_building(&self) -> bool {
        self.ready.is_some()
            || self
                .queue
                .iter()
                .any(|item| item.category == UnitCategory::Building)
    }
}

/// Queue a template on a production building.
///
/// Returns `false` without side effects when the building cannot produce
/// the category, a building item is already pending, or the owner cannot
/// pay. Payment is atomic: money and every resource cost are checked
/// before anything is debited.
pub(crate) fn enqueue(world: &mut World, building: UnitId, template_id: &str) -> bool {
    let Some(unit) = world.live_unit(building) else {
        warn!(%building, "production enqueue on missing building");
        return false;
    };
    let Some(production) = unit.modules.production.as_ref() else {
        warn!(%building, "production enqueue on non-producing unit");
        return false;
    };
    let Some(template) = world.templates.get(template_id) else {
        warn!(template = template_id, "production enqueue of unknown template");
        return false;
    };
    if !production.categories.contains(&template.category) {
        warn!(
            %building,
            template = template_id,
            "building cannot produce this category"
        );
        return false;
    }
    if template.category == UnitCategory::Building && production.has_pending_building() {
        debug!(%building, template = template_id, "a building is already pending");
        return false;
    }

    let owner = unit.owner;
    let price = template.price;
    let resource_costs = template.resource_costs.clone();
    let item = ProductionItem {
        template: template_id.to_string(),
        category: template.category,
        remaining_seconds: template.build_seconds,
        price,
        resource_costs: resource_costs.clone(),
    };

    let Some(player) = world.players.get_mut(&owner) else {
        warn!(%owner, "production enqueue for missing player");
        return false;
    };
    if !player.debit(price, &resource_costs) {
        return false;
    }

    if let Some(production) = world
        .units
        .get_mut(&building)
        .and_then(|u| u.modules.production.as_mut())
    {
        production.queue.push_back(item);
    }
    world.events.push(SimEvent::ProductionQueued {
        building,
        template: template_id.to_string(),
    });
    true
}

/// Cancel a queued item (by queue index) or, past the queue's end, the
/// ready building. Refunds everything the item debited.
pub(crate) fn cancel(world: &mut World, building: UnitId, index: usize) -> bool {
    let Some(production) = world
        .units
        .get_mut(&building)
        .filter(|u| u.alive)
        .and_then(|u| u.modules.production.as_mut())
    else {
        warn!(%building, "production cancel on missing building");
        return false;
    };

    let item = if index < production.queue.len() {
        production.queue.remove(index)
    } else {
        production.ready.take()
    };
    let Some(item) = item else {
        return false;
    };

    let owner = world.units.get(&building).map(|u| u.owner);
    if let Some(player) = owner.and_then(|o| world.players.get_mut(&o)) {
        player.refund(item.price, &item.resource_costs);
    }
    world.events.push(SimEvent::ProductionCancelled {
        building,
        template: item.template,
        refund: item.price,
    });
    true
}

/// Place a finished building into the world at `position`.
///
/// Fails when nothing is ready or the spot overlaps another unit's
/// collision sphere.
pub(crate) fn place_building(world: &mut World, producer: UnitId, position: Vec3, yaw: f32) -> bool {
    let Some(item) = world
        .units
        .get(&producer)
        .filter(|u| u.alive)
        .and_then(|u| u.modules.production.as_ref())
        .and_then(|p| p.ready.clone())
    else {
        debug!(%producer, "no building ready to place");
        return false;
    };
    let Some(template) = world.templates.get(&item.template) else {
        warn!(template = item.template, "ready building template disappeared");
        return false;
    };
    let footprint = template.collision_radius;
    let blocked = world.units.values().any(|other| {
        other.alive
            && !other.is_carried()
            && other.position.distance_squared(position)
                < (footprint + other.collision_radius) * (footprint + other.collision_radius)
    });
    if blocked {
        debug!(%producer, template = item.template, "placement blocked");
        return false;
    }

    let owner = match world.units.get(&producer) {
        Some(unit) => unit.owner,
        None => return false,
    };
    let Ok(placed) = world.spawn_unit(&item.template, owner, position, yaw) else {
        return false;
    };
    if let Some(production) = world
        .units
        .get_mut(&producer)
        .and_then(|u| u.modules.production.as_mut())
    {
        production.ready = None;
    }
    world.events.push(SimEvent::ProductionCompleted {
        building: producer,
        template: item.template,
        unit: placed,
    });
    true
}

/// Advance every production queue by one tick.
pub(crate) fn production_phase(world: &mut World) {
    for id in world.sorted_unit_ids() {
        let Some(mut unit) = world.units.remove(&id) else {
            continue;
        };
        if unit.alive {
            tick_production(&mut unit, world);
        }
        world.units.insert(id, unit);
    }
}

fn tick_production(unit: &mut crate::unit::Unit, world: &mut World) {
    let owner = unit.owner;
    let position = unit.position;
    let yaw = unit.yaw;
    let building = unit.id;
    let Some(production) = unit.modules.production.as_mut() else {
        return;
    };
    let Some(head) = production.queue.front_mut() else {
        return;
    };

    let shortage = world
        .players
        .get(&owner)
        .map_or(false, crate::player::Player::has_power_shortage);
    let rate = if shortage {
        world.config.low_power_multiplier
    } else {
        1.0
    };
    head.remaining_seconds -= TICK_SECONDS * rate;
    if head.remaining_seconds > 0.0 {
        return;
    }

    let Some(item) = production.queue.pop_front() else {
        return;
    };
    if item.category == UnitCategory::Building {
        production.ready = Some(item.clone());
        world.events.push(SimEvent::BuildingReady {
            building,
            template: item.template,
        });
        return;
    }

    let exit = position + crate::math::rotate_y(production.spawn_offset, yaw);
    let rally = position + crate::math::rotate_y(production.rally_offset, yaw);
    let facing = yaw_of(rally - exit);
    match world.spawn_unit(&item.template, owner, exit, facing) {
        Ok(spawned) => {
            let kind = world
                .units
                .get(&spawned)
                .map_or(MoveKind::Ground, |u| u.move_kind);
            if let Some(new_unit) = world.units.get_mut(&spawned) {
                new_unit.orders.set(Order::new(OrderKind::Move(rally)));
            }
            nudge_away(world, exit, owner, kind, spawned, 0);
            world.events.push(SimEvent::ProductionCompleted {
                building,
                template: item.template,
                unit: spawned,
            });
        }
        Err(err) => {
            warn!(template = item.template, error = %err, "production spawn failed");
        }
    }
}

/// Shove idle friendlies of the same movement kind away from `from`.
///
/// Each shoved unit's new spot is cleared in turn, up to [`NUDGE_DEPTH`]
/// levels.
fn nudge_away(
    world: &mut World,
    from: Vec3,
    owner: PlayerId,
    kind: MoveKind,
    exclude: UnitId,
    depth: u8,
) {
    if depth >= NUDGE_DEPTH {
        return;
    }
    let radius_sq = world.config.nudge_radius * world.config.nudge_radius;
    let mut shoved: Vec<(UnitId, Vec3)> = Vec::new();
    for id in world.sorted_unit_ids() {
        let position = {
            let Some(other) = world.live_unit(id) else {
                continue;
            };
            if id == exclude
                || other.owner != owner
                || other.move_kind != kind
                || other.is_carried()
                || other.is_moving()
                || !other.orders.is_empty()
            {
                continue;
            }
            if other.position.distance_squared(from) > radius_sq {
                continue;
            }
            other.position
        };
        let mut dir = position - from;
        dir.y = 0.0;
        if dir.length_squared() < 1e-6 {
            dir = world.rng.offset_in_disc(1.0);
        }
        if dir.length_squared() < 1e-6 {
            dir = Vec3::Z;
        }
        let destination = position + dir.normalize() * world.config.nudge_distance;
        shoved.push((id, destination));
    }

    for (id, destination) in shoved {
        if let Some(unit) = world.units.get_mut(&id) {
            unit.orders.set(Order::new(OrderKind::Move(destination)));
        }
        nudge_away(world, destination, owner, kind, exclude, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(category: UnitCategory) -> ProductionItem {
        ProductionItem {
            template: "thing".to_string(),
            category,
            remaining_seconds: 5.0,
            price: 100,
            resource_costs: BTreeMap::new(),
        }
    }

    #[test]
    fn test_pending_building_blocks_second_building() {
        let spec = ProductionSpec {
            categories: vec![UnitCategory::Building, UnitCategory::Vehicle],
            spawn_offset: Vec3::ZERO,
            rally_offset: Vec3::Z,
        };
        let mut production = Production::from_spec(&spec);
        assert!(!production.has_pending_building());

        production.queue.push_back(item(UnitCategory::Vehicle));
        assert!(!production.has_pending_building());

        production.queue.push_back(item(UnitCategory::Building));
        assert!(production.has_pending_building());

        production.queue.pop_back();
        production.ready = Some(item(UnitCategory::Building));
        assert!(production.has_pending_building());
    }
}
