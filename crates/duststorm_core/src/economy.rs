//! Resource fields, harvesters, refineries and building repair.
//!
//! A harvester runs a small state machine driven entirely by proximity
//! checks and countdown timers: find a field, stand on it and fill up,
//! truck the load to a refinery, unload, repeat. Player orders always win;
//! while the order queue is non-empty the machine neither moves the unit
//! nor searches, and issuing an order retargets it (a move near a field
//! redirects gathering there, a follow onto a refinery redirects delivery,
//! anything else drops it back to idle).

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::events::SimEvent;
use crate::math::{level_distance_sq, rotate_y};
use crate::movement::{move_unit_to, Navigator};
use crate::orders::{end_all, OrderKind};
use crate::player::PlayerId;
use crate::templates::{HarvesterSpec, RefinerySpec};
use crate::unit::{Unit, UnitId};
use crate::world::{World, TICK_SECONDS};

/// Stable resource field identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct FieldId(pub u32);

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "F{}", self.0)
    }
}

fn default_resource() -> String {
    "ore".to_string()
}

fn default_direct_money() -> bool {
    true
}

fn default_field_radius() -> f32 {
    2.0
}

/// A patch of gatherable resources on the map.
///
/// ```ron
/// (
///     position: (40.0, 0.0, 12.0),
///     radius: 3.0,
///     remaining: 5000.0,
///     resource: "ore",
///     direct_money: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceField {
    /// World position of the field.
    pub position: Vec3,
    /// Extent of the patch; harvesters gather while inside it. Must exceed
    /// the arrival tolerance or harvesters can stop just out of reach.
    #[serde(default = "default_field_radius")]
    pub radius: f32,
    /// Amount left to gather.
    pub remaining: f32,
    /// Resource name, matched against harvester filters.
    #[serde(default = "default_resource")]
    pub resource: String,
    /// Whether deliveries from this field pay money directly; otherwise
    /// they feed the owner's named pool for this resource.
    #[serde(default = "default_direct_money")]
    pub direct_money: bool,
}

/// What a harvester is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HarvestTask {
    /// Nothing to do; the search timer looks for work.
    #[default]
    Idle,
    /// Driving to a field.
    ToField {
        /// Destination field.
        field: FieldId,
    },
    /// Standing at a field, filling the hold.
    Harvesting {
        /// Field being worked.
        field: FieldId,
    },
    /// Driving a load to a refinery.
    ToRefinery {
        /// Destination refinery.
        refinery: UnitId,
    },
    /// Standing at the refinery, transferring the load.
    Unloading {
        /// Refinery receiving the load.
        refinery: UnitId,
    },
}

/// Resource gathering state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Harvester {
    /// Maximum load carried.
    pub capacity: f32,
    /// Seconds to fill from empty to capacity.
    pub harvest_seconds: f32,
    /// Seconds to unload a full hold.
    pub unload_seconds: f32,
    /// Restrict gathering to fields carrying this resource, if set.
    pub resource_filter: Option<String>,
    /// Current task.
    pub task: HarvestTask,
    /// Load currently in the hold.
    pub carried: f32,
    /// Pool the current load pays into; `None` pays money directly.
    pub payout_resource: Option<String>,
    /// Field the current load came from; preferred on the next trip.
    pub last_field: Option<FieldId>,
    /// Seconds until the next idle search.
    pub search_remaining: f32,
    /// Seconds of unloading left.
    pub unload_remaining: f32,
}

impl Harvester {
    /// Build harvester state from a template spec.
    #[must_use]
    pub fn from_spec(spec: &HarvesterSpec) -> Self {
        Self {
            capacity: spec.capacity,
            harvest_seconds: spec.harvest_seconds,
            unload_seconds: spec.unload_seconds,
            resource_filter: spec.resource_filter.clone(),
            task: HarvestTask::Idle,
            carried: 0.0,
            payout_resource: None,
            last_field: None,
            search_remaining: 0.0,
            unload_remaining: 0.0,
        }
    }
}

/// Resource intake building role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refinery {
    /// Docking point offset from the building origin, in hull space.
    pub delivery_offset: Vec3,
    /// Template spawned next to the refinery when it is built.
    pub starting_harvester: Option<String>,
    /// Lifetime total received, for scoring and debug output.
    pub total_received: f32,
}

impl Refinery {
    /// Build refinery state from a template spec.
    #[must_use]
    pub fn from_spec(spec: &RefinerySpec) -> Self {
        Self {
            delivery_offset: spec.delivery_offset,
            starting_harvester: spec.starting_harvester.clone(),
            total_received: 0.0,
        }
    }

    /// World-space docking point for the given building transform.
    #[must_use]
    pub fn delivery_point(&self, position: Vec3, yaw: f32) -> Vec3 {
        position + rotate_y(self.delivery_offset, yaw)
    }
}

/// Docking point of a live refinery, if it still exists.
pub(crate) fn delivery_point_of(world: &World, refinery: UnitId) -> Option<Vec3> {
    let unit = world.live_unit(refinery)?;
    let module = unit.modules.refinery.as_ref()?;
    Some(module.delivery_point(unit.position, unit.yaw))
}

/// Nearest non-empty field matching `filter` within `within` units.
pub(crate) fn nearest_field(
    world: &World,
    from: Vec3,
    filter: Option<&str>,
    within: f32,
) -> Option<FieldId> {
    let within_sq = within * within;
    let mut best: Option<(FieldId, f32)> = None;
    for (id, field) in &world.fields {
        if field.remaining <= 0.0 {
            continue;
        }
        if filter.is_some_and(|name| name != field.resource) {
            continue;
        }
        let dist_sq = from.distance_squared(field.position);
        if dist_sq > within_sq {
            continue;
        }
        if best.map_or(true, |(_, best_sq)| dist_sq < best_sq) {
            best = Some((*id, dist_sq));
        }
    }
    best.map(|(id, _)| id)
}

/// Nearest live refinery owned by `owner`.
pub(crate) fn nearest_refinery(world: &World, owner: PlayerId, from: Vec3) -> Option<UnitId> {
    let mut best: Option<(UnitId, f32)> = None;
    for id in world.sorted_unit_ids() {
        let Some(unit) = world.live_unit(id) else {
            continue;
        };
        if unit.owner != owner || unit.modules.refinery.is_none() {
            continue;
        }
        let dist_sq = from.distance_squared(unit.position);
        if best.map_or(true, |(_, best_sq)| dist_sq < best_sq) {
            best = Some((id, dist_sq));
        }
    }
    best.map(|(id, _)| id)
}

/// Retarget a harvester's state machine when a player order comes in.
///
/// A move near a field gathers there, a follow onto an owned refinery
/// delivers there, and every other order forces idle.
pub(crate) fn redirect_on_order(world: &mut World, unit_id: UnitId, kind: OrderKind) {
    let Some(unit) = world.units.get(&unit_id) else {
        return;
    };
    let Some(harvester) = unit.modules.harvester.as_ref() else {
        return;
    };
    let filter = harvester.resource_filter.clone();
    let owner = unit.owner;
    let task = match kind {
        OrderKind::Move(destination) => nearest_field(
            world,
            destination,
            filter.as_deref(),
            world.config.field_override_radius,
        )
        .map_or(HarvestTask::Idle, |field| HarvestTask::ToField { field }),
        OrderKind::Follow(target) => {
            let owned_refinery = world
                .live_unit(target)
                .is_some_and(|u| u.owner == owner && u.modules.refinery.is_some());
            if owned_refinery {
                HarvestTask::ToRefinery { refinery: target }
            } else {
                HarvestTask::Idle
            }
        }
        OrderKind::Attack(_) => HarvestTask::Idle,
    };
    if let Some(harvester) = world
        .units
        .get_mut(&unit_id)
        .and_then(|u| u.modules.harvester.as_mut())
    {
        harvester.task = task;
    }
}

/// One tick of gathering and repair for every unit.
pub(crate) fn economy_phase(world: &mut World, nav: &mut dyn Navigator) {
    for id in world.sorted_unit_ids() {
        let Some(mut unit) = world.units.remove(&id) else {
            continue;
        };
        if unit.alive && !unit.is_carried() {
            tick_harvester(&mut unit, world, nav);
            tick_repair(&mut unit, world);
        }
        world.units.insert(id, unit);
    }
}

fn set_task(unit: &mut Unit, task: HarvestTask) {
    if let Some(harvester) = unit.modules.harvester.as_mut() {
        harvester.task = task;
    }
}

fn tick_harvester(unit: &mut Unit, world: &mut World, nav: &mut dyn Navigator) {
    let Some(task) = unit.modules.harvester.as_ref().map(|h| h.task) else {
        return;
    };
    match task {
        HarvestTask::Idle => tick_idle(unit, world),
        HarvestTask::ToField { field } => tick_to_field(unit, field, world, nav),
        HarvestTask::Harvesting { field } => tick_harvesting(unit, field, world),
        HarvestTask::ToRefinery { refinery } => tick_to_refinery(unit, refinery, world, nav),
        HarvestTask::Unloading { refinery } => tick_unloading(unit, refinery, world),
    }
}

/// Idle: wait out the search timer, then look for a refinery (if loaded)
/// or a field (if empty). The timer only runs while unordered.
fn tick_idle(unit: &mut Unit, world: &mut World) {
    if !unit.orders.is_empty() {
        return;
    }
    let owner = unit.owner;
    let position = unit.position;
    let Some(harvester) = unit.modules.harvester.as_mut() else {
        return;
    };
    harvester.search_remaining -= TICK_SECONDS;
    if harvester.search_remaining > 0.0 {
        return;
    }
    harvester.search_remaining = world.config.harvester_search_seconds;
    let loaded = harvester.carried > 0.0;
    let filter = harvester.resource_filter.clone();

    let task = if loaded {
        nearest_refinery(world, owner, position)
            .map(|refinery| HarvestTask::ToRefinery { refinery })
    } else {
        nearest_field(world, position, filter.as_deref(), f32::INFINITY)
            .map(|field| HarvestTask::ToField { field })
    };
    if let Some(task) = task {
        set_task(unit, task);
    }
}

fn tick_to_field(unit: &mut Unit, field_id: FieldId, world: &mut World, nav: &mut dyn Navigator) {
    let Some(field) = world.fields.get(&field_id) else {
        set_task(unit, HarvestTask::Idle);
        return;
    };
    if field.remaining <= 0.0 {
        set_task(unit, HarvestTask::Idle);
        return;
    }
    let field_pos = field.position;
    let reach_sq = field.radius * field.radius;
    if level_distance_sq(unit.position, field_pos) <= reach_sq {
        end_all(unit, nav, &mut world.events);
        set_task(unit, HarvestTask::Harvesting { field: field_id });
    } else if unit.orders.is_empty() {
        move_unit_to(unit, field_pos, nav, &mut world.events);
    }
}

fn tick_harvesting(unit: &mut Unit, field_id: FieldId, world: &mut World) {
    let Some(field) = world.fields.get_mut(&field_id) else {
        set_task(unit, HarvestTask::Idle);
        return;
    };
    let reach_sq = field.radius * field.radius;
    if level_distance_sq(unit.position, field.position) > reach_sq {
        set_task(unit, HarvestTask::ToField { field: field_id });
        return;
    }
    let Some(harvester) = unit.modules.harvester.as_mut() else {
        return;
    };

    let rate = harvester.capacity / harvester.harvest_seconds.max(TICK_SECONDS);
    let take = (rate * TICK_SECONDS)
        .min(harvester.capacity - harvester.carried)
        .min(field.remaining);
    if take > 0.0 {
        harvester.carried += take;
        field.remaining -= take;
        harvester.payout_resource = if field.direct_money {
            None
        } else {
            Some(field.resource.clone())
        };
        harvester.last_field = Some(field_id);
    }
    let carried = harvester.carried;
    let full = carried >= harvester.capacity - 1e-4;
    let drained = field.remaining <= 0.0;

    if drained && take > 0.0 {
        world.events.push(SimEvent::FieldDepleted { field: field_id });
    }
    if !full && !drained {
        return;
    }
    if carried > 0.0 {
        world.events.push(SimEvent::ResourceHarvested {
            harvester: unit.id,
            field: field_id,
            amount: carried,
        });
        let task = nearest_refinery(world, unit.owner, unit.position)
            .map_or(HarvestTask::Idle, |refinery| HarvestTask::ToRefinery {
                refinery,
            });
        set_task(unit, task);
    } else {
        set_task(unit, HarvestTask::Idle);
    }
}

fn tick_to_refinery(
    unit: &mut Unit,
    refinery_id: UnitId,
    world: &mut World,
    nav: &mut dyn Navigator,
) {
    let Some(dock) = delivery_point_of(world, refinery_id) else {
        let task = nearest_refinery(world, unit.owner, unit.position)
            .map_or(HarvestTask::Idle, |refinery| HarvestTask::ToRefinery {
                refinery,
            });
        set_task(unit, task);
        return;
    };
    let reach_sq = world.config.delivery_reach * world.config.delivery_reach;
    if level_distance_sq(unit.position, dock) <= reach_sq {
        end_all(unit, nav, &mut world.events);
        if let Some(harvester) = unit.modules.harvester.as_mut() {
            harvester.unload_remaining = harvester.unload_seconds;
            harvester.task = HarvestTask::Unloading {
                refinery: refinery_id,
            };
        }
    } else if unit.orders.is_empty() {
        move_unit_to(unit, dock, nav, &mut world.events);
    }
}

fn tick_unloading(unit: &mut Unit, refinery_id: UnitId, world: &mut World) {
    let Some(dock) = delivery_point_of(world, refinery_id) else {
        set_task(unit, HarvestTask::Idle);
        return;
    };
    let reach_sq = world.config.delivery_reach * world.config.delivery_reach;
    if level_distance_sq(unit.position, dock) > reach_sq {
        set_task(
            unit,
            HarvestTask::ToRefinery {
                refinery: refinery_id,
            },
        );
        return;
    }
    let Some(harvester) = unit.modules.harvester.as_mut() else {
        return;
    };
    harvester.unload_remaining -= TICK_SECONDS;
    if harvester.unload_remaining > 0.0 {
        return;
    }

    let amount = harvester.carried;
    harvester.carried = 0.0;
    let payout = harvester.payout_resource.take();
    let last_field = harvester.last_field;
    let filter = harvester.resource_filter.clone();

    if amount > 0.0 {
        if let Some(refinery) = world
            .units
            .get_mut(&refinery_id)
            .and_then(|u| u.modules.refinery.as_mut())
        {
            refinery.total_received += amount;
        }
        if let Some(player) = world.players.get_mut(&unit.owner) {
            match payout {
                None => player.money += amount.round() as i64,
                Some(resource) => player.deposit_pool(&resource, amount),
            }
        }
        world.events.push(SimEvent::ResourceDelivered {
            harvester: unit.id,
            refinery: refinery_id,
            amount,
        });
    }

    let back_to = last_field
        .filter(|field| world.fields.get(field).is_some_and(|f| f.remaining > 0.0))
        .or_else(|| nearest_field(world, unit.position, filter.as_deref(), f32::INFINITY));
    let task = back_to.map_or(HarvestTask::Idle, |field| HarvestTask::ToField { field });
    set_task(unit, task);
}

/// Drain money into health for buildings with repair switched on.
///
/// Insufficient funds skip the tick silently; repair resumes when money
/// is available again and switches itself off at full health.
fn tick_repair(unit: &mut Unit, world: &mut World) {
    let owner = unit.owner;
    let Some(damageable) = unit.modules.damageable.as_mut() else {
        return;
    };
    if !damageable.repairing {
        return;
    }
    if damageable.health >= damageable.max_health {
        damageable.repairing = false;
        damageable.repair_debt = 0.0;
        return;
    }
    let hp = (world.config.repair_hp_per_second * TICK_SECONDS)
        .min(damageable.max_health - damageable.health);
    let projected = damageable.repair_debt + hp * world.config.repair_cost_per_hp;
    let charge = projected.floor() as i64;
    let Some(player) = world.players.get_mut(&owner) else {
        return;
    };
    if player.money < charge {
        return;
    }
    player.money -= charge;
    damageable.repair_debt = projected - charge as f32;
    damageable.heal(hp);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_parses_with_defaults() {
        let field: ResourceField =
            ron::from_str("(position: (4.0, 0.0, 2.0), remaining: 100.0)").unwrap();
        assert_eq!(field.resource, "ore");
        assert!(field.direct_money);
        assert!((field.radius - 2.0).abs() < f32::EPSILON);
        assert!((field.remaining - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_harvester_from_spec_starts_idle_and_empty() {
        let spec = HarvesterSpec {
            capacity: 50.0,
            harvest_seconds: 10.0,
            unload_seconds: 3.0,
            resource_filter: Some("crystal".to_string()),
        };
        let harvester = Harvester::from_spec(&spec);
        assert_eq!(harvester.task, HarvestTask::Idle);
        assert!(harvester.carried.abs() < f32::EPSILON);
        assert_eq!(harvester.resource_filter.as_deref(), Some("crystal"));
    }

    #[test]
    fn test_delivery_point_rotates_with_building() {
        let refinery = Refinery {
            delivery_offset: Vec3::new(0.0, 0.0, 3.0),
            starting_harvester: None,
            total_received: 0.0,
        };
        let dock = refinery.delivery_point(Vec3::new(10.0, 0.0, 10.0), 0.0);
        assert!((dock - Vec3::new(10.0, 0.0, 13.0)).length() < 1e-4);

        let turned = refinery.delivery_point(Vec3::new(10.0, 0.0, 10.0), std::f32::consts::FRAC_PI_2);
        assert!((turned - Vec3::new(13.0, 0.0, 10.0)).length() < 1e-3);
    }
}
