//! Target acquisition, turret aiming, firing and projectiles.
//!
//! There is no explicit combat state machine; everything is decided fresh
//! each tick. An idle unit periodically scans for work and orders itself to
//! attack; a busy unit periodically looks for an in-range target it could
//! switch to; and independently of both, the firing step shoots whatever
//! target is set whenever range, fire line, movement rule and turret aim
//! all line up.
//!
//! Scans take the first eligible unit in unit-id order, not the nearest.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::events::SimEvent;
use crate::math::{angle_delta, move_toward, rotate_toward, rotate_y, yaw_of};
use crate::orders::{Order, OrderKind};
use crate::templates::{TargetKind, TurretSpec, WeaponSpec};
use crate::unit::{Unit, UnitId};
use crate::world::{World, TICK_SECONDS};

/// Fraction of traverse speed used for the idle sweep.
const IDLE_SWEEP_RATE: f32 = 0.3;

/// Weapon capability and targeting state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attackable {
    /// Damage per shot.
    pub damage: f32,
    /// Seconds between shots.
    pub reload_seconds: f32,
    /// Maximum firing range.
    pub range: f32,
    /// Radius scanned while idle.
    pub aggro_radius: f32,
    /// Projectile flight speed.
    pub projectile_speed: f32,
    /// Which movement kinds this weapon can engage.
    pub targets: TargetKind,
    /// Whether the unit may fire while moving.
    pub fire_while_moving: bool,
    /// Whether fire-line checks skip other units.
    pub fire_line_ignores_units: bool,
    /// Muzzle offsets in hull space, cycled round-robin.
    pub shoot_points: Vec<Vec3>,
    /// Per-unit damage override (scenario scripting, upgrades).
    pub damage_override: Option<f32>,
    /// Per-unit reload override.
    pub reload_override: Option<f32>,
    /// Current target, set by orders and by opportunistic retargeting.
    pub target: Option<UnitId>,
    /// Seconds until the weapon may fire again.
    pub reload_remaining: f32,
    /// Seconds until the next idle acquisition scan.
    pub idle_scan_remaining: f32,
    /// Seconds until the next in-range retarget scan.
    pub retarget_remaining: f32,
    /// Next shoot point index.
    pub next_shoot_point: usize,
    /// Target of the current engagement; used to edge-trigger the
    /// start-attacking event once per engagement.
    pub engaged_target: Option<UnitId>,
}

impl Attackable {
    /// Build weapon state from a template spec.
    #[must_use]
    pub fn from_spec(spec: &WeaponSpec) -> Self {
        Self {
            damage: spec.damage,
            reload_seconds: spec.reload_seconds,
            range: spec.range,
            aggro_radius: spec.aggro_radius,
            projectile_speed: spec.projectile_speed,
            targets: spec.targets,
            fire_while_moving: spec.fire_while_moving,
            fire_line_ignores_units: spec.fire_line_ignores_units,
            shoot_points: spec.shoot_points.clone(),
            damage_override: None,
            reload_override: None,
            target: None,
            reload_remaining: 0.0,
            idle_scan_remaining: 0.0,
            retarget_remaining: 0.0,
            next_shoot_point: 0,
            engaged_target: None,
        }
    }

    /// Damage per shot after overrides.
    #[must_use]
    pub fn effective_damage(&self) -> f32 {
        self.damage_override.unwrap_or(self.damage)
    }

    /// Reload time after overrides.
    #[must_use]
    pub fn effective_reload(&self) -> f32 {
        self.reload_override.unwrap_or(self.reload_seconds)
    }
}

/// Rotating weapon mount.
///
/// The turret yaw is stored relative to the hull so a moving unit carries
/// its mount along for free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turret {
    /// Traverse speed in radians per second.
    pub traverse_speed: f32,
    /// Angular tolerance within which the turret counts as aimed.
    pub aim_tolerance: f32,
    /// Maximum traverse from the hull facing, if limited.
    pub max_traverse: Option<f32>,
    /// Seconds between idle sweep re-targets.
    pub idle_sweep_interval: f32,
    /// Current yaw relative to the hull.
    pub yaw: f32,
    /// Relative yaw the idle sweep is drifting toward.
    pub sweep_target: f32,
    /// Seconds until the idle sweep picks a new direction.
    pub sweep_remaining: f32,
}

impl Turret {
    /// Build turret state from a template spec.
    #[must_use]
    pub fn from_spec(spec: &TurretSpec) -> Self {
        Self {
            traverse_speed: spec.traverse_speed,
            aim_tolerance: spec.aim_tolerance,
            max_traverse: spec.max_traverse,
            idle_sweep_interval: spec.idle_sweep_interval,
            yaw: 0.0,
            sweep_target: 0.0,
            sweep_remaining: 0.0,
        }
    }

    /// Absolute facing of the mount.
    #[must_use]
    pub fn world_yaw(&self, hull_yaw: f32) -> f32 {
        hull_yaw + self.yaw
    }

    /// Whether the mount is within tolerance of an absolute yaw.
    #[must_use]
    pub fn is_aimed_at(&self, hull_yaw: f32, desired_world_yaw: f32) -> bool {
        angle_delta(self.world_yaw(hull_yaw), desired_world_yaw).abs() <= self.aim_tolerance
    }

    /// Clamp a relative yaw to the traverse limit.
    #[must_use]
    fn clamp_traverse(&self, relative: f32) -> f32 {
        match self.max_traverse {
            Some(limit) => relative.clamp(-limit, limit),
            None => relative,
        }
    }
}

/// Health state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Damageable {
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Whether the building is draining money to heal itself.
    pub repairing: bool,
    /// Fractional repair cost carried until a whole unit of money is due.
    pub repair_debt: f32,
}

impl Damageable {
    /// Create at full health.
    #[must_use]
    pub fn new(max_health: f32) -> Self {
        Self {
            health: max_health,
            max_health,
            repairing: false,
            repair_debt: 0.0,
        }
    }

    /// Apply damage, clamping at zero.
    pub fn apply_damage(&mut self, amount: f32) {
        self.health = (self.health - amount).max(0.0);
    }

    /// Restore health, clamping at max.
    pub fn heal(&mut self, amount: f32) {
        self.health = (self.health + amount).min(self.max_health);
    }

    /// Whether health reached zero.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

/// A shot in flight, homing on its target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    /// Unit that fired.
    pub shooter: UnitId,
    /// Unit being hit.
    pub target: UnitId,
    /// Current position.
    pub position: Vec3,
    /// Flight speed.
    pub speed: f32,
    /// Damage applied on arrival.
    pub damage: f32,
}

/// Whether `candidate` is something `attacker`'s weapon may engage.
///
/// Teammates, the attacker itself, dead or carried units, unreachable
/// movement kinds and units hidden by fog of war are all ineligible.
pub(crate) fn eligible_target(world: &World, attacker: &Unit, targets: TargetKind, candidate: &Unit) -> bool {
    candidate.id != attacker.id
        && candidate.alive
        && !candidate.is_carried()
        && candidate.team != attacker.team
        && targets.can_engage(candidate.move_kind)
        && world.is_visible_to_team(attacker.team, candidate)
}

/// First eligible hostile within `radius`, in unit-id order.
///
/// No distance sort; the first match wins even when something closer
/// exists.
pub(crate) fn scan_first_eligible(
    world: &World,
    attacker: &Unit,
    targets: TargetKind,
    radius: f32,
) -> Option<UnitId> {
    let radius_sq = radius * radius;
    for id in world.sorted_unit_ids() {
        let Some(candidate) = world.units.get(&id) else {
            continue;
        };
        if !eligible_target(world, attacker, targets, candidate) {
            continue;
        }
        if attacker.position.distance_squared(candidate.position) <= radius_sq {
            return Some(id);
        }
    }
    None
}

/// Whether the line from `shooter` to the target is unobstructed.
///
/// The cast ignores the target itself plus non-collidable and carried
/// units, and skips every unit when the weapon is configured that way.
pub(crate) fn fire_line_clear(world: &World, shooter: &Unit, target: UnitId, target_pos: Vec3) -> bool {
    let ignores_units = shooter
        .modules
        .attackable
        .as_ref()
        .is_some_and(|a| a.fire_line_ignores_units);
    if ignores_units {
        return true;
    }
    let from = shooter.position;
    for (id, other) in &world.units {
        if *id == shooter.id || *id == target {
            continue;
        }
        if !other.alive || !other.collidable || other.is_carried() {
            continue;
        }
        if segment_distance_sq(from, target_pos, other.position)
            <= other.collision_radius * other.collision_radius
        {
            return false;
        }
    }
    true
}

/// Squared distance from `point` to the segment `a`..`b`.
fn segment_distance_sq(a: Vec3, b: Vec3, point: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return point.distance_squared(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance_squared(a + ab * t)
}

/// One tick of combat for every unit, then projectile flight.
pub(crate) fn combat_phase(world: &mut World) {
    for id in world.sorted_unit_ids() {
        let Some(mut unit) = world.units.remove(&id) else {
            continue;
        };
        if unit.alive && !unit.is_carried() {
            tick_unit_combat(&mut unit, world);
        }
        world.units.insert(id, unit);
    }
    projectile_step(world);
}

/// Acquisition, retargeting, turret rotation and firing for one unit.
fn tick_unit_combat(unit: &mut Unit, world: &mut World) {
    let Some(attackable) = unit.modules.attackable.as_mut() else {
        return;
    };

    attackable.reload_remaining = (attackable.reload_remaining - TICK_SECONDS).max(0.0);
    attackable.idle_scan_remaining -= TICK_SECONDS;
    attackable.retarget_remaining -= TICK_SECONDS;

    // Drop targets that stopped being valid since last tick.
    if let Some(target) = attackable.target {
        let still_valid = world
            .live_unit(target)
            .is_some_and(|t| !t.is_carried() && attackable.targets.can_engage(t.move_kind));
        if !still_valid {
            attackable.target = None;
            attackable.engaged_target = None;
        }
    }

    let targets = attackable.targets;
    let aggro_radius = attackable.aggro_radius;
    let range = attackable.range;
    let idle = unit.orders.is_empty() && attackable.target.is_none();
    let idle_scan_due = attackable.idle_scan_remaining <= 0.0;
    let retarget_due = attackable.retarget_remaining <= 0.0;

    // (a) Idle acquisition: order ourselves to attack the first hostile
    // in aggro range.
    if idle && idle_scan_due {
        if let Some(found) = scan_first_eligible(world, unit, targets, aggro_radius) {
            unit.orders.set(Order::new(OrderKind::Attack(found)));
        }
    }
    if idle_scan_due {
        if let Some(attackable) = unit.modules.attackable.as_mut() {
            attackable.idle_scan_remaining = world.config.idle_scan_seconds;
        }
    }

    // (b) Opportunistic retarget: anything already inside firing range
    // beats walking to the ordered target.
    if retarget_due {
        let found = scan_first_eligible(world, unit, targets, range);
        if let Some(attackable) = unit.modules.attackable.as_mut() {
            if let Some(found) = found {
                if attackable.target != Some(found) {
                    attackable.target = Some(found);
                }
            }
            attackable.retarget_remaining = world.config.retarget_seconds;
        }
    }

    rotate_turret(unit, world);
    try_fire(unit, world);
}

/// Rotate the mount toward the target, or sweep idly.
fn rotate_turret(unit: &mut Unit, world: &mut World) {
    let target_pos = unit
        .modules
        .attackable
        .as_ref()
        .and_then(|a| a.target)
        .and_then(|t| world.live_unit(t))
        .map(|t| t.position);
    let hull_yaw = unit.yaw;
    let position = unit.position;
    let Some(turret) = unit.modules.turret.as_mut() else {
        return;
    };

    match target_pos {
        Some(target) => {
            let desired_relative =
                turret.clamp_traverse(angle_delta(hull_yaw, yaw_of(target - position)));
            turret.yaw = rotate_toward(turret.yaw, desired_relative, turret.traverse_speed * TICK_SECONDS);
        }
        None => {
            turret.sweep_remaining -= TICK_SECONDS;
            if turret.sweep_remaining <= 0.0 {
                turret.sweep_remaining = turret.idle_sweep_interval;
                let limit = turret.max_traverse.unwrap_or(std::f32::consts::PI);
                turret.sweep_target = world.rng.next_range(-limit, limit);
            }
            let step = turret.traverse_speed * IDLE_SWEEP_RATE * TICK_SECONDS;
            turret.yaw = rotate_toward(turret.yaw, turret.sweep_target, step);
        }
    }
}

/// Fire at the current target if every gate is open.
fn try_fire(unit: &mut Unit, world: &mut World) {
    let moving = unit.is_moving();
    let Some(attackable) = unit.modules.attackable.as_ref() else {
        return;
    };
    let Some(target) = attackable.target else {
        return;
    };
    if attackable.reload_remaining > 0.0 {
        return;
    }
    if moving && !attackable.fire_while_moving {
        return;
    }
    let Some(target_unit) = world.live_unit(target) else {
        return;
    };
    let target_pos = target_unit.position;
    let range_sq = attackable.range * attackable.range;
    if unit.position.distance_squared(target_pos) > range_sq {
        return;
    }
    if !fire_line_clear(world, unit, target, target_pos) {
        return;
    }
    if let Some(turret) = unit.modules.turret.as_ref() {
        if !turret.is_aimed_at(unit.yaw, yaw_of(target_pos - unit.position)) {
            return;
        }
    }

    let Some(attackable) = unit.modules.attackable.as_mut() else {
        return;
    };
    let shoot_index = if attackable.shoot_points.is_empty() {
        0
    } else {
        attackable.next_shoot_point % attackable.shoot_points.len()
    };
    let muzzle = attackable
        .shoot_points
        .get(shoot_index)
        .map_or(unit.position, |offset| unit.position + rotate_y(*offset, unit.yaw));
    if !attackable.shoot_points.is_empty() {
        attackable.next_shoot_point = (shoot_index + 1) % attackable.shoot_points.len();
    }

    world.projectiles.push(Projectile {
        shooter: unit.id,
        target,
        position: muzzle,
        speed: attackable.projectile_speed,
        damage: attackable.effective_damage(),
    });
    attackable.reload_remaining = attackable.effective_reload();

    if attackable.engaged_target != Some(target) {
        attackable.engaged_target = Some(target);
        world.events.push(SimEvent::AttackStarted {
            attacker: unit.id,
            target,
        });
    }
    world.events.push(SimEvent::ShotFired {
        attacker: unit.id,
        target,
        shoot_point: shoot_index,
    });
}

/// Advance every projectile; apply damage on arrival.
fn projectile_step(world: &mut World) {
    let hit_radius_sq = world.config.projectile_hit_radius * world.config.projectile_hit_radius;
    let mut projectiles = std::mem::take(&mut world.projectiles);

    projectiles.retain_mut(|projectile| {
        let Some(target) = world.units.get(&projectile.target) else {
            return false;
        };
        if !target.alive {
            return false;
        }
        let target_pos = target.position;
        projectile.position = move_toward(
            projectile.position,
            target_pos,
            projectile.speed * TICK_SECONDS,
        );
        if projectile.position.distance_squared(target_pos) > hit_radius_sq {
            return true;
        }

        let shooter = world
            .units
            .get(&projectile.shooter)
            .filter(|s| s.alive)
            .map(|s| s.id);
        if let Some(target) = world.units.get_mut(&projectile.target) {
            if let Some(damageable) = target.modules.damageable.as_mut() {
                damageable.apply_damage(projectile.damage);
                world.events.push(SimEvent::UnitDamaged {
                    unit: projectile.target,
                    amount: projectile.damage,
                    source: shooter,
                });
            }
        }
        false
    });

    world.projectiles = projectiles;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damageable_clamps_at_zero_and_max() {
        let mut health = Damageable::new(100.0);
        health.apply_damage(40.0);
        assert!((health.health - 60.0).abs() < f32::EPSILON);
        health.apply_damage(500.0);
        assert!(health.is_dead());

        health.heal(50.0);
        health.heal(1000.0);
        assert!((health.health - health.max_health).abs() < f32::EPSILON);
    }

    #[test]
    fn test_segment_distance() {
        let a = Vec3::ZERO;
        let b = Vec3::new(10.0, 0.0, 0.0);
        // Point above the middle of the segment
        assert!((segment_distance_sq(a, b, Vec3::new(5.0, 0.0, 3.0)) - 9.0).abs() < 1e-4);
        // Point beyond the end clamps to the endpoint
        assert!((segment_distance_sq(a, b, Vec3::new(13.0, 0.0, 4.0)) - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_turret_traverse_clamp() {
        let turret = Turret {
            traverse_speed: 2.0,
            aim_tolerance: 0.05,
            max_traverse: Some(1.0),
            idle_sweep_interval: 4.0,
            yaw: 0.0,
            sweep_target: 0.0,
            sweep_remaining: 0.0,
        };
        assert!((turret.clamp_traverse(2.5) - 1.0).abs() < f32::EPSILON);
        assert!((turret.clamp_traverse(-3.0) + 1.0).abs() < f32::EPSILON);
        assert!((turret.clamp_traverse(0.4) - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_weapon_overrides() {
        let spec = WeaponSpec {
            damage: 10.0,
            reload_seconds: 1.0,
            range: 5.0,
            aggro_radius: 8.0,
            projectile_speed: 30.0,
            targets: TargetKind::Both,
            fire_while_moving: false,
            fire_line_ignores_units: false,
            shoot_points: Vec::new(),
        };
        let mut weapon = Attackable::from_spec(&spec);
        assert!((weapon.effective_damage() - 10.0).abs() < f32::EPSILON);

        weapon.damage_override = Some(25.0);
        weapon.reload_override = Some(0.5);
        assert!((weapon.effective_damage() - 25.0).abs() < f32::EPSILON);
        assert!((weapon.effective_reload() - 0.5).abs() < f32::EPSILON);
    }
}
