//! Test fixtures and helpers.
//!
//! Pre-built unit templates, world builders and spawn helpers
//! for consistent testing across crates.

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};

use duststorm_core::config::WorldConfig;
use duststorm_core::economy::ResourceField;
use duststorm_core::events::SimEvent;
use duststorm_core::movement::Navigator;
use duststorm_core::player::{PlayerId, TeamId};
use duststorm_core::selection::ScreenProjector;
use duststorm_core::templates::{
    CarrySpec, HarvesterSpec, MoveKind, PowerSpec, ProductionSpec, RefinerySpec, TargetKind,
    TemplateRegistry, TurretSpec, UnitCategory, UnitTemplate, WeaponSpec,
};
use duststorm_core::unit::UnitId;
use duststorm_core::world::World;

/// Projector that reports every world position as on-screen at the origin.
///
/// Lets selection tests drive box and click selection without a camera.
#[derive(Debug, Default)]
pub struct FullScreenProjector;

impl ScreenProjector for FullScreenProjector {
    fn project(&self, _world: Vec3) -> Option<Vec2> {
        Some(Vec2::ZERO)
    }
}

fn base(id: &str, category: UnitCategory, move_kind: MoveKind, speed: f32) -> UnitTemplate {
    UnitTemplate {
        id: id.to_string(),
        name: id.to_string(),
        category,
        move_kind,
        max_health: 100.0,
        speed,
        turn_rate: 8.0,
        vision_radius: 10.0,
        collision_radius: 0.75,
        fly_height: 0.0,
        arrival_tolerance_sq: None,
        price: 100,
        build_seconds: 2.0,
        resource_costs: BTreeMap::new(),
        weapon: None,
        turret: None,
        harvester: None,
        refinery: None,
        production: None,
        carrier: None,
        power: None,
    }
}

/// Basic ranged infantry. The workhorse of combat scenarios.
#[must_use]
pub fn skirmisher() -> UnitTemplate {
    let mut t = base("skirmisher", UnitCategory::Infantry, MoveKind::Ground, 5.0);
    t.price = 50;
    t.weapon = Some(WeaponSpec {
        damage: 10.0,
        reload_seconds: 1.0,
        range: 5.0,
        aggro_radius: 8.0,
        projectile_speed: 60.0,
        targets: TargetKind::Both,
        fire_while_moving: false,
        fire_line_ignores_units: false,
        shoot_points: Vec::new(),
    });
    t
}

/// Ground harvester with a small hold.
#[must_use]
pub fn hauler() -> UnitTemplate {
    let mut t = base("hauler", UnitCategory::Vehicle, MoveKind::Ground, 5.0);
    t.harvester = Some(HarvesterSpec {
        capacity: 10.0,
        harvest_seconds: 2.0,
        unload_seconds: 1.0,
        resource_filter: None,
    });
    t
}

/// Delivery point for haulers.
#[must_use]
pub fn refinery() -> UnitTemplate {
    let mut t = base("refinery", UnitCategory::Building, MoveKind::Immobile, 0.0);
    t.max_health = 400.0;
    t.price = 300;
    t.refinery = Some(RefinerySpec {
        delivery_offset: Vec3::new(0.0, 0.0, 3.0),
        starting_harvester: None,
    });
    t
}

/// Production building for infantry and vehicles.
#[must_use]
pub fn factory() -> UnitTemplate {
    let mut t = base("factory", UnitCategory::Building, MoveKind::Immobile, 0.0);
    t.max_health = 500.0;
    t.price = 400;
    t.production = Some(ProductionSpec {
        categories: vec![UnitCategory::Infantry, UnitCategory::Vehicle],
        spawn_offset: Vec3::new(0.0, 0.0, 2.0),
        rally_offset: Vec3::new(0.0, 0.0, 6.0),
    });
    t
}

/// Electricity supplier with no other role.
#[must_use]
pub fn generator() -> UnitTemplate {
    let mut t = base("generator", UnitCategory::Building, MoveKind::Immobile, 0.0);
    t.max_health = 200.0;
    t.price = 150;
    t.power = Some(PowerSpec {
        supply: 100,
        demand: 0,
    });
    t
}

/// Immobile defense turret.
#[must_use]
pub fn watchtower() -> UnitTemplate {
    let mut t = base("watchtower", UnitCategory::Building, MoveKind::Immobile, 0.0);
    t.max_health = 250.0;
    t.price = 200;
    t.weapon = Some(WeaponSpec {
        damage: 15.0,
        reload_seconds: 1.0,
        range: 6.0,
        aggro_radius: 8.0,
        projectile_speed: 60.0,
        targets: TargetKind::Both,
        fire_while_moving: false,
        fire_line_ignores_units: false,
        shoot_points: Vec::new(),
    });
    t.turret = Some(TurretSpec {
        traverse_speed: 10.0,
        aim_tolerance: 0.2,
        max_traverse: None,
        idle_sweep_interval: 4.0,
    });
    t
}

/// Ground transport that carries four passengers.
#[must_use]
pub fn transport() -> UnitTemplate {
    let mut t = base("transport", UnitCategory::Vehicle, MoveKind::Ground, 4.0);
    t.max_health = 180.0;
    t.price = 200;
    t.carrier = Some(CarrySpec { capacity: 4 });
    t
}

/// Flying gunner that fires on ground targets while moving.
#[must_use]
pub fn gunship() -> UnitTemplate {
    let mut t = base("gunship", UnitCategory::Aircraft, MoveKind::Air, 9.0);
    t.fly_height = 6.0;
    t.price = 250;
    t.weapon = Some(WeaponSpec {
        damage: 8.0,
        reload_seconds: 0.8,
        range: 6.0,
        aggro_radius: 10.0,
        projectile_speed: 60.0,
        targets: TargetKind::Ground,
        fire_while_moving: true,
        fire_line_ignores_units: true,
        shoot_points: Vec::new(),
    });
    t
}

/// Unarmed ground unit with a caller-chosen speed, for movement tests.
#[must_use]
pub fn mover_with_speed(speed: f32) -> UnitTemplate {
    base("mover", UnitCategory::Vehicle, MoveKind::Ground, speed)
}

/// Registry holding every fixture template.
#[must_use]
pub fn standard_registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    registry.insert(skirmisher());
    registry.insert(hauler());
    registry.insert(refinery());
    registry.insert(factory());
    registry.insert(generator());
    registry.insert(watchtower());
    registry.insert(transport());
    registry.insert(gunship());
    registry
}

/// Two-player world on opposing teams, player 0 local, 1000 money each.
///
/// # Panics
///
/// Panics if the local player cannot be set, which would indicate a broken
/// fixture rather than a recoverable condition.
#[must_use]
pub fn two_player_world(seed: u64) -> World {
    let mut world = World::new(WorldConfig::default(), standard_registry(), seed);
    world.add_player(PlayerId(0), TeamId(0), 1_000);
    world.add_player(PlayerId(1), TeamId(1), 1_000);
    world
        .set_local_player(PlayerId(0))
        .expect("player 0 was just added");
    world
}

/// A resource field fixture.
#[must_use]
pub fn field_at(position: Vec3, remaining: f32) -> ResourceField {
    ResourceField {
        position,
        radius: 2.0,
        remaining,
        resource: "scrap".to_string(),
        direct_money: true,
    }
}

/// Spawn `count` units in rows of `per_row`, starting at `origin`.
///
/// # Panics
///
/// Panics if `template` is not registered; fixtures are test plumbing and
/// fail loudly on bad setup.
pub fn spawn_grid(
    world: &mut World,
    template: &str,
    owner: PlayerId,
    origin: Vec3,
    count: u32,
    per_row: u32,
    spacing: f32,
) -> Vec<UnitId> {
    let per_row = per_row.max(1);
    let mut ids = Vec::with_capacity(count as usize);
    for i in 0..count {
        let offset = Vec3::new(
            (i % per_row) as f32 * spacing,
            0.0,
            (i / per_row) as f32 * spacing,
        );
        match world.spawn_unit(template, owner, origin + offset, 0.0) {
            Ok(id) => ids.push(id),
            Err(err) => panic!("fixture spawn of '{template}' failed: {err}"),
        }
    }
    ids
}

/// Advance the world `n` ticks and collect every event raised.
pub fn run_ticks(world: &mut World, nav: &mut dyn Navigator, n: u64) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for _ in 0..n {
        events.extend(world.tick(nav));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use duststorm_core::movement::StraightLineNav;

    #[test]
    fn test_standard_registry_is_clean() {
        let registry = standard_registry();
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.validate(), 0, "fixture templates must validate");
    }

    #[test]
    fn test_spawn_grid_places_rows() {
        let mut world = two_player_world(1);
        let ids = spawn_grid(
            &mut world,
            "skirmisher",
            PlayerId(0),
            Vec3::ZERO,
            5,
            2,
            2.0,
        );
        assert_eq!(ids.len(), 5);
        let last = world.unit(ids[4]).unwrap();
        assert!(last.position.distance(Vec3::new(0.0, 0.0, 4.0)) < 1e-6);
    }

    #[test]
    fn test_run_ticks_advances_clock() {
        let mut world = two_player_world(2);
        let mut nav = StraightLineNav::new();
        run_ticks(&mut world, &mut nav, 10);
        assert_eq!(world.tick_count(), 10);
    }
}
