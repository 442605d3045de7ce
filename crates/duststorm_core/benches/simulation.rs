//! Simulation benchmarks for duststorm_core.
//!
//! Run with: `cargo bench -p duststorm_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use duststorm_core::prelude::*;

const TEMPLATES: &str = r#"[
    UnitTemplate(
        id: "rover",
        name: "Rover",
        category: Vehicle,
        move_kind: Ground,
        max_health: 110.0,
        speed: 6.0,
        weapon: Some(WeaponSpec(
            damage: 9.0,
            reload_seconds: 1.1,
            range: 7.0,
            aggro_radius: 10.0,
            projectile_speed: 40.0,
            targets: Ground,
        )),
    ),
]"#;

fn skirmish_world(per_side: u32) -> World {
    let templates = TemplateRegistry::from_ron_str(TEMPLATES).unwrap();
    let mut world = World::new(WorldConfig::default(), templates, 99);
    world.add_player(PlayerId(0), TeamId(0), 10_000);
    world.add_player(PlayerId(1), TeamId(1), 10_000);

    let mut squad = Vec::new();
    for i in 0..per_side {
        let x = (i % 8) as f32 * 2.0;
        let z = (i / 8) as f32 * 2.0;
        squad.push(
            world
                .spawn_unit("rover", PlayerId(0), Vec3::new(x, 0.0, z), 0.0)
                .unwrap(),
        );
        world
            .spawn_unit("rover", PlayerId(1), Vec3::new(x + 40.0, 0.0, z), 0.0)
            .unwrap();
    }
    world.issue_group_move(&squad, Vec3::new(40.0, 0.0, 8.0));
    world
}

pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("tick_64_units_skirmish", |b| {
        b.iter_batched(
            || (skirmish_world(32), StraightLineNav::new()),
            |(mut world, mut nav)| {
                for _ in 0..20 {
                    black_box(world.tick(&mut nav));
                }
                black_box(world.state_hash())
            },
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("state_hash_64_units", |b| {
        let world = skirmish_world(32);
        b.iter(|| black_box(world.state_hash()))
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
