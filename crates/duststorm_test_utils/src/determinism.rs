//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Same-seed runs must be exactly reproducible, or replay files and
//! desync detection fall apart. Sources of non-determinism include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Systems always walk units in sorted ID order.
//!
//! - **System randomness**: No calls to ambient RNGs. All "random"
//!   behavior (formation jitter, attack spread) flows through the
//!   world's seeded `SimRng`.
//!
//! - **Host navigation state**: the navigator lives outside snapshots.
//!   Movement re-submits routes after a restore, so a fresh host must
//!   stay in lockstep with the original.
//!
//! Determinism here is same-build, same-seed: `f32` math keeps runs
//! identical within one binary but makes no promise across compilers
//! or architectures.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (movement, combat, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full simulation scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use duststorm_core::movement::StraightLineNav;
use duststorm_core::world::World;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use duststorm_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     100, // 100 ticks each
///     || setup_skirmish_scenario(),
///     |state| state.step(),
///     |state| state.hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`World`].
///
/// Runs the world twice with identical setup, each run driving a fresh
/// [`StraightLineNav`], and verifies the final state hashes match.
///
/// # Example
///
/// ```
/// use duststorm_test_utils::determinism::verify_world_determinism;
/// use duststorm_test_utils::fixtures;
///
/// let is_deterministic = verify_world_determinism(|| fixtures::two_player_world(4), 50);
/// assert!(is_deterministic);
/// ```
pub fn verify_world_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> World,
{
    let result = verify_determinism(
        2,
        num_ticks,
        || (setup_fn(), StraightLineNav::new()),
        |state| {
            let (world, nav) = state;
            world.tick(nav);
        },
        |state| state.0.state_hash(),
    );
    result.is_deterministic
}

/// Run N worlds in parallel on scoped threads and collect final hashes.
///
/// Useful for catching non-determinism that only manifests under thread
/// scheduling variations or memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_worlds<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    F: Fn() -> World + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut world = setup_fn();
                    let mut nav = StraightLineNav::new();
                    for _ in 0..num_ticks {
                        world.tick(&mut nav);
                    }
                    world.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| panic!("simulation thread panicked"))
            })
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two world runs tick-by-tick, finding the first divergence.
///
/// Useful for debugging non-determinism by finding exactly when
/// simulations start to differ.
///
/// # Returns
///
/// `None` if the runs stay identical, `Some(tick)` if they diverge at
/// that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> World,
{
    let mut world_a = setup_fn();
    let mut world_b = setup_fn();
    let mut nav_a = StraightLineNav::new();
    let mut nav_b = StraightLineNav::new();

    // Check initial state
    if world_a.state_hash() != world_b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        world_a.tick(&mut nav_a);
        world_b.tick(&mut nav_b);

        if world_a.state_hash() != world_b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot round-trip preserves world state exactly.
///
/// This is critical for save/load and network synchronization.
pub fn verify_snapshot_roundtrip<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> World,
{
    let mut world = setup_fn();
    let mut nav = StraightLineNav::new();

    for _ in 0..num_ticks {
        world.tick(&mut nav);
    }

    let hash_before = world.state_hash();

    let bytes = match world.snapshot() {
        Ok(b) => b,
        Err(_) => return false,
    };

    let restored = match World::restore(&bytes) {
        Ok(w) => w,
        Err(_) => return false,
    };

    hash_before == restored.state_hash()
}

/// Verify that a restored world stays in lockstep with the original.
///
/// Runs `ticks_before` ticks, snapshots, restores into a second world,
/// then advances both for `ticks_after` ticks on fresh navigators. The
/// navigator is host state, so both sides resume equally amnesiac and
/// must re-derive identical routes.
pub fn verify_snapshot_lockstep<F>(setup_fn: F, ticks_before: u64, ticks_after: u64) -> bool
where
    F: Fn() -> World,
{
    let mut original = setup_fn();
    let mut nav = StraightLineNav::new();
    for _ in 0..ticks_before {
        original.tick(&mut nav);
    }

    let bytes = match original.snapshot() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let mut restored = match World::restore(&bytes) {
        Ok(w) => w,
        Err(_) => return false,
    };

    let mut nav_a = StraightLineNav::new();
    let mut nav_b = StraightLineNav::new();
    for _ in 0..ticks_after {
        original.tick(&mut nav_a);
        restored.tick(&mut nav_b);
    }

    original.state_hash() == restored.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use duststorm_core::math::Vec3;
    use duststorm_core::orders::OrderKind;
    use duststorm_core::unit::UnitId;
    use proptest::prelude::*;

    /// Generate a ground-plane position in a reasonable map range.
    pub fn arb_position() -> impl Strategy<Value = Vec3> {
        (-500.0f32..500.0, -500.0f32..500.0).prop_map(|(x, z)| Vec3::new(x, 0.0, z))
    }

    /// Generate a movement speed in world units per second.
    pub fn arb_speed() -> impl Strategy<Value = f32> {
        1.0f32..20.0
    }

    /// Generate a unit reference that may or may not exist in the world.
    ///
    /// Dangling references are intentional: orders against missing units
    /// must pop cleanly without disturbing determinism.
    pub fn arb_unit_ref(max_raw: u64) -> impl Strategy<Value = UnitId> {
        (1..max_raw).prop_map(UnitId)
    }

    /// Generate a Move order.
    pub fn arb_move_order() -> impl Strategy<Value = OrderKind> {
        arb_position().prop_map(OrderKind::Move)
    }

    /// Generate any order kind, with unit references drawn from `1..max_raw`.
    pub fn arb_order(max_raw: u64) -> impl Strategy<Value = OrderKind> {
        prop_oneof![
            arb_move_order(),
            arb_unit_ref(max_raw).prop_map(OrderKind::Attack),
            arb_unit_ref(max_raw).prop_map(OrderKind::Follow),
        ]
    }

    /// Generate a sequence of orders.
    pub fn arb_order_sequence(
        max_raw: u64,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<OrderKind>> {
        proptest::collection::vec(arb_order(max_raw), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use duststorm_core::events::SimEvent;
    use duststorm_core::math::Vec3;
    use duststorm_core::orders::{Order, OrderKind, OrderQueue};
    use duststorm_core::player::{PlayerId, TeamId};
    use duststorm_core::templates::TemplateRegistry;
    use duststorm_core::world::World;
    use proptest::prelude::*;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_empty_world_determinism() {
        assert!(verify_world_determinism(
            || fixtures::two_player_world(1),
            100
        ));
    }

    #[test]
    fn test_single_mover_determinism() {
        let is_det = verify_world_determinism(
            || {
                let mut world = fixtures::two_player_world(2);
                let ids = fixtures::spawn_grid(
                    &mut world,
                    "skirmisher",
                    PlayerId(0),
                    Vec3::ZERO,
                    1,
                    1,
                    2.0,
                );
                world.issue_order(
                    ids[0],
                    Order::new(OrderKind::Move(Vec3::new(80.0, 0.0, 40.0))),
                    false,
                );
                world
            },
            200,
        );
        assert!(is_det);
    }

    #[test]
    fn test_find_divergence_on_deterministic_world() {
        let divergence = find_first_divergence(setup_skirmish_scenario, 100);
        assert!(divergence.is_none(), "Expected no divergence");
    }

    // =========================================================================
    // Integration tests: Combat determinism
    // =========================================================================

    fn setup_skirmish_scenario() -> World {
        let mut world = fixtures::two_player_world(11);

        let squad = fixtures::spawn_grid(
            &mut world,
            "skirmisher",
            PlayerId(0),
            Vec3::ZERO,
            8,
            4,
            2.0,
        );
        fixtures::spawn_grid(
            &mut world,
            "skirmisher",
            PlayerId(1),
            Vec3::new(30.0, 0.0, 0.0),
            8,
            4,
            2.0,
        );

        world.issue_group_move(&squad, Vec3::new(30.0, 0.0, 2.0));
        world
    }

    #[test]
    fn test_skirmish_determinism() {
        let result = verify_determinism(
            5,
            300,
            || (setup_skirmish_scenario(), StraightLineNav::new()),
            |state| {
                let (world, nav) = state;
                world.tick(nav);
            },
            |state| state.0.state_hash(),
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_skirmish_damage_is_exact() {
        let mut world_a = setup_skirmish_scenario();
        let mut world_b = setup_skirmish_scenario();
        let mut nav_a = StraightLineNav::new();
        let mut nav_b = StraightLineNav::new();

        for tick in 0..300 {
            let damage = |events: Vec<SimEvent>| {
                events
                    .into_iter()
                    .filter(|e| {
                        matches!(
                            e,
                            SimEvent::UnitDamaged { .. } | SimEvent::ShotFired { .. }
                        )
                    })
                    .collect::<Vec<_>>()
            };
            let events_a = damage(world_a.tick(&mut nav_a));
            let events_b = damage(world_b.tick(&mut nav_b));

            assert_eq!(events_a, events_b, "damage events diverged at tick {tick}");
        }
    }

    // =========================================================================
    // Integration tests: Economy determinism
    // =========================================================================

    fn setup_harvest_scenario() -> World {
        let mut world = fixtures::two_player_world(13);

        fixtures::spawn_grid(&mut world, "refinery", PlayerId(0), Vec3::ZERO, 1, 1, 0.0);
        fixtures::spawn_grid(
            &mut world,
            "hauler",
            PlayerId(0),
            Vec3::new(4.0, 0.0, 4.0),
            2,
            2,
            2.0,
        );
        world.add_field(fixtures::field_at(Vec3::new(0.0, 0.0, 24.0), 80.0));
        world.add_field(fixtures::field_at(Vec3::new(12.0, 0.0, 20.0), 40.0));

        world
    }

    #[test]
    fn test_harvest_determinism() {
        let result = verify_determinism(
            3,
            600,
            || (setup_harvest_scenario(), StraightLineNav::new()),
            |state| {
                let (world, nav) = state;
                world.tick(nav);
            },
            |state| state.0.state_hash(),
        );
        result.assert_deterministic();
    }

    // =========================================================================
    // Snapshot round-trip tests
    // =========================================================================

    #[test]
    fn test_snapshot_preserves_fresh_world() {
        assert!(verify_snapshot_roundtrip(
            || fixtures::two_player_world(3),
            0
        ));
    }

    #[test]
    fn test_snapshot_preserves_mid_battle_state() {
        assert!(verify_snapshot_roundtrip(setup_skirmish_scenario, 120));
    }

    #[test]
    fn test_snapshot_lockstep_through_battle() {
        assert!(verify_snapshot_lockstep(setup_skirmish_scenario, 60, 120));
    }

    #[test]
    fn test_snapshot_lockstep_through_harvest() {
        assert!(verify_snapshot_lockstep(setup_harvest_scenario, 90, 200));
    }

    // =========================================================================
    // Parallel simulation tests
    // =========================================================================

    #[test]
    fn test_parallel_empty_worlds() {
        let result = run_parallel_worlds(|| fixtures::two_player_world(5), 4, 100);
        result.assert_deterministic();
    }

    #[test]
    fn test_parallel_skirmish_worlds() {
        let result = run_parallel_worlds(setup_skirmish_scenario, 4, 300);
        result.assert_deterministic();
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        /// Any random spawn position should produce deterministic results.
        #[test]
        fn prop_random_spawn_positions_are_deterministic(
            position in strategies::arb_position(),
        ) {
            let setup = move || {
                let mut world = fixtures::two_player_world(17);
                fixtures::spawn_grid(&mut world, "skirmisher", PlayerId(0), position, 1, 1, 0.0);
                world
            };

            prop_assert!(verify_world_determinism(setup, 50));
        }

        /// Random movement speeds should produce deterministic results.
        #[test]
        fn prop_random_speeds_are_deterministic(
            speed in strategies::arb_speed(),
            target in strategies::arb_position(),
        ) {
            let setup = move || {
                let mut registry = TemplateRegistry::new();
                registry.insert(fixtures::mover_with_speed(speed));
                let mut world = World::new(
                    duststorm_core::config::WorldConfig::default(),
                    registry,
                    3,
                );
                world.add_player(PlayerId(0), TeamId(0), 0);
                world.set_local_player(PlayerId(0)).unwrap();
                let id = world
                    .spawn_unit("mover", PlayerId(0), Vec3::ZERO, 0.0)
                    .unwrap();
                world.issue_order(id, Order::new(OrderKind::Move(target)), false);
                world
            };

            prop_assert!(verify_world_determinism(setup, 100));
        }

        /// Random order sequences, including dangling unit references,
        /// must replay identically.
        #[test]
        fn prop_order_sequences_are_replayable(
            orders in strategies::arb_order_sequence(20, 10),
        ) {
            let orders_clone = orders.clone();

            let setup = move || {
                let mut world = fixtures::two_player_world(19);
                let ids = fixtures::spawn_grid(
                    &mut world,
                    "skirmisher",
                    PlayerId(0),
                    Vec3::ZERO,
                    3,
                    3,
                    2.0,
                );
                for (i, kind) in orders_clone.iter().enumerate() {
                    world.issue_order(ids[0], Order::new(*kind), i > 0);
                }
                world
            };

            prop_assert!(verify_world_determinism(setup, 100));
        }

        /// Snapshot round-trips must preserve state for any squad size.
        #[test]
        fn prop_snapshot_roundtrip_is_exact(
            num_units in 1u32..8,
            num_ticks in 0u64..80,
        ) {
            let setup = move || {
                let mut world = fixtures::two_player_world(23);
                let squad = fixtures::spawn_grid(
                    &mut world,
                    "skirmisher",
                    PlayerId(0),
                    Vec3::ZERO,
                    num_units,
                    4,
                    2.0,
                );
                world.issue_group_move(&squad, Vec3::new(50.0, 0.0, 10.0));
                world
            };

            prop_assert!(verify_snapshot_roundtrip(setup, num_ticks));
        }

        /// Group moves must hand every unit its own waypoint: as many
        /// orders as units, all destinations distinct.
        #[test]
        fn prop_group_move_waypoints_are_unique(
            origin in strategies::arb_position(),
            destination in strategies::arb_position(),
            num_units in 1u32..12,
        ) {
            let mut world = fixtures::two_player_world(29);
            let squad = fixtures::spawn_grid(
                &mut world,
                "skirmisher",
                PlayerId(0),
                origin,
                num_units,
                4,
                2.0,
            );

            world.issue_group_move(&squad, destination);

            let mut goals = Vec::new();
            for id in &squad {
                let unit = world.unit(*id).unwrap();
                prop_assert_eq!(unit.orders.len(), 1);
                if let Some(Order { kind: OrderKind::Move(goal), .. }) =
                    unit.orders.current().copied()
                {
                    goals.push(goal);
                }
            }
            prop_assert_eq!(goals.len(), squad.len());
            for i in 0..goals.len() {
                for j in (i + 1)..goals.len() {
                    prop_assert!(goals[i].distance_squared(goals[j]) > 1e-6);
                }
            }
        }

        /// The order queue hands orders back first-in first-out, and a
        /// non-additive set collapses whatever was queued.
        #[test]
        fn prop_order_queue_is_fifo_and_set_replaces(
            kinds in strategies::arb_order_sequence(20, 10),
            replacement in strategies::arb_move_order(),
        ) {
            let mut queue = OrderQueue::new();
            for (i, kind) in kinds.iter().enumerate() {
                if i == 0 {
                    queue.set(Order::new(*kind));
                } else {
                    queue.push(Order::new(*kind));
                }
            }
            prop_assert_eq!(queue.len(), kinds.len());

            for kind in &kinds {
                prop_assert_eq!(queue.pop().map(|o| o.kind), Some(*kind));
            }
            prop_assert!(queue.is_empty());

            for kind in &kinds {
                queue.push(Order::new(*kind));
            }
            queue.set(Order::new(replacement));
            prop_assert_eq!(queue.len(), 1);
            prop_assert_eq!(queue.current().map(|o| o.kind), Some(replacement));
        }
    }

    // =========================================================================
    // Stress tests (only run explicitly with --ignored)
    // =========================================================================

    #[test]
    #[ignore = "Long-running stress test"]
    fn stress_test_many_units() {
        let setup = || {
            let mut world = fixtures::two_player_world(31);
            let squad = fixtures::spawn_grid(
                &mut world,
                "skirmisher",
                PlayerId(0),
                Vec3::ZERO,
                50,
                10,
                2.0,
            );
            fixtures::spawn_grid(
                &mut world,
                "skirmisher",
                PlayerId(1),
                Vec3::new(60.0, 0.0, 0.0),
                50,
                10,
                2.0,
            );
            world.issue_group_move(&squad, Vec3::new(60.0, 0.0, 10.0));
            world
        };

        let result = verify_determinism(
            5,
            1000,
            || (setup(), StraightLineNav::new()),
            |state| {
                let (world, nav) = state;
                world.tick(nav);
            },
            |state| state.0.state_hash(),
        );
        result.assert_deterministic();
    }

    #[test]
    #[ignore = "Long-running stress test"]
    fn stress_test_parallel_many_worlds() {
        let result = run_parallel_worlds(setup_skirmish_scenario, 16, 500);
        result.assert_deterministic();
    }
}
