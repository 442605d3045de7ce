//! Balance testing utilities for headless battles.
//!
//! This module runs scripted battles between two armies to measure how
//! template tuning shifts matchups: win rates, time to resolution, and
//! how much of the winning army is left standing.

use tracing::{debug, warn};

use duststorm_core::events::SimEvent;
use duststorm_core::math::Vec3;
use duststorm_core::movement::StraightLineNav;
use duststorm_core::orders::{Order, OrderKind};
use duststorm_core::player::PlayerId;
use duststorm_core::templates::TemplateRegistry;
use duststorm_core::world::World;

use crate::fixtures;

/// One side of a battle: fixture template ids and counts.
#[derive(Debug, Clone, Default)]
pub struct Army {
    entries: Vec<(String, u32)>,
}

impl Army {
    /// Create an empty army.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` units of `template` to the army.
    #[must_use]
    pub fn with(mut self, template: &str, count: u32) -> Self {
        self.entries.push((template.to_string(), count));
        self
    }

    /// Total number of units in the army.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Total money value of the army at template prices.
    #[must_use]
    pub fn value(&self, registry: &TemplateRegistry) -> i64 {
        self.entries
            .iter()
            .map(|(template, count)| match registry.get(template) {
                Some(t) => i64::from(t.price) * i64::from(*count),
                None => {
                    warn!(template = %template, "army values unknown template as 0");
                    0
                }
            })
            .sum()
    }
}

/// Result of a simulated battle.
#[derive(Debug, Clone)]
pub struct BattleResult {
    /// The winning player (None if draw or timeout).
    pub winner: Option<PlayerId>,
    /// Simulation ticks elapsed.
    pub ticks: u64,
    /// Starting army value for player A.
    pub starting_value_a: i64,
    /// Starting army value for player B.
    pub starting_value_b: i64,
    /// Remaining army value for player A.
    pub remaining_value_a: i64,
    /// Remaining army value for player B.
    pub remaining_value_b: i64,
}

/// Statistics for a set of battles.
#[derive(Debug, Clone, Default)]
pub struct BattleStats {
    /// Total battles run.
    pub total_battles: u32,
    /// Wins for player A.
    pub wins_a: u32,
    /// Wins for player B.
    pub wins_b: u32,
    /// Draws (timeouts or simultaneous elimination).
    pub draws: u32,
    /// Average ticks to resolution.
    pub avg_ticks: f64,
    /// Average remaining value ratio (winner's remaining / loser's starting).
    pub avg_remaining_ratio: f64,
}

impl BattleStats {
    /// Win rate for player A (0.0 to 1.0).
    #[must_use]
    pub fn win_rate_a(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        f64::from(self.wins_a) / f64::from(self.total_battles)
    }

    /// Win rate for player B (0.0 to 1.0).
    #[must_use]
    pub fn win_rate_b(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        f64::from(self.wins_b) / f64::from(self.total_battles)
    }

    /// Check if the matchup's A win rate sits within an acceptable range.
    #[must_use]
    pub fn is_balanced(&self, min_rate: f64, max_rate: f64) -> bool {
        let rate = self.win_rate_a();
        rate >= min_rate && rate <= max_rate
    }
}

fn remaining_value(world: &World, registry: &TemplateRegistry, player: PlayerId) -> i64 {
    world
        .units()
        .filter(|unit| unit.owner == player && unit.alive)
        .filter_map(|unit| registry.get(&unit.template))
        .map(|template| i64::from(template.price))
        .sum()
}

/// Run one battle to elimination or the tick cap.
///
/// Both armies spawn in grids 40 units apart, and every unit queues
/// attack orders across the whole opposing roster, so survivors chase
/// down the next enemy as each target falls. The battle ends the tick a
/// `PlayerDefeated` event fires, or at `max_ticks` as a draw. Armies
/// with zero units never raise a defeat and always time out.
#[must_use]
pub fn run_battle(army_a: &Army, army_b: &Army, seed: u64, max_ticks: u64) -> BattleResult {
    let registry = fixtures::standard_registry();
    let mut world = fixtures::two_player_world(seed);
    let mut nav = StraightLineNav::new();

    let mut squad_a = Vec::new();
    for (template, count) in &army_a.entries {
        squad_a.extend(fixtures::spawn_grid(
            &mut world,
            template,
            PlayerId(0),
            Vec3::new(0.0, 0.0, squad_a.len() as f32 * 2.0),
            *count,
            4,
            2.0,
        ));
    }
    let mut squad_b = Vec::new();
    for (template, count) in &army_b.entries {
        squad_b.extend(fixtures::spawn_grid(
            &mut world,
            template,
            PlayerId(1),
            Vec3::new(40.0, 0.0, squad_b.len() as f32 * 2.0),
            *count,
            4,
            2.0,
        ));
    }

    for &id in &squad_a {
        for (i, &enemy) in squad_b.iter().enumerate() {
            world.issue_order(id, Order::new(OrderKind::Attack(enemy)), i > 0);
        }
    }
    for &id in &squad_b {
        for (i, &enemy) in squad_a.iter().enumerate() {
            world.issue_order(id, Order::new(OrderKind::Attack(enemy)), i > 0);
        }
    }

    let mut a_defeated = false;
    let mut b_defeated = false;
    let mut ticks = 0;
    for _ in 0..max_ticks {
        let events = world.tick(&mut nav);
        ticks += 1;
        for event in events {
            match event {
                SimEvent::PlayerDefeated { player } if player == PlayerId(0) => a_defeated = true,
                SimEvent::PlayerDefeated { player } if player == PlayerId(1) => b_defeated = true,
                _ => {}
            }
        }
        if a_defeated || b_defeated {
            break;
        }
    }

    let winner = match (a_defeated, b_defeated) {
        (false, true) => Some(PlayerId(0)),
        (true, false) => Some(PlayerId(1)),
        _ => None,
    };

    let result = BattleResult {
        winner,
        ticks,
        starting_value_a: army_a.value(&registry),
        starting_value_b: army_b.value(&registry),
        remaining_value_a: remaining_value(&world, &registry, PlayerId(0)),
        remaining_value_b: remaining_value(&world, &registry, PlayerId(1)),
    };
    debug!(
        seed = seed,
        ticks = result.ticks,
        winner = ?result.winner,
        "battle resolved"
    );
    result
}

/// Run a seed-swept matchup and aggregate the results.
#[must_use]
pub fn run_matchup(
    army_a: &Army,
    army_b: &Army,
    battles: u32,
    base_seed: u64,
    max_ticks: u64,
) -> BattleStats {
    let mut stats = BattleStats::default();
    let mut total_ticks = 0u64;
    let mut ratio_sum = 0.0;
    let mut decided = 0u32;

    for i in 0..battles {
        let result = run_battle(army_a, army_b, base_seed + u64::from(i), max_ticks);
        stats.total_battles += 1;
        total_ticks += result.ticks;

        match result.winner {
            Some(PlayerId(0)) => {
                stats.wins_a += 1;
                if result.starting_value_b > 0 {
                    ratio_sum +=
                        result.remaining_value_a as f64 / result.starting_value_b as f64;
                    decided += 1;
                }
            }
            Some(_) => {
                stats.wins_b += 1;
                if result.starting_value_a > 0 {
                    ratio_sum +=
                        result.remaining_value_b as f64 / result.starting_value_a as f64;
                    decided += 1;
                }
            }
            None => stats.draws += 1,
        }
    }

    if stats.total_battles > 0 {
        stats.avg_ticks = total_ticks as f64 / f64::from(stats.total_battles);
    }
    if decided > 0 {
        stats.avg_remaining_ratio = ratio_sum / f64::from(decided);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_army_value_sums_prices() {
        let registry = fixtures::standard_registry();
        // 4 skirmishers at 50 plus a transport at 200.
        let army = Army::new().with("skirmisher", 4).with("transport", 1);
        assert_eq!(army.value(&registry), 400);
        assert_eq!(army.unit_count(), 5);
    }

    #[test]
    fn test_battle_stats_win_rate() {
        let stats = BattleStats {
            total_battles: 100,
            wins_a: 55,
            wins_b: 40,
            draws: 5,
            avg_ticks: 1000.0,
            avg_remaining_ratio: 0.3,
        };

        assert!((stats.win_rate_a() - 0.55).abs() < 0.001);
        assert!((stats.win_rate_b() - 0.40).abs() < 0.001);
        assert!(stats.is_balanced(0.45, 0.55));
    }

    #[test]
    fn test_lopsided_battle_resolves() {
        let strong = Army::new().with("skirmisher", 6);
        let weak = Army::new().with("skirmisher", 1);

        let result = run_battle(&strong, &weak, 42, 2_000);

        assert_eq!(result.winner, Some(PlayerId(0)));
        assert!(result.ticks < 2_000);
        assert!(result.remaining_value_a > 0);
        assert_eq!(result.remaining_value_b, 0);
    }

    #[test]
    fn test_battle_is_seed_reproducible() {
        let army = Army::new().with("skirmisher", 4);
        let first = run_battle(&army, &army, 7, 1_500);
        let second = run_battle(&army, &army, 7, 1_500);

        assert_eq!(first.winner, second.winner);
        assert_eq!(first.ticks, second.ticks);
        assert_eq!(first.remaining_value_a, second.remaining_value_a);
        assert_eq!(first.remaining_value_b, second.remaining_value_b);
    }

    #[test]
    fn test_matchup_accounts_every_battle() {
        let army = Army::new().with("skirmisher", 3);
        let stats = run_matchup(&army, &army, 3, 100, 1_500);

        assert_eq!(stats.total_battles, 3);
        assert_eq!(stats.wins_a + stats.wins_b + stats.draws, 3);
        assert!(stats.avg_ticks > 0.0);
    }
}
