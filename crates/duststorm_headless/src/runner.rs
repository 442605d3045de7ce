//! Scenario execution.
//!
//! A [`Runner`] owns the world built from a scenario plus the scripted
//! order timeline, and advances both in lockstep. Scripted actions fire
//! before the tick they name, so an action at tick 0 shapes the very
//! first step.

use std::io::Write;

use tracing::{debug, info, warn};

use duststorm_core::events::SimEvent;
use duststorm_core::movement::StraightLineNav;
use duststorm_core::orders::{Order, OrderKind};
use duststorm_core::unit::UnitId;
use duststorm_core::world::World;

use crate::report::Record;
use crate::scenario::{Scenario, ScenarioError, ScriptAction};

/// Condensed result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Ticks actually simulated (less than planned if the run stopped
    /// early on a defeat).
    pub ticks_run: u64,
    /// Final world state hash.
    pub hash: u64,
    /// Live units remaining.
    pub units_alive: usize,
    /// Ids of players eliminated during the run.
    pub defeated: Vec<u8>,
}

/// Drives one scenario from start to finish.
pub struct Runner {
    world: World,
    nav: StraightLineNav,
    handles: Vec<UnitId>,
    script: Vec<(u64, ScriptAction)>,
    cursor: usize,
    planned_ticks: u64,
    stop_on_defeat: bool,
    name: String,
    seed: u64,
}

impl Runner {
    /// Build the world from a scenario and queue its script.
    ///
    /// # Errors
    ///
    /// Returns an error when the scenario references an unknown template
    /// or an unregistered player.
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        let (world, handles) = scenario.build()?;
        let mut script: Vec<(u64, ScriptAction)> = scenario
            .script
            .iter()
            .map(|s| (s.at_tick, s.action.clone()))
            .collect();
        script.sort_by_key(|(at_tick, _)| *at_tick);

        info!(
            scenario = %scenario.name,
            seed = scenario.seed,
            units = handles.len(),
            "runner ready"
        );

        Ok(Self {
            world,
            nav: StraightLineNav::new(),
            handles,
            script,
            cursor: 0,
            planned_ticks: scenario.ticks,
            stop_on_defeat: scenario.stop_on_defeat,
            name: scenario.name.clone(),
            seed: scenario.seed,
        })
    }

    /// The live world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Ticks the scenario asks for.
    #[must_use]
    pub fn planned_ticks(&self) -> u64 {
        self.planned_ticks
    }

    /// Current world state hash.
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.world.state_hash()
    }

    /// Apply due scripted actions, then advance one tick.
    pub fn step(&mut self) -> Vec<SimEvent> {
        let now = self.world.tick_count();
        while self.cursor < self.script.len() && self.script[self.cursor].0 <= now {
            let action = self.script[self.cursor].1.clone();
            self.cursor += 1;
            self.apply(&action);
        }
        self.world.tick(&mut self.nav)
    }

    fn apply(&mut self, action: &ScriptAction) {
        match action {
            ScriptAction::Move { units, to } => {
                for id in self.resolve_all(units) {
                    self.world
                        .issue_order(id, Order::new(OrderKind::Move(*to)), false);
                }
            }
            ScriptAction::GroupMove { units, to } => {
                let ids = self.resolve_all(units);
                self.world.issue_group_move(&ids, *to);
            }
            ScriptAction::Attack { unit, target } => {
                if let (Some(attacker), Some(victim)) = (self.resolve(*unit), self.resolve(*target))
                {
                    self.world
                        .issue_order(attacker, Order::new(OrderKind::Attack(victim)), false);
                }
            }
            ScriptAction::Stop { units } => {
                let ids = self.resolve_all(units);
                self.world.stop_units(&ids, &mut self.nav);
            }
            ScriptAction::Enqueue { building, template } => {
                if let Some(id) = self.resolve(*building) {
                    if !self.world.enqueue_production(id, template) {
                        warn!(building = %id, template, "scripted production rejected");
                    }
                }
            }
            ScriptAction::Repair { building } => {
                if let Some(id) = self.resolve(*building) {
                    let repairing = self.world.toggle_repair(id);
                    debug!(building = %id, repairing, "scripted repair toggle");
                }
            }
        }
    }

    fn resolve(&self, index: usize) -> Option<UnitId> {
        match self.handles.get(index) {
            Some(id) => Some(*id),
            None => {
                warn!(index, "script references a unit that was never spawned");
                None
            }
        }
    }

    fn resolve_all(&self, indices: &[usize]) -> Vec<UnitId> {
        indices.iter().filter_map(|&i| self.resolve(i)).collect()
    }

    /// Run the scenario to completion, writing JSON-line records.
    ///
    /// Emits a start record, per-tick event records when `emit_events`
    /// is set, and a closing summary.
    ///
    /// # Errors
    ///
    /// Propagates write failures from the output sink.
    pub fn run(&mut self, out: &mut dyn Write, emit_events: bool) -> std::io::Result<RunSummary> {
        out.write_all(
            Record::Start {
                scenario: self.name.clone(),
                seed: self.seed,
                ticks: self.planned_ticks,
            }
            .to_json_line()
            .as_bytes(),
        )?;

        let mut defeated = Vec::new();
        for _ in 0..self.planned_ticks {
            let events = self.step();
            let tick = self.world.tick_count();
            for event in &events {
                if let SimEvent::PlayerDefeated { player } = event {
                    defeated.push(player.0);
                }
            }
            if emit_events {
                for event in events {
                    out.write_all(Record::Event { tick, event }.to_json_line().as_bytes())?;
                }
            }
            if self.stop_on_defeat && !defeated.is_empty() {
                info!(tick, "stopping early, a player was eliminated");
                break;
            }
        }

        out.write_all(Record::summary(&self.world).to_json_line().as_bytes())?;
        out.flush()?;

        Ok(RunSummary {
            ticks_run: self.world.tick_count(),
            hash: self.world.state_hash(),
            units_alive: self.world.units().filter(|u| u.alive).count(),
            defeated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{ScriptedOrder, UnitPlacement};
    use duststorm_core::math::Vec3;
    use duststorm_test_utils::determinism::verify_determinism;

    fn mover_scenario() -> Scenario {
        let mut scenario = Scenario::skirmish();
        scenario.players.truncate(1);
        scenario.players[0].units = vec![UnitPlacement::one("skirmisher", Vec3::ZERO)];
        scenario.fields.clear();
        scenario.script = vec![ScriptedOrder {
            at_tick: 0,
            action: ScriptAction::Move {
                units: vec![0],
                to: Vec3::new(20.0, 0.0, 0.0),
            },
        }];
        scenario
    }

    #[test]
    fn test_scripted_move_is_applied() {
        let mut runner = Runner::new(&mover_scenario()).unwrap();
        for _ in 0..60 {
            runner.step();
        }
        let unit = runner.world().unit(runner.handles[0]).unwrap();
        assert!(unit.position.x > 1.0, "unit never left its spawn");
    }

    #[test]
    fn test_bad_handles_are_skipped() {
        let mut scenario = mover_scenario();
        scenario.script.push(ScriptedOrder {
            at_tick: 1,
            action: ScriptAction::Attack {
                unit: 99,
                target: 0,
            },
        });
        let mut runner = Runner::new(&scenario).unwrap();
        for _ in 0..10 {
            runner.step();
        }
        assert_eq!(runner.world().tick_count(), 10);
    }

    #[test]
    fn test_run_brackets_output_with_start_and_summary() {
        let mut runner = Runner::new(&mover_scenario()).unwrap();
        let mut out = Vec::new();
        let summary = runner.run(&mut out, false).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""type":"start""#));
        assert!(lines[1].contains(r#""type":"summary""#));
        assert_eq!(summary.ticks_run, 600);
        assert_eq!(summary.units_alive, 1);
    }

    #[test]
    fn test_run_emits_events_when_asked() {
        let mut runner = Runner::new(&mover_scenario()).unwrap();
        let mut out = Vec::new();
        runner.run(&mut out, true).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("MovementStarted"));
        assert!(text.contains("MovementStopped"));
    }

    #[test]
    fn test_stop_on_defeat_ends_run_early() {
        let mut scenario = Scenario::skirmish();
        scenario.stop_on_defeat = true;
        scenario.ticks = 5_000;
        // Strip player 0 down to the raiders so the battle decides the run.
        scenario.players[0].units.truncate(0);
        scenario.players[0].units.push(UnitPlacement {
            template: "skirmisher".to_string(),
            position: Vec3::new(26.0, 0.0, 30.0),
            yaw: 0.0,
            count: 6,
            spacing: 2.0,
        });
        scenario.players[1].units = vec![UnitPlacement::one(
            "skirmisher",
            Vec3::new(30.0, 0.0, 36.0),
        )];
        scenario.script = (0..6)
            .map(|i| ScriptedOrder {
                at_tick: 0,
                action: ScriptAction::Attack { unit: i, target: 6 },
            })
            .collect();
        scenario.fields.clear();

        let mut runner = Runner::new(&scenario).unwrap();
        let summary = runner.run(&mut std::io::sink(), false).unwrap();
        assert_eq!(summary.defeated, vec![1]);
        assert!(summary.ticks_run < 5_000);
    }

    #[test]
    fn test_runner_is_deterministic() {
        let result = verify_determinism(
            3,
            240,
            || Runner::new(&Scenario::skirmish()).unwrap(),
            |runner| {
                runner.step();
            },
            Runner::hash,
        );
        result.assert_deterministic();
    }
}
