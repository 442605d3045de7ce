//! Scenario loading and world construction.
//!
//! Scenarios are RON documents that define everything a run needs: the
//! template set, players with their starting units, resource fields, and
//! a scripted order timeline. Loading one produces a [`Scenario`];
//! [`Scenario::build`] turns it into a live world.
//!
//! # Unit handles
//!
//! Scripted actions reference units by spawn index, not by raw id:
//! players in listed order, placements in listed order, then count.
//! The index stays stable no matter which units die later.
//!
//! # Example document
//!
//! ```ron
//! Scenario(
//!     name: "first contact",
//!     description: "two squads meet mid-field",
//!     seed: 7,
//!     ticks: 400,
//!     templates: [
//!         UnitTemplate(
//!             id: "skirmisher",
//!             name: "Skirmisher",
//!             category: Infantry,
//!             move_kind: Ground,
//!             max_health: 100.0,
//!             speed: 5.0,
//!             weapon: Some(WeaponSpec(
//!                 damage: 10.0,
//!                 reload_seconds: 1.0,
//!                 range: 5.0,
//!                 aggro_radius: 8.0,
//!                 projectile_speed: 60.0,
//!                 targets: Both,
//!             )),
//!         ),
//!     ],
//!     players: [
//!         PlayerSetup(
//!             id: 0,
//!             team: 0,
//!             money: 1000,
//!             local: true,
//!             units: [
//!                 UnitPlacement(template: "skirmisher", position: (0.0, 0.0, 0.0), count: 3),
//!             ],
//!         ),
//!         PlayerSetup(
//!             id: 1,
//!             team: 1,
//!             money: 1000,
//!             units: [
//!                 UnitPlacement(template: "skirmisher", position: (30.0, 0.0, 0.0), count: 3),
//!             ],
//!         ),
//!     ],
//!     script: [
//!         ScriptedOrder(at_tick: 0, action: GroupMove(units: [0, 1, 2], to: (30.0, 0.0, 2.0))),
//!     ],
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use duststorm_core::config::WorldConfig;
use duststorm_core::economy::ResourceField;
use duststorm_core::error::SimError;
use duststorm_core::math::Vec3;
use duststorm_core::player::{PlayerId, TeamId};
use duststorm_core::templates::{
    HarvesterSpec, MoveKind, ProductionSpec, RefinerySpec, TargetKind, TemplateRegistry,
    UnitCategory, UnitTemplate, WeaponSpec,
};
use duststorm_core::unit::UnitId;
use duststorm_core::world::World;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario parsed but the world could not be built from it.
    #[error("Failed to build scenario world: {0}")]
    BuildError(#[from] SimError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// World RNG seed.
    pub seed: u64,
    /// Ticks to simulate.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Stop as soon as any player is eliminated.
    #[serde(default)]
    pub stop_on_defeat: bool,
    /// World tunables; omitted fields keep their defaults.
    #[serde(default)]
    pub config: WorldConfig,
    /// Unit templates available to this scenario.
    pub templates: Vec<UnitTemplate>,
    /// Player setups.
    pub players: Vec<PlayerSetup>,
    /// Resource fields on the map.
    #[serde(default)]
    pub fields: Vec<ResourceField>,
    /// Scripted orders, applied before the tick they name.
    #[serde(default)]
    pub script: Vec<ScriptedOrder>,
}

fn default_ticks() -> u64 {
    600
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Standard built-in skirmish: a working base for player 0 and a
    /// raiding squad for player 1, with a scripted counter-attack.
    #[must_use]
    pub fn skirmish() -> Self {
        Self {
            name: "Standard Skirmish".to_string(),
            description: "Base economy under way, six on six mid-field battle".to_string(),
            seed: 2_077,
            ticks: 600,
            stop_on_defeat: false,
            config: WorldConfig::default(),
            templates: vec![
                skirmisher_template(),
                hauler_template(),
                refinery_template(),
                factory_template(),
            ],
            players: vec![
                PlayerSetup {
                    id: 0,
                    team: 0,
                    money: 1_000,
                    local: true,
                    units: vec![
                        UnitPlacement::one("refinery", Vec3::new(0.0, 0.0, 0.0)),
                        UnitPlacement::one("factory", Vec3::new(8.0, 0.0, 0.0)),
                        UnitPlacement::one("hauler", Vec3::new(3.0, 0.0, 4.0)),
                        UnitPlacement {
                            template: "skirmisher".to_string(),
                            position: Vec3::new(10.0, 0.0, 10.0),
                            yaw: 0.0,
                            count: 6,
                            spacing: 2.0,
                        },
                    ],
                },
                PlayerSetup {
                    id: 1,
                    team: 1,
                    money: 1_000,
                    local: false,
                    units: vec![UnitPlacement {
                        template: "skirmisher".to_string(),
                        position: Vec3::new(30.0, 0.0, 30.0),
                        yaw: std::f32::consts::PI,
                        count: 6,
                        spacing: 2.0,
                    }],
                },
            ],
            fields: vec![ResourceField {
                position: Vec3::new(0.0, 0.0, 18.0),
                radius: 2.0,
                remaining: 200.0,
                resource: "scrap".to_string(),
                direct_money: true,
            }],
            script: vec![
                ScriptedOrder {
                    at_tick: 0,
                    action: ScriptAction::Enqueue {
                        building: 1,
                        template: "skirmisher".to_string(),
                    },
                },
                ScriptedOrder {
                    at_tick: 40,
                    action: ScriptAction::GroupMove {
                        units: vec![3, 4, 5, 6, 7, 8],
                        to: Vec3::new(30.0, 0.0, 32.0),
                    },
                },
            ],
        }
    }

    /// Build the world and the spawn-order unit handle table.
    ///
    /// Spawns every placement in document order; scripted actions index
    /// into the returned handle list.
    pub fn build(&self) -> Result<(World, Vec<UnitId>), ScenarioError> {
        let mut registry = TemplateRegistry::new();
        for template in &self.templates {
            registry.insert(template.clone());
        }
        let mut world = World::new(self.config.clone(), registry, self.seed);

        for player in &self.players {
            world.add_player(PlayerId(player.id), TeamId(player.team), player.money);
        }
        let local = self
            .players
            .iter()
            .find(|p| p.local)
            .or_else(|| self.players.first());
        if let Some(player) = local {
            world.set_local_player(PlayerId(player.id))?;
        }

        let mut handles = Vec::new();
        for player in &self.players {
            for placement in &player.units {
                for i in 0..placement.count.max(1) {
                    let position =
                        placement.position + Vec3::new(i as f32 * placement.spacing, 0.0, 0.0);
                    let id = world.spawn_unit(
                        &placement.template,
                        PlayerId(player.id),
                        position,
                        placement.yaw,
                    )?;
                    handles.push(id);
                }
            }
        }

        for field in &self.fields {
            world.add_field(field.clone());
        }

        Ok((world, handles))
    }
}

/// Setup for a single player in the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSetup {
    /// Player identifier.
    pub id: u8,
    /// Team membership; players sharing a team never auto-engage.
    pub team: u8,
    /// Starting money.
    pub money: i64,
    /// Whether this is the local (acknowledged, fog-gated) player.
    #[serde(default)]
    pub local: bool,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
}

/// Placement of one or more units of a template at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Template id to spawn.
    pub template: String,
    /// Position of the first unit.
    pub position: Vec3,
    /// Initial facing in radians.
    #[serde(default)]
    pub yaw: f32,
    /// Number of units to spawn in a line along +x.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Distance between line members.
    #[serde(default = "default_spacing")]
    pub spacing: f32,
}

fn default_count() -> u32 {
    1
}

fn default_spacing() -> f32 {
    2.0
}

impl UnitPlacement {
    /// Place a single unit.
    #[must_use]
    pub fn one(template: &str, position: Vec3) -> Self {
        Self {
            template: template.to_string(),
            position,
            yaw: 0.0,
            count: 1,
            spacing: default_spacing(),
        }
    }
}

/// One scripted order on the scenario timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedOrder {
    /// Tick before which the action is applied.
    pub at_tick: u64,
    /// What to do.
    pub action: ScriptAction,
}

/// Scripted actions, addressed by spawn-index handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScriptAction {
    /// Replace each unit's queue with a move to `to`.
    Move {
        /// Spawn indices of the commanded units.
        units: Vec<usize>,
        /// Destination.
        to: Vec3,
    },
    /// Formation move; each unit receives its own waypoint.
    GroupMove {
        /// Spawn indices of the commanded units.
        units: Vec<usize>,
        /// Formation destination.
        to: Vec3,
    },
    /// Chase and engage another spawned unit.
    Attack {
        /// Spawn index of the attacker.
        unit: usize,
        /// Spawn index of the victim.
        target: usize,
    },
    /// Clear queues and halt.
    Stop {
        /// Spawn indices of the units to stop.
        units: Vec<usize>,
    },
    /// Queue a template on a production building.
    Enqueue {
        /// Spawn index of the producing building.
        building: usize,
        /// Template id to produce.
        template: String,
    },
    /// Toggle self-repair on a building.
    Repair {
        /// Spawn index of the building.
        building: usize,
    },
}

// ----------------------------------------------------------------------
// Built-in templates
// ----------------------------------------------------------------------

fn base_template(id: &str, category: UnitCategory, move_kind: MoveKind, speed: f32) -> UnitTemplate {
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
        resource_costs: std::collections::BTreeMap::new(),
        weapon: None,
        turret: None,
        harvester: None,
        refinery: None,
        production: None,
        carrier: None,
        power: None,
    }
}

fn skirmisher_template() -> UnitTemplate {
    let mut t = base_template("skirmisher", UnitCategory::Infantry, MoveKind::Ground, 5.0);
    t.price = 50;
    t.build_seconds = 3.0;
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

fn hauler_template() -> UnitTemplate {
    let mut t = base_template("hauler", UnitCategory::Vehicle, MoveKind::Ground, 5.0);
    t.harvester = Some(HarvesterSpec {
        capacity: 10.0,
        harvest_seconds: 2.0,
        unload_seconds: 1.0,
        resource_filter: None,
    });
    t
}

fn refinery_template() -> UnitTemplate {
    let mut t = base_template("refinery", UnitCategory::Building, MoveKind::Immobile, 0.0);
    t.max_health = 400.0;
    t.price = 300;
    t.refinery = Some(RefinerySpec {
        delivery_offset: Vec3::new(0.0, 0.0, 3.0),
        starting_harvester: None,
    });
    t
}

fn factory_template() -> UnitTemplate {
    let mut t = base_template("factory", UnitCategory::Building, MoveKind::Immobile, 0.0);
    t.max_health = 500.0;
    t.price = 400;
    t.production = Some(ProductionSpec {
        categories: vec![UnitCategory::Infantry, UnitCategory::Vehicle],
        spawn_offset: Vec3::new(0.0, 0.0, 2.0),
        rally_offset: Vec3::new(0.0, 0.0, 6.0),
    });
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_skirmish_builds() {
        let scenario = Scenario::skirmish();
        let (world, handles) = scenario.build().unwrap();

        // 9 units for player 0, 6 for player 1.
        assert_eq!(handles.len(), 15);
        assert_eq!(world.unit_count(), 15);
        assert_eq!(world.local_player(), PlayerId(0));
        assert_eq!(world.fields().count(), 1);
    }

    #[test]
    fn test_placement_lines_run_along_x() {
        let mut scenario = Scenario::skirmish();
        scenario.players.truncate(1);
        scenario.players[0].units = vec![UnitPlacement {
            template: "skirmisher".to_string(),
            position: Vec3::new(1.0, 0.0, 5.0),
            yaw: 0.0,
            count: 3,
            spacing: 4.0,
        }];
        let (world, handles) = scenario.build().unwrap();

        let third = world.unit(handles[2]).unwrap();
        assert!(third.position.distance(Vec3::new(9.0, 0.0, 5.0)) < 1e-6);
    }

    #[test]
    fn test_unknown_template_fails_build() {
        let mut scenario = Scenario::skirmish();
        scenario.players[0]
            .units
            .push(UnitPlacement::one("banshee", Vec3::ZERO));

        assert!(matches!(
            scenario.build(),
            Err(ScenarioError::BuildError(SimError::UnknownTemplate(_)))
        ));
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                description: "Minimal scenario",
                seed: 1,
                templates: [],
                players: [
                    PlayerSetup(id: 0, team: 0, money: 500, local: true),
                ],
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert_eq!(scenario.ticks, 600);
        assert!(scenario.players[0].local);
        assert!(scenario.fields.is_empty());
    }

    #[test]
    fn test_parse_script_and_field() {
        let ron = r#"
            Scenario(
                name: "Scripted",
                description: "",
                seed: 3,
                ticks: 100,
                templates: [],
                players: [PlayerSetup(id: 0, team: 0, money: 0)],
                fields: [(position: (4.0, 0.0, 2.0), remaining: 60.0)],
                script: [
                    ScriptedOrder(at_tick: 10, action: Move(units: [0], to: (8.0, 0.0, 0.0))),
                    ScriptedOrder(at_tick: 20, action: Repair(building: 2)),
                ],
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.script.len(), 2);
        assert!((scenario.fields[0].remaining - 60.0).abs() < f32::EPSILON);
        assert!(matches!(
            scenario.script[1].action,
            ScriptAction::Repair { building: 2 }
        ));
    }

    #[test]
    fn test_load_reads_file_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mini.ron");
        std::fs::write(
            &path,
            r#"Scenario(
                name: "File",
                description: "",
                seed: 9,
                templates: [],
                players: [],
            )"#,
        )
        .unwrap();

        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.seed, 9);

        let missing = Scenario::load(dir.path().join("absent.ron"));
        assert!(matches!(missing, Err(ScenarioError::FileNotFound(_))));
    }

    #[test]
    fn test_scenario_roundtrips_through_ron() {
        let scenario = Scenario::skirmish();
        let text = ron::ser::to_string(&scenario).unwrap();
        let back = Scenario::from_ron_str(&text).unwrap();
        assert_eq!(back.players.len(), scenario.players.len());
        assert_eq!(back.script.len(), scenario.script.len());
    }
}
