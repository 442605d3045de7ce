//! Data-driven unit definitions.
//!
//! A [`UnitTemplate`] holds every immutable stat a unit type carries:
//! movement, combat, economy and power characteristics. Templates are plain
//! serde structs designed to deserialize from RON; the core performs no
//! file IO (the host loads files and hands strings to the registry).
//!
//! Capability specs are optional: a template without a [`WeaponSpec`] is a
//! non-combatant, one without a [`HarvesterSpec`] never gathers, and so on.
//! The spawn path attaches exactly the modules the template declares.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SimError};

/// Broad production/selection category of a unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitCategory {
    /// Static structure; excluded from box select, placed on completion.
    Building,
    /// Foot soldier.
    Infantry,
    /// Ground vehicle.
    Vehicle,
    /// Flying unit.
    Aircraft,
}

/// How a unit moves through the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// Steered by the navigation collaborator on the ground plane.
    Ground,
    /// Direct-vector flight with yaw interpolation; ignores navigation.
    Air,
    /// Never moves (buildings, emplacements).
    Immobile,
}

/// Which movement kinds a weapon can engage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Ground units and buildings only.
    Ground,
    /// Flying units only.
    Air,
    /// Anything.
    Both,
}

impl TargetKind {
    /// Whether a weapon with this target kind can engage a unit that moves
    /// with `kind`.
    #[must_use]
    pub fn can_engage(self, kind: MoveKind) -> bool {
        match self {
            Self::Both => true,
            Self::Ground => matches!(kind, MoveKind::Ground | MoveKind::Immobile),
            Self::Air => matches!(kind, MoveKind::Air),
        }
    }
}

/// Weapon statistics for a combatant unit type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Damage per shot.
    pub damage: f32,
    /// Seconds between shots.
    pub reload_seconds: f32,
    /// Maximum firing range in world units.
    pub range: f32,
    /// Radius scanned for targets while idle.
    pub aggro_radius: f32,
    /// Projectile flight speed (world units per second).
    pub projectile_speed: f32,
    /// Which movement kinds this weapon can engage.
    pub targets: TargetKind,
    /// Whether the unit may fire while its hull is moving.
    #[serde(default)]
    pub fire_while_moving: bool,
    /// Whether line-of-fire checks skip other units entirely.
    #[serde(default)]
    pub fire_line_ignores_units: bool,
    /// Muzzle offsets cycled round-robin; empty means fire from the origin.
    #[serde(default)]
    pub shoot_points: Vec<Vec3>,
}

/// Turret statistics for units whose weapon sits on a rotating mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurretSpec {
    /// Traverse speed in radians per second.
    pub traverse_speed: f32,
    /// Angular tolerance within which the turret counts as aimed.
    pub aim_tolerance: f32,
    /// Maximum traverse angle from the hull facing, if limited.
    #[serde(default)]
    pub max_traverse: Option<f32>,
    /// Seconds between idle sweep re-targets.
    #[serde(default = "default_sweep_interval")]
    pub idle_sweep_interval: f32,
}

fn default_sweep_interval() -> f32 {
    4.0
}

/// Harvesting statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvesterSpec {
    /// Maximum load carried.
    pub capacity: f32,
    /// Seconds to fill from empty to capacity.
    pub harvest_seconds: f32,
    /// Seconds to unload a full hold at a refinery.
    pub unload_seconds: f32,
    /// Restrict gathering to fields carrying this resource, if set.
    #[serde(default)]
    pub resource_filter: Option<String>,
}

/// Refinery statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinerySpec {
    /// Offset from the building origin where harvesters dock.
    pub delivery_offset: Vec3,
    /// Template spawned next to the refinery when it is built.
    #[serde(default)]
    pub starting_harvester: Option<String>,
}

/// Production statistics for buildings that build units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSpec {
    /// Categories this building can produce.
    pub categories: Vec<UnitCategory>,
    /// Offset from the building origin where finished units appear.
    pub spawn_offset: Vec3,
    /// Offset from the building origin that finished units walk toward.
    pub rally_offset: Vec3,
}

/// Transport statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrySpec {
    /// Maximum number of passengers.
    pub capacity: usize,
}

/// Electricity contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerSpec {
    /// Supply added to the owner while the unit lives.
    #[serde(default)]
    pub supply: u32,
    /// Demand added to the owner while the unit lives.
    #[serde(default)]
    pub demand: u32,
}

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// UnitTemplate(
///     id: "trike",
///     name: "Trike",
///     category: Vehicle,
///     move_kind: Ground,
///     max_health: 110.0,
///     speed: 6.5,
///     turn_rate: 6.0,
///     vision_radius: 12.0,
///     collision_radius: 0.8,
///     price: 150,
///     build_seconds: 8.0,
///     weapon: Some(WeaponSpec(
///         damage: 9.0,
///         reload_seconds: 1.1,
///         range: 7.0,
///         aggro_radius: 10.0,
///         projectile_speed: 40.0,
///         targets: Ground,
///     )),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Unique string identifier for this unit type.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category used by production and selection rules.
    pub category: UnitCategory,
    /// How the unit moves.
    pub move_kind: MoveKind,
    /// Maximum health.
    pub max_health: f32,
    /// Movement speed in world units per second.
    #[serde(default)]
    pub speed: f32,
    /// Yaw rate in radians per second (flying units lerp with this).
    #[serde(default = "default_turn_rate")]
    pub turn_rate: f32,
    /// How far this unit sees through fog of war.
    #[serde(default = "default_vision")]
    pub vision_radius: f32,
    /// Collision sphere radius used by fire-line checks.
    #[serde(default = "default_collision")]
    pub collision_radius: f32,
    /// Cruise height for flying units.
    #[serde(default)]
    pub fly_height: f32,
    /// Per-unit squared arrival tolerance; `None` uses the world default.
    #[serde(default)]
    pub arrival_tolerance_sq: Option<f32>,
    /// Money price.
    #[serde(default)]
    pub price: u32,
    /// Seconds to produce.
    #[serde(default)]
    pub build_seconds: f32,
    /// Named resource amounts debited together with the price.
    #[serde(default)]
    pub resource_costs: BTreeMap<String, u32>,
    /// Weapon, if combatant.
    #[serde(default)]
    pub weapon: Option<WeaponSpec>,
    /// Turret mount, if the weapon traverses independently of the hull.
    #[serde(default)]
    pub turret: Option<TurretSpec>,
    /// Harvesting capability.
    #[serde(default)]
    pub harvester: Option<HarvesterSpec>,
    /// Refinery capability.
    #[serde(default)]
    pub refinery: Option<RefinerySpec>,
    /// Production capability.
    #[serde(default)]
    pub production: Option<ProductionSpec>,
    /// Transport capability.
    #[serde(default)]
    pub carrier: Option<CarrySpec>,
    /// Electricity contribution.
    #[serde(default)]
    pub power: Option<PowerSpec>,
}

fn default_turn_rate() -> f32 {
    8.0
}

fn default_vision() -> f32 {
    10.0
}

fn default_collision() -> f32 {
    0.75
}

impl UnitTemplate {
    /// Whether this template describes a structure.
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.category == UnitCategory::Building
    }

    /// Whether units of this type can fight.
    #[must_use]
    pub fn is_combatant(&self) -> bool {
        self.weapon.is_some()
    }
}

/// Registry of unit templates, immutable once the world starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, UnitTemplate>,
}

impl TemplateRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a template, keyed by its id. Replacing an existing id is
    /// treated as a data error: the first definition wins and a warning is
    /// logged.
    pub fn insert(&mut self, template: UnitTemplate) {
        if self.templates.contains_key(&template.id) {
            warn!(id = %template.id, "duplicate unit template ignored");
            return;
        }
        self.templates.insert(template.id.clone(), template);
    }

    /// Look up a template by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&UnitTemplate> {
        self.templates.get(id)
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterate templates in id order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitTemplate> {
        self.templates.values()
    }

    /// Parse a registry from a RON string holding a list of templates.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let templates: Vec<UnitTemplate> =
            ron::from_str(ron).map_err(|e| SimError::TemplateParse(e.to_string()))?;
        let mut registry = Self::new();
        for template in templates {
            registry.insert(template);
        }
        Ok(registry)
    }

    /// Check templates for inconsistent capability declarations.
    ///
    /// Problems are logged as warnings and counted; they are never fatal.
    /// The simulation runs with degraded behavior instead (a turret with no
    /// weapon simply never fires).
    pub fn validate(&self) -> usize {
        let mut warnings = 0;
        for template in self.templates.values() {
            if template.turret.is_some() && template.weapon.is_none() {
                warn!(id = %template.id, "turret spec without a weapon");
                warnings += 1;
            }
            if let Some(harvester) = &template.harvester {
                if harvester.capacity <= 0.0 {
                    warn!(id = %template.id, "harvester with non-positive capacity");
                    warnings += 1;
                }
            }
            if let Some(production) = &template.production {
                if production.categories.is_empty() {
                    warn!(id = %template.id, "production building with no categories");
                    warnings += 1;
                }
            }
            if template.move_kind != MoveKind::Immobile && template.speed <= 0.0 {
                warn!(id = %template.id, "mobile unit with non-positive speed");
                warnings += 1;
            }
            if let Some(refinery) = &template.refinery {
                if let Some(harvester_id) = &refinery.starting_harvester {
                    if !self.templates.contains_key(harvester_id) {
                        warn!(
                            id = %template.id,
                            harvester = %harvester_id,
                            "refinery names an unknown starting harvester"
                        );
                        warnings += 1;
                    }
                }
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_template(id: &str) -> UnitTemplate {
        UnitTemplate {
            id: id.to_string(),
            name: id.to_string(),
            category: UnitCategory::Vehicle,
            move_kind: MoveKind::Ground,
            max_health: 100.0,
            speed: 5.0,
            turn_rate: 8.0,
            vision_radius: 10.0,
            collision_radius: 0.75,
            fly_height: 0.0,
            arrival_tolerance_sq: None,
            price: 100,
            build_seconds: 5.0,
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

    #[test]
    fn test_target_kind_engagement() {
        assert!(TargetKind::Ground.can_engage(MoveKind::Ground));
        assert!(TargetKind::Ground.can_engage(MoveKind::Immobile));
        assert!(!TargetKind::Ground.can_engage(MoveKind::Air));
        assert!(TargetKind::Air.can_engage(MoveKind::Air));
        assert!(!TargetKind::Air.can_engage(MoveKind::Ground));
        assert!(TargetKind::Both.can_engage(MoveKind::Air));
    }

    #[test]
    fn test_duplicate_insert_keeps_first() {
        let mut registry = TemplateRegistry::new();
        let mut first = bare_template("tank");
        first.price = 300;
        registry.insert(first);

        let mut second = bare_template("tank");
        second.price = 999;
        registry.insert(second);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("tank").unwrap().price, 300);
    }

    #[test]
    fn test_validate_flags_turret_without_weapon() {
        let mut registry = TemplateRegistry::new();
        let mut template = bare_template("watchtower");
        template.turret = Some(TurretSpec {
            traverse_speed: 2.0,
            aim_tolerance: 0.05,
            max_traverse: None,
            idle_sweep_interval: 4.0,
        });
        registry.insert(template);
        assert_eq!(registry.validate(), 1);
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            [
                UnitTemplate(
                    id: "scout",
                    name: "Scout",
                    category: Vehicle,
                    move_kind: Ground,
                    max_health: 60.0,
                    speed: 9.0,
                ),
            ]
        "#;
        let registry = TemplateRegistry::from_ron_str(ron).unwrap();
        assert_eq!(registry.len(), 1);
        let scout = registry.get("scout").unwrap();
        assert!((scout.speed - 9.0).abs() < f32::EPSILON);
        assert!(!scout.is_combatant());
        // Defaults fill unspecified fields
        assert!((scout.vision_radius - 10.0).abs() < f32::EPSILON);
    }
}
