//! World tuning parameters.
//!
//! Everything here is gameplay tuning rather than per-unit data: scan
//! cadences, formation spacing, carry distances. The struct deserializes
//! from RON with per-field defaults so a config file only needs to name
//! the values it changes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Tunable world parameters, loaded once at world construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Default squared arrival tolerance for move orders (world units²).
    pub arrival_tolerance_sq: f32,
    /// Radius of the random offset cached by attack orders so a group of
    /// attackers spreads out instead of stacking on the target.
    pub attack_spread: f32,
    /// Seconds between idle target-acquisition scans.
    pub idle_scan_seconds: f32,
    /// Seconds between opportunistic in-range retarget scans.
    pub retarget_seconds: f32,
    /// Seconds between fog-of-war visibility sweeps.
    pub vision_seconds: f32,
    /// Seconds between harvester searches while a field or refinery is
    /// missing.
    pub harvester_search_seconds: f32,
    /// Distance from a refinery's delivery point at which unloading starts.
    pub delivery_reach: f32,
    /// Radius around a move destination within which a resource field
    /// counts as the intended harvest target.
    pub field_override_radius: f32,
    /// Production speed multiplier while electricity demand exceeds supply.
    pub low_power_multiplier: f32,
    /// Radius around a production exit that gets cleared of friendly units.
    pub nudge_radius: f32,
    /// How far a nudged unit is pushed.
    pub nudge_distance: f32,
    /// Distance at which a pending passenger is close enough to load.
    pub carry_pickup_distance: f32,
    /// Radius of the random per-slot offset applied to carried units.
    pub carry_slot_spread: f32,
    /// Length of the move order issued to a passenger on exit.
    pub exit_move_distance: f32,
    /// Double-click window for same-type selection (seconds).
    pub double_click_seconds: f32,
    /// Window for a second control-group press to re-center the camera.
    pub group_recenter_seconds: f32,
    /// Minimum spacing enforced between formation waypoints.
    pub formation_min_separation: f32,
    /// Cell size of the formation grid strategy.
    pub formation_grid_spacing: f32,
    /// Random jitter applied to each formation grid cell.
    pub formation_jitter: f32,
    /// Distance at which a projectile counts as having hit its target.
    pub projectile_hit_radius: f32,
    /// Health restored per second while a building repairs.
    pub repair_hp_per_second: f32,
    /// Money drained per point of health repaired.
    pub repair_cost_per_hp: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            arrival_tolerance_sq: 1.5 * 1.5,
            attack_spread: 2.0,
            idle_scan_seconds: 0.2,
            retarget_seconds: 0.2,
            vision_seconds: 0.25,
            harvester_search_seconds: 1.0,
            delivery_reach: 2.0,
            field_override_radius: 6.0,
            low_power_multiplier: 0.5,
            nudge_radius: 2.0,
            nudge_distance: 3.0,
            carry_pickup_distance: 2.5,
            carry_slot_spread: 0.6,
            exit_move_distance: 4.0,
            double_click_seconds: 0.3,
            group_recenter_seconds: 0.4,
            formation_min_separation: 1.5,
            formation_grid_spacing: 2.0,
            formation_jitter: 0.4,
            projectile_hit_radius: 0.5,
            repair_hp_per_second: 10.0,
            repair_cost_per_hp: 0.5,
        }
    }
}

impl WorldConfig {
    /// Parse a config from a RON string. Missing fields keep defaults.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| SimError::TemplateParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = WorldConfig::from_ron_str("(attack_spread: 5.0)").unwrap();
        assert!((config.attack_spread - 5.0).abs() < f32::EPSILON);
        assert!((config.vision_seconds - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_tolerance_matches_contract() {
        let config = WorldConfig::default();
        assert!((config.arrival_tolerance_sq - 2.25).abs() < 1e-6);
    }
}
