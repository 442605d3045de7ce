//! Selection, control groups and camera-focus cycling.
//!
//! One ordered selection list exists per world, for the local player only.
//! Hit resolution is the host's job (its renderer owns the camera), so
//! every operation here takes already-resolved unit ids or a
//! [`ScreenProjector`] it can ask about screen positions. A carried unit
//! never enters the list and is dropped the moment it is loaded.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

use crate::events::SimEvent;
use crate::unit::{Unit, UnitId};
use crate::world::World;

/// Screen projection supplied by the host for on-screen and box checks.
pub trait ScreenProjector {
    /// Screen position of a world point, or `None` when off screen.
    fn project(&self, world: Vec3) -> Option<Vec2>;
}

/// The local player's selection and group bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionManager {
    /// Currently selected units, in selection order.
    pub selected: Vec<UnitId>,
    /// Template of the last single click, for double-click detection.
    last_click_template: Option<String>,
    /// Sim time of the last single click.
    last_click_time: f32,
    /// Last control group pressed and when, for the re-center double press.
    last_group_press: Option<(u8, f32)>,
    /// Rolling per-template indices for type cycling.
    type_cycle: BTreeMap<String, usize>,
    /// Rolling index for harvester cycling.
    harvester_cycle: usize,
}

impl SelectionManager {
    /// Whether a unit is selected.
    #[must_use]
    pub fn contains(&self, unit: UnitId) -> bool {
        self.selected.contains(&unit)
    }

    /// Selected units in selection order.
    #[must_use]
    pub fn ids(&self) -> &[UnitId] {
        &self.selected
    }

    /// Number of selected units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    fn insert(&mut self, unit: UnitId) -> bool {
        if self.contains(unit) {
            return false;
        }
        self.selected.push(unit);
        true
    }

    fn remove(&mut self, unit: UnitId) -> bool {
        let before = self.selected.len();
        self.selected.retain(|id| *id != unit);
        self.selected.len() != before
    }
}

/// Whether the local player may select this unit at all.
fn selectable(world: &World, unit: &Unit) -> bool {
    unit.alive && !unit.is_carried() && unit.owner == world.local_player
}

/// Resolve a single click.
///
/// Without `additive` the current selection is cleared first (unless it is
/// already empty). A click that hit nothing selectable ends there. A
/// second click on the same template within the double-click window also
/// selects every on-screen unit of that template.
pub(crate) fn click_select(
    world: &mut World,
    hit: Option<UnitId>,
    additive: bool,
    projector: &dyn ScreenProjector,
) {
    if !additive && !world.selection.is_empty() {
        world.selection.selected.clear();
        world.events.push(SimEvent::SelectionCleared);
    }

    let Some(hit) = hit else {
        return;
    };
    let Some(template) = world
        .units
        .get(&hit)
        .filter(|u| selectable(world, u))
        .map(|u| u.template.clone())
    else {
        return;
    };

    if world.selection.insert(hit) {
        world.events.push(SimEvent::SelectionChanged);
    }

    let now = world.time_seconds();
    let double = world.selection.last_click_template.as_deref() == Some(template.as_str())
        && now - world.selection.last_click_time <= world.config.double_click_seconds;
    if double {
        select_same_type(world, &template, projector);
    }
    world.selection.last_click_template = Some(template);
    world.selection.last_click_time = now;
}

/// Add every on-screen unit of `template` owned by the local player.
pub(crate) fn select_same_type(world: &mut World, template: &str, projector: &dyn ScreenProjector) {
    let mut added = false;
    for id in world.sorted_unit_ids() {
        let Some(unit) = world.units.get(&id) else {
            continue;
        };
        if !selectable(world, unit) || unit.template != template {
            continue;
        }
        if projector.project(unit.position).is_none() {
            continue;
        }
        added |= world.selection.insert(id);
    }
    if added {
        world.events.push(SimEvent::SelectionChanged);
    }
}

/// Resolve a box drag: add every owned, non-building, non-carried unit
/// whose screen projection falls inside the rectangle.
///
/// Listeners are only notified when the drag produced a real group (more
/// than one selected unit); single-unit pickups already went through the
/// click path.
pub(crate) fn box_select(
    world: &mut World,
    corner_a: Vec2,
    corner_b: Vec2,
    projector: &dyn ScreenProjector,
) {
    let min = corner_a.min(corner_b);
    let max = corner_a.max(corner_b);
    for id in world.sorted_unit_ids() {
        let Some(unit) = world.units.get(&id) else {
            continue;
        };
        if !selectable(world, unit) || unit.is_building() {
            continue;
        }
        let Some(screen) = projector.project(unit.position) else {
            continue;
        };
        if screen.x < min.x || screen.x > max.x || screen.y < min.y || screen.y > max.y {
            continue;
        }
        world.selection.insert(id);
    }
    if world.selection.len() > 1 {
        world.events.push(SimEvent::SelectionChanged);
    }
}

/// Remove a unit from the selection (death, being carried).
///
/// Fires the cleared event when this empties the list and the changed
/// event otherwise.
pub(crate) fn drop_unit(world: &mut World, unit: UnitId) {
    if !world.selection.remove(unit) {
        return;
    }
    if world.selection.is_empty() {
        world.events.push(SimEvent::SelectionCleared);
    } else {
        world.events.push(SimEvent::SelectionChanged);
    }
}

/// Stamp the current selection as control group `digit`, overwriting the
/// group's previous membership.
pub(crate) fn assign_group(world: &mut World, digit: u8) {
    let digit = digit % 10;
    let selected: Vec<UnitId> = world.selection.selected.clone();
    for unit in world.units.values_mut() {
        if unit.group == Some(digit) && !selected.contains(&unit.id) {
            unit.group = None;
        }
    }
    for id in &selected {
        if let Some(unit) = world.units.get_mut(id) {
            unit.group = Some(digit);
        }
    }
}

/// Select control group `digit`, replacing the current selection.
///
/// A second press on the same digit within the re-center window emits a
/// camera-center event on the first member.
pub(crate) fn select_group(world: &mut World, digit: u8) {
    let digit = digit % 10;
    let was_selected = !world.selection.is_empty();
    world.selection.selected.clear();

    let mut first_position = None;
    for id in world.sorted_unit_ids() {
        let Some(unit) = world.units.get(&id) else {
            continue;
        };
        if !selectable(world, unit) || unit.group != Some(digit) {
            continue;
        }
        if first_position.is_none() {
            first_position = Some(unit.position);
        }
        world.selection.insert(id);
    }

    if world.selection.is_empty() {
        if was_selected {
            world.events.push(SimEvent::SelectionCleared);
        }
    } else {
        world.events.push(SimEvent::SelectionChanged);
    }

    let now = world.time_seconds();
    let repeat = world
        .selection
        .last_group_press
        .is_some_and(|(last_digit, at)| {
            last_digit == digit && now - at <= world.config.group_recenter_seconds
        });
    if repeat {
        if let Some(position) = first_position {
            world.events.push(SimEvent::CameraCenter { position });
        }
    }
    world.selection.last_group_press = Some((digit, now));
}

/// Select every owned mobile unit.
pub(crate) fn select_all(world: &mut World) {
    let mut added = false;
    for id in world.sorted_unit_ids() {
        let Some(unit) = world.units.get(&id) else {
            continue;
        };
        if !selectable(world, unit) || unit.is_building() {
            continue;
        }
        added |= world.selection.insert(id);
    }
    if added {
        world.events.push(SimEvent::SelectionChanged);
    }
}

/// Select the next owned unit of `template`, cycling through matches in
/// id order and wrapping to the first once exhausted.
pub(crate) fn cycle_next_of_type(world: &mut World, template: &str) -> Option<UnitId> {
    let matches: Vec<UnitId> = world
        .sorted_unit_ids()
        .into_iter()
        .filter(|id| {
            world
                .units
                .get(id)
                .is_some_and(|u| selectable(world, u) && u.template == template)
        })
        .collect();
    let index = world
        .selection
        .type_cycle
        .get(template)
        .copied()
        .unwrap_or(0);
    let next = cycle_pick(world, &matches, index)?;
    world
        .selection
        .type_cycle
        .insert(template.to_string(), index.wrapping_add(1));
    Some(next)
}

/// Select the next owned harvester, cycling in id order.
pub(crate) fn cycle_next_harvester(world: &mut World) -> Option<UnitId> {
    let matches: Vec<UnitId> = world
        .sorted_unit_ids()
        .into_iter()
        .filter(|id| {
            world
                .units
                .get(id)
                .is_some_and(|u| selectable(world, u) && u.modules.harvester.is_some())
        })
        .collect();
    let index = world.selection.harvester_cycle;
    let next = cycle_pick(world, &matches, index)?;
    world.selection.harvester_cycle = index.wrapping_add(1);
    Some(next)
}

/// Replace the selection with the `index % len`-th match and center the
/// camera on it.
fn cycle_pick(world: &mut World, matches: &[UnitId], index: usize) -> Option<UnitId> {
    if matches.is_empty() {
        return None;
    }
    let pick = matches[index % matches.len()];
    let position = world.units.get(&pick).map(|u| u.position)?;

    world.selection.selected.clear();
    world.selection.insert(pick);
    world.events.push(SimEvent::SelectionChanged);
    world.events.push(SimEvent::CameraCenter { position });
    Some(pick)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_deduplicates() {
        let mut manager = SelectionManager::default();
        assert!(manager.insert(UnitId(3)));
        assert!(!manager.insert(UnitId(3)));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_reports_membership() {
        let mut manager = SelectionManager::default();
        manager.insert(UnitId(1));
        manager.insert(UnitId(2));
        assert!(manager.remove(UnitId(1)));
        assert!(!manager.remove(UnitId(1)));
        assert_eq!(manager.ids(), &[UnitId(2)]);
    }
}
