//! Order queue and per-tick order execution.
//!
//! Orders are a tagged union executed head-first: the head starts exactly
//! once, then its execute step runs every tick until the order ends, which
//! pops the queue and stops movement. Everything an order can do flows
//! through the unit's own modules; the order itself carries only scratch
//! state (the started flag and the attack spread offset).

use std::collections::VecDeque;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::combat;
use crate::math::level_distance_sq;
use crate::movement::{self, Navigator};
use crate::unit::{Unit, UnitId};
use crate::world::World;

/// The command variants a unit understands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Move to a world position.
    Move(Vec3),
    /// Chase and engage an enemy unit.
    Attack(UnitId),
    /// Shadow a friendly unit's live position.
    Follow(UnitId),
}

impl OrderKind {
    /// Variant name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Move(_) => "move",
            Self::Attack(_) => "attack",
            Self::Follow(_) => "follow",
        }
    }
}

/// One queued command plus its per-execution scratch state.
///
/// Orders are value-cloned when assigned, so a group command shares the
/// variant but every unit runs its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// What to do.
    pub kind: OrderKind,
    /// Set the first tick the order executes; the start step runs once.
    pub started: bool,
    /// Attack orders cache a random offset at start so that a group of
    /// attackers fans out around the target instead of stacking.
    pub spread_offset: Option<Vec3>,
}

impl Order {
    /// Wrap a command, not yet started.
    #[must_use]
    pub fn new(kind: OrderKind) -> Self {
        Self {
            kind,
            started: false,
            spread_offset: None,
        }
    }
}

/// A unit's pending commands. Only the head executes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueue {
    orders: VecDeque<Order>,
}

impl OrderQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole queue with a single order.
    pub fn set(&mut self, order: Order) {
        self.orders.clear();
        self.orders.push_back(order);
    }

    /// Append an order behind the existing queue.
    pub fn push(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    /// The executing order, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Overwrite the executing order's scratch state after a tick.
    pub(crate) fn replace_head(&mut self, order: Order) {
        if let Some(head) = self.orders.front_mut() {
            *head = order;
        }
    }

    /// Pop the executing order.
    pub fn pop(&mut self) -> Option<Order> {
        self.orders.pop_front()
    }

    /// Drop every queued order.
    pub fn clear(&mut self) {
        self.orders.clear();
    }

    /// Number of queued orders, including the executing one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the unit is idle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Iterate queued orders, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }
}

/// End the executing order: pop it and stop movement.
pub(crate) fn end_current(unit: &mut Unit, nav: &mut dyn Navigator, events: &mut Vec<crate::events::SimEvent>) {
    unit.orders.pop();
    movement::stop_unit(unit, nav, events);
}

/// Cancel every order and stop movement.
pub(crate) fn end_all(unit: &mut Unit, nav: &mut dyn Navigator, events: &mut Vec<crate::events::SimEvent>) {
    unit.orders.clear();
    movement::stop_unit(unit, nav, events);
}

/// Execute the head order of every living unit, in id order.
pub(crate) fn order_phase(world: &mut World, nav: &mut dyn Navigator) {
    for id in world.sorted_unit_ids() {
        let Some(mut unit) = world.units.remove(&id) else {
            continue;
        };
        if unit.alive && !unit.is_carried() {
            tick_unit_order(&mut unit, world, nav);
        }
        world.units.insert(id, unit);
    }
}

/// Run one tick of a unit's head order. The unit is detached from the
/// world map, so `world` holds every unit except this one.
fn tick_unit_order(unit: &mut Unit, world: &mut World, nav: &mut dyn Navigator) {
    let Some(mut order) = unit.orders.current().copied() else {
        return;
    };

    if !order.started {
        order.started = true;
        if start_order(&mut order, unit, world, nav) {
            end_current(unit, nav, &mut world.events);
            return;
        }
    }

    let ended = match order.kind {
        OrderKind::Move(dest) => execute_move(unit, dest, world, nav),
        OrderKind::Attack(target) => execute_attack(unit, target, order.spread_offset, world, nav),
        OrderKind::Follow(target) => execute_follow(unit, target, world, nav),
    };

    if ended {
        end_current(unit, nav, &mut world.events);
    } else {
        unit.orders.replace_head(order);
    }
}

/// One-shot start step. Returns `true` when the order must end before its
/// first execute step.
fn start_order(
    order: &mut Order,
    unit: &mut Unit,
    world: &mut World,
    nav: &mut dyn Navigator,
) -> bool {
    match order.kind {
        OrderKind::Move(dest) => {
            if unit.modules.movable.is_none() {
                warn!(unit = %unit.id, "move order on a unit without movement");
                return true;
            }
            movement::move_unit_to(unit, dest, nav, &mut world.events);
            false
        }
        OrderKind::Attack(_) => {
            order.spread_offset = Some(world.rng.offset_in_disc(world.config.attack_spread));
            false
        }
        OrderKind::Follow(_) => false,
    }
}

/// Move order: done once the movement controller reports not-moving, or
/// the unit is already inside its arrival tolerance.
fn execute_move(unit: &mut Unit, dest: Vec3, _world: &mut World, _nav: &mut dyn Navigator) -> bool {
    let Some(movable) = unit.modules.movable.as_ref() else {
        return true;
    };
    if level_distance_sq(unit.position, dest) <= movable.arrive_sq {
        return true;
    }
    // Defer to the movement controller: once it reports not-moving the
    // order is done, wherever the unit ended up.
    !movable.moving
}

/// Attack order: chase the target's spread-adjusted position until in
/// range with a clear fire line, then hold. Firing is combat's job.
fn execute_attack(
    unit: &mut Unit,
    target: UnitId,
    spread_offset: Option<Vec3>,
    world: &mut World,
    nav: &mut dyn Navigator,
) -> bool {
    let Some(weapon) = unit.modules.attackable.as_ref() else {
        warn!(unit = %unit.id, "attack order on a unit without a weapon");
        return true;
    };
    let range_sq = weapon.range * weapon.range;
    let targets = weapon.targets;

    let Some(target_unit) = world.live_unit(target) else {
        return true;
    };
    if target_unit.is_carried() || !targets.can_engage(target_unit.move_kind) {
        return true;
    }
    let target_pos = target_unit.position;

    // Keep the weapon pointed at the ordered target whenever it has no
    // (or a stale) target of its own; opportunistic retargeting may still
    // override this during the combat phase.
    let current_target_alive = unit
        .modules
        .attackable
        .as_ref()
        .and_then(|a| a.target)
        .is_some_and(|t| world.live_unit(t).is_some());
    if let Some(attackable) = unit.modules.attackable.as_mut() {
        if !current_target_alive {
            attackable.target = Some(target);
        }
    }

    let in_range = unit.position.distance_squared(target_pos) <= range_sq;
    let line_clear = in_range && combat::fire_line_clear(world, unit, target, target_pos);

    if in_range && line_clear {
        movement::stop_unit(unit, nav, &mut world.events);
    } else if unit.modules.movable.is_some() {
        let goal = target_pos + spread_offset.unwrap_or(Vec3::ZERO);
        movement::move_unit_to(unit, goal, nav, &mut world.events);
    } else if !in_range {
        // Static weapon that cannot close the distance.
        return true;
    }
    false
}

/// Follow order: shadow a friendly unit's live position until cancelled
/// or the target disappears.
fn execute_follow(unit: &mut Unit, target: UnitId, world: &mut World, nav: &mut dyn Navigator) -> bool {
    let Some(movable) = unit.modules.movable.as_ref() else {
        warn!(unit = %unit.id, "follow order on a unit without movement");
        return true;
    };
    let arrive_sq = movable.arrive_sq;

    let Some(target_unit) = world.live_unit(target) else {
        return true;
    };
    let target_pos = target_unit.position;

    if level_distance_sq(unit.position, target_pos) <= arrive_sq {
        movement::stop_unit(unit, nav, &mut world.events);
    } else {
        movement::move_unit_to(unit, target_pos, nav, &mut world.events);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use duststorm_test_utils::determinism::strategies::arb_order_sequence;
    use proptest::prelude::*;

    #[test]
    fn test_set_replaces_queue_with_single_order() {
        let mut queue = OrderQueue::new();
        queue.push(Order::new(OrderKind::Move(Vec3::ZERO)));
        queue.push(Order::new(OrderKind::Move(Vec3::ONE)));
        assert_eq!(queue.len(), 2);

        queue.set(Order::new(OrderKind::Move(Vec3::new(5.0, 0.0, 0.0))));
        assert_eq!(queue.len(), 1);
        match queue.current().unwrap().kind {
            OrderKind::Move(dest) => assert!((dest.x - 5.0).abs() < f32::EPSILON),
            other => panic!("unexpected order {other:?}"),
        }
    }

    #[test]
    fn test_only_head_is_current() {
        let mut queue = OrderQueue::new();
        queue.push(Order::new(OrderKind::Move(Vec3::ZERO)));
        queue.push(Order::new(OrderKind::Attack(UnitId(9))));

        assert!(matches!(queue.current().unwrap().kind, OrderKind::Move(_)));
        queue.pop();
        assert!(matches!(queue.current().unwrap().kind, OrderKind::Attack(_)));
        queue.pop();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_orders_start_unstarted() {
        let order = Order::new(OrderKind::Follow(UnitId(1)));
        assert!(!order.started);
        assert!(order.spread_offset.is_none());
    }

    proptest! {
        /// `set` wipes any backlog down to exactly the new order.
        #[test]
        fn prop_set_always_leaves_one_order(kinds in arb_order_sequence(50, 12)) {
            // The strategy yields types from the externally-built copy of
            // this crate, so the queue under test must come from it too.
            use duststorm_core::orders::{Order, OrderKind, OrderQueue};
            let mut queue = OrderQueue::new();
            for kind in kinds {
                queue.push(Order::new(kind));
            }
            queue.set(Order::new(OrderKind::Move(Vec3::ONE)));
            prop_assert_eq!(queue.len(), 1);
            prop_assert!(matches!(
                queue.current().map(|o| o.kind),
                Some(OrderKind::Move(_))
            ));
        }

        /// Pushed orders come back out the front in push order.
        #[test]
        fn prop_queue_is_fifo(kinds in arb_order_sequence(50, 12)) {
            // Same external-copy rule as above: `kinds` carries the
            // externally-built `OrderKind`.
            use duststorm_core::orders::{Order, OrderQueue};
            let mut queue = OrderQueue::new();
            for kind in &kinds {
                queue.push(Order::new(*kind));
            }
            let mut drained = Vec::new();
            while let Some(order) = queue.pop() {
                drained.push(order.kind);
            }
            prop_assert_eq!(drained, kinds);
        }
    }
}
