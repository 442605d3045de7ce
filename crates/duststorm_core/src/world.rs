//! The simulation world and fixed-step tick loop.
//!
//! [`World`] owns every unit, player, resource field and projectile, and
//! advances them with [`World::tick`] at a fixed rate. This module is the
//! only place where the per-tick phases are sequenced; the phases
//! themselves live in their subsystem modules.
//!
//! # Determinism
//!
//! A world seeded and commanded identically replays identically on the
//! same build:
//! - No system randomness (all draws go through the owned [`SimRng`])
//! - Consistent iteration order (sorted unit ids, `BTreeMap` players and
//!   fields)
//! - No wall-clock reads (sim time is `tick * TICK_SECONDS`)
//!
//! [`World::state_hash`] folds the mutable state into a single value for
//! desync detection and replay checks.
//!
//! # Example
//!
//! ```
//! use duststorm_core::prelude::*;
//!
//! let templates = TemplateRegistry::from_ron_str(
//!     r#"[
//!     UnitTemplate(
//!         id: "rover",
//!         name: "Rover",
//!         category: Vehicle,
//!         move_kind: Ground,
//!         max_health: 100.0,
//!         speed: 6.0,
//!     ),
//! ]"#,
//! )
//! .unwrap();
//!
//! let mut world = World::new(WorldConfig::default(), templates, 42);
//! world.add_player(PlayerId(0), TeamId(0), 1_000);
//! let rover = world.spawn_unit("rover", PlayerId(0), Vec3::ZERO, 0.0).unwrap();
//! world.issue_order(rover, Order::new(OrderKind::Move(Vec3::new(10.0, 0.0, 0.0))), false);
//!
//! let mut nav = StraightLineNav::new();
//! for _ in 0..80 {
//!     world.tick(&mut nav);
//! }
//! assert!(!world.unit(rover).unwrap().is_moving());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::carry::{self, Carrier};
use crate::combat::{self, Attackable, Damageable, Projectile, Turret};
use crate::config::WorldConfig;
use crate::economy::{self, FieldId, Harvester, Refinery, ResourceField};
use crate::error::{Result, SimError};
use crate::events::SimEvent;
use crate::formation;
use crate::math::{hash_f32, hash_vec3, SimRng};
use crate::movement::{self, Movable, Navigator};
use crate::orders::{self, Order, OrderKind, OrderQueue};
use crate::player::{Player, PlayerId, TeamId};
use crate::production::{self, Production};
use crate::selection::{self, ScreenProjector, SelectionManager};
use crate::templates::{MoveKind, TemplateRegistry};
use crate::unit::{Module, ModuleSet, Unit, UnitId};
use crate::visibility::{self, FogOfWar};

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in seconds.
pub const TICK_SECONDS: f32 = 1.0 / TICK_RATE as f32;

/// The simulation world.
///
/// Owns all game state and advances it deterministically. Commands arrive
/// between ticks through the public methods ([`World::issue_order`],
/// [`World::enqueue_production`], selection calls, ...); observable
/// consequences come back out of [`World::tick`] as [`SimEvent`]s.
///
/// # Phase Order
///
/// Each tick runs the subsystem phases in a fixed order:
/// 1. **Orders** - execute the head order of every unit
/// 2. **Movement** - integrate motion, parent carried units
/// 3. **Combat** - scans, turrets, firing, projectile flight
/// 4. **Economy** - harvester state machines and building repair
/// 5. **Production** - build queues, completions, exit nudging
/// 6. **Carry** - pending pickups
/// 7. **Deaths** - remove units whose health reached zero
/// 8. **Visibility** - periodic fog-of-war sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    /// Tuning constants, fixed for the lifetime of the world.
    pub config: WorldConfig,
    pub(crate) templates: TemplateRegistry,
    pub(crate) units: HashMap<UnitId, Unit>,
    pub(crate) players: BTreeMap<PlayerId, Player>,
    pub(crate) fields: BTreeMap<FieldId, ResourceField>,
    pub(crate) projectiles: Vec<Projectile>,
    pub(crate) selection: SelectionManager,
    pub(crate) events: Vec<SimEvent>,
    pub(crate) rng: SimRng,
    pub(crate) local_player: PlayerId,
    pub(crate) local_team: TeamId,
    pub(crate) vision_timer: f32,
    tick: u64,
    next_unit_id: u64,
    next_field_id: u32,
}

impl World {
    /// Create an empty world.
    ///
    /// `seed` initializes the deterministic rng; two worlds built with the
    /// same seed, data and commands stay in lockstep.
    #[must_use]
    pub fn new(config: WorldConfig, templates: TemplateRegistry, seed: u64) -> Self {
        templates.validate();
        Self {
            config,
            templates,
            units: HashMap::new(),
            players: BTreeMap::new(),
            fields: BTreeMap::new(),
            projectiles: Vec::new(),
            selection: SelectionManager::default(),
            events: Vec::new(),
            rng: SimRng::new(seed),
            local_player: PlayerId(0),
            local_team: TeamId(0),
            vision_timer: 0.0,
            tick: 0,
            next_unit_id: 1,
            next_field_id: 1,
        }
    }

    /// Register a player. The first definition of an id wins.
    pub fn add_player(&mut self, id: PlayerId, team: TeamId, money: i64) {
        if self.players.contains_key(&id) {
            warn!(player = %id, "duplicate player ignored");
            return;
        }
        self.players.insert(id, Player::new(id, team, money));
    }

    /// Mark which player this world instance renders and commands for.
    /// Selection, fog of war and acknowledgement events are all relative
    /// to this player.
    pub fn set_local_player(&mut self, id: PlayerId) -> Result<()> {
        let player = self
            .players
            .get(&id)
            .ok_or(SimError::PlayerNotFound(id.0))?;
        self.local_player = id;
        self.local_team = player.team;
        Ok(())
    }

    /// Add a resource field.
    pub fn add_field(&mut self, field: ResourceField) -> FieldId {
        let id = FieldId(self.next_field_id);
        self.next_field_id += 1;
        self.fields.insert(id, field);
        id
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Look up a unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Look up a unit that is present *and* alive. Systems and hosts use
    /// this for stale-reference checks: a unit that died since the
    /// reference was taken resolves to `None`.
    #[must_use]
    pub fn live_unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id).filter(|unit| unit.alive)
    }

    /// Iterate over all units (not in deterministic order).
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Unit ids sorted ascending, for deterministic iteration.
    #[must_use]
    pub fn sorted_unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of units, dead-but-unprocessed included.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Live units within `radius` of `center`, in ascending id order.
    #[must_use]
    pub fn units_in_radius(&self, center: Vec3, radius: f32) -> Vec<UnitId> {
        let radius_sq = radius * radius;
        let mut ids: Vec<UnitId> = self
            .units
            .iter()
            .filter(|(_, unit)| {
                unit.alive && unit.position.distance_squared(center) <= radius_sq
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Look up a player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Iterate players in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Look up a resource field.
    #[must_use]
    pub fn field(&self, id: FieldId) -> Option<&ResourceField> {
        self.fields.get(&id)
    }

    /// Iterate resource fields in id order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &ResourceField)> {
        self.fields.iter().map(|(id, field)| (*id, field))
    }

    /// Projectiles currently in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// The unit template registry.
    #[must_use]
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// The local player's current selection.
    #[must_use]
    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    /// The player this world instance is rendered for.
    #[must_use]
    pub fn local_player(&self) -> PlayerId {
        self.local_player
    }

    /// The local player's team.
    #[must_use]
    pub fn local_team(&self) -> TeamId {
        self.local_team
    }

    /// Completed tick count.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Simulation time in seconds.
    #[must_use]
    pub fn time_seconds(&self) -> f32 {
        self.tick as f32 * TICK_SECONDS
    }

    /// Whether `unit` can be seen by `team`.
    ///
    /// Fog of war is tracked for the local team only: every other team
    /// sees everything, and the local team always sees itself.
    #[must_use]
    pub fn is_visible_to_team(&self, team: TeamId, unit: &Unit) -> bool {
        if team != self.local_team {
            return true;
        }
        if unit.team == self.local_team {
            return true;
        }
        unit.modules
            .fog_of_war
            .as_ref()
            .map_or(true, |fog| fog.visible_to_local)
    }

    /// Whether `unit` is currently visible to the local team.
    #[must_use]
    pub fn is_visible_to_local(&self, unit: &Unit) -> bool {
        self.is_visible_to_team(self.local_team, unit)
    }

    // ------------------------------------------------------------------
    // Spawning and removal
    // ------------------------------------------------------------------

    /// Spawn a unit from a template.
    ///
    /// Assembles the capability modules the template declares, applies
    /// the owner's electricity bookkeeping, and spawns the refinery's
    /// starting harvester when the template names one.
    ///
    /// # Errors
    ///
    /// Returns an error when the template id is unknown or the owner was
    /// never registered.
    pub fn spawn_unit(
        &mut self,
        template_id: &str,
        owner: PlayerId,
        position: Vec3,
        yaw: f32,
    ) -> Result<UnitId> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| SimError::UnknownTemplate(template_id.to_string()))?
            .clone();
        let team = self
            .players
            .get(&owner)
            .ok_or(SimError::PlayerNotFound(owner.0))?
            .team;

        let id = UnitId(self.next_unit_id);
        self.next_unit_id += 1;

        let mut modules = ModuleSet::default();
        if template.move_kind != MoveKind::Immobile && template.speed > 0.0 {
            modules.attach(Module::Movable(Movable::new(
                template.move_kind,
                template.speed,
                template.turn_rate,
                template
                    .arrival_tolerance_sq
                    .unwrap_or(self.config.arrival_tolerance_sq),
                template.fly_height,
            )));
        }
        if let Some(spec) = &template.weapon {
            modules.attach(Module::Attackable(Attackable::from_spec(spec)));
        }
        if let Some(spec) = &template.turret {
            modules.attach(Module::Turret(Turret::from_spec(spec)));
        }
        if template.max_health > 0.0 {
            modules.attach(Module::Damageable(Damageable::new(template.max_health)));
        }
        if let Some(spec) = &template.harvester {
            modules.attach(Module::Harvester(Harvester::from_spec(spec)));
        }
        if let Some(spec) = &template.refinery {
            modules.attach(Module::Refinery(Refinery::from_spec(spec)));
        }
        if let Some(spec) = &template.production {
            modules.attach(Module::Production(Production::from_spec(spec)));
        }
        if let Some(spec) = &template.carrier {
            modules.attach(Module::Carrier(Carrier::from_spec(spec)));
        }
        modules.attach(Module::FogOfWar(FogOfWar::new()));
        if let Some(spec) = &template.power {
            modules.attach(Module::Electricity {
                supply: spec.supply,
                demand: spec.demand,
            });
        }

        let unit = Unit {
            id,
            template: template.id.clone(),
            owner,
            team,
            category: template.category,
            move_kind: template.move_kind,
            position,
            yaw,
            vision_radius: template.vision_radius,
            collision_radius: template.collision_radius,
            alive: true,
            carried_by: None,
            collidable: true,
            group: None,
            orders: OrderQueue::new(),
            modules,
        };
        self.units.insert(id, unit);

        if let Some(spec) = &template.power {
            if let Some(player) = self.players.get_mut(&owner) {
                player.power_supply += spec.supply;
                player.power_demand += spec.demand;
                self.events.push(SimEvent::PowerChanged {
                    player: owner,
                    supply: player.power_supply,
                    demand: player.power_demand,
                });
            }
        }
        if template.production.is_some() {
            if let Some(player) = self.players.get_mut(&owner) {
                player.production_buildings.push(id);
            }
        }
        self.events.push(SimEvent::UnitSpawned { unit: id, owner });

        if let Some(seed_template) = template
            .refinery
            .as_ref()
            .and_then(|spec| spec.starting_harvester.clone())
        {
            self.spawn_starting_harvester(id, &seed_template, owner, yaw);
        }

        Ok(id)
    }

    /// Spawn the free harvester a refinery template declares, at the
    /// refinery's delivery point.
    fn spawn_starting_harvester(
        &mut self,
        refinery: UnitId,
        template_id: &str,
        owner: PlayerId,
        yaw: f32,
    ) {
        // A starting harvester that is itself a refinery would chain
        // spawns without bound.
        let unusable = self
            .templates
            .get(template_id)
            .map_or(true, |t| t.refinery.is_some());
        if unusable {
            warn!(
                template = template_id,
                "starting harvester template missing or itself a refinery"
            );
            return;
        }
        let Some(dock) = economy::delivery_point_of(self, refinery) else {
            return;
        };
        if let Err(error) = self.spawn_unit(template_id, owner, dock, yaw) {
            warn!(%error, "failed to spawn starting harvester");
        }
    }

    /// Remove a unit from the world immediately, running the same cleanup
    /// cascade as a combat death.
    ///
    /// # Errors
    ///
    /// Returns an error when the unit does not exist.
    pub fn despawn_unit(&mut self, id: UnitId, nav: &mut dyn Navigator) -> Result<()> {
        if !self.units.contains_key(&id) {
            return Err(SimError::UnitNotFound(id.0));
        }
        self.remove_unit(id, nav);
        Ok(())
    }

    /// Death cascade: passengers set down, electricity returned, ownership
    /// lists and selection cleaned, navigation released.
    fn remove_unit(&mut self, id: UnitId, nav: &mut dyn Navigator) {
        let Some(mut unit) = self.units.remove(&id) else {
            return;
        };
        unit.alive = false;

        if unit
            .modules
            .carrier
            .as_ref()
            .is_some_and(|carrier| !carrier.is_empty())
        {
            carry::release_on_death(self, &unit);
        }

        if let Some(carrier_id) = unit.carried_by {
            if let Some(carrier) = self
                .units
                .get_mut(&carrier_id)
                .and_then(|c| c.modules.carrier.as_mut())
            {
                carrier.passengers.retain(|(pid, _)| *pid != id);
                carrier.pending.retain(|pid| *pid != id);
            }
        }

        if let Some(power) = unit.modules.electricity {
            if let Some(player) = self.players.get_mut(&unit.owner) {
                player.power_supply = player.power_supply.saturating_sub(power.supply);
                player.power_demand = player.power_demand.saturating_sub(power.demand);
                self.events.push(SimEvent::PowerChanged {
                    player: unit.owner,
                    supply: player.power_supply,
                    demand: player.power_demand,
                });
            }
        }
        if unit.modules.production.is_some() {
            if let Some(player) = self.players.get_mut(&unit.owner) {
                player.production_buildings.retain(|b| *b != id);
            }
        }

        nav.release(id);
        selection::drop_unit(self, id);
        self.events.push(SimEvent::UnitDied { unit: id });

        let owner = unit.owner;
        let any_left = self.units.values().any(|u| u.alive && u.owner == owner);
        if !any_left {
            if let Some(player) = self.players.get_mut(&owner) {
                if !player.defeated {
                    player.defeated = true;
                    self.events.push(SimEvent::PlayerDefeated { player: owner });
                }
            }
        }
    }

    /// Remove every unit whose health reached zero this tick.
    fn process_deaths(&mut self, nav: &mut dyn Navigator) {
        let dead: Vec<UnitId> = self
            .sorted_unit_ids()
            .into_iter()
            .filter(|id| {
                self.units.get(id).is_some_and(|unit| {
                    unit.alive
                        && unit
                            .modules
                            .damageable
                            .as_ref()
                            .is_some_and(Damageable::is_dead)
                })
            })
            .collect();
        for id in dead {
            self.remove_unit(id, nav);
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Queue an order on a unit, replacing the queue unless `additive`.
    ///
    /// Dead, missing and carried units silently ignore orders. Harvesters
    /// additionally interpret the order as a manual override of their
    /// gathering state machine.
    pub fn issue_order(&mut self, unit: UnitId, order: Order, additive: bool) {
        let Some(target) = self.units.get_mut(&unit) else {
            debug!(unit = %unit, "order for a missing unit dropped");
            return;
        };
        if !target.alive || target.is_carried() {
            return;
        }
        if additive {
            target.orders.push(order);
        } else {
            target.orders.set(order);
        }
        let acknowledge = target.owner == self.local_player;
        let is_harvester = target.modules.harvester.is_some();
        if is_harvester {
            economy::redirect_on_order(self, unit, order.kind);
        }
        if acknowledge {
            self.events.push(SimEvent::OrderAcknowledged { unit });
        }
    }

    /// Move a group of units to a shared destination in loose formation.
    ///
    /// Each unit receives its own waypoint so the group does not pile
    /// onto a single point; a lone unit moves to the exact destination.
    pub fn issue_group_move(&mut self, units: &[UnitId], destination: Vec3) {
        let mut movers: Vec<(UnitId, Vec3)> = Vec::with_capacity(units.len());
        for &id in units {
            if let Some(unit) = self.live_unit(id) {
                if !unit.is_carried() && unit.modules.movable.is_some() {
                    movers.push((id, unit.position));
                }
            }
        }
        match movers.len() {
            0 => {}
            1 => self.issue_order(movers[0].0, Order::new(OrderKind::Move(destination)), false),
            _ => {
                let positions: Vec<Vec3> = movers.iter().map(|(_, p)| *p).collect();
                let min_separation = self.config.formation_min_separation;
                let spacing = self.config.formation_grid_spacing;
                let jitter = self.config.formation_jitter;
                let waypoints = formation::combined_assign(
                    &positions,
                    destination,
                    min_separation,
                    spacing,
                    jitter,
                    &mut self.rng,
                );
                for ((id, _), waypoint) in movers.iter().zip(waypoints) {
                    self.issue_order(*id, Order::new(OrderKind::Move(waypoint)), false);
                }
            }
        }
    }

    /// Cancel all orders on the given units and stop them in place.
    pub fn stop_units(&mut self, units: &[UnitId], nav: &mut dyn Navigator) {
        for &id in units {
            if let Some(unit) = self.units.get_mut(&id) {
                if unit.alive && !unit.is_carried() {
                    orders::end_all(unit, nav, &mut self.events);
                }
            }
        }
    }

    /// Queue a template on a production building. Returns whether the
    /// item was accepted and paid for.
    pub fn enqueue_production(&mut self, building: UnitId, template: &str) -> bool {
        production::enqueue(self, building, template)
    }

    /// Cancel a production queue entry (or, past the queue end, the ready
    /// building) and refund its cost.
    pub fn cancel_production(&mut self, building: UnitId, index: usize) -> bool {
        production::cancel(self, building, index)
    }

    /// Place a finished building near its producer. Returns `false` when
    /// nothing is ready or the spot is blocked.
    pub fn place_building(&mut self, producer: UnitId, position: Vec3, yaw: f32) -> bool {
        production::place_building(self, producer, position, yaw)
    }

    /// Send `passengers` to board `carrier`. Returns how many were
    /// accepted against the remaining capacity.
    pub fn prepare_to_carry(&mut self, carrier: UnitId, passengers: &[UnitId]) -> usize {
        carry::prepare_to_carry(self, carrier, passengers)
    }

    /// Unload one passenger next to the carrier.
    pub fn exit_unit(&mut self, carrier: UnitId, passenger: UnitId) -> bool {
        carry::exit_unit(self, carrier, passenger)
    }

    /// Unload every passenger.
    pub fn exit_all(&mut self, carrier: UnitId) {
        carry::exit_all(self, carrier);
    }

    /// Toggle repair on a damaged building. Returns the new repair state,
    /// or `false` when the target is not a living building.
    pub fn toggle_repair(&mut self, building: UnitId) -> bool {
        let Some(unit) = self.units.get_mut(&building) else {
            return false;
        };
        if !unit.alive || !unit.is_building() {
            return false;
        }
        let Some(damageable) = unit.modules.damageable.as_mut() else {
            return false;
        };
        damageable.repairing = !damageable.repairing;
        if !damageable.repairing {
            damageable.repair_debt = 0.0;
        }
        damageable.repairing
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Handle a selection click. `hit` is the unit under the cursor, if
    /// any; a repeat click on the same template within the double-click
    /// window selects every on-screen unit of that template.
    pub fn click_select(
        &mut self,
        hit: Option<UnitId>,
        additive: bool,
        projector: &dyn ScreenProjector,
    ) {
        selection::click_select(self, hit, additive, projector);
    }

    /// Select all on-screen units of one template owned by the local
    /// player.
    pub fn select_same_type(&mut self, template: &str, projector: &dyn ScreenProjector) {
        selection::select_same_type(self, template, projector);
    }

    /// Replace the selection with the local player's mobile units inside
    /// a screen-space rectangle.
    pub fn box_select(&mut self, corner_a: Vec2, corner_b: Vec2, projector: &dyn ScreenProjector) {
        selection::box_select(self, corner_a, corner_b, projector);
    }

    /// Stamp the current selection as control group `digit`.
    pub fn assign_group(&mut self, digit: u8) {
        selection::assign_group(self, digit);
    }

    /// Replace the selection with control group `digit`. A repeat press
    /// within the recenter window asks the camera to jump to the group.
    pub fn select_group(&mut self, digit: u8) {
        selection::select_group(self, digit);
    }

    /// Select every mobile unit the local player owns.
    pub fn select_all(&mut self) {
        selection::select_all(self);
    }

    /// Select the next unit of a template, cycling on repeat calls.
    pub fn cycle_next_of_type(&mut self, template: &str) -> Option<UnitId> {
        selection::cycle_next_of_type(self, template)
    }

    /// Select the next harvester, cycling on repeat calls.
    pub fn cycle_next_harvester(&mut self) -> Option<UnitId> {
        selection::cycle_next_harvester(self)
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by one fixed step and return the events it
    /// produced (including any still buffered from commands issued since
    /// the previous tick).
    pub fn tick(&mut self, nav: &mut dyn Navigator) -> Vec<SimEvent> {
        // 1. Orders
        orders::order_phase(self, nav);
        // 2. Movement
        movement::movement_phase(self, nav);
        // 3. Combat and projectiles
        combat::combat_phase(self);
        // 4. Economy
        economy::economy_phase(self, nav);
        // 5. Production
        production::production_phase(self);
        // 6. Transport pickups
        carry::carry_phase(self, nav);
        // 7. Deaths
        self.process_deaths(nav);
        // 8. Fog of war
        visibility::vision_phase(self);

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            if self.tick % u64::from(TICK_RATE) == 0 {
                debug!(tick = self.tick, state_hash = self.state_hash(), "tick");
            }
        }

        std::mem::take(&mut self.events)
    }

    /// Take the buffered events without advancing the simulation. Useful
    /// after a burst of commands when the host wants immediate feedback.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // State hashing and snapshots
    // ------------------------------------------------------------------

    /// Compute a hash of the mutable simulation state.
    ///
    /// Used for desync detection and replay verification: two worlds with
    /// identical state produce identical hashes on the same build.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);

        let ids = self.sorted_unit_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(unit) = self.units.get(&id) {
                id.hash(&mut hasher);
                unit.owner.hash(&mut hasher);
                hash_vec3(&mut hasher, unit.position);
                hash_f32(&mut hasher, unit.yaw);
                unit.alive.hash(&mut hasher);
                unit.carried_by.hash(&mut hasher);
                unit.orders.len().hash(&mut hasher);
                if let Some(damageable) = &unit.modules.damageable {
                    hash_f32(&mut hasher, damageable.health);
                }
                if let Some(movable) = &unit.modules.movable {
                    movable.moving.hash(&mut hasher);
                }
                if let Some(harvester) = &unit.modules.harvester {
                    hash_f32(&mut hasher, harvester.carried);
                }
                if let Some(attackable) = &unit.modules.attackable {
                    attackable.target.hash(&mut hasher);
                    hash_f32(&mut hasher, attackable.reload_remaining);
                }
            }
        }

        for (id, player) in &self.players {
            id.hash(&mut hasher);
            player.money.hash(&mut hasher);
            player.power_supply.hash(&mut hasher);
            player.power_demand.hash(&mut hasher);
            player.defeated.hash(&mut hasher);
            for (resource, amount) in &player.pools {
                resource.hash(&mut hasher);
                hash_f32(&mut hasher, *amount);
            }
        }
        for (id, field) in &self.fields {
            id.hash(&mut hasher);
            hash_f32(&mut hasher, field.remaining);
        }
        self.projectiles.len().hash(&mut hasher);
        for projectile in &self.projectiles {
            projectile.target.hash(&mut hasher);
            hash_vec3(&mut hasher, projectile.position);
        }

        hasher.finish()
    }

    /// Snapshot the world for save games or lockstep verification.
    ///
    /// The navigator is a host collaborator and is not part of the
    /// snapshot; ground units re-submit their routes after a restore.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SimError::Snapshot(e.to_string()))
    }

    /// Restore a world from [`World::snapshot`] output.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode to a world.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| SimError::Snapshot(e.to_string()))
    }
}
