//! Players and their economy bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::unit::UnitId;

/// Stable player identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PlayerId(pub u8);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Team identifier; players sharing a team never target each other and
/// share fog-of-war vision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TeamId(pub u8);

/// A participating player.
///
/// Mutated by the economy modules (money and pool movement, electricity
/// bookkeeping) and by death processing (defeat detection). Lives for the
/// whole match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Team membership.
    pub team: TeamId,
    /// Spendable money.
    pub money: i64,
    /// Named resource pools fed by refineries configured for pool yield.
    pub pools: BTreeMap<String, f32>,
    /// Total electricity supply from live units.
    pub power_supply: u32,
    /// Total electricity demand from live units.
    pub power_demand: u32,
    /// Production buildings owned by this player, in spawn order.
    pub production_buildings: Vec<UnitId>,
    /// Set once the player's last unit dies.
    pub defeated: bool,
}

impl Player {
    /// Create a player with starting money.
    #[must_use]
    pub fn new(id: PlayerId, team: TeamId, money: i64) -> Self {
        Self {
            id,
            team,
            money,
            pools: BTreeMap::new(),
            power_supply: 0,
            power_demand: 0,
            production_buildings: Vec::new(),
            defeated: false,
        }
    }

    /// Whether the player can pay `price` money plus every named resource
    /// requirement.
    #[must_use]
    pub fn can_afford(&self, price: u32, resource_costs: &BTreeMap<String, u32>) -> bool {
        if self.money < i64::from(price) {
            return false;
        }
        resource_costs.iter().all(|(name, amount)| {
            self.pools.get(name).copied().unwrap_or(0.0) >= *amount as f32
        })
    }

    /// Debit a price plus named resources. Atomic: if anything is short,
    /// nothing is taken and `false` is returned.
    pub fn debit(&mut self, price: u32, resource_costs: &BTreeMap<String, u32>) -> bool {
        if !self.can_afford(price, resource_costs) {
            return false;
        }
        self.money -= i64::from(price);
        for (name, amount) in resource_costs {
            if let Some(pool) = self.pools.get_mut(name) {
                *pool -= *amount as f32;
            }
        }
        true
    }

    /// Return a price plus named resources (production cancel).
    pub fn refund(&mut self, price: u32, resource_costs: &BTreeMap<String, u32>) {
        self.money += i64::from(price);
        for (name, amount) in resource_costs {
            *self.pools.entry(name.clone()).or_insert(0.0) += *amount as f32;
        }
    }

    /// Add to a named resource pool.
    pub fn deposit_pool(&mut self, resource: &str, amount: f32) {
        *self.pools.entry(resource.to_string()).or_insert(0.0) += amount;
    }

    /// Whether electricity demand currently exceeds supply.
    #[must_use]
    pub fn has_power_shortage(&self) -> bool {
        self.power_demand > self.power_supply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn costs(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs
            .iter()
            .map(|(name, amount)| ((*name).to_string(), *amount))
            .collect()
    }

    #[test]
    fn test_debit_is_atomic_across_money_and_pools() {
        let mut player = Player::new(PlayerId(0), TeamId(0), 500);
        player.deposit_pool("crystal", 10.0);

        // Money is fine but the pool requirement fails: nothing moves.
        assert!(!player.debit(100, &costs(&[("crystal", 50)])));
        assert_eq!(player.money, 500);
        assert!((player.pools["crystal"] - 10.0).abs() < f32::EPSILON);

        // Both sufficient: both debited.
        assert!(player.debit(100, &costs(&[("crystal", 10)])));
        assert_eq!(player.money, 400);
        assert!(player.pools["crystal"].abs() < f32::EPSILON);
    }

    #[test]
    fn test_refund_round_trip() {
        let mut player = Player::new(PlayerId(1), TeamId(1), 500);
        player.deposit_pool("crystal", 25.0);
        let cost = costs(&[("crystal", 25)]);

        assert!(player.debit(100, &cost));
        player.refund(100, &cost);
        assert_eq!(player.money, 500);
        assert!((player.pools["crystal"] - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_power_shortage() {
        let mut player = Player::new(PlayerId(0), TeamId(0), 0);
        player.power_supply = 100;
        player.power_demand = 60;
        assert!(!player.has_power_shortage());
        player.power_demand = 140;
        assert!(player.has_power_shortage());
    }
}
