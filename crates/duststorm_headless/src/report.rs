//! JSON-lines output records.
//!
//! A run writes one JSON object per line to stdout so CI scripts can
//! consume it with standard line-oriented tooling:
//!
//! ```text
//! {"type":"start","scenario":"Standard Skirmish","seed":2077,"ticks":600}
//! {"type":"event","tick":41,"event":{"MovementStarted":{"unit":4}}}
//! {"type":"summary","tick":600,"hash":9221866945021,"units_alive":11,"players":[...]}
//! ```
//!
//! Event records are only emitted when the run asks for them; the start
//! and summary records always bracket the stream.

use serde::{Deserialize, Serialize};

use duststorm_core::events::SimEvent;
use duststorm_core::player::Player;
use duststorm_core::world::World;

/// One line of runner output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// Run header, emitted before the first tick.
    Start {
        /// Scenario name.
        scenario: String,
        /// World RNG seed.
        seed: u64,
        /// Ticks the run will simulate.
        ticks: u64,
    },
    /// A simulation event, tagged with the tick that produced it.
    Event {
        /// Tick the event fired on.
        tick: u64,
        /// The event itself.
        event: SimEvent,
    },
    /// Final state digest, emitted after the last tick.
    Summary {
        /// Tick the run stopped on.
        tick: u64,
        /// World state hash, comparable across runs of the same build.
        hash: u64,
        /// Live units remaining.
        units_alive: usize,
        /// Per-player standings.
        players: Vec<PlayerReport>,
    },
}

/// Per-player slice of the final summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerReport {
    /// Player identifier.
    pub id: u8,
    /// Money at run end.
    pub money: i64,
    /// Units still alive.
    pub alive_units: usize,
    /// Whether the player was eliminated during the run.
    pub defeated: bool,
}

impl PlayerReport {
    fn from_player(player: &Player, world: &World) -> Self {
        Self {
            id: player.id.0,
            money: player.money,
            alive_units: world
                .units()
                .filter(|u| u.owner == player.id && u.alive)
                .count(),
            defeated: player.defeated,
        }
    }
}

impl Record {
    /// Build the summary record from the final world state.
    #[must_use]
    pub fn summary(world: &World) -> Self {
        Self::Summary {
            tick: world.tick_count(),
            hash: world.state_hash(),
            units_alive: world.units().filter(|u| u.alive).count(),
            players: world
                .players()
                .map(|p| PlayerReport::from_player(p, world))
                .collect(),
        }
    }

    /// Serialize to a JSON line (with trailing newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duststorm_core::unit::UnitId;

    #[test]
    fn test_start_record_shape() {
        let record = Record::Start {
            scenario: "Test".to_string(),
            seed: 42,
            ticks: 100,
        };
        let json = record.to_json_line();
        assert!(json.contains(r#""type":"start""#));
        assert!(json.contains(r#""seed":42"#));
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn test_event_record_carries_sim_event() {
        let record = Record::Event {
            tick: 7,
            event: SimEvent::UnitDied { unit: UnitId(3) },
        };
        let json = record.to_json_line();
        assert!(json.contains(r#""type":"event""#));
        assert!(json.contains(r#""tick":7"#));
        assert!(json.contains("UnitDied"));
    }

    #[test]
    fn test_records_roundtrip_through_json() {
        let record = Record::Summary {
            tick: 600,
            hash: 12_345,
            units_alive: 4,
            players: vec![PlayerReport {
                id: 0,
                money: 950,
                alive_units: 4,
                defeated: false,
            }],
        };
        let json = record.to_json_line();
        let back: Record = serde_json::from_str(json.trim()).unwrap();
        assert!(matches!(back, Record::Summary { tick: 600, .. }));
    }
}
