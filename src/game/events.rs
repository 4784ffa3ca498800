//! Game Events
//!
//! Notifications produced while mutating session state, drained by the
//! broadcast layer after each mutation batch and forwarded to clients
//! (zone announcements, damage feedback).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::geo::Coordinate;
use crate::game::state::PlayerId;

/// An event handed to the broadcast layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameEvent {
    /// A player entered the session.
    PlayerJoined {
        /// Connection id.
        id: PlayerId,
        /// Join position.
        location: Coordinate,
    },

    /// A player left the session.
    PlayerLeft {
        /// Connection id.
        id: PlayerId,
    },

    /// A new zone was generated and appended.
    ZoneSpawned {
        /// Position in the zone history (0 = first).
        index: usize,
        /// Zone center.
        center: Coordinate,
        /// Zone radius in meters.
        #[serde(rename = "radius_meters")]
        radius_m: f64,
        /// When the next zone after this one is due.
        active_time: DateTime<Utc>,
    },

    /// A player outside the safe zone took damage this tick.
    PlayerDamaged {
        /// Connection id.
        id: PlayerId,
        /// Amount subtracted this tick.
        damage: u32,
        /// Health after the subtraction.
        health: u32,
    },

    /// A player's health reached 0 this tick. Emitted once; the record
    /// stays in the session at 0 health.
    PlayerEliminated {
        /// Connection id.
        id: PlayerId,
    },
}
