//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket, JSON with a
//! `type` tag. Snapshots are separate wire structs so the domain types never
//! leak serialization concerns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::geo::Coordinate;
use crate::game::events::GameEvent;
use crate::game::state::{PlayerId, SessionState};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Enter the session at an initial position.
    Join {
        /// Initial position.
        coords: Coordinate,
    },

    /// Periodic position report.
    LocationUpdate {
        /// New position.
        coords: Coordinate,
    },

    /// Leave the session explicitly (closing the socket works too).
    Leave,

    /// Ping for latency measurement.
    Ping {
        /// Echoed back in the pong.
        timestamp: u64,
    },
}

impl ClientMessage {
    /// Parse from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Error codes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Message could not be parsed or was sent in the wrong state.
    InvalidMessage,
    /// Connection already joined the session.
    AlreadyJoined,
    /// Connection has not joined yet.
    NotJoined,
    /// Session was disposed.
    SessionClosed,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Join accepted; the client's id and the current state.
    Welcome {
        /// Id assigned to this connection.
        player_id: PlayerId,
        /// State at join time.
        snapshot: StateSnapshot,
    },

    /// Full state after a mutation batch.
    State {
        /// Consistent snapshot of players and zones.
        snapshot: StateSnapshot,
    },

    /// Game event notification.
    Event(GameEvent),

    /// Pong response.
    Pong {
        /// Client timestamp from the ping.
        timestamp: u64,
        /// Server wall-clock millis.
        server_time: u64,
    },

    /// Request rejected.
    Error {
        /// Machine-readable code.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },

    /// Server is going away.
    Shutdown {
        /// Why.
        reason: String,
    },
}

impl ServerMessage {
    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// STATE SNAPSHOTS
// =============================================================================

/// Wire view of one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Last reported position.
    pub location: Coordinate,
    /// Remaining health, 0..=100.
    pub health: u32,
}

/// Wire view of one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    /// Zone center.
    pub center: Coordinate,
    /// Zone radius in meters.
    #[serde(rename = "radius_meters")]
    pub radius_m: f64,
    /// When the next zone after this one is due; clients render the
    /// countdown from the last entry.
    pub active_time: DateTime<Utc>,
}

/// A consistent view of the whole session, taken under the state lock so
/// clients never observe a torn update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// All players keyed by id.
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    /// Zone history, oldest first.
    pub zones: Vec<ZoneSnapshot>,
}

impl StateSnapshot {
    /// Capture the current state.
    pub fn of(state: &SessionState) -> Self {
        Self {
            players: state
                .players()
                .iter()
                .map(|(id, p)| {
                    (
                        *id,
                        PlayerSnapshot {
                            location: p.location,
                            health: p.health,
                        },
                    )
                })
                .collect(),
            zones: state
                .zones()
                .iter()
                .map(|z| ZoneSnapshot {
                    center: z.center,
                    radius_m: z.radius_m,
                    active_time: z.active_time,
                })
                .collect(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
