//! Session State Definitions
//!
//! The authoritative state for one match: players keyed by connection id and
//! the append-only zone history. Uses BTreeMap so iteration order is stable.
//!
//! The mutation primitives here do exactly one thing each and leave the
//! state consistent on any error; sequencing and policy live in the session
//! lifecycle manager.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::geo::{is_within_radius, Coordinate, GeoError};
use crate::game::events::GameEvent;

/// Health every player joins with; also the ceiling.
pub const MAX_HEALTH: u32 = 100;

// =============================================================================
// ERRORS
// =============================================================================

/// Domain errors. All are local to the operation that raised them; none
/// should ever take down the session loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    /// Operation referenced a player id not present in the session.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// Join reused an id that is still active. Never overwrites the
    /// existing player's health or position.
    #[error("duplicate player id {0}")]
    DuplicateId(PlayerId),

    /// Malformed value (empty centroid input, non-positive radius).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Zone generation invoked with neither an anchor nor a prior zone.
    /// Cannot happen under correct lifecycle sequencing.
    #[error("lifecycle precondition violated: {0}")]
    Precondition(&'static str),
}

impl From<GeoError> for GameError {
    fn from(err: GeoError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

// =============================================================================
// PLAYER ID
// =============================================================================

/// Opaque per-connection player identifier.
///
/// Implements Ord for stable BTreeMap iteration.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Generate a fresh id for a new connection.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// State of a single connected player.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    /// Connection id.
    pub id: PlayerId,

    /// Last reported position.
    pub location: Coordinate,

    /// Remaining health, 0..=100. Clamped at 0, never negative.
    pub health: u32,
}

impl Player {
    /// Create a player at full health.
    pub fn new(id: PlayerId, location: Coordinate) -> Self {
        Self {
            id,
            location,
            health: MAX_HEALTH,
        }
    }

    /// True once health has hit the floor.
    #[inline]
    pub fn is_depleted(&self) -> bool {
        self.health == 0
    }
}

// =============================================================================
// ZONE
// =============================================================================

/// One safe-zone circle. Immutable once appended to the session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zone {
    /// Center of the circle.
    pub center: Coordinate,

    /// Radius in meters, always positive.
    pub radius_m: f64,

    /// Instant the next zone is scheduled to appear; this zone's shrink
    /// deadline.
    pub active_time: DateTime<Utc>,
}

impl Zone {
    /// Create a zone, rejecting a non-positive radius.
    pub fn new(
        center: Coordinate,
        radius_m: f64,
        active_time: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(GameError::InvalidInput(format!(
                "zone radius must be positive, got {radius_m}"
            )));
        }
        Ok(Self {
            center,
            radius_m,
            active_time,
        })
    }

    /// True iff `point` lies within this zone.
    #[inline]
    pub fn contains(&self, point: Coordinate) -> bool {
        is_within_radius(point, self.center, self.radius_m)
    }
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Complete authoritative state of one match.
///
/// `zones` is kept private: it is append-only and strictly ordered by
/// creation, and nothing outside this type may remove or reorder entries.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// All players, keyed by connection id.
    players: BTreeMap<PlayerId, Player>,

    /// Zone history, oldest first.
    zones: Vec<Zone>,

    /// Events generated since the last broadcast (drained each batch).
    pending_events: Vec<GameEvent>,
}

impl SessionState {
    /// Create an empty session state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new player at full health.
    ///
    /// A duplicate id signals a transport-layer bug upstream; the existing
    /// record is left untouched.
    pub fn create_player(&mut self, id: PlayerId, location: Coordinate) -> Result<(), GameError> {
        if self.players.contains_key(&id) {
            return Err(GameError::DuplicateId(id));
        }
        self.players.insert(id, Player::new(id, location));
        Ok(())
    }

    /// Delete a player. Returns false when the id was already absent, which
    /// the caller should log and otherwise ignore.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        self.players.remove(&id).is_some()
    }

    /// Update a player's location only.
    pub fn move_player(&mut self, id: PlayerId, location: Coordinate) -> Result<(), GameError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(GameError::UnknownPlayer(id))?;
        player.location = location;
        Ok(())
    }

    /// Subtract `amount` health, clamping at 0. Returns the new health.
    pub fn apply_damage(&mut self, id: PlayerId, amount: u32) -> Result<u32, GameError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(GameError::UnknownPlayer(id))?;
        player.health = player.health.saturating_sub(amount);
        Ok(player.health)
    }

    /// Append a zone to the history. Zones are never removed or reordered.
    pub fn append_zone(&mut self, zone: Zone) {
        self.zones.push(zone);
    }

    /// All players.
    pub fn players(&self) -> &BTreeMap<PlayerId, Player> {
        &self.players
    }

    /// Look up one player.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Zone history, oldest first.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// The current damage boundary: the second-to-last zone. The last zone
    /// is the upcoming one and not yet enforced. None until two zones exist.
    pub fn safe_zone(&self) -> Option<&Zone> {
        if self.zones.len() < 2 {
            return None;
        }
        self.zones.get(self.zones.len() - 2)
    }

    /// The most recently generated (not yet enforced) zone.
    pub fn upcoming_zone(&self) -> Option<&Zone> {
        self.zones.last()
    }

    /// True when no players remain.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Queue an event for the broadcast layer.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    /// Drain all pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

// =============================================================================
// TESTS
// =============================================================================
