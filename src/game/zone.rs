//! Safe-Zone Generation
//!
//! Produces the next zone in the session's history. Two entry modes:
//! bootstrap (no zones yet, anchored on the players) and nesting (derive
//! from the previous zone). Randomness comes in from the caller's RNG so
//! a seeded session replays the same zone sequence.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::geo::{centroid, destination_point, Coordinate};
use crate::core::rng::DeterministicRng;
use crate::game::state::{GameError, Player, PlayerId, Zone};
use crate::ZONE_INTERVAL_SECS;

/// Each nested zone has exactly half the radius of its predecessor.
pub const NEST_RADIUS_DIVISOR: f64 = 2.0;

/// Zone generation parameters.
#[derive(Debug, Clone)]
pub struct ZoneConfig {
    /// Radius of the first zone, meters.
    pub first_radius_m: f64,
    /// Upper bound on the first zone's offset from the anchor, meters.
    pub max_first_distance_m: f64,
    /// How long each zone stands before the next one appears.
    pub shrink_interval: Duration,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            first_radius_m: 400.0,
            max_first_distance_m: 800.0,
            shrink_interval: Duration::from_secs(ZONE_INTERVAL_SECS),
        }
    }
}

/// Anchor for a bootstrap: the centroid of everyone currently in session,
/// so the first zone lands roughly equidistant from all players.
pub fn bootstrap_anchor(players: &BTreeMap<PlayerId, Player>) -> Result<Coordinate, GameError> {
    let locations: Vec<Coordinate> = players.values().map(|p| p.location).collect();
    Ok(centroid(&locations)?)
}

/// Generate the next zone.
///
/// With a non-empty `zones` history the new zone nests inside the last one:
/// half its radius, center offset by a random bearing and a random distance
/// below half the previous radius, so the new circle never leaves the old
/// one. With an empty history the `anchor` is required and the zone gets
/// the fixed first radius at a bounded random offset.
pub fn next_zone(
    zones: &[Zone],
    anchor: Option<Coordinate>,
    now: DateTime<Utc>,
    rng: &mut DeterministicRng,
    config: &ZoneConfig,
) -> Result<Zone, GameError> {
    let active_time = now + config.shrink_interval;
    let bearing = rng.next_bearing_deg();

    if let Some(last) = zones.last() {
        let radius = last.radius_m / NEST_RADIUS_DIVISOR;
        let distance = rng.next_distance_m(radius);
        let center = destination_point(last.center, distance, bearing);
        Zone::new(center, radius, active_time)
    } else if let Some(anchor) = anchor {
        let distance = rng.next_distance_m(config.max_first_distance_m);
        let center = destination_point(anchor, distance, bearing);
        Zone::new(center, config.first_radius_m, active_time)
    } else {
        Err(GameError::Precondition(
            "zone generation needs an anchor or a prior zone",
        ))
    }
}

// =============================================================================
// TESTS
// =============================================================================
