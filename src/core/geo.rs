//! Great-Circle Geometry
//!
//! Geometry on latitude/longitude coordinates, treating the earth as a
//! sphere of mean radius. Everything here is a pure function of its inputs;
//! randomness (for zone placement) lives with the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geometry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoError {
    /// Centroid was requested for an empty point set.
    #[error("centroid of an empty point set")]
    EmptyPointSet,
}

// =============================================================================
// COORDINATE
// =============================================================================

/// A point on the earth's surface in floating-point degrees.
///
/// Immutable value type; mutation means replacing the whole coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    #[serde(rename = "long")]
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate from degrees.
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

// =============================================================================
// GEOMETRY OPERATIONS
// =============================================================================

/// Great-circle distance between two coordinates, in meters (haversine).
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lon - a.lon).to_radians();

    let h = (dphi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);

    // h can exceed 1.0 by a few ulps for antipodal points
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Project a point at `distance_m` meters from `origin` along a compass
/// bearing in degrees (0 = north, 90 = east).
pub fn destination_point(origin: Coordinate, distance_m: f64, bearing_deg: f64) -> Coordinate {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.lat.to_radians();
    let lambda1 = origin.lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    Coordinate::new(phi2.to_degrees(), normalize_lon(lambda2.to_degrees()))
}

/// True iff `point` lies within (or exactly on) the circle around `center`.
#[inline]
pub fn is_within_radius(point: Coordinate, center: Coordinate, radius_m: f64) -> bool {
    distance_meters(point, center) <= radius_m
}

/// Arithmetic-mean center of a non-empty set of coordinates.
///
/// Component-wise mean in degrees, which is what the zone anchor needs at
/// play-area scale. Fails on an empty slice.
pub fn centroid(points: &[Coordinate]) -> Result<Coordinate, GeoError> {
    if points.is_empty() {
        return Err(GeoError::EmptyPointSet);
    }

    let n = points.len() as f64;
    let (lat_sum, lon_sum) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.lat, lon + p.lon));

    Ok(Coordinate::new(lat_sum / n, lon_sum / n))
}

/// Wrap a longitude into [-180, 180).
#[inline]
fn normalize_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

// =============================================================================
// TESTS
// =============================================================================
