//! # Zones Game Server
//!
//! Authoritative session server for Zones, a location-based battle royale:
//! players share their real-world position, the server spawns progressively
//! smaller safe zones on the map, and anyone caught outside the current zone
//! loses health on a fixed cadence.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ZONES SERVER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Stateless primitives                     │
//! │  ├── geo.rs      - Great-circle geometry on lat/long        │
//! │  └── rng.rs      - Deterministic Xorshift128+ PRNG          │
//! │                                                              │
//! │  game/           - Session state and rules (no I/O)         │
//! │  ├── state.rs    - Players, zones, mutation primitives      │
//! │  ├── zone.rs     - Safe-zone generation (bootstrap/nesting) │
//! │  ├── damage.rs   - Out-of-zone damage evaluation            │
//! │  └── events.rs   - Events handed to the broadcast layer     │
//! │                                                              │
//! │  network/        - Transport (non-authoritative)            │
//! │  ├── server.rs   - WebSocket server                         │
//! │  ├── protocol.rs - Message types and state snapshots        │
//! │  └── session.rs  - Session lifecycle and periodic tasks     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Single-writer discipline
//!
//! One session state exists per server instance and every mutation — joins,
//! leaves, location updates, zone generation, damage ticks — goes through a
//! single `RwLock` write guard. The two periodic schedules are driven by one
//! owner task, so they can never interleave with each other; when both fire
//! in the same instant, zone generation runs first and the damage pass sees
//! the updated boundary. Readers take the lock's read side and always
//! observe a fully-applied mutation batch.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::geo::{centroid, destination_point, distance_meters, is_within_radius};
pub use crate::core::geo::Coordinate;
pub use crate::core::rng::DeterministicRng;
pub use crate::game::damage::DamageConfig;
pub use crate::game::state::{GameError, Player, PlayerId, SessionState, Zone, MAX_HEALTH};
pub use crate::game::zone::ZoneConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seconds between zone generations (the shrink interval)
pub const ZONE_INTERVAL_SECS: u64 = 120;

/// Seconds between damage evaluations
pub const DAMAGE_INTERVAL_SECS: u64 = 5;
