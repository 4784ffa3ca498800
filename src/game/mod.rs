//! Game Logic Module
//!
//! Session state and rules. No I/O and no timers in here; the network layer
//! schedules the periodic work and this module only mutates state.
//!
//! ## Module Structure
//!
//! - `state`: session state, players, zones, mutation primitives
//! - `zone`: safe-zone generation (bootstrap and nesting)
//! - `damage`: out-of-zone damage evaluation
//! - `events`: events handed to the broadcast layer

pub mod damage;
pub mod events;
pub mod state;
pub mod zone;

// Re-export key types
pub use damage::DamageConfig;
pub use events::GameEvent;
pub use state::{GameError, Player, PlayerId, SessionState, Zone, MAX_HEALTH};
pub use zone::{next_zone, ZoneConfig};
