//! Core stateless primitives.
//!
//! Everything in this module is pure: geometry functions are deterministic
//! given their numeric inputs, and the PRNG only advances when the owner
//! asks it to. No type here holds a reference to session state.

pub mod geo;
pub mod rng;

// Re-export core types
pub use geo::{Coordinate, GeoError};
pub use rng::DeterministicRng;
