//! Network Layer
//!
//! WebSocket transport around the authoritative session. Nothing in here
//! decides game rules; this layer serializes inbound intent into the
//! session's single write lock and mirrors every mutation batch back out
//! as a consistent snapshot.

pub mod protocol;
pub mod server;
pub mod session;

pub use protocol::{ClientMessage, ErrorCode, ServerMessage, StateSnapshot};
pub use server::{GameServer, GameServerError, ServerConfig};
pub use session::{run_session_loop, SessionConfig, SessionPhase, ZoneSession};
