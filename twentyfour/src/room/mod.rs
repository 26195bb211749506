//! Room and connection lifecycle state machine.
//!
//! Each peer keeps its own [`RoomState`] and only changes it through
//! [`RoomState::apply`]. The room decides who is host, which remote peers
//! are admitted, and whether the game may be synchronized at all.

mod state_machine;

pub use state_machine::{ConnStatus, MAX_LOG_LINES, RoomEvent, RoomState};
