//! 24 points game engine.
//!
//! - Card primitives and the canonical deck
//! - Deterministic Fisher-Yates shuffle over caller supplied randomness
//! - The phase state machine: a pure transition from one [`GameState`]
//!   to the next given an [`Action`]

pub mod constants;
pub mod entities;
pub mod functional;

mod state_machine;

pub use state_machine::*;
