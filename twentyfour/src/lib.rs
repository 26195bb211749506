//! # Twentyfour
//!
//! A two player "24 points" card game played directly between two peers.
//!
//! Each player holds half of a shuffled deck. Every round both players
//! draw and play two cards, then agree on who found a way to make 24
//! with the four cards on the field. The round winner loots the field.
//! A player whose deck falls below ten cards at the end of a round loses.
//!
//! ## Architecture
//!
//! The game is a pure state machine driven by serializable actions, moving
//! through seven phases:
//!
//! - **GameReady**: No game dealt yet
//! - **DrawCards**: Both players refill their hands
//! - **PlayCards**: Each player puts two cards on the field
//! - **VoteWinner**: Players vote on the round winner until they agree
//! - **LootCards**: The winner collects the field
//! - **NextRound**: Loot is shuffled back into the decks, or the game ends
//! - **GameOver**: One player ran out of cards
//!
//! One peer hosts. It owns the authoritative game and broadcasts a full
//! snapshot after every action; the guest only ever mirrors the host.
//!
//! ## Core Modules
//!
//! - [`game`]: Cards, shuffling and the game state machine
//! - [`room`]: Connection lifecycle and room membership
//! - [`net`]: Transports and the wire format between peers
//! - [`session`]: The actor that replicates the game over a transport
//!
//! ## Example
//!
//! ```
//! use twentyfour::{Action, GameState, Phase, functional::deck_randomness};
//!
//! let game = GameState::new()
//!     .apply(&Action::SetupGame {
//!         id1: "alice".into(),
//!         id2: "bob".into(),
//!         rand: deck_randomness(),
//!     })
//!     .unwrap();
//! assert_eq!(game.phase, Phase::DrawCards);
//! ```

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    Action, GameError, GameState, Phase,
    constants::{self, LOSE_BELOW_COUNT, MAX_HAND_COUNT, PLAY_CARD_COUNT},
    entities::{self, Card, PeerId, Seat, Suit, Verdict},
    functional,
};

/// Room and connection state machine.
pub mod room;
pub use room::{ConnStatus, RoomEvent, RoomState};

/// Transports and peer messages.
pub mod net;

/// Replication coordinator.
pub mod session;
pub use session::{Intent, SessionConfig, SessionHandle, Target};
