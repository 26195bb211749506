//! Session actor message types.

use std::fmt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::{
    game::{
        Action, GameState,
        entities::{PeerId, Seat},
    },
    room::RoomState,
};

/// Who an intent is aimed at, relative to the local peer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Target {
    Me,
    Opponent,
    Tie,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Me => "me",
            Self::Opponent => "my opponent",
            Self::Tie => "a tie",
        };
        write!(f, "{repr}")
    }
}

/// High level player and host requests. The session turns these into
/// [`Action`]s using its current view of the game.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Intent {
    /// Play every card in my hand.
    Play,
    /// Play the opponent's hand on their behalf (host only).
    PlayForOpponent,
    /// Cast my vote for the round.
    Vote(Target),
    /// Cast both seats' votes at once (host only).
    SetWinner(Target),
    Draw,
    Flip,
    Decide,
    Loot,
    NextRound,
    /// Deal a new game for me and the first connected peer (host only).
    StartGame,
    /// Abandon the current game (host only).
    CloseGame,
}

/// Messages that can be sent to a SessionActor
#[derive(Debug)]
pub enum SessionMessage {
    /// Open a room and wait for a guest
    Host {
        response: oneshot::Sender<SessionResponse>,
    },

    /// Join the room hosted by `host_id`
    Join {
        host_id: PeerId,
        response: oneshot::Sender<SessionResponse>,
    },

    /// Leave the room, abandoning any game in progress
    Leave {
        response: oneshot::Sender<SessionResponse>,
    },

    /// Submit a game action
    Submit { action: Action, host_only: bool },

    /// Perform a high level intent
    Perform { intent: Intent },

    /// Send free text to every connected peer
    Say { text: String },

    /// Turn host-side auto-advancement on or off
    SetAutoAdvance { enabled: bool },

    /// Get the current game and room state
    GetState {
        response: oneshot::Sender<SessionSnapshot>,
    },

    /// Internal: run the auto-advance step for the current phase now
    Tick,

    /// Subscribe to session updates
    Subscribe { sender: mpsc::Sender<SessionUpdate> },

    /// Shut the session down
    Close {
        response: oneshot::Sender<SessionResponse>,
    },
}

/// Generic session response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResponse {
    Success,
    Error(String),
}

/// Point-in-time copy of everything a session owns.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub game: GameState,
    pub room: RoomState,
    pub auto_advance: bool,
}

impl SessionSnapshot {
    /// Seat of the local peer in the current game.
    #[must_use]
    pub fn my_seat(&self) -> Option<Seat> {
        self.room
            .my_id
            .as_ref()
            .and_then(|id| self.game.slot_of(id))
    }
}

/// Notification sent to subscribers when something changes
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// The game state was replaced (by a transition or a snapshot)
    GameChanged(Box<GameState>),
    /// Room or connection state changed
    RoomChanged(Box<RoomState>),
    /// A line was added to the room log
    Logged(String),
    /// A peer sent free text
    TextReceived { from: PeerId, text: String },
    /// The session shut down
    Closed,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
    #[error("{0}")]
    Rejected(String),
}

impl SessionResponse {
    /// # Errors
    ///
    /// Returns [`SessionError::Rejected`] for an error response.
    pub fn into_result(self) -> Result<(), SessionError> {
        match self {
            Self::Success => Ok(()),
            Self::Error(reason) => Err(SessionError::Rejected(reason)),
        }
    }
}
