use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::Result;
use crate::game::{Action, entities::PeerId};

/// Notice a host sends to a peer it turns away because the room is full.
pub const ROOM_FULL_NOTICE: &str = "[System] The room is full.";

/// A message carried over the channel: either a game action envelope or
/// free text (chat, notices) that is only ever logged.
#[derive(Clone, Debug, PartialEq)]
pub enum PeerMessage {
    Action(Action),
    Text(String),
}

impl PeerMessage {
    /// Only JSON objects with a recognized `type` are actions. Anything
    /// else, including malformed envelopes, is treated as text.
    #[must_use]
    pub fn decode(payload: &str) -> Self {
        match serde_json::from_str::<Action>(payload) {
            Ok(action) => Self::Action(action),
            Err(_) => Self::Text(payload.to_string()),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the action can't be serialized.
    pub fn encode(&self) -> Result<String> {
        match self {
            Self::Action(action) => Ok(serde_json::to_string(action)?),
            Self::Text(text) => Ok(text.clone()),
        }
    }
}

impl From<Action> for PeerMessage {
    fn from(value: Action) -> Self {
        Self::Action(value)
    }
}

impl fmt::Display for PeerMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Action(action) => write!(f, "{} ({action})", action.kind()),
            Self::Text(text) => write!(f, "{text:?}"),
        }
    }
}

/// First frame on a stream connection, identifying the connecting peer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Hello {
    pub id: PeerId,
}
