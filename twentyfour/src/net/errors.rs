//! Network error types for transports and the peer message codec.

use std::time::Duration;
use thiserror::Error;

use crate::game::entities::PeerId;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("message size {actual} exceeds maximum {max}")]
    MessageTooLarge { actual: usize, max: usize },

    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    #[error("no connection with peer {0}")]
    UnknownPeer(PeerId),

    #[error("peer {0} is not reachable")]
    Unreachable(PeerId),

    #[error("peer did not identify itself within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("transport is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, NetError>;
