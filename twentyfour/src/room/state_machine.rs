use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::entities::PeerId;

/// Oldest room log lines are dropped past this many.
pub const MAX_LOG_LINES: usize = 200;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnStatus {
    #[default]
    Disconnected,
    Online,
    HostWaiting,
    HostConnected,
    GuestWaiting,
    GuestConnected,
}

impl fmt::Display for ConnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Disconnected => "disconnected",
            Self::Online => "online",
            Self::HostWaiting => "hosting, waiting for a guest",
            Self::HostConnected => "hosting",
            Self::GuestWaiting => "joining",
            Self::GuestConnected => "joined",
        };
        write!(f, "{repr}")
    }
}

/// Connection lifecycle events fed into [`RoomState::apply`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RoomEvent {
    /// The transport allocated an identity for this process.
    SetupPeer { my_id: PeerId },
    /// This peer opens a room and becomes its host.
    HostRoom,
    /// This peer is joining the room hosted by `host_id`.
    JoinRoom { host_id: PeerId },
    /// A connection with `remote_id` opened.
    SetupConn {
        remote_id: PeerId,
        host_capacity: usize,
    },
    /// The connection with `remote_id` closed.
    CloseConn { remote_id: PeerId },
    RaiseError { err: String },
    AppendLog { line: String },
    ResetConnState,
}

/// Per-process connection metadata. Never shared with the other peer.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub my_id: Option<PeerId>,
    pub host_id: Option<PeerId>,
    /// Connected peers in the order they were admitted.
    pub peers_id: Vec<PeerId>,
    pub status: ConnStatus,
    pub error: Option<String>,
    pub logs: Vec<String>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.host_id.is_some() && self.my_id == self.host_id
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(
            self.status,
            ConnStatus::HostConnected | ConnStatus::GuestConnected
        )
    }

    /// How many remote peers this side admits. A guest only ever talks
    /// to its host.
    #[must_use]
    pub fn capacity(&self, host_capacity: usize) -> usize {
        if self.is_host() { host_capacity } else { 1 }
    }

    /// Whether a connection from `remote_id` would be admitted.
    #[must_use]
    pub fn admits(&self, remote_id: &PeerId, host_capacity: usize) -> bool {
        self.peers_id.contains(remote_id) || self.peers_id.len() < self.capacity(host_capacity)
    }

    /// First connected peer, which for a two-seat room is the opponent.
    #[must_use]
    pub fn first_peer(&self) -> Option<&PeerId> {
        self.peers_id.first()
    }

    #[must_use]
    pub fn apply(&self, event: &RoomEvent) -> Self {
        let mut next = self.clone();
        match event {
            RoomEvent::SetupPeer { my_id } => {
                next.my_id = Some(my_id.clone());
                next.status = ConnStatus::Online;
            }
            RoomEvent::HostRoom => {
                next.host_id.clone_from(&next.my_id);
                next.status = ConnStatus::HostWaiting;
            }
            RoomEvent::JoinRoom { host_id } => {
                next.host_id = Some(host_id.clone());
                next.status = ConnStatus::GuestWaiting;
            }
            RoomEvent::SetupConn {
                remote_id,
                host_capacity,
            } => {
                let capacity = self.capacity(*host_capacity);
                if self.peers_id.len() >= capacity {
                    return next;
                }
                if !next.peers_id.contains(remote_id) {
                    next.peers_id.push(remote_id.clone());
                }
                next.status = next.waiting_or_connected(next.peers_id.len() >= capacity);
            }
            RoomEvent::CloseConn { remote_id } => {
                if !next.peers_id.contains(remote_id) {
                    return next;
                }
                next.peers_id.retain(|id| id != remote_id);
                next.status = next.waiting_or_connected(false);
            }
            RoomEvent::RaiseError { err } => {
                next.error = Some(err.clone());
            }
            RoomEvent::AppendLog { line } => {
                next.logs.push(line.clone());
                let overflow = next.logs.len().saturating_sub(MAX_LOG_LINES);
                next.logs.drain(..overflow);
            }
            RoomEvent::ResetConnState => return Self::new(),
        }
        next
    }

    fn waiting_or_connected(&self, full: bool) -> ConnStatus {
        match (self.is_host(), full) {
            (true, true) => ConnStatus::HostConnected,
            (true, false) => ConnStatus::HostWaiting,
            (false, true) => ConnStatus::GuestConnected,
            (false, false) => ConnStatus::GuestWaiting,
        }
    }
}
