//! Peer-to-peer networking.
//!
//! The game treats the transport as a black box that delivers ordered,
//! reliable text messages between two endpoints and reports connection
//! lifecycle events. Two transports ship with the crate: an in-process
//! hub for tests and a TCP transport for real games.

/// The transport seam and its lifecycle events.
pub mod channel;

/// Network error types.
pub mod errors;

/// In-process transport backed by tokio channels.
pub mod memory;

/// Messages exchanged between peers.
pub mod messages;

/// TCP transport.
pub mod tcp;

/// Length-prefixed framing for stream transports.
pub mod utils;

pub use channel::{ChannelEvent, Transport};
pub use errors::NetError;
pub use memory::{MemoryNetwork, MemoryTransport};
pub use messages::PeerMessage;
pub use tcp::TcpTransport;
