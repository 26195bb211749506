//! Replication coordinator.
//!
//! A [`SessionActor`] ties one peer's game and room state machines to a
//! [`Transport`](crate::net::Transport):
//! - The host is authoritative. It applies every action and broadcasts a
//!   full snapshot of the game after each one
//! - A guest forwards its own plays and votes to the host and adopts
//!   whatever snapshot the host sends back
//! - The host advances housekeeping phases by itself on a timer
//!
//! ## Example
//!
//! ```no_run
//! use twentyfour::{
//!     net::MemoryNetwork,
//!     session::{SessionActor, SessionConfig},
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let network = MemoryNetwork::new();
//!     let (transport, events) = network.endpoint().await;
//!     let (actor, handle) = SessionActor::new(SessionConfig::default(), transport, events);
//!     tokio::spawn(actor.run());
//!
//!     handle.host().await.unwrap();
//! }
//! ```

pub mod actor;
pub mod config;
pub mod messages;

pub use actor::{SessionActor, SessionHandle};
pub use config::SessionConfig;
pub use messages::{
    Intent, SessionError, SessionMessage, SessionResponse, SessionSnapshot, SessionUpdate, Target,
};

use crate::net::{ChannelEvent, Transport};
use tokio::sync::mpsc::UnboundedReceiver;

/// Start a session on its own task and return a handle to it.
pub fn spawn<T: Transport + 'static>(
    config: SessionConfig,
    transport: T,
    events: UnboundedReceiver<ChannelEvent>,
) -> SessionHandle {
    let (actor, handle) = SessionActor::new(config, transport, events);
    tokio::spawn(actor.run());
    handle
}
