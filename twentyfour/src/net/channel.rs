use async_trait::async_trait;

use super::errors::Result;
use crate::game::entities::PeerId;

/// Lifecycle and data events a transport reports for its connections.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChannelEvent {
    /// A connection with the peer is open and ready for data.
    Open(PeerId),
    /// The peer sent a message.
    Data(PeerId, String),
    /// The connection with the peer is gone, whichever side closed it.
    Close(PeerId),
    /// The connection with the peer hit an error.
    Error(PeerId, String),
}

/// A point-to-point message channel between peers.
///
/// Implementations deliver [`ChannelEvent`]s on the receiver handed out
/// when the transport is created. Every method returns promptly; failures
/// that happen later on a connection are reported as events instead.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Identity of this process, allocated by the transport.
    fn local_id(&self) -> PeerId;

    /// Start accepting incoming connections.
    async fn listen(&self) -> Result<()>;

    /// Open a connection with a listening peer.
    async fn connect(&self, remote: &PeerId) -> Result<()>;

    /// Send one message to a connected peer.
    async fn send(&self, remote: &PeerId, payload: &str) -> Result<()>;

    /// Close the connection with a peer, if any.
    async fn close(&self, remote: &PeerId);

    /// Close every connection and stop listening.
    async fn shutdown(&self);
}
