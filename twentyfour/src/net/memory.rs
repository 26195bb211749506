use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::{
    RwLock,
    mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use uuid::Uuid;

use super::{
    channel::{ChannelEvent, Transport},
    errors::{NetError, Result},
};
use crate::game::entities::PeerId;

#[derive(Debug)]
struct Endpoint {
    events: UnboundedSender<ChannelEvent>,
    listening: bool,
    links: HashSet<PeerId>,
}

impl Endpoint {
    fn notify(&self, event: ChannelEvent) {
        // The owner dropped its receiver, so nobody is left to tell.
        let _ = self.events.send(event);
    }
}

/// An in-process switchboard that connects [`MemoryTransport`]s.
///
/// Messages are delivered in order and never lost, which is exactly the
/// channel contract the game expects from a real transport.
#[derive(Clone, Debug, Default)]
pub struct MemoryNetwork {
    endpoints: Arc<RwLock<HashMap<PeerId, Endpoint>>>,
}

impl MemoryNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new endpoint with a freshly allocated id.
    pub async fn endpoint(&self) -> (MemoryTransport, UnboundedReceiver<ChannelEvent>) {
        let id = PeerId::new(&Uuid::new_v4().to_string());
        self.endpoint_with_id(id).await
    }

    /// Register a new endpoint under a chosen id, replacing any previous
    /// endpoint with the same id.
    pub async fn endpoint_with_id(
        &self,
        id: PeerId,
    ) -> (MemoryTransport, UnboundedReceiver<ChannelEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let endpoint = Endpoint {
            events,
            listening: false,
            links: HashSet::new(),
        };
        self.endpoints.write().await.insert(id.clone(), endpoint);
        let transport = MemoryTransport {
            id,
            network: self.clone(),
        };
        (transport, receiver)
    }
}

/// One process's view of a [`MemoryNetwork`].
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    id: PeerId,
    network: MemoryNetwork,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_id(&self) -> PeerId {
        self.id.clone()
    }

    async fn listen(&self) -> Result<()> {
        let mut endpoints = self.network.endpoints.write().await;
        let endpoint = endpoints.get_mut(&self.id).ok_or(NetError::Closed)?;
        endpoint.listening = true;
        Ok(())
    }

    async fn connect(&self, remote: &PeerId) -> Result<()> {
        let mut endpoints = self.network.endpoints.write().await;
        if !endpoints.contains_key(&self.id) {
            return Err(NetError::Closed);
        }
        match endpoints.get_mut(remote) {
            Some(endpoint) if endpoint.listening && *remote != self.id => {
                endpoint.links.insert(self.id.clone());
                endpoint.notify(ChannelEvent::Open(self.id.clone()));
            }
            _ => return Err(NetError::Unreachable(remote.clone())),
        }
        if let Some(endpoint) = endpoints.get_mut(&self.id) {
            endpoint.links.insert(remote.clone());
            endpoint.notify(ChannelEvent::Open(remote.clone()));
        }
        Ok(())
    }

    async fn send(&self, remote: &PeerId, payload: &str) -> Result<()> {
        let endpoints = self.network.endpoints.read().await;
        let linked = endpoints
            .get(&self.id)
            .is_some_and(|endpoint| endpoint.links.contains(remote));
        if !linked {
            return Err(NetError::UnknownPeer(remote.clone()));
        }
        let endpoint = endpoints.get(remote).ok_or(NetError::Closed)?;
        endpoint
            .events
            .send(ChannelEvent::Data(self.id.clone(), payload.to_string()))
            .map_err(|_| NetError::Closed)
    }

    async fn close(&self, remote: &PeerId) {
        let mut endpoints = self.network.endpoints.write().await;
        let was_linked = endpoints
            .get_mut(&self.id)
            .is_some_and(|endpoint| endpoint.links.remove(remote));
        if !was_linked {
            return;
        }
        if let Some(endpoint) = endpoints.get_mut(remote) {
            endpoint.links.remove(&self.id);
            endpoint.notify(ChannelEvent::Close(self.id.clone()));
        }
        if let Some(endpoint) = endpoints.get(&self.id) {
            endpoint.notify(ChannelEvent::Close(remote.clone()));
        }
    }

    async fn shutdown(&self) {
        let links: Vec<PeerId> = {
            let mut endpoints = self.network.endpoints.write().await;
            match endpoints.get_mut(&self.id) {
                Some(endpoint) => {
                    endpoint.listening = false;
                    endpoint.links.iter().cloned().collect()
                }
                None => Vec::new(),
            }
        };
        for remote in links {
            self.close(&remote).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let network = MemoryNetwork::new();
        let (host, mut host_events) = network.endpoint().await;
        let (guest, mut guest_events) = network.endpoint().await;

        host.listen().await.unwrap();
        guest.connect(&host.local_id()).await.unwrap();

        assert_eq!(
            host_events.recv().await,
            Some(ChannelEvent::Open(guest.local_id()))
        );
        assert_eq!(
            guest_events.recv().await,
            Some(ChannelEvent::Open(host.local_id()))
        );

        guest.send(&host.local_id(), "ping").await.unwrap();
        host.send(&guest.local_id(), "pong").await.unwrap();
        assert_eq!(
            host_events.recv().await,
            Some(ChannelEvent::Data(guest.local_id(), "ping".to_string()))
        );
        assert_eq!(
            guest_events.recv().await,
            Some(ChannelEvent::Data(host.local_id(), "pong".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_requires_listener() {
        let network = MemoryNetwork::new();
        let (a, _a_events) = network.endpoint().await;
        let (b, _b_events) = network.endpoint().await;
        assert!(matches!(
            b.connect(&a.local_id()).await,
            Err(NetError::Unreachable(_))
        ));
        assert!(matches!(
            b.connect(&PeerId::new("nobody")).await,
            Err(NetError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_send_without_link() {
        let network = MemoryNetwork::new();
        let (a, _a_events) = network.endpoint().await;
        let (b, _b_events) = network.endpoint().await;
        assert!(matches!(
            a.send(&b.local_id(), "hi").await,
            Err(NetError::UnknownPeer(_))
        ));
    }

    #[tokio::test]
    async fn test_close_notifies_both_sides() {
        let network = MemoryNetwork::new();
        let (host, mut host_events) = network.endpoint().await;
        let (guest, mut guest_events) = network.endpoint().await;
        host.listen().await.unwrap();
        guest.connect(&host.local_id()).await.unwrap();
        host_events.recv().await;
        guest_events.recv().await;

        host.close(&guest.local_id()).await;
        assert_eq!(
            host_events.recv().await,
            Some(ChannelEvent::Close(guest.local_id()))
        );
        assert_eq!(
            guest_events.recv().await,
            Some(ChannelEvent::Close(host.local_id()))
        );
        assert!(guest.send(&host.local_id(), "late").await.is_err());

        // Closing twice is a no-op.
        host.close(&guest.local_id()).await;
        assert!(host_events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_closes_all_links() {
        let network = MemoryNetwork::new();
        let (host, _host_events) = network.endpoint().await;
        let (g1, mut g1_events) = network.endpoint().await;
        let (g2, mut g2_events) = network.endpoint().await;
        host.listen().await.unwrap();
        g1.connect(&host.local_id()).await.unwrap();
        g2.connect(&host.local_id()).await.unwrap();
        g1_events.recv().await;
        g2_events.recv().await;

        host.shutdown().await;
        assert_eq!(
            g1_events.recv().await,
            Some(ChannelEvent::Close(host.local_id()))
        );
        assert_eq!(
            g2_events.recv().await,
            Some(ChannelEvent::Close(host.local_id()))
        );
        assert!(matches!(
            g1.connect(&host.local_id()).await,
            Err(NetError::Unreachable(_))
        ));
    }
}
