use async_trait::async_trait;
use log::{debug, warn};
use std::{collections::HashMap, io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{
        Mutex, RwLock,
        mpsc::{self, UnboundedReceiver, UnboundedSender},
    },
    task::JoinHandle,
    time::timeout,
};
use uuid::Uuid;

use super::{
    channel::{ChannelEvent, Transport},
    errors::{NetError, Result},
    messages::Hello,
    utils::{MAX_MESSAGE_SIZE, read_prefixed, write_prefixed},
};
use crate::game::entities::PeerId;

/// How long an accepted stream gets to send its [`Hello`] frame.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

struct Connection {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    reader: Option<JoinHandle<()>>,
}

type Connections = Arc<RwLock<HashMap<PeerId, Connection>>>;

/// TCP transport. Frames are length-prefixed UTF-8 text. A connecting
/// peer opens with a [`Hello`] frame carrying its id; a hosting peer's id
/// is the address it listens on, which is what guests connect to.
pub struct TcpTransport {
    id: PeerId,
    listener: Mutex<Option<TcpListener>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    connections: Connections,
    events: UnboundedSender<ChannelEvent>,
}

impl TcpTransport {
    /// Bind a listening socket. The bound address becomes this peer's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the address can't be bound.
    pub async fn bind(addr: SocketAddr) -> Result<(Self, UnboundedReceiver<ChannelEvent>)> {
        let listener = TcpListener::bind(addr).await?;
        let id = PeerId::new(&listener.local_addr()?.to_string());
        Ok(Self::with_listener(id, Some(listener)))
    }

    /// A transport that only dials out, with a generated id.
    #[must_use]
    pub fn client() -> (Self, UnboundedReceiver<ChannelEvent>) {
        let id = PeerId::new(&format!("guest-{}", Uuid::new_v4().simple()));
        Self::with_listener(id, None)
    }

    fn with_listener(
        id: PeerId,
        listener: Option<TcpListener>,
    ) -> (Self, UnboundedReceiver<ChannelEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let transport = Self {
            id,
            listener: Mutex::new(listener),
            accept_task: Mutex::new(None),
            connections: Arc::new(RwLock::new(HashMap::new())),
            events,
        };
        (transport, receiver)
    }
}

/// Track a freshly opened stream, announce it, and start pumping its
/// frames into the event channel.
async fn register(
    remote: PeerId,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    connections: Connections,
    events: UnboundedSender<ChannelEvent>,
) {
    let connection = Connection {
        writer: Arc::new(Mutex::new(writer)),
        reader: None,
    };
    if let Some(previous) = connections.write().await.insert(remote.clone(), connection)
        && let Some(reader) = previous.reader
    {
        reader.abort();
    }
    let _ = events.send(ChannelEvent::Open(remote.clone()));

    let handle = tokio::spawn(pump(
        remote.clone(),
        reader,
        connections.clone(),
        events,
    ));
    if let Some(connection) = connections.write().await.get_mut(&remote) {
        connection.reader = Some(handle);
    }
}

async fn pump(
    remote: PeerId,
    mut reader: OwnedReadHalf,
    connections: Connections,
    events: UnboundedSender<ChannelEvent>,
) {
    loop {
        match read_prefixed(&mut reader).await {
            Ok(payload) => {
                let _ = events.send(ChannelEvent::Data(remote.clone(), payload));
            }
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(error) => {
                warn!("connection with {remote} failed: {error}");
                let _ = events.send(ChannelEvent::Error(remote.clone(), error.to_string()));
                break;
            }
        }
    }

    // Whoever removes the connection reports the close.
    if connections.write().await.remove(&remote).is_some() {
        let _ = events.send(ChannelEvent::Close(remote));
    }
}

async fn handshake(
    stream: TcpStream,
    connections: Connections,
    events: UnboundedSender<ChannelEvent>,
    limit: Duration,
) -> Result<()> {
    let (mut reader, writer) = stream.into_split();
    let frame = timeout(limit, read_prefixed(&mut reader))
        .await
        .map_err(|_| NetError::HandshakeTimeout(limit))??;
    let hello: Hello = serde_json::from_str(&frame)?;
    debug!("accepted connection from {}", hello.id);
    register(hello.id, reader, writer, connections, events).await;
    Ok(())
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_id(&self) -> PeerId {
        self.id.clone()
    }

    async fn listen(&self) -> Result<()> {
        let Some(listener) = self.listener.lock().await.take() else {
            return Err(NetError::Closed);
        };
        let connections = self.connections.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let connections = connections.clone();
                        let events = events.clone();
                        tokio::spawn(async move {
                            let result =
                                handshake(stream, connections, events, HANDSHAKE_TIMEOUT).await;
                            if let Err(error) = result {
                                warn!("handshake with {addr} failed: {error}");
                            }
                        });
                    }
                    Err(error) => {
                        warn!("failed to accept a connection: {error}");
                    }
                }
            }
        });
        *self.accept_task.lock().await = Some(task);
        Ok(())
    }

    async fn connect(&self, remote: &PeerId) -> Result<()> {
        let addr: SocketAddr = remote
            .as_str()
            .parse()
            .map_err(|_| NetError::InvalidFormat(format!("{remote} is not a socket address")))?;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|_| NetError::Unreachable(remote.clone()))?;
        let (reader, mut writer) = stream.into_split();
        let hello = serde_json::to_string(&Hello {
            id: self.id.clone(),
        })?;
        write_prefixed(&mut writer, &hello).await?;
        register(
            remote.clone(),
            reader,
            writer,
            self.connections.clone(),
            self.events.clone(),
        )
        .await;
        Ok(())
    }

    async fn send(&self, remote: &PeerId, payload: &str) -> Result<()> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(NetError::MessageTooLarge {
                actual: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let writer = {
            let connections = self.connections.read().await;
            let connection = connections
                .get(remote)
                .ok_or_else(|| NetError::UnknownPeer(remote.clone()))?;
            connection.writer.clone()
        };
        let mut writer = writer.lock().await;
        write_prefixed(&mut *writer, payload).await?;
        Ok(())
    }

    async fn close(&self, remote: &PeerId) {
        let Some(connection) = self.connections.write().await.remove(remote) else {
            return;
        };
        if let Some(reader) = connection.reader {
            reader.abort();
        }
        let mut writer = connection.writer.lock().await;
        let _ = tokio::io::AsyncWriteExt::shutdown(&mut *writer).await;
        let _ = self.events.send(ChannelEvent::Close(remote.clone()));
    }

    async fn shutdown(&self) {
        if let Some(task) = self.accept_task.lock().await.take() {
            task.abort();
        }
        let remotes: Vec<PeerId> = self.connections.read().await.keys().cloned().collect();
        for remote in remotes {
            self.close(&remote).await;
        }
    }
}
