//! Session actor: the replication coordinator.
//!
//! One actor per peer process owns that peer's [`GameState`] and
//! [`RoomState`]. Local commands, channel events and auto-advance ticks
//! are all handled on the actor's task, one at a time, so neither state
//! ever needs a lock.

use super::{
    config::SessionConfig,
    messages::{
        Intent, SessionError, SessionMessage, SessionResponse, SessionSnapshot, SessionUpdate,
        Target,
    },
};
use crate::{
    game::{
        Action, GameState, Phase,
        entities::{PeerId, Seat, Verdict},
        functional::deck_randomness,
    },
    net::{ChannelEvent, PeerMessage, Transport, messages::ROOM_FULL_NOTICE},
    room::{ConnStatus, RoomEvent, RoomState},
};
use chrono::Local;
use std::sync::Arc;
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver},
        oneshot,
    },
    time::{Instant, sleep_until},
};

/// Session actor handle for sending messages
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
}

impl SessionHandle {
    /// Create a new session handle
    pub fn new(sender: mpsc::Sender<SessionMessage>) -> Self {
        Self { sender }
    }

    /// Send a message to the session
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the actor is gone.
    pub async fn send(&self, message: SessionMessage) -> Result<(), SessionError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| SessionError::Closed)
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<SessionResponse>) -> SessionMessage,
    ) -> Result<(), SessionError> {
        let (response, receiver) = oneshot::channel();
        self.send(build(response)).await?;
        receiver
            .await
            .map_err(|_| SessionError::Closed)?
            .into_result()
    }

    /// Open a room on this peer and wait for a guest.
    ///
    /// # Errors
    ///
    /// Fails if the session is closed, already in a room, or the
    /// transport can't listen.
    pub async fn host(&self) -> Result<(), SessionError> {
        self.request(|response| SessionMessage::Host { response })
            .await
    }

    /// Join the room hosted by `host_id`.
    ///
    /// # Errors
    ///
    /// Fails if the session is closed, already in a room, or the host
    /// can't be reached.
    pub async fn join(&self, host_id: PeerId) -> Result<(), SessionError> {
        self.request(|response| SessionMessage::Join { host_id, response })
            .await
    }

    /// Leave the room and abandon any game in progress.
    ///
    /// # Errors
    ///
    /// Fails only if the session is closed.
    pub async fn leave(&self) -> Result<(), SessionError> {
        self.request(|response| SessionMessage::Leave { response })
            .await
    }

    /// # Errors
    ///
    /// Fails only if the session is closed.
    pub async fn submit(&self, action: Action) -> Result<(), SessionError> {
        self.send(SessionMessage::Submit {
            action,
            host_only: false,
        })
        .await
    }

    /// Submit an action that only takes effect on the host. A guest
    /// drops it without contacting the host.
    ///
    /// # Errors
    ///
    /// Fails only if the session is closed.
    pub async fn submit_host_only(&self, action: Action) -> Result<(), SessionError> {
        self.send(SessionMessage::Submit {
            action,
            host_only: true,
        })
        .await
    }

    /// # Errors
    ///
    /// Fails only if the session is closed.
    pub async fn perform(&self, intent: Intent) -> Result<(), SessionError> {
        self.send(SessionMessage::Perform { intent }).await
    }

    /// # Errors
    ///
    /// Fails only if the session is closed.
    pub async fn say(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionMessage::Say { text: text.into() }).await
    }

    /// # Errors
    ///
    /// Fails only if the session is closed.
    pub async fn set_auto_advance(&self, enabled: bool) -> Result<(), SessionError> {
        self.send(SessionMessage::SetAutoAdvance { enabled }).await
    }

    /// # Errors
    ///
    /// Fails only if the session is closed.
    pub async fn tick(&self) -> Result<(), SessionError> {
        self.send(SessionMessage::Tick).await
    }

    /// # Errors
    ///
    /// Fails only if the session is closed.
    pub async fn state(&self) -> Result<SessionSnapshot, SessionError> {
        let (response, receiver) = oneshot::channel();
        self.send(SessionMessage::GetState { response }).await?;
        receiver.await.map_err(|_| SessionError::Closed)
    }

    /// Receive [`SessionUpdate`]s on a fresh channel. Updates that don't
    /// fit in `capacity` are dropped for this subscriber.
    ///
    /// # Errors
    ///
    /// Fails only if the session is closed.
    pub async fn subscribe(
        &self,
        capacity: usize,
    ) -> Result<mpsc::Receiver<SessionUpdate>, SessionError> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        self.send(SessionMessage::Subscribe { sender }).await?;
        Ok(receiver)
    }

    /// Shut the session down and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Fails if the session was already closed.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.request(|response| SessionMessage::Close { response })
            .await
    }
}

/// A pending auto-advance step, tied to the phase it was armed for.
#[derive(Debug)]
struct Ticker {
    phase: Phase,
    deadline: Instant,
}

/// Session actor coordinating one peer's game and room
pub struct SessionActor {
    /// Session configuration
    config: SessionConfig,

    /// Replicated game state; authoritative on the host
    game: GameState,

    /// This peer's room and connection state
    room: RoomState,

    /// Channel to the other peer
    transport: Arc<dyn Transport>,

    /// Lifecycle and data events from the transport
    events: UnboundedReceiver<ChannelEvent>,

    /// Message inbox
    inbox: mpsc::Receiver<SessionMessage>,

    /// Whether the host advances housekeeping phases by itself
    auto_advance: bool,

    /// Next scheduled auto-advance step, if any
    ticker: Option<Ticker>,

    /// Subscribers for state change notifications
    subscribers: Vec<mpsc::Sender<SessionUpdate>>,

    /// Is session closed
    is_closed: bool,
}

impl SessionActor {
    /// Create a new session actor
    ///
    /// # Arguments
    ///
    /// * `config` - Session configuration
    /// * `transport` - Channel to the other peer
    /// * `events` - Receiver the transport reports its events on
    ///
    /// # Returns
    ///
    /// * `(SessionActor, SessionHandle)` - Actor and handle for sending messages
    pub fn new<T: Transport + 'static>(
        config: SessionConfig,
        transport: T,
        events: UnboundedReceiver<ChannelEvent>,
    ) -> (Self, SessionHandle) {
        let (sender, inbox) = mpsc::channel(config.inbox_capacity.max(1));
        let auto_advance = config.auto_advance;

        let actor = Self {
            config,
            game: GameState::new(),
            room: RoomState::new(),
            transport: Arc::new(transport),
            events,
            inbox,
            auto_advance,
            ticker: None,
            subscribers: Vec::new(),
            is_closed: false,
        };

        (actor, SessionHandle::new(sender))
    }

    /// Run the session actor event loop
    pub async fn run(mut self) {
        log::info!("Session {} starting", self.transport.local_id());

        loop {
            let deadline = self.ticker.as_ref().map(|ticker| ticker.deadline);

            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => {
                        // Every handle is gone, nobody can drive us anymore.
                        self.transport.shutdown().await;
                        self.is_closed = true;
                    }
                },

                Some(event) = self.events.recv() => {
                    self.handle_event(event).await;
                }

                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_tick().await;
                }
            }

            if self.is_closed {
                break;
            }
        }

        self.notify(SessionUpdate::Closed);
        log::info!("Session {} closed", self.transport.local_id());
    }

    /// Handle a session message
    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Host { response } => {
                let result = self.handle_host().await;
                let _ = response.send(result);
            }

            SessionMessage::Join { host_id, response } => {
                let result = self.handle_join(host_id).await;
                let _ = response.send(result);
            }

            SessionMessage::Leave { response } => {
                self.handle_leave().await;
                let _ = response.send(SessionResponse::Success);
            }

            SessionMessage::Submit { action, host_only } => {
                self.dispatch(action, host_only).await;
            }

            SessionMessage::Perform { intent } => {
                for (action, host_only) in self.resolve(intent) {
                    self.dispatch(action, host_only).await;
                }
            }

            SessionMessage::Say { text } => {
                self.broadcast(&PeerMessage::Text(text)).await;
            }

            SessionMessage::SetAutoAdvance { enabled } => {
                log::debug!("Session {}: auto advance {enabled}", self.room_label());
                self.auto_advance = enabled;
                self.ticker = None;
                self.rearm();
            }

            SessionMessage::GetState { response } => {
                let _ = response.send(self.snapshot());
            }

            SessionMessage::Tick => {
                if let Some(action) = self.auto_action() {
                    self.dispatch(action, true).await;
                }
            }

            SessionMessage::Subscribe { sender } => {
                self.subscribers.push(sender);
            }

            SessionMessage::Close { response } => {
                self.transport.shutdown().await;
                self.is_closed = true;
                let _ = response.send(SessionResponse::Success);
            }
        }
    }

    async fn handle_host(&mut self) -> SessionResponse {
        if self.room.status != ConnStatus::Disconnected {
            return SessionResponse::Error(format!("already {}", self.room.status));
        }
        if let Err(error) = self.transport.listen().await {
            log::error!("Failed to open a room: {error}");
            self.update_room(&RoomEvent::RaiseError {
                err: error.to_string(),
            });
            return SessionResponse::Error(error.to_string());
        }

        let my_id = self.transport.local_id();
        self.update_room(&RoomEvent::SetupPeer {
            my_id: my_id.clone(),
        });
        self.update_room(&RoomEvent::HostRoom);
        self.log(format!("[Game] You {my_id} hosted a new room."));
        SessionResponse::Success
    }

    async fn handle_join(&mut self, host_id: PeerId) -> SessionResponse {
        if self.room.status != ConnStatus::Disconnected {
            return SessionResponse::Error(format!("already {}", self.room.status));
        }

        let my_id = self.transport.local_id();
        self.update_room(&RoomEvent::SetupPeer { my_id });
        self.update_room(&RoomEvent::JoinRoom {
            host_id: host_id.clone(),
        });
        self.log(format!("[System] Setting up connection with {host_id}..."));

        // The open event arrives through the event channel like any other.
        if let Err(error) = self.transport.connect(&host_id).await {
            log::warn!("Failed to join {host_id}: {error}");
            self.update_room(&RoomEvent::RaiseError {
                err: error.to_string(),
            });
            return SessionResponse::Error(error.to_string());
        }
        SessionResponse::Success
    }

    /// Tear the session's connections down. The game isn't kept around
    /// for a later rejoin.
    async fn handle_leave(&mut self) {
        if let Some(my_id) = self.room.my_id.clone() {
            log::info!("Session {my_id} leaving the room");
        }
        self.transport.shutdown().await;
        self.update_room(&RoomEvent::ResetConnState);
        self.replace_game(GameState::new());
    }

    /// Route an action by role: the host applies it and broadcasts the
    /// result, a guest forwards it to the host.
    async fn dispatch(&mut self, action: Action, host_only: bool) {
        if !self.room.is_connected() {
            log::debug!("Session {}: not connected, dropping {action}", self.room_label());
            return;
        }

        if self.room.is_host() {
            self.apply(&action);
            self.broadcast_state().await;
        } else if host_only || action.is_host_only() {
            log::debug!("Session {}: guest dropped host-only {action}", self.room_label());
        } else if let Some(host_id) = self.room.host_id.clone() {
            self.send_to(&host_id, &PeerMessage::Action(action)).await;
        }
    }

    fn apply(&mut self, action: &Action) {
        match self.game.apply(action) {
            Ok(next) => self.replace_game(next),
            Err(error) => log::error!("Session {}: {action} failed: {error}", self.room_label()),
        }
    }

    fn replace_game(&mut self, game: GameState) {
        if game == self.game {
            return;
        }
        let phase_changed = game.phase != self.game.phase;
        self.game = game;
        if phase_changed {
            log::debug!(
                "Session {}: round {} {}",
                self.room_label(),
                self.game.round,
                self.game.phase
            );
        }
        self.notify(SessionUpdate::GameChanged(Box::new(self.game.clone())));
        self.rearm();
    }

    /// Send the full game state to every connected peer. Runs after every
    /// host dispatch, including ones that changed nothing.
    async fn broadcast_state(&mut self) {
        if self.room.peers_id.is_empty() {
            return;
        }
        let message = PeerMessage::Action(Action::SyncState(Box::new(self.game.clone())));
        self.broadcast(&message).await;
    }

    async fn broadcast(&mut self, message: &PeerMessage) {
        for peer in self.room.peers_id.clone() {
            self.send_to(&peer, message).await;
        }
    }

    async fn send_to(&mut self, remote: &PeerId, message: &PeerMessage) {
        let result = match message.encode() {
            Ok(payload) => self.transport.send(remote, &payload).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(()) => log::debug!("Session {}: sent {remote} {message}", self.room_label()),
            Err(error) => {
                log::warn!("Session {}: failed to send to {remote}: {error}", self.room_label());
                self.update_room(&RoomEvent::RaiseError {
                    err: error.to_string(),
                });
            }
        }
    }

    /// Handle a transport event
    async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Open(remote) => self.handle_open(remote).await,
            ChannelEvent::Data(remote, payload) => self.handle_data(remote, payload).await,
            ChannelEvent::Close(remote) => self.handle_close(remote),
            ChannelEvent::Error(remote, err) => {
                log::warn!("Session {}: connection error from {remote}: {err}", self.room_label());
                self.log(format!("[System] Connection error from {remote}: {err}."));
                self.update_room(&RoomEvent::RaiseError { err });
            }
        }
    }

    async fn handle_open(&mut self, remote: PeerId) {
        let capacity = self.config.host_capacity;
        if self.room.status == ConnStatus::Disconnected || !self.room.admits(&remote, capacity) {
            log::warn!("Session {}: rejecting connection from {remote}", self.room_label());
            let notice = PeerMessage::Text(ROOM_FULL_NOTICE.to_string());
            let result = match notice.encode() {
                Ok(payload) => self.transport.send(&remote, &payload).await,
                Err(error) => Err(error),
            };
            if let Err(error) = result {
                log::warn!(
                    "Session {}: failed to tell {remote} the room is full: {error}",
                    self.room_label()
                );
            }
            self.transport.close(&remote).await;
            return;
        }

        self.update_room(&RoomEvent::SetupConn {
            remote_id: remote.clone(),
            host_capacity: capacity,
        });
        self.log(format!("[System] Connection with {remote} is open."));
        if self.room.is_host() {
            self.log(format!("[Game] Guest {remote} joined your room."));
            // Bring the newcomer up to date right away.
            self.broadcast_state().await;
        } else {
            self.log(format!("[Game] You joined the host room {remote}."));
        }
        self.start_when_ready().await;
    }

    async fn handle_data(&mut self, remote: PeerId, payload: String) {
        if !self.room.peers_id.contains(&remote) {
            log::debug!("Session {}: ignoring data from unknown peer {remote}", self.room_label());
            return;
        }

        match PeerMessage::decode(&payload) {
            PeerMessage::Action(action) => self.handle_remote_action(&remote, action).await,
            PeerMessage::Text(text) => {
                let sender = if self.room.is_host() { "Guest" } else { "Host" };
                self.log(format!("[Game] {sender} {remote} sent you: {text}."));
                self.notify(SessionUpdate::TextReceived { from: remote, text });
            }
        }
    }

    async fn handle_remote_action(&mut self, remote: &PeerId, action: Action) {
        if !self.room.is_host() {
            // Guests never run the rules; they only take snapshots.
            match action {
                Action::SyncState(state) => self.replace_game(*state),
                other => log::debug!(
                    "Session {}: guest ignoring {} from {remote}",
                    self.room_label(),
                    other.kind()
                ),
            }
            return;
        }

        let seat = self.game.slot_of(remote);
        let allowed = match &action {
            Action::PlayCards { slot, .. } | Action::VoteWinner { slot, .. } => {
                seat == Some(*slot)
            }
            _ => false,
        };
        if !allowed {
            log::warn!(
                "Session {}: dropping {} from {remote} (seat {seat:?})",
                self.room_label(),
                action.kind()
            );
            // The guest still gets the authoritative state back.
            self.broadcast_state().await;
            return;
        }

        log::debug!("Session {}: {remote} requested {action}", self.room_label());
        self.dispatch(action, false).await;
    }

    fn handle_close(&mut self, remote: PeerId) {
        if !self.room.peers_id.contains(&remote) {
            return;
        }

        self.update_room(&RoomEvent::CloseConn {
            remote_id: remote.clone(),
        });
        self.log(format!("[System] Connection with {remote} is closed."));
        if self.room.is_host() {
            self.log(format!("[Game] Guest {remote} left your room."));
        } else {
            self.log(format!("[Game] Host {remote} left the room."));
        }

        if self.game.phase != Phase::GameReady {
            log::info!("Session {}: abandoning game in progress", self.room_label());
            self.replace_game(GameState::new());
        }
    }

    /// Deal a fresh game as soon as the host's room fills up.
    async fn start_when_ready(&mut self) {
        if self.room.status == ConnStatus::HostConnected && self.game.phase == Phase::GameReady {
            for (action, host_only) in self.resolve(Intent::StartGame) {
                self.dispatch(action, host_only).await;
            }
        }
    }

    /// Turn an intent into concrete actions using the local view of the
    /// game. Returns nothing when the intent doesn't make sense right now.
    fn resolve(&self, intent: Intent) -> Vec<(Action, bool)> {
        let me = self.room.my_id.as_ref().and_then(|id| self.game.slot_of(id));
        // A guest may know the host under another address than the one
        // the host seated itself with, so go by seat.
        let opponent = me.map(Seat::other);
        let verdict = |target: Target| match target {
            Target::Me => me.map(Verdict::from),
            Target::Opponent => opponent.map(Verdict::from),
            Target::Tie => Some(Verdict::Tie),
        };
        let play = |seat: Option<Seat>| {
            seat.map(|slot| Action::PlayCards {
                slot,
                cards: self.game.players.get(slot).hand.clone(),
            })
        };

        match intent {
            Intent::Play => play(me).map(|a| (a, false)).into_iter().collect(),
            Intent::PlayForOpponent => play(opponent).map(|a| (a, true)).into_iter().collect(),
            Intent::Vote(target) => match (me, verdict(target)) {
                (Some(slot), Some(vote_for)) => {
                    vec![(Action::VoteWinner { slot, vote_for }, false)]
                }
                _ => Vec::new(),
            },
            Intent::SetWinner(target) => match verdict(target) {
                Some(vote_for) => Seat::ALL
                    .into_iter()
                    .map(|slot| (Action::VoteWinner { slot, vote_for }, true))
                    .collect(),
                None => Vec::new(),
            },
            Intent::Draw => vec![(Action::DrawCards, true)],
            Intent::Flip => vec![(Action::FlipCards, true)],
            Intent::Decide => vec![(Action::DecideWinner, true)],
            Intent::Loot => vec![(Action::LootCards, true)],
            Intent::NextRound => vec![(
                Action::NextRound {
                    rand: deck_randomness(),
                },
                true,
            )],
            Intent::StartGame => {
                if self.room.status != ConnStatus::HostConnected {
                    return Vec::new();
                }
                match (self.room.my_id.clone(), self.room.first_peer().cloned()) {
                    (Some(id1), Some(id2)) => vec![(
                        Action::SetupGame {
                            id1,
                            id2,
                            rand: deck_randomness(),
                        },
                        true,
                    )],
                    _ => Vec::new(),
                }
            }
            Intent::CloseGame => vec![(Action::ResetGame, true)],
        }
    }

    /// The housekeeping action the host takes by itself in the current
    /// phase, if the host is in a position to take one.
    fn auto_action(&self) -> Option<Action> {
        if !self.room.is_host() || !self.room.is_connected() {
            return None;
        }
        match self.game.phase {
            Phase::DrawCards => Some(Action::DrawCards),
            Phase::PlayCards => Some(Action::FlipCards),
            Phase::VoteWinner => Some(Action::DecideWinner),
            Phase::LootCards => Some(Action::LootCards),
            Phase::NextRound => Some(Action::NextRound {
                rand: deck_randomness(),
            }),
            Phase::GameReady | Phase::GameOver => None,
        }
    }

    async fn on_tick(&mut self) {
        let Some(ticker) = self.ticker.take() else {
            return;
        };
        if ticker.phase == self.game.phase
            && let Some(action) = self.auto_action()
        {
            self.dispatch(action, true).await;
        }
        self.rearm();
    }

    /// Keep at most one auto-advance step scheduled, for the current
    /// phase, and only while auto mode is on and we host a full room.
    /// A step armed for a phase that has since passed is dropped.
    fn rearm(&mut self) {
        if !self.auto_advance || self.auto_action_phase().is_none() {
            self.ticker = None;
            return;
        }
        let phase = self.game.phase;
        if self.ticker.as_ref().is_some_and(|ticker| ticker.phase == phase) {
            return;
        }
        self.ticker = Some(Ticker {
            phase,
            deadline: Instant::now() + self.config.tick_interval(),
        });
    }

    fn auto_action_phase(&self) -> Option<Phase> {
        let auto = self.room.is_host()
            && self.room.is_connected()
            && !matches!(self.game.phase, Phase::GameReady | Phase::GameOver);
        auto.then_some(self.game.phase)
    }

    fn update_room(&mut self, event: &RoomEvent) {
        let next = self.room.apply(event);
        if next == self.room {
            return;
        }
        self.room = next;
        self.notify(SessionUpdate::RoomChanged(Box::new(self.room.clone())));
        self.rearm();
    }

    fn log(&mut self, line: String) {
        log::info!("{line}");
        let line = format!("{} {line}", Local::now().format("%H:%M:%S"));
        // Subscribers get the line alone, not another copy of the room.
        self.room = self.room.apply(&RoomEvent::AppendLog { line: line.clone() });
        self.notify(SessionUpdate::Logged(line));
    }

    fn room_label(&self) -> String {
        self.room
            .my_id
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            game: self.game.clone(),
            room: self.room.clone(),
            auto_advance: self.auto_advance,
        }
    }

    /// Broadcast an update to all subscribers
    fn notify(&mut self, update: SessionUpdate) {
        self.subscribers
            .retain(|sender| match sender.try_send(update.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("Subscriber channel full, dropping update");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
    }
}
