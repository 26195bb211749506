/// Integration tests for session replication
///
/// Two (or more) sessions talk over an in-process network. These tests
/// verify that the host stays authoritative, that guests mirror it, and
/// that the room admits and releases peers correctly.
use std::time::Duration;
use tokio::{
    sync::mpsc::{Receiver, UnboundedReceiver},
    time::{Instant, sleep, timeout},
};
use twentyfour::{
    Action, ConnStatus, GameState, Intent, Phase, SessionConfig, SessionHandle, Target,
    entities::{PeerId, Seat, Verdict},
    net::{ChannelEvent, MemoryNetwork, PeerMessage, Transport, messages::ROOM_FULL_NOTICE},
    session::{self, SessionSnapshot, SessionUpdate},
};

const TIMEOUT: Duration = Duration::from_secs(3);

fn manual() -> SessionConfig {
    SessionConfig {
        auto_advance: false,
        ..SessionConfig::default()
    }
}

fn automatic() -> SessionConfig {
    SessionConfig {
        auto_advance: true,
        tick_ms: 10,
        ..SessionConfig::default()
    }
}

async fn peer(network: &MemoryNetwork, config: SessionConfig) -> (SessionHandle, PeerId) {
    let (transport, events) = network.endpoint().await;
    let id = transport.local_id();
    (session::spawn(config, transport, events), id)
}

/// Poll a session until its state satisfies `done`.
async fn wait_until(
    handle: &SessionHandle,
    mut done: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let snapshot = handle.state().await.unwrap();
        if done(&snapshot) {
            return snapshot;
        }
        assert!(
            Instant::now() < deadline,
            "timed out, last state: {snapshot:?}"
        );
        sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until host and guest hold the same game and `done` holds for it.
async fn wait_synced(
    host: &SessionHandle,
    guest: &SessionHandle,
    mut done: impl FnMut(&GameState) -> bool,
) -> GameState {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let h = host.state().await.unwrap().game;
        let g = guest.state().await.unwrap().game;
        if h == g && done(&h) {
            return h;
        }
        assert!(Instant::now() < deadline, "timed out, host: {h:?}");
        sleep(Duration::from_millis(5)).await;
    }
}

struct Room {
    network: MemoryNetwork,
    host: SessionHandle,
    host_id: PeerId,
    guest: SessionHandle,
    guest_id: PeerId,
}

/// Host a room, have a guest join, and wait for the first deal to reach
/// the guest.
async fn room(host_config: SessionConfig) -> Room {
    let network = MemoryNetwork::new();
    let (host, host_id) = peer(&network, host_config).await;
    let (guest, guest_id) = peer(&network, manual()).await;

    host.host().await.unwrap();
    guest.join(host_id.clone()).await.unwrap();
    wait_synced(&host, &guest, |game| game.phase != Phase::GameReady).await;

    Room {
        network,
        host,
        host_id,
        guest,
        guest_id,
    }
}

async fn next_snapshot(events: &mut UnboundedReceiver<ChannelEvent>) -> GameState {
    loop {
        let event = timeout(TIMEOUT, events.recv()).await.unwrap().unwrap();
        if let ChannelEvent::Data(_, payload) = event
            && let PeerMessage::Action(Action::SyncState(state)) = PeerMessage::decode(&payload)
        {
            return *state;
        }
    }
}

async fn next_update(
    updates: &mut Receiver<SessionUpdate>,
    mut wanted: impl FnMut(&SessionUpdate) -> bool,
) -> SessionUpdate {
    loop {
        let update = timeout(TIMEOUT, updates.recv()).await.unwrap().unwrap();
        if wanted(&update) {
            return update;
        }
    }
}

#[tokio::test]
async fn test_join_starts_and_replicates_a_game() {
    let room = room(manual()).await;

    let host = room.host.state().await.unwrap();
    let guest = room.guest.state().await.unwrap();
    assert_eq!(host.room.status, ConnStatus::HostConnected);
    assert_eq!(guest.room.status, ConnStatus::GuestConnected);
    assert_eq!(host.room.peers_id, vec![room.guest_id.clone()]);
    assert_eq!(guest.room.peers_id, vec![room.host_id.clone()]);

    assert_eq!(host.game.phase, Phase::DrawCards);
    assert_eq!(guest.game, host.game);
    assert_eq!(host.my_seat(), Some(Seat::P1));
    assert_eq!(guest.my_seat(), Some(Seat::P2));
    assert!(
        host.room
            .logs
            .iter()
            .any(|line| line.contains("is open"))
    );
}

#[tokio::test]
async fn test_manual_round_with_forwarded_guest_actions() {
    let room = room(manual()).await;
    let (host, guest) = (&room.host, &room.guest);

    host.perform(Intent::Draw).await.unwrap();
    wait_synced(host, guest, |game| game.phase == Phase::PlayCards).await;

    // The guest's play travels to the host and comes back as a snapshot.
    guest.perform(Intent::Play).await.unwrap();
    let game = wait_synced(host, guest, |game| !game.players.p2.played.is_empty()).await;
    assert_eq!(game.field.len(), 2);
    assert_eq!(game.phase, Phase::PlayCards);

    host.perform(Intent::Play).await.unwrap();
    wait_synced(host, guest, |game| game.phase == Phase::VoteWinner).await;

    guest.perform(Intent::Vote(Target::Me)).await.unwrap();
    host.perform(Intent::Vote(Target::Opponent)).await.unwrap();
    wait_synced(host, guest, |game| {
        game.votes.p1 == Some(Verdict::P2) && game.votes.p2 == Some(Verdict::P2)
    })
    .await;

    host.perform(Intent::Decide).await.unwrap();
    host.perform(Intent::Loot).await.unwrap();
    let game = wait_synced(host, guest, |game| game.phase == Phase::NextRound).await;
    assert_eq!(game.players.p2.loot.len(), 4);

    host.perform(Intent::NextRound).await.unwrap();
    let game = wait_synced(host, guest, |game| game.phase == Phase::DrawCards).await;
    assert_eq!(game.round, 2);
}

#[tokio::test]
async fn test_guest_cannot_run_host_only_actions() {
    let room = room(manual()).await;
    let before = room.host.state().await.unwrap().game;

    room.guest.submit(Action::DrawCards).await.unwrap();
    room.guest.perform(Intent::Draw).await.unwrap();
    room.guest.perform(Intent::CloseGame).await.unwrap();
    sleep(Duration::from_millis(50)).await;

    assert_eq!(room.host.state().await.unwrap().game, before);
    assert_eq!(room.guest.state().await.unwrap().game, before);
}

#[tokio::test]
async fn test_host_drops_forged_actions_from_guest() {
    let network = MemoryNetwork::new();
    let (host, host_id) = peer(&network, manual()).await;
    host.host().await.unwrap();

    // A hand-driven guest that speaks the wire protocol directly.
    let (raw, mut raw_events) = network.endpoint().await;
    raw.connect(&host_id).await.unwrap();
    let mut game = next_snapshot(&mut raw_events).await;
    while game.phase != Phase::DrawCards {
        game = next_snapshot(&mut raw_events).await;
    }
    assert_eq!(game.slot_of(&raw.local_id()), Some(Seat::P2));

    let draw = PeerMessage::Action(Action::DrawCards).encode().unwrap();
    raw.send(&host_id, &draw).await.unwrap();
    let game = next_snapshot(&mut raw_events).await;
    assert_eq!(game.phase, Phase::DrawCards);

    host.perform(Intent::Draw).await.unwrap();
    let game = next_snapshot(&mut raw_events).await;
    assert_eq!(game.phase, Phase::PlayCards);

    // Playing the host's seat is refused.
    let forged = PeerMessage::Action(Action::PlayCards {
        slot: Seat::P1,
        cards: game.players.p1.hand.clone(),
    });
    raw.send(&host_id, &forged.encode().unwrap()).await.unwrap();
    let after = next_snapshot(&mut raw_events).await;
    assert!(after.players.p1.played.is_empty());
    assert!(after.field.is_empty());

    // Its own seat is fine.
    let own = PeerMessage::Action(Action::PlayCards {
        slot: Seat::P2,
        cards: game.players.p2.hand.clone(),
    });
    raw.send(&host_id, &own.encode().unwrap()).await.unwrap();
    let after = next_snapshot(&mut raw_events).await;
    assert_eq!(after.players.p2.played.len(), 2);
    assert_eq!(host.state().await.unwrap().game, after);
}

#[tokio::test]
async fn test_second_guest_is_turned_away() {
    let room = room(manual()).await;
    let (late, _) = peer(&room.network, manual()).await;

    late.join(room.host_id.clone()).await.unwrap();
    let late_state = wait_until(&late, |snapshot| {
        snapshot.room.status == ConnStatus::GuestWaiting
            && snapshot
                .room
                .logs
                .iter()
                .any(|line| line.contains(ROOM_FULL_NOTICE))
    })
    .await;
    assert!(late_state.room.peers_id.is_empty());
    assert_eq!(late_state.game.phase, Phase::GameReady);

    let host = room.host.state().await.unwrap();
    assert_eq!(host.room.peers_id, vec![room.guest_id.clone()]);
    assert_eq!(host.room.status, ConnStatus::HostConnected);
    assert_eq!(host.game, room.guest.state().await.unwrap().game);
}

#[tokio::test]
async fn test_text_reaches_the_other_peer() {
    let room = room(manual()).await;
    let mut updates = room.host.subscribe(16).await.unwrap();

    room.guest.say("good game").await.unwrap();

    // Log lines arrive one at a time rather than as a whole room.
    let update = next_update(&mut updates, |update| {
        matches!(update, SessionUpdate::Logged(line) if line.contains("good game"))
    })
    .await;
    assert!(matches!(update, SessionUpdate::Logged(_)));

    let update = next_update(&mut updates, |update| {
        matches!(update, SessionUpdate::TextReceived { .. })
    })
    .await;
    let SessionUpdate::TextReceived { from, text } = update else {
        unreachable!();
    };
    assert_eq!(from, room.guest_id);
    assert_eq!(text, "good game");

    let host = room.host.state().await.unwrap();
    assert!(host.room.logs.iter().any(|line| line.contains("good game")));
}

#[tokio::test]
async fn test_guest_leaving_abandons_the_game() {
    let room = room(manual()).await;

    room.guest.leave().await.unwrap();
    let guest = room.guest.state().await.unwrap();
    assert_eq!(guest.room.status, ConnStatus::Disconnected);
    assert_eq!(guest.game, GameState::new());

    let host = wait_until(&room.host, |snapshot| {
        snapshot.room.status == ConnStatus::HostWaiting
    })
    .await;
    assert!(host.room.peers_id.is_empty());
    assert_eq!(host.game, GameState::new());

    // The room stays open for the next guest.
    room.guest.join(room.host_id.clone()).await.unwrap();
    wait_synced(&room.host, &room.guest, |game| {
        game.phase == Phase::DrawCards
    })
    .await;
}

#[tokio::test]
async fn test_host_leaving_abandons_the_game() {
    let room = room(manual()).await;

    room.host.leave().await.unwrap();
    let guest = wait_until(&room.guest, |snapshot| {
        snapshot.room.status == ConnStatus::GuestWaiting
    })
    .await;
    assert_eq!(guest.game, GameState::new());
}

#[tokio::test]
async fn test_actions_are_dropped_while_disconnected() {
    let network = MemoryNetwork::new();
    let (lonely, _) = peer(&network, manual()).await;
    lonely.host().await.unwrap();

    lonely.perform(Intent::StartGame).await.unwrap();
    lonely.submit(Action::DrawCards).await.unwrap();
    sleep(Duration::from_millis(20)).await;

    let snapshot = lonely.state().await.unwrap();
    assert_eq!(snapshot.room.status, ConnStatus::HostWaiting);
    assert_eq!(snapshot.game, GameState::new());
}

#[tokio::test]
async fn test_host_can_restart_the_game() {
    let room = room(manual()).await;

    room.host.perform(Intent::CloseGame).await.unwrap();
    wait_synced(&room.host, &room.guest, |game| game.phase == Phase::GameReady).await;

    room.host.perform(Intent::StartGame).await.unwrap();
    let game = wait_synced(&room.host, &room.guest, |game| {
        game.phase == Phase::DrawCards
    })
    .await;
    assert_eq!(game.slot_of(&room.host_id), Some(Seat::P1));
}

#[tokio::test]
async fn test_host_sets_the_winner_for_both_seats() {
    let room = room(manual()).await;
    let (host, guest) = (&room.host, &room.guest);

    host.perform(Intent::Draw).await.unwrap();
    wait_synced(host, guest, |game| game.phase == Phase::PlayCards).await;
    host.perform(Intent::Play).await.unwrap();
    host.perform(Intent::PlayForOpponent).await.unwrap();
    wait_synced(host, guest, |game| game.phase == Phase::VoteWinner).await;

    host.perform(Intent::SetWinner(Target::Tie)).await.unwrap();
    host.perform(Intent::Decide).await.unwrap();
    let game = wait_synced(host, guest, |game| game.phase == Phase::LootCards).await;
    assert_eq!(game.round_winner, Some(Verdict::Tie));
}

#[tokio::test]
async fn test_auto_advance_drives_housekeeping() {
    let room = room(automatic()).await;
    let (host, guest) = (&room.host, &room.guest);

    wait_synced(host, guest, |game| game.phase == Phase::PlayCards).await;
    guest.perform(Intent::Play).await.unwrap();
    host.perform(Intent::Play).await.unwrap();
    wait_synced(host, guest, |game| game.phase == Phase::VoteWinner).await;

    host.perform(Intent::Vote(Target::Me)).await.unwrap();
    guest.perform(Intent::Vote(Target::Opponent)).await.unwrap();
    let game = wait_synced(host, guest, |game| {
        game.round == 2 && game.phase == Phase::PlayCards
    })
    .await;
    assert_eq!(game.players.p1.deck.len(), 22);
    assert_eq!(game.players.p1.loot.len(), 4);
}

#[tokio::test]
async fn test_auto_advance_can_be_toggled() {
    let room = room(manual()).await;
    let (host, guest) = (&room.host, &room.guest);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(host.state().await.unwrap().game.phase, Phase::DrawCards);

    host.set_auto_advance(true).await.unwrap();
    let snapshot = wait_until(host, |snapshot| {
        snapshot.game.phase == Phase::PlayCards
    })
    .await;
    assert!(snapshot.auto_advance);
    wait_synced(host, guest, |game| game.phase == Phase::PlayCards).await;
}

#[tokio::test]
async fn test_tick_runs_the_pending_step() {
    let room = room(manual()).await;

    room.host.tick().await.unwrap();
    wait_synced(&room.host, &room.guest, |game| {
        game.phase == Phase::PlayCards
    })
    .await;

    // Ticks on the guest do nothing.
    room.guest.tick().await.unwrap();
    sleep(Duration::from_millis(20)).await;
    assert_eq!(room.host.state().await.unwrap().game.phase, Phase::PlayCards);
}

#[tokio::test]
async fn test_close_notifies_subscribers() {
    let room = room(manual()).await;
    let mut updates = room.guest.subscribe(64).await.unwrap();

    room.guest.close().await.unwrap();
    next_update(&mut updates, |update| matches!(update, SessionUpdate::Closed)).await;
    assert!(room.guest.state().await.is_err());

    wait_until(&room.host, |snapshot| {
        snapshot.room.status == ConnStatus::HostWaiting
    })
    .await;
}
