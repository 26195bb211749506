//! Game phase state machine.
//!
//! A [`GameState`] only ever moves forward through [`GameState::apply`].
//! Actions that don't fit the current phase, or that a seat isn't allowed
//! to take right now, leave the state as it was. The only failure is a
//! caller handing in too little randomness for a shuffle.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::constants::{LOSE_BELOW_COUNT, MAX_HAND_COUNT, PLAY_CARD_COUNT};
use super::entities::{Card, PeerId, Players, Seat, SeatMap, Verdict, Votes, build_deck};
use super::functional::shuffle;

#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("need {needed} random values to shuffle but only {available} were given")]
    InsufficientRandomness { needed: usize, available: usize },
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    GameReady,
    DrawCards,
    PlayCards,
    VoteWinner,
    LootCards,
    NextRound,
    GameOver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::GameReady => "waiting to start",
            Self::DrawCards => "drawing cards",
            Self::PlayCards => "playing cards",
            Self::VoteWinner => "voting for a winner",
            Self::LootCards => "looting the field",
            Self::NextRound => "moving to the next round",
            Self::GameOver => "game over",
        };
        write!(f, "{repr}")
    }
}

/// Everything that can happen to a game. Serialized as the
/// `{"type": ..., "payload": ...}` envelope that travels between peers.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    SetupGame {
        id1: PeerId,
        id2: PeerId,
        rand: Vec<f64>,
    },
    ResetGame,
    DrawCards,
    PlayCards {
        slot: Seat,
        cards: Vec<Card>,
    },
    FlipCards,
    VoteWinner {
        slot: Seat,
        #[serde(rename = "voteFor")]
        vote_for: Verdict,
    },
    DecideWinner,
    LootCards,
    NextRound {
        rand: Vec<f64>,
    },
    SyncState(Box<GameState>),
}

impl Action {
    /// Actions a guest never forwards to the host. Players only ever
    /// play their cards and vote; everything else is driven by the host.
    #[must_use]
    pub const fn is_host_only(&self) -> bool {
        !matches!(self, Self::PlayCards { .. } | Self::VoteWinner { .. })
    }

    /// Wire name of the action type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SetupGame { .. } => "SETUP_GAME",
            Self::ResetGame => "RESET_GAME",
            Self::DrawCards => "DRAW_CARDS",
            Self::PlayCards { .. } => "PLAY_CARDS",
            Self::FlipCards => "FLIP_CARDS",
            Self::VoteWinner { .. } => "VOTE_WINNER",
            Self::DecideWinner => "DECIDE_WINNER",
            Self::LootCards => "LOOT_CARDS",
            Self::NextRound { .. } => "NEXT_ROUND",
            Self::SyncState(_) => "SYNC_STATE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::SetupGame { id1, id2, .. } => format!("set up a game for {id1} and {id2}"),
            Self::ResetGame => "reset the game".to_string(),
            Self::DrawCards => "draw cards".to_string(),
            Self::PlayCards { slot, cards } => {
                let cards = cards.iter().map(Card::id).collect::<Vec<_>>().join(" ");
                format!("{slot} plays {cards}")
            }
            Self::FlipCards => "flip cards".to_string(),
            Self::VoteWinner { slot, vote_for } => format!("{slot} votes for {vote_for}"),
            Self::DecideWinner => "decide the winner".to_string(),
            Self::LootCards => "loot the field".to_string(),
            Self::NextRound { .. } => "next round".to_string(),
            Self::SyncState(state) => format!("sync to round {} ({})", state.round, state.phase),
        };
        write!(f, "{repr}")
    }
}

/// The replicated game. The host's copy is the source of truth.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub players: Players,
    pub votes: Votes,
    pub id_to_slot: SeatMap,
    pub field: Vec<Card>,
    pub round: u32,
    pub phase: Phase,
    pub round_winner: Option<Verdict>,
    pub game_winner: Option<Seat>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            players: Players::default(),
            votes: Votes::default(),
            id_to_slot: SeatMap::new(),
            field: Vec::new(),
            round: 1,
            phase: Phase::GameReady,
            round_winner: None,
            game_winner: None,
        }
    }

    /// Seat occupied by a peer, if any.
    #[must_use]
    pub fn slot_of(&self, id: &PeerId) -> Option<Seat> {
        self.id_to_slot.get(id).copied()
    }

    #[must_use]
    pub fn is_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    /// Every card currently tracked by the game, in no particular order.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.players
            .p1
            .cards()
            .chain(self.players.p2.cards())
            .chain(&self.field)
    }

    /// Run a single transition.
    ///
    /// # Errors
    ///
    /// Only fails when a shuffle is given fewer random values than it
    /// needs. Rule violations are not errors and return an unchanged copy.
    pub fn apply(&self, action: &Action) -> Result<Self, GameError> {
        let next = match action {
            Action::SetupGame { id1, id2, rand } => self.setup(id1, id2, rand)?,
            Action::ResetGame => Some(Self::new()),
            Action::DrawCards => self.draw(),
            Action::PlayCards { slot, cards } => self.play(*slot, cards),
            Action::FlipCards => self.flip(),
            Action::VoteWinner { slot, vote_for } => self.vote(*slot, *vote_for),
            Action::DecideWinner => self.decide(),
            Action::LootCards => self.loot(),
            Action::NextRound { rand } => self.next_round(rand)?,
            Action::SyncState(state) => Some(state.as_ref().clone()),
        };
        Ok(next.unwrap_or_else(|| self.clone()))
    }

    fn setup(&self, id1: &PeerId, id2: &PeerId, rand: &[f64]) -> Result<Option<Self>, GameError> {
        if self.phase != Phase::GameReady {
            return Ok(None);
        }

        let mut deck = shuffle(&build_deck(), rand)?;
        let p2_deck = deck.split_off(deck.len() / 2);

        let mut next = Self::new();
        next.players.p1.deck = deck;
        next.players.p2.deck = p2_deck;
        next.id_to_slot.insert(id1.clone(), Seat::P1);
        next.id_to_slot.insert(id2.clone(), Seat::P2);
        next.phase = Phase::DrawCards;
        Ok(Some(next))
    }

    fn draw(&self) -> Option<Self> {
        if self.phase != Phase::DrawCards {
            return None;
        }

        let mut next = self.clone();
        next.players.p1.draw(MAX_HAND_COUNT);
        next.players.p2.draw(MAX_HAND_COUNT);
        next.phase = Phase::PlayCards;
        Some(next)
    }

    fn play(&self, slot: Seat, cards: &[Card]) -> Option<Self> {
        if self.phase != Phase::PlayCards
            || !self.players.get(slot).played.is_empty()
            || cards.len() != PLAY_CARD_COUNT
        {
            return None;
        }

        let mut next = self.clone();
        let player = next.players.get_mut(slot);
        if !player.play(cards) {
            return None;
        }
        let played = player.played.clone();
        next.field.extend(played);

        if let Some(flipped) = next.flip() {
            return Some(flipped);
        }
        Some(next)
    }

    /// Reveals the round once both seats have played. Playing the second
    /// pair of cards already does this, so a manual flip after that point
    /// finds nothing to do.
    fn flip(&self) -> Option<Self> {
        let both_played = Seat::ALL
            .iter()
            .all(|seat| !self.players.get(*seat).played.is_empty());
        if self.phase != Phase::PlayCards || !both_played {
            return None;
        }

        let mut next = self.clone();
        next.players.p1.played.clear();
        next.players.p2.played.clear();
        next.phase = Phase::VoteWinner;
        Some(next)
    }

    fn vote(&self, slot: Seat, vote_for: Verdict) -> Option<Self> {
        if self.phase != Phase::VoteWinner || self.votes.get(slot).is_some() {
            return None;
        }

        let mut next = self.clone();
        next.votes.set(slot, vote_for);
        Some(next)
    }

    /// Disagreeing votes are thrown out and both seats vote again, as
    /// many times as it takes.
    fn decide(&self) -> Option<Self> {
        if self.phase != Phase::VoteWinner {
            return None;
        }
        let (Some(v1), Some(v2)) = (self.votes.p1, self.votes.p2) else {
            return None;
        };

        let mut next = self.clone();
        next.votes.clear();
        if v1 == v2 {
            next.round_winner = Some(v1);
            next.phase = Phase::LootCards;
        }
        Some(next)
    }

    fn loot(&self) -> Option<Self> {
        if self.phase != Phase::LootCards {
            return None;
        }
        let verdict = self.round_winner?;

        let mut next = self.clone();
        let mut field = std::mem::take(&mut next.field);
        match verdict.winner() {
            Some(seat) => next.players.get_mut(seat).loot.append(&mut field),
            None => {
                // Two cards per seat per round, so the halves are even.
                let second = field.split_off(field.len() / 2);
                next.players.p1.loot.extend(field);
                next.players.p2.loot.extend(second);
            }
        }
        next.round_winner = None;
        next.phase = Phase::NextRound;
        Some(next)
    }

    fn next_round(&self, rand: &[f64]) -> Result<Option<Self>, GameError> {
        if self.phase != Phase::NextRound {
            return Ok(None);
        }

        let some_deck_empty = Seat::ALL
            .iter()
            .any(|seat| self.players.get(*seat).deck.is_empty());
        if some_deck_empty {
            return self.reshuffle(rand).map(Some);
        }

        let mut next = self.clone();
        next.round += 1;
        next.phase = Phase::DrawCards;
        Ok(Some(next))
    }

    /// Fold loot back into each deck, then either end the game or shuffle
    /// both decks for another round.
    fn reshuffle(&self, rand: &[f64]) -> Result<Self, GameError> {
        let mut next = self.clone();
        next.players.p1.merge_loot();
        next.players.p2.merge_loot();

        let loser = Seat::ALL
            .into_iter()
            .find(|seat| next.players.get(*seat).deck.len() < LOSE_BELOW_COUNT);
        if let Some(loser) = loser {
            next.phase = Phase::GameOver;
            next.game_winner = Some(loser.other());
            return Ok(next);
        }

        let split = next.players.p1.deck.len().min(rand.len());
        let (p1_rand, p2_rand) = rand.split_at(split);
        next.players.p1.deck = shuffle(&next.players.p1.deck, p1_rand)?;
        next.players.p2.deck = shuffle(&next.players.p2.deck, p2_rand)?;
        next.round += 1;
        next.phase = Phase::DrawCards;
        Ok(next)
    }
}
