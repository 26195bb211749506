use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{collections::BTreeMap, fmt};

use super::constants;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    #[serde(rename = "C")]
    Club,
    #[serde(rename = "D")]
    Diamond,
    #[serde(rename = "H")]
    Heart,
    #[serde(rename = "S")]
    Spade,
}

impl Suit {
    pub const ALL: [Self; 4] = [Self::Club, Self::Diamond, Self::Heart, Self::Spade];

    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Club => 'C',
            Self::Diamond => 'D',
            Self::Heart => 'H',
            Self::Spade => 'S',
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Diamond => "♦",
            Self::Heart => "♥",
            Self::Spade => "♠",
        };
        write!(f, "{repr}")
    }
}

/// Card rank. Ace counts as 1 and king as 13, which is what the
/// arithmetic of the game cares about.
pub type Rank = u8;

/// Rendering of a rank as it appears in a card id.
#[must_use]
pub fn rank_label(value: Rank) -> String {
    match value {
        1 => "A".to_string(),
        11 => "J".to_string(),
        12 => "Q".to_string(),
        13 => "K".to_string(),
        v => v.to_string(),
    }
}

/// A playing card. The id (`value` label followed by the suit letter,
/// e.g. `"10H"` or `"QS"`) is unique within a 52 card deck.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Card {
    pub value: Rank,
    pub suit: Suit,
    id: String,
}

impl Card {
    #[must_use]
    pub fn new(value: Rank, suit: Suit) -> Self {
        let id = format!("{}{}", rank_label(value), suit.letter());
        Self { value, suit, id }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = format!("{}/{}", rank_label(self.value), self.suit);
        write!(f, "{repr:>4}")
    }
}

#[derive(Serialize, Deserialize)]
struct CardRepr {
    value: Rank,
    suit: Suit,
    id: String,
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CardRepr {
            value: self.value,
            suit: self.suit,
            id: self.id.clone(),
        }
        .serialize(serializer)
    }
}

// The id is derived, so a snapshot with a mismatched id is rejected
// instead of smuggling a duplicate card into the partition.
impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = CardRepr::deserialize(deserializer)?;
        if !(constants::MIN_RANK..=constants::MAX_RANK).contains(&repr.value) {
            return Err(de::Error::custom(format!("invalid rank {}", repr.value)));
        }
        let card = Self::new(repr.value, repr.suit);
        if card.id != repr.id {
            return Err(de::Error::custom(format!(
                "card id {} does not match {}",
                repr.id, card.id
            )));
        }
        Ok(card)
    }
}

/// The canonical, unshuffled 52 card deck (13 ranks x 4 suits).
#[must_use]
pub fn build_deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(constants::DECK_SIZE);
    for value in constants::MIN_RANK..=constants::MAX_RANK {
        for suit in Suit::ALL {
            cards.push(Card::new(value, suit));
        }
    }
    cards
}

/// One of the two fixed player roles.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    P1,
    P2,
}

impl Seat {
    pub const ALL: [Self; 2] = [Self::P1, Self::P2];

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::P1 => Self::P2,
            Self::P2 => Self::P1,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::P1 => "p1",
            Self::P2 => "p2",
        };
        write!(f, "{repr}")
    }
}

/// What a seat votes for at the end of a round, and what the round
/// is finally decided as.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    P1,
    P2,
    Tie,
}

impl Verdict {
    #[must_use]
    pub const fn winner(self) -> Option<Seat> {
        match self {
            Self::P1 => Some(Seat::P1),
            Self::P2 => Some(Seat::P2),
            Self::Tie => None,
        }
    }
}

impl From<Seat> for Verdict {
    fn from(value: Seat) -> Self {
        match value {
            Seat::P1 => Self::P1,
            Seat::P2 => Self::P2,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::P1 => "p1",
            Self::P2 => "p2",
            Self::Tie => "tie",
        };
        write!(f, "{repr}")
    }
}

/// Identity string allocated by the transport for a peer process.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(s: &str) -> Self {
        Self(s.trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Card containers owned by one seat.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerState {
    pub hand: Vec<Card>,
    pub deck: Vec<Card>,
    pub loot: Vec<Card>,
    pub played: Vec<Card>,
}

impl PlayerState {
    /// Draw from the top of the deck until the hand holds `max_hand`
    /// cards or the deck runs out. A hand is never shrunk by drawing.
    pub fn draw(&mut self, max_hand: usize) {
        let count = max_hand
            .saturating_sub(self.hand.len())
            .min(self.deck.len());
        self.hand.extend(self.deck.drain(..count));
    }

    /// Move every hand card whose id appears in `cards` into `played`.
    /// Returns `false` and leaves the player untouched unless every
    /// requested card was found in the hand.
    pub fn play(&mut self, cards: &[Card]) -> bool {
        let (played, kept): (Vec<Card>, Vec<Card>) = self
            .hand
            .iter()
            .cloned()
            .partition(|card| cards.iter().any(|c| c.id() == card.id()));
        if played.len() != cards.len() {
            return false;
        }
        self.hand = kept;
        self.played = played;
        true
    }

    pub fn merge_loot(&mut self) {
        self.deck.append(&mut self.loot);
    }

    /// Number of cards across all of this seat's containers.
    #[must_use]
    pub fn card_count(&self) -> usize {
        self.hand.len() + self.deck.len() + self.loot.len() + self.played.len()
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.hand
            .iter()
            .chain(&self.deck)
            .chain(&self.loot)
            .chain(&self.played)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Players {
    pub p1: PlayerState,
    pub p2: PlayerState,
}

impl Players {
    #[must_use]
    pub fn get(&self, seat: Seat) -> &PlayerState {
        match seat {
            Seat::P1 => &self.p1,
            Seat::P2 => &self.p2,
        }
    }

    pub fn get_mut(&mut self, seat: Seat) -> &mut PlayerState {
        match seat {
            Seat::P1 => &mut self.p1,
            Seat::P2 => &mut self.p2,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Votes {
    pub p1: Option<Verdict>,
    pub p2: Option<Verdict>,
}

impl Votes {
    #[must_use]
    pub fn get(&self, seat: Seat) -> Option<Verdict> {
        match seat {
            Seat::P1 => self.p1,
            Seat::P2 => self.p2,
        }
    }

    pub fn set(&mut self, seat: Seat, verdict: Verdict) {
        match seat {
            Seat::P1 => self.p1 = Some(verdict),
            Seat::P2 => self.p2 = Some(verdict),
        }
    }

    pub fn clear(&mut self) {
        self.p1 = None;
        self.p2 = None;
    }
}

/// Mapping of peer identities to the seats they occupy.
pub type SeatMap = BTreeMap<PeerId, Seat>;
