/// Lowest card rank (ace).
pub const MIN_RANK: u8 = 1;
/// Highest card rank (king).
pub const MAX_RANK: u8 = 13;
pub const DECK_SIZE: usize = 52;

/// Cards each seat holds after drawing.
pub const MAX_HAND_COUNT: usize = 2;
/// Cards a seat must put down in a single play.
pub const PLAY_CARD_COUNT: usize = 2;
/// A seat whose deck is smaller than this after a reshuffle loses.
pub const LOSE_BELOW_COUNT: usize = 10;

/// Number of guests a host admits into its room.
pub const DEFAULT_HOST_CAPACITY: usize = 1;
