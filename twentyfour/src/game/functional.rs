//! Pure helpers used by the game state machine.

use rand::Rng;

use super::{GameError, constants::DECK_SIZE};

/// Fisher-Yates shuffle driven by externally supplied uniform `[0, 1)`
/// values, one consumed per descending index from `n - 1` down to `1`.
///
/// The input is left untouched and a shuffled copy is returned. Extra
/// random values are ignored.
///
/// # Errors
///
/// Returns [`GameError::InsufficientRandomness`] if fewer than `n - 1`
/// random values are provided.
pub fn shuffle<T: Clone>(items: &[T], rand: &[f64]) -> Result<Vec<T>, GameError> {
    let needed = items.len().saturating_sub(1);
    if rand.len() < needed {
        return Err(GameError::InsufficientRandomness {
            needed,
            available: rand.len(),
        });
    }

    let mut out = items.to_vec();
    for (k, i) in (1..out.len()).rev().enumerate() {
        // Float to int casts saturate, and the min guards against
        // values outside of [0, 1) coming off the wire.
        let j = ((rand[k] * (i + 1) as f64).floor() as usize).min(i);
        out.swap(i, j);
    }
    Ok(out)
}

/// Uniform `[0, 1)` values for a shuffle. Only the host calls this, at
/// the moment it creates an action that needs randomness.
#[must_use]
pub fn random_values(size: usize) -> Vec<f64> {
    let mut rng = rand::rng();
    (0..size).map(|_| rng.random::<f64>()).collect()
}

/// Enough randomness to shuffle any subset of the deck.
#[must_use]
pub fn deck_randomness() -> Vec<f64> {
    random_values(DECK_SIZE)
}
