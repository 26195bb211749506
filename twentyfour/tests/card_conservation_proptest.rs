/// Property-based tests for the game state machine using proptest
///
/// These tests verify that no sequence of actions can create, lose or
/// duplicate a card, and that shuffling is always a permutation.
use proptest::prelude::*;
use std::collections::BTreeSet;
use twentyfour::{
    Action, GameState, Phase,
    constants::DECK_SIZE,
    entities::{PeerId, Seat, Verdict, build_deck},
    functional::shuffle,
};

fn rand_strategy(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..1.0, len)
}

fn seat_strategy() -> impl Strategy<Value = Seat> {
    prop_oneof![Just(Seat::P1), Just(Seat::P2)]
}

fn verdict_strategy() -> impl Strategy<Value = Verdict> {
    prop_oneof![Just(Verdict::P1), Just(Verdict::P2), Just(Verdict::Tie)]
}

/// Abstract moves; plays are resolved against the current state so that
/// most of them are legal.
#[derive(Clone, Debug)]
enum Move {
    Draw,
    PlayHand(Seat),
    PlayForeign(Seat),
    Flip,
    Vote(Seat, Verdict),
    Decide,
    Loot,
    Next(Vec<f64>),
}

fn move_strategy() -> impl Strategy<Value = Move> {
    prop_oneof![
        1 => Just(Move::Draw),
        3 => seat_strategy().prop_map(Move::PlayHand),
        1 => seat_strategy().prop_map(Move::PlayForeign),
        1 => Just(Move::Flip),
        3 => (seat_strategy(), verdict_strategy()).prop_map(|(s, v)| Move::Vote(s, v)),
        2 => Just(Move::Decide),
        1 => Just(Move::Loot),
        1 => rand_strategy(DECK_SIZE).prop_map(Move::Next),
    ]
}

fn to_action(state: &GameState, mv: Move) -> Action {
    match mv {
        Move::Draw => Action::DrawCards,
        Move::PlayHand(slot) => Action::PlayCards {
            slot,
            cards: state.players.get(slot).hand.clone(),
        },
        Move::PlayForeign(slot) => Action::PlayCards {
            slot,
            cards: state.players.get(slot.other()).hand.clone(),
        },
        Move::Flip => Action::FlipCards,
        Move::Vote(slot, vote_for) => Action::VoteWinner { slot, vote_for },
        Move::Decide => Action::DecideWinner,
        Move::Loot => Action::LootCards,
        Move::Next(rand) => Action::NextRound { rand },
    }
}

fn canonical_ids() -> BTreeSet<String> {
    build_deck().iter().map(|c| c.id().to_string()).collect()
}

fn assert_conserved(state: &GameState) -> Result<(), TestCaseError> {
    let ids: Vec<String> = state.cards().map(|c| c.id().to_string()).collect();
    let unique: BTreeSet<String> = ids.iter().cloned().collect();
    prop_assert_eq!(ids.len(), DECK_SIZE, "no card may be lost or duplicated");
    prop_assert_eq!(unique, canonical_ids());
    Ok(())
}

proptest! {
    #[test]
    fn test_cards_are_conserved(
        rand in rand_strategy(DECK_SIZE),
        moves in prop::collection::vec(move_strategy(), 0..200),
    ) {
        let mut state = GameState::new()
            .apply(&Action::SetupGame {
                id1: PeerId::new("A"),
                id2: PeerId::new("B"),
                rand,
            })
            .unwrap();
        assert_conserved(&state)?;

        for mv in moves {
            let action = to_action(&state, mv);
            state = state.apply(&action).unwrap();
            assert_conserved(&state)?;
        }
    }

    #[test]
    fn test_shuffle_is_permutation(
        len in 0usize..=DECK_SIZE,
        rand in rand_strategy(DECK_SIZE),
    ) {
        let deck: Vec<_> = build_deck().into_iter().take(len).collect();
        let shuffled = shuffle(&deck, &rand).unwrap();

        let mut before: Vec<String> = deck.iter().map(|c| c.id().to_string()).collect();
        let mut after: Vec<String> = shuffled.iter().map(|c| c.id().to_string()).collect();
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn test_shuffle_is_deterministic(rand in rand_strategy(DECK_SIZE)) {
        let deck = build_deck();
        prop_assert_eq!(shuffle(&deck, &rand).unwrap(), shuffle(&deck, &rand).unwrap());
    }

    #[test]
    fn test_guarded_actions_leave_lobby_unchanged(
        mv in move_strategy(),
    ) {
        let lobby = GameState::new();
        let action = to_action(&lobby, mv);
        prop_assert_eq!(lobby.apply(&action).unwrap(), lobby);
    }

    #[test]
    fn test_decide_resolves_agreement_once(verdict in verdict_strategy()) {
        let mut state = GameState::new()
            .apply(&Action::SetupGame {
                id1: PeerId::new("A"),
                id2: PeerId::new("B"),
                rand: vec![0.5; DECK_SIZE],
            })
            .unwrap()
            .apply(&Action::DrawCards)
            .unwrap();
        for slot in Seat::ALL {
            let cards = state.players.get(slot).hand.clone();
            state = state.apply(&Action::PlayCards { slot, cards }).unwrap();
        }
        for slot in Seat::ALL {
            state = state.apply(&Action::VoteWinner { slot, vote_for: verdict }).unwrap();
        }

        let decided = state.apply(&Action::DecideWinner).unwrap();
        prop_assert_eq!(decided.phase, Phase::LootCards);
        prop_assert_eq!(decided.round_winner, Some(verdict));
        prop_assert_eq!(decided.apply(&Action::DecideWinner).unwrap(), decided);
    }
}
