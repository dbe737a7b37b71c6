use crate::hand::is_natural;
use crate::CardCount;
use serde::{Deserialize, Serialize};

const INFINITE_DISTRIBUTION: [f64; 10] = [
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    4.0 / 13.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckMode {
    Infinite,
    Finite,
}

/// Remaining card composition together with how cards are drawn from it.
///
/// An infinite deck never changes: every draw sees one-deck proportions. A
/// finite deck is a multiset that loses a card on every draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DeckModel {
    Infinite,
    Finite(CardCount),
}

impl DeckModel {
    pub fn infinite() -> DeckModel {
        DeckModel::Infinite
    }

    pub fn with_number_of_decks(number_of_decks: u8) -> DeckModel {
        DeckModel::Finite(CardCount::with_number_of_decks(number_of_decks))
    }

    /// `counts[i]` is the number of cards of value `i + 1`.
    pub fn custom(counts: [u16; 10]) -> DeckModel {
        DeckModel::Finite(CardCount::new(&counts))
    }

    pub fn mode(&self) -> DeckMode {
        match self {
            DeckModel::Infinite => DeckMode::Infinite,
            DeckModel::Finite(_) => DeckMode::Finite,
        }
    }

    /// Number of cards left, `None` for an infinite deck.
    pub fn cards_remaining(&self) -> Option<u16> {
        match self {
            DeckModel::Infinite => None,
            DeckModel::Finite(card_count) => Some(card_count.get_total()),
        }
    }

    /// Draw probability of each card value, indexed by `card - 1`.
    pub fn distribution(&self) -> [f64; 10] {
        match self {
            DeckModel::Infinite => INFINITE_DISTRIBUTION,
            DeckModel::Finite(card_count) => {
                let mut ret = [0.0; 10];
                let total = card_count.get_total();
                if total == 0 {
                    return ret;
                }
                for (p, &count) in ret.iter_mut().zip(card_count.get_counts()) {
                    *p = count as f64 / total as f64;
                }
                ret
            }
        }
    }

    pub fn probability(&self, card: u8) -> f64 {
        match self {
            DeckModel::Infinite => INFINITE_DISTRIBUTION[(card - 1) as usize],
            DeckModel::Finite(card_count) => {
                let total = card_count.get_total();
                if total == 0 {
                    0.0
                } else {
                    card_count[card] as f64 / total as f64
                }
            }
        }
    }

    /// Returns the deck left after `card` is drawn. The card must be
    /// available (its probability is positive).
    pub fn draw(&self, card: u8) -> DeckModel {
        match self {
            DeckModel::Infinite => DeckModel::Infinite,
            DeckModel::Finite(card_count) => {
                let mut card_count = *card_count;
                card_count.remove_card(card);
                DeckModel::Finite(card_count)
            }
        }
    }

    /// Draws the given cards one after another. Returns `None` when one of
    /// them is not available.
    pub fn draw_all(&self, cards: &[u8]) -> Option<DeckModel> {
        let mut deck = *self;
        for &card in cards {
            if deck.probability(card) <= 0.0 {
                return None;
            }
            deck = deck.draw(card);
        }
        Some(deck)
    }

    /// Checks whether `cards` can be dealt in order, and their joint
    /// probability. An unavailable card yields `(false, 0.0)`.
    pub fn validate(&self, cards: &[u8]) -> (bool, f64) {
        let mut deck = *self;
        let mut probability = 1.0;
        for &card in cards {
            let p = deck.probability(card);
            if p <= 0.0 {
                return (false, 0.0);
            }
            probability *= p;
            deck = deck.draw(card);
        }
        (true, probability)
    }

    /// Distribution of the dealer's hole card given that the dealer does not
    /// hold a natural.
    pub fn hole_card_distribution(&self, upcard: u8) -> [f64; 10] {
        let mut ret = self.distribution();
        for hole_card in 1..=10u8 {
            if is_natural(&[upcard, hole_card]) {
                ret[(hole_card - 1) as usize] = 0.0;
            }
        }

        let sum: f64 = ret.iter().sum();
        if sum > 0.0 {
            for p in ret.iter_mut() {
                *p /= sum;
            }
        }
        ret
    }

    /// Chance that the hole card completes a natural with `upcard`.
    pub fn dealer_natural_chance(&self, upcard: u8) -> f64 {
        match upcard {
            1 => self.probability(10),
            10 => self.probability(1),
            _ => 0.0,
        }
    }

    /// Chance of a two-card natural dealt from this deck.
    pub fn natural_chance(&self) -> f64 {
        2.0 * self.probability(1) * self.probability(10)
    }
}
