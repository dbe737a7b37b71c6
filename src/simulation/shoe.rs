use crate::{CardCount, DeckModel};
use rand::Rng;

/// Represents the cards left for one simulated hand.
///
/// An infinite shoe deals every card with one-deck proportions and never runs
/// out. A finite shoe deals without replacement.
#[derive(Debug, Clone)]
pub struct Shoe {
    deck: DeckModel,
}

impl Shoe {
    pub fn new(deck: DeckModel) -> Shoe {
        Shoe { deck }
    }

    /// Takes the given cards out of the shoe. Returns false, leaving the shoe
    /// untouched, if one of them is not available.
    pub fn remove_cards(&mut self, cards: &[u8]) -> bool {
        match self.deck.draw_all(cards) {
            Some(deck) => {
                self.deck = deck;
                true
            }
            None => false,
        }
    }

    /// Deals a card if the shoe is not empty. Returns None if empty.
    pub fn deal_card<R: Rng>(&mut self, rng: &mut R) -> Option<u8> {
        self.deal_card_excluding(rng, None)
    }

    /// Deals a card that is not `excluded`, the way a dealer who already
    /// peeked receives a hole card.
    pub fn deal_card_excluding<R: Rng>(&mut self, rng: &mut R, excluded: Option<u8>) -> Option<u8> {
        let card = match &self.deck {
            DeckModel::Infinite => loop {
                let index: u8 = rng.gen_range(0..13);
                let card = (index + 1).min(10);
                if Some(card) != excluded {
                    break card;
                }
            },
            DeckModel::Finite(card_count) => {
                pick_from_counts(rng, card_count, excluded)?
            }
        };
        self.deck = self.deck.draw(card);
        Some(card)
    }

    pub fn get_card_count(&self) -> Option<CardCount> {
        match self.deck {
            DeckModel::Infinite => None,
            DeckModel::Finite(card_count) => Some(card_count),
        }
    }
}

fn pick_from_counts<R: Rng>(
    rng: &mut R,
    card_count: &CardCount,
    excluded: Option<u8>,
) -> Option<u8> {
    let available = |card: u8| {
        if Some(card) == excluded {
            0
        } else {
            card_count[card]
        }
    };

    let total: u16 = (1..=10).map(available).sum();
    if total == 0 {
        return None;
    }

    let mut index = rng.gen_range(0..total);
    for card in 1..=10 {
        let count = available(card);
        if index < count {
            return Some(card);
        }
        index -= count;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn finite_shoe_runs_dry() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0; 10];
        counts[4] = 2;
        counts[9] = 1;
        let mut shoe = Shoe::new(DeckModel::custom(counts));
        let mut dealt = Vec::new();
        while let Some(card) = shoe.deal_card(&mut rng) {
            dealt.push(card);
        }
        dealt.sort();
        assert_eq!(dealt, vec![5, 5, 10]);
        assert_eq!(shoe.get_card_count().unwrap().get_total(), 0);
    }

    #[test]
    fn card_count_is_correctly_synced() {
        let mut shoe = Shoe::new(DeckModel::with_number_of_decks(2));
        assert!(shoe.remove_cards(&[1, 4, 4, 10]));
        let card_count = shoe.get_card_count().unwrap();
        assert_eq!(card_count[1], 7);
        assert_eq!(card_count[4], 6);
        assert_eq!(card_count[10], 31);

        let mut tiny = Shoe::new(DeckModel::custom([1; 10]));
        assert!(!tiny.remove_cards(&[3, 3]));
        assert_eq!(tiny.get_card_count().unwrap().get_total(), 10);
    }

    #[test]
    fn excluded_card_is_never_dealt() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut infinite = Shoe::new(DeckModel::infinite());
        let mut finite = Shoe::new(DeckModel::with_number_of_decks(1));
        for _ in 0..500 {
            assert_ne!(infinite.deal_card_excluding(&mut rng, Some(10)), Some(10));
        }
        for _ in 0..30 {
            assert_ne!(finite.deal_card_excluding(&mut rng, Some(1)), Some(1));
        }
        let mut only_aces = Shoe::new(DeckModel::custom([4, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(only_aces.deal_card_excluding(&mut rng, Some(1)), None);
    }

    #[test]
    fn infinite_proportions() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut shoe = Shoe::new(DeckModel::infinite());
        let tens = (0..13000)
            .filter(|_| shoe.deal_card(&mut rng) == Some(10))
            .count();
        // 4000 expected.
        assert!(tens > 3700 && tens < 4300);
    }
}
