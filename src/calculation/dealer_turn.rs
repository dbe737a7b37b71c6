use crate::{CardCount, DeckModel, PairStateArray, CARD_VALUES};

/// Distribution of the dealer's final total.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DealerOutcome {
    // 0 for Bust.
    // [1, 5] for [17, 21].
    probabilities_prefix_sum: [f64; 6],
}

impl DealerOutcome {
    pub fn p_worse_than_player(&self, player_total: u8) -> f64 {
        let x = player_total as usize;
        match x {
            0..=17 => self.probabilities_prefix_sum[0],
            18..=21 => self.probabilities_prefix_sum[x - 17],
            _ => panic!("Player total {} cannot reach the dealer", x),
        }
    }

    pub fn p_better_than_player(&self, player_total: u8) -> f64 {
        let x = player_total as usize;
        match x {
            0..=16 => 1.0 - self.probabilities_prefix_sum[0],
            17..=21 => 1.0 - self.probabilities_prefix_sum[x - 16],
            _ => panic!("Player total {} cannot reach the dealer", x),
        }
    }

    pub fn p_bust(&self) -> f64 {
        self.probabilities_prefix_sum[0]
    }

    /// Win minus loss probability of a standing player hand.
    pub fn expectation_against(&self, player_total: u8) -> f64 {
        self.p_worse_than_player(player_total) - self.p_better_than_player(player_total)
    }

    fn end_with_bust(&mut self) {
        for p in self.probabilities_prefix_sum.iter_mut() {
            *p = 1.0;
        }
    }

    fn end_with_normal(&mut self, dealer_total: u8) {
        for i in (dealer_total - 16) as usize..self.probabilities_prefix_sum.len() {
            self.probabilities_prefix_sum[i] = 1.0;
        }
    }

    fn add_assign_with_p(&mut self, rhs: &Self, p: f64) {
        for i in 0..self.probabilities_prefix_sum.len() {
            self.probabilities_prefix_sum[i] += rhs.probabilities_prefix_sum[i] * p;
        }
    }
}

/// Memoized dealer play for one build session.
#[derive(Debug, Default)]
pub struct DealerPlay {
    dealer_hits_soft17: bool,
    memo: PairStateArray<DealerOutcome>,
}

impl DealerPlay {
    pub fn new(dealer_hits_soft17: bool) -> DealerPlay {
        DealerPlay {
            dealer_hits_soft17,
            memo: PairStateArray::new(),
        }
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Final total distribution of a dealer holding `dealer_hand` and drawing
    /// from `deck`.
    ///
    /// Panics if the dealer holds a natural: hands are only resolved once the
    /// dealer is known not to have one.
    pub fn outcome(&mut self, dealer_hand: &CardCount, deck: &DeckModel) -> DealerOutcome {
        if dealer_hand.is_natural() {
            panic!(
                "Dealer natural {:?} reached the dealer turn",
                dealer_hand.get_counts()
            );
        }

        let deck_key = match deck {
            DeckModel::Infinite => CardCount::new(&[0; 10]),
            DeckModel::Finite(card_count) => *card_count,
        };
        if let Some(outcome) = self.memo.get(dealer_hand, &deck_key) {
            return *outcome;
        }

        let mut outcome = DealerOutcome::default();
        let value = dealer_hand.get_value();
        if value.is_bust() {
            outcome.end_with_bust();
        } else if self.dealer_stands(value.total, value.is_soft()) {
            outcome.end_with_normal(value.total);
        } else {
            let mut next_hand = *dealer_hand;
            for card in CARD_VALUES {
                let p = deck.probability(card);
                if p <= 0.0 {
                    continue;
                }
                next_hand.add_card(card);
                let next_outcome = self.outcome(&next_hand, &deck.draw(card));
                outcome.add_assign_with_p(&next_outcome, p);
                next_hand.remove_card(card);
            }
        }

        self.memo.insert(dealer_hand, &deck_key, outcome);
        outcome
    }

    fn dealer_stands(&self, total: u8, soft: bool) -> bool {
        total >= 18 || (total == 17 && (!soft || !self.dealer_hits_soft17))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome_of(cards: &[u8], deck: &DeckModel, dealer_hits_soft17: bool) -> DealerOutcome {
        let mut dealer_play = DealerPlay::new(dealer_hits_soft17);
        dealer_play.outcome(&CardCount::from_cards(cards), deck)
    }

    #[test]
    fn standing_hands_are_final() {
        let deck = DeckModel::infinite();
        let outcome = outcome_of(&[10, 8], &deck, true);
        assert_eq!(outcome.expectation_against(19), 1.0);
        assert_eq!(outcome.expectation_against(18), 0.0);
        assert_eq!(outcome.expectation_against(12), -1.0);

        let hard17 = outcome_of(&[10, 7], &deck, true);
        assert_eq!(hard17.expectation_against(17), 0.0);
    }

    #[test]
    fn soft17_rule() {
        let deck = DeckModel::infinite();
        let stands = outcome_of(&[1, 6], &deck, false);
        assert_eq!(stands.expectation_against(17), 0.0);
        let hits = outcome_of(&[1, 6], &deck, true);
        assert!(hits.expectation_against(17) != 0.0);
        assert!(hits.p_bust() > 0.0);
    }

    #[test]
    fn dealer_sixteen_draws_once() {
        // A hard 16 drawing from an infinite deck: 17 to 21 each 1/13, bust
        // otherwise.
        let deck = DeckModel::infinite();
        let outcome = outcome_of(&[10, 6], &deck, true);
        assert!((outcome.p_bust() - 8.0 / 13.0).abs() < 1e-12);
        let ev_20 = outcome.expectation_against(20);
        let expected = 8.0 / 13.0 + 3.0 / 13.0 - 1.0 / 13.0;
        assert!((ev_20 - expected).abs() < 1e-12);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let deck = DeckModel::with_number_of_decks(1).draw(10).draw(7);
        let outcome = outcome_of(&[5, 2], &deck, true);
        assert!((outcome.probabilities_prefix_sum[5] - 1.0).abs() < 1e-9);
        // Against 16 the player only wins when the dealer busts.
        assert_eq!(outcome.p_worse_than_player(16), outcome.p_bust());
    }

    #[test]
    #[should_panic]
    fn dealer_natural_panics() {
        outcome_of(&[1, 10], &DeckModel::infinite(), true);
    }
}
