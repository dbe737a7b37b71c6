mod dealer_turn;

pub use dealer_turn::{DealerOutcome, DealerPlay};

use crate::book::{BookEntry, BookKey, BookTable, Expectation};
use crate::hand::{evaluate, is_bust, is_natural};
use crate::{Action, BookError, CardCount, DeckModel, RuleSet, CARD_VALUES};
use log::{debug, warn};

/// Resolves stand, hit and double expectations exactly, reading the plays of
/// hands already in the book.
///
/// The engine owns the dealer memo of one build session. Every method reads
/// the table it is given and never writes to it.
#[derive(Debug)]
pub struct ExactEvEngine {
    dealer_play: DealerPlay,
}

impl ExactEvEngine {
    pub fn new(rule: &RuleSet) -> ExactEvEngine {
        ExactEvEngine {
            dealer_play: DealerPlay::new(rule.dealer_hits_soft17),
        }
    }

    pub fn memo_len(&self) -> usize {
        self.dealer_play.memo_len()
    }

    /// Expectation of standing on `player_cards` while the dealer, holding
    /// `dealer_cards`, draws from `deck`.
    pub fn dealer_turn(
        &mut self,
        player_cards: &[u8],
        dealer_cards: &[u8],
        deck: &DeckModel,
    ) -> f64 {
        let player_total = evaluate(player_cards).total;
        let outcome = self
            .dealer_play
            .outcome(&CardCount::from_cards(dealer_cards), deck);
        outcome.expectation_against(player_total)
    }

    /// Expectation of taking one more card and then playing on by the book.
    pub fn player_hit(
        &mut self,
        table: &BookTable,
        player_cards: &[u8],
        dealer_cards: &[u8],
        deck: &DeckModel,
    ) -> Result<f64, BookError> {
        let upcard = dealer_cards[0];
        let mut total_ev = 0.0;

        for card in CARD_VALUES {
            let p = deck.probability(card);
            if p <= 0.0 {
                continue;
            }

            let mut next_cards = player_cards.to_vec();
            next_cards.push(card);
            if is_bust(&next_cards) {
                total_ev -= p;
                continue;
            }

            let (action, expectation) = table.lookup_no_split(&next_cards, upcard)?;
            let action = table.realize_double(action, &next_cards, &expectation, false);

            let continue_ev = match deck {
                // The deck never changes, so the finished entry already holds
                // the value of playing on.
                DeckModel::Infinite => {
                    let finished_ev = match action {
                        Action::Stand | Action::Hit | Action::Double => expectation.get(action),
                        _ => None,
                    };
                    finished_ev.ok_or_else(|| BookError::UnresolvableHand {
                        cards: next_cards.clone(),
                        upcard,
                    })?
                }
                DeckModel::Finite(_) => {
                    let next_deck = deck.draw(card);
                    match action {
                        Action::Stand => self.dealer_turn(&next_cards, dealer_cards, &next_deck),
                        Action::Hit => {
                            self.player_hit(table, &next_cards, dealer_cards, &next_deck)?
                        }
                        Action::Double => {
                            self.player_double(table, &next_cards, dealer_cards, &next_deck)?
                        }
                        _ => {
                            return Err(BookError::UnresolvableHand {
                                cards: next_cards,
                                upcard,
                            })
                        }
                    }
                }
            };
            total_ev += p * continue_ev;
        }

        Ok(total_ev)
    }

    /// Expectation of doubling: one more card, then stand, on twice the bet.
    pub fn player_double(
        &mut self,
        table: &BookTable,
        player_cards: &[u8],
        dealer_cards: &[u8],
        deck: &DeckModel,
    ) -> Result<f64, BookError> {
        let upcard = dealer_cards[0];
        let mut total_ev = 0.0;

        for card in CARD_VALUES {
            let p = deck.probability(card);
            if p <= 0.0 {
                continue;
            }

            let mut next_cards = player_cards.to_vec();
            next_cards.push(card);
            if is_bust(&next_cards) {
                total_ev -= p;
                continue;
            }

            let continue_ev = match deck {
                DeckModel::Infinite => table.lookup(&next_cards, upcard)?.1.stand,
                DeckModel::Finite(_) => {
                    self.dealer_turn(&next_cards, dealer_cards, &deck.draw(card))
                }
            };
            total_ev += p * continue_ev;
        }

        Ok(2.0 * total_ev)
    }

    /// Resolves the entry of a starting hand. Every hand it may draw into
    /// must already be in `table`.
    pub fn build_entry(
        &mut self,
        table: &BookTable,
        first: u8,
        second: u8,
        upcard: u8,
    ) -> Result<BookEntry, BookError> {
        let key = BookKey::new(first, second, upcard);
        let play_deck = match table.deck().draw_all(&[first, second, upcard]) {
            Some(deck) => deck,
            None => {
                warn!(
                    "Deck cannot deal ({}, {}) against upcard {}",
                    key.first, key.second, upcard
                );
                return Ok(BookEntry::invalid(key));
            }
        };

        let player_cards = key.cards();
        let natural = is_natural(&player_cards);
        let hole_card_distribution = play_deck.hole_card_distribution(upcard);

        let mut expectation = Expectation::default();
        for (hole_card, &p) in CARD_VALUES.iter().zip(hole_card_distribution.iter()) {
            if p <= 0.0 {
                continue;
            }
            let dealer_cards = [upcard, *hole_card];
            if is_natural(&dealer_cards) {
                panic!("Hole card {} completes a dealer natural", hole_card);
            }
            let continue_deck = play_deck.draw(*hole_card);

            expectation.stand += p * self.dealer_turn(&player_cards, &dealer_cards, &continue_deck);
            if !natural {
                expectation.hit +=
                    p * self.player_hit(table, &player_cards, &dealer_cards, &continue_deck)?;
                expectation.double +=
                    p * self.player_double(table, &player_cards, &dealer_cards, &continue_deck)?;
            }
        }

        if natural {
            expectation.hit = -1.0;
            expectation.double = -2.0;
        }

        let action = table.realize_double(
            expectation.best_non_split(),
            &player_cards,
            &expectation,
            false,
        );
        debug!(
            "({}, {}) vs {}: {} stand {:.6} hit {:.6} double {:.6}",
            key.first,
            key.second,
            upcard,
            action,
            expectation.stand,
            expectation.hit,
            expectation.double
        );

        Ok(BookEntry {
            key,
            action,
            expectation,
        })
    }
}
