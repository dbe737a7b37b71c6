use crate::book::{BookTable, BuildPhase};
use crate::hand::{evaluate, is_natural};
use crate::{Action, BookError};
use blackjack_book_macros::allowed_phase;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How a strategy chart groups a starting hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandClass {
    Hard(u8),
    Soft(u8),
    Pair(u8),
}

impl HandClass {
    pub fn of(first: u8, second: u8) -> HandClass {
        if first == second {
            return HandClass::Pair(first);
        }
        let value = evaluate(&[first, second]);
        if value.is_soft() {
            HandClass::Soft(value.total)
        } else {
            HandClass::Hard(value.total)
        }
    }
}

impl fmt::Display for HandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandClass::Hard(total) => write!(f, "hard {}", total),
            HandClass::Soft(total) => write!(f, "soft {}", total),
            HandClass::Pair(1) => write!(f, "pair A"),
            HandClass::Pair(value) => write!(f, "pair {}", value),
        }
    }
}

/// Parses `hard 16`, `soft 18`, `pair 8` or `pair A`. Hard 4 and hard 20
/// are refused, two cards only make them as a pair.
impl FromStr for HandClass {
    type Err = BookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || BookError::InvalidHandClass(s.to_string());
        let mut words = s.split_whitespace();
        let kind = words.next().ok_or_else(err)?.to_ascii_lowercase();
        let number = words.next().ok_or_else(err)?;
        if words.next().is_some() {
            return Err(err());
        }

        let number: u8 = if number.eq_ignore_ascii_case("a") {
            1
        } else {
            number.parse().map_err(|_| err())?
        };

        match kind.as_str() {
            "hard" if (5..=19).contains(&number) => Ok(HandClass::Hard(number)),
            "soft" if (13..=20).contains(&number) => Ok(HandClass::Soft(number)),
            "pair" if (1..=10).contains(&number) => Ok(HandClass::Pair(number)),
            _ => Err(err()),
        }
    }
}

/// Plays chosen by hand instead of the book's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    actions: HashMap<(HandClass, u8), Action>,
}

impl Overrides {
    pub fn new() -> Overrides {
        Default::default()
    }

    pub fn insert(&mut self, class: HandClass, upcard: u8, action: Action) {
        self.actions.insert((class, upcard), action);
    }

    pub fn get(&self, class: HandClass, upcard: u8) -> Option<Action> {
        self.actions.get(&(class, upcard)).copied()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TotalEvSummary {
    /// Expectation of one round per unit bet.
    pub total_ev: f64,
    /// Expectation lost to the overrides.
    pub deviation_cost: f64,
    pub player_natural_chance: f64,
    pub dealer_natural_chance: f64,
    pub both_natural_chance: f64,
}

impl BookTable {
    /// Expectation of a starting hand played with `action`, before the dealer
    /// has checked for a natural. A natural ignores `action`.
    pub fn hand_ev(
        &self,
        first: u8,
        second: u8,
        upcard: u8,
        action: Action,
    ) -> Result<f64, BookError> {
        let Some(deck) = self.deck.draw_all(&[first, second, upcard]) else {
            return Err(BookError::UnresolvableHand {
                cards: vec![first, second],
                upcard,
            });
        };
        let dealer_natural = deck.dealer_natural_chance(upcard);
        let payout = self.rule.blackjack_payout.ratio();

        if is_natural(&[first, second]) {
            if upcard == 1 && self.rule.take_even_money {
                return Ok(1.0);
            }
            return Ok((1.0 - dealer_natural) * payout);
        }

        let expectation = self.entry(first, second, upcard)?.expectation;
        let interim = match action {
            Action::Split => expectation.split.ok_or(BookError::MissingSplitEv {
                pair_value: first,
                upcard,
            })?,
            Action::Invalid => {
                return Err(BookError::InvalidOverride {
                    class: HandClass::of(first, second).to_string(),
                    upcard,
                    action,
                })
            }
            _ => expectation.get(action).unwrap_or_default(),
        };

        let mut ev = 0.0;
        if upcard == 1 && self.rule.take_insurance {
            // Half a bet, paying 2 to 1.
            ev += dealer_natural - (1.0 - dealer_natural) * 0.5;
        }
        ev += -dealer_natural + (1.0 - dealer_natural) * interim;
        Ok(ev)
    }

    /// Expectation of a whole round when the chart plays are followed, with
    /// `overrides` replacing some of them.
    #[allowed_phase(Finished)]
    pub fn total_ev_summary(&self, overrides: &Overrides) -> Result<TotalEvSummary, BookError> {
        let mut summary = TotalEvSummary::default();

        for first in 1..=10u8 {
            for second in 1..=10u8 {
                for upcard in 1..=10u8 {
                    let (valid, p) = self.deck.validate(&[first, second, upcard]);
                    if !valid {
                        continue;
                    }
                    let dealer_natural = self
                        .deck
                        .draw_all(&[first, second, upcard])
                        .map(|deck| deck.dealer_natural_chance(upcard))
                        .unwrap_or_default();

                    if is_natural(&[first, second]) {
                        summary.player_natural_chance += p;
                        summary.both_natural_chance += p * dealer_natural;
                        summary.dealer_natural_chance += p * dealer_natural;
                        summary.total_ev +=
                            p * self.hand_ev(first, second, upcard, Action::Stand)?;
                        continue;
                    }

                    let class = HandClass::of(first, second);
                    let book_action = self.chart_action(first, second, upcard)?;
                    let action = overrides.get(class, upcard).unwrap_or(book_action);
                    if action == Action::Invalid
                        || (action == Action::Split && !matches!(class, HandClass::Pair(_)))
                    {
                        return Err(BookError::InvalidOverride {
                            class: class.to_string(),
                            upcard,
                            action,
                        });
                    }

                    let ev = self.hand_ev(first, second, upcard, action)?;
                    if action != book_action {
                        let book_ev = self.hand_ev(first, second, upcard, book_action)?;
                        summary.deviation_cost += p * (book_ev - ev);
                    }
                    summary.dealer_natural_chance += p * dealer_natural;
                    summary.total_ev += p * ev;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BookEntry, BookKey, Expectation};
    use crate::{DeckModel, RuleSet};

    fn table_with(rule: RuleSet, entries: &[BookEntry]) -> BookTable {
        let mut table = BookTable::new(rule, DeckModel::infinite());
        for entry in entries {
            table.insert(*entry).unwrap();
        }
        table.finish().unwrap();
        table
    }

    fn natural_vs_ace() -> BookEntry {
        BookEntry {
            key: BookKey::new(1, 10, 1),
            action: Action::Stand,
            expectation: Expectation {
                stand: 0.9,
                hit: -1.0,
                double: -2.0,
                split: None,
            },
        }
    }

    #[test]
    fn hand_classes() {
        assert_eq!(HandClass::of(9, 7), HandClass::Hard(16));
        assert_eq!(HandClass::of(1, 7), HandClass::Soft(18));
        assert_eq!(HandClass::of(8, 8), HandClass::Pair(8));
        assert_eq!("hard 16".parse::<HandClass>().unwrap(), HandClass::Hard(16));
        assert_eq!("Pair A".parse::<HandClass>().unwrap(), HandClass::Pair(1));
        assert_eq!(HandClass::Pair(1).to_string(), "pair A");
        assert!("soft 25".parse::<HandClass>().is_err());
        assert!("triple 5".parse::<HandClass>().is_err());
        assert!("hard".parse::<HandClass>().is_err());
        assert!("hard 20".parse::<HandClass>().is_err());
        assert!("hard 4".parse::<HandClass>().is_err());
        assert_eq!("hard 19".parse::<HandClass>().unwrap(), HandClass::Hard(19));
        assert_eq!("hard 5".parse::<HandClass>().unwrap(), HandClass::Hard(5));
    }

    #[test]
    fn even_money_is_exactly_one() {
        let rule = RuleSet {
            take_even_money: true,
            ..Default::default()
        };
        let table = table_with(rule, &[natural_vs_ace()]);
        assert_eq!(table.hand_ev(1, 10, 1, Action::Stand).unwrap(), 1.0);
        assert_eq!(table.hand_ev(10, 1, 1, Action::Hit).unwrap(), 1.0);
    }

    #[test]
    fn natural_pays_unless_dealer_has_one() {
        let table = table_with(RuleSet::default(), &[natural_vs_ace()]);
        let ev = table.hand_ev(1, 10, 1, Action::Stand).unwrap();
        assert!((ev - (1.0 - 4.0 / 13.0) * 1.5).abs() < 1e-12);
        let ev = table.hand_ev(1, 10, 7, Action::Stand).unwrap();
        assert_eq!(ev, 1.5);
    }

    #[test]
    fn dealer_naturals_and_insurance() {
        let entry = BookEntry {
            key: BookKey::new(10, 10, 1),
            action: Action::Stand,
            expectation: Expectation {
                stand: 0.2,
                hit: -0.8,
                double: -1.7,
                split: Some(0.1),
            },
        };
        let table = table_with(RuleSet::default(), &[entry]);
        let p10 = 4.0 / 13.0;
        let ev = table.hand_ev(10, 10, 1, Action::Stand).unwrap();
        assert!((ev - (-p10 + (1.0 - p10) * 0.2)).abs() < 1e-12);
        let ev = table.hand_ev(10, 10, 1, Action::Split).unwrap();
        assert!((ev - (-p10 + (1.0 - p10) * 0.1)).abs() < 1e-12);

        let insured = table_with(
            RuleSet {
                take_insurance: true,
                ..Default::default()
            },
            &[entry],
        );
        let ev = insured.hand_ev(10, 10, 1, Action::Stand).unwrap();
        let expected = p10 - (1.0 - p10) * 0.5 - p10 + (1.0 - p10) * 0.2;
        assert!((ev - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_split_and_invalid_actions() {
        let entry = BookEntry {
            key: BookKey::new(9, 9, 6),
            action: Action::Stand,
            expectation: Expectation {
                stand: 0.3,
                hit: -0.5,
                double: -1.0,
                split: None,
            },
        };
        let table = table_with(RuleSet::default(), &[entry]);
        assert!(matches!(
            table.hand_ev(9, 9, 6, Action::Split),
            Err(BookError::MissingSplitEv { pair_value: 9, upcard: 6 })
        ));
        assert!(matches!(
            table.hand_ev(9, 9, 6, Action::Invalid),
            Err(BookError::InvalidOverride { .. })
        ));
    }

    #[test]
    fn summary_needs_a_finished_book() {
        let table = BookTable::new(RuleSet::default(), DeckModel::infinite());
        assert!(matches!(
            table.total_ev_summary(&Overrides::new()),
            Err(BookError::WrongPhase { .. })
        ));
    }
}
