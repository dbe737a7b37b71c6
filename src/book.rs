pub mod builder;
pub mod persist;

use crate::hand::evaluate;
use crate::{Action, BookError, DeckModel, DoubleEligibility, RuleSet};
use blackjack_book_macros::allowed_phase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical key of a starting hand: `first <= second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookKey {
    pub first: u8,
    pub second: u8,
    pub upcard: u8,
}

impl BookKey {
    pub fn new(first: u8, second: u8, upcard: u8) -> BookKey {
        BookKey {
            first: first.min(second),
            second: first.max(second),
            upcard,
        }
    }

    pub fn is_pair(&self) -> bool {
        self.first == self.second
    }

    pub fn cards(&self) -> [u8; 2] {
        [self.first, self.second]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Expectation {
    pub stand: f64,
    pub hit: f64,
    pub double: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<f64>,
}

impl Expectation {
    /// Expectation of a busted hand.
    pub fn bust() -> Expectation {
        Expectation {
            stand: -1.0,
            hit: -1.0,
            double: -1.0,
            split: None,
        }
    }

    pub fn get(&self, action: Action) -> Option<f64> {
        match action {
            Action::Stand => Some(self.stand),
            Action::Hit => Some(self.hit),
            Action::Double => Some(self.double),
            Action::Split => self.split,
            Action::Invalid => None,
        }
    }

    /// Best of stand, hit and double. Ties go to the earlier one.
    pub fn best_non_split(&self) -> Action {
        let mut best = Action::Stand;
        let mut best_ev = self.stand;
        if self.hit > best_ev {
            best = Action::Hit;
            best_ev = self.hit;
        }
        if self.double > best_ev {
            best = Action::Double;
        }
        best
    }

    pub fn get_max_expectation(&self) -> f64 {
        self.stand.max(self.hit).max(self.double)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub key: BookKey,
    pub action: Action,
    pub expectation: Expectation,
}

impl BookEntry {
    /// Entry for a hand the deck cannot deal.
    pub fn invalid(key: BookKey) -> BookEntry {
        BookEntry {
            key,
            action: Action::Invalid,
            expectation: Expectation::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Building,
    Finished,
}

/// A two-card hard hand whose own best play differs from the play of its
/// total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deviation {
    pub total: u8,
    pub upcard: u8,
    pub cards: [u8; 2],
    pub book_action: Action,
    pub deviation_action: Action,
}

/// All two-card hard hands of `total`, in canonical order. A hard 21 is
/// represented by the natural.
pub(crate) fn hard_compositions(total: u8) -> Vec<[u8; 2]> {
    if total == 21 {
        return vec![[1, 10]];
    }
    let mut ret = Vec::new();
    for first in 2..=10u8 {
        for second in first..=10u8 {
            if first + second == total {
                ret.push([first, second]);
            }
        }
    }
    ret
}

/// The strategy and expectation table for one rule set and deck.
#[derive(Debug, Clone)]
pub struct BookTable {
    pub(crate) rule: RuleSet,
    pub(crate) deck: DeckModel,
    pub(crate) entries: HashMap<BookKey, BookEntry>,
    pub(crate) phase: BuildPhase,
    pub(crate) infeasible: Vec<BookKey>,
}

impl BookTable {
    pub fn new(rule: RuleSet, deck: DeckModel) -> BookTable {
        BookTable {
            rule,
            deck,
            entries: HashMap::new(),
            phase: BuildPhase::Building,
            infeasible: Vec::new(),
        }
    }

    pub fn rule(&self) -> &RuleSet {
        &self.rule
    }

    pub fn deck(&self) -> &DeckModel {
        &self.deck
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, first: u8, second: u8, upcard: u8) -> Option<&BookEntry> {
        self.entries.get(&BookKey::new(first, second, upcard))
    }

    /// Entries sorted by key.
    pub fn entries(&self) -> Vec<&BookEntry> {
        let mut ret: Vec<&BookEntry> = self.entries.values().collect();
        ret.sort_by_key(|entry| entry.key);
        ret
    }

    /// Hands the deck could not deal while the book was built.
    pub fn infeasible_hands(&self) -> &[BookKey] {
        &self.infeasible
    }

    #[allowed_phase(Building)]
    pub fn insert(&mut self, entry: BookEntry) -> Result<(), BookError> {
        if entry.action == Action::Invalid && !self.infeasible.contains(&entry.key) {
            self.infeasible.push(entry.key);
        }
        self.entries.insert(entry.key, entry);
        Ok(())
    }

    /// Stores the split expectation of a pair and decides between splitting
    /// and the best other play.
    #[allowed_phase(Building)]
    pub fn set_split(
        &mut self,
        pair_value: u8,
        upcard: u8,
        split_ev: f64,
    ) -> Result<(), BookError> {
        let key = BookKey::new(pair_value, pair_value, upcard);
        let rule = self.rule;
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or(BookError::SequencingDefect {
                cards: vec![pair_value, pair_value],
                upcard,
            })?;
        entry.expectation.split = Some(split_ev);
        entry.action = if split_ev > entry.expectation.get_max_expectation() {
            Action::Split
        } else {
            realize_double_with(
                &rule,
                entry.expectation.best_non_split(),
                &key.cards(),
                &entry.expectation,
                false,
            )
        };
        Ok(())
    }

    /// Moves the entries of a column built separately into this table.
    #[allowed_phase(Building)]
    pub fn merge(&mut self, other: BookTable) -> Result<(), BookError> {
        if other.rule != self.rule || other.deck != self.deck {
            return Err(BookError::ConfigurationMismatch);
        }
        for key in other.infeasible {
            if !self.infeasible.contains(&key) {
                self.infeasible.push(key);
            }
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    #[allowed_phase(Building)]
    pub fn finish(&mut self) -> Result<(), BookError> {
        self.infeasible.sort();
        self.phase = BuildPhase::Finished;
        Ok(())
    }

    /// Opens a finished table again so that its pair rows can be rebuilt
    /// under `rule`.
    #[allowed_phase(Finished)]
    pub(crate) fn reopen_for_pairs(&mut self, rule: RuleSet) -> Result<(), BookError> {
        self.rule = rule;
        self.phase = BuildPhase::Building;
        Ok(())
    }

    pub(crate) fn entry(&self, first: u8, second: u8, upcard: u8) -> Result<&BookEntry, BookError> {
        self.get(first, second, upcard)
            .ok_or_else(|| BookError::SequencingDefect {
                cards: vec![first, second],
                upcard,
            })
    }

    /// Play and expectations for any hand.
    ///
    /// Two cards read their own entry. A longer soft hand reads the soft
    /// two-card hand of the same total. A longer hard hand averages every
    /// two-card hard hand of the same total, weighted by how likely each is
    /// to be dealt against `upcard`.
    pub fn lookup(&self, cards: &[u8], upcard: u8) -> Result<(Action, Expectation), BookError> {
        if cards.len() == 2 {
            let entry = self.entry(cards[0], cards[1], upcard)?;
            return Ok((entry.action, entry.expectation));
        }

        let value = evaluate(cards);
        if value.is_bust() {
            return Ok((Action::Stand, Expectation::bust()));
        }
        if value.is_soft() {
            let entry = self.entry(1, value.total - 11, upcard)?;
            return Ok((entry.action, entry.expectation));
        }
        self.hard_total_lookup(value.total, upcard)
    }

    /// As `lookup`, with a split replaced by the best other play.
    pub fn lookup_no_split(
        &self,
        cards: &[u8],
        upcard: u8,
    ) -> Result<(Action, Expectation), BookError> {
        let (action, expectation) = self.lookup(cards, upcard)?;
        if action == Action::Split {
            Ok((expectation.best_non_split(), expectation))
        } else {
            Ok((action, expectation))
        }
    }

    pub(crate) fn hard_total_lookup(
        &self,
        total: u8,
        upcard: u8,
    ) -> Result<(Action, Expectation), BookError> {
        let mut sum = Expectation::default();
        let mut total_probability = 0.0;

        for [first, second] in hard_compositions(total) {
            let (valid, mut probability) = self.deck.validate(&[first, second, upcard]);
            if !valid {
                continue;
            }
            if first != second {
                probability *= 2.0;
            }
            let entry = self.entry(first, second, upcard)?;
            total_probability += probability;
            sum.stand += probability * entry.expectation.stand;
            sum.hit += probability * entry.expectation.hit;
            sum.double += probability * entry.expectation.double;
        }

        if total_probability == 0.0 {
            return Ok((Action::Invalid, Expectation::default()));
        }

        let average = Expectation {
            stand: sum.stand / total_probability,
            hit: sum.hit / total_probability,
            double: sum.double / total_probability,
            split: None,
        };
        Ok((average.best_non_split(), average))
    }

    /// Keeps a double only where the rules allow it, otherwise falls back to
    /// the better of stand and hit.
    pub fn realize_double(
        &self,
        action: Action,
        cards: &[u8],
        expectation: &Expectation,
        from_split: bool,
    ) -> Action {
        realize_double_with(&self.rule, action, cards, expectation, from_split)
    }

    /// The play a strategy chart shows for a starting hand.
    pub fn chart_action(&self, first: u8, second: u8, upcard: u8) -> Result<Action, BookError> {
        let value = evaluate(&[first, second]);
        if first == second || value.is_soft() {
            return Ok(self.entry(first, second, upcard)?.action);
        }
        let (action, expectation) = self.hard_total_lookup(value.total, upcard)?;
        let cards = [first, second];
        Ok(self.realize_double(action, &cards, &expectation, false))
    }

    /// Two-card hard hands that should be played differently from their
    /// total.
    #[allowed_phase(Finished)]
    pub fn hard_hand_deviations(&self) -> Result<Vec<Deviation>, BookError> {
        let mut ret = Vec::new();
        for total in (6..=20u8).rev() {
            let compositions = hard_compositions(total);
            if compositions.len() < 2 {
                continue;
            }
            for upcard in (1..=10u8).rev() {
                let (average_action, average) = self.hard_total_lookup(total, upcard)?;
                if average_action == Action::Invalid {
                    continue;
                }
                for cards in &compositions {
                    let book_action = self.realize_double(average_action, cards, &average, false);
                    let (deviation_action, expectation) = self.lookup_no_split(cards, upcard)?;
                    if deviation_action == Action::Invalid {
                        continue;
                    }
                    let deviation_action =
                        self.realize_double(deviation_action, cards, &expectation, false);
                    if deviation_action != book_action {
                        ret.push(Deviation {
                            total,
                            upcard,
                            cards: *cards,
                            book_action,
                            deviation_action,
                        });
                    }
                }
            }
        }
        Ok(ret)
    }
}

pub(crate) fn realize_double_with(
    rule: &RuleSet,
    action: Action,
    cards: &[u8],
    expectation: &Expectation,
    from_split: bool,
) -> Action {
    if action != Action::Double {
        return action;
    }

    let value = evaluate(cards);
    let hard = !value.is_soft();
    let eligible = match rule.double_eligibility {
        DoubleEligibility::AnyHand => cards.len() >= 2,
        DoubleEligibility::FirstTwoCards => cards.len() == 2,
        DoubleEligibility::HardNineToEleven => {
            cards.len() == 2 && hard && (9..=11).contains(&value.total)
        }
        DoubleEligibility::HardTenToEleven => {
            cards.len() == 2 && hard && (10..=11).contains(&value.total)
        }
    };

    if eligible && (!from_split || rule.allow_das) {
        Action::Double
    } else if expectation.stand > expectation.hit {
        Action::Stand
    } else {
        Action::Hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expectation(stand: f64, hit: f64, double: f64) -> Expectation {
        Expectation {
            stand,
            hit,
            double,
            split: None,
        }
    }

    fn entry(first: u8, second: u8, upcard: u8, ev: Expectation) -> BookEntry {
        BookEntry {
            key: BookKey::new(first, second, upcard),
            action: ev.best_non_split(),
            expectation: ev,
        }
    }

    #[test]
    fn keys_are_canonical() {
        assert_eq!(BookKey::new(9, 2, 5), BookKey::new(2, 9, 5));
        assert!(BookKey::new(8, 8, 1).is_pair());
        assert_eq!(hard_compositions(21), vec![[1, 10]]);
        assert_eq!(hard_compositions(20), vec![[10, 10]]);
        assert_eq!(hard_compositions(16), vec![[6, 10], [7, 9], [8, 8]]);
        assert_eq!(hard_compositions(4), vec![[2, 2]]);
    }

    #[test]
    fn ties_prefer_stand_then_hit() {
        assert_eq!(expectation(0.1, 0.1, 0.1).best_non_split(), Action::Stand);
        assert_eq!(expectation(0.0, 0.2, 0.2).best_non_split(), Action::Hit);
        assert_eq!(expectation(0.0, 0.2, 0.3).best_non_split(), Action::Double);
    }

    #[test]
    fn missing_entry_is_a_sequencing_defect() {
        let table = BookTable::new(RuleSet::default(), DeckModel::infinite());
        let result = table.lookup(&[10, 2], 6);
        assert!(matches!(
            result,
            Err(BookError::SequencingDefect { upcard: 6, .. })
        ));
        assert!(table.lookup(&[5, 4, 3], 6).is_err());
    }

    #[test]
    fn bust_and_soft_lookup() {
        let mut table = BookTable::new(RuleSet::default(), DeckModel::infinite());
        table
            .insert(entry(1, 6, 9, expectation(-0.1, 0.05, -0.3)))
            .unwrap();

        let (action, ev) = table.lookup(&[10, 6, 9], 9).unwrap();
        assert_eq!(action, Action::Stand);
        assert_eq!(ev, Expectation::bust());

        let (action, ev) = table.lookup(&[1, 2, 4], 9).unwrap();
        assert_eq!(action, Action::Hit);
        assert_eq!(ev.hit, 0.05);
    }

    #[test]
    fn hard_average_is_probability_weighted() {
        let mut table = BookTable::new(RuleSet::default(), DeckModel::infinite());
        table
            .insert(entry(6, 10, 10, expectation(-0.6, -0.5, -1.0)))
            .unwrap();
        table
            .insert(entry(7, 9, 10, expectation(-0.5, -0.6, -1.0)))
            .unwrap();
        table
            .insert(entry(8, 8, 10, expectation(-0.55, -0.55, -1.0)))
            .unwrap();

        // (6, 10) weighs 4/13, (7, 9) 1/13 doubled and (8, 8) 1/13 once.
        let (action, ev) = table.lookup(&[2, 4, 10], 10).unwrap();
        let w = [8.0, 2.0, 1.0];
        let stand = (w[0] * -0.6 + w[1] * -0.5 + w[2] * -0.55) / 11.0;
        let hit = (w[0] * -0.5 + w[1] * -0.6 + w[2] * -0.55) / 11.0;
        assert!((ev.stand - stand).abs() < 1e-12);
        assert!((ev.hit - hit).abs() < 1e-12);
        assert_eq!(action, Action::Hit);
    }

    #[test]
    fn unavailable_compositions_are_skipped() {
        let mut counts = [4; 10];
        counts[5] = 0;
        let mut table = BookTable::new(RuleSet::default(), DeckModel::custom(counts));
        table
            .insert(entry(7, 9, 10, expectation(-0.5, -0.6, -1.0)))
            .unwrap();
        table
            .insert(entry(8, 8, 10, expectation(-0.55, -0.45, -1.0)))
            .unwrap();
        // No sixes in the deck, so (6, 10) is never read.
        let (_, ev) = table.lookup(&[2, 4, 10], 10).unwrap();
        assert!(ev.stand < -0.5);

        let mut empty = [0; 10];
        empty[0] = 4;
        let table = BookTable::new(RuleSet::default(), DeckModel::custom(empty));
        let (action, ev) = table.lookup(&[5, 5, 6], 1).unwrap();
        assert_eq!(action, Action::Invalid);
        assert_eq!(ev, Expectation::default());
    }

    #[test]
    fn double_filter_follows_eligibility() {
        let ev = expectation(-0.2, 0.1, 0.3);
        let mut rule = RuleSet::default();
        let realize = |rule: &RuleSet, cards: &[u8], ev: &Expectation, from_split: bool| {
            realize_double_with(rule, Action::Double, cards, ev, from_split)
        };

        rule.double_eligibility = DoubleEligibility::FirstTwoCards;
        assert_eq!(realize(&rule, &[5, 6], &ev, false), Action::Double);
        assert_eq!(realize(&rule, &[2, 3, 6], &ev, false), Action::Hit);

        rule.double_eligibility = DoubleEligibility::AnyHand;
        assert_eq!(realize(&rule, &[2, 3, 6], &ev, false), Action::Double);

        rule.double_eligibility = DoubleEligibility::HardNineToEleven;
        assert_eq!(realize(&rule, &[4, 5], &ev, false), Action::Double);
        assert_eq!(realize(&rule, &[1, 7], &ev, false), Action::Hit);

        rule.double_eligibility = DoubleEligibility::HardTenToEleven;
        assert_eq!(realize(&rule, &[4, 5], &ev, false), Action::Hit);
        let standing = expectation(0.2, 0.1, 0.3);
        assert_eq!(realize(&rule, &[4, 5], &standing, false), Action::Stand);

        rule.double_eligibility = DoubleEligibility::FirstTwoCards;
        rule.allow_das = false;
        assert_eq!(realize(&rule, &[5, 6], &ev, true), Action::Hit);
        let table = BookTable::new(rule, DeckModel::infinite());
        let action = table.realize_double(Action::Stand, &[5, 6], &ev, true);
        assert_eq!(action, Action::Stand);
    }

    #[test]
    fn split_replaces_worse_plays() {
        let mut table = BookTable::new(RuleSet::default(), DeckModel::infinite());
        table
            .insert(entry(8, 8, 10, expectation(-0.54, -0.53, -1.06)))
            .unwrap();
        table.set_split(8, 10, -0.48).unwrap();
        let (action, ev) = table.lookup(&[8, 8], 10).unwrap();
        assert_eq!(action, Action::Split);
        assert_eq!(ev.split, Some(-0.48));

        let (action, _) = table.lookup_no_split(&[8, 8], 10).unwrap();
        assert_eq!(action, Action::Hit);

        table.set_split(8, 10, -0.6).unwrap();
        assert_eq!(table.lookup(&[8, 8], 10).unwrap().0, Action::Hit);
    }

    #[test]
    fn phase_guard() {
        let mut table = BookTable::new(RuleSet::default(), DeckModel::infinite());
        assert!(table.hard_hand_deviations().is_err());
        table.finish().unwrap();
        assert_eq!(table.phase(), BuildPhase::Finished);
        let result = table.insert(BookEntry::invalid(BookKey::new(2, 2, 2)));
        assert!(matches!(
            result,
            Err(BookError::WrongPhase {
                operation: "insert",
                expected: "Building"
            })
        ));
        assert!(table.finish().is_err());
    }

    #[test]
    fn invalid_entries_are_recorded() {
        let mut table = BookTable::new(RuleSet::default(), DeckModel::infinite());
        table
            .insert(BookEntry::invalid(BookKey::new(5, 5, 5)))
            .unwrap();
        assert_eq!(table.infeasible_hands(), &[BookKey::new(5, 5, 5)]);
    }
}
