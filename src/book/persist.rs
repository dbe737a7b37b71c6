use super::{BookEntry, BookTable, BuildPhase};
use crate::{BookError, DeckModel, RuleSet};
use blackjack_book_macros::allowed_phase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};

/// A finished book as it is written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBook {
    pub rule: RuleSet,
    pub deck: DeckModel,
    pub entries: Vec<BookEntry>,
}

impl From<PersistedBook> for BookTable {
    fn from(book: PersistedBook) -> Self {
        let mut infeasible: Vec<_> = book
            .entries
            .iter()
            .filter(|entry| entry.action == crate::Action::Invalid)
            .map(|entry| entry.key)
            .collect();
        infeasible.sort();

        BookTable {
            rule: book.rule,
            deck: book.deck,
            entries: book
                .entries
                .into_iter()
                .map(|entry| (entry.key, entry))
                .collect::<HashMap<_, _>>(),
            phase: BuildPhase::Finished,
            infeasible,
        }
    }
}

impl BookTable {
    #[allowed_phase(Finished)]
    pub fn to_persisted(&self) -> Result<PersistedBook, BookError> {
        Ok(PersistedBook {
            rule: self.rule,
            deck: self.deck,
            entries: self.entries().into_iter().copied().collect(),
        })
    }

    #[allowed_phase(Finished)]
    pub fn save_to_writer<W: Write>(&self, writer: W) -> Result<(), BookError> {
        serde_yaml::to_writer(writer, &self.to_persisted()?)?;
        Ok(())
    }

    /// Loads a book, refusing it unless it was built under `rule` and `deck`.
    pub fn load_from_reader<R: Read>(
        reader: R,
        rule: &RuleSet,
        deck: &DeckModel,
    ) -> Result<BookTable, BookError> {
        let table = Self::load_unchecked(reader)?;
        if table.rule != *rule || table.deck != *deck {
            return Err(BookError::ConfigurationMismatch);
        }
        Ok(table)
    }

    pub fn load_unchecked<R: Read>(reader: R) -> Result<BookTable, BookError> {
        let book: PersistedBook = serde_yaml::from_reader(reader)?;
        book.rule.validate()?;
        Ok(book.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BookKey, Expectation};
    use crate::Action;

    fn small_table(rule: RuleSet, deck: DeckModel) -> BookTable {
        let mut table = BookTable::new(rule, deck);
        table
            .insert(BookEntry {
                key: BookKey::new(8, 8, 10),
                action: Action::Split,
                expectation: Expectation {
                    stand: -0.5414,
                    hit: -0.5379,
                    double: -1.0758,
                    split: Some(-0.4807),
                },
            })
            .unwrap();
        table
            .insert(BookEntry {
                key: BookKey::new(1, 10, 6),
                action: Action::Stand,
                expectation: Expectation {
                    stand: 0.9,
                    hit: -1.0,
                    double: -2.0,
                    split: None,
                },
            })
            .unwrap();
        table.insert(BookEntry::invalid(BookKey::new(5, 5, 5))).unwrap();
        table.finish().unwrap();
        table
    }

    #[test]
    fn save_and_load() {
        let rule = RuleSet::default();
        let deck = DeckModel::with_number_of_decks(2);
        let table = small_table(rule, deck);

        let mut buffer = Vec::new();
        table.save_to_writer(&mut buffer).unwrap();
        let loaded = BookTable::load_from_reader(buffer.as_slice(), &rule, &deck).unwrap();

        assert_eq!(loaded.phase(), BuildPhase::Finished);
        assert_eq!(loaded.entries(), table.entries());
        assert_eq!(loaded.infeasible_hands(), table.infeasible_hands());
        let split = loaded.get(8, 8, 10).unwrap().expectation.split;
        assert_eq!(split, Some(-0.4807));
    }

    #[test]
    fn refuses_other_configurations() {
        let rule = RuleSet::default();
        let deck = DeckModel::infinite();
        let table = small_table(rule, deck);
        let mut buffer = Vec::new();
        table.save_to_writer(&mut buffer).unwrap();

        let mut other_rule = rule;
        other_rule.blackjack_payout = crate::BlackjackPayout::SixToFive;
        let result = BookTable::load_from_reader(buffer.as_slice(), &other_rule, &deck);
        assert!(matches!(result, Err(BookError::ConfigurationMismatch)));

        let six_decks = DeckModel::with_number_of_decks(6);
        let result = BookTable::load_from_reader(buffer.as_slice(), &rule, &six_decks);
        assert!(matches!(result, Err(BookError::ConfigurationMismatch)));

        let loaded = BookTable::load_unchecked(buffer.as_slice()).unwrap();
        assert_eq!(*loaded.rule(), rule);
    }

    #[test]
    fn unfinished_books_are_not_saved() {
        let table = BookTable::new(RuleSet::default(), DeckModel::infinite());
        let mut buffer = Vec::new();
        assert!(matches!(
            table.save_to_writer(&mut buffer),
            Err(BookError::WrongPhase { .. })
        ));
        let broken = "not: [a book";
        assert!(BookTable::load_unchecked(broken.as_bytes()).is_err());
    }
}
