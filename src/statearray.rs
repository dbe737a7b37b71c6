use crate::hand::{best_total, HandValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Index;

const MOD: u128 = 3817949514078926267; // A prime number with 62 bits.
const BASE: u128 = 211;
const POW_BASE: [u128; 10] = get_powers_of_base();

const fn get_powers_of_base() -> [u128; 10] {
    let mut ret: [u128; 10] = [0; 10];
    ret[0] = 1;

    let mut i = 1;
    while i < ret.len() {
        ret[i] = ret[i - 1] * BASE % MOD;
        i += 1;
    }

    ret
}

/// This struct provide a convenient way to use 2 CardCount structs as the index of the
/// array. The dealer memo keys its entries by (dealer hand, remaining deck).
#[derive(Debug, Default, Clone)]
pub struct PairStateArray<T: Default> {
    data: HashMap<u128, T>,
}

impl<T: Default> PairStateArray<T> {
    pub fn new() -> PairStateArray<T> {
        PairStateArray {
            data: HashMap::new(),
        }
    }

    pub fn get(&self, first: &CardCount, second: &CardCount) -> Option<&T> {
        self.data.get(&Self::index_of(first, second))
    }

    pub fn insert(&mut self, first: &CardCount, second: &CardCount, value: T) {
        self.data.insert(Self::index_of(first, second), value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn index_of(first: &CardCount, second: &CardCount) -> u128 {
        // Both hash values fit in 62 bits.
        first.hash_value | (second.hash_value << 64)
    }
}

/// This provides a container to store the numbers of each card value (from
/// 1 to 10 inclusive).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(from = "[u16; 10]", into = "[u16; 10]")]
pub struct CardCount {
    counts: [u16; 10],
    hash_value: u128,
    sum: u16,
    total: u16,
}

impl CardCount {
    pub fn new(counts: &[u16; 10]) -> CardCount {
        let mut card_count = CardCount {
            counts: *counts,
            hash_value: 0,
            sum: 0,
            total: 0,
        };

        card_count.propagate_counts();

        card_count
    }

    pub fn with_number_of_decks(number_of_decks: u8) -> CardCount {
        let mut counts = [number_of_decks as u16 * 4; 10];
        counts[9] = number_of_decks as u16 * 16;
        Self::new(&counts)
    }

    pub fn from_cards(cards: &[u8]) -> CardCount {
        let mut card_count = Self::new(&[0; 10]);
        for &card in cards {
            card_count.add_card(card);
        }
        card_count
    }

    /// Add a card of given card value.
    ///
    /// Note that this method won't check if the card value is valid.
    pub fn add_card(&mut self, card_value: u8) {
        let index = (card_value - 1) as usize;
        self.counts[index] += 1;
        self.hash_value = (self.hash_value + POW_BASE[index]) % MOD;
        self.sum += card_value as u16;
        self.total += 1;
    }

    /// Remove a card of given card value.
    ///
    /// Note that this method won't check if the card value is valid. It also
    /// won't check if the number of the given card value is already 0.
    pub fn remove_card(&mut self, card_value: u8) {
        let index = (card_value - 1) as usize;
        self.counts[index] -= 1;
        self.hash_value = (self.hash_value + MOD - POW_BASE[index]) % MOD;
        self.sum -= card_value as u16;
        self.total -= 1;
    }

    pub fn get_total(&self) -> u16 {
        self.total
    }

    pub fn get_counts(&self) -> &[u16; 10] {
        &self.counts
    }

    pub fn get_value(&self) -> HandValue {
        let aces = self.counts[0];
        best_total((self.sum - aces) as u8, aces as u8)
    }

    pub fn bust(&self) -> bool {
        self.sum > 21
    }

    pub fn is_natural(&self) -> bool {
        self.total == 2 && self.counts[0] == 1 && self.counts[9] == 1
    }

    fn propagate_counts(&mut self) {
        self.hash_value = 0;
        self.sum = 0;
        self.total = 0;
        for i in 0..self.counts.len() {
            self.hash_value += (self.counts[i] as u128) * POW_BASE[i];
            self.sum += ((i + 1) as u16) * self.counts[i];
            self.total += self.counts[i];
        }
        self.hash_value %= MOD;
    }
}

impl From<[u16; 10]> for CardCount {
    fn from(counts: [u16; 10]) -> Self {
        CardCount::new(&counts)
    }
}

impl From<CardCount> for [u16; 10] {
    fn from(card_count: CardCount) -> Self {
        card_count.counts
    }
}

impl Index<u8> for CardCount {
    type Output = u16;
    fn index(&self, index: u8) -> &Self::Output {
        &self.counts[(index - 1) as usize]
    }
}

impl Hash for CardCount {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u128(self.hash_value);
    }
}

impl PartialEq for CardCount {
    fn eq(&self, other: &Self) -> bool {
        self.counts == other.counts
    }
}

impl Eq for CardCount {}
