mod book;
pub mod calculation;
mod deck;
mod hand;
pub mod simulation;
mod statearray;
mod summary;

use serde::{Deserialize, Serialize};
use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};
use strum_macros::EnumIter;
use thiserror::Error;

pub use book::builder::{BookBuilder, BuildOptions};
pub use book::persist::PersistedBook;
pub use book::{BookEntry, BookKey, BookTable, BuildPhase, Deviation, Expectation};
pub use deck::{DeckMode, DeckModel};
pub use hand::{best_total, evaluate, HandValue, Softness};
pub use simulation::{SimulationLimits, SplitEstimate, SplitEstimator, SplitStatistics};
pub use statearray::{CardCount, PairStateArray};
pub use summary::{HandClass, Overrides, TotalEvSummary};

/// Card values in the order they are dealt from a fresh deck: ace first.
pub const CARD_VALUES: [u8; 10] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

/// House rules a book is built under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub dealer_hits_soft17: bool,
    pub allow_das: bool,
    pub allow_hsa: bool,
    pub allow_rsa: bool,
    pub blackjack_payout: BlackjackPayout,
    pub max_split_hands: u8, // 2, 3 or 4.
    pub double_eligibility: DoubleEligibility,

    pub take_even_money: bool,
    pub take_insurance: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            dealer_hits_soft17: true,
            allow_das: true,
            allow_hsa: false,
            allow_rsa: true,
            blackjack_payout: BlackjackPayout::ThreeToTwo,
            max_split_hands: 4,
            double_eligibility: DoubleEligibility::FirstTwoCards,
            take_even_money: false,
            take_insurance: false,
        }
    }
}

impl RuleSet {
    pub fn validate(&self) -> Result<(), BookError> {
        if !(2..=4).contains(&self.max_split_hands) {
            return Err(BookError::InvalidRule(format!(
                "max_split_hands must be in [2, 4], got {}",
                self.max_split_hands
            )));
        }
        Ok(())
    }

    /// Maximum number of hands a pair of `pair_value` may be split into.
    pub fn split_hands_limit(&self, pair_value: u8) -> u8 {
        if pair_value == 1 && !self.allow_rsa {
            2
        } else {
            self.max_split_hands
        }
    }

    /// True when `other` differs from `self` only in options that matter to
    /// split hands.
    pub fn same_except_pair_options(&self, other: &RuleSet) -> bool {
        let strip = |rule: &RuleSet| RuleSet {
            allow_das: false,
            allow_hsa: false,
            allow_rsa: false,
            max_split_hands: 2,
            ..*rule
        };
        strip(self) == strip(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, EnumIter, Serialize_enum_str, Deserialize_enum_str)]
pub enum DoubleEligibility {
    AnyHand,
    FirstTwoCards,
    HardNineToEleven,
    HardTenToEleven,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize_enum_str, Deserialize_enum_str)]
pub enum BlackjackPayout {
    ThreeToTwo,
    SixToFive,
}

impl BlackjackPayout {
    pub fn ratio(&self) -> f64 {
        match self {
            BlackjackPayout::ThreeToTwo => 1.5,
            BlackjackPayout::SixToFive => 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum Action {
    Stand,
    Hit,
    Double,
    Split,
    Invalid,
}

impl Default for Action {
    fn default() -> Self {
        Action::Invalid
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Action::Stand => 'S',
            Action::Hit => 'H',
            Action::Double => 'D',
            Action::Split => 'P',
            Action::Invalid => 'X',
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Error)]
pub enum BookError {
    #[error("lookup of {cards:?} against upcard {upcard} before its entry was built")]
    SequencingDefect { cards: Vec<u8>, upcard: u8 },

    #[error("no playable action for {cards:?} against upcard {upcard}")]
    UnresolvableHand { cards: Vec<u8>, upcard: u8 },

    #[error("override {action} is not playable for {class} against upcard {upcard}")]
    InvalidOverride {
        class: String,
        upcard: u8,
        action: Action,
    },

    #[error("unknown hand class {0:?}")]
    InvalidHandClass(String),

    #[error("pair {pair_value} against upcard {upcard} has no split expectation")]
    MissingSplitEv { pair_value: u8, upcard: u8 },

    #[error("book was built under a different rule set or deck")]
    ConfigurationMismatch,

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("{operation} is only allowed in {expected} phase")]
    WrongPhase {
        operation: &'static str,
        expected: &'static str,
    },

    #[error("book persistence error: {0}")]
    Persistence(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
