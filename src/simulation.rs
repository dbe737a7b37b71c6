mod shoe;

pub use shoe::Shoe;

use crate::book::BookTable;
use crate::hand::evaluate;
use crate::{Action, BookError};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Stopping constants of the split estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationLimits {
    pub min_trials: u64,
    /// Stop once `|mean - best| * trials` exceeds this.
    pub confidence: f64,
    pub max_trials: u64,
}

impl SimulationLimits {
    pub const DEFAULT_MIN_TRIALS: u64 = 10_000;
    pub const DEFAULT_CONFIDENCE: f64 = 200.0;
    pub const DEFAULT_MAX_TRIALS: u64 = 10_000_000;
}

impl Default for SimulationLimits {
    fn default() -> Self {
        Self {
            min_trials: Self::DEFAULT_MIN_TRIALS,
            confidence: Self::DEFAULT_CONFIDENCE,
            max_trials: Self::DEFAULT_MAX_TRIALS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitEstimate {
    pub ev: f64,
    pub trials: u64,
}

/// Counts of simulated splits by the number of hands they ended with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitStatistics {
    // Index is the number of hands, 2 to 4.
    trials: [u64; 5],
    ev_sums: [f64; 5],
    discarded: u64,
}

impl SplitStatistics {
    fn record(&mut self, number_of_hands: usize, ev: f64) {
        self.trials[number_of_hands] += 1;
        self.ev_sums[number_of_hands] += ev;
    }

    fn merge(&mut self, other: &SplitStatistics) {
        for i in 0..self.trials.len() {
            self.trials[i] += other.trials[i];
            self.ev_sums[i] += other.ev_sums[i];
        }
        self.discarded += other.discarded;
    }

    pub fn trials_with_hands(&self, number_of_hands: usize) -> u64 {
        self.trials.get(number_of_hands).copied().unwrap_or(0)
    }

    pub fn mean_ev_with_hands(&self, number_of_hands: usize) -> Option<f64> {
        let trials = self.trials_with_hands(number_of_hands);
        if trials == 0 {
            None
        } else {
            Some(self.ev_sums[number_of_hands] / trials as f64)
        }
    }

    pub fn total_trials(&self) -> u64 {
        self.trials.iter().sum()
    }

    /// Trials abandoned because a finite shoe ran out of cards.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

enum TrialEnd {
    ShoeEmpty,
    Book(BookError),
}

impl From<BookError> for TrialEnd {
    fn from(e: BookError) -> Self {
        TrialEnd::Book(e)
    }
}

/// Monte Carlo estimator of the expectation of splitting a pair.
///
/// Sub-hands are played by the non-split plays already in the book, so the
/// table must hold every non-pair row of the upcard before it is used.
#[derive(Debug)]
pub struct SplitEstimator {
    limits: SimulationLimits,
    seed: u64,
    rng: StdRng,
    statistics: SplitStatistics,
}

impl SplitEstimator {
    pub fn new(limits: SimulationLimits, seed: u64) -> SplitEstimator {
        SplitEstimator {
            limits,
            seed,
            rng: StdRng::seed_from_u64(seed),
            statistics: SplitStatistics::default(),
        }
    }

    /// Statistics of every estimate made by this estimator.
    pub fn statistics(&self) -> &SplitStatistics {
        &self.statistics
    }

    /// Restarts the random stream for one (pair, upcard) row, so that a row
    /// gets the same estimate whichever thread builds it.
    pub fn reseed(&mut self, pair_value: u8, upcard: u8) {
        let row = ((pair_value as u64) << 8) | upcard as u64;
        self.rng = StdRng::seed_from_u64(self.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ row);
    }

    /// Plays one split of `pair_value` against `upcard`, the dealer having
    /// no natural. Returns `Ok(None)` when a finite shoe runs out of cards.
    pub fn simulate_trial(
        &mut self,
        table: &BookTable,
        pair_value: u8,
        upcard: u8,
    ) -> Result<Option<f64>, BookError> {
        let mut statistics = SplitStatistics::default();
        let result = self.play_split(table, pair_value, upcard, &mut statistics);
        self.statistics.merge(&statistics);
        match result {
            Ok(ev) => Ok(Some(ev)),
            Err(TrialEnd::ShoeEmpty) => {
                self.statistics.discarded += 1;
                Ok(None)
            }
            Err(TrialEnd::Book(e)) => Err(e),
        }
    }

    /// Estimates the split expectation, stopping early once the running mean
    /// is clearly apart from `best_non_split_ev`.
    pub fn estimate(
        &mut self,
        table: &BookTable,
        pair_value: u8,
        upcard: u8,
        best_non_split_ev: f64,
    ) -> Result<SplitEstimate, BookError> {
        self.reseed(pair_value, upcard);
        let mut statistics = SplitStatistics::default();
        let mut mean = 0.0;
        let mut trials: u64 = 0;

        for _ in 0..self.limits.max_trials {
            let ev = match self.play_split(table, pair_value, upcard, &mut statistics) {
                Ok(ev) => ev,
                Err(TrialEnd::ShoeEmpty) => {
                    statistics.discarded += 1;
                    continue;
                }
                Err(TrialEnd::Book(e)) => return Err(e),
            };

            mean += (ev - mean) / (trials + 1) as f64;
            trials += 1;

            let diff = (mean - best_non_split_ev).abs();
            if trials > self.limits.min_trials && diff * trials as f64 > self.limits.confidence {
                break;
            }
        }

        debug!(
            "Split {} vs {}: {:.6} after {} trials, hands 2/3/4: {}/{}/{}, discarded {}",
            pair_value,
            upcard,
            mean,
            trials,
            statistics.trials_with_hands(2),
            statistics.trials_with_hands(3),
            statistics.trials_with_hands(4),
            statistics.discarded()
        );
        self.statistics.merge(&statistics);

        if trials == 0 {
            warn!(
                "No split of {} against {} could be completed",
                pair_value, upcard
            );
            return Ok(SplitEstimate {
                ev: f64::NEG_INFINITY,
                trials,
            });
        }
        Ok(SplitEstimate { ev: mean, trials })
    }

    fn play_split(
        &mut self,
        table: &BookTable,
        pair_value: u8,
        upcard: u8,
        statistics: &mut SplitStatistics,
    ) -> Result<f64, TrialEnd> {
        let rule = *table.rule();
        let mut shoe = Shoe::new(*table.deck());
        if !shoe.remove_cards(&[pair_value, pair_value, upcard]) {
            return Err(TrialEnd::ShoeEmpty);
        }

        let natural_hole_card = match upcard {
            1 => Some(10),
            10 => Some(1),
            _ => None,
        };
        let hole_card = shoe
            .deal_card_excluding(&mut self.rng, natural_hole_card)
            .ok_or(TrialEnd::ShoeEmpty)?;
        let mut dealer_cards = vec![upcard, hole_card];

        let max_hands = rule.split_hands_limit(pair_value) as usize;
        let mut hands: Vec<Vec<u8>> = vec![vec![pair_value], vec![pair_value]];
        let mut bet_multipliers: Vec<f64> = Vec::with_capacity(max_hands);

        let mut current_hand = 0;
        while current_hand < hands.len() {
            let mut card = self.deal(&mut shoe)?;
            while card == pair_value && hands.len() < max_hands {
                hands.push(vec![card]);
                card = self.deal(&mut shoe)?;
            }
            hands[current_hand].push(card);

            let mut bet_multiplier = 1.0;
            if pair_value != 1 || rule.allow_hsa {
                bet_multiplier =
                    self.play_split_hand(table, &mut hands[current_hand], upcard, &mut shoe)?;
            }
            bet_multipliers.push(bet_multiplier);
            current_hand += 1;
        }

        let mut dealer_value = evaluate(&dealer_cards);
        while dealer_value.total < 17
            || (dealer_value.total == 17 && dealer_value.is_soft() && rule.dealer_hits_soft17)
        {
            dealer_cards.push(self.deal(&mut shoe)?);
            dealer_value = evaluate(&dealer_cards);
        }

        let mut total_ev = 0.0;
        for (hand, bet_multiplier) in hands.iter().zip(bet_multipliers.iter()) {
            let player_total = evaluate(hand).total;
            if player_total > 21 {
                total_ev -= bet_multiplier;
            } else if dealer_value.total > 21 || player_total > dealer_value.total {
                total_ev += bet_multiplier;
            } else if player_total < dealer_value.total {
                total_ev -= bet_multiplier;
            }
        }

        statistics.record(hands.len(), total_ev);
        Ok(total_ev)
    }

    /// Plays a split hand holding its first two cards. Returns its bet
    /// multiplier.
    fn play_split_hand(
        &mut self,
        table: &BookTable,
        hand: &mut Vec<u8>,
        upcard: u8,
        shoe: &mut Shoe,
    ) -> Result<f64, TrialEnd> {
        let (action, expectation) = table.lookup_no_split(hand, upcard)?;
        let mut action = table.realize_double(action, hand, &expectation, true);

        loop {
            match action {
                Action::Stand => return Ok(1.0),
                Action::Double => {
                    hand.push(self.deal(shoe)?);
                    return Ok(2.0);
                }
                Action::Hit => {
                    hand.push(self.deal(shoe)?);
                    if evaluate(hand).is_bust() {
                        return Ok(1.0);
                    }
                    let (next_action, expectation) = table.lookup_no_split(hand, upcard)?;
                    action = table.realize_double(next_action, hand, &expectation, true);
                }
                Action::Split | Action::Invalid => {
                    return Err(TrialEnd::Book(BookError::UnresolvableHand {
                        cards: hand.clone(),
                        upcard,
                    }))
                }
            }
        }
    }

    fn deal(&mut self, shoe: &mut Shoe) -> Result<u8, TrialEnd> {
        shoe.deal_card(&mut self.rng).ok_or(TrialEnd::ShoeEmpty)
    }
}
