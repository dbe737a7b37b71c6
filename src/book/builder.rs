use super::{hard_compositions, BookKey, BookTable};
use crate::calculation::ExactEvEngine;
use crate::simulation::{SimulationLimits, SplitEstimator};
use crate::{Action, BookError, DeckModel, RuleSet};
use log::{debug, info};

/// Pair values in the order their rows are simulated.
const PAIR_ORDER: [u8; 10] = [1, 10, 9, 8, 7, 6, 5, 4, 3, 2];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildOptions {
    /// 0 means one thread per available core.
    pub number_of_threads: usize,
    pub seed: u64,
    pub limits: SimulationLimits,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            number_of_threads: 0,
            seed: 0,
            limits: SimulationLimits::default(),
        }
    }
}

/// Builds books for one rule set and deck.
///
/// Upcard columns never read each other, so each one is built by its own
/// session and the columns are merged at the end.
#[derive(Debug, Clone)]
pub struct BookBuilder {
    rule: RuleSet,
    deck: DeckModel,
    options: BuildOptions,
}

impl BookBuilder {
    pub fn new(
        rule: RuleSet,
        deck: DeckModel,
        options: BuildOptions,
    ) -> Result<BookBuilder, BookError> {
        rule.validate()?;
        Ok(BookBuilder {
            rule,
            deck,
            options,
        })
    }

    pub fn number_of_threads(&self) -> usize {
        if self.options.number_of_threads == 0 {
            match std::thread::available_parallelism() {
                Ok(n) => n.get(),
                Err(_) => 1,
            }
        } else {
            self.options.number_of_threads
        }
    }

    pub fn build(&self) -> Result<BookTable, BookError> {
        let number_of_threads = self.number_of_threads().min(10);
        info!(
            "Building book with {} thread(s), deck {:?}",
            number_of_threads,
            self.deck.mode()
        );

        let columns = self.dispatch(number_of_threads, |upcard| self.build_column(upcard))?;

        let mut table = BookTable::new(self.rule, self.deck);
        for column in columns {
            table.merge(column)?;
        }
        table.finish()?;

        info!(
            "Book finished: {} entries, {} infeasible",
            table.len(),
            table.infeasible_hands().len()
        );
        Ok(table)
    }

    /// Simulates the pair rows of a finished book again under `rule`, which
    /// may differ from the book's rule set only in split options.
    pub fn rebuild_pairs(&self, table: &mut BookTable, rule: RuleSet) -> Result<(), BookError> {
        rule.validate()?;
        if !table.rule().same_except_pair_options(&rule) {
            return Err(BookError::InvalidRule(String::from(
                "only split options may change when rebuilding pairs",
            )));
        }
        if *table.deck() != self.deck {
            return Err(BookError::ConfigurationMismatch);
        }

        // `table` is only replaced once every pair row succeeded.
        let mut rebuilt = table.clone();
        rebuilt.reopen_for_pairs(rule)?;
        info!("Rebuilding pair rows");

        let number_of_threads = self.number_of_threads().min(10);
        let shared = &rebuilt;
        let estimates = self.dispatch(number_of_threads, |upcard| {
            let mut estimator = SplitEstimator::new(self.options.limits, self.options.seed);
            estimate_pair_rows(&mut estimator, shared, upcard)
        })?;

        for (pair_value, upcard, split_ev) in estimates.into_iter().flatten() {
            rebuilt.set_split(pair_value, upcard, split_ev)?;
        }
        rebuilt.finish()?;
        *table = rebuilt;
        info!("Pair rows rebuilt");
        Ok(())
    }

    fn build_column(&self, upcard: u8) -> Result<BookTable, BookError> {
        let mut table = BookTable::new(self.rule, self.deck);
        let mut engine = ExactEvEngine::new(&self.rule);
        build_non_pair_rows(&mut engine, &mut table, upcard)?;

        let mut estimator = SplitEstimator::new(self.options.limits, self.options.seed);
        let estimates = estimate_pair_rows(&mut estimator, &table, upcard)?;
        for (pair_value, upcard, split_ev) in estimates {
            table.set_split(pair_value, upcard, split_ev)?;
        }

        info!(
            "Upcard {} done, dealer memo {} states, {} split trials",
            upcard,
            engine.memo_len(),
            estimator.statistics().total_trials()
        );
        Ok(table)
    }

    /// Runs `work` for every upcard, spreading the upcards over
    /// `number_of_threads` scoped threads. Results come back in upcard order.
    fn dispatch<T, F>(&self, number_of_threads: usize, work: F) -> Result<Vec<T>, BookError>
    where
        T: Send,
        F: Fn(u8) -> Result<T, BookError> + Sync,
    {
        let number_of_threads = number_of_threads.max(1);
        let mut dispatched_upcards: Vec<Vec<u8>> = vec![Vec::new(); number_of_threads];
        for upcard in 1..=10u8 {
            dispatched_upcards[(upcard - 1) as usize % number_of_threads].push(upcard);
        }

        let work = &work;
        let mut results: Vec<(u8, T)> = std::thread::scope(|scope| {
            let threads: Vec<_> = dispatched_upcards
                .into_iter()
                .map(|upcards| {
                    scope.spawn(move || {
                        upcards
                            .into_iter()
                            .map(|upcard| work(upcard).map(|result| (upcard, result)))
                            .collect::<Result<Vec<_>, BookError>>()
                    })
                })
                .collect();

            let mut results = Vec::with_capacity(10);
            for thread in threads {
                match thread.join() {
                    Ok(result) => results.extend(result?),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            Ok::<_, BookError>(results)
        })?;

        results.sort_by_key(|(upcard, _)| *upcard);
        Ok(results.into_iter().map(|(_, result)| result).collect())
    }
}

/// Resolves every non-pair row of one upcard column, and the stand, hit and
/// double expectations of its pairs, in dependency order: hard 21 to 11,
/// soft 20 to 12, then hard 10 to 4.
pub(crate) fn build_non_pair_rows(
    engine: &mut ExactEvEngine,
    table: &mut BookTable,
    upcard: u8,
) -> Result<(), BookError> {
    info!("Upcard {}: hard totals 21 to 11", upcard);
    for total in (11..=21u8).rev() {
        build_hard_total(engine, table, total, upcard)?;
    }

    // Soft 21 is the natural, already resolved with hard 21.
    info!("Upcard {}: soft totals 20 to 12", upcard);
    for total in (12..=20u8).rev() {
        let entry = engine.build_entry(table, 1, total - 11, upcard)?;
        table.insert(entry)?;
    }

    info!("Upcard {}: hard totals 10 to 4", upcard);
    for total in (4..=10u8).rev() {
        build_hard_total(engine, table, total, upcard)?;
    }
    Ok(())
}

fn build_hard_total(
    engine: &mut ExactEvEngine,
    table: &mut BookTable,
    total: u8,
    upcard: u8,
) -> Result<(), BookError> {
    for [first, second] in hard_compositions(total) {
        let entry = engine.build_entry(table, first, second, upcard)?;
        table.insert(entry)?;
    }
    Ok(())
}

/// Split expectations of every feasible pair row of one column.
fn estimate_pair_rows(
    estimator: &mut SplitEstimator,
    table: &BookTable,
    upcard: u8,
) -> Result<Vec<(u8, u8, f64)>, BookError> {
    let mut ret = Vec::with_capacity(PAIR_ORDER.len());
    for pair_value in PAIR_ORDER {
        let key = BookKey::new(pair_value, pair_value, upcard);
        let Some(entry) = table.get(pair_value, pair_value, upcard) else {
            return Err(BookError::SequencingDefect {
                cards: key.cards().to_vec(),
                upcard,
            });
        };
        if entry.action == Action::Invalid {
            continue;
        }

        let best_non_split_ev = entry.expectation.get_max_expectation();
        let estimate = estimator.estimate(table, pair_value, upcard, best_non_split_ev)?;
        debug!(
            "Pair {} vs {}: split {:.6} against {:.6}",
            pair_value, upcard, estimate.ev, best_non_split_ev
        );
        ret.push((pair_value, upcard, estimate.ev));
    }
    Ok(ret)
}
