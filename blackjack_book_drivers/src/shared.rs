use anyhow::{anyhow, bail, Context};
use blackjack_book::{
    Action, BuildOptions, DeckModel, HandClass, Overrides, RuleSet, SimulationLimits,
};
use serde::{Deserialize, Serialize};
use std::fs;

/// Smallest number of cards of each value a custom deck may hold.
pub const MIN_CUSTOM_COUNT: u16 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rule: ConfigRule,
    pub deck: ConfigDeck,
    #[serde(default)]
    pub build: ConfigBuild,
    #[serde(default)]
    pub overrides: Vec<ConfigOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRule {
    pub dealer_hits_soft17: bool,
    pub allow_das: bool,
    pub allow_hsa: bool,
    pub allow_rsa: bool,
    pub blackjack_payout: String,
    pub max_split_hands: u8,
    pub double_eligibility: String,

    pub take_even_money: bool,
    pub take_insurance: bool,
}

impl TryInto<RuleSet> for ConfigRule {
    type Error = anyhow::Error;

    fn try_into(self) -> Result<RuleSet, Self::Error> {
        let rule = RuleSet {
            dealer_hits_soft17: self.dealer_hits_soft17,
            allow_das: self.allow_das,
            allow_hsa: self.allow_hsa,
            allow_rsa: self.allow_rsa,
            blackjack_payout: self.blackjack_payout.parse()?,
            max_split_hands: self.max_split_hands,
            double_eligibility: self.double_eligibility.parse()?,
            take_even_money: self.take_even_money,
            take_insurance: self.take_insurance,
        };
        rule.validate()?;

        Ok(rule)
    }
}

/// `kind` is one of `Infinite`, `Decks` (with `number_of_decks`) or `Custom`
/// (with `counts`, aces first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDeck {
    pub kind: String,
    #[serde(default)]
    pub number_of_decks: Option<u8>,
    #[serde(default)]
    pub counts: Option<[u16; 10]>,
}

impl TryInto<DeckModel> for ConfigDeck {
    type Error = anyhow::Error;

    fn try_into(self) -> Result<DeckModel, Self::Error> {
        match self.kind.as_str() {
            "Infinite" => Ok(DeckModel::infinite()),
            "Decks" => {
                let number_of_decks = self
                    .number_of_decks
                    .ok_or_else(|| anyhow!("Decks needs number_of_decks"))?;
                if number_of_decks == 0 {
                    bail!("number_of_decks must be positive");
                }
                Ok(DeckModel::with_number_of_decks(number_of_decks))
            }
            "Custom" => {
                let counts = self.counts.ok_or_else(|| anyhow!("Custom needs counts"))?;
                if let Some(card) = counts.iter().position(|&c| c < MIN_CUSTOM_COUNT) {
                    bail!(
                        "custom deck needs at least {} cards of value {}, got {}",
                        MIN_CUSTOM_COUNT,
                        card + 1,
                        counts[card]
                    );
                }
                Ok(DeckModel::custom(counts))
            }
            other => bail!("unknown deck kind {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigBuild {
    pub number_of_threads: usize,
    pub seed: u64,
    pub min_trials: u64,
    pub confidence: f64,
    pub max_trials: u64,
}

impl Default for ConfigBuild {
    fn default() -> Self {
        let options = BuildOptions::default();
        Self {
            number_of_threads: options.number_of_threads,
            seed: options.seed,
            min_trials: options.limits.min_trials,
            confidence: options.limits.confidence,
            max_trials: options.limits.max_trials,
        }
    }
}

impl TryInto<BuildOptions> for ConfigBuild {
    type Error = anyhow::Error;

    fn try_into(self) -> Result<BuildOptions, Self::Error> {
        if self.max_trials == 0 {
            bail!("max_trials must be positive");
        }
        Ok(BuildOptions {
            number_of_threads: self.number_of_threads,
            seed: self.seed,
            limits: SimulationLimits {
                min_trials: self.min_trials,
                confidence: self.confidence,
                max_trials: self.max_trials,
            },
        })
    }
}

/// A chart play chosen by hand, e.g. `hand: hard 16`, `upcard: 10`,
/// `action: Stand`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOverride {
    pub hand: String,
    pub upcard: u8,
    pub action: Action,
}

/// Converts the override list, refusing duplicates and bad upcards.
pub fn convert_overrides(config_overrides: &[ConfigOverride]) -> anyhow::Result<Overrides> {
    let mut overrides = Overrides::new();
    for config_override in config_overrides {
        let class: HandClass = config_override.hand.parse()?;
        if !(1..=10).contains(&config_override.upcard) {
            bail!("upcard must be in [1, 10], got {}", config_override.upcard);
        }
        if overrides.get(class, config_override.upcard).is_some() {
            bail!(
                "{} against {} is overridden twice",
                class,
                config_override.upcard
            );
        }
        overrides.insert(class, config_override.upcard, config_override.action);
    }
    Ok(overrides)
}

/// Reads the content of a given config file and parses it to a Config.
pub fn parse_config_from_file(filename: &str) -> anyhow::Result<Config> {
    let file_content =
        fs::read_to_string(filename).with_context(|| format!("Cannot read {filename}"))?;
    let config =
        serde_yaml::from_str(&file_content).with_context(|| format!("Cannot parse {filename}"))?;
    Ok(config)
}
