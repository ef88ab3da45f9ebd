//! Scenario configuration.

use crate::simulator::DeterministicRng;
use serde::{Deserialize, Serialize};

/// Scenario config errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Range with min above max
    InvalidRange {
        field: &'static str,
        min: u64,
        max: u64,
    },
    /// Likelihood outside [0, 1] or NaN
    InvalidLikelihood { field: &'static str, value: f64 },
    /// TOML could not be parsed
    Parse(String),
    /// TOML could not be written
    Serialize(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidRange { field, min, max } => {
                write!(f, "{}: min {} exceeds max {}", field, min, max)
            }
            ConfigError::InvalidLikelihood { field, value } => {
                write!(f, "{}: likelihood {} is not within [0, 1]", field, value)
            }
            ConfigError::Parse(msg) => write!(f, "Failed to parse scenario: {}", msg),
            ConfigError::Serialize(msg) => write!(f, "Failed to write scenario: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Closed interval of counts. `min == max` is allowed, as is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: u64,
    pub max: u64,
}

impl CountRange {
    pub const fn new(min: u64, max: u64) -> Self {
        CountRange { min, max }
    }

    pub const fn exactly(n: u64) -> Self {
        CountRange { min: n, max: n }
    }

    /// One draw from the stream, even when the range holds a single value.
    pub fn draw(&self, rng: &mut DeterministicRng) -> u64 {
        debug_assert!(self.min <= self.max, "Precondition: validated range");
        rng.gen_range_inclusive(self.min, self.max)
    }

    pub fn contains(&self, n: u64) -> bool {
        self.min <= n && n <= self.max
    }
}

impl std::fmt::Display for CountRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Seed plus the eight workload parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario stream seed
    pub seed: u64,
    /// MediumThings pinned before the first round
    pub initial_cached_data: CountRange,
    /// Units of churn per cache update
    pub cache_update_size: CountRange,
    /// Chance a churn unit adds a new pinned MediumThing
    pub new_cached_data_likelihood: f64,
    /// Chance a churn unit on an existing MediumThing deletes it
    pub cache_deletion_likelihood: f64,
    pub rounds_of_offline_work: CountRange,
    pub days_per_offline_round: CountRange,
    pub items_per_day: CountRange,
    /// Chance an item reuses an existing MediumThing
    pub link_existing_item_likelihood: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::failure()
    }
}

impl ScenarioConfig {
    /// The scenario that reproduces the corruption
    pub fn failure() -> Self {
        ScenarioConfig {
            seed: 0,
            initial_cached_data: CountRange::new(100, 500),
            cache_update_size: CountRange::new(10, 100),
            new_cached_data_likelihood: 0.3,
            cache_deletion_likelihood: 0.1,
            rounds_of_offline_work: CountRange::new(3, 5),
            days_per_offline_round: CountRange::new(2, 6),
            items_per_day: CountRange::new(3, 7),
            link_existing_item_likelihood: 0.8,
        }
    }

    /// Small scenario for tests: same likelihoods, far fewer records
    pub fn test(seed: u64) -> Self {
        ScenarioConfig {
            seed,
            initial_cached_data: CountRange::new(3, 6),
            cache_update_size: CountRange::new(2, 5),
            rounds_of_offline_work: CountRange::new(1, 2),
            days_per_offline_round: CountRange::new(1, 2),
            items_per_day: CountRange::new(1, 2),
            ..Self::failure()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [
            ("initial_cached_data", self.initial_cached_data),
            ("cache_update_size", self.cache_update_size),
            ("rounds_of_offline_work", self.rounds_of_offline_work),
            ("days_per_offline_round", self.days_per_offline_round),
            ("items_per_day", self.items_per_day),
        ];
        for (field, range) in ranges {
            if range.min > range.max {
                return Err(ConfigError::InvalidRange {
                    field,
                    min: range.min,
                    max: range.max,
                });
            }
        }

        let likelihoods = [
            ("new_cached_data_likelihood", self.new_cached_data_likelihood),
            ("cache_deletion_likelihood", self.cache_deletion_likelihood),
            (
                "link_existing_item_likelihood",
                self.link_existing_item_likelihood,
            ),
        ];
        for (field, value) in likelihoods {
            // NaN fails the range check
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidLikelihood { field, value });
            }
        }
        Ok(())
    }

    /// Parse and validate
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ScenarioConfig =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}
