//! Pipeline configuration.
//!
//! Every field has a default suitable for production; override in code via the
//! `with_*` setters, from a serde source, or from `RIVALRY_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    OutOfRange(String),
}

/// Stage 1 settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub k_factor: f64,
    /// Rating assigned to players without one.
    pub default_rating: f64,
    /// Share of a two-player team's rating taken from its weaker member.
    pub weak_link_weight: f64,
    /// How many recent match ids and recent matchups are kept.
    pub recent_history_len: usize,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            default_rating: 1600.0,
            weak_link_weight: 0.7,
            recent_history_len: 10,
        }
    }
}

/// Stage 3 settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NemesisConfig {
    /// Minimum matches against an opponent before they can be a nemesis.
    pub min_matches: u32,
    /// Win rate (percent) a player must stay strictly below against a nemesis.
    pub max_win_rate_percent: u32,
}

impl Default for NemesisConfig {
    fn default() -> Self {
        Self {
            min_matches: 3,
            max_win_rate_percent: 50,
        }
    }
}

/// Delivery, retry and worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Deliveries of one message before it is dead-lettered.
    pub max_deliveries: u32,
    /// Attempts at committing one unit of work before giving up on a conflict.
    pub max_commit_attempts: u32,
    /// Outbox records claimed per relay drain.
    pub batch_size: usize,
    pub lease_secs: u64,
    /// Relay attempts per outbox record before it is marked failed.
    pub max_attempts: u32,
    /// How long published outbox records are kept before the relay purges them.
    pub outbox_retention_secs: u64,
    pub poll_interval_ms: u64,
    pub rating_budget_secs: u64,
    pub head_to_head_budget_secs: u64,
    pub nemesis_budget_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            max_commit_attempts: 5,
            batch_size: 64,
            lease_secs: 30,
            max_attempts: 5,
            outbox_retention_secs: 0,
            poll_interval_ms: 10,
            rating_budget_secs: 10,
            head_to_head_budget_secs: 180,
            nemesis_budget_secs: 60,
        }
    }
}

impl DeliveryConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn outbox_retention(&self) -> Duration {
        Duration::from_secs(self.outbox_retention_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rating_budget(&self) -> Duration {
        Duration::from_secs(self.rating_budget_secs)
    }

    pub fn head_to_head_budget(&self) -> Duration {
        Duration::from_secs(self.head_to_head_budget_secs)
    }

    pub fn nemesis_budget(&self) -> Duration {
        Duration::from_secs(self.nemesis_budget_secs)
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub rating: RatingConfig,
    pub nemesis: NemesisConfig,
    pub delivery: DeliveryConfig,
}

impl PipelineConfig {
    pub fn with_k_factor(mut self, k: f64) -> Self {
        self.rating.k_factor = k;
        self
    }

    pub fn with_default_rating(mut self, rating: f64) -> Self {
        self.rating.default_rating = rating;
        self
    }

    pub fn with_weak_link_weight(mut self, weight: f64) -> Self {
        self.rating.weak_link_weight = weight;
        self
    }

    pub fn with_nemesis_min_matches(mut self, min: u32) -> Self {
        self.nemesis.min_matches = min;
        self
    }

    pub fn with_max_deliveries(mut self, max: u32) -> Self {
        self.delivery.max_deliveries = max;
        self
    }

    pub fn with_max_commit_attempts(mut self, max: u32) -> Self {
        self.delivery.max_commit_attempts = max;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.delivery.batch_size = size;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.delivery.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Load configuration from `.env` and the process environment.
    ///
    /// | Env Var                               | Default |
    /// |---------------------------------------|---------|
    /// | `RIVALRY_K_FACTOR`                    | `32`    |
    /// | `RIVALRY_DEFAULT_RATING`              | `1600`  |
    /// | `RIVALRY_WEAK_LINK_WEIGHT`            | `0.7`   |
    /// | `RIVALRY_RECENT_HISTORY_LEN`          | `10`    |
    /// | `RIVALRY_NEMESIS_MIN_MATCHES`         | `3`     |
    /// | `RIVALRY_NEMESIS_MAX_WIN_RATE_PERCENT`| `50`    |
    /// | `RIVALRY_MAX_DELIVERIES`              | `5`     |
    /// | `RIVALRY_MAX_COMMIT_ATTEMPTS`         | `5`     |
    /// | `RIVALRY_RELAY_BATCH_SIZE`            | `64`    |
    /// | `RIVALRY_RELAY_LEASE_SECS`            | `30`    |
    /// | `RIVALRY_RELAY_MAX_ATTEMPTS`          | `5`     |
    /// | `RIVALRY_OUTBOX_RETENTION_SECS`       | `0`     |
    /// | `RIVALRY_POLL_INTERVAL_MS`            | `10`    |
    /// | `RIVALRY_RATING_BUDGET_SECS`          | `10`    |
    /// | `RIVALRY_HEAD_TO_HEAD_BUDGET_SECS`    | `180`   |
    /// | `RIVALRY_NEMESIS_BUDGET_SECS`         | `60`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let r = &mut config.rating;
        override_with(&lookup, "RIVALRY_K_FACTOR", &mut r.k_factor)?;
        override_with(&lookup, "RIVALRY_DEFAULT_RATING", &mut r.default_rating)?;
        override_with(&lookup, "RIVALRY_WEAK_LINK_WEIGHT", &mut r.weak_link_weight)?;
        override_with(&lookup, "RIVALRY_RECENT_HISTORY_LEN", &mut r.recent_history_len)?;

        let n = &mut config.nemesis;
        override_with(&lookup, "RIVALRY_NEMESIS_MIN_MATCHES", &mut n.min_matches)?;
        override_with(&lookup, "RIVALRY_NEMESIS_MAX_WIN_RATE_PERCENT", &mut n.max_win_rate_percent)?;

        let d = &mut config.delivery;
        override_with(&lookup, "RIVALRY_MAX_DELIVERIES", &mut d.max_deliveries)?;
        override_with(&lookup, "RIVALRY_MAX_COMMIT_ATTEMPTS", &mut d.max_commit_attempts)?;
        override_with(&lookup, "RIVALRY_RELAY_BATCH_SIZE", &mut d.batch_size)?;
        override_with(&lookup, "RIVALRY_RELAY_LEASE_SECS", &mut d.lease_secs)?;
        override_with(&lookup, "RIVALRY_RELAY_MAX_ATTEMPTS", &mut d.max_attempts)?;
        override_with(&lookup, "RIVALRY_OUTBOX_RETENTION_SECS", &mut d.outbox_retention_secs)?;
        override_with(&lookup, "RIVALRY_POLL_INTERVAL_MS", &mut d.poll_interval_ms)?;
        override_with(&lookup, "RIVALRY_RATING_BUDGET_SECS", &mut d.rating_budget_secs)?;
        override_with(&lookup, "RIVALRY_HEAD_TO_HEAD_BUDGET_SECS", &mut d.head_to_head_budget_secs)?;
        override_with(&lookup, "RIVALRY_NEMESIS_BUDGET_SECS", &mut d.nemesis_budget_secs)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rating.k_factor.is_finite() && self.rating.k_factor > 0.0) {
            return Err(ConfigError::OutOfRange("k_factor must be positive".into()));
        }
        if !self.rating.default_rating.is_finite() {
            return Err(ConfigError::OutOfRange("default_rating must be finite".into()));
        }
        if !(0.0..=1.0).contains(&self.rating.weak_link_weight) {
            return Err(ConfigError::OutOfRange(
                "weak_link_weight must be within 0..=1".into(),
            ));
        }
        if self.nemesis.max_win_rate_percent > 100 {
            return Err(ConfigError::OutOfRange(
                "max_win_rate_percent must be at most 100".into(),
            ));
        }
        if self.delivery.max_deliveries == 0
            || self.delivery.max_commit_attempts == 0
            || self.delivery.max_attempts == 0
            || self.delivery.batch_size == 0
        {
            return Err(ConfigError::OutOfRange(
                "delivery limits must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn override_with<F, T>(lookup: &F, var: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = lookup(var) {
        *slot = value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: var.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
