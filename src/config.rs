//! Auto indexing configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AutoIndexError, Result};
use crate::observation::ClauseCounts;

pub const DEFAULT_LOG_TABLE: &str = "auto_index_log";
pub const DEFAULT_SCHEMA: &str = "public";

/// Minimum final score, in percent, for an index to be created
pub const DEFAULT_CREATE_THRESHOLD: f64 = 10.0;

/// Usage ratio below which a non-unique index is dropped
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 0.10;

pub const DEFAULT_AUDIT_DURATION: Duration = Duration::from_secs(3600);

/// Importance of each clause kind when scoring a column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClauseWeights {
    pub where_clause: f64,
    pub group_by: f64,
    pub order_by: f64,
}

impl ClauseWeights {
    pub fn weighted_score(&self, counts: &ClauseCounts) -> f64 {
        self.where_clause * counts.where_count as f64
            + self.group_by * counts.group_by_count as f64
            + self.order_by * counts.order_by_count as f64
    }
}

impl Default for ClauseWeights {
    fn default() -> Self {
        Self {
            where_clause: 0.5,
            group_by: 0.3,
            order_by: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoIndexConfig {
    /// Table holding the observation log; statements naming it are never observed
    pub log_table: String,
    /// Schema whose index statistics are read
    pub schema: String,
    pub create_threshold: f64,
    pub prune_threshold: f64,
    pub weights: ClauseWeights,
    /// Audit length used when `begin_audit` is given zero seconds
    pub default_audit_duration: Duration,
}

impl Default for AutoIndexConfig {
    fn default() -> Self {
        Self {
            log_table: DEFAULT_LOG_TABLE.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            create_threshold: DEFAULT_CREATE_THRESHOLD,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            weights: ClauseWeights::default(),
            default_audit_duration: DEFAULT_AUDIT_DURATION,
        }
    }
}

impl AutoIndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `AUTO_INDEX_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(table) = read_var("AUTO_INDEX_LOG_TABLE") {
            config.log_table = table;
        }
        if let Some(schema) = read_var("AUTO_INDEX_SCHEMA") {
            config.schema = schema;
        }
        if let Some(threshold) = parse_var("AUTO_INDEX_CREATE_THRESHOLD")? {
            config.create_threshold = threshold;
        }
        if let Some(threshold) = parse_var("AUTO_INDEX_PRUNE_THRESHOLD")? {
            config.prune_threshold = threshold;
        }
        if let Some(seconds) = parse_var::<u64>("AUTO_INDEX_AUDIT_SECONDS")? {
            config.default_audit_duration = Duration::from_secs(seconds);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_log_table(mut self, log_table: impl Into<String>) -> Self {
        self.log_table = log_table.into();
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_create_threshold(mut self, threshold: f64) -> Self {
        self.create_threshold = threshold;
        self
    }

    pub fn with_prune_threshold(mut self, threshold: f64) -> Self {
        self.prune_threshold = threshold;
        self
    }

    pub fn with_weights(mut self, weights: ClauseWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_default_audit_duration(mut self, duration: Duration) -> Self {
        self.default_audit_duration = duration;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !is_plain_identifier(&self.log_table) {
            return Err(AutoIndexError::InvalidConfig(format!(
                "log table '{}' is not a plain identifier",
                self.log_table
            )));
        }
        if self.schema.is_empty() {
            return Err(AutoIndexError::InvalidConfig("schema must not be empty".to_string()));
        }
        if !(0.0..=100.0).contains(&self.create_threshold) {
            return Err(AutoIndexError::InvalidConfig(format!(
                "create threshold {} is outside 0..=100",
                self.create_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.prune_threshold) {
            return Err(AutoIndexError::InvalidConfig(format!(
                "prune threshold {} is outside 0..=1",
                self.prune_threshold
            )));
        }

        let w = &self.weights;
        if [w.where_clause, w.group_by, w.order_by]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(AutoIndexError::InvalidConfig(format!(
                "clause weights must be non-negative: {:?}",
                w
            )));
        }

        Ok(())
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn read_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match read_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AutoIndexError::InvalidConfig(format!("{} has invalid value '{}'", name, raw))),
        None => Ok(None),
    }
}
