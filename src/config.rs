//! Engine configuration.
//!
//! The built-in rule table (grid size, spacing rule, scan order and value
//! function per level) is the default. A TOML file only needs to name the
//! values it changes; it is merged over the defaults before parsing.
//!
//! ```
//! use zoo_foreman::config::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     [search]
//!     trials = 4
//!     seed = 42
//!
//!     [level2]
//!     rows = 12
//!     cols = 12
//! "#).unwrap();
//!
//! assert_eq!(config.search.trials, 4);
//! assert_eq!(config.rules(2).unwrap().rows, 12);
//! assert_eq!(config.rules(2).unwrap().radius, 5);
//! ```

use crate::constants::*;
use crate::constraint::{Mode, Neighborhood};
use crate::search::{ScanOrder, ValueFunction};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which spacing rule a level enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
    Adjacency,
    IncompatibilityRadius,
}

/// Fixed rules and search tuning for one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRules {
    /// Required grid height.
    pub rows: usize,
    /// Required grid width.
    pub cols: usize,
    pub mode: RuleMode,
    /// Neighbourhood used by the adjacency rule.
    #[serde(default)]
    pub neighborhood: Neighborhood,
    /// Chebyshev radius used by the incompatibility rule.
    pub radius: u32,
    pub scan: ScanOrder,
    pub value: ValueFunction,
    /// Stop scanning once this fraction of open cells is covered.
    pub early_stop_utilization: f64,
    /// Placement count above which the interest score is sampled.
    pub interest_sample_limit: usize,
}

impl LevelRules {
    /// Built-in rules for a level, or `None` outside 1..=4.
    pub fn defaults_for(level: u8) -> Option<Self> {
        level_dimensions(level).map(|_| Self::builtin(level))
    }

    fn builtin(level: u8) -> Self {
        let index = (level.clamp(MIN_LEVEL, MAX_LEVEL) - MIN_LEVEL) as usize;
        let (rows, cols) = LEVEL_DIMENSIONS[index];
        match index {
            0 => LevelRules {
                rows,
                cols,
                mode: RuleMode::Adjacency,
                neighborhood: Neighborhood::Eight,
                radius: FORBIDDEN_RADIUS,
                scan: ScanOrder::RowMajor,
                value: ValueFunction::LeastUsed,
                early_stop_utilization: 1.0,
                interest_sample_limit: DEFAULT_INTEREST_SAMPLE_LIMIT,
            },
            1 => LevelRules {
                rows,
                cols,
                mode: RuleMode::IncompatibilityRadius,
                neighborhood: Neighborhood::Eight,
                radius: FORBIDDEN_RADIUS,
                scan: ScanOrder::BlockShuffled { block_size: 8 },
                value: ValueFunction::RoundRobin { subset_size: 6 },
                early_stop_utilization: 1.0,
                interest_sample_limit: DEFAULT_INTEREST_SAMPLE_LIMIT,
            },
            2 => LevelRules {
                rows,
                cols,
                mode: RuleMode::IncompatibilityRadius,
                neighborhood: Neighborhood::Eight,
                radius: FORBIDDEN_RADIUS,
                scan: ScanOrder::Spiral,
                value: ValueFunction::ClusterThenFill {
                    block_fraction: 0.25,
                    synergy_size: 4,
                },
                early_stop_utilization: DEFAULT_EARLY_STOP_UTILIZATION,
                interest_sample_limit: DEFAULT_INTEREST_SAMPLE_LIMIT,
            },
            _ => LevelRules {
                rows,
                cols,
                mode: RuleMode::IncompatibilityRadius,
                neighborhood: Neighborhood::Eight,
                radius: FORBIDDEN_RADIUS,
                scan: ScanOrder::BlockShuffled { block_size: 16 },
                value: ValueFunction::InterestPerCost,
                early_stop_utilization: DEFAULT_EARLY_STOP_UTILIZATION,
                interest_sample_limit: DEFAULT_INTEREST_SAMPLE_LIMIT,
            },
        }
    }

    /// The constraint mode these rules select.
    pub fn mode(&self) -> Mode {
        match self.mode {
            RuleMode::Adjacency => Mode::Adjacency(self.neighborhood),
            RuleMode::IncompatibilityRadius => Mode::IncompatibilityRadius(self.radius),
        }
    }

    fn validate(&self, level: u8) -> Result<(), ConfigError> {
        let invalid =
            |reason: String| Err(ConfigError::Invalid(format!("level{}: {}", level, reason)));

        if self.rows == 0 || self.cols == 0 {
            return invalid("grid dimensions must be positive".to_string());
        }
        if self.rows > u16::MAX as usize || self.cols > u16::MAX as usize {
            return invalid(format!("grid {}x{} is too large", self.rows, self.cols));
        }
        if !(self.early_stop_utilization > 0.0 && self.early_stop_utilization <= 1.0) {
            return invalid(format!(
                "early_stop_utilization {} must be in (0, 1]",
                self.early_stop_utilization
            ));
        }
        if self.interest_sample_limit == 0 {
            return invalid("interest_sample_limit must be positive".to_string());
        }
        if let ScanOrder::BlockShuffled { block_size: 0 } = self.scan {
            return invalid("block_size must be positive".to_string());
        }
        match self.value {
            ValueFunction::RoundRobin { subset_size: 0 } => {
                invalid("subset_size must be positive".to_string())
            }
            ValueFunction::ClusterThenFill {
                block_fraction,
                synergy_size,
            } if !(block_fraction > 0.0 && block_fraction <= 1.0) || synergy_size == 0 => {
                invalid(
                    "cluster block_fraction must be in (0, 1] and synergy_size positive"
                        .to_string(),
                )
            }
            _ => Ok(()),
        }
    }
}

/// Trial budget and reproducibility settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum number of trials.
    pub trials: usize,
    /// Base seed expanded into one seed per trial.
    pub seed: u64,
    /// Wall-clock limit after which no new trial starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u64>,
    /// Worker threads; 0 uses the rayon default.
    pub threads: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            trials: 16,
            seed: 0,
            time_limit_secs: None,
            threads: 0,
        }
    }
}

impl SearchConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs)
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub level1: LevelRules,
    pub level2: LevelRules,
    pub level3: LevelRules,
    pub level4: LevelRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            search: SearchConfig::default(),
            level1: LevelRules::builtin(1),
            level2: LevelRules::builtin(2),
            level3: LevelRules::builtin(3),
            level4: LevelRules::builtin(4),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses a TOML overlay and merges it over the defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let overlay: toml::Value = toml::from_str(s)?;
        let mut merged = toml::Value::try_from(EngineConfig::default())?;
        merge_toml(&mut merged, overlay);

        let config: EngineConfig = merged.try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.trials == 0 {
            return Err(ConfigError::Invalid("search.trials must be positive".to_string()));
        }
        for level in MIN_LEVEL..=MAX_LEVEL {
            if let Some(rules) = self.rules(level) {
                rules.validate(level)?;
            }
        }
        Ok(())
    }

    /// Rules for a level, or `None` outside 1..=4.
    pub fn rules(&self, level: u8) -> Option<&LevelRules> {
        match level {
            1 => Some(&self.level1),
            2 => Some(&self.level2),
            3 => Some(&self.level3),
            4 => Some(&self.level4),
            _ => None,
        }
    }

    pub fn rules_mut(&mut self, level: u8) -> Option<&mut LevelRules> {
        match level {
            1 => Some(&mut self.level1),
            2 => Some(&mut self.level2),
            3 => Some(&mut self.level3),
            4 => Some(&mut self.level4),
            _ => None,
        }
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.search.trials = trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.search.seed = seed;
        self
    }

    /// Override the required grid size of one level.
    pub fn with_dimensions(mut self, level: u8, rows: usize, cols: usize) -> Self {
        if let Some(rules) = self.rules_mut(level) {
            rules.rows = rows;
            rules.cols = cols;
        }
        self
    }
}

/// Recursively overlay `overlay` onto `base`. Tables merge key by key; any
/// other value replaces the base value. A table whose `type` tag changes is
/// replaced wholesale so stale variant fields do not leak through.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            let retagged = match (base_table.get("type"), overlay_table.get("type")) {
                (Some(old), Some(new)) => old != new,
                _ => false,
            };
            if retagged {
                *base_table = overlay_table;
                return;
            }
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rule_table() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        for level in MIN_LEVEL..=MAX_LEVEL {
            let rules = config.rules(level).unwrap();
            assert_eq!(Some((rules.rows, rules.cols)), level_dimensions(level));
        }
        assert_eq!(config.level1.mode(), Mode::Adjacency(Neighborhood::Eight));
        assert_eq!(config.level2.mode(), Mode::IncompatibilityRadius(FORBIDDEN_RADIUS));
        assert!(config.rules(5).is_none());
    }

    #[test]
    fn toml_overlay_keeps_unnamed_defaults() {
        let toml = r#"
            [search]
            trials = 3
            time_limit_secs = 20

            [level1]
            neighborhood = "four"

            [level3]
            early_stop_utilization = 0.9
            scan = { type = "block_shuffled", block_size = 4 }
        "#;

        let config = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.search.trials, 3);
        assert_eq!(config.search.time_limit(), Some(Duration::from_secs(20)));
        assert_eq!(config.search.seed, 0);
        assert_eq!(config.level1.mode(), Mode::Adjacency(Neighborhood::Four));
        assert_eq!(config.level1.rows, 10);
        assert_eq!(config.level3.scan, ScanOrder::BlockShuffled { block_size: 4 });
        assert_eq!(config.level3.early_stop_utilization, 0.9);
        assert_eq!(config.level4, LevelRules::defaults_for(4).unwrap());
    }

    #[test]
    fn switching_value_function_replaces_variant_fields() {
        let toml = r#"
            [level3]
            value = { type = "round_robin", subset_size = 2 }
        "#;
        let config = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.level3.value, ValueFunction::RoundRobin { subset_size: 2 });
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("[search]\ntrials = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[level4]\nearly_stop_utilization = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[level2]\nrows = \"wide\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn builder_overrides() {
        let config = EngineConfig::new()
            .with_trials(2)
            .with_seed(9)
            .with_dimensions(3, 30, 40);
        assert_eq!(config.search.trials, 2);
        assert_eq!(config.search.seed, 9);
        assert_eq!((config.level3.rows, config.level3.cols), (30, 40));
    }
}
