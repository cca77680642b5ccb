//! Engine configuration, loadable from TOML. Every field has a default, so
//! an empty file (or no file) gives a working setup.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChessError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Think time budget per computer move at full strength.
    pub think_time_ms: u64,
    /// Cosmetic minimum delay before a computer move is delivered.
    pub min_think_time_ms: u64,
    /// Transposition table size per search.
    pub tt_size_mb: usize,
    /// Depth cap applied on top of the difficulty's depth.
    pub max_depth: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            think_time_ms: 2000,
            min_think_time_ms: 500,
            tt_size_mb: 16,
            max_depth: 6,
        }
    }
}

impl SearchConfig {
    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }

    pub fn min_think_time(&self) -> Duration {
        Duration::from_millis(self.min_think_time_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub challenge_timeout_secs: u64,
    pub tick_interval_ms: u64,
    /// Fixed seed for the computer's random choices. Entropy when absent.
    pub seed: Option<u64>,
    pub search: SearchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            challenge_timeout_secs: 30,
            tick_interval_ms: 250,
            seed: None,
            search: SearchConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<EngineConfig> {
        let config: EngineConfig =
            toml::from_str(source).map_err(|e| ChessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|e| ChessError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ChessError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.challenge_timeout_secs == 0 {
            return Err(ChessError::Config("challenge_timeout_secs must be positive".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ChessError::Config("tick_interval_ms must be positive".into()));
        }
        if self.search.max_depth == 0 {
            return Err(ChessError::Config("search.max_depth must be positive".into()));
        }
        if self.search.tt_size_mb == 0 {
            return Err(ChessError::Config("search.tt_size_mb must be positive".into()));
        }
        Ok(())
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_secs(self.challenge_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.challenge_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            seed = 42

            [search]
            think_time_ms = 750
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.search.think_time(), Duration::from_millis(750));
        assert_eq!(config.search.max_depth, SearchConfig::default().max_depth);
        assert_eq!(config.tick_interval_ms, 250);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = EngineConfig::from_toml_str("challenge_timeout_secs = 0").unwrap_err();
        assert_eq!(err.code(), "config");
        assert!(EngineConfig::from_toml_str("seed = \"soon\"").is_err());
        assert!(EngineConfig::load("/nonexistent/engine.toml").is_err());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = EngineConfig::default();
        config.seed = Some(7);
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}
