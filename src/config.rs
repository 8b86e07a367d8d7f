//! Engine configuration
//!
//! Every section has defaults, so an empty JSON object is a valid config.
//! `EngineConfig::load()` reads the file named by `PIVOT_DESKTOP_CONFIG`
//! (when set) and applies the `PIVOT_DESKTOP_SEED` override.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::ops::{Range, RangeInclusive};
use std::time::Duration;

/// Environment variable naming a JSON config file
pub const CONFIG_PATH_ENV: &str = "PIVOT_DESKTOP_CONFIG";

/// Environment variable overriding the random seed
pub const SEED_ENV: &str = "PIVOT_DESKTOP_SEED";

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
    pub completion: CompletionConfig,
    pub run_length: RunLengthConfig,
    pub sample_data: SampleDataConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            log_filter: "pivot_desktop=debug,pivot_desktop_lib=debug".to_string(),
            completion: CompletionConfig::default(),
            run_length: RunLengthConfig::default(),
            sample_data: SampleDataConfig::default(),
        }
    }
}

/// Simulated prediction round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Chance in [0, 1] that a run resolves as failed
    pub failure_probability: f64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 2_000,
            max_delay_ms: 6_000,
            failure_probability: 1.0 / 6.0,
        }
    }
}

impl CompletionConfig {
    pub fn delay_range(&self) -> RangeInclusive<Duration> {
        Duration::from_millis(self.min_delay_ms)..=Duration::from_millis(self.max_delay_ms)
    }
}

/// Accepted prediction lengths, in days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLengthConfig {
    pub min_days: u32,
    pub max_days: u32,
}

impl Default for RunLengthConfig {
    fn default() -> Self {
        Self {
            min_days: 1,
            max_days: 60,
        }
    }
}

impl RunLengthConfig {
    pub fn contains(&self, days: u32) -> bool {
        (self.min_days..=self.max_days).contains(&days)
    }

    /// Midpoint used when a draft carries no usable length
    pub fn default_days(&self) -> u32 {
        self.min_days + self.max_days.saturating_sub(self.min_days) / 2
    }
}

/// Shape of the generated startup data (half-open ranges)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleDataConfig {
    pub pivot_lists_min: usize,
    pub pivot_lists_max: usize,
    pub predictions_min: usize,
    pub predictions_max: usize,
}

impl Default for SampleDataConfig {
    fn default() -> Self {
        Self {
            pivot_lists_min: 3,
            pivot_lists_max: 10,
            predictions_min: 4,
            predictions_max: 8,
        }
    }
}

impl SampleDataConfig {
    pub fn pivot_lists(&self) -> Range<usize> {
        self.pivot_lists_min..self.pivot_lists_max
    }

    pub fn predictions(&self) -> Range<usize> {
        self.predictions_min..self.predictions_max
    }

    /// No sample data at all
    pub fn empty() -> Self {
        Self {
            pivot_lists_min: 0,
            pivot_lists_max: 0,
            predictions_min: 0,
            predictions_max: 0,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, overlaid by the environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                tracing::info!("Loading config from {}", path);
                let json = std::fs::read_to_string(&path)?;
                serde_json::from_str(&json)?
            }
            Err(_) => EngineConfig::default(),
        };

        if let Ok(seed) = std::env::var(SEED_ENV) {
            let seed = seed
                .trim()
                .parse::<u64>()
                .map_err(|e| AppError::Config(format!("{} is not a u64: {}", SEED_ENV, e)))?;
            config.seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let completion = &self.completion;
        if !(0.0..=1.0).contains(&completion.failure_probability) {
            return Err(AppError::Config(format!(
                "failure_probability must be within [0, 1], got {}",
                completion.failure_probability
            )));
        }
        if completion.min_delay_ms > completion.max_delay_ms {
            return Err(AppError::Config(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                completion.min_delay_ms, completion.max_delay_ms
            )));
        }
        if self.run_length.min_days == 0 || self.run_length.min_days > self.run_length.max_days {
            return Err(AppError::Config(format!(
                "invalid run length bounds {}..={}",
                self.run_length.min_days, self.run_length.max_days
            )));
        }
        let sample = &self.sample_data;
        if sample.pivot_lists_min > sample.pivot_lists_max
            || sample.predictions_min > sample.predictions_max
        {
            return Err(AppError::Config("sample data minimum exceeds maximum".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.completion.min_delay_ms, 2_000);
        assert!(config.run_length.contains(30));
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_json(
            r#"{"seed": 7, "completion": {"failure_probability": 0.0}}"#,
        )
        .unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.completion.failure_probability, 0.0);
        assert_eq!(config.completion.max_delay_ms, 6_000);
    }

    #[test]
    fn test_rejects_bad_probability() {
        let err = EngineConfig::from_json(r#"{"completion": {"failure_probability": 1.5}}"#)
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_rejects_inverted_delay() {
        let err = EngineConfig::from_json(
            r#"{"completion": {"min_delay_ms": 10, "max_delay_ms": 5}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = EngineConfig::from_json("{seed").unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_run_length_default_days() {
        let run_length = RunLengthConfig { min_days: 1, max_days: 60 };
        assert_eq!(run_length.default_days(), 30);
        assert!(!run_length.contains(0));
        assert!(!run_length.contains(61));
    }

    #[test]
    fn test_run_length_default_days_near_u32_max() {
        let run_length = RunLengthConfig { min_days: 10, max_days: u32::MAX };
        assert_eq!(run_length.default_days(), 10 + (u32::MAX - 10) / 2);
        assert!(run_length.contains(run_length.default_days()));
    }
}
