//! Tunable thresholds for every stage of the pipeline.
//!
//! All fields have serde defaults, so a config file only needs to name the
//! values it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{FormsError, FormsResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub geometry: GeometryConfig,
    pub labels: LabelConfig,
    pub selectors: SelectorConfig,
    pub scheduler: SchedulerConfig,
}

impl ExtractionConfig {
    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> FormsResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| FormsError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make scoring divide by zero or never fire.
    pub fn validate(&self) -> FormsResult<()> {
        if self.geometry.max_vertical_distance <= 0.0 || self.geometry.max_horizontal_distance <= 0.0 {
            return Err(FormsError::Config(
                "geometry distances must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.labels.early_exit_threshold) {
            return Err(FormsError::Config(
                "labels.early_exit_threshold must lie in [0, 1]".to_string(),
            ));
        }
        if self.scheduler.debounce_ms == 0 || self.scheduler.max_delay_ms == 0 {
            return Err(FormsError::Config(
                "scheduler delays must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Geometric plausibility parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub same_row_tolerance: f64,
    pub max_vertical_distance: f64,
    pub max_horizontal_distance: f64,
    pub proximity_threshold: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            same_row_tolerance: 10.0,
            max_vertical_distance: 100.0,
            max_horizontal_distance: 300.0,
            proximity_threshold: 0.6,
        }
    }
}

/// Label strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// First strategy whose confidence exceeds this wins.
    pub early_exit_threshold: f64,
    pub wrapping_label_depth: usize,
    pub ancestor_text_depth: usize,
    pub ancestor_text_min_len: usize,
    pub ancestor_text_max_len: usize,
    pub search_root_depth: usize,
    pub search_root_min_height: f64,
    pub neighbor_text_max_len: usize,
    pub neighbor_candidates: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            early_exit_threshold: 0.7,
            wrapping_label_depth: 3,
            ancestor_text_depth: 5,
            ancestor_text_min_len: 2,
            ancestor_text_max_len: 50,
            search_root_depth: 5,
            search_root_min_height: 200.0,
            neighbor_text_max_len: 99,
            neighbor_candidates: 10,
        }
    }
}

/// Selector generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub helper_timeout_ms: u64,
    pub helper_confidence: f64,
    pub max_fallbacks: usize,
}

impl SelectorConfig {
    pub fn helper_timeout(&self) -> Duration {
        Duration::from_millis(self.helper_timeout_ms)
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            helper_timeout_ms: 1000,
            helper_confidence: 0.8,
            max_fallbacks: 3,
        }
    }
}

/// Debounce and rate-limit parameters for the extraction manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub debounce_ms: u64,
    pub max_delay_ms: u64,
    pub min_interval_ms: u64,
    /// Batches with more records than this are treated as bulk re-renders.
    pub bulk_mutation_limit: usize,
    /// Whether the host delivers mutation notifications at all.
    pub observe_mutations: bool,
}

impl SchedulerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_delay_ms: 2000,
            min_interval_ms: 1000,
            bulk_mutation_limit: 100,
            observe_mutations: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.labels.early_exit_threshold, 0.7);
        assert_eq!(config.scheduler.debounce(), Duration::from_millis(300));
        assert_eq!(config.selectors.helper_timeout(), Duration::from_millis(1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"scheduler": {{"debounce_ms": 50}}}}"#).unwrap();

        let config = ExtractionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.scheduler.debounce_ms, 50);
        assert_eq!(config.scheduler.max_delay_ms, 2000);
        assert_eq!(config.geometry, GeometryConfig::default());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"geometry": {{"max_vertical_distance": 0}}}}"#).unwrap();
        assert!(matches!(
            ExtractionConfig::from_file(file.path()),
            Err(FormsError::Config(_))
        ));

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        write!(garbage, "not json").unwrap();
        assert!(ExtractionConfig::from_file(garbage.path()).is_err());
    }
}
