//! Run configuration
//!
//! Declarative parameter set with rule-based validation and JSON
//! persistence. Fields left out of a config file fall back to defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters governing a zoning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoningConfig {
    /// Seed for clustering and sampling streams
    pub seed: u64,
    /// Upper bound for automatic cluster-count selection
    pub max_zones: usize,
    /// Zones smaller than this are filtered out (hectares)
    pub min_zone_area_ha: f64,
    /// Lower bound on sampling points placed per zone
    pub min_points_per_zone: usize,
    /// Minimum acceptable fraction of finite pixels per index
    pub quality_threshold: f64,
}

impl Default for ZoningConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_zones: 15,
            min_zone_area_ha: 0.5,
            min_points_per_zone: 5,
            quality_threshold: 0.7,
        }
    }
}

impl ZoningConfig {
    /// Check every declarative rule and report all violations at once, so a
    /// bad config file surfaces every problem in a single run.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();

        if self.max_zones < 2 || self.max_zones > 50 {
            violations.push(format!(
                "max_zones must be in [2, 50], got {}",
                self.max_zones
            ));
        }
        if self.min_zone_area_ha.is_nan() || self.min_zone_area_ha <= 0.0 {
            violations.push(format!(
                "min_zone_area_ha must be positive, got {}",
                self.min_zone_area_ha
            ));
        }
        if self.min_points_per_zone < 1 {
            violations.push(format!(
                "min_points_per_zone must be at least 1, got {}",
                self.min_points_per_zone
            ));
        }
        if self.quality_threshold.is_nan()
            || self.quality_threshold <= 0.0
            || self.quality_threshold > 1.0
        {
            violations.push(format!(
                "quality_threshold must be in (0, 1], got {}",
                self.quality_threshold
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(violations.join("; ")))
        }
    }

    /// Load a config from a JSON file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ZoningConfig::default().validate().is_ok());
    }

    #[test]
    fn test_all_violations_reported_together() {
        let config = ZoningConfig {
            max_zones: 1,
            min_zone_area_ha: -0.5,
            min_points_per_zone: 0,
            quality_threshold: 1.5,
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_zones"));
        assert!(err.contains("min_zone_area_ha"));
        assert!(err.contains("min_points_per_zone"));
        assert!(err.contains("quality_threshold"));
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let config = ZoningConfig {
            quality_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: ZoningConfig = serde_json::from_str(r#"{"max_zones": 8}"#).unwrap();
        assert_eq!(config.max_zones, 8);
        assert_eq!(config.seed, 42);
        assert_eq!(config.min_points_per_zone, 5);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "agrozone_config_{}.json",
            std::process::id()
        ));
        let config = ZoningConfig {
            seed: 7,
            max_zones: 10,
            ..Default::default()
        };
        config.to_file(&path).unwrap();
        let loaded = ZoningConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config, loaded);
    }
}
