//! Configuration types for the assessment pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Configuration for the scoring stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Scale factors applied to features before the model weights
    #[serde(default = "default_feature_scale")]
    pub feature_scale: HashMap<String, f32>,

    /// Side length in pixels that class images are normalized to
    #[serde(default = "default_fixed_len")]
    pub fixed_len: usize,
}

fn default_feature_scale() -> HashMap<String, f32> {
    let mut scale = HashMap::new();
    scale.insert("dmean_mass".to_string(), 1e-8);
    scale.insert("dmedian_mass".to_string(), 1e-8);
    scale.insert("dmode_mass".to_string(), 1e-8);
    scale
}

fn default_fixed_len() -> usize {
    210
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            feature_scale: default_feature_scale(),
            fixed_len: default_fixed_len(),
        }
    }
}

/// Configuration for threshold selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Scores strictly below this value mark a class as rejected (1-5 scale)
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_threshold() -> f32 {
    3.0
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub selection: SelectionConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scoring_config() {
        let config = ScoringConfig::default();
        assert_eq!(config.fixed_len, 210);
        assert_eq!(config.feature_scale.get("dmean_mass"), Some(&1e-8));
        assert_eq!(config.feature_scale.get("dmode_mass"), Some(&1e-8));
        assert_eq!(config.feature_scale.len(), 3);
    }

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.selection.threshold, 3.0);
        assert_eq!(config.scoring.fixed_len, 210);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: PipelineConfig =
            serde_yaml::from_str("selection:\n  threshold: 2.5\n").unwrap();
        assert_eq!(config.selection.threshold, 2.5);
        assert_eq!(config.scoring.fixed_len, 210);
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = PipelineConfig {
            scoring: ScoringConfig {
                fixed_len: 128,
                ..Default::default()
            },
            selection: SelectionConfig { threshold: 2.0 },
        };

        config.to_yaml(&path).unwrap();
        let loaded = PipelineConfig::from_yaml(&path).unwrap();

        assert_eq!(loaded.selection.threshold, 2.0);
        assert_eq!(loaded.scoring.fixed_len, 128);
    }
}
