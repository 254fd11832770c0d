//! Linear scoring model over per-class density features.
//!
//! Model parameters live in a JSON weights file: an intercept, a map of
//! per-feature coefficients, and the score range the model was trained
//! against (1 to 5 by default, the selection scale curators annotate with).
//! Scores are clamped to that range so downstream thresholds always see
//! values on the expected scale.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::ScoringConfig;
use crate::core::stack;
use crate::scoring::features::{class_features, normalize_image, ClassFeatures, FEATURE_NAMES};
use crate::scoring::{ClassScorer, Result, ScoringError};

fn default_score_min() -> f32 {
    1.0
}

fn default_score_max() -> f32 {
    5.0
}

/// Trained model parameters loaded from a JSON weights file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelWeights {
    /// Intercept added to every prediction.
    pub bias: f32,
    /// Per-feature coefficients, keyed by feature name.
    #[serde(default)]
    pub weights: HashMap<String, f32>,
    /// Lower bound of the score scale.
    #[serde(default = "default_score_min")]
    pub score_min: f32,
    /// Upper bound of the score scale.
    #[serde(default = "default_score_max")]
    pub score_max: f32,
}

impl ModelWeights {
    /// Check that the score range is usable and every weighted feature is
    /// one the pipeline computes.
    fn validate(&self) -> Result<()> {
        if !self.score_min.is_finite()
            || !self.score_max.is_finite()
            || self.score_min > self.score_max
        {
            return Err(ScoringError::InvalidScoreRange {
                min: self.score_min,
                max: self.score_max,
            });
        }
        for name in self.weights.keys() {
            if !FEATURE_NAMES.contains(&name.as_str()) {
                return Err(ScoringError::UnknownFeature(name.clone()));
            }
        }
        Ok(())
    }
}

/// Production scorer applying `ModelWeights` to each class average.
#[derive(Debug, Clone)]
pub struct LinearModelScorer {
    weights: ModelWeights,
}

impl LinearModelScorer {
    /// Build a scorer from already-parsed weights.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFeature` if the weights reference a feature the
    /// pipeline does not compute, and `InvalidScoreRange` if the clamp
    /// bounds are inverted or non-finite.
    pub fn new(weights: ModelWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Load and validate a weights file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON weights file
    ///
    /// # Errors
    ///
    /// Returns `WeightsIo` if the file cannot be read, `WeightsFormat` if
    /// it is not valid JSON, and `UnknownFeature` or `InvalidScoreRange`
    /// for parameters the scorer cannot apply.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| ScoringError::WeightsIo {
            path: path.display().to_string(),
            source: e,
        })?;
        let weights: ModelWeights =
            serde_json::from_str(&raw).map_err(|e| ScoringError::WeightsFormat {
                path: path.display().to_string(),
                source: e,
            })?;
        Self::new(weights)
    }

    /// Score one class average from its scaled features.
    fn score_features(&self, features: &ClassFeatures) -> f32 {
        let mut score = self.weights.bias;
        // Accumulate in canonical feature order so repeated runs agree bit
        // for bit.
        for (name, value) in features.pairs() {
            if let Some(weight) = self.weights.weights.get(name) {
                score += weight * value;
            }
        }
        score.clamp(self.weights.score_min, self.weights.score_max)
    }
}

impl ClassScorer for LinearModelScorer {
    fn score_stack(&self, stack_path: &Path, config: &ScoringConfig) -> Result<Vec<f32>> {
        let images = stack::read_images(stack_path)?;

        let scores = images
            .iter()
            .map(|image| {
                let pixels = normalize_image(image, config.fixed_len);
                let features = class_features(&pixels).scaled(&config.feature_scale);
                self.score_features(&features)
            })
            .collect();

        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stack::write_test_stack;
    use tempfile::TempDir;

    fn weights_json(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("weights.json");
        fs::write(&path, content).unwrap();
        path
    }

    fn bias_only(bias: f32) -> ModelWeights {
        ModelWeights {
            bias,
            weights: HashMap::new(),
            score_min: 1.0,
            score_max: 5.0,
        }
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let path = weights_json(dir.path(), r#"{"bias": 2.0}"#);

        let scorer = LinearModelScorer::from_file(&path).unwrap();

        assert_eq!(scorer.weights.bias, 2.0);
        assert!(scorer.weights.weights.is_empty());
        assert_eq!(scorer.weights.score_min, 1.0);
        assert_eq!(scorer.weights.score_max, 5.0);
    }

    #[test]
    fn test_from_file_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");

        let result = LinearModelScorer::from_file(&path);

        assert!(matches!(result, Err(ScoringError::WeightsIo { .. })));
    }

    #[test]
    fn test_from_file_malformed() {
        let dir = TempDir::new().unwrap();
        let path = weights_json(dir.path(), "{not json");

        let result = LinearModelScorer::from_file(&path);

        assert!(matches!(result, Err(ScoringError::WeightsFormat { .. })));
    }

    #[test]
    fn test_unknown_feature_rejected_at_load() {
        let dir = TempDir::new().unwrap();
        let path = weights_json(
            dir.path(),
            r#"{"bias": 0.0, "weights": {"dmean_mass": 1.0, "curvature": 2.0}}"#,
        );

        match LinearModelScorer::from_file(&path) {
            Err(ScoringError::UnknownFeature(name)) => assert_eq!(name, "curvature"),
            other => panic!("expected UnknownFeature, got {:?}", other),
        }
    }

    #[test]
    fn test_inverted_score_range_rejected_at_load() {
        let dir = TempDir::new().unwrap();
        let path = weights_json(
            dir.path(),
            r#"{"bias": 3.0, "score_min": 5.0, "score_max": 1.0}"#,
        );

        match LinearModelScorer::from_file(&path) {
            Err(ScoringError::InvalidScoreRange { min, max }) => {
                assert_eq!(min, 5.0);
                assert_eq!(max, 1.0);
            }
            other => panic!("expected InvalidScoreRange, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_score_range_rejected() {
        let mut weights = bias_only(3.0);
        weights.score_max = f32::NAN;

        assert!(matches!(
            LinearModelScorer::new(weights),
            Err(ScoringError::InvalidScoreRange { .. })
        ));
    }

    #[test]
    fn test_bias_only_scores_every_image() {
        let dir = TempDir::new().unwrap();
        let stack = write_test_stack(
            dir.path(),
            "averages.mrc",
            4,
            4,
            &[vec![1.0; 16], vec![2.0; 16], vec![3.0; 16]],
        );
        let scorer = LinearModelScorer::new(bias_only(3.2)).unwrap();
        let config = ScoringConfig::default();

        let scores = scorer.score_stack(&stack, &config).unwrap();

        assert_eq!(scores, vec![3.2, 3.2, 3.2]);
    }

    #[test]
    fn test_scores_clamped_to_range() {
        let dir = TempDir::new().unwrap();
        let stack = write_test_stack(dir.path(), "averages.mrc", 2, 2, &[vec![0.0; 4]]);
        let config = ScoringConfig::default();

        let high = LinearModelScorer::new(bias_only(99.0)).unwrap();
        assert_eq!(high.score_stack(&stack, &config).unwrap(), vec![5.0]);

        let low = LinearModelScorer::new(bias_only(-99.0)).unwrap();
        assert_eq!(low.score_stack(&stack, &config).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_feature_weight_and_scale_applied() {
        let dir = TempDir::new().unwrap();
        // One flat image of density 2.0 at the fixed side length, so the
        // mean feature is exactly 2.0 before scaling.
        let config = ScoringConfig {
            feature_scale: [("dmean_mass".to_string(), 0.5f32)].into_iter().collect(),
            fixed_len: 4,
        };
        let stack = write_test_stack(dir.path(), "averages.mrc", 4, 4, &[vec![2.0; 16]]);

        let weights = ModelWeights {
            bias: 0.0,
            weights: [("dmean_mass".to_string(), 1.0f32)].into_iter().collect(),
            score_min: 0.0,
            score_max: 5.0,
        };
        let scorer = LinearModelScorer::new(weights).unwrap();

        let scores = scorer.score_stack(&stack, &config).unwrap();

        // mean 2.0 scaled by 0.5, weighted by 1.0.
        assert_eq!(scores, vec![1.0]);
    }

    #[test]
    fn test_missing_stack_surfaces_stack_error() {
        let dir = TempDir::new().unwrap();
        let scorer = LinearModelScorer::new(bias_only(3.0)).unwrap();
        let config = ScoringConfig::default();

        let result = scorer.score_stack(&dir.path().join("absent.mrc"), &config);

        assert!(matches!(result, Err(ScoringError::Stack(_))));
    }
}
