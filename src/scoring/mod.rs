//! Class-average scoring.
//!
//! The pipeline treats the trained model as an opaque scoring function with
//! a fixed contract: given a stack path and the scoring configuration,
//! produce one score per class image in stack order. The `ClassScorer`
//! trait is that contract; `LinearModelScorer` is the production
//! implementation, driven by a JSON weights file over per-class density
//! features.

pub mod features;
pub mod linear;

use std::path::Path;

use thiserror::Error;

use crate::config::ScoringConfig;
use crate::core::stack::StackError;

pub use features::{class_features, normalize_image, ClassFeatures, FEATURE_NAMES};
pub use linear::{LinearModelScorer, ModelWeights};

/// Errors that can occur while scoring a class stack.
#[derive(Error, Debug)]
pub enum ScoringError {
    /// The class stack could not be read.
    #[error("failed to read class stack: {0}")]
    Stack(#[from] StackError),

    /// The weights file could not be read.
    #[error("failed to read weights file '{path}': {source}")]
    WeightsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The weights file is not valid JSON or misses required fields.
    #[error("failed to parse weights file '{path}': {source}")]
    WeightsFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The weights file names a feature the pipeline does not compute.
    #[error("weights file references unknown feature '{0}'")]
    UnknownFeature(String),

    /// The weights file declares a score range no score can be clamped to.
    #[error("weights file declares invalid score range [{min}, {max}]")]
    InvalidScoreRange { min: f32, max: f32 },
}

/// Result type for scoring operations.
pub type Result<T> = std::result::Result<T, ScoringError>;

/// Scoring capability over a class-average stack.
///
/// Implementations must return exactly one score per image, in stack order,
/// without reordering. The bundle builder enforces the length contract
/// against the stack's image count.
pub trait ClassScorer {
    /// Score every class image in the stack at `stack_path`.
    fn score_stack(&self, stack_path: &Path, config: &ScoringConfig) -> Result<Vec<f32>>;
}
