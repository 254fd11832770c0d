//! Assessment orchestration.
//!
//! Sequences one run end to end: validate the job record, locate the class
//! stack, score every class, then build the output bundle. Scoring always
//! completes before any artifact is written, so the metadata table's row
//! count is known up front. Runs are single-threaded and not retried; the
//! first failure is terminal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::stack;
use crate::core::writers::DISPLAY_DATA_TEMPLATE;
use crate::pipeline::bundle::build_output_bundle;
use crate::pipeline::sink::OutputSink;
use crate::scoring::ClassScorer;

/// Errors raised by job validation.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("input directory does not exist: {0}")]
    MissingInput(PathBuf),

    #[error("weights file does not exist: {0}")]
    MissingWeights(PathBuf),
}

/// Description of one assessment run.
///
/// Holds the validated configuration record the orchestrator consumes:
/// where the job lives, which weights to score with, where the bundle
/// goes, and the selection threshold.
#[derive(Debug, Clone)]
pub struct AssessmentJob {
    /// cryoSPARC job directory containing exactly one class stack.
    pub input_dir: PathBuf,
    /// Trained model weights file.
    pub weights: PathBuf,
    /// Bundle destination. Destructively replaced on each run.
    pub output_dir: PathBuf,
    /// Scores strictly below this value are reported as rejected.
    pub threshold: f32,
}

impl AssessmentJob {
    /// Check that the input paths exist.
    ///
    /// Runs before any output mutation, so a mistyped path never costs an
    /// existing output directory.
    pub fn validate(&self) -> std::result::Result<(), JobError> {
        if !self.input_dir.exists() {
            return Err(JobError::MissingInput(self.input_dir.clone()));
        }
        if !self.weights.exists() {
            return Err(JobError::MissingWeights(self.weights.clone()));
        }
        Ok(())
    }
}

/// Summary of a completed run, for reporting.
#[derive(Debug, Clone)]
pub struct AssessmentSummary {
    /// Stack file that was assessed.
    pub stack_path: PathBuf,
    /// Number of class images scored.
    pub num_classes: usize,
    /// Number of classes below the threshold.
    pub num_rejected: usize,
    /// Threshold the selection used.
    pub threshold: f32,
    /// Directory the bundle was written to.
    pub output_dir: PathBuf,
}

/// Run one assessment end to end.
///
/// # Arguments
///
/// * `job` - Validated run description
/// * `config` - Pipeline configuration (scoring parameters)
/// * `scorer` - Scoring capability applied to the stack
/// * `sink` - Output-directory lifecycle for the bundle
///
/// # Returns
///
/// A summary of what was scored, rejected, and written.
///
/// # Errors
///
/// Fails on invalid job paths, a missing or ambiguous class stack, scoring
/// failures, score/image count mismatch, or artifact write failures. All
/// failures are terminal for the run; only failures after the bundle
/// builder's precondition checks can leave partial output behind.
pub fn run_assessment<S: ClassScorer>(
    job: &AssessmentJob,
    config: &PipelineConfig,
    scorer: &S,
    sink: &dyn OutputSink,
) -> Result<AssessmentSummary> {
    job.validate()?;

    let stack = stack::find_class_stack(&job.input_dir).with_context(|| {
        format!(
            "failed to locate class stack in {}",
            job.input_dir.display()
        )
    })?;
    info!(
        "Found class stack {} with {} images",
        stack.path.display(),
        stack.num_images()
    );

    let scores = scorer
        .score_stack(&stack.path, &config.scoring)
        .with_context(|| format!("failed to score {}", stack.path.display()))?;
    debug!("Predicted scores: {:?}", scores);

    let bundle = build_output_bundle(
        &stack,
        &scores,
        job.threshold,
        &job.input_dir,
        &job.output_dir,
        DISPLAY_DATA_TEMPLATE,
        sink,
    )
    .with_context(|| {
        format!(
            "failed to write output bundle to {}",
            job.output_dir.display()
        )
    })?;
    info!(
        "Rejected {} of {} classes below threshold {}",
        bundle.num_rejected,
        scores.len(),
        job.threshold
    );

    Ok(AssessmentSummary {
        stack_path: stack.path,
        num_classes: scores.len(),
        num_rejected: bundle.num_rejected,
        threshold: job.threshold,
        output_dir: job.output_dir.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stack::write_test_stack;
    use crate::pipeline::sink::ReplaceDirSink;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Fixed-score fake driving the pipeline without a model.
    struct FixedScorer(Vec<f32>);

    impl ClassScorer for FixedScorer {
        fn score_stack(
            &self,
            _stack_path: &Path,
            _config: &crate::config::ScoringConfig,
        ) -> crate::scoring::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn job(dir: &Path, threshold: f32) -> AssessmentJob {
        AssessmentJob {
            input_dir: dir.join("job"),
            weights: dir.join("weights.json"),
            output_dir: dir.join("out"),
            threshold,
        }
    }

    fn setup_inputs(dir: &Path, images: usize) {
        let job_dir = dir.join("job");
        fs::create_dir(&job_dir).unwrap();
        let stack: Vec<Vec<f32>> = (0..images).map(|i| vec![i as f32; 16]).collect();
        write_test_stack(&job_dir, "class_averages.mrc", 4, 4, &stack);
        fs::write(dir.join("weights.json"), r#"{"bias": 3.0}"#).unwrap();
    }

    #[test]
    fn test_validate_missing_input() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("weights.json"), "{}").unwrap();

        let result = job(dir.path(), 3.0).validate();

        assert!(matches!(result, Err(JobError::MissingInput(_))));
    }

    #[test]
    fn test_validate_missing_weights() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("job")).unwrap();

        let result = job(dir.path(), 3.0).validate();

        assert!(matches!(result, Err(JobError::MissingWeights(_))));
    }

    #[test]
    fn test_run_assessment_writes_bundle() {
        let dir = TempDir::new().unwrap();
        setup_inputs(dir.path(), 3);
        let job = job(dir.path(), 3.0);
        let scorer = FixedScorer(vec![1.2, 4.5, 2.9]);

        let summary = run_assessment(&job, &PipelineConfig::default(), &scorer, &ReplaceDirSink)
            .unwrap();

        assert_eq!(summary.num_classes, 3);
        assert_eq!(summary.num_rejected, 2);
        assert_eq!(summary.output_dir, job.output_dir);

        let report = fs::read_to_string(job.output_dir.join("score.txt")).unwrap();
        assert_eq!(report, "0 1.200\n2 2.900\n");
        assert!(job
            .output_dir
            .join("class_averages_classes.mrcs")
            .exists());
        assert!(job.output_dir.join("class_averages_model.star").exists());
        assert!(job.output_dir.join("class_averages_data.star").exists());
        assert!(job.output_dir.join("info.txt").exists());
    }

    #[test]
    fn test_run_assessment_ambiguous_stack_no_output() {
        let dir = TempDir::new().unwrap();
        setup_inputs(dir.path(), 2);
        write_test_stack(
            &dir.path().join("job"),
            "second_stack.mrc",
            4,
            4,
            &[vec![0.0; 16]],
        );
        let job = job(dir.path(), 3.0);
        let scorer = FixedScorer(vec![3.0, 3.0]);

        let result = run_assessment(&job, &PipelineConfig::default(), &scorer, &ReplaceDirSink);

        assert!(result.is_err());
        assert!(!job.output_dir.exists());
    }

    #[test]
    fn test_run_assessment_length_mismatch_no_output() {
        let dir = TempDir::new().unwrap();
        setup_inputs(dir.path(), 3);
        let job = job(dir.path(), 3.0);
        let scorer = FixedScorer(vec![1.0]);

        let result = run_assessment(&job, &PipelineConfig::default(), &scorer, &ReplaceDirSink);

        assert!(result.is_err());
        assert!(!job.output_dir.exists());
    }

    #[test]
    fn test_run_assessment_missing_input_no_output() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("weights.json"), "{}").unwrap();
        let job = job(dir.path(), 3.0);
        let scorer = FixedScorer(vec![]);

        let result = run_assessment(&job, &PipelineConfig::default(), &scorer, &ReplaceDirSink);

        assert!(result.is_err());
        assert!(!job.output_dir.exists());
    }
}
