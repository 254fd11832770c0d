//! Output bundle construction.
//!
//! Turns an ordered score sequence and a class stack into the five
//! selection artifacts: provenance note, stack copy, display metadata,
//! model metadata, and the rejected-class report. Index alignment between
//! scores and stack images is a checked precondition; the destructive
//! output-directory replacement only happens after it passes.

use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::core::stack::ClassStack;
use crate::core::writers::{self, WriteError};
use crate::pipeline::sink::OutputSink;

/// Errors that can occur while building the output bundle.
#[derive(Error, Debug)]
pub enum BundleError {
    /// The score sequence and the stack disagree on the class count.
    #[error("score count {scores} does not match stack image count {images}")]
    LengthMismatch { scores: usize, images: usize },

    /// An artifact could not be written.
    #[error("failed to write artifact: {0}")]
    Write(#[from] WriteError),

    /// The output directory could not be replaced.
    #[error("failed to prepare output directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bundle operations.
pub type Result<T> = std::result::Result<T, BundleError>;

/// Paths of the artifacts written into the output directory.
#[derive(Debug, Clone)]
pub struct OutputBundle {
    /// Copy of the class stack (`<stem>_classes.mrcs`).
    pub stack_copy: PathBuf,
    /// Model metadata table (`<stem>_model.star`).
    pub model_star: PathBuf,
    /// Display metadata copy (`<stem>_data.star`).
    pub data_star: PathBuf,
    /// Rejected-class report (`score.txt`).
    pub score_report: PathBuf,
    /// Provenance note (`info.txt`).
    pub info_file: PathBuf,
    /// Number of classes that fell below the threshold.
    pub num_rejected: usize,
}

/// Indices and scores of classes strictly below the threshold.
///
/// Order follows the stack; a score exactly equal to the threshold is
/// kept, not rejected.
pub fn rejected_classes(scores: &[f32], threshold: f32) -> Vec<(usize, f32)> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, &score)| score < threshold)
        .map(|(index, &score)| (index, score))
        .collect()
}

/// Build the output bundle for one scored class stack.
///
/// The score count must equal the stack's image count; on mismatch this
/// fails before the sink touches the output directory, so existing output
/// survives a bad scoring run. Artifacts are written in a fixed order:
/// provenance note, stack copy, display metadata, model metadata, score
/// report. Writes are full overwrites with no partial-write recovery; a
/// failure mid-bundle leaves a partially populated directory.
///
/// # Arguments
///
/// * `stack` - Discovered class stack
/// * `scores` - One score per class, in stack order
/// * `threshold` - Scores strictly below this are reported as rejected
/// * `input_dir` - Job directory recorded in the provenance note
/// * `output_dir` - Bundle destination, destructively replaced via `sink`
/// * `template` - Contents written verbatim as the display metadata
/// * `sink` - Output-directory lifecycle
///
/// # Errors
///
/// Returns `LengthMismatch` before any output mutation when scores and
/// images disagree, otherwise surfaces the first replace or write failure.
pub fn build_output_bundle(
    stack: &ClassStack,
    scores: &[f32],
    threshold: f32,
    input_dir: &Path,
    output_dir: &Path,
    template: &str,
    sink: &dyn OutputSink,
) -> Result<OutputBundle> {
    if scores.len() != stack.num_images() {
        return Err(BundleError::LengthMismatch {
            scores: scores.len(),
            images: stack.num_images(),
        });
    }

    sink.replace(output_dir)?;

    let info_file = output_dir.join("info.txt");
    writers::write_info_file(&info_file, input_dir)?;

    let stack_copy = output_dir.join(stack.output_stack_name());
    let copied = writers::copy_stack(&stack.path, &stack_copy)?;
    debug!("Copied {} bytes to {}", copied, stack_copy.display());

    let data_star = output_dir.join(format!("{}_data.star", stack.stem));
    writers::write_data_star(&data_star, template)?;

    // Rows reference the stack copy through the output directory as the
    // caller spelled it, matching what downstream display tools resolve.
    let stack_ref = format!("{}/{}", output_dir.display(), stack.output_stack_name());
    let model_star = output_dir.join(format!("{}_model.star", stack.stem));
    writers::write_model_star(&model_star, &stack_ref, scores)?;

    let rejected = rejected_classes(scores, threshold);
    let score_report = output_dir.join("score.txt");
    writers::write_score_report(&score_report, &rejected)?;

    Ok(OutputBundle {
        stack_copy,
        model_star,
        data_star,
        score_report,
        info_file,
        num_rejected: rejected.len(),
    })
}
