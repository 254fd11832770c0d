//! Scoring and selection pipeline for cryo-EM 2D class averages.
//!
//! This crate provides tools for:
//! - Locating and reading the class-average MRC stack in a cryoSPARC job
//!   directory
//! - Scoring every class average with a pretrained model (pluggable scorer)
//! - Writing a RELION-style selection bundle: stack copy, STAR metadata,
//!   and a thresholded rejection report
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use class2d_pipeline::pipeline::{run_assessment, AssessmentJob, ReplaceDirSink};
//! use class2d_pipeline::scoring::LinearModelScorer;
//! use class2d_pipeline::PipelineConfig;
//!
//! let job = AssessmentJob {
//!     input_dir: PathBuf::from("J42"),
//!     weights: PathBuf::from("final_model.json"),
//!     output_dir: PathBuf::from("J42_assessed"),
//!     threshold: 3.0,
//! };
//! let scorer = LinearModelScorer::from_file(&job.weights).unwrap();
//! let summary =
//!     run_assessment(&job, &PipelineConfig::default(), &scorer, &ReplaceDirSink).unwrap();
//! println!("rejected {} of {}", summary.num_rejected, summary.num_classes);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod scoring;

pub use config::{PipelineConfig, ScoringConfig, SelectionConfig};
pub use crate::core::stack::{ClassImage, ClassStack, MrcHeader};
pub use pipeline::{AssessmentJob, AssessmentSummary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
