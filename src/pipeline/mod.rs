//! Assessment pipeline modules.

pub mod assess;
pub mod bundle;
pub mod sink;

// Re-export key types for convenience
pub use assess::{run_assessment, AssessmentJob, AssessmentSummary, JobError};
pub use bundle::{build_output_bundle, rejected_classes, BundleError, OutputBundle};
pub use sink::{OutputSink, ReplaceDirSink};
