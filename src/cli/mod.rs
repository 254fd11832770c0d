//! Command-line interface for the assessment pipeline.

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::pipeline::{run_assessment, AssessmentJob, ReplaceDirSink};
use crate::scoring::LinearModelScorer;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "class2d-pipeline")]
#[command(about = "Assess cryoSPARC 2D class averages", version)]
pub struct Cli {
    /// cryoSPARC job directory containing the class-average stack
    #[arg(short, long, value_name = "DIRECTORY")]
    input: PathBuf,

    /// Pre-trained model weights file
    #[arg(short, long, value_name = "FILE")]
    weights: PathBuf,

    /// Output directory for the selection bundle (replaced if it exists)
    #[arg(short, long, value_name = "DIRECTORY")]
    output: PathBuf,

    /// Threshold for selection on the 1-5 scale (defaults to config value)
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Path to YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let truncated: String = value.chars().take(36).collect();
            format!("{}...", truncated)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    let start = Instant::now();

    // CLI threshold wins over the config value
    let threshold = cli.threshold.unwrap_or(config.selection.threshold);

    let job = AssessmentJob {
        input_dir: cli.input,
        weights: cli.weights,
        output_dir: cli.output,
        threshold,
    };

    if let Err(e) = job.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    let scorer = match LinearModelScorer::from_file(&job.weights) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load model weights: {}", e);
            std::process::exit(1);
        }
    };

    println!("Assessing 2D class averages...");
    println!("Input directory: {}", job.input_dir.display());
    println!("Output directory: {}", job.output_dir.display());
    println!("Selection threshold: {}", threshold);

    let spinner = create_spinner("Scoring class averages...");

    match run_assessment(&job, &config, &scorer, &ReplaceDirSink) {
        Ok(summary) => {
            spinner.finish_and_clear();

            print_summary(
                "Assessment Complete",
                &[
                    ("Class stack", summary.stack_path.display().to_string()),
                    ("Classes scored", summary.num_classes.to_string()),
                    ("Classes rejected", summary.num_rejected.to_string()),
                    ("Threshold", summary.threshold.to_string()),
                    ("Output directory", summary.output_dir.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Assessment failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
