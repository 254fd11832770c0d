//! Artifact writers for the RELION-style output bundle.
//!
//! This module provides functions for writing the individual selection
//! artifacts:
//! - `_model.star` with one reference-image row per class and its score
//! - `_data.star` display metadata copied from the shipped template
//! - `score.txt` listing the rejected class indices
//! - `info.txt` recording the input job directory
//! - The class stack copy itself

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

/// Display-metadata template shipped with the binary. Written verbatim as
/// the `_data.star` artifact so RELION's display tools accept the bundle.
pub const DISPLAY_DATA_TEMPLATE: &str = include_str!("../../resources/display_data.star");

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to copy the class stack into the bundle.
    #[error("failed to copy class stack '{src}' to '{dest}': {source}")]
    CopyStack {
        src: String,
        dest: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Write the `_model.star` table mapping each class to its score.
///
/// The table declares `_rlnReferenceImage` and `_rlnClassPriorOffsetY`
/// columns. Each row references a class by its one-based slice ordinal in
/// the stack copy (`00001@<stack_ref>`) and carries the predicted score
/// with three decimals in the offset column, where downstream display
/// tools expect it.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `stack_ref` - Stack path recorded in each reference-image cell
/// * `scores` - Predicted score per class, in stack order
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_model_star(path: &Path, stack_ref: &str, scores: &[f32]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    let path_str = path.display().to_string();

    // Write STAR table header
    writeln!(writer, "data_model_classes").map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writeln!(writer).map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writeln!(writer, "loop_").map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writeln!(writer, "_rlnReferenceImage #1").map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writeln!(writer, "_rlnClassPriorOffsetY #2").map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;

    // Write one row per class, ordinals starting at 1
    for (index, score) in scores.iter().enumerate() {
        writeln!(writer, "{:05}@{} {:.3}", index + 1, stack_ref, score).map_err(|e| {
            WriteError::WriteFile {
                path: path_str.clone(),
                source: e,
            }
        })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the display-metadata `_data.star` artifact.
///
/// The content is fixed boilerplate taken from `template`; it exists so the
/// bundle forms a complete RELION select job that display tools will open.
pub fn write_data_star(path: &Path, template: &str) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    let path_str = path.display().to_string();

    writer
        .write_all(template.as_bytes())
        .map_err(|e| WriteError::WriteFile {
            path: path_str.clone(),
            source: e,
        })?;

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the rejected-class report.
///
/// One line per rejected class, `<zero-based index> <score>` with three
/// decimals, in stack order. An empty slice still produces the file so a
/// run that rejects nothing is distinguishable from a run that never got
/// this far.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `rejected` - Zero-based class indices with their scores
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_score_report(path: &Path, rejected: &[(usize, f32)]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    let path_str = path.display().to_string();

    for (index, score) in rejected {
        writeln!(writer, "{} {:.3}", index, score).map_err(|e| WriteError::WriteFile {
            path: path_str.clone(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the provenance note recording which job directory was assessed.
///
/// The file holds the single line `Input cryoSPARC directory: <dir>`
/// without a trailing newline.
pub fn write_info_file(path: &Path, input_dir: &Path) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    let path_str = path.display().to_string();

    write!(writer, "Input cryoSPARC directory: {}", input_dir.display()).map_err(|e| {
        WriteError::WriteFile {
            path: path_str.clone(),
            source: e,
        }
    })?;

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Copy the class stack into the bundle, byte for byte.
///
/// # Arguments
///
/// * `src` - Stack file inside the job directory
/// * `dest` - Destination path inside the output bundle
///
/// # Returns
///
/// The number of bytes copied.
///
/// # Errors
///
/// Returns an error if the copy fails.
pub fn copy_stack(src: &Path, dest: &Path) -> Result<u64> {
    ensure_parent_dirs(dest)?;
    fs::copy(src, dest).map_err(|e| WriteError::CopyStack {
        src: src.display().to_string(),
        dest: dest.display().to_string(),
        source: e,
    })
}
