//! Class-average stack discovery and MRC reading.
//!
//! This module provides the input side of the pipeline:
//! - Locating the single `.mrc` class-average stack inside a cryoSPARC job
//!   directory
//! - Parsing MRC headers (dimensions, image count, pixel mode)
//! - Loading per-class images as f32 pixel buffers
//!
//! Only little-endian MRC files are supported, in modes 0 (i8), 1 (i16),
//! 2 (f32) and 6 (u16). cryoSPARC writes class averages as mode 2.

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fixed size of the MRC main header.
const MRC_HEADER_LEN: usize = 1024;

/// Errors that can occur while locating or reading a class stack.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no .mrc class stack found in {0}")]
    NotFound(PathBuf),

    #[error("found {count} .mrc stacks in {dir}, expected exactly one")]
    Ambiguous { dir: PathBuf, count: usize },

    #[error("invalid MRC header in {path}: {reason}")]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("unsupported MRC mode {mode} in {path}")]
    UnsupportedMode { path: PathBuf, mode: i32 },

    #[error("class stack {0} contains no images")]
    Empty(PathBuf),

    #[error("class stack {path} is truncated: expected {expected} data bytes, found {found}")]
    Truncated {
        path: PathBuf,
        expected: u64,
        found: u64,
    },
}

/// Result type for stack operations.
pub type Result<T> = std::result::Result<T, StackError>;

/// Parsed MRC main-header fields relevant to class stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MrcHeader {
    /// Image width in pixels.
    pub nx: i32,
    /// Image height in pixels.
    pub ny: i32,
    /// Number of sections; for a class stack, the number of images.
    pub nz: i32,
    /// Pixel storage mode (0, 1, 2 or 6).
    pub mode: i32,
    /// Size of the extended header in bytes.
    pub nsymbt: i32,
}

impl MrcHeader {
    /// Returns the number of images in the stack.
    #[inline]
    pub fn num_images(&self) -> usize {
        self.nz as usize
    }

    /// Returns the number of pixels in one image.
    #[inline]
    pub fn image_pixels(&self) -> usize {
        self.nx as usize * self.ny as usize
    }

    /// Returns the storage size of one pixel in bytes.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        match self.mode {
            0 => 1,
            1 | 6 => 2,
            _ => 4,
        }
    }

    /// Returns the file offset at which pixel data begins.
    #[inline]
    pub fn data_offset(&self) -> u64 {
        MRC_HEADER_LEN as u64 + self.nsymbt as u64
    }

    /// Returns the total pixel-data size the header implies.
    #[inline]
    pub fn data_len(&self) -> u64 {
        self.num_images() as u64 * self.image_pixels() as u64 * self.bytes_per_pixel() as u64
    }
}

/// A single class-average image with its pixels in row-major order.
#[derive(Debug, Clone)]
pub struct ClassImage {
    /// Image width in pixels.
    pub nx: usize,
    /// Image height in pixels.
    pub ny: usize,
    /// Pixel densities, `ny` rows of `nx` values.
    pub pixels: Vec<f32>,
}

/// A discovered class-average stack, validated to be readable and non-empty.
#[derive(Debug, Clone)]
pub struct ClassStack {
    /// Path of the stack file inside the job directory.
    pub path: PathBuf,
    /// Filename stem of the stack, used to derive output artifact names.
    pub stem: String,
    /// Parsed MRC header.
    pub header: MrcHeader,
}

impl ClassStack {
    /// Returns the number of class images in the stack.
    #[inline]
    pub fn num_images(&self) -> usize {
        self.header.num_images()
    }

    /// Returns the filename under which the stack copy is written into the
    /// output bundle (`<stem>_classes.mrcs`, the RELION stack convention).
    pub fn output_stack_name(&self) -> String {
        format!("{}_classes.mrcs", self.stem)
    }
}

fn invalid_header(path: &Path, reason: impl Into<String>) -> StackError {
    StackError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_i32_le(buf: &[u8], offset: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_le_bytes(word)
}

/// Read and validate the MRC header of a stack file.
///
/// # Arguments
///
/// * `path` - Path to the MRC file
///
/// # Errors
///
/// Returns an error if the file cannot be read, is shorter than the
/// 1024-byte header, carries a big-endian machine stamp, declares
/// non-positive dimensions, or uses an unsupported pixel mode.
pub fn read_header(path: &Path) -> Result<MrcHeader> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; MRC_HEADER_LEN];
    file.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            invalid_header(path, "file is shorter than the 1024-byte MRC header")
        } else {
            StackError::Io(e)
        }
    })?;

    // Machine stamp (bytes 212..216): 0x44 marks little-endian, 0x11 big-endian.
    if buf[212] == 0x11 {
        return Err(invalid_header(path, "big-endian MRC files are not supported"));
    }

    let nx = read_i32_le(&buf, 0);
    let ny = read_i32_le(&buf, 4);
    let nz = read_i32_le(&buf, 8);
    let mode = read_i32_le(&buf, 12);
    let nsymbt = read_i32_le(&buf, 92);

    if nx <= 0 || ny <= 0 {
        return Err(invalid_header(
            path,
            format!("non-positive image dimensions {}x{}", nx, ny),
        ));
    }
    if nz < 0 {
        return Err(invalid_header(path, format!("negative section count {}", nz)));
    }
    if nsymbt < 0 {
        return Err(invalid_header(
            path,
            format!("negative extended header size {}", nsymbt),
        ));
    }
    if !matches!(mode, 0 | 1 | 2 | 6) {
        return Err(StackError::UnsupportedMode {
            path: path.to_path_buf(),
            mode,
        });
    }

    Ok(MrcHeader {
        nx,
        ny,
        nz,
        mode,
        nsymbt,
    })
}

/// Decode one image worth of raw pixel bytes into f32 densities.
fn decode_pixels(raw: &[u8], mode: i32) -> Vec<f32> {
    match mode {
        0 => raw.iter().map(|&b| b as i8 as f32).collect(),
        1 => raw
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32)
            .collect(),
        6 => raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as f32)
            .collect(),
        _ => raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

/// Load every class image from a stack file.
///
/// Images are returned in stack order (section 0 first).
///
/// # Arguments
///
/// * `path` - Path to the MRC stack file
///
/// # Returns
///
/// One `ClassImage` per section declared in the header.
///
/// # Errors
///
/// Returns an error if the header is invalid or the file holds fewer data
/// bytes than the header declares.
pub fn read_images(path: &Path) -> Result<Vec<ClassImage>> {
    let header = read_header(path)?;

    let available = fs::metadata(path)?.len().saturating_sub(header.data_offset());
    if available < header.data_len() {
        return Err(StackError::Truncated {
            path: path.to_path_buf(),
            expected: header.data_len(),
            found: available,
        });
    }

    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    reader.seek(SeekFrom::Start(header.data_offset()))?;

    let image_bytes = header.image_pixels() * header.bytes_per_pixel();
    let mut raw = vec![0u8; image_bytes];
    let mut images = Vec::with_capacity(header.num_images());

    for _ in 0..header.num_images() {
        reader.read_exact(&mut raw)?;
        images.push(ClassImage {
            nx: header.nx as usize,
            ny: header.ny as usize,
            pixels: decode_pixels(&raw, header.mode),
        });
    }

    Ok(images)
}

/// Locate the single class-average stack inside a job directory.
///
/// Scans `dir` for files with the `.mrc` extension (case-insensitive).
/// Exactly one must exist; zero or multiple candidates is an error, so a
/// wrong or mixed-up job directory is caught before any scoring happens.
///
/// # Arguments
///
/// * `dir` - cryoSPARC job directory
///
/// # Returns
///
/// A validated `ClassStack` with its header parsed and a non-zero image
/// count.
///
/// # Errors
///
/// Returns `NotFound`/`Ambiguous` for a candidate count other than one,
/// `Empty` for a stack declaring zero images, and header errors for an
/// unreadable stack file.
pub fn find_class_stack(dir: &Path) -> Result<ClassStack> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("mrc"))
                    .unwrap_or(false)
        })
        .collect();

    candidates.sort();

    match candidates.len() {
        0 => Err(StackError::NotFound(dir.to_path_buf())),
        1 => {
            let path = candidates.remove(0);
            let header = read_header(&path)?;
            if header.num_images() == 0 {
                return Err(StackError::Empty(path));
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            Ok(ClassStack { path, stem, header })
        }
        count => Err(StackError::Ambiguous {
            dir: dir.to_path_buf(),
            count,
        }),
    }
}

/// Write a little-endian mode-2 MRC stack with the given images.
///
/// Test fixture shared by the scoring and pipeline test modules.
#[cfg(test)]
pub(crate) fn write_test_stack(
    dir: &Path,
    name: &str,
    nx: i32,
    ny: i32,
    images: &[Vec<f32>],
) -> PathBuf {
    use std::io::Write;

    let path = dir.join(name);
    let mut header = [0u8; MRC_HEADER_LEN];
    header[0..4].copy_from_slice(&nx.to_le_bytes());
    header[4..8].copy_from_slice(&ny.to_le_bytes());
    header[8..12].copy_from_slice(&(images.len() as i32).to_le_bytes());
    header[12..16].copy_from_slice(&2i32.to_le_bytes());
    header[208..212].copy_from_slice(b"MAP ");
    header[212] = 0x44;
    header[213] = 0x44;

    let mut file = File::create(&path).unwrap();
    file.write_all(&header).unwrap();
    for image in images {
        for value in image {
            file.write_all(&value.to_le_bytes()).unwrap();
        }
    }
    path
}
