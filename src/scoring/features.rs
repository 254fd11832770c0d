//! Per-class density features.
//!
//! Each class average is normalized to a fixed square side length (center
//! crop for larger images, zero padding for smaller ones) and summarized by
//! six density statistics. Configuration may attach a per-feature scale
//! factor applied before the model weights; the training pipeline uses this
//! to bring integrated-mass features into the same numeric range as the
//! rest.

use std::collections::HashMap;

use crate::core::stack::ClassImage;

/// Names of the computed features, in canonical order.
pub const FEATURE_NAMES: [&str; 6] = [
    "dmean_mass",
    "dmedian_mass",
    "dmode_mass",
    "dstd_mass",
    "dmin_mass",
    "dmax_mass",
];

/// Number of histogram bins used for the mode estimate.
const MODE_BINS: usize = 256;

/// Density statistics summarizing one normalized class average.
///
/// Non-finite pixels are ignored; an image without any finite pixel yields
/// all-zero features.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassFeatures {
    /// Mean density.
    pub dmean_mass: f32,
    /// Median density.
    pub dmedian_mass: f32,
    /// Histogram mode of the density distribution.
    pub dmode_mass: f32,
    /// Population standard deviation of the density.
    pub dstd_mass: f32,
    /// Minimum density.
    pub dmin_mass: f32,
    /// Maximum density.
    pub dmax_mass: f32,
}

impl ClassFeatures {
    /// Returns the features as `(name, value)` pairs in canonical order.
    pub fn pairs(&self) -> [(&'static str, f32); 6] {
        [
            ("dmean_mass", self.dmean_mass),
            ("dmedian_mass", self.dmedian_mass),
            ("dmode_mass", self.dmode_mass),
            ("dstd_mass", self.dstd_mass),
            ("dmin_mass", self.dmin_mass),
            ("dmax_mass", self.dmax_mass),
        ]
    }

    /// Look up a feature value by name.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.pairs()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Apply per-feature scale factors. Features without an entry in
    /// `scale` are passed through unchanged.
    pub fn scaled(&self, scale: &HashMap<String, f32>) -> ClassFeatures {
        let factor = |name: &str| scale.get(name).copied().unwrap_or(1.0);
        ClassFeatures {
            dmean_mass: self.dmean_mass * factor("dmean_mass"),
            dmedian_mass: self.dmedian_mass * factor("dmedian_mass"),
            dmode_mass: self.dmode_mass * factor("dmode_mass"),
            dstd_mass: self.dstd_mass * factor("dstd_mass"),
            dmin_mass: self.dmin_mass * factor("dmin_mass"),
            dmax_mass: self.dmax_mass * factor("dmax_mass"),
        }
    }
}

/// Normalize a class image to a `fixed_len` x `fixed_len` pixel buffer.
///
/// Larger images are center-cropped, smaller ones zero-padded around the
/// center, matching how the model's training inputs were prepared. Cropping
/// and padding offsets round towards the top-left for odd differences.
///
/// # Arguments
///
/// * `image` - Source class average
/// * `fixed_len` - Target side length in pixels
///
/// # Returns
///
/// A row-major buffer of exactly `fixed_len * fixed_len` values.
pub fn normalize_image(image: &ClassImage, fixed_len: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; fixed_len * fixed_len];
    let x_off = (image.nx as isize - fixed_len as isize) / 2;
    let y_off = (image.ny as isize - fixed_len as isize) / 2;

    for ty in 0..fixed_len {
        let sy = ty as isize + y_off;
        if sy < 0 || sy >= image.ny as isize {
            continue;
        }
        for tx in 0..fixed_len {
            let sx = tx as isize + x_off;
            if sx < 0 || sx >= image.nx as isize {
                continue;
            }
            out[ty * fixed_len + tx] = image.pixels[sy as usize * image.nx + sx as usize];
        }
    }

    out
}

/// Compute the density features of a normalized pixel buffer.
///
/// Only finite values contribute; a buffer without any finite value yields
/// the all-zero `ClassFeatures`.
pub fn class_features(pixels: &[f32]) -> ClassFeatures {
    let mut finite: Vec<f32> = pixels.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return ClassFeatures::default();
    }

    finite.sort_unstable_by(f32::total_cmp);
    let n = finite.len();
    let min = finite[0];
    let max = finite[n - 1];

    let mean = finite.iter().sum::<f32>() / n as f32;
    let median = if n % 2 == 1 {
        finite[n / 2]
    } else {
        (finite[n / 2 - 1] + finite[n / 2]) / 2.0
    };
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n as f32;

    ClassFeatures {
        dmean_mass: mean,
        dmedian_mass: median,
        dmode_mass: histogram_mode(&finite, min, max),
        dstd_mass: variance.sqrt(),
        dmin_mass: min,
        dmax_mass: max,
    }
}

/// Estimate the mode as the center of the densest histogram bin.
///
/// Ties resolve towards the lowest bin. A zero-span distribution has its
/// single value as the mode.
fn histogram_mode(sorted: &[f32], min: f32, max: f32) -> f32 {
    let span = max - min;
    if span == 0.0 {
        return min;
    }

    let mut counts = [0usize; MODE_BINS];
    for value in sorted {
        let bin = (((value - min) / span) * MODE_BINS as f32) as usize;
        counts[bin.min(MODE_BINS - 1)] += 1;
    }

    let densest = counts
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
        .map(|(i, _)| i)
        .unwrap_or(0);

    min + (densest as f32 + 0.5) * span / MODE_BINS as f32
}
