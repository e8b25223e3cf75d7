use crate::engine::config::SmoothingConfig;
use ndarray::{Array1, ArrayView1};
use phf::{Map, phf_map};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Symmetric smoothing kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// Moving average.
    Flat,
    Hanning,
    Hamming,
    Bartlett,
    Blackman,
}

static WINDOW_NAMES: Map<&'static str, WindowKind> = phf_map! {
    "flat" => WindowKind::Flat,
    "hanning" => WindowKind::Hanning,
    "hann" => WindowKind::Hanning,
    "hamming" => WindowKind::Hamming,
    "bartlett" => WindowKind::Bartlett,
    "blackman" => WindowKind::Blackman,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown smoothing window '{0}' (expected flat, hanning, hamming, bartlett or blackman)")]
pub struct ParseWindowKindError(pub String);

impl FromStr for WindowKind {
    type Err = ParseWindowKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WINDOW_NAMES
            .get(s.trim().to_lowercase().as_str())
            .copied()
            .ok_or_else(|| ParseWindowKindError(s.to_string()))
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                WindowKind::Flat => "flat",
                WindowKind::Hanning => "hanning",
                WindowKind::Hamming => "hamming",
                WindowKind::Bartlett => "bartlett",
                WindowKind::Blackman => "blackman",
            }
        )
    }
}

impl WindowKind {
    /// Unnormalised window coefficients of length `len`.
    pub fn coefficients(self, len: usize) -> Array1<f64> {
        if len <= 1 {
            return Array1::ones(len);
        }
        let span = (len - 1) as f64;
        Array1::from_shape_fn(len, |i| {
            let n = i as f64;
            let phase = 2.0 * PI * n / span;
            match self {
                WindowKind::Flat => 1.0,
                WindowKind::Hanning => 0.5 - 0.5 * phase.cos(),
                WindowKind::Hamming => 0.54 - 0.46 * phase.cos(),
                WindowKind::Bartlett => 1.0 - (2.0 * n / span - 1.0).abs(),
                WindowKind::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
            }
        })
    }
}

/// Mirrors an out-of-range index back into `0..n` without repeating the edge sample.
#[inline]
fn reflect(i: isize, n: usize) -> usize {
    let last = n as isize - 1;
    let j = if i < 0 {
        -i
    } else if i > last {
        2 * last - i
    } else {
        i
    };
    j as usize
}

/// Convolves `x` with the normalised window, centred on each sample.
///
/// The ends are extended by reflection so the output has the input's length.
/// Windows shorter than 3 samples, or longer than the input, leave `x` unchanged.
///
/// Older `.vac.txt`/`.dac.txt` tables were smoothed with an off-centre slice,
/// so their sample `i` is centred on `x[i - 1]`. Smoothed columns written here
/// lead those tables by one bin.
pub fn smooth(x: ArrayView1<'_, f64>, config: &SmoothingConfig) -> Array1<f64> {
    let n = x.len();
    let len = config.length;
    if len < 3 {
        return x.to_owned();
    }
    if n < len {
        debug!(samples = n, window = len, "Series shorter than smoothing window; left unsmoothed.");
        return x.to_owned();
    }
    let weights = config.window.coefficients(len);
    let norm = weights.sum();
    let half = (len / 2) as isize;
    Array1::from_shape_fn(n, |i| {
        let acc: f64 = weights
            .iter()
            .enumerate()
            .map(|(k, w)| w * x[reflect(i as isize + k as isize - half, n)])
            .sum();
        acc / norm
    })
}
