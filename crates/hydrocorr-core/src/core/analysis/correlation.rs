use super::quantities::QuantityError;
use crate::core::models::series::CompositeSeries;
use ndarray::{Array1, ArrayView1};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::warn;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// FFT plans for autocorrelating series of one length.
///
/// Series are zero padded to the next power of two of at least twice their
/// length so the circular correlation has no wrap-around.
#[derive(Clone)]
pub struct Autocorrelator {
    len: usize,
    size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl Autocorrelator {
    pub fn new(len: usize) -> Self {
        let size = (len * 2).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        Self {
            len,
            size,
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
        }
    }

    /// Lagged products summed over all overlapping pairs, for lags `0..n`.
    fn lagged_sums(&self, x: ArrayView1<'_, f64>) -> Vec<f64> {
        let n = x.len();
        if n != self.len {
            return Self::new(n).lagged_sums(x);
        }
        let mut buf = vec![Complex::new(0.0, 0.0); self.size];
        for (slot, &v) in buf.iter_mut().zip(x.iter()) {
            slot.re = v;
        }
        self.forward.process(&mut buf);
        for c in buf.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut buf);
        let scale = 1.0 / self.size as f64;
        buf.iter().take(n).map(|c| c.re * scale).collect()
    }

    /// Unbiased autocorrelation: lag `m` is averaged over its `n - m` pairs.
    /// Only lags `0..n/2` are returned.
    pub fn unbiased(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = x.len();
        if n == 0 {
            return Array1::zeros(0);
        }
        let sums = self.lagged_sums(x);
        (0..n / 2).map(|m| sums[m] / (n - m) as f64).collect()
    }

    /// Biased autocorrelation scaled so lag 0 equals the mean of `x²`.
    /// Lags `0..ceil(n/2)` are returned.
    pub fn normalized(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = x.len();
        let half = n.div_ceil(2);
        if n == 0 {
            return Array1::zeros(0);
        }
        let sums = self.lagged_sums(x);
        let lag0 = sums[0];
        if lag0 <= 0.0 {
            warn!("Autocorrelation at lag 0 is zero; returning zeros.");
            return Array1::zeros(half);
        }
        let mean_square = x.iter().map(|v| v * v).sum::<f64>() / n as f64;
        (0..half).map(|m| sums[m] / lag0 * mean_square).collect()
    }
}

/// Unbiased autocorrelation of `x`, length `floor(n/2)`.
pub fn autocorrelation(x: ArrayView1<'_, f64>) -> Array1<f64> {
    Autocorrelator::new(x.len()).unbiased(x)
}

/// Lag-0-normalised autocorrelation of `x`, length `ceil(n/2)`.
pub fn autocorrelation_fft_normalized(x: ArrayView1<'_, f64>) -> Array1<f64> {
    Autocorrelator::new(x.len()).normalized(x)
}

/// Per-axis correlations averaged over molecules, and their sum.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisCorrelation {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub z: Array1<f64>,
    pub total: Array1<f64>,
}

impl AxisCorrelation {
    pub fn len(&self) -> usize {
        self.total.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }

    pub fn axes(&self) -> [&Array1<f64>; 3] {
        [&self.x, &self.y, &self.z]
    }
}

/// Correlates every molecule and Cartesian component separately, then
/// averages over molecules and sums the axes.
pub fn ensemble_autocorrelation(series: &CompositeSeries) -> Result<AxisCorrelation, QuantityError> {
    let molecules = series.n_molecules();
    if molecules == 0 {
        return Err(QuantityError::NoMolecules);
    }
    let correlator = Autocorrelator::new(series.n_frames());
    let per_molecule = |m: usize| -> [Array1<f64>; 3] {
        [0, 1, 2].map(|axis| correlator.unbiased(series.component(m, axis)))
    };

    #[cfg(not(feature = "parallel"))]
    let correlations: Vec<[Array1<f64>; 3]> = (0..molecules).map(per_molecule).collect();

    #[cfg(feature = "parallel")]
    let correlations: Vec<[Array1<f64>; 3]> = (0..molecules).into_par_iter().map(per_molecule).collect();

    let lags = series.n_frames() / 2;
    let mut means = [Array1::zeros(lags), Array1::zeros(lags), Array1::zeros(lags)];
    for molecule in &correlations {
        for (mean, corr) in means.iter_mut().zip(molecule) {
            *mean += corr;
        }
    }
    let count = molecules as f64;
    for mean in means.iter_mut() {
        mean.mapv_inplace(|v| v / count);
    }
    let [x, y, z] = means;
    let total = &x + &y + &z;
    Ok(AxisCorrelation { x, y, z, total })
}
