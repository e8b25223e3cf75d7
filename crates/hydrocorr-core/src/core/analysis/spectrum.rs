use crate::core::utils::geometry::linspace;
use ndarray::{Array1, ArrayView1};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
const FS_TO_S: f64 = 1e-15;

/// Type-I discrete cosine transform, unnormalised:
///
/// `y[k] = x[0] + (-1)^k x[n-1] + 2 * sum_{j=1}^{n-2} x[j] cos(pi k j / (n-1))`
///
/// Computed as the real part of the FFT of the even extension of `x`.
pub fn dct_type1(x: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = x.len();
    if n <= 1 {
        return x.to_owned();
    }
    let m = 2 * (n - 1);
    let mut buf: Vec<Complex<f64>> = (0..m)
        .map(|k| {
            let v = if k < n { x[k] } else { x[m - k] };
            Complex::new(v, 0.0)
        })
        .collect();
    FftPlanner::<f64>::new().plan_fft_forward(m).process(&mut buf);
    buf.iter().take(n).map(|c| c.re).collect()
}

/// `n` frequencies from zero to the Nyquist frequency of a `dt_fs` sampling, in Hz.
pub fn frequency_axis_hz(n: usize, dt_fs: f64) -> Array1<f64> {
    let nyquist = 0.5 / (dt_fs * FS_TO_S);
    Array1::from(linspace(0.0, nyquist, n))
}

#[inline]
pub fn hz_to_wavenumber(hz: f64) -> f64 {
    hz / (100.0 * SPEED_OF_LIGHT)
}

/// A lineshape on a wavenumber axis (cm⁻¹).
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub wavenumber: Array1<f64>,
    pub intensity: Array1<f64>,
}

impl Spectrum {
    /// Cosine transform of a correlation function sampled every `dt_fs`.
    pub fn lineshape(acf: ArrayView1<'_, f64>, dt_fs: f64) -> Self {
        let hz = frequency_axis_hz(acf.len(), dt_fs);
        Self {
            wavenumber: hz.mapv(hz_to_wavenumber),
            intensity: dct_type1(acf),
        }
    }

    /// Lineshape weighted by the squared angular frequency `(2 pi nu)^2`, in rad²/s².
    pub fn spectral_density(acf: ArrayView1<'_, f64>, dt_fs: f64) -> Self {
        let hz = frequency_axis_hz(acf.len(), dt_fs);
        let omega_sq = hz.mapv(|nu| (2.0 * PI * nu).powi(2));
        Self {
            wavenumber: hz.mapv(hz_to_wavenumber),
            intensity: dct_type1(acf) * &omega_sq,
        }
    }

    /// Index of the strongest intensity, ignoring the zero-frequency bin.
    pub fn peak_index(&self) -> Option<usize> {
        self.intensity
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}
