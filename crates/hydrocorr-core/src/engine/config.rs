use crate::core::analysis::smoothing::WindowKind;
use crate::core::models::layout::{LayoutError, MoleculeLayout};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Invalid molecule layout: {0}")]
    Layout(#[from] LayoutError),
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingConfig {
    pub window: WindowKind,
    /// Odd number of samples; values below 3 disable smoothing.
    pub length: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: WindowKind::Hamming,
            length: 11,
        }
    }
}

/// Evenly spaced histogram edges, `edges` points from `start` to `end` (Angstrom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramConfig {
    pub start: f64,
    pub end: f64,
    pub edges: usize,
}

impl HistogramConfig {
    /// O-H bond-length range used when none is configured.
    pub const BOND_LENGTH: Self = Self {
        start: 0.5,
        end: 1.5,
        edges: 1000,
    };

    pub fn new(start: f64, end: f64, edges: usize) -> Self {
        Self { start, end, edges }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.edges < 2 {
            return Err(invalid(name, "at least two bin edges are required"));
        }
        if !(self.end > self.start) || !self.start.is_finite() || !self.end.is_finite() {
            return Err(invalid(
                name,
                format!("range [{}, {}] is empty or not finite", self.start, self.end),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairDistributionConfig {
    pub bins: HistogramConfig,
    /// Edge length of the cubic periodic box (Angstrom).
    pub box_length: f64,
    /// Every `frame_stride`-th frame is sampled, starting at frame 1 and never including the last frame.
    pub frame_stride: usize,
    pub include_self_pairs: bool,
}

impl Default for PairDistributionConfig {
    fn default() -> Self {
        Self {
            bins: HistogramConfig::new(0.1, 9.0, 1000),
            box_length: 18.6445,
            frame_stride: 10,
            include_self_pairs: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheValidation {
    /// Reuse a snapshot only if the source file's content hash still matches.
    #[default]
    ContentHash,
    /// Reuse any snapshot that exists for the file name.
    FileName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub validation: CacheValidation,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            validation: CacheValidation::ContentHash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerConfig {
    /// Appended to an output file name to form its completion marker.
    pub suffix: String,
    pub write_on_completion: bool,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            suffix: "dd".to_string(),
            write_on_completion: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Time between stored frames, in femtoseconds.
    pub timestep_fs: f64,
    pub max_frames: usize,
    pub layout: MoleculeLayout,
    pub smoothing: SmoothingConfig,
    pub bond_histogram: HistogramConfig,
    pub pair_distribution: PairDistributionConfig,
    pub cache: CacheConfig,
    pub markers: MarkerConfig,
}

#[derive(Default)]
pub struct AnalysisConfigBuilder {
    timestep_fs: Option<f64>,
    max_frames: Option<usize>,
    layout: Option<MoleculeLayout>,
    smoothing: Option<SmoothingConfig>,
    bond_histogram: Option<HistogramConfig>,
    pair_distribution: Option<PairDistributionConfig>,
    cache: Option<CacheConfig>,
    markers: Option<MarkerConfig>,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestep_fs(mut self, dt: f64) -> Self {
        self.timestep_fs = Some(dt);
        self
    }
    pub fn max_frames(mut self, frames: usize) -> Self {
        self.max_frames = Some(frames);
        self
    }
    pub fn layout(mut self, layout: MoleculeLayout) -> Self {
        self.layout = Some(layout);
        self
    }
    pub fn smoothing(mut self, smoothing: SmoothingConfig) -> Self {
        self.smoothing = Some(smoothing);
        self
    }
    pub fn bond_histogram(mut self, histogram: HistogramConfig) -> Self {
        self.bond_histogram = Some(histogram);
        self
    }
    pub fn pair_distribution(mut self, config: PairDistributionConfig) -> Self {
        self.pair_distribution = Some(config);
        self
    }
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }
    pub fn markers(mut self, markers: MarkerConfig) -> Self {
        self.markers = Some(markers);
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let timestep_fs = self
            .timestep_fs
            .ok_or(ConfigError::MissingParameter("timestep_fs"))?;
        if !(timestep_fs > 0.0) || !timestep_fs.is_finite() {
            return Err(invalid("timestep_fs", "must be a positive number"));
        }

        let max_frames = self
            .max_frames
            .ok_or(ConfigError::MissingParameter("max_frames"))?;
        if max_frames == 0 {
            return Err(invalid("max_frames", "must be at least 1"));
        }

        let smoothing = self.smoothing.unwrap_or_default();
        if smoothing.length >= 3 && smoothing.length % 2 == 0 {
            return Err(invalid(
                "smoothing.length",
                format!("window length must be odd, got {}", smoothing.length),
            ));
        }

        let bond_histogram = self.bond_histogram.unwrap_or(HistogramConfig::BOND_LENGTH);
        bond_histogram.validate("bond_histogram")?;

        let pair_distribution = self.pair_distribution.unwrap_or_default();
        pair_distribution.bins.validate("pair_distribution.bins")?;
        if !(pair_distribution.box_length > 0.0) {
            return Err(invalid(
                "pair_distribution.box_length",
                "must be a positive length",
            ));
        }
        if pair_distribution.frame_stride == 0 {
            return Err(invalid("pair_distribution.frame_stride", "must be at least 1"));
        }

        let markers = self.markers.unwrap_or_default();
        if markers.suffix.is_empty() {
            return Err(invalid("markers.suffix", "must not be empty"));
        }

        Ok(AnalysisConfig {
            timestep_fs,
            max_frames,
            layout: self.layout.unwrap_or_default(),
            smoothing,
            bond_histogram,
            pair_distribution,
            cache: self.cache.unwrap_or_default(),
            markers,
        })
    }
}
