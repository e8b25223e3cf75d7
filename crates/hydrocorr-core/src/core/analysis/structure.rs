use super::quantities::{QuantityBuilder, QuantityError};
use crate::core::models::layout::MoleculeLayout;
use crate::core::models::trajectory::Trajectory;
use crate::core::utils::geometry::{linspace, minimum_image_distance};
use crate::engine::config::{HistogramConfig, PairDistributionConfig};
use nalgebra::Vector3;
use ndarray::{Array1, s};
use std::f64::consts::PI;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Fixed-grid histogram with numpy bin semantics: every bin is half-open
/// except the last, which also includes the upper edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    edges: Array1<f64>,
    counts: Array1<u64>,
    outside: u64,
}

impl Histogram {
    pub fn new(config: &HistogramConfig) -> Self {
        let edges = Array1::from(linspace(config.start, config.end, config.edges));
        let bins = edges.len().saturating_sub(1);
        Self {
            edges,
            counts: Array1::zeros(bins),
            outside: 0,
        }
    }

    pub fn edges(&self) -> &Array1<f64> {
        &self.edges
    }

    pub fn counts(&self) -> &Array1<u64> {
        &self.counts
    }

    /// Samples that fell outside the edge range (including NaN).
    pub fn outside(&self) -> u64 {
        self.outside
    }

    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    pub fn left_edges(&self) -> Array1<f64> {
        self.edges.slice(s![..-1]).to_owned()
    }

    pub fn right_edges(&self) -> Array1<f64> {
        self.edges.slice(s![1..]).to_owned()
    }

    fn bin_of(&self, value: f64) -> Option<usize> {
        let bins = self.counts.len();
        if bins == 0 {
            return None;
        }
        let (lo, hi) = (self.edges[0], self.edges[bins]);
        if !(value >= lo && value <= hi) {
            return None;
        }
        if value == hi {
            return Some(bins - 1);
        }
        let width = (hi - lo) / bins as f64;
        let mut idx = (((value - lo) / width) as usize).min(bins - 1);
        if value < self.edges[idx] {
            idx -= 1;
        } else if idx + 1 < bins && value >= self.edges[idx + 1] {
            idx += 1;
        }
        Some(idx)
    }

    /// Counts `value`; returns `false` if it fell outside every bin.
    pub fn add(&mut self, value: f64) -> bool {
        match self.bin_of(value) {
            Some(idx) => {
                self.counts[idx] += 1;
                true
            }
            None => {
                self.outside += 1;
                false
            }
        }
    }

    /// Adds the counts of a histogram built on the same grid.
    pub fn merge(&mut self, other: &Histogram) {
        self.counts += &other.counts;
        self.outside += other.outside;
    }
}

/// Histogram of every molecule's site-0 to site-1 distance over all frames.
pub fn bond_length_distribution(
    trajectory: &Trajectory,
    layout: &MoleculeLayout,
    config: &HistogramConfig,
) -> Result<Histogram, QuantityError> {
    let lengths = QuantityBuilder::new(trajectory, layout)?.bond_lengths();
    let mut histogram = Histogram::new(config);
    for &length in lengths.iter() {
        histogram.add(length);
    }
    if histogram.outside() > 0 {
        debug!(
            outside = histogram.outside(),
            "Bond lengths outside the histogram range were dropped."
        );
    }
    if histogram.total() == 0 {
        warn!("Bond-length histogram is empty.");
    }
    Ok(histogram)
}

/// Radial distribution function on the right bin edges.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialDistribution {
    pub r: Array1<f64>,
    pub g: Array1<f64>,
    pub sampled_frames: usize,
}

/// Frames used for pair statistics: `1, 1 + stride, ...`, excluding the last frame.
pub fn sampled_frames(frames: usize, stride: usize) -> Vec<usize> {
    (1..frames.saturating_sub(1)).step_by(stride.max(1)).collect()
}

fn frame_histogram(centers: &[Vector3<f64>], config: &PairDistributionConfig) -> Histogram {
    let mut histogram = Histogram::new(&config.bins);
    for (i, a) in centers.iter().enumerate() {
        for (j, b) in centers.iter().enumerate() {
            if i == j && !config.include_self_pairs {
                continue;
            }
            histogram.add(minimum_image_distance(a, b, config.box_length));
        }
    }
    histogram
}

/// Site-0 pair distribution g(r) under the minimum-image convention in a cubic box.
///
/// Counts ordered pairs, so each unordered pair contributes twice, and
/// normalises by molecule count, shell volume `4 pi r^2 dr`, number density
/// and the number of sampled frames.
pub fn pair_distribution(
    trajectory: &Trajectory,
    layout: &MoleculeLayout,
    config: &PairDistributionConfig,
) -> Result<RadialDistribution, QuantityError> {
    let molecules = QuantityBuilder::new(trajectory, layout)?.n_molecules();
    let frames = sampled_frames(trajectory.n_frames(), config.frame_stride);
    let centers_at = |frame: usize| -> Vec<Vector3<f64>> {
        (0..molecules)
            .map(|m| trajectory.position(layout.atom_index(m, 0), frame))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let iterator = frames.iter();

    #[cfg(feature = "parallel")]
    let iterator = frames.par_iter();

    let partials: Vec<Histogram> = iterator
        .map(|&frame| frame_histogram(&centers_at(frame), config))
        .collect();

    let mut histogram = Histogram::new(&config.bins);
    for partial in &partials {
        histogram.merge(partial);
    }

    let r = histogram.right_edges();
    if frames.is_empty() {
        warn!(
            frames = trajectory.n_frames(),
            "No frames available for the pair distribution; reporting zeros."
        );
        return Ok(RadialDistribution {
            g: Array1::zeros(r.len()),
            r,
            sampled_frames: 0,
        });
    }

    let edges = histogram.edges();
    let dr = if edges.len() > 2 {
        edges[2] - edges[1]
    } else {
        edges[1] - edges[0]
    };
    let n = molecules as f64;
    let density = n / config.box_length.powi(3);
    let sampled = frames.len() as f64;
    let g = r
        .iter()
        .zip(histogram.counts().iter())
        .map(|(&radius, &count)| {
            let shell = 4.0 * PI * radius * radius * dr;
            count as f64 / n / shell / density / sampled
        })
        .collect();

    info!(
        molecules,
        sampled_frames = frames.len(),
        "Pair distribution computed."
    );
    Ok(RadialDistribution {
        r,
        g,
        sampled_frames: frames.len(),
    })
}
