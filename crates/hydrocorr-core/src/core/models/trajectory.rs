use nalgebra::Vector3;
use ndarray::{Array3, ArrayView2, Axis, s};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrajectoryError {
    #[error("Expected a position array of shape (atoms, 3, frames), found {found:?}")]
    InvalidShape { found: (usize, usize, usize) },
    #[error("Label count ({labels}) does not match atom count ({atoms})")]
    LabelCount { labels: usize, atoms: usize },
}

/// Atomic positions over time, indexed by atom, Cartesian axis and frame.
///
/// Only frames that were actually parsed are stored, so `n_frames()` is the
/// length of the valid prefix of the source file. Lengths are in Angstrom.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    labels: Vec<String>,
    positions: Array3<f64>,
}

impl Trajectory {
    pub fn new(labels: Vec<String>, positions: Array3<f64>) -> Result<Self, TrajectoryError> {
        let (atoms, axes, frames) = positions.dim();
        if axes != 3 {
            return Err(TrajectoryError::InvalidShape {
                found: (atoms, axes, frames),
            });
        }
        if labels.len() != atoms {
            return Err(TrajectoryError::LabelCount {
                labels: labels.len(),
                atoms,
            });
        }
        Ok(Self { labels, positions })
    }

    #[inline]
    pub fn n_atoms(&self) -> usize {
        self.positions.dim().0
    }

    #[inline]
    pub fn n_frames(&self) -> usize {
        self.positions.dim().2
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn positions(&self) -> &Array3<f64> {
        &self.positions
    }

    /// The `(3, frames)` coordinate block of one atom.
    pub fn atom(&self, atom: usize) -> ArrayView2<'_, f64> {
        self.positions.index_axis(Axis(0), atom)
    }

    pub fn position(&self, atom: usize, frame: usize) -> Vector3<f64> {
        Vector3::new(
            self.positions[[atom, 0, frame]],
            self.positions[[atom, 1, frame]],
            self.positions[[atom, 2, frame]],
        )
    }

    /// Drops every frame past `max_frames`.
    pub fn truncated(self, max_frames: usize) -> Self {
        if self.n_frames() <= max_frames {
            return self;
        }
        let positions = self.positions.slice(s![.., .., ..max_frames]).to_owned();
        Self {
            labels: self.labels,
            positions,
        }
    }

    pub fn into_parts(self) -> (Vec<String>, Array3<f64>) {
        (self.labels, self.positions)
    }
}
