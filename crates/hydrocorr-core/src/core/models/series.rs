use ndarray::{Array3, ArrayView1, Axis, s};

/// A per-molecule vector quantity sampled over time, shaped `(molecules, 3, frames)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSeries {
    values: Array3<f64>,
}

impl CompositeSeries {
    pub fn zeros(molecules: usize, frames: usize) -> Self {
        Self {
            values: Array3::zeros((molecules, 3, frames)),
        }
    }

    pub fn from_array(values: Array3<f64>) -> Option<Self> {
        (values.dim().1 == 3).then_some(Self { values })
    }

    #[inline]
    pub fn n_molecules(&self) -> usize {
        self.values.dim().0
    }

    #[inline]
    pub fn n_frames(&self) -> usize {
        self.values.dim().2
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut Array3<f64> {
        &mut self.values
    }

    /// Time series of one Cartesian component of one molecule.
    pub fn component(&self, molecule: usize, axis: usize) -> ArrayView1<'_, f64> {
        self.values.slice(s![molecule, axis, ..])
    }

    /// Sums every molecule into a single-molecule series.
    pub fn summed(&self) -> Self {
        Self {
            values: self.values.sum_axis(Axis(0)).insert_axis(Axis(0)),
        }
    }
}
