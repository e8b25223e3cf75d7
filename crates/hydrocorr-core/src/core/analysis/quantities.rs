use crate::core::models::layout::{LayoutError, MoleculeLayout, Site};
use crate::core::models::series::CompositeSeries;
use crate::core::models::trajectory::Trajectory;
use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis, Zip};
use thiserror::Error;
use tracing::{debug, warn};

/// Dipole magnitudes below this are treated as zero when normalising.
const DEGENERATE_NORM: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum QuantityError {
    #[error("At least {required} frames are required, found {found}")]
    TooFewFrames { required: usize, found: usize },
    #[error("Molecule index {index} is out of range ({count} molecules)")]
    MoleculeOutOfRange { index: usize, count: usize },
    #[error("No molecules to average over")]
    NoMolecules,
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DipoleSelection {
    /// Sum of every molecule's dipole (the collective dipole).
    #[default]
    Ensemble,
    Molecule(usize),
}

/// Derives per-molecule composite series from a trajectory and a validated layout.
pub struct QuantityBuilder<'a> {
    trajectory: &'a Trajectory,
    layout: &'a MoleculeLayout,
    molecules: usize,
}

impl<'a> QuantityBuilder<'a> {
    pub fn new(trajectory: &'a Trajectory, layout: &'a MoleculeLayout) -> Result<Self, QuantityError> {
        let molecules = layout.molecule_count(trajectory.n_atoms())?;
        layout.validate_labels(trajectory.labels(), molecules)?;
        let leftover = trajectory.n_atoms() - molecules * layout.sites_per_molecule();
        if leftover > 0 {
            debug!(leftover, "Atoms beyond the last molecule are ignored.");
        }
        Ok(Self {
            trajectory,
            layout,
            molecules,
        })
    }

    #[inline]
    pub fn n_molecules(&self) -> usize {
        self.molecules
    }

    #[inline]
    pub fn n_frames(&self) -> usize {
        self.trajectory.n_frames()
    }

    fn weighted_sum(&self, molecules: &[usize], weight: impl Fn(&Site) -> f64) -> CompositeSeries {
        let mut series = CompositeSeries::zeros(molecules.len(), self.n_frames());
        for (slot, &m) in molecules.iter().enumerate() {
            let mut out = series.values_mut().index_axis_mut(Axis(0), slot);
            for (k, site) in self.layout.sites().iter().enumerate() {
                let w = weight(site);
                if w == 0.0 {
                    continue;
                }
                out.scaled_add(w, &self.trajectory.atom(self.layout.atom_index(m, k)));
            }
        }
        series
    }

    fn all_molecules(&self) -> Vec<usize> {
        (0..self.molecules).collect()
    }

    /// Mass-weighted center of every molecule.
    pub fn center_of_mass(&self) -> CompositeSeries {
        let total = self.layout.total_mass();
        let mut series = self.weighted_sum(&self.all_molecules(), |s| s.mass);
        series.values_mut().mapv_inplace(|v| v / total);
        series
    }

    /// Site 0 minus site 1 (oxygen minus the first hydrogen for water).
    pub fn oh_vector(&self) -> CompositeSeries {
        let mut series = CompositeSeries::zeros(self.molecules, self.n_frames());
        for m in 0..self.molecules {
            let head = self.trajectory.atom(self.layout.atom_index(m, 0));
            let tail = self.trajectory.atom(self.layout.atom_index(m, 1));
            series
                .values_mut()
                .index_axis_mut(Axis(0), m)
                .assign(&(&head - &tail));
        }
        series
    }

    /// Charge-weighted sum of site positions, one series per molecule.
    pub fn molecular_dipoles(&self) -> CompositeSeries {
        self.weighted_sum(&self.all_molecules(), |s| s.charge)
    }

    pub fn dipole(&self, selection: DipoleSelection) -> Result<CompositeSeries, QuantityError> {
        match selection {
            DipoleSelection::Ensemble => Ok(self.molecular_dipoles().summed()),
            DipoleSelection::Molecule(index) => {
                if index >= self.molecules {
                    return Err(QuantityError::MoleculeOutOfRange {
                        index,
                        count: self.molecules,
                    });
                }
                Ok(self.weighted_sum(&[index], |s| s.charge))
            }
        }
    }

    /// Unit vectors along each molecule's dipole.
    ///
    /// Frames where the dipole vanishes get a zero vector; their number is returned
    /// alongside the series.
    pub fn orientation(&self) -> (CompositeSeries, usize) {
        let mut series = self.molecular_dipoles();
        let mut degenerate = 0usize;
        for mut lane in series.values_mut().lanes_mut(Axis(1)) {
            let norm = lane.dot(&lane).sqrt();
            if norm > DEGENERATE_NORM && norm.is_finite() {
                lane.mapv_inplace(|v| v / norm);
            } else {
                lane.fill(0.0);
                degenerate += 1;
            }
        }
        if degenerate > 0 {
            warn!(
                degenerate,
                "Zero-magnitude dipoles found; orientation set to zero for those frames."
            );
        }
        (series, degenerate)
    }

    /// Site 0 to site 1 distance, shaped `(molecules, frames)`.
    pub fn bond_lengths(&self) -> Array2<f64> {
        let oh = self.oh_vector();
        oh.values().map_axis(Axis(1), |v| v.dot(&v).sqrt())
    }
}

fn gradient(f: ArrayView1<'_, f64>, dt: f64, mut out: ArrayViewMut1<'_, f64>) {
    let n = f.len();
    let h2 = 2.0 * dt;
    out[0] = (-3.0 * f[0] + 4.0 * f[1] - f[2]) / h2;
    for i in 1..n - 1 {
        out[i] = (f[i + 1] - f[i - 1]) / h2;
    }
    out[n - 1] = (3.0 * f[n - 1] - 4.0 * f[n - 2] + f[n - 3]) / h2;
}

/// Time derivative along the frame axis with spacing `dt`.
///
/// Second-order central differences inside, second-order one-sided
/// differences at both ends.
pub fn time_derivative(series: &CompositeSeries, dt: f64) -> Result<CompositeSeries, QuantityError> {
    let frames = series.n_frames();
    if frames < 3 {
        return Err(QuantityError::TooFewFrames {
            required: 3,
            found: frames,
        });
    }
    let mut out = CompositeSeries::zeros(series.n_molecules(), frames);
    Zip::from(out.values_mut().lanes_mut(Axis(2)))
        .and(series.values().lanes(Axis(2)))
        .for_each(|o, f| gradient(f, dt, o));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::layout::{HYDROGEN_MASS, OXYGEN_MASS};
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn water_trajectory(molecules: usize, frames: usize, f: impl Fn(usize, usize, usize) -> f64) -> Trajectory {
        let labels = (0..molecules)
            .flat_map(|_| ["O", "H", "H"])
            .map(String::from)
            .collect();
        let positions = Array3::from_shape_fn((3 * molecules, 3, frames), |(a, x, t)| f(a, x, t));
        Trajectory::new(labels, positions).unwrap()
    }

    /// O at the origin, H1 on +x, H2 on +y, shifted by the molecule index along z.
    fn bent_water(a: usize, x: usize, _t: usize) -> f64 {
        let site = a % 3;
        let m = (a / 3) as f64;
        match (site, x) {
            (1, 0) => 1.0,
            (2, 1) => 1.0,
            (_, 2) => m,
            _ => 0.0,
        }
    }

    #[test]
    fn center_of_mass_is_mass_weighted() {
        let traj = water_trajectory(1, 2, bent_water);
        let layout = MoleculeLayout::water(None);
        let com = QuantityBuilder::new(&traj, &layout).unwrap().center_of_mass();

        let total = OXYGEN_MASS + 2.0 * HYDROGEN_MASS;
        assert_relative_eq!(com.component(0, 0)[0], HYDROGEN_MASS / total, epsilon = 1e-12);
        assert_relative_eq!(com.component(0, 1)[1], HYDROGEN_MASS / total, epsilon = 1e-12);
        assert_relative_eq!(com.component(0, 2)[0], 0.0);
    }

    #[test]
    fn oh_vector_uses_only_the_first_hydrogen() {
        let traj = water_trajectory(2, 3, bent_water);
        let layout = MoleculeLayout::water(None);
        let oh = QuantityBuilder::new(&traj, &layout).unwrap().oh_vector();

        assert_eq!(oh.n_molecules(), 2);
        assert_relative_eq!(oh.component(1, 0)[2], -1.0);
        assert_relative_eq!(oh.component(1, 1)[2], 0.0);
        assert_relative_eq!(oh.component(1, 2)[2], 0.0);
    }

    #[test]
    fn ensemble_dipole_sums_molecular_dipoles() {
        let traj = water_trajectory(3, 2, bent_water);
        let layout = MoleculeLayout::water(None);
        let builder = QuantityBuilder::new(&traj, &layout).unwrap();
        let total = builder.dipole(DipoleSelection::Ensemble).unwrap();

        assert_eq!(total.n_molecules(), 1);
        // each molecule: -1 * O + 0.5 * H1 + 0.5 * H2 = (0.5, 0.5, 0) since z cancels
        assert_relative_eq!(total.component(0, 0)[1], 1.5);
        assert_relative_eq!(total.component(0, 1)[1], 1.5);
        assert_relative_eq!(total.component(0, 2)[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn single_molecule_dipole_is_bounds_checked() {
        let traj = water_trajectory(3, 2, bent_water);
        let layout = MoleculeLayout::water(None);
        let builder = QuantityBuilder::new(&traj, &layout).unwrap();

        let one = builder.dipole(DipoleSelection::Molecule(2)).unwrap();
        assert_eq!(one.n_molecules(), 1);
        assert_relative_eq!(one.component(0, 0)[0], 0.5);

        assert_eq!(
            builder.dipole(DipoleSelection::Molecule(3)).unwrap_err(),
            QuantityError::MoleculeOutOfRange { index: 3, count: 3 }
        );
    }

    #[test]
    fn orientation_is_unit_length() {
        let traj = water_trajectory(2, 4, bent_water);
        let layout = MoleculeLayout::water(None);
        let (orientation, degenerate) = QuantityBuilder::new(&traj, &layout).unwrap().orientation();

        assert_eq!(degenerate, 0);
        let x = orientation.component(1, 0)[3];
        let y = orientation.component(1, 1)[3];
        assert_relative_eq!(x, 0.5_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(x * x + y * y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn orientation_of_vanishing_dipole_is_zero_and_counted() {
        // all three atoms on the same point: -1 + 0.5 + 0.5 = 0
        let traj = water_trajectory(1, 5, |_, x, t| if x == 0 { t as f64 } else { 1.0 });
        let layout = MoleculeLayout::water(None);
        let (orientation, degenerate) = QuantityBuilder::new(&traj, &layout).unwrap().orientation();

        assert_eq!(degenerate, 5);
        assert!(orientation.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn bond_lengths_are_oxygen_to_first_hydrogen_distances() {
        let traj = water_trajectory(2, 3, |a, x, t| match (a % 3, x) {
            (1, 0) => 0.9 + 0.1 * t as f64,
            _ => 0.0,
        });
        let layout = MoleculeLayout::water(None);
        let lengths = QuantityBuilder::new(&traj, &layout).unwrap().bond_lengths();

        assert_eq!(lengths.dim(), (2, 3));
        assert_relative_eq!(lengths[[1, 2]], 1.1, epsilon = 1e-12);
    }

    #[test]
    fn builder_rejects_mislabelled_atoms() {
        let positions = Array3::zeros((3, 3, 2));
        let labels = vec!["H".into(), "O".into(), "H".into()];
        let traj = Trajectory::new(labels, positions).unwrap();
        let layout = MoleculeLayout::water(None);
        assert!(matches!(
            QuantityBuilder::new(&traj, &layout),
            Err(QuantityError::Layout(LayoutError::LabelMismatch { atom: 0, .. }))
        ));
    }

    #[test]
    fn time_derivative_is_exact_for_quadratics() {
        let dt = 2.0;
        let values = Array3::from_shape_fn((1, 3, 6), |(_, x, i)| {
            let t = i as f64 * dt;
            (x + 1) as f64 * t * t
        });
        let series = CompositeSeries::from_array(values).unwrap();
        let derivative = time_derivative(&series, dt).unwrap();

        for i in 0..6 {
            let t = i as f64 * dt;
            assert_relative_eq!(derivative.component(0, 2)[i], 6.0 * t, epsilon = 1e-9);
        }
    }

    #[test]
    fn time_derivative_needs_three_frames() {
        let series = CompositeSeries::zeros(2, 2);
        assert_eq!(
            time_derivative(&series, 1.0).unwrap_err(),
            QuantityError::TooFewFrames {
                required: 3,
                found: 2
            }
        );
    }
}
