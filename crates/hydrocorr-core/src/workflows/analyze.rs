use crate::core::analysis::correlation::{AxisCorrelation, ensemble_autocorrelation};
use crate::core::analysis::quantities::{DipoleSelection, QuantityBuilder, time_derivative};
use crate::core::analysis::smoothing::smooth;
use crate::core::analysis::spectrum::Spectrum;
use crate::core::analysis::structure::{bond_length_distribution, pair_distribution};
use crate::core::io::marker::CompletionMarker;
use crate::core::io::snapshot::{SnapshotCache, SourceFingerprint};
use crate::core::io::table::{Table, TableError};
use crate::core::io::traits::TrajectoryFile;
use crate::core::io::xyz::XyzFile;
use crate::core::models::series::CompositeSeries;
use crate::core::models::trajectory::Trajectory;
use crate::engine::config::{AnalysisConfig, CacheValidation};
use crate::engine::error::AnalysisError;
use crate::engine::progress::{Progress, ProgressReporter};
use ndarray::{Array1, ArrayView1};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Column names of every correlation table. The first ten keep the historical layout.
pub const CORRELATION_COLUMNS: [&str; 14] = [
    "time_fs",
    "x",
    "y",
    "z",
    "total",
    "freq",
    "smoothed_sp_x",
    "smoothed_sp_y",
    "smoothed_sp_z",
    "smoothed_sp_total",
    "sp_x",
    "sp_y",
    "sp_z",
    "sp_total",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnalysisKind {
    /// Center-of-mass velocity autocorrelation and its lineshape.
    Velocity,
    /// Velocity of the O-H vector.
    OhVelocity,
    Dipole,
    Orientation,
    BondLength,
    PairDistribution,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "Unknown analysis '{0}' (expected vac, ohvac, dac, oac, bond-length or pair-distribution)"
)]
pub struct ParseAnalysisKindError(pub String);

impl FromStr for AnalysisKind {
    type Err = ParseAnalysisKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vac" | "velocity" => Ok(Self::Velocity),
            "ohvac" | "oh-velocity" => Ok(Self::OhVelocity),
            "dac" | "dipole" => Ok(Self::Dipole),
            "oac" | "orientation" => Ok(Self::Orientation),
            "bond-length" | "bond" => Ok(Self::BondLength),
            "pair-distribution" | "rdf" | "gr" => Ok(Self::PairDistribution),
            _ => Err(ParseAnalysisKindError(s.to_string())),
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

enum Weighting {
    Plain,
    AngularSquared,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 6] = [
        AnalysisKind::Velocity,
        AnalysisKind::OhVelocity,
        AnalysisKind::Dipole,
        AnalysisKind::Orientation,
        AnalysisKind::BondLength,
        AnalysisKind::PairDistribution,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Velocity => "vac",
            Self::OhVelocity => "ohvac",
            Self::Dipole => "dac",
            Self::Orientation => "oac",
            Self::BondLength => "bond-length",
            Self::PairDistribution => "pair-distribution",
        }
    }

    /// Output file suffix. A single-molecule dipole carries the molecule index.
    pub fn suffix(self, dipole: DipoleSelection) -> String {
        match (self, dipole) {
            (Self::Velocity, _) => ".vac.txt".to_string(),
            (Self::OhVelocity, _) => ".OHvac.txt".to_string(),
            (Self::Dipole, DipoleSelection::Ensemble) => ".dac.txt".to_string(),
            (Self::Dipole, DipoleSelection::Molecule(i)) => format!(".dac_{}.txt", i),
            (Self::Orientation, _) => ".oac1.txt".to_string(),
            (Self::BondLength, _) => ".bond_length_dist.txt".to_string(),
            (Self::PairDistribution, _) => ".pair_dist.txt".to_string(),
        }
    }

    pub fn output_path(self, input: &Path, dipole: DipoleSelection) -> PathBuf {
        let mut name = OsString::from(input.as_os_str());
        name.push(self.suffix(dipole));
        PathBuf::from(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Written(PathBuf),
    /// A completion marker already existed.
    Skipped(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub kinds: Vec<AnalysisKind>,
    pub dipole: DipoleSelection,
    /// Recompute outputs even when their completion marker exists.
    pub force: bool,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            kinds: AnalysisKind::ALL.to_vec(),
            dipole: DipoleSelection::Ensemble,
            force: false,
        }
    }
}

/// Loads a trajectory through the snapshot cache, parsing the text file when needed.
pub fn load_trajectory(
    path: &Path,
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
) -> Result<Trajectory, AnalysisError> {
    let parse = || {
        XyzFile::read_from_path(path, config.max_frames, reporter).map_err(|source| {
            AnalysisError::Trajectory {
                path: path.to_path_buf(),
                source,
            }
        })
    };
    if !config.cache.enabled {
        return parse();
    }

    let validation = config.cache.validation;
    let cache = SnapshotCache::new(validation);
    let fingerprint = match validation {
        CacheValidation::ContentHash => Some(SourceFingerprint::of(path)?),
        CacheValidation::FileName => None,
    };

    match cache.load(path, fingerprint.as_ref(), config.max_frames) {
        Ok(Some(trajectory)) => return Ok(trajectory.truncated(config.max_frames)),
        Ok(None) => {}
        Err(e) if validation == CacheValidation::ContentHash => {
            warn!("Ignoring unreadable snapshot for {:?}: {}", path, e);
        }
        Err(e) => return Err(e.into()),
    }

    let trajectory = parse()?;
    let fingerprint = match fingerprint {
        Some(f) => Ok(f),
        None => SourceFingerprint::of(path),
    };
    let stored =
        fingerprint.and_then(|f| cache.store(path, &trajectory, &f, config.max_frames));
    if let Err(e) = stored {
        warn!("Failed to write snapshot for {:?}: {}", path, e);
    }
    Ok(trajectory)
}

fn table_error(path: &Path) -> impl FnOnce(TableError) -> AnalysisError + '_ {
    move |source| AnalysisError::Table {
        path: path.to_path_buf(),
        source,
    }
}

fn correlation_table(
    series: &CompositeSeries,
    config: &AnalysisConfig,
    weighting: Weighting,
    output: &Path,
) -> Result<Table, AnalysisError> {
    let AxisCorrelation { x, y, z, total } = ensemble_autocorrelation(series)?;
    let dt = config.timestep_fs;
    let time: Array1<f64> = (0..total.len()).map(|i| i as f64 * dt).collect();

    let spectrum = |acf: &Array1<f64>| match weighting {
        Weighting::Plain => Spectrum::lineshape(acf.view(), dt),
        Weighting::AngularSquared => Spectrum::spectral_density(acf.view(), dt),
    };
    let spectra = [spectrum(&x), spectrum(&y), spectrum(&z), spectrum(&total)];
    let smoothed: Vec<Array1<f64>> = spectra
        .iter()
        .map(|s| smooth(s.intensity.view(), &config.smoothing))
        .collect();

    let mut columns: Vec<ArrayView1<'_, f64>> = vec![
        time.view(),
        x.view(),
        y.view(),
        z.view(),
        total.view(),
        spectra[3].wavenumber.view(),
    ];
    columns.extend(smoothed.iter().map(|s| s.view()));
    columns.extend(spectra.iter().map(|s| s.intensity.view()));

    Table::from_columns(&CORRELATION_COLUMNS, &columns).map_err(table_error(output))
}

fn compute_table(
    kind: AnalysisKind,
    trajectory: &Trajectory,
    config: &AnalysisConfig,
    dipole: DipoleSelection,
    output: &Path,
) -> Result<Table, AnalysisError> {
    let layout = &config.layout;
    let builder = QuantityBuilder::new(trajectory, layout)?;
    let dt = config.timestep_fs;
    let table = match kind {
        AnalysisKind::Velocity => {
            let velocity = time_derivative(&builder.center_of_mass(), dt)?;
            correlation_table(&velocity, config, Weighting::Plain, output)?
        }
        AnalysisKind::OhVelocity => {
            let velocity = time_derivative(&builder.oh_vector(), dt)?;
            correlation_table(&velocity, config, Weighting::Plain, output)?
        }
        AnalysisKind::Dipole => {
            correlation_table(&builder.dipole(dipole)?, config, Weighting::AngularSquared, output)?
        }
        AnalysisKind::Orientation => {
            let (orientation, _) = builder.orientation();
            correlation_table(&orientation, config, Weighting::AngularSquared, output)?
        }
        AnalysisKind::BondLength => {
            let histogram = bond_length_distribution(trajectory, layout, &config.bond_histogram)?;
            let counts = histogram.counts().mapv(|c| c as f64);
            let left = histogram.left_edges();
            Table::from_columns(&["bins", "counts"], &[left.view(), counts.view()])
                .map_err(table_error(output))?
        }
        AnalysisKind::PairDistribution => {
            let rdf = pair_distribution(trajectory, layout, &config.pair_distribution)?;
            Table::from_columns(&["r", "g_OO"], &[rdf.r.view(), rdf.g.view()])
                .map_err(table_error(output))?
        }
    };
    Ok(table)
}

/// Runs the requested analyses on one trajectory file, writing one table per
/// analysis next to the input.
///
/// Outputs whose completion marker exists are skipped unless `request.force`
/// is set. The trajectory is only loaded if at least one output is pending.
#[instrument(skip_all, name = "analyze_workflow", fields(input = %input.display()))]
pub fn run(
    input: &Path,
    config: &AnalysisConfig,
    request: &AnalysisRequest,
    reporter: &ProgressReporter,
) -> Result<Vec<(AnalysisKind, AnalysisOutcome)>, AnalysisError> {
    let marker = CompletionMarker::new(&config.markers.suffix);
    let mut outcomes = Vec::with_capacity(request.kinds.len());
    let mut pending = Vec::new();

    for &kind in &request.kinds {
        let output = kind.output_path(input, request.dipole);
        if !request.force && marker.is_complete(&output) {
            info!(analysis = kind.name(), "Completion marker found; skipping.");
            reporter.report(Progress::Message(format!(
                "{} already complete: {}",
                kind.name(),
                output.display()
            )));
            outcomes.push((kind, AnalysisOutcome::Skipped(output)));
        } else {
            pending.push((kind, output));
        }
    }
    if pending.is_empty() {
        return Ok(outcomes);
    }

    let trajectory = reporter.in_phase("Loading trajectory", || {
        load_trajectory(input, config, reporter)
    })?;
    info!(
        atoms = trajectory.n_atoms(),
        frames = trajectory.n_frames(),
        "Trajectory ready."
    );

    reporter.report(Progress::TaskStart {
        total_steps: pending.len() as u64,
    });
    for (kind, output) in pending {
        reporter.report(Progress::StatusUpdate {
            text: kind.name().to_string(),
        });
        let table = compute_table(kind, &trajectory, config, request.dipole, &output)?;
        table
            .write_to_path(&output)
            .map_err(table_error(&output))?;
        if config.markers.write_on_completion {
            marker.mark(&output).map_err(|source| AnalysisError::Io {
                path: marker.path_for(&output),
                source,
            })?;
        }
        debug!(analysis = kind.name(), rows = table.n_rows(), "Output written to {:?}", output);
        reporter.report(Progress::TaskIncrement { amount: 1 });
        outcomes.push((kind, AnalysisOutcome::Written(output)));
    }
    reporter.report(Progress::TaskFinish);

    Ok(outcomes)
}
