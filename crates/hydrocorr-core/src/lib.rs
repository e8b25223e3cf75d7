//! # hydrocorr Core Library
//!
//! Post-processing of molecular-dynamics trajectories of water: time-correlation
//! functions (velocity, dipole, orientation), the vibrational lineshapes derived
//! from them, and structural statistics (bond-length and O–O pair distributions).
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Trajectory`,
//!   `MoleculeLayout`, `CompositeSeries`), file I/O (XYZ trajectories, `.npy`
//!   snapshots, whitespace tables, completion markers) and the pure numeric
//!   kernels (correlation, spectral transform, smoothing, histograms).
//!
//! - **[`engine`]: Configuration and plumbing.** The immutable `AnalysisConfig`,
//!   the error taxonomy shared by every layer and progress reporting.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie `core`
//!   and `engine` together: analysing one trajectory file into output tables,
//!   and averaging tables across an ensemble of trajectories.

pub mod core;
pub mod engine;
pub mod workflows;
