//! # Core Module
//!
//! Data structures, file formats and numeric kernels for trajectory analysis.
//!
//! - **Models** ([`models`]) - Trajectories, molecule layouts and derived per-molecule series
//! - **File I/O** ([`io`]) - XYZ parsing, binary snapshots, output tables and skip markers
//! - **Numerics** ([`analysis`]) - Molecular quantities, autocorrelation, spectra, smoothing, histograms
//! - **Utilities** ([`utils`]) - Periodic-boundary geometry helpers

pub mod analysis;
pub mod io;
pub mod models;
pub mod utils;
