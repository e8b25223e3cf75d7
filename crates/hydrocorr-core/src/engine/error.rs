use super::config::ConfigError;
use crate::core::analysis::quantities::QuantityError;
use crate::core::io::snapshot::SnapshotError;
use crate::core::io::table::TableError;
use crate::core::io::xyz::XyzError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to read trajectory '{path}': {source}")]
    Trajectory {
        path: PathBuf,
        #[source]
        source: XyzError,
    },

    #[error("Snapshot cache error: {source}")]
    Snapshot {
        #[from]
        source: SnapshotError,
    },

    #[error("Failed to derive molecular quantity: {source}")]
    Quantity {
        #[from]
        source: QuantityError,
    },

    #[error("Table error for '{path}': {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No input tables to average")]
    NoInputs,
}
