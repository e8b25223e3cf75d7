pub mod analyze;
pub mod average;
pub mod ir;

use crate::error::{CliError, Result};
use crate::utils::discovery::find_files;
use hydrocorr::core::io::table::Table;
use hydrocorr::engine::error::AnalysisError;
use std::path::{Path, PathBuf};

fn write_table(table: &Table, path: &Path) -> Result<()> {
    table.write_to_path(path).map_err(|source| {
        CliError::Core(AnalysisError::Table {
            path: path.to_path_buf(),
            source,
        })
    })
}

fn require_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let files = find_files(dir, pattern)?;
    if files.is_empty() {
        return Err(CliError::Argument(format!(
            "No files matching '{}' in '{}'",
            pattern,
            dir.display()
        )));
    }
    Ok(files)
}
