use crate::error::{CliError, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Regular files in `dir` whose names match the glob `pattern`, sorted by path.
///
/// The directory part is escaped, so only `pattern` carries wildcards.
pub fn find_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CliError::Argument(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }
    Pattern::new(pattern)
        .map_err(|e| CliError::Argument(format!("Invalid file pattern '{}': {}", pattern, e)))?;

    let full_pattern = Path::new(&Pattern::escape(&dir.to_string_lossy())).join(pattern);
    let entries = glob::glob(&full_pattern.to_string_lossy())
        .map_err(|e| CliError::Argument(format!("Invalid file pattern '{}': {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CliError::Io(e.into_error()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!(dir = %dir.display(), pattern, found = files.len(), "Discovered files.");
    Ok(files)
}
