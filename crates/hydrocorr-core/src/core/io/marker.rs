use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Empty sibling files recording that an output was produced completely.
#[derive(Debug, Clone)]
pub struct CompletionMarker<'a> {
    suffix: &'a str,
}

impl<'a> CompletionMarker<'a> {
    pub fn new(suffix: &'a str) -> Self {
        Self { suffix }
    }

    /// `out.vac.txt` with suffix `dd` is marked by `out.vac.txtdd`.
    pub fn path_for(&self, output: &Path) -> PathBuf {
        let mut name = OsString::from(output.as_os_str());
        name.push(self.suffix);
        PathBuf::from(name)
    }

    pub fn is_complete(&self, output: &Path) -> bool {
        self.path_for(output).is_file()
    }

    pub fn mark(&self, output: &Path) -> io::Result<PathBuf> {
        let path = self.path_for(output);
        File::create(&path)?;
        Ok(path)
    }
}
