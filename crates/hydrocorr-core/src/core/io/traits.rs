use crate::core::models::trajectory::Trajectory;
use crate::engine::progress::ProgressReporter;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading multi-frame trajectory formats.
///
/// Implementors stop at the first frame that cannot be read completely and
/// return the frames parsed so far, so a truncated file is not an error.
pub trait TrajectoryFile {
    /// The error type for I/O and header failures.
    type Error: Error + From<io::Error>;

    /// Reads at most `max_frames` frames from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is unusable, if not even one frame can
    /// be read, or if the underlying reader fails.
    fn read_from(
        reader: &mut impl BufRead,
        max_frames: usize,
        reporter: &ProgressReporter,
    ) -> Result<Trajectory, Self::Error>;

    /// Reads only the atom labels declared by the first frame.
    fn read_labels(reader: &mut impl BufRead) -> Result<Vec<String>, Self::Error>;

    /// Reads at most `max_frames` frames from a file path.
    fn read_from_path<P: AsRef<Path>>(
        path: P,
        max_frames: usize,
        reporter: &ProgressReporter,
    ) -> Result<Trajectory, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, max_frames, reporter)
    }

    fn read_labels_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<String>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_labels(&mut reader)
    }
}
