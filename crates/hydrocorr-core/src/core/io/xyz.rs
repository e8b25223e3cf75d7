use crate::core::io::traits::TrajectoryFile;
use crate::core::models::trajectory::{Trajectory, TrajectoryError};
use crate::engine::progress::{Progress, ProgressReporter};
use ndarray::Array3;
use std::fmt;
use std::io::{self, BufRead};
use thiserror::Error;
use tracing::{debug, info, warn};

const FRAME_LOG_INTERVAL: usize = 1000;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("File is empty")]
    Empty,
    #[error("Invalid atom count on line 1 (value: '{0}')")]
    InvalidAtomCount(String),
    #[error("No complete frame could be read: {0}")]
    NoFrames(StopReason),
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
}

/// Why frame parsing ended before `max_frames` was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndOfFile,
    TruncatedFrame { line: usize },
    MalformedLine { line: usize, content: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfFile => write!(f, "end of file"),
            StopReason::TruncatedFrame { line } => {
                write!(f, "file ends inside a frame at line {}", line)
            }
            StopReason::MalformedLine { line, content } => {
                write!(f, "malformed coordinate line {}: '{}'", line, content)
            }
        }
    }
}

struct LineReader<'r, R: BufRead> {
    inner: &'r mut R,
    buf: String,
    line: usize,
}

impl<'r, R: BufRead> LineReader<'r, R> {
    fn new(inner: &'r mut R) -> Self {
        Self {
            inner,
            buf: String::new(),
            line: 0,
        }
    }

    /// Moves to the next line; `false` at end of input.
    fn advance(&mut self) -> io::Result<bool> {
        self.buf.clear();
        if self.inner.read_line(&mut self.buf)? == 0 {
            return Ok(false);
        }
        self.line += 1;
        Ok(true)
    }

    fn current(&self) -> &str {
        self.buf.trim_end_matches(['\n', '\r'])
    }
}

/// Splits an atom line into its label and the first three coordinates.
fn parse_atom_line(line: &str) -> Option<(&str, [f64; 3])> {
    let mut fields = line.split_whitespace();
    let label = fields.next()?;
    let mut xyz = [0.0; 3];
    for value in xyz.iter_mut() {
        *value = fields.next()?.parse().ok()?;
    }
    Some((label, xyz))
}

fn parse_atom_count(line: &str) -> Result<usize, XyzError> {
    let trimmed = line.trim();
    trimmed
        .parse()
        .ok()
        .filter(|&n: &usize| n > 0)
        .ok_or_else(|| XyzError::InvalidAtomCount(trimmed.to_string()))
}

/// Multi-frame XYZ trajectories: per frame a count line, a comment line and
/// one `label x y z` line per atom.
pub struct XyzFile;

impl XyzFile {
    /// Reads one frame into `coords`. Returns `Some(reason)` when the frame is incomplete.
    ///
    /// The count line of the first frame has already been consumed by the
    /// header parser; later count lines are not re-validated.
    fn read_frame<R: BufRead>(
        lines: &mut LineReader<'_, R>,
        natoms: usize,
        coords: &mut Vec<f64>,
        mut labels: Option<&mut Vec<String>>,
        count_line_consumed: bool,
    ) -> io::Result<Option<StopReason>> {
        if !count_line_consumed && (!lines.advance()? || lines.current().trim().is_empty()) {
            return Ok(Some(StopReason::EndOfFile));
        }
        if !lines.advance()? {
            return Ok(Some(StopReason::TruncatedFrame { line: lines.line }));
        }
        for _ in 0..natoms {
            if !lines.advance()? {
                return Ok(Some(StopReason::TruncatedFrame { line: lines.line }));
            }
            let Some((label, xyz)) = parse_atom_line(lines.current()) else {
                return Ok(Some(StopReason::MalformedLine {
                    line: lines.line,
                    content: lines.current().to_string(),
                }));
            };
            if let Some(labels) = labels.as_deref_mut() {
                labels.push(label.to_string());
            }
            coords.extend_from_slice(&xyz);
        }
        Ok(None)
    }
}

impl TrajectoryFile for XyzFile {
    type Error = XyzError;

    fn read_from(
        reader: &mut impl BufRead,
        max_frames: usize,
        reporter: &ProgressReporter,
    ) -> Result<Trajectory, Self::Error> {
        let mut lines = LineReader::new(reader);
        if !lines.advance()? {
            return Err(XyzError::Empty);
        }
        let natoms = parse_atom_count(lines.current())?;

        let frame_len = natoms * 3;
        let mut labels = Vec::with_capacity(natoms);
        let mut coords: Vec<f64> = Vec::new();
        let mut frames = 0usize;

        while frames < max_frames {
            let first = frames == 0;
            let labels_out = first.then_some(&mut labels);
            if let Some(reason) =
                Self::read_frame(&mut lines, natoms, &mut coords, labels_out, first)?
            {
                coords.truncate(frames * frame_len);
                if frames == 0 {
                    return Err(XyzError::NoFrames(reason));
                }
                match reason {
                    StopReason::EndOfFile => debug!(frames, "Reached end of trajectory."),
                    other => warn!(frames, "Stopped reading trajectory: {}", other),
                }
                break;
            }
            frames += 1;
            if frames % FRAME_LOG_INTERVAL == 0 {
                debug!(frames, "Parsed trajectory frames.");
                reporter.report(Progress::StatusUpdate {
                    text: format!("{} frames", frames),
                });
            }
        }

        info!(atoms = natoms, frames, "Trajectory parsed.");
        let positions = Array3::from_shape_vec((frames, natoms, 3), coords)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            .permuted_axes([1, 2, 0])
            .as_standard_layout()
            .into_owned();
        Ok(Trajectory::new(labels, positions)?)
    }

    fn read_labels(reader: &mut impl BufRead) -> Result<Vec<String>, Self::Error> {
        let mut lines = LineReader::new(reader);
        if !lines.advance()? {
            return Err(XyzError::Empty);
        }
        let natoms = parse_atom_count(lines.current())?;
        if !lines.advance()? {
            return Err(XyzError::NoFrames(StopReason::TruncatedFrame { line: lines.line }));
        }
        let mut labels = Vec::with_capacity(natoms);
        for _ in 0..natoms {
            if !lines.advance()? {
                return Err(XyzError::NoFrames(StopReason::TruncatedFrame {
                    line: lines.line,
                }));
            }
            let label = lines.current().split_whitespace().next().unwrap_or_default();
            labels.push(label.to_string());
        }
        Ok(labels)
    }
}
