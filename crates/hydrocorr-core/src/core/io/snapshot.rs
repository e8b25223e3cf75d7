use crate::core::io::traits::TrajectoryFile;
use crate::core::io::xyz::{XyzError, XyzFile};
use crate::core::models::trajectory::{Trajectory, TrajectoryError};
use crate::engine::config::CacheValidation;
use ndarray::{Array3, Axis};
use ndarray_npy::{ReadNpyError, WriteNpyError, read_npy, write_npy};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const SNAPSHOT_SUFFIX: &str = ".npy";
const METADATA_SUFFIX: &str = ".npy.toml";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read snapshot '{path}': {source}")]
    ReadNpy {
        path: PathBuf,
        #[source]
        source: ReadNpyError,
    },
    #[error("Failed to write snapshot '{path}': {source}")]
    WriteNpy {
        path: PathBuf,
        #[source]
        source: WriteNpyError,
    },
    #[error("Invalid snapshot metadata '{path}': {source}")]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to encode snapshot metadata: {0}")]
    MetadataEncode(#[from] toml::ser::Error),
    #[error("Snapshot '{path}' does not match its metadata: {reason}")]
    Inconsistent { path: PathBuf, reason: String },
    #[error("Failed to read labels from '{path}': {source}")]
    Labels {
        path: PathBuf,
        #[source]
        source: XyzError,
    },
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Sidecar describing a snapshot and the source file it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotMetadata {
    pub version: u32,
    pub atoms: usize,
    pub frames: usize,
    /// Frame cap in effect when the source was parsed.
    pub frame_limit: usize,
    pub labels: Vec<String>,
    pub source_len: u64,
    pub source_hash: String,
}

/// Fingerprint of a trajectory file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFingerprint {
    pub len: u64,
    pub hash: String,
}

impl SourceFingerprint {
    pub fn of(path: &Path) -> Result<Self, SnapshotError> {
        let file = File::open(path).map_err(io_error(path))?;
        let len = file.metadata().map_err(io_error(path))?.len();
        let mut hasher = blake3::Hasher::new();
        hasher
            .update_reader(BufReader::new(file))
            .map_err(io_error(path))?;
        Ok(Self {
            len,
            hash: hasher.finalize().to_hex().to_string(),
        })
    }
}

/// Frames up to and including the last one with any non-zero coordinate.
///
/// Snapshots without metadata are preallocated for the frame cap and
/// zero-filled past the last parsed frame.
fn populated_frames(positions: &Array3<f64>) -> usize {
    let frames = positions.dim().2;
    (0..frames)
        .rev()
        .find(|&f| positions.index_axis(Axis(2), f).iter().any(|&v| v != 0.0))
        .map_or(0, |last| last + 1)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Binary `.npy` snapshots of parsed trajectories, stored next to the source file.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotCache {
    validation: CacheValidation,
}

impl SnapshotCache {
    pub fn new(validation: CacheValidation) -> Self {
        Self { validation }
    }

    pub fn snapshot_path(source: &Path) -> PathBuf {
        with_suffix(source, SNAPSHOT_SUFFIX)
    }

    pub fn metadata_path(source: &Path) -> PathBuf {
        with_suffix(source, METADATA_SUFFIX)
    }

    fn read_metadata(path: &Path) -> Result<Option<SnapshotMetadata>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(io_error(path))?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| SnapshotError::MetadataParse {
                path: path.to_path_buf(),
                source,
            })
    }

    fn read_array(path: &Path) -> Result<Array3<f64>, SnapshotError> {
        read_npy(path).map_err(|source| SnapshotError::ReadNpy {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the snapshot for `source` if one exists and is considered valid.
    ///
    /// `fingerprint` is computed on demand for content-hash validation and
    /// ignored otherwise. Under content-hash validation a snapshot that was cut
    /// short by a smaller frame cap than `max_frames` is not reused.
    /// Returns `Ok(None)` when there is no usable snapshot.
    pub fn load(
        &self,
        source: &Path,
        fingerprint: Option<&SourceFingerprint>,
        max_frames: usize,
    ) -> Result<Option<Trajectory>, SnapshotError> {
        let snapshot_path = Self::snapshot_path(source);
        if !snapshot_path.exists() {
            debug!("No snapshot at {:?}", snapshot_path);
            return Ok(None);
        }
        let metadata = Self::read_metadata(&Self::metadata_path(source))?;

        match (self.validation, metadata) {
            (CacheValidation::ContentHash, None) => {
                info!("Snapshot {:?} has no metadata; re-parsing.", snapshot_path);
                Ok(None)
            }
            (CacheValidation::ContentHash, Some(meta)) => {
                let current = match fingerprint {
                    Some(f) => f.clone(),
                    None => SourceFingerprint::of(source)?,
                };
                if meta.version != FORMAT_VERSION
                    || meta.source_len != current.len
                    || meta.source_hash != current.hash
                {
                    info!("Snapshot {:?} is stale; re-parsing.", snapshot_path);
                    return Ok(None);
                }
                if meta.frames < max_frames && meta.frames >= meta.frame_limit {
                    info!(
                        frames = meta.frames,
                        "Snapshot {:?} was capped below the requested frame count; re-parsing.",
                        snapshot_path
                    );
                    return Ok(None);
                }
                Self::assemble(&snapshot_path, meta).map(Some)
            }
            (CacheValidation::FileName, Some(meta)) => {
                Self::assemble(&snapshot_path, meta).map(Some)
            }
            (CacheValidation::FileName, None) => {
                let positions = Self::read_array(&snapshot_path)?;
                let labels = XyzFile::read_labels_from_path(source).map_err(|source_err| {
                    SnapshotError::Labels {
                        path: source.to_path_buf(),
                        source: source_err,
                    }
                })?;
                let stored = positions.dim().2;
                let populated = populated_frames(&positions);
                if populated == 0 {
                    info!("Snapshot {:?} holds no populated frames; re-parsing.", snapshot_path);
                    return Ok(None);
                }
                warn!(
                    stored,
                    populated,
                    "Using snapshot {:?} without metadata; trailing all-zero frames are dropped.",
                    snapshot_path
                );
                Ok(Some(Trajectory::new(labels, positions)?.truncated(populated)))
            }
        }
    }

    fn assemble(path: &Path, meta: SnapshotMetadata) -> Result<Trajectory, SnapshotError> {
        let positions = Self::read_array(path)?;
        let (atoms, _, frames) = positions.dim();
        if atoms != meta.atoms || frames != meta.frames {
            return Err(SnapshotError::Inconsistent {
                path: path.to_path_buf(),
                reason: format!(
                    "array holds {} atoms x {} frames, metadata declares {} x {}",
                    atoms, frames, meta.atoms, meta.frames
                ),
            });
        }
        info!(frames, "Loaded trajectory snapshot {:?}", path);
        Ok(Trajectory::new(meta.labels, positions)?)
    }

    /// Writes the snapshot and its metadata sidecar for `source`.
    pub fn store(
        &self,
        source: &Path,
        trajectory: &Trajectory,
        fingerprint: &SourceFingerprint,
        frame_limit: usize,
    ) -> Result<(), SnapshotError> {
        let snapshot_path = Self::snapshot_path(source);
        write_npy(&snapshot_path, trajectory.positions()).map_err(|source| {
            SnapshotError::WriteNpy {
                path: snapshot_path.clone(),
                source,
            }
        })?;

        let metadata = SnapshotMetadata {
            version: FORMAT_VERSION,
            atoms: trajectory.n_atoms(),
            frames: trajectory.n_frames(),
            frame_limit,
            labels: trajectory.labels().to_vec(),
            source_len: fingerprint.len,
            source_hash: fingerprint.hash.clone(),
        };
        let metadata_path = Self::metadata_path(source);
        fs::write(&metadata_path, toml::to_string(&metadata)?)
            .map_err(io_error(&metadata_path))?;
        debug!("Snapshot written to {:?}", snapshot_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_trajectory() -> Trajectory {
        let positions = Array3::from_shape_fn((3, 3, 4), |(a, x, f)| (a * 100 + x * 10 + f) as f64);
        Trajectory::new(vec!["O".into(), "H".into(), "H".into()], positions).unwrap()
    }

    fn write_source(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("simu_1.xc.xyz");
        fs::write(&path, content).unwrap();
        path
    }

    const SOURCE: &str = "3\n\nO 0 0 0\nH 1 0 0\nH 0 1 0\n";

    #[test]
    fn snapshot_paths_append_fixed_suffixes() {
        let source = Path::new("/data/simu_1.xc.xyz");
        assert_eq!(
            SnapshotCache::snapshot_path(source),
            PathBuf::from("/data/simu_1.xc.xyz.npy")
        );
        assert_eq!(
            SnapshotCache::metadata_path(source),
            PathBuf::from("/data/simu_1.xc.xyz.npy.toml")
        );
    }

    #[test]
    fn store_then_load_returns_same_trajectory() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        let fingerprint = SourceFingerprint::of(&source).unwrap();
        let cache = SnapshotCache::new(CacheValidation::ContentHash);
        let traj = sample_trajectory();

        cache.store(&source, &traj, &fingerprint, 100).unwrap();
        let loaded = cache.load(&source, Some(&fingerprint), 100).unwrap();

        assert_eq!(loaded, Some(traj));
    }

    #[test]
    fn content_hash_validation_rejects_modified_source() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        let cache = SnapshotCache::new(CacheValidation::ContentHash);
        cache
            .store(&source, &sample_trajectory(), &SourceFingerprint::of(&source).unwrap(), 100)
            .unwrap();

        fs::write(&source, "3\n\nO 9 9 9\nH 1 0 0\nH 0 1 0\n").unwrap();

        assert_eq!(cache.load(&source, None, 100).unwrap(), None);
    }

    #[test]
    fn file_name_validation_reuses_snapshot_of_modified_source() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        let cache = SnapshotCache::new(CacheValidation::FileName);
        let traj = sample_trajectory();
        cache
            .store(&source, &traj, &SourceFingerprint::of(&source).unwrap(), 100)
            .unwrap();

        fs::write(&source, "3\n\nO 9 9 9\nH 1 0 0\nH 0 1 0\n").unwrap();

        assert_eq!(cache.load(&source, None, 100).unwrap(), Some(traj));
    }

    #[test]
    fn file_name_validation_accepts_snapshot_without_metadata() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        let traj = sample_trajectory();
        write_npy(SnapshotCache::snapshot_path(&source), traj.positions()).unwrap();

        let loaded = SnapshotCache::new(CacheValidation::FileName)
            .load(&source, None, 100)
            .unwrap()
            .unwrap();

        assert_eq!(loaded.labels(), &["O", "H", "H"]);
        assert_eq!(loaded.n_frames(), 4);
    }

    #[test]
    fn snapshot_without_metadata_drops_zero_padded_frames() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        let mut padded = Array3::zeros((3, 3, 20));
        for f in 0..5 {
            for a in 0..3 {
                padded[[a, 0, f]] = 1.0 + (a * 5 + f) as f64;
            }
        }
        write_npy(SnapshotCache::snapshot_path(&source), &padded).unwrap();

        let loaded = SnapshotCache::new(CacheValidation::FileName)
            .load(&source, None, 100)
            .unwrap()
            .unwrap();

        assert_eq!(loaded.n_frames(), 5);
        assert_eq!(loaded.position(2, 4).x, 15.0);
    }

    #[test]
    fn all_zero_snapshot_without_metadata_is_not_reused() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        write_npy(SnapshotCache::snapshot_path(&source), &Array3::<f64>::zeros((3, 3, 8))).unwrap();

        let loaded = SnapshotCache::new(CacheValidation::FileName)
            .load(&source, None, 100)
            .unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn content_hash_validation_ignores_snapshot_without_metadata() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        write_npy(SnapshotCache::snapshot_path(&source), sample_trajectory().positions()).unwrap();

        let loaded = SnapshotCache::new(CacheValidation::ContentHash)
            .load(&source, None, 100)
            .unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_without_snapshot_returns_none() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        let loaded = SnapshotCache::new(CacheValidation::FileName)
            .load(&source, None, 100)
            .unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn inconsistent_metadata_is_an_error() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        let fingerprint = SourceFingerprint::of(&source).unwrap();
        let cache = SnapshotCache::new(CacheValidation::FileName);
        cache.store(&source, &sample_trajectory(), &fingerprint, 100).unwrap();

        let meta_path = SnapshotCache::metadata_path(&source);
        let content = fs::read_to_string(&meta_path).unwrap();
        fs::write(&meta_path, content.replace("frames = 4", "frames = 7")).unwrap();

        assert!(matches!(
            cache.load(&source, None, 100),
            Err(SnapshotError::Inconsistent { .. })
        ));
    }

    #[test]
    fn capped_snapshot_is_not_reused_for_a_larger_frame_request() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        let fingerprint = SourceFingerprint::of(&source).unwrap();
        let cache = SnapshotCache::new(CacheValidation::ContentHash);
        let traj = sample_trajectory();
        cache.store(&source, &traj, &fingerprint, 4).unwrap();

        assert_eq!(cache.load(&source, Some(&fingerprint), 4).unwrap(), Some(traj.clone()));
        assert_eq!(cache.load(&source, Some(&fingerprint), 2).unwrap(), Some(traj));
        assert_eq!(cache.load(&source, Some(&fingerprint), 10).unwrap(), None);
    }
}
