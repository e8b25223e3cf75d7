//! File formats read and written by the analyses.
//!
//! Trajectories come in as multi-frame XYZ text ([`xyz`]) and are cached as
//! `.npy` snapshots ([`snapshot`]). Results go out as whitespace-delimited
//! tables ([`table`]) guarded by completion markers ([`marker`]).

pub mod marker;
pub mod snapshot;
pub mod table;
pub mod traits;
pub mod xyz;
