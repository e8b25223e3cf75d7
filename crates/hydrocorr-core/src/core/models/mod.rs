//! In-memory representations of trajectories and the per-molecule series derived from them.

pub mod layout;
pub mod series;
pub mod trajectory;
