pub mod analyze;
pub mod ensemble;
