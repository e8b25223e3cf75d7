pub mod correlation;
pub mod quantities;
pub mod smoothing;
pub mod spectrum;
pub mod structure;
