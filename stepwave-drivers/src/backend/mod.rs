//! Pulse backends, one per peripheral family

pub mod ledc;
pub mod sequence;

pub use ledc::LedcBackend;
pub use sequence::SequenceBackend;
