//! Hardware abstraction traits
//!
//! These traits define the interface between the lifecycle logic and
//! peripheral-family implementations.

pub mod backend;

pub use backend::PulseBackend;
