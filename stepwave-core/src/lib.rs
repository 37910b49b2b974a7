//! Board-agnostic stepper pulse engine
//!
//! This crate contains everything that does not depend on a specific
//! PWM peripheral:
//!
//! - Pulse parameter translation (RPM to frequency, duty, clock tier)
//! - Instance state table and pin ownership
//! - Lifecycle controller (init, start, stop, speed and direction updates)
//! - The `PulseBackend` capability trait implemented per peripheral family
//! - Configuration types and the error taxonomy

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod controller;
pub mod error;
pub mod pulse;
pub mod table;
pub mod traits;

pub use controller::StepperController;
pub use error::StepperError;
