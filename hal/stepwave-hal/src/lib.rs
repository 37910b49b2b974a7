//! Stepwave peripheral abstraction layer
//!
//! This crate defines the peripheral interfaces the stepper engine drives.
//! Chip support crates implement them on top of their register-level
//! drivers; the engine itself never touches hardware directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  stepwave-core (lifecycle + translator) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  stepwave-drivers (pulse backends)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  stepwave-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ duty-register │       │ sequence PWM  │
//! │  PWM timers   │       │  peripherals  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::GpioPort`] - Port-wide output configuration and pin levels
//! - [`pwm::DutyTimer`] - Timer-counter PWM with a duty register
//! - [`sequence::SequencePwm`] - Sequence-playback PWM with base clock tiers
//!
//! Host mocks of every trait live in `mock`, behind the `mock` feature.

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod mock;
pub mod pwm;
pub mod sequence;

// Re-export key types at crate root for convenience
pub use gpio::{GpioPort, Level, Pin, PinMask};
pub use pwm::DutyTimer;
pub use sequence::{BaseClock, SequenceOutputs, SequencePwm, SequencePwmError};
