//! Pulse backend implementations
//!
//! This crate provides the `PulseBackend` implementations that connect
//! the stepwave lifecycle controller to a PWM peripheral family:
//!
//! - Duty-register timers with 8/14-bit resolution bands (LEDC style)
//! - Sequence-playback PWM with base clock tiers

#![no_std]
#![deny(unsafe_code)]

pub mod backend;

pub use backend::{LedcBackend, SequenceBackend};
