//! Per-instance motor configuration

use heapless::Vec;
use stepwave_hal::{Pin, PinMask};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::StepperError;
use crate::pulse::Motion;

/// Maximum instances in a pool
pub const MAX_INSTANCES: usize = 4;

/// Maximum direction/pulse pin pairs per instance
pub const MAX_PIN_PAIRS: usize = 4;

/// Default pulses per revolution (200 full steps × 16 microsteps)
pub const DEFAULT_SUBDIVISION: u32 = 3200;

/// Default minimum pulse width in microseconds
pub const DEFAULT_MIN_PULSE_US: u32 = 3;

/// Default speed in RPM
pub const DEFAULT_RPM: f32 = 10.0;

/// Motor channel identity within the pool (0..N-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instance(pub u8);

impl Instance {
    /// Create an instance handle
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Index into the instance pool
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Direction and pulse pins of one output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinPair {
    /// Direction level pin
    pub direction: Option<Pin>,
    /// Step pulse pin
    pub pulse: Option<Pin>,
}

impl PinPair {
    /// Pair with both pins connected
    pub const fn new(direction: Pin, pulse: Pin) -> Self {
        Self {
            direction: Some(direction),
            pulse: Some(pulse),
        }
    }

    /// Pair with no pins connected
    pub const fn disconnected() -> Self {
        Self {
            direction: None,
            pulse: None,
        }
    }
}

/// Motor configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorConfig {
    /// Pin pairs; backends with a single output use only the first
    pub pins: Vec<PinPair, MAX_PIN_PAIRS>,
    /// Pulses per revolution (full steps × microstep factor)
    pub subdivision: u32,
    /// Shortest pulse the driver accepts, in microseconds
    pub min_pulse_us: u32,
    /// Speed in revolutions per minute
    pub rpm: f32,
    /// Direction pin level
    pub direction: bool,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self::unassigned()
    }
}

impl MotorConfig {
    /// Configuration without pins, using the board defaults
    pub const fn unassigned() -> Self {
        Self {
            pins: Vec::new(),
            subdivision: DEFAULT_SUBDIVISION,
            min_pulse_us: DEFAULT_MIN_PULSE_US,
            rpm: DEFAULT_RPM,
            direction: false,
        }
    }

    /// Conservative configuration held by slots that were never initialized
    ///
    /// No pins, 1 RPM and a wide 6 µs pulse.
    pub const fn parked() -> Self {
        Self {
            pins: Vec::new(),
            subdivision: DEFAULT_SUBDIVISION,
            min_pulse_us: 6,
            rpm: 1.0,
            direction: false,
        }
    }

    /// Single-channel configuration with board defaults
    pub fn new(direction: Pin, pulse: Pin) -> Self {
        let mut config = Self::unassigned();
        // Capacity is at least one
        let _ = config.pins.push(PinPair::new(direction, pulse));
        config
    }

    /// Multi-channel configuration with board defaults
    ///
    /// Returns `None` if more than [`MAX_PIN_PAIRS`] pairs are given.
    pub fn with_pairs(pairs: &[PinPair]) -> Option<Self> {
        let mut config = Self::unassigned();
        config.pins = Vec::from_slice(pairs).ok()?;
        Some(config)
    }

    /// Set the speed
    pub fn with_rpm(mut self, rpm: f32) -> Self {
        self.rpm = rpm;
        self
    }

    /// Set the pulses per revolution
    pub fn with_subdivision(mut self, subdivision: u32) -> Self {
        self.subdivision = subdivision;
        self
    }

    /// Set the minimum pulse width
    pub fn with_min_pulse_us(mut self, min_pulse_us: u32) -> Self {
        self.min_pulse_us = min_pulse_us;
        self
    }

    /// Set the direction level
    pub fn with_direction(mut self, direction: bool) -> Self {
        self.direction = direction;
        self
    }

    /// Connected direction pins
    pub fn direction_pins(&self) -> impl Iterator<Item = Pin> + '_ {
        self.pins.iter().filter_map(|pair| pair.direction)
    }

    /// Connected pulse pins
    pub fn pulse_pins(&self) -> impl Iterator<Item = Pin> + '_ {
        self.pins.iter().filter_map(|pair| pair.pulse)
    }

    /// Every connected pin, direction and pulse alike
    pub fn all_pins(&self) -> impl Iterator<Item = Pin> + '_ {
        self.direction_pins().chain(self.pulse_pins())
    }

    /// Bitmask of every connected pin
    pub fn pin_mask(&self) -> PinMask {
        self.all_pins().collect()
    }

    /// Motion request at `rpm` with this configuration's pulse geometry
    pub fn motion_at(&self, rpm: f32) -> Motion {
        Motion {
            subdivision: self.subdivision,
            rpm,
            min_pulse_us: self.min_pulse_us,
        }
    }

    /// Check the configuration against a backend's limits
    ///
    /// Rejects a zero subdivision or pulse width, a negative or non-finite
    /// speed, an empty or oversized pin list, a missing primary pulse pin,
    /// pins outside the maskable range and pins used twice.
    pub fn validate(&self, max_pairs: usize) -> Result<(), StepperError> {
        if self.subdivision == 0 || self.min_pulse_us == 0 {
            return Err(StepperError::InvalidParameters);
        }
        if !self.rpm.is_finite() || self.rpm < 0.0 {
            return Err(StepperError::InvalidParameters);
        }
        if self.pins.is_empty() || self.pins.len() > max_pairs {
            return Err(StepperError::InvalidParameters);
        }
        if self.pins[0].pulse.is_none() {
            return Err(StepperError::InvalidParameters);
        }

        let mut seen = PinMask::EMPTY;
        for pin in self.all_pins() {
            if !pin.is_maskable() || seen.contains(pin) {
                return Err(StepperError::InvalidParameters);
            }
            seen.insert(pin);
        }

        Ok(())
    }
}
