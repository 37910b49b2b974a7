//! GPIO pin abstractions
//!
//! Pins are identified by number. Port drivers configure outputs as a
//! bitmask because the underlying peripheral applies one configuration
//! to every pin of a port at once.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Highest pin number a [`PinMask`] can represent
pub const MAX_PIN: u8 = 63;

/// GPIO pin number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pin(pub u8);

impl Pin {
    /// Create a pin from its number
    pub const fn new(number: u8) -> Self {
        Self(number)
    }

    /// Get the pin number
    pub const fn number(self) -> u8 {
        self.0
    }

    /// Check if the pin fits in a [`PinMask`]
    pub const fn is_maskable(self) -> bool {
        self.0 <= MAX_PIN
    }
}

/// Output level of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Set of pins, one bit per pin number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinMask(pub u64);

impl PinMask {
    /// Empty mask
    pub const EMPTY: Self = Self(0);

    /// Add a pin to the mask
    ///
    /// Pins above [`MAX_PIN`] are ignored.
    pub fn insert(&mut self, pin: Pin) {
        if pin.is_maskable() {
            self.0 |= 1u64 << pin.number();
        }
    }

    /// Check if a pin is in the mask
    pub fn contains(&self, pin: Pin) -> bool {
        pin.is_maskable() && self.0 & (1u64 << pin.number()) != 0
    }

    /// Check if no pin is set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Check if any pin is in both masks
    pub fn intersects(&self, other: PinMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Pins in either mask
    pub const fn union(self, other: PinMask) -> PinMask {
        PinMask(self.0 | other.0)
    }

    /// Iterate over the pins in the mask, lowest first
    pub fn iter(self) -> impl Iterator<Item = Pin> {
        (0..=MAX_PIN).map(Pin).filter(move |pin| self.contains(*pin))
    }
}

impl FromIterator<Pin> for PinMask {
    fn from_iter<I: IntoIterator<Item = Pin>>(iter: I) -> Self {
        let mut mask = PinMask::EMPTY;
        for pin in iter {
            mask.insert(pin);
        }
        mask
    }
}

/// GPIO port driver
///
/// Implementations program the port's direction and level registers.
/// Every call is expected to complete in bounded time, as it may run
/// with interrupts masked.
pub trait GpioPort {
    /// Driver-specific error
    type Error;

    /// Configure every pin in `mask` as a push-pull output
    ///
    /// Pins outside the mask keep their current configuration.
    fn configure_outputs(&mut self, mask: PinMask) -> Result<(), Self::Error>;

    /// Drive an output pin to `level`
    fn set_level(&mut self, pin: Pin, level: Level) -> Result<(), Self::Error>;

    /// Drive an output pin low
    fn set_low(&mut self, pin: Pin) -> Result<(), Self::Error> {
        self.set_level(pin, Level::Low)
    }
}
