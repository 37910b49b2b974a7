//! Sequence-playback PWM
//!
//! PWM peripherals that count up to a programmable top value at one of
//! several fixed base clocks, and play back a sequence of compare values
//! from memory. One peripheral instance drives up to four output
//! channels sharing the same period.

use crate::gpio::Pin;

/// Output channels per sequence PWM instance
pub const SEQUENCE_CHANNELS: usize = 4;

/// Largest counter top value (15-bit counter)
pub const MAX_COUNTER_TOP: u16 = 0x7FFF;

/// Per-channel output pins, `None` leaves the channel disconnected
pub type SequenceOutputs = [Option<Pin>; SEQUENCE_CHANNELS];

/// Base clock feeding the PWM counter
///
/// Ordered from fastest to slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaseClock {
    Mhz16,
    Mhz8,
    Mhz4,
    Mhz2,
    Mhz1,
    Khz500,
    Khz250,
    Khz125,
}

impl BaseClock {
    /// All clocks, fastest first
    pub const ALL: [BaseClock; 8] = [
        BaseClock::Mhz16,
        BaseClock::Mhz8,
        BaseClock::Mhz4,
        BaseClock::Mhz2,
        BaseClock::Mhz1,
        BaseClock::Khz500,
        BaseClock::Khz250,
        BaseClock::Khz125,
    ];

    /// Clock frequency in Hz
    pub const fn hz(self) -> u32 {
        match self {
            BaseClock::Mhz16 => 16_000_000,
            BaseClock::Mhz8 => 8_000_000,
            BaseClock::Mhz4 => 4_000_000,
            BaseClock::Mhz2 => 2_000_000,
            BaseClock::Mhz1 => 1_000_000,
            BaseClock::Khz500 => 500_000,
            BaseClock::Khz250 => 250_000,
            BaseClock::Khz125 => 125_000,
        }
    }

    /// Prescaler exponent relative to 16 MHz (DIV_1 = 0 .. DIV_128 = 7)
    pub const fn prescaler(self) -> u8 {
        self as u8
    }
}

/// Errors reported by a sequence PWM driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencePwmError {
    /// The instance is already initialized and must be uninitialized first
    AlreadyInitialized,
    /// The instance has not been initialized
    NotInitialized,
    /// The driver rejected a value (top, compare or pin)
    InvalidValue,
    /// The peripheral could not be accessed
    Peripheral,
}

/// Sequence-playback PWM driver
pub trait SequencePwm {
    /// Number of PWM instances the chip provides
    fn instance_count(&self) -> usize;

    /// Initialize an instance with its base clock and counter top
    ///
    /// Returns [`SequencePwmError::AlreadyInitialized`] when the instance
    /// is already bound.
    fn init(
        &mut self,
        instance: u8,
        outputs: &SequenceOutputs,
        clock: BaseClock,
        top: u16,
    ) -> Result<(), SequencePwmError>;

    /// Release an instance; releasing an unbound instance is a no-op
    fn uninit(&mut self, instance: u8);

    /// Play a one-value sequence in a loop with `compare` as the common
    /// duty of every channel
    fn play_loop(&mut self, instance: u8, compare: u16) -> Result<(), SequencePwmError>;

    /// Stop playback at the end of the current period
    fn stop(&mut self, instance: u8) -> Result<(), SequencePwmError>;
}
