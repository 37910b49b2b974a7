//! Duty-register PWM timers
//!
//! Timer-counter PWM peripherals (LED-control style) where each output
//! channel is bound to its own timer. The timer runs at a selectable
//! counter resolution and frequency; the channel compares the counter
//! against a duty register.

use crate::gpio::Pin;

/// Timer-counter PWM driver
///
/// `channel` selects both the timer and the output channel bound to it.
pub trait DutyTimer {
    /// Driver-specific error
    type Error;

    /// Number of timer/channel pairs the peripheral provides
    fn channel_count(&self) -> usize;

    /// Program timer and channel from scratch
    ///
    /// The timer counts with `resolution_bits` of resolution at
    /// `frequency_hz`, the channel routes its output to `pin` with the
    /// given duty. The timer is left paused.
    fn configure(
        &mut self,
        channel: u8,
        pin: Pin,
        resolution_bits: u8,
        frequency_hz: u32,
        duty: u32,
    ) -> Result<(), Self::Error>;

    /// Change the timer frequency, keeping the counter resolution
    fn set_frequency(&mut self, channel: u8, frequency_hz: u32) -> Result<(), Self::Error>;

    /// Load a new duty value and latch it into the channel
    fn set_duty(&mut self, channel: u8, duty: u32) -> Result<(), Self::Error>;

    /// Stop the counter, holding the output at its idle level
    fn pause(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Restart the counter
    fn resume(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Reset the counter to zero
    fn reset(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Detach the channel output from its pin
    ///
    /// Peripherals without an explicit teardown can rely on the default.
    fn release(&mut self, channel: u8) -> Result<(), Self::Error> {
        let _ = channel;
        Ok(())
    }
}
