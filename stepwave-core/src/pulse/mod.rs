//! Pulse parameter translation
//!
//! Pure conversions from motion intent (pulses per revolution, RPM,
//! minimum pulse width) to the values a PWM peripheral is programmed
//! with. Nothing here touches hardware or shared state.
//!
//! Two peripheral families are covered:
//!
//! - [`duty`]: timers with a selectable counter resolution and a duty
//!   register. The resolution band follows the pulse frequency.
//! - [`tier`]: sequence PWM with fixed base clocks. The clock tier
//!   follows the pulse period.

pub mod duty;
pub mod tier;

pub use duty::{DutyParams, DutyResolution};
pub use tier::TierParams;

/// Microseconds per second
pub const US_PER_SECOND: u32 = 1_000_000;

/// Microseconds per minute
const US_PER_MINUTE: f32 = 60_000_000.0;

/// Motion request handed to a translator
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Motion {
    /// Pulses per revolution
    pub subdivision: u32,
    /// Speed in revolutions per minute
    pub rpm: f32,
    /// Shortest valid pulse in microseconds
    pub min_pulse_us: u32,
}

impl Motion {
    /// Pulse frequency for this motion
    pub fn frequency_hz(&self) -> u32 {
        frequency_hz(self.subdivision, self.rpm)
    }

    /// Pulse period for this motion
    pub fn period_us(&self) -> Option<u32> {
        period_us(self.subdivision, self.rpm)
    }
}

/// Convert a speed to a pulse frequency in Hz
///
/// `rpm * subdivision / 60`, truncated toward zero. Zero means the motor
/// should stop; a negative or non-finite speed also yields zero.
pub fn frequency_hz(subdivision: u32, rpm: f32) -> u32 {
    if !rpm.is_finite() || rpm <= 0.0 {
        return 0;
    }
    // Float-to-int casts saturate
    (rpm * subdivision as f32 / 60.0) as u32
}

/// Convert a speed to a pulse period in microseconds
///
/// Returns `None` when the motor is not moving.
pub fn period_us(subdivision: u32, rpm: f32) -> Option<u32> {
    if !rpm.is_finite() || rpm <= 0.0 || subdivision == 0 {
        return None;
    }
    Some((US_PER_MINUTE / (rpm * subdivision as f32)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_frequency_truncates() {
        // 3200 * 10 / 60 = 533.33
        assert_eq!(frequency_hz(3200, 10.0), 533);
        assert_eq!(frequency_hz(3200, 60.0), 3200);
        assert_eq!(frequency_hz(200, 1.0), 3);
    }

    #[test]
    fn test_zero_speed_means_stop() {
        assert_eq!(frequency_hz(3200, 0.0), 0);
        assert_eq!(frequency_hz(3200, -5.0), 0);
        assert_eq!(frequency_hz(3200, f32::NAN), 0);
        assert_eq!(period_us(3200, 0.0), None);
    }

    #[test]
    fn test_period() {
        // 60 RPM at 3200 pulses/rev = 3200 Hz = 312.5 us
        assert_eq!(period_us(3200, 60.0), Some(312));
        // 1 RPM at 200 pulses/rev = 3.33 Hz = 300 ms
        assert_eq!(period_us(200, 1.0), Some(300_000));
    }

    proptest! {
        #[test]
        fn prop_frequency_matches_integer_formula(
            subdivision in 1u32..5000,
            rpm in 0u32..3000,
        ) {
            let expected = rpm * subdivision / 60;
            prop_assert_eq!(frequency_hz(subdivision, rpm as f32), expected);
        }

        #[test]
        fn prop_zero_rpm_is_zero_frequency(subdivision in 1u32..=u32::MAX) {
            prop_assert_eq!(frequency_hz(subdivision, 0.0), 0);
        }
    }
}
