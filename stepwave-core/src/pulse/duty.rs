//! Fixed-resolution duty translation
//!
//! For timer-counter PWM with a selectable counter resolution. Above
//! [`FREQUENCY_THRESHOLD_HZ`] periods are short and a coarse 8-bit
//! counter gives enough room for the divider; below it periods are long
//! and a 14-bit counter keeps the minimum pulse from being stretched.
//!
//! Moving between the two bands needs a full timer reconfiguration,
//! staying inside one band allows a live frequency/duty update.

use super::{Motion, US_PER_SECOND};
use crate::error::StepperError;

/// Frequency above which the coarse resolution is used
pub const FREQUENCY_THRESHOLD_HZ: u32 = 360;

/// Timer source clock (APB)
pub const SOURCE_CLOCK_HZ: u32 = 80_000_000;

/// Fractional bits of the timer clock divider
pub const DIVIDER_FRAC_BITS: u32 = 8;

/// Smallest divider (1.0 in 10.8 fixed point)
const DIVIDER_MIN: u64 = 1 << DIVIDER_FRAC_BITS;

/// Divider register width (10 integer + 8 fractional bits)
const DIVIDER_LIMIT: u64 = 1 << 18;

/// Duty used when the minimum pulse is shorter than one counter tick
pub const MIN_DUTY_TICKS: u32 = 2;

/// Counter resolution band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DutyResolution {
    /// 8-bit counter, for high pulse rates
    Bits8,
    /// 14-bit counter, for low pulse rates
    Bits14,
}

impl DutyResolution {
    /// Pick the band for a pulse frequency
    pub fn select(frequency_hz: u32) -> Self {
        if frequency_hz > FREQUENCY_THRESHOLD_HZ {
            DutyResolution::Bits8
        } else {
            DutyResolution::Bits14
        }
    }

    /// Counter width in bits
    pub const fn bits(self) -> u8 {
        match self {
            DutyResolution::Bits8 => 8,
            DutyResolution::Bits14 => 14,
        }
    }

    /// Largest duty value
    pub const fn max_duty(self) -> u32 {
        (1 << self.bits()) - 1
    }
}

/// Parameters for a duty-register timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyParams {
    /// Timer frequency (one pulse per period)
    pub frequency_hz: u32,
    /// Counter resolution
    pub resolution: DutyResolution,
    /// Duty in counter ticks
    pub duty: u32,
}

impl DutyParams {
    /// Check if switching from `self` to `next` needs a full timer
    /// reconfiguration
    pub fn needs_reconfigure(&self, next: &DutyParams) -> bool {
        self.resolution != next.resolution
    }
}

/// Duty ticks that cover `min_pulse_us` at `frequency_hz`
///
/// When the pulse is shorter than one tick the result is the
/// [`MIN_DUTY_TICKS`] floor. The result never exceeds
/// `2^resolution_bits - 1`.
pub fn duty_ticks(frequency_hz: u32, min_pulse_us: u32, resolution_bits: u8) -> u32 {
    let bits = resolution_bits.min(31) as u32;
    let max_duty = ((1u64 << bits) - 1) as u32;

    if frequency_hz == 0 {
        return MIN_DUTY_TICKS.min(max_duty);
    }

    let period_us = (US_PER_SECOND / frequency_hz) as u64;
    let ticks_for_min_pulse = (1u64 << bits) * min_pulse_us as u64;

    if period_us == 0 {
        // Period shorter than a microsecond; hold the output as long as possible
        return max_duty;
    }
    if period_us > ticks_for_min_pulse {
        return MIN_DUTY_TICKS.min(max_duty);
    }

    (ticks_for_min_pulse / period_us).min(max_duty as u64) as u32
}

/// Timer clock divider in 10.8 fixed point
///
/// Returns `None` if the frequency cannot be reached from
/// [`SOURCE_CLOCK_HZ`] at this resolution.
pub fn clock_divider(frequency_hz: u32, resolution: DutyResolution) -> Option<u32> {
    if frequency_hz == 0 {
        return None;
    }

    // divider = source / (freq * 2^bits), scaled by 256 for the fraction
    let counter_hz = (frequency_hz as u64) << resolution.bits();
    let divider_x256 = ((SOURCE_CLOCK_HZ as u64) << DIVIDER_FRAC_BITS) / counter_hz;

    if (DIVIDER_MIN..DIVIDER_LIMIT).contains(&divider_x256) {
        Some(divider_x256 as u32)
    } else {
        None
    }
}

/// Translate a motion into duty timer parameters
///
/// Fails with [`StepperError::FrequencyUpdateError`] when the pulse rate
/// is zero or outside what the timer can divide down to.
pub fn translate(motion: &Motion) -> Result<DutyParams, StepperError> {
    let frequency_hz = motion.frequency_hz();
    let resolution = DutyResolution::select(frequency_hz);

    clock_divider(frequency_hz, resolution).ok_or(StepperError::FrequencyUpdateError)?;

    Ok(DutyParams {
        frequency_hz,
        resolution,
        duty: duty_ticks(frequency_hz, motion.min_pulse_us, resolution.bits()),
    })
}
