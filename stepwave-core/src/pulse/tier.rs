//! Clock-tier translation
//!
//! For sequence PWM peripherals whose counter runs from one of several
//! fixed base clocks up to a 15-bit top value. The fastest clock whose
//! top value still fits is chosen, which gives the finest duty
//! granularity for the period.

use stepwave_hal::sequence::MAX_COUNTER_TOP;
use stepwave_hal::BaseClock;

use super::{Motion, US_PER_SECOND};
use crate::error::StepperError;

/// Shortest representable period (200 kHz)
pub const MIN_PERIOD_US: u32 = 5;

/// Longest representable period (~3.8 Hz, a full counter at 125 kHz)
pub const MAX_PERIOD_US: u32 = 262_140;

/// Parameters for a sequence PWM instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TierParams {
    /// Pulse period the parameters were derived from
    pub period_us: u32,
    /// Counter base clock
    pub clock: BaseClock,
    /// Counter top value (period in clock ticks)
    pub top: u16,
    /// Compare value (pulse width in clock ticks)
    pub compare: u16,
}

/// Convert microseconds to ticks of `clock`, truncating
pub fn ticks(us: u32, clock: BaseClock) -> u64 {
    us as u64 * clock.hz() as u64 / US_PER_SECOND as u64
}

/// Pick the clock tier for a period and return it with the top value
///
/// Tiers are tried fastest first over all eight prescalers, and the
/// first whose top fits in [`MAX_COUNTER_TOP`] wins. This is not the
/// three fixed period bands some drivers use (16 MHz up to 1000 µs,
/// 1 MHz up to 32767 µs, 125 kHz above): a 1500 µs period gets 16 MHz
/// with top 24000 here instead of 1 MHz with top 1500.
pub fn select_clock(period_us: u32) -> Result<(BaseClock, u16), StepperError> {
    if !(MIN_PERIOD_US..=MAX_PERIOD_US).contains(&period_us) {
        return Err(StepperError::FrequencyUpdateError);
    }

    BaseClock::ALL
        .iter()
        .find_map(|&clock| {
            let top = ticks(period_us, clock);
            (top <= MAX_COUNTER_TOP as u64).then_some((clock, top as u16))
        })
        .ok_or(StepperError::FrequencyUpdateError)
}

/// Compare value covering `min_pulse_us` at `clock`
///
/// Rounds up so the pulse is never shorter than requested, and keeps the
/// value inside `1..top` so the output always toggles.
pub fn pulse_compare(min_pulse_us: u32, clock: BaseClock, top: u16) -> u16 {
    let scaled = min_pulse_us as u64 * clock.hz() as u64;
    let compare = scaled.div_ceil(US_PER_SECOND as u64);
    let upper = top.saturating_sub(1).max(1) as u64;
    compare.clamp(1, upper) as u16
}

/// Translate a motion into sequence PWM parameters
///
/// Fails with [`StepperError::FrequencyUpdateError`] when the period is
/// outside [`MIN_PERIOD_US`]..=[`MAX_PERIOD_US`].
pub fn translate(motion: &Motion) -> Result<TierParams, StepperError> {
    let period_us = motion
        .period_us()
        .ok_or(StepperError::FrequencyUpdateError)?;
    let (clock, top) = select_clock(period_us)?;

    Ok(TierParams {
        period_us,
        clock,
        top,
        compare: pulse_compare(motion.min_pulse_us, clock, top),
    })
}
