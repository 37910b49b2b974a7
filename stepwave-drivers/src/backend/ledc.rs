//! Duty-register timer backend
//!
//! Each instance gets its own timer and channel, both indexed by the
//! instance number. The counter resolution follows the pulse frequency
//! (see [`stepwave_core::pulse::duty`]):
//!
//! - Same resolution band: frequency and duty are updated live, the
//!   counter keeps running.
//! - Band change: pause, reprogram the timer, reset the counter, and
//!   resume only if the instance was running.

use stepwave_core::config::{Instance, MotorConfig};
use stepwave_core::pulse::{duty, DutyParams, Motion};
use stepwave_core::traits::PulseBackend;
use stepwave_core::StepperError;
use stepwave_hal::{DutyTimer, Pin};

/// Timer channels the backend can track
pub const LEDC_CHANNELS: usize = 8;

/// What a bound timer channel currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Channel {
    pin: Pin,
    /// `None` once a reconfigure failed partway
    params: Option<DutyParams>,
    running: bool,
}

/// Pulse backend for duty-register PWM timers
pub struct LedcBackend<T> {
    timer: T,
    channels: [Option<Channel>; LEDC_CHANNELS],
}

impl<T: DutyTimer> LedcBackend<T> {
    /// Create a backend driving `timer`
    pub const fn new(timer: T) -> Self {
        Self {
            timer,
            channels: [None; LEDC_CHANNELS],
        }
    }

    /// Get the timer driver
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Get the timer driver mutably
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    fn bound(&mut self, instance: Instance) -> Result<&mut Channel, StepperError> {
        self.channels
            .get_mut(instance.index())
            .and_then(Option::as_mut)
            .ok_or(StepperError::InvalidState)
    }
}

impl<T: DutyTimer> PulseBackend for LedcBackend<T> {
    type Params = DutyParams;

    const MAX_PIN_PAIRS: usize = 1;
    const MIN_FREQUENCY_HZ: u32 = 10;

    fn capacity(&self) -> usize {
        self.timer.channel_count().min(LEDC_CHANNELS)
    }

    fn translate(motion: &Motion) -> Result<DutyParams, StepperError> {
        duty::translate(motion)
    }

    fn configure(
        &mut self,
        instance: Instance,
        config: &MotorConfig,
        params: &DutyParams,
    ) -> Result<(), StepperError> {
        let pin = config
            .pins
            .first()
            .and_then(|pair| pair.pulse)
            .ok_or(StepperError::InvalidParameters)?;
        let slot = self
            .channels
            .get_mut(instance.index())
            .ok_or(StepperError::InvalidParameters)?;

        self.timer
            .configure(
                instance.0,
                pin,
                params.resolution.bits(),
                params.frequency_hz,
                params.duty,
            )
            .map_err(|_| StepperError::InternalError)?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "ledc {}: {} Hz, duty {}, {} bits",
            instance.0,
            params.frequency_hz,
            params.duty,
            params.resolution.bits()
        );

        *slot = Some(Channel {
            pin,
            params: Some(*params),
            running: false,
        });
        Ok(())
    }

    fn update(
        &mut self,
        instance: Instance,
        previous: &DutyParams,
        next: &DutyParams,
        running: bool,
    ) -> Result<(), StepperError> {
        let id = instance.0;
        let LedcBackend { timer, channels } = self;
        let channel = channels
            .get_mut(instance.index())
            .and_then(Option::as_mut)
            .ok_or(StepperError::InvalidState)?;

        if previous.needs_reconfigure(next) {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "ledc {}: resolution {} -> {} bits",
                id,
                previous.resolution.bits(),
                next.resolution.bits()
            );

            timer.pause(id).map_err(|_| StepperError::InternalError)?;
            channel.running = false;
            channel.params = None;
            timer
                .configure(
                    id,
                    channel.pin,
                    next.resolution.bits(),
                    next.frequency_hz,
                    next.duty,
                )
                .map_err(|_| StepperError::FrequencyUpdateError)?;
            channel.params = Some(*next);
            timer.reset(id).map_err(|_| StepperError::InternalError)?;
            if running {
                timer.resume(id).map_err(|_| StepperError::InternalError)?;
                channel.running = true;
            }
        } else {
            let mut applied = channel.params.unwrap_or(*previous);
            timer
                .set_frequency(id, next.frequency_hz)
                .map_err(|_| StepperError::FrequencyUpdateError)?;
            // Frequency is live even if the duty write below fails
            applied.frequency_hz = next.frequency_hz;
            channel.params = Some(applied);
            timer
                .set_duty(id, next.duty)
                .map_err(|_| StepperError::DutyUpdateError)?;
            channel.params = Some(*next);
        }

        Ok(())
    }

    fn pause(&mut self, instance: Instance) -> Result<(), StepperError> {
        self.timer
            .pause(instance.0)
            .map_err(|_| StepperError::InternalError)?;
        if let Ok(channel) = self.bound(instance) {
            channel.running = false;
        }
        Ok(())
    }

    fn resume(&mut self, instance: Instance) -> Result<(), StepperError> {
        self.timer
            .resume(instance.0)
            .map_err(|_| StepperError::InternalError)?;
        if let Ok(channel) = self.bound(instance) {
            channel.running = true;
        }
        Ok(())
    }

    fn release(&mut self, instance: Instance) -> Result<(), StepperError> {
        let Some(slot) = self.channels.get_mut(instance.index()) else {
            return Err(StepperError::InvalidParameters);
        };
        if slot.take().is_some() {
            self.timer
                .release(instance.0)
                .map_err(|_| StepperError::InternalError)?;
        }
        Ok(())
    }

    fn programmed(&self, instance: Instance) -> Option<DutyParams> {
        self.channels
            .get(instance.index())
            .copied()
            .flatten()
            .and_then(|channel| channel.params)
    }

    fn emitting(&self, instance: Instance) -> bool {
        self.channels
            .get(instance.index())
            .copied()
            .flatten()
            .is_some_and(|channel| channel.running)
    }
}
