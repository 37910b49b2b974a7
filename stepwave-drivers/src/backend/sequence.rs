//! Sequence PWM backend
//!
//! One PWM instance per stepper instance; up to four pin pairs share its
//! period, with the pulse pin of pair `n` routed to channel `n`. The
//! base clock can only be chosen at init, so every speed change
//! re-initializes the peripheral and restarts looping playback if the
//! instance was running.

use stepwave_core::config::{Instance, MotorConfig};
use stepwave_core::pulse::{tier, Motion, TierParams};
use stepwave_core::traits::PulseBackend;
use stepwave_core::StepperError;
use stepwave_hal::sequence::SEQUENCE_CHANNELS;
use stepwave_hal::{SequenceOutputs, SequencePwm, SequencePwmError};

/// PWM instances the backend can track
pub const SEQUENCE_INSTANCES: usize = 4;

/// What a bound PWM instance currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    outputs: SequenceOutputs,
    /// `None` while the peripheral is uninitialized
    params: Option<TierParams>,
    playing: bool,
}

/// Pulse backend for sequence-playback PWM
pub struct SequenceBackend<P> {
    pwm: P,
    bindings: [Option<Binding>; SEQUENCE_INSTANCES],
}

fn init_error(error: SequencePwmError) -> StepperError {
    match error {
        SequencePwmError::InvalidValue => StepperError::FrequencyUpdateError,
        _ => StepperError::InternalError,
    }
}

fn playback_error(error: SequencePwmError) -> StepperError {
    match error {
        SequencePwmError::InvalidValue => StepperError::DutyUpdateError,
        _ => StepperError::InternalError,
    }
}

impl<P: SequencePwm> SequenceBackend<P> {
    /// Create a backend driving `pwm`
    pub const fn new(pwm: P) -> Self {
        Self {
            pwm,
            bindings: [None; SEQUENCE_INSTANCES],
        }
    }

    /// Get the PWM driver
    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    /// Get the PWM driver mutably
    pub fn pwm_mut(&mut self) -> &mut P {
        &mut self.pwm
    }

    fn binding(&self, instance: Instance) -> Option<Binding> {
        self.bindings.get(instance.index()).copied().flatten()
    }

    /// Initialize the peripheral, replacing an existing binding
    ///
    /// `instance` must be below [`SEQUENCE_INSTANCES`].
    fn bind(
        &mut self,
        instance: Instance,
        outputs: SequenceOutputs,
        params: &TierParams,
    ) -> Result<(), StepperError> {
        let id = instance.0;
        let index = instance.index();
        let result = match self.pwm.init(id, &outputs, params.clock, params.top) {
            Err(SequencePwmError::AlreadyInitialized) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("pwm {}: already initialized, re-initializing", id);
                self.pwm.uninit(id);
                self.bindings[index] = Some(Binding {
                    outputs,
                    params: None,
                    playing: false,
                });
                self.pwm.init(id, &outputs, params.clock, params.top)
            }
            other => other,
        };
        result.map_err(init_error)?;

        self.bindings[index] = Some(Binding {
            outputs,
            params: Some(*params),
            playing: false,
        });
        Ok(())
    }

    /// Start looping playback with the bound parameters
    fn play(&mut self, instance: Instance) -> Result<(), StepperError> {
        let binding = self
            .bindings
            .get_mut(instance.index())
            .and_then(Option::as_mut)
            .ok_or(StepperError::InvalidState)?;
        let params = binding.params.ok_or(StepperError::InternalError)?;
        self.pwm
            .play_loop(instance.0, params.compare)
            .map_err(playback_error)?;
        binding.playing = true;
        Ok(())
    }
}

impl<P: SequencePwm> PulseBackend for SequenceBackend<P> {
    type Params = TierParams;

    const MAX_PIN_PAIRS: usize = SEQUENCE_CHANNELS;
    const MIN_FREQUENCY_HZ: u32 = 1;

    fn capacity(&self) -> usize {
        self.pwm.instance_count().min(SEQUENCE_INSTANCES)
    }

    fn translate(motion: &Motion) -> Result<TierParams, StepperError> {
        tier::translate(motion)
    }

    fn configure(
        &mut self,
        instance: Instance,
        config: &MotorConfig,
        params: &TierParams,
    ) -> Result<(), StepperError> {
        if instance.index() >= SEQUENCE_INSTANCES {
            return Err(StepperError::InvalidParameters);
        }

        let mut outputs: SequenceOutputs = [None; SEQUENCE_CHANNELS];
        for (output, pair) in outputs.iter_mut().zip(config.pins.iter()) {
            *output = pair.pulse;
        }

        self.bind(instance, outputs, params)?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "pwm {}: period {} us, top {} at prescaler {}",
            instance.0,
            params.period_us,
            params.top,
            params.clock.prescaler()
        );

        Ok(())
    }

    fn update(
        &mut self,
        instance: Instance,
        _previous: &TierParams,
        next: &TierParams,
        running: bool,
    ) -> Result<(), StepperError> {
        let binding = self.binding(instance).ok_or(StepperError::InvalidState)?;
        self.bind(instance, binding.outputs, next)?;
        if running {
            self.play(instance)?;
        }
        Ok(())
    }

    fn pause(&mut self, instance: Instance) -> Result<(), StepperError> {
        match self.pwm.stop(instance.0) {
            // Nothing is playing on an unbound instance
            Ok(()) | Err(SequencePwmError::NotInitialized) => {}
            Err(_) => return Err(StepperError::InternalError),
        }
        if let Some(binding) = self
            .bindings
            .get_mut(instance.index())
            .and_then(Option::as_mut)
        {
            binding.playing = false;
        }
        Ok(())
    }

    fn resume(&mut self, instance: Instance) -> Result<(), StepperError> {
        self.play(instance)
    }

    fn release(&mut self, instance: Instance) -> Result<(), StepperError> {
        let Some(binding) = self.bindings.get_mut(instance.index()) else {
            return Err(StepperError::InvalidParameters);
        };
        *binding = None;
        self.pwm.uninit(instance.0);
        Ok(())
    }

    fn programmed(&self, instance: Instance) -> Option<TierParams> {
        self.binding(instance).and_then(|binding| binding.params)
    }

    fn emitting(&self, instance: Instance) -> bool {
        self.binding(instance).is_some_and(|binding| binding.playing)
    }
}
