//! Mock peripherals for host testing
//!
//! Each mock keeps the state a real peripheral would hold and a log of
//! the calls it received. Failures can be injected per operation.

#![cfg(any(test, feature = "mock"))]

use heapless::Vec;

use crate::gpio::{GpioPort, Level, Pin, PinMask, MAX_PIN};
use crate::pwm::DutyTimer;
use crate::sequence::{BaseClock, SequenceOutputs, SequencePwm, SequencePwmError};

/// Calls kept per mock before the log stops growing
pub const LOG_CAPACITY: usize = 64;

/// Error returned by mock drivers when a failure is injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// Mock GPIO port
pub struct MockGpio {
    outputs: PinMask,
    levels: [Option<Level>; MAX_PIN as usize + 1],
    writes: usize,
    reject_outputs: bool,
    fail_writes: bool,
}

impl MockGpio {
    /// Create a port with no outputs configured
    pub fn new() -> Self {
        Self {
            outputs: PinMask::EMPTY,
            levels: [None; MAX_PIN as usize + 1],
            writes: 0,
            reject_outputs: false,
            fail_writes: false,
        }
    }

    /// Make `configure_outputs` fail
    pub fn reject_outputs(&mut self, reject: bool) {
        self.reject_outputs = reject;
    }

    /// Make `set_level` fail
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Last output mask configured
    pub fn outputs(&self) -> PinMask {
        self.outputs
    }

    /// Last level written to a pin, `None` if never written
    pub fn level(&self, pin: Pin) -> Option<Level> {
        self.levels.get(pin.number() as usize).copied().flatten()
    }

    /// Number of successful level writes
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl Default for MockGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioPort for MockGpio {
    type Error = MockError;

    fn configure_outputs(&mut self, mask: PinMask) -> Result<(), MockError> {
        if self.reject_outputs {
            return Err(MockError);
        }
        self.outputs = mask;
        Ok(())
    }

    fn set_level(&mut self, pin: Pin, level: Level) -> Result<(), MockError> {
        if self.fail_writes || !self.outputs.contains(pin) {
            return Err(MockError);
        }
        self.levels[pin.number() as usize] = Some(level);
        self.writes += 1;
        Ok(())
    }
}

/// Call received by [`MockDutyTimer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOp {
    Configure {
        channel: u8,
        pin: Pin,
        resolution_bits: u8,
        frequency_hz: u32,
        duty: u32,
    },
    SetFrequency {
        channel: u8,
        frequency_hz: u32,
    },
    SetDuty {
        channel: u8,
        duty: u32,
    },
    Pause(u8),
    Resume(u8),
    Reset(u8),
    Release(u8),
}

/// State of one mock timer channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerChannel {
    pub pin: Option<Pin>,
    pub resolution_bits: u8,
    pub frequency_hz: u32,
    pub duty: u32,
    pub running: bool,
}

/// Timer channels provided by [`MockDutyTimer`]
pub const MOCK_TIMER_CHANNELS: usize = 4;

/// Mock duty-register PWM timer
#[derive(Default)]
pub struct MockDutyTimer {
    channels: [TimerChannel; MOCK_TIMER_CHANNELS],
    ops: Vec<TimerOp, LOG_CAPACITY>,
    fail_configure: bool,
    fail_frequency: bool,
    fail_duty: bool,
    fail_control: bool,
}

impl MockDutyTimer {
    /// Create a timer with every channel unconfigured
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `configure` fail
    pub fn fail_configure(&mut self, fail: bool) {
        self.fail_configure = fail;
    }

    /// Make `set_frequency` fail
    pub fn fail_frequency(&mut self, fail: bool) {
        self.fail_frequency = fail;
    }

    /// Make `set_duty` fail
    pub fn fail_duty(&mut self, fail: bool) {
        self.fail_duty = fail;
    }

    /// Make `pause`, `resume` and `reset` fail
    pub fn fail_control(&mut self, fail: bool) {
        self.fail_control = fail;
    }

    /// State of a channel
    pub fn channel(&self, channel: u8) -> Option<&TimerChannel> {
        self.channels.get(channel as usize)
    }

    /// Calls received so far
    pub fn ops(&self) -> &[TimerOp] {
        &self.ops
    }

    /// Forget the recorded calls
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    fn record(&mut self, op: TimerOp) {
        let _ = self.ops.push(op);
    }

    fn channel_mut(&mut self, channel: u8) -> Result<&mut TimerChannel, MockError> {
        self.channels.get_mut(channel as usize).ok_or(MockError)
    }
}

impl DutyTimer for MockDutyTimer {
    type Error = MockError;

    fn channel_count(&self) -> usize {
        MOCK_TIMER_CHANNELS
    }

    fn configure(
        &mut self,
        channel: u8,
        pin: Pin,
        resolution_bits: u8,
        frequency_hz: u32,
        duty: u32,
    ) -> Result<(), MockError> {
        if self.fail_configure {
            return Err(MockError);
        }
        *self.channel_mut(channel)? = TimerChannel {
            pin: Some(pin),
            resolution_bits,
            frequency_hz,
            duty,
            running: false,
        };
        self.record(TimerOp::Configure {
            channel,
            pin,
            resolution_bits,
            frequency_hz,
            duty,
        });
        Ok(())
    }

    fn set_frequency(&mut self, channel: u8, frequency_hz: u32) -> Result<(), MockError> {
        if self.fail_frequency {
            return Err(MockError);
        }
        self.channel_mut(channel)?.frequency_hz = frequency_hz;
        self.record(TimerOp::SetFrequency {
            channel,
            frequency_hz,
        });
        Ok(())
    }

    fn set_duty(&mut self, channel: u8, duty: u32) -> Result<(), MockError> {
        if self.fail_duty {
            return Err(MockError);
        }
        self.channel_mut(channel)?.duty = duty;
        self.record(TimerOp::SetDuty { channel, duty });
        Ok(())
    }

    fn pause(&mut self, channel: u8) -> Result<(), MockError> {
        if self.fail_control {
            return Err(MockError);
        }
        self.channel_mut(channel)?.running = false;
        self.record(TimerOp::Pause(channel));
        Ok(())
    }

    fn resume(&mut self, channel: u8) -> Result<(), MockError> {
        if self.fail_control {
            return Err(MockError);
        }
        self.channel_mut(channel)?.running = true;
        self.record(TimerOp::Resume(channel));
        Ok(())
    }

    fn reset(&mut self, channel: u8) -> Result<(), MockError> {
        if self.fail_control {
            return Err(MockError);
        }
        self.channel_mut(channel)?;
        self.record(TimerOp::Reset(channel));
        Ok(())
    }

    fn release(&mut self, channel: u8) -> Result<(), MockError> {
        *self.channel_mut(channel)? = TimerChannel::default();
        self.record(TimerOp::Release(channel));
        Ok(())
    }
}

/// Call received by [`MockSequencePwm`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOp {
    Init {
        instance: u8,
        clock: BaseClock,
        top: u16,
    },
    Uninit(u8),
    PlayLoop {
        instance: u8,
        compare: u16,
    },
    Stop(u8),
}

/// State of one mock sequence PWM instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceInstance {
    pub outputs: SequenceOutputs,
    pub clock: BaseClock,
    pub top: u16,
    pub compare: u16,
    pub initialized: bool,
    pub playing: bool,
}

impl Default for SequenceInstance {
    fn default() -> Self {
        Self {
            outputs: [None; 4],
            clock: BaseClock::Mhz16,
            top: 0,
            compare: 0,
            initialized: false,
            playing: false,
        }
    }
}

/// Instances provided by [`MockSequencePwm`]
pub const MOCK_SEQUENCE_INSTANCES: usize = 4;

/// Mock sequence-playback PWM
#[derive(Default)]
pub struct MockSequencePwm {
    instances: [SequenceInstance; MOCK_SEQUENCE_INSTANCES],
    ops: Vec<SequenceOp, LOG_CAPACITY>,
    fail_init: Option<SequencePwmError>,
}

impl MockSequencePwm {
    /// Create a peripheral with every instance unbound
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `init` fail with `error`, or succeed again with `None`
    pub fn fail_init(&mut self, error: Option<SequencePwmError>) {
        self.fail_init = error;
    }

    /// State of an instance
    pub fn instance(&self, instance: u8) -> Option<&SequenceInstance> {
        self.instances.get(instance as usize)
    }

    /// Calls received so far
    pub fn ops(&self) -> &[SequenceOp] {
        &self.ops
    }

    /// Forget the recorded calls
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    fn record(&mut self, op: SequenceOp) {
        let _ = self.ops.push(op);
    }

    fn bound_mut(&mut self, instance: u8) -> Result<&mut SequenceInstance, SequencePwmError> {
        let state = self
            .instances
            .get_mut(instance as usize)
            .ok_or(SequencePwmError::InvalidValue)?;
        if !state.initialized {
            return Err(SequencePwmError::NotInitialized);
        }
        Ok(state)
    }
}

impl SequencePwm for MockSequencePwm {
    fn instance_count(&self) -> usize {
        MOCK_SEQUENCE_INSTANCES
    }

    fn init(
        &mut self,
        instance: u8,
        outputs: &SequenceOutputs,
        clock: BaseClock,
        top: u16,
    ) -> Result<(), SequencePwmError> {
        if let Some(error) = self.fail_init {
            return Err(error);
        }
        let state = self
            .instances
            .get_mut(instance as usize)
            .ok_or(SequencePwmError::InvalidValue)?;
        if state.initialized {
            return Err(SequencePwmError::AlreadyInitialized);
        }
        *state = SequenceInstance {
            outputs: *outputs,
            clock,
            top,
            compare: 0,
            initialized: true,
            playing: false,
        };
        self.record(SequenceOp::Init {
            instance,
            clock,
            top,
        });
        Ok(())
    }

    fn uninit(&mut self, instance: u8) {
        if let Some(state) = self.instances.get_mut(instance as usize) {
            *state = SequenceInstance::default();
        }
        self.record(SequenceOp::Uninit(instance));
    }

    fn play_loop(&mut self, instance: u8, compare: u16) -> Result<(), SequencePwmError> {
        let state = self.bound_mut(instance)?;
        if compare >= state.top {
            return Err(SequencePwmError::InvalidValue);
        }
        state.compare = compare;
        state.playing = true;
        self.record(SequenceOp::PlayLoop { instance, compare });
        Ok(())
    }

    fn stop(&mut self, instance: u8) -> Result<(), SequencePwmError> {
        self.bound_mut(instance)?.playing = false;
        self.record(SequenceOp::Stop(instance));
        Ok(())
    }
}
