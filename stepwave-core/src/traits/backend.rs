//! Pulse backend trait
//!
//! A backend is one peripheral family able to emit a periodic step
//! pulse: it owns the family's translation formulas and the calls into
//! the peripheral driver. The lifecycle controller is identical for all
//! backends.

use core::fmt::Debug;

use crate::config::{Instance, MotorConfig};
use crate::error::StepperError;
use crate::pulse::Motion;

/// Pulse generation capability of one peripheral family
pub trait PulseBackend {
    /// Hardware parameters produced by [`translate`](Self::translate)
    type Params: Copy + PartialEq + Debug;

    /// Direction/pulse pin pairs one instance can drive
    const MAX_PIN_PAIRS: usize;

    /// Pulse rates below this are treated as "stop"
    const MIN_FREQUENCY_HZ: u32;

    /// Number of instances the peripheral provides
    fn capacity(&self) -> usize;

    /// Compute hardware parameters for a motion
    ///
    /// Pure; reports [`StepperError::FrequencyUpdateError`] when the rate
    /// cannot be represented.
    fn translate(motion: &Motion) -> Result<Self::Params, StepperError>;

    /// Bind the instance to its pins and program it from scratch
    ///
    /// The output is left paused.
    fn configure(
        &mut self,
        instance: Instance,
        config: &MotorConfig,
        params: &Self::Params,
    ) -> Result<(), StepperError>;

    /// Move a configured instance from `previous` to `next`
    ///
    /// `running` tells the backend whether pulses must keep flowing
    /// after the update.
    fn update(
        &mut self,
        instance: Instance,
        previous: &Self::Params,
        next: &Self::Params,
        running: bool,
    ) -> Result<(), StepperError>;

    /// Stop pulse generation
    fn pause(&mut self, instance: Instance) -> Result<(), StepperError>;

    /// Resume pulse generation with the last programmed parameters
    fn resume(&mut self, instance: Instance) -> Result<(), StepperError>;

    /// Release the instance's peripheral binding
    ///
    /// Releasing an instance that was never configured succeeds.
    fn release(&mut self, instance: Instance) -> Result<(), StepperError>;

    /// Parameters the peripheral currently holds
    ///
    /// After a failed call this may be a mix of the previous and the
    /// requested parameters, or `None` once the binding is lost.
    fn programmed(&self, instance: Instance) -> Option<Self::Params>;

    /// Check if the instance is emitting pulses
    fn emitting(&self, instance: Instance) -> bool;
}
