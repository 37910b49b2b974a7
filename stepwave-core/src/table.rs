//! Instance state table
//!
//! One record per pool slot, plus the bulk pin table that tracks which
//! instance owns which GPIO pins. Records are never destroyed; `uninit`
//! resets them to the parked defaults.

use stepwave_hal::PinMask;

use crate::config::MotorConfig;

/// Lifecycle of one instance
///
/// ```text
/// Uninitialized --init--> Stopped --start--> Running
///       ^                  ^   |                |
///       +-----uninit-------+   +<-----stop------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lifecycle {
    /// Slot holds the parked defaults, no peripheral binding
    #[default]
    Uninitialized,
    /// Peripheral programmed, pulse output paused
    Stopped,
    /// Pulses flowing
    Running,
}

impl Lifecycle {
    /// Check if the instance holds a peripheral binding
    pub fn initialized(&self) -> bool {
        !matches!(self, Lifecycle::Uninitialized)
    }

    /// Check if pulses are being generated
    pub fn running(&self) -> bool {
        matches!(self, Lifecycle::Running)
    }
}

/// Per-instance record
///
/// `P` is the backend's parameter type; `applied` holds the parameters
/// the peripheral is currently programmed with.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceState<P> {
    pub(crate) config: MotorConfig,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) applied: Option<P>,
}

impl<P> InstanceState<P> {
    /// Parked record for a slot that was never initialized
    pub const fn new() -> Self {
        Self {
            config: MotorConfig::parked(),
            lifecycle: Lifecycle::Uninitialized,
            applied: None,
        }
    }

    /// Return the slot to the parked defaults
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Configuration currently held by the slot
    pub fn config(&self) -> &MotorConfig {
        &self.config
    }

    /// Lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Parameters the peripheral is programmed with
    pub fn applied(&self) -> Option<&P> {
        self.applied.as_ref()
    }
}

impl<P> Default for InstanceState<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pins owned by each instance
///
/// GPIO ports configure outputs as a whole mask, so the union of every
/// instance's pins is handed to the port on each `init`. Parked slots own
/// no pins and never contribute undefined bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinTable<const N: usize> {
    owners: [PinMask; N],
}

impl<const N: usize> PinTable<N> {
    /// Table with no pins assigned
    pub const fn new() -> Self {
        Self {
            owners: [PinMask::EMPTY; N],
        }
    }

    /// Check if any pin in `mask` belongs to an instance other than `index`
    pub fn conflicts(&self, index: usize, mask: PinMask) -> bool {
        self.owners
            .iter()
            .enumerate()
            .any(|(i, owned)| i != index && owned.intersects(mask))
    }

    /// Record the pins of an instance, replacing previous ones
    pub fn assign(&mut self, index: usize, mask: PinMask) {
        if let Some(owned) = self.owners.get_mut(index) {
            *owned = mask;
        }
    }

    /// Drop the pins of an instance
    pub fn clear(&mut self, index: usize) {
        self.assign(index, PinMask::EMPTY);
    }

    /// Union of every owned pin
    pub fn output_mask(&self) -> PinMask {
        self.owners
            .iter()
            .fold(PinMask::EMPTY, |acc, owned| acc.union(*owned))
    }
}

impl<const N: usize> Default for PinTable<N> {
    fn default() -> Self {
        Self::new()
    }
}
