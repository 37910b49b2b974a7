//! Board-level configuration
//!
//! A board lists the motor channels it wires up. The list can be stored
//! in flash as postcard binary data and handed to
//! [`StepperController::init_board`](crate::controller::StepperController::init_board)
//! at boot.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::motor::{Instance, MotorConfig, MAX_INSTANCES};

/// Errors building or decoding a board configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// More channels than [`MAX_INSTANCES`]
    Full,
    /// The instance is already listed
    DuplicateInstance,
    /// Encoding failed (output buffer too small)
    Serialize,
    /// Stored bytes are not a valid configuration
    Deserialize,
}

/// One wired motor channel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelConfig {
    /// Pool slot driving the channel
    pub instance: Instance,
    /// Motor settings
    pub motor: MotorConfig,
}

/// All motor channels of a board
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoardConfig {
    pub channels: Vec<ChannelConfig, MAX_INSTANCES>,
}

impl BoardConfig {
    /// Create an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel
    pub fn add(&mut self, instance: Instance, motor: MotorConfig) -> Result<(), ConfigError> {
        if self.find(instance).is_some() {
            return Err(ConfigError::DuplicateInstance);
        }
        self.channels
            .push(ChannelConfig { instance, motor })
            .map_err(|_| ConfigError::Full)
    }

    /// Find the configuration of an instance
    pub fn find(&self, instance: Instance) -> Option<&MotorConfig> {
        self.channels
            .iter()
            .find(|c| c.instance == instance)
            .map(|c| &c.motor)
    }

    /// Decode a configuration stored as postcard binary data
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: BoardConfig =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;

        // Reject lists a well-formed writer could not have produced
        for (i, channel) in config.channels.iter().enumerate() {
            if config.channels[..i]
                .iter()
                .any(|c| c.instance == channel.instance)
            {
                return Err(ConfigError::DuplicateInstance);
            }
        }

        Ok(config)
    }

    /// Encode into `buf`, returning the used prefix
    #[cfg(feature = "serde")]
    pub fn to_slice<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Serialize)
    }
}
