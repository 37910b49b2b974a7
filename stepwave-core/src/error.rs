//! Error taxonomy for stepper operations

/// Errors returned by the lifecycle operations
///
/// Validation and state errors are detected before any hardware access.
/// Peripheral errors are mapped one-to-one from the collaborator that
/// rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepperError {
    /// Instance index out of range, unusable configuration, or pin
    /// assignment rejected by the GPIO driver
    InvalidParameters,
    /// Operation not allowed in the instance's current lifecycle state
    InvalidState,
    /// Reserved; no operation currently reports it
    DeviceBusy,
    /// The requested rate cannot be represented, or the timer rejected it
    FrequencyUpdateError,
    /// The duty value could not be programmed
    DutyUpdateError,
    /// A peripheral or GPIO driver failed
    InternalError,
}

impl StepperError {
    /// Check if the error was raised before touching hardware
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StepperError::InvalidParameters | StepperError::InvalidState
        )
    }
}

impl core::fmt::Display for StepperError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            StepperError::InvalidParameters => "invalid parameters",
            StepperError::InvalidState => "invalid state",
            StepperError::DeviceBusy => "device busy",
            StepperError::FrequencyUpdateError => "frequency update failed",
            StepperError::DutyUpdateError => "duty update failed",
            StepperError::InternalError => "internal peripheral error",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors() {
        assert!(StepperError::InvalidParameters.is_validation());
        assert!(StepperError::InvalidState.is_validation());
        assert!(!StepperError::FrequencyUpdateError.is_validation());
        assert!(!StepperError::InternalError.is_validation());
    }
}
