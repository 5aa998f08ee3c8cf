use thiserror::Error;

use crate::platform::PlatformError;

/// Failures surfaced to subscribers as `CompassError` events.
///
/// None of these are fatal: every variant ends in a reported event and the
/// engine keeps accepting commands and samples.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FusionError {
    /// Accelerometer or magnetometer absent when heading tracking starts
    #[error("Required sensors not available")]
    HeadingSensorsMissing,

    /// Step counter absent when step tracking starts
    #[error("Step counter sensor not available")]
    StepCounterMissing,

    /// Platform rejected a heading stream subscription
    #[error("Failed to start compass: {0}")]
    HeadingRegistration(PlatformError),

    /// Platform failed to drop a heading stream subscription
    #[error("Failed to stop compass: {0}")]
    HeadingUnregistration(PlatformError),

    /// Platform rejected the step counter subscription
    #[error("Failed to start step counter: {0}")]
    StepRegistration(PlatformError),

    /// Platform failed to drop the step counter subscription
    #[error("Failed to stop step counter: {0}")]
    StepUnregistration(PlatformError),

    /// A single delivered sample could not be processed
    #[error("Error processing sensor data: {0}")]
    Processing(String),

    /// Advisory: a sensor reported accuracy below `Medium`
    #[error("Sensor accuracy is low: {0}")]
    AccuracyDegraded(i32),
}

impl FusionError {
    /// Whether this error stems from a missing capability at start time
    pub fn is_capability_missing(&self) -> bool {
        matches!(
            self,
            FusionError::HeadingSensorsMissing | FusionError::StepCounterMissing
        )
    }

    /// Whether the platform refused a subscribe or unsubscribe request
    pub fn is_registration_failure(&self) -> bool {
        matches!(
            self,
            FusionError::HeadingRegistration(_)
                | FusionError::HeadingUnregistration(_)
                | FusionError::StepRegistration(_)
                | FusionError::StepUnregistration(_)
        )
    }
}

/// Result type for fusion operations
pub type FusionResult<T> = Result<T, FusionError>;
