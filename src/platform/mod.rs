//! Boundary toward the platform sensor layer.
//!
//! The engine never binds to a concrete sensor API. A target supplies a
//! [`SensorPlatform`] that answers capability queries and manages stream
//! subscriptions; samples come back through [`SensorListener`] callbacks.
//! [`mock::MockSensorPlatform`] is the in-memory implementation used by
//! tests and the replay tool.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod mock;

pub use mock::MockSensorPlatform;

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors reported by a platform implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform refused the request
    #[error("{0}")]
    Rejected(String),

    /// Unsubscribe for a registration the platform does not know
    #[error("listener {0} is not registered")]
    NotRegistered(u64),

    /// The sensor service itself is unavailable
    #[error("sensor service unavailable")]
    Unavailable,
}

/// Sensor streams the engine consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Accelerometer,
    Magnetometer,
    StepCounter,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::Magnetometer => "magnetometer",
            SensorKind::StepCounter => "step counter",
        };
        f.write_str(name)
    }
}

/// Capability handle returned by a platform for a present sensor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorHandle {
    pub kind: SensorKind,
    pub name: String,
}

impl SensorHandle {
    pub fn new(kind: SensorKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Delivery cadence hint passed on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingRate {
    Fastest,
    Game,
    Ui,
    Normal,
    Custom { period_us: u32 },
}

impl SamplingRate {
    /// Nominal sampling period in microseconds
    pub fn period_us(&self) -> u32 {
        match self {
            SamplingRate::Fastest => 0,
            SamplingRate::Game => 20_000,
            SamplingRate::Ui => 66_667,
            SamplingRate::Normal => 200_000,
            SamplingRate::Custom { period_us } => *period_us,
        }
    }
}

/// One raw sample as delivered by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub kind: SensorKind,
    pub values: Vec<f32>,
    /// Platform timestamp in nanoseconds
    pub timestamp: u64,
}

impl SensorSample {
    pub fn new(kind: SensorKind, values: impl Into<Vec<f32>>, timestamp: u64) -> Self {
        Self {
            kind,
            values: values.into(),
            timestamp,
        }
    }
}

/// Token identifying one active registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

/// Callbacks invoked by the platform for a registered stream
pub trait SensorListener: Send + Sync {
    fn on_sample(&self, sample: &SensorSample);

    fn on_accuracy_changed(&self, kind: SensorKind, accuracy: i32);
}

/// Capability-queried source of raw sensor streams
pub trait SensorPlatform: Send + Sync {
    /// Handle for the default sensor of `kind`, or `None` if absent
    fn default_sensor(&self, kind: SensorKind) -> Option<SensorHandle>;

    /// Subscribe `listener` to `sensor` at roughly `rate`
    fn register(
        &self,
        sensor: &SensorHandle,
        listener: Arc<dyn SensorListener>,
        rate: SamplingRate,
    ) -> PlatformResult<RegistrationId>;

    /// Drop a subscription made by [`SensorPlatform::register`]
    fn unregister(&self, registration: RegistrationId) -> PlatformResult<()>;
}
