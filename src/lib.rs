//! Compass heading and step count fusion engine
//!
//! Ingests asynchronous accelerometer, magnetometer and step counter samples
//! from an injected [`platform::SensorPlatform`], keeps the minimal state
//! needed for a stable heading, and publishes typed events to UI
//! subscribers through an [`events::EventChannel`].

pub mod accuracy;
pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod math;
pub mod orientation;
pub mod platform;
pub mod replay;
pub mod steps;

// Re-export commonly used types
pub use accuracy::{AccuracyLevel, AccuracyMonitor};
pub use buffer::SampleBuffer;
pub use config::EngineConfig;
pub use engine::SensorFusionEngine;
pub use error::{FusionError, FusionResult};
pub use events::{Event, EventChannel, EventKind, SubscriptionHandle};
pub use math::Vector3;
pub use orientation::{HeadingReading, Orientation, OrientationEstimator};
pub use platform::{
    MockSensorPlatform, PlatformError, SamplingRate, SensorHandle, SensorKind, SensorListener,
    SensorPlatform, SensorSample,
};
pub use steps::StepTracker;
