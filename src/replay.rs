//! Scripted sensor traces
//!
//! A replay script lists UI commands, raw samples and accuracy changes in
//! order. Running it drives a [`SensorFusionEngine`] over a
//! [`MockSensorPlatform`] and collects every event the engine publishes.
//! Samples go through the platform, so they only reach the engine while the
//! matching stream is registered.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::SensorFusionEngine;
use crate::events::{Event, EventKind};
use crate::platform::{MockSensorPlatform, SensorKind, SensorSample};

/// Fire-and-forget commands exposed to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    StartHeading,
    StopHeading,
    StartSteps,
    StopSteps,
}

impl Command {
    pub fn apply(&self, engine: &SensorFusionEngine) {
        match self {
            Command::StartHeading => engine.start_heading_tracking(),
            Command::StopHeading => engine.stop_heading_tracking(),
            Command::StartSteps => engine.start_step_tracking(),
            Command::StopSteps => engine.stop_step_tracking(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplayStep {
    Command {
        command: Command,
    },
    Sample {
        kind: SensorKind,
        values: Vec<f32>,
        #[serde(default)]
        timestamp: u64,
    },
    Accuracy {
        kind: SensorKind,
        code: i32,
    },
}

fn all_sensors() -> Vec<SensorKind> {
    vec![
        SensorKind::Accelerometer,
        SensorKind::Magnetometer,
        SensorKind::StepCounter,
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Sensors the simulated device exposes
    #[serde(default = "all_sensors")]
    pub sensors: Vec<SensorKind>,
    #[serde(default)]
    pub steps: Vec<ReplayStep>,
}

/// Outcome of one replay run
#[derive(Debug, Default, Clone)]
pub struct ReplayReport {
    /// Every published event, in publication order
    pub events: Vec<Event>,
    /// Samples or accuracy changes that reached no registered stream
    pub undelivered: usize,
}

impl ReplayReport {
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}

impl ReplayScript {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid replay script")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay script {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Platform exposing the script's sensors
    pub fn platform(&self) -> MockSensorPlatform {
        MockSensorPlatform::with_sensors(&self.sensors)
    }

    /// Play every step against `engine`, which must be wired to `platform`
    pub fn run(&self, engine: &SensorFusionEngine, platform: &MockSensorPlatform) -> ReplayReport {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = EventKind::ALL
            .iter()
            .map(|kind| {
                let sink = Arc::clone(&collected);
                engine
                    .events()
                    .subscribe(*kind, move |event| sink.lock().push(event.clone()))
            })
            .collect();

        let mut undelivered = 0;
        for step in &self.steps {
            match step {
                ReplayStep::Command { command } => {
                    debug!(?command, "replay command");
                    command.apply(engine);
                }
                ReplayStep::Sample {
                    kind,
                    values,
                    timestamp,
                } => {
                    let sample = SensorSample::new(*kind, values.clone(), *timestamp);
                    if platform.deliver(&sample) == 0 {
                        undelivered += 1;
                    }
                }
                ReplayStep::Accuracy { kind, code } => {
                    if platform.deliver_accuracy(*kind, *code) == 0 {
                        undelivered += 1;
                    }
                }
            }
        }

        for handle in handles {
            engine.events().unsubscribe(handle);
        }

        let events = std::mem::take(&mut *collected.lock());
        ReplayReport {
            events,
            undelivered,
        }
    }
}
