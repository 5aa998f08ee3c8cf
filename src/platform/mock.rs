//! Mock sensor platform for testing and replay
//!
//! Records registrations for verification and lets callers push synthetic
//! samples and accuracy changes to whichever listeners are registered.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{
    PlatformError, PlatformResult, RegistrationId, SamplingRate, SensorHandle, SensorKind,
    SensorListener, SensorPlatform, SensorSample,
};

/// Registration call log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Register {
        kind: SensorKind,
        rate: SamplingRate,
        id: RegistrationId,
    },
    Unregister {
        id: RegistrationId,
    },
}

struct Registration {
    kind: SensorKind,
    listener: Arc<dyn SensorListener>,
}

/// In-memory [`SensorPlatform`]
pub struct MockSensorPlatform {
    available: HashSet<SensorKind>,
    registrations: Mutex<HashMap<RegistrationId, Registration>>,
    calls: Mutex<Vec<PlatformCall>>,
    reject_register: Mutex<HashSet<SensorKind>>,
    reject_unregister: Mutex<HashSet<SensorKind>>,
    next_id: AtomicU64,
}

impl MockSensorPlatform {
    /// Platform exposing exactly `sensors`
    pub fn with_sensors(sensors: &[SensorKind]) -> Self {
        Self {
            available: sensors.iter().copied().collect(),
            registrations: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            reject_register: Mutex::new(HashSet::new()),
            reject_unregister: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Platform with accelerometer, magnetometer and step counter
    pub fn full() -> Self {
        Self::with_sensors(&[
            SensorKind::Accelerometer,
            SensorKind::Magnetometer,
            SensorKind::StepCounter,
        ])
    }

    /// Make every future `register` for `kind` fail
    pub fn reject_register(&self, kind: SensorKind) {
        self.reject_register.lock().insert(kind);
    }

    /// Make every future `unregister` of a `kind` stream fail
    pub fn reject_unregister(&self, kind: SensorKind) {
        self.reject_unregister.lock().insert(kind);
    }

    /// Undo all injected failures
    pub fn clear_failures(&self) {
        self.reject_register.lock().clear();
        self.reject_unregister.lock().clear();
    }

    /// Push a sample to every listener registered for its kind.
    /// Returns the number of listeners reached.
    pub fn deliver(&self, sample: &SensorSample) -> usize {
        let listeners = self.listeners_for(sample.kind);
        for listener in &listeners {
            listener.on_sample(sample);
        }
        listeners.len()
    }

    /// Convenience wrapper around [`MockSensorPlatform::deliver`]
    pub fn deliver_values(&self, kind: SensorKind, values: &[f32], timestamp: u64) -> usize {
        self.deliver(&SensorSample::new(kind, values, timestamp))
    }

    /// Push an accuracy change to every listener registered for `kind`
    pub fn deliver_accuracy(&self, kind: SensorKind, accuracy: i32) -> usize {
        let listeners = self.listeners_for(kind);
        for listener in &listeners {
            listener.on_accuracy_changed(kind, accuracy);
        }
        listeners.len()
    }

    /// Number of active registrations for `kind`
    pub fn active_registrations(&self, kind: SensorKind) -> usize {
        self.registrations
            .lock()
            .values()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Total number of active registrations
    pub fn total_registrations(&self) -> usize {
        self.registrations.lock().len()
    }

    /// Call log (for test verification)
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    /// Number of successful `register` calls ever made
    pub fn register_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, PlatformCall::Register { .. }))
            .count()
    }

    // Listeners are cloned out so callbacks run without the registry lock held.
    fn listeners_for(&self, kind: SensorKind) -> Vec<Arc<dyn SensorListener>> {
        self.registrations
            .lock()
            .values()
            .filter(|r| r.kind == kind)
            .map(|r| Arc::clone(&r.listener))
            .collect()
    }
}

impl SensorPlatform for MockSensorPlatform {
    fn default_sensor(&self, kind: SensorKind) -> Option<SensorHandle> {
        self.available
            .contains(&kind)
            .then(|| SensorHandle::new(kind, format!("mock {kind}")))
    }

    fn register(
        &self,
        sensor: &SensorHandle,
        listener: Arc<dyn SensorListener>,
        rate: SamplingRate,
    ) -> PlatformResult<RegistrationId> {
        if !self.available.contains(&sensor.kind) {
            return Err(PlatformError::Unavailable);
        }
        if self.reject_register.lock().contains(&sensor.kind) {
            return Err(PlatformError::Rejected(format!(
                "{} registration rejected",
                sensor.kind
            )));
        }

        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations.lock().insert(
            id,
            Registration {
                kind: sensor.kind,
                listener,
            },
        );
        self.calls.lock().push(PlatformCall::Register {
            kind: sensor.kind,
            rate,
            id,
        });
        debug!(sensor = %sensor.kind, id = id.0, "mock registration added");
        Ok(id)
    }

    fn unregister(&self, registration: RegistrationId) -> PlatformResult<()> {
        let mut registrations = self.registrations.lock();
        let kind = registrations
            .get(&registration)
            .map(|r| r.kind)
            .ok_or(PlatformError::NotRegistered(registration.0))?;

        if self.reject_unregister.lock().contains(&kind) {
            return Err(PlatformError::Rejected(format!(
                "{kind} unregistration rejected"
            )));
        }

        registrations.remove(&registration);
        drop(registrations);
        self.calls.lock().push(PlatformCall::Unregister { id: registration });
        debug!(sensor = %kind, id = registration.0, "mock registration removed");
        Ok(())
    }
}
