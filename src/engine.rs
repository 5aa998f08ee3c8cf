//! Sensor fusion and event dispatch engine
//!
//! Owns the tracking session, routes raw samples from the platform into the
//! sample buffer and step tracker, and publishes the resulting events.
//!
//! Each registered stream gets its own [`StreamListener`] holding only the
//! shared [`FusionState`]. The buffer and heading recomputation share one
//! lock; step state has its own since it is independent. No lock is held
//! while events are published, so handlers may call back into the engine.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::accuracy::{AccuracyLevel, AccuracyMonitor};
use crate::buffer::SampleBuffer;
use crate::config::EngineConfig;
use crate::error::{FusionError, FusionResult};
use crate::events::{Event, EventChannel, EventKind, SubscriptionHandle};
use crate::math::Vector3;
use crate::orientation::{HeadingReading, OrientationEstimator};
use crate::platform::{
    PlatformError, RegistrationId, SamplingRate, SensorKind, SensorListener, SensorPlatform, SensorSample,
};
use crate::steps::StepTracker;

/// State shared between the engine and its per-stream listeners
struct FusionState {
    buffer: Mutex<SampleBuffer>,
    steps: Mutex<StepTracker>,
    accuracy: Mutex<HashMap<SensorKind, AccuracyLevel>>,
    estimator: OrientationEstimator,
    events: Arc<EventChannel>,
}

impl FusionState {
    fn ingest(&self, sample: &SensorSample) {
        trace!(sensor = %sample.kind, timestamp = sample.timestamp, "sample received");
        match self.process(sample) {
            Ok(Some(event)) => {
                self.events.publish(&event);
            }
            Ok(None) => {}
            Err(e) => self.report(e),
        }
    }

    fn process(&self, sample: &SensorSample) -> FusionResult<Option<Event>> {
        match sample.kind {
            SensorKind::Accelerometer | SensorKind::Magnetometer => {
                let vector = read_vector(sample)?;
                let heading = {
                    let mut buffer = self.buffer.lock();
                    if sample.kind == SensorKind::Accelerometer {
                        buffer.record_accel(vector);
                    } else {
                        buffer.record_magnetic(vector);
                    }
                    self.estimator.compute_heading(&buffer)
                };
                Ok(heading.map(|h| Event::CompassUpdate {
                    azimuth_degrees: h.azimuth_degrees,
                }))
            }
            SensorKind::StepCounter => {
                let value = match sample.values.first() {
                    Some(v) if v.is_finite() => *v,
                    Some(v) => {
                        return Err(FusionError::Processing(format!(
                            "non-finite step count {v}"
                        )))
                    }
                    None => {
                        return Err(FusionError::Processing(
                            "empty step counter sample".to_string(),
                        ))
                    }
                };
                let count = self.steps.lock().record(value);
                Ok(Some(Event::StepUpdate { count }))
            }
        }
    }

    fn accuracy_changed(&self, kind: SensorKind, code: i32) {
        let level = AccuracyMonitor::classify(code);
        self.accuracy.lock().insert(kind, level);

        if AccuracyMonitor::is_degraded(level) {
            self.report(FusionError::AccuracyDegraded(code));
        } else {
            debug!(sensor = %kind, ?level, "sensor accuracy changed");
        }
    }

    fn report(&self, err: FusionError) {
        match &err {
            FusionError::AccuracyDegraded(_) => warn!("{}", err),
            e if e.is_capability_missing() => warn!("{}", e),
            e if e.is_registration_failure() => error!(source = "platform", "{}", e),
            e => error!("{}", e),
        }
        self.events.publish(&Event::error(err.to_string()));
    }
}

fn read_vector(sample: &SensorSample) -> FusionResult<Vector3> {
    let vector = Vector3::from_slice(&sample.values).ok_or_else(|| {
        FusionError::Processing(format!(
            "{} sample has {} values, expected 3",
            sample.kind,
            sample.values.len()
        ))
    })?;
    if !vector.is_finite() {
        return Err(FusionError::Processing(format!(
            "{} sample contains non-finite values",
            sample.kind
        )));
    }
    Ok(vector)
}

/// Callback object handed to the platform for one stream
struct StreamListener {
    kind: SensorKind,
    state: Arc<FusionState>,
}

impl SensorListener for StreamListener {
    fn on_sample(&self, sample: &SensorSample) {
        if sample.kind != self.kind {
            self.state.report(FusionError::Processing(format!(
                "{} sample delivered on {} stream",
                sample.kind, self.kind
            )));
            return;
        }
        self.state.ingest(sample);
    }

    fn on_accuracy_changed(&self, kind: SensorKind, accuracy: i32) {
        self.state.accuracy_changed(kind, accuracy);
    }
}

/// Active platform registrations. Heading and step tracking are independent.
#[derive(Debug, Default)]
struct TrackingSession {
    accel: Option<RegistrationId>,
    magnetic: Option<RegistrationId>,
    steps: Option<RegistrationId>,
}

impl TrackingSession {
    fn heading_active(&self) -> bool {
        self.accel.is_some() || self.magnetic.is_some()
    }
}

/// Reactive fusion engine driven by platform sample delivery
pub struct SensorFusionEngine {
    platform: Arc<dyn SensorPlatform>,
    config: EngineConfig,
    state: Arc<FusionState>,
    session: Mutex<TrackingSession>,
}

impl SensorFusionEngine {
    pub fn new(platform: Arc<dyn SensorPlatform>, config: EngineConfig) -> Self {
        Self::with_channel(platform, config, Arc::new(EventChannel::new()))
    }

    /// Engine publishing into an existing channel
    pub fn with_channel(
        platform: Arc<dyn SensorPlatform>,
        config: EngineConfig,
        events: Arc<EventChannel>,
    ) -> Self {
        for kind in [
            SensorKind::Accelerometer,
            SensorKind::Magnetometer,
            SensorKind::StepCounter,
        ] {
            if platform.default_sensor(kind).is_none() {
                error!("{} not available", kind);
            }
        }

        let state = Arc::new(FusionState {
            buffer: Mutex::new(SampleBuffer::new()),
            steps: Mutex::new(StepTracker::new()),
            accuracy: Mutex::new(HashMap::new()),
            estimator: OrientationEstimator::from_config(&config),
            events,
        });

        Self {
            platform,
            config,
            state,
            session: Mutex::new(TrackingSession::default()),
        }
    }

    /// Channel the UI subscribes to
    pub fn events(&self) -> &Arc<EventChannel> {
        &self.state.events
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Queued subscription sized by `queue_capacity` from the engine config
    pub fn subscribe_queued(&self, kind: EventKind) -> (SubscriptionHandle, Receiver<Event>) {
        self.events().subscribe_queued(kind, self.config.queue_capacity)
    }

    /// Subscribe to accelerometer and magnetometer streams
    pub fn start_heading_tracking(&self) {
        if let Err(e) = self.try_start_heading() {
            self.state.report(e);
        }
    }

    pub fn stop_heading_tracking(&self) {
        if let Err(e) = self.try_stop_heading() {
            self.state.report(e);
        }
    }

    /// Subscribe to the step counter stream
    pub fn start_step_tracking(&self) {
        if let Err(e) = self.try_start_steps() {
            self.state.report(e);
        }
    }

    pub fn stop_step_tracking(&self) {
        if let Err(e) = self.try_stop_steps() {
            self.state.report(e);
        }
    }

    /// Entry point for one delivered sample. Failures are reported as
    /// `CompassError` and never stop later samples from being processed.
    pub fn ingest_sample(&self, kind: SensorKind, values: &[f32], timestamp: u64) {
        self.state.ingest(&SensorSample::new(kind, values, timestamp));
    }

    /// Accuracy notification; below `Medium` raises an advisory `CompassError`
    pub fn on_accuracy_changed(&self, kind: SensorKind, accuracy: i32) {
        self.state.accuracy_changed(kind, accuracy);
    }

    pub fn is_heading_active(&self) -> bool {
        self.session.lock().heading_active()
    }

    pub fn is_step_active(&self) -> bool {
        self.session.lock().steps.is_some()
    }

    /// Copy of the buffered vectors
    pub fn snapshot(&self) -> SampleBuffer {
        *self.state.buffer.lock()
    }

    /// Heading for the buffered vectors without publishing anything
    pub fn current_heading(&self) -> Option<HeadingReading> {
        let buffer = self.state.buffer.lock();
        self.state.estimator.compute_heading(&buffer)
    }

    pub fn step_count(&self) -> f32 {
        self.state.steps.lock().count()
    }

    /// Last accuracy level reported for `kind`, if any
    pub fn accuracy(&self, kind: SensorKind) -> Option<AccuracyLevel> {
        self.state.accuracy.lock().get(&kind).copied()
    }

    fn listener(&self, kind: SensorKind) -> Arc<dyn SensorListener> {
        Arc::new(StreamListener {
            kind,
            state: Arc::clone(&self.state),
        })
    }

    fn register(&self, kind: SensorKind, rate: SamplingRate) -> Result<RegistrationId, PlatformError> {
        let handle = self
            .platform
            .default_sensor(kind)
            .ok_or(PlatformError::Unavailable)?;
        self.platform.register(&handle, self.listener(kind), rate)
    }

    fn try_start_heading(&self) -> FusionResult<()> {
        let mut session = self.session.lock();
        if session.accel.is_some() && session.magnetic.is_some() {
            debug!("Compass already started");
            return Ok(());
        }

        let present = self.platform.default_sensor(SensorKind::Accelerometer).is_some()
            && self.platform.default_sensor(SensorKind::Magnetometer).is_some();
        if !present {
            return Err(FusionError::HeadingSensorsMissing);
        }

        let mut added_accel = None;
        if session.accel.is_none() {
            let id = self
                .register(SensorKind::Accelerometer, self.config.heading_rate)
                .map_err(FusionError::HeadingRegistration)?;
            session.accel = Some(id);
            added_accel = Some(id);
        }

        if session.magnetic.is_none() {
            match self.register(SensorKind::Magnetometer, self.config.heading_rate) {
                Ok(id) => session.magnetic = Some(id),
                Err(e) => {
                    // Leave the session as it was before this call.
                    if let Some(id) = added_accel {
                        match self.platform.unregister(id) {
                            Ok(()) => session.accel = None,
                            // The accelerometer is still registered, so the
                            // session keeps it and a later stop retries.
                            Err(rollback) => error!(
                                "Failed to roll back accelerometer registration {:?}, compass left partially started: {}",
                                id, rollback
                            ),
                        }
                    }
                    return Err(FusionError::HeadingRegistration(e));
                }
            }
        }

        info!("Compass started");
        Ok(())
    }

    fn try_stop_heading(&self) -> FusionResult<()> {
        let mut guard = self.session.lock();
        let session = &mut *guard;
        if !session.heading_active() {
            debug!("Compass not running, nothing to stop");
            return Ok(());
        }

        let mut failure = None;
        for slot in [&mut session.accel, &mut session.magnetic] {
            if let Some(id) = *slot {
                match self.platform.unregister(id) {
                    Ok(()) => *slot = None,
                    Err(e) => {
                        failure.get_or_insert(e);
                    }
                }
            }
        }

        match failure {
            Some(e) => Err(FusionError::HeadingUnregistration(e)),
            None => {
                info!("Compass stopped");
                Ok(())
            }
        }
    }

    fn try_start_steps(&self) -> FusionResult<()> {
        let mut session = self.session.lock();
        if session.steps.is_some() {
            debug!("Step counter already started");
            return Ok(());
        }
        if self.platform.default_sensor(SensorKind::StepCounter).is_none() {
            return Err(FusionError::StepCounterMissing);
        }

        let id = self
            .register(SensorKind::StepCounter, self.config.step_rate)
            .map_err(FusionError::StepRegistration)?;
        session.steps = Some(id);
        info!("Step counter started");
        Ok(())
    }

    fn try_stop_steps(&self) -> FusionResult<()> {
        let mut session = self.session.lock();
        let Some(id) = session.steps else {
            debug!("Step counter not running, nothing to stop");
            return Ok(());
        };

        self.platform
            .unregister(id)
            .map_err(FusionError::StepUnregistration)?;
        session.steps = None;
        info!("Step counter stopped");
        Ok(())
    }
}

impl Drop for SensorFusionEngine {
    fn drop(&mut self) {
        let session = self.session.get_mut();
        for id in [session.accel.take(), session.magnetic.take(), session.steps.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = self.platform.unregister(id) {
                warn!("Failed to release sensor registration on shutdown: {}", e);
            }
        }
    }
}
