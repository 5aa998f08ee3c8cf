//! Engine lifecycle, routing and failure reporting over the mock platform

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use compass_fusion::platform::mock::PlatformCall;
use compass_fusion::{
    AccuracyLevel, EngineConfig, Event, EventKind, MockSensorPlatform, SamplingRate, SensorFusionEngine,
    SensorKind, Vector3,
};

use crate::assert_close;
use crate::test_utils::{engine_with, full_engine, Recorder};

#[test]
fn accel_then_magnetic_emits_one_pinned_heading() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    engine.start_heading_tracking();

    platform.deliver_values(SensorKind::Accelerometer, &[0.0, 0.0, 9.8], 1_000);
    assert!(recorder.events().is_empty(), "no heading before the field is known");

    platform.deliver_values(SensorKind::Magnetometer, &[20.0, 0.0, -30.0], 2_000);
    let azimuths = recorder.azimuths();
    assert_eq!(azimuths.len(), 1);
    assert_close!(azimuths[0], -90.0);
    assert!(recorder.errors().is_empty());
}

#[test]
fn upright_device_with_vertical_field_is_handled_without_error() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    engine.start_heading_tracking();

    platform.deliver_values(SensorKind::Accelerometer, &[0.0, 9.8, 0.0], 1);
    platform.deliver_values(SensorKind::Magnetometer, &[0.0, 0.0, -50.0], 2);

    // Gravity and field are perpendicular here, so the matrix exists; the
    // yaw is the degenerate atan2(0, 0) and comes out as zero.
    assert!(recorder.errors().is_empty());
    let azimuths = recorder.azimuths();
    assert_eq!(azimuths.len(), 1);
    assert!(azimuths[0].is_finite());
    assert_close!(azimuths[0], 0.0);
}

#[test]
fn collinear_vectors_emit_nothing() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    engine.start_heading_tracking();

    platform.deliver_values(SensorKind::Accelerometer, &[0.0, 0.0, 9.8], 1);
    platform.deliver_values(SensorKind::Magnetometer, &[0.0, 0.0, -45.0], 2);

    assert!(recorder.events().is_empty());
}

#[test]
fn every_step_sample_is_republished() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    engine.start_step_tracking();

    for (i, count) in [5.0, 7.0, 7.0].iter().enumerate() {
        platform.deliver_values(SensorKind::StepCounter, &[*count], i as u64);
    }

    assert_eq!(recorder.step_counts(), vec![5.0, 7.0, 7.0]);
    assert_eq!(engine.step_count(), 7.0);
    assert!(recorder.of_kind(EventKind::CompassUpdate).is_empty());
}

#[test]
fn missing_magnetometer_reports_once_and_registers_nothing() {
    let (platform, engine) = engine_with(&[SensorKind::Accelerometer, SensorKind::StepCounter]);
    let recorder = Recorder::attach(&engine);

    engine.start_heading_tracking();

    assert_eq!(recorder.errors(), vec!["Required sensors not available".to_string()]);
    assert_eq!(recorder.events().len(), 1);
    assert_eq!(platform.register_count(), 0);
    assert!(!engine.is_heading_active());
}

#[test]
fn missing_accelerometer_reports_once_and_registers_nothing() {
    let (platform, engine) = engine_with(&[SensorKind::Magnetometer, SensorKind::StepCounter]);
    let recorder = Recorder::attach(&engine);

    engine.start_heading_tracking();

    assert_eq!(recorder.errors(), vec!["Required sensors not available".to_string()]);
    assert_eq!(recorder.events().len(), 1);
    assert_eq!(platform.register_count(), 0);
    assert!(!engine.is_heading_active());

    // Step tracking does not depend on the heading sensors
    engine.start_step_tracking();
    assert!(engine.is_step_active());
}

#[test]
fn missing_step_counter_reports_once() {
    let (platform, engine) = engine_with(&[SensorKind::Accelerometer, SensorKind::Magnetometer]);
    let recorder = Recorder::attach(&engine);

    engine.start_step_tracking();

    assert_eq!(recorder.errors(), vec!["Step counter sensor not available".to_string()]);
    assert_eq!(platform.register_count(), 0);
    assert!(!engine.is_step_active());
}

#[test]
fn stop_before_start_is_silent() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);

    engine.stop_heading_tracking();
    engine.stop_step_tracking();

    assert!(recorder.events().is_empty());
    assert!(platform.calls().is_empty());
}

#[test]
fn repeated_start_keeps_one_registration_per_sensor() {
    let (platform, engine) = full_engine();

    engine.start_heading_tracking();
    engine.start_heading_tracking();
    engine.start_step_tracking();
    engine.start_step_tracking();

    assert_eq!(platform.active_registrations(SensorKind::Accelerometer), 1);
    assert_eq!(platform.active_registrations(SensorKind::Magnetometer), 1);
    assert_eq!(platform.active_registrations(SensorKind::StepCounter), 1);
    assert_eq!(platform.register_count(), 3);
}

#[test]
fn registrations_use_configured_rates() {
    let (platform, engine) = full_engine();
    engine.start_heading_tracking();
    engine.start_step_tracking();

    let rates: Vec<(SensorKind, SamplingRate)> = platform
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            PlatformCall::Register { kind, rate, .. } => Some((kind, rate)),
            _ => None,
        })
        .collect();

    assert_eq!(
        rates,
        vec![
            (SensorKind::Accelerometer, SamplingRate::Ui),
            (SensorKind::Magnetometer, SamplingRate::Ui),
            (SensorKind::StepCounter, SamplingRate::Normal),
        ]
    );
}

#[test]
fn heading_and_steps_run_independently() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);

    engine.start_step_tracking();
    assert_eq!(platform.deliver_values(SensorKind::Accelerometer, &[0.0, 0.0, 9.8], 1), 0);
    assert_eq!(platform.deliver_values(SensorKind::StepCounter, &[3.0], 2), 1);

    engine.start_heading_tracking();
    engine.stop_step_tracking();
    assert!(engine.is_heading_active());
    assert!(!engine.is_step_active());
    assert_eq!(platform.deliver_values(SensorKind::StepCounter, &[4.0], 3), 0);

    assert_eq!(recorder.step_counts(), vec![3.0]);
    assert!(recorder.errors().is_empty());
}

#[test]
fn low_accuracy_is_advisory() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    engine.start_heading_tracking();

    platform.deliver_accuracy(SensorKind::Magnetometer, 1);
    platform.deliver_accuracy(SensorKind::Magnetometer, 0);
    platform.deliver_accuracy(SensorKind::Magnetometer, 2);

    assert_eq!(
        recorder.errors(),
        vec![
            "Sensor accuracy is low: 1".to_string(),
            "Sensor accuracy is low: 0".to_string(),
        ]
    );
    assert!(engine.is_heading_active());
    assert_eq!(engine.accuracy(SensorKind::Magnetometer), Some(AccuracyLevel::Medium));
    assert_eq!(engine.accuracy(SensorKind::Accelerometer), None);

    platform.deliver_values(SensorKind::Accelerometer, &[0.0, 0.0, 9.8], 1);
    platform.deliver_values(SensorKind::Magnetometer, &[0.0, 20.0, -40.0], 2);
    assert_eq!(recorder.azimuths().len(), 1);
}

#[test]
fn malformed_sample_does_not_halt_the_stream() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    engine.start_heading_tracking();
    engine.start_step_tracking();

    platform.deliver_values(SensorKind::Accelerometer, &[0.0, 9.8], 1);
    platform.deliver_values(SensorKind::Accelerometer, &[f32::NAN, 0.0, 9.8], 2);
    platform.deliver_values(SensorKind::StepCounter, &[], 3);

    let errors = recorder.errors();
    assert_eq!(errors.len(), 3);
    assert!(errors
        .iter()
        .all(|e| e.starts_with("Error processing sensor data: ")));

    // Bad samples leave the buffer untouched
    assert_eq!(engine.snapshot().last_accel, Vector3::ZERO);

    platform.deliver_values(SensorKind::Accelerometer, &[0.0, 0.0, 9.8], 4);
    platform.deliver_values(SensorKind::Magnetometer, &[20.0, 0.0, -30.0], 5);
    platform.deliver_values(SensorKind::StepCounter, &[12.0], 6);
    assert_eq!(recorder.azimuths().len(), 1);
    assert_eq!(recorder.step_counts(), vec![12.0]);
}

#[test]
fn direct_ingest_routes_by_kind() {
    let (_platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);

    engine.ingest_sample(SensorKind::Magnetometer, &[20.0, 0.0, -30.0], 1);
    engine.ingest_sample(SensorKind::Accelerometer, &[0.0, 0.0, 9.8], 2);
    engine.ingest_sample(SensorKind::StepCounter, &[42.0], 3);

    assert_eq!(recorder.azimuths().len(), 1);
    assert_eq!(recorder.step_counts(), vec![42.0]);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.last_magnetic, Vector3::new(20.0, 0.0, -30.0));
    assert_eq!(snapshot.last_accel, Vector3::new(0.0, 0.0, 9.8));
}

#[test]
fn rejected_magnetometer_rolls_back_accelerometer() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    platform.reject_register(SensorKind::Magnetometer);

    engine.start_heading_tracking();

    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Failed to start compass: "));
    assert_eq!(platform.total_registrations(), 0);
    assert!(!engine.is_heading_active());

    platform.clear_failures();
    engine.start_heading_tracking();
    assert!(engine.is_heading_active());
    assert_eq!(platform.total_registrations(), 2);
}

#[test]
fn rejected_step_registration_reports_and_stays_stopped() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    platform.reject_register(SensorKind::StepCounter);

    engine.start_step_tracking();

    assert_eq!(
        recorder.errors(),
        vec!["Failed to start step counter: step counter registration rejected".to_string()]
    );
    assert!(!engine.is_step_active());
    assert_eq!(platform.total_registrations(), 0);
    assert_eq!(platform.deliver_values(SensorKind::StepCounter, &[3.0], 1), 0);

    platform.clear_failures();
    engine.start_step_tracking();
    assert!(engine.is_step_active());
    assert_eq!(platform.active_registrations(SensorKind::StepCounter), 1);
}

#[test]
fn failed_rollback_leaves_accelerometer_registered() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    platform.reject_register(SensorKind::Magnetometer);
    platform.reject_unregister(SensorKind::Accelerometer);

    engine.start_heading_tracking();

    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Failed to start compass: "));
    // The session mirrors what the platform still holds
    assert!(engine.is_heading_active());
    assert_eq!(platform.active_registrations(SensorKind::Accelerometer), 1);
    assert_eq!(platform.active_registrations(SensorKind::Magnetometer), 0);

    platform.clear_failures();
    recorder.clear();
    engine.stop_heading_tracking();
    assert!(recorder.events().is_empty());
    assert!(!engine.is_heading_active());
    assert_eq!(platform.total_registrations(), 0);
}

#[test]
fn failed_unregister_keeps_session_started() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);
    engine.start_heading_tracking();
    engine.start_step_tracking();
    platform.reject_unregister(SensorKind::Accelerometer);
    platform.reject_unregister(SensorKind::StepCounter);

    engine.stop_heading_tracking();
    engine.stop_step_tracking();

    let errors = recorder.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("Failed to stop compass: "));
    assert!(errors[1].starts_with("Failed to stop step counter: "));
    assert!(engine.is_heading_active());
    assert!(engine.is_step_active());
    assert_eq!(platform.active_registrations(SensorKind::Accelerometer), 1);
    assert_eq!(
        platform.active_registrations(SensorKind::Magnetometer),
        0,
        "the magnetometer is released even though the accelerometer was not"
    );
    assert_eq!(
        platform.deliver_values(SensorKind::Magnetometer, &[20.0, 0.0, -30.0], 1),
        0
    );

    // A later start only re-adds what is missing
    engine.start_heading_tracking();
    assert_eq!(platform.active_registrations(SensorKind::Accelerometer), 1);
    assert_eq!(platform.active_registrations(SensorKind::Magnetometer), 1);

    platform.clear_failures();
    recorder.clear();
    engine.stop_heading_tracking();
    engine.stop_step_tracking();
    assert!(recorder.events().is_empty());
    assert_eq!(platform.total_registrations(), 0);
}

#[test]
fn buffered_vectors_survive_restart() {
    let (platform, engine) = full_engine();
    let recorder = Recorder::attach(&engine);

    engine.start_heading_tracking();
    platform.deliver_values(SensorKind::Accelerometer, &[0.0, 0.0, 9.8], 1);
    platform.deliver_values(SensorKind::Magnetometer, &[20.0, 0.0, -30.0], 2);
    engine.stop_heading_tracking();
    recorder.clear();

    assert!(engine.current_heading().is_some());

    engine.start_heading_tracking();
    assert!(recorder.events().is_empty(), "start itself publishes nothing");

    // The first new sample pairs with the stale magnetic vector
    platform.deliver_values(SensorKind::Accelerometer, &[0.0, 0.0, 9.8], 3);
    let azimuths = recorder.azimuths();
    assert_eq!(azimuths.len(), 1);
    assert_close!(azimuths[0], -90.0);
}

#[test]
fn handlers_may_call_back_into_the_engine() {
    let platform = Arc::new(MockSensorPlatform::full());
    let engine = Arc::new(SensorFusionEngine::new(platform.clone(), EngineConfig::default()));
    let calls = Arc::new(AtomicUsize::new(0));

    let weak = Arc::downgrade(&engine);
    let seen = Arc::clone(&calls);
    engine.events().subscribe(EventKind::CompassError, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        if let Some(engine) = weak.upgrade() {
            engine.stop_heading_tracking();
        }
    });

    engine.start_heading_tracking();
    platform.deliver_accuracy(SensorKind::Accelerometer, 0);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!engine.is_heading_active());
    assert_eq!(platform.total_registrations(), 0);
}

#[test]
fn dropping_the_engine_releases_registrations() {
    let platform = Arc::new(MockSensorPlatform::full());
    {
        let engine = SensorFusionEngine::new(platform.clone(), EngineConfig::default());
        engine.start_heading_tracking();
        engine.start_step_tracking();
        assert_eq!(platform.total_registrations(), 3);
    }
    assert_eq!(platform.total_registrations(), 0);
}

#[test]
fn engine_queued_subscription_uses_configured_capacity() {
    let platform = Arc::new(MockSensorPlatform::full());
    let config = EngineConfig {
        queue_capacity: 2,
        ..EngineConfig::default()
    };
    let engine = SensorFusionEngine::new(platform.clone(), config);
    let (handle, rx) = engine.subscribe_queued(EventKind::StepUpdate);
    engine.start_step_tracking();

    for count in [1.0, 2.0, 3.0] {
        platform.deliver_values(SensorKind::StepCounter, &[count], 0);
    }

    let received: Vec<f32> = rx
        .try_iter()
        .filter_map(|event| match event {
            Event::StepUpdate { count } => Some(count),
            _ => None,
        })
        .collect();
    assert_eq!(received, vec![1.0, 2.0]);
    assert_eq!(engine.events().dropped_count(), 1);
    assert!(engine.events().unsubscribe(handle));
}
