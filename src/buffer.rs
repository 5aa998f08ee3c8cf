use serde::Serialize;

use crate::math::Vector3;

/// Most recent accelerometer and magnetometer readings.
///
/// Both vectors start at zero and are overwritten in place by each matching
/// sample. Nothing is cleared on stop, so a restarted session sees the
/// vectors left by the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SampleBuffer {
    pub last_accel: Vector3,
    pub last_magnetic: Vector3,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_accel(&mut self, accel: Vector3) {
        self.last_accel = accel;
    }

    #[inline]
    pub fn record_magnetic(&mut self, magnetic: Vector3) {
        self.last_magnetic = magnetic;
    }
}
