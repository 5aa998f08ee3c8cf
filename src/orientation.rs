//! Heading extraction from gravity and geomagnetic vectors.
//!
//! The rotation matrix is built with the east-north-up derivation:
//! `east = magnetic x gravity`, `north = gravity x east`, `up = gravity`,
//! each normalised. Azimuth is the yaw about the vertical axis, reported
//! in signed degrees in (-180, 180] without wrapping to [0, 360).

use serde::Serialize;

use crate::buffer::SampleBuffer;
use crate::config::EngineConfig;
use crate::math::{RotationMatrix, Vector3};

/// Standard gravity used for the free-fall rejection threshold
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Compass heading derived from one buffer snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeadingReading {
    pub azimuth_degrees: f32,
}

/// Yaw, pitch and roll in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Orientation {
    pub azimuth: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Pure function over a [`SampleBuffer`]; holds only its thresholds.
#[derive(Debug, Clone, Copy)]
pub struct OrientationEstimator {
    /// Squared gravity magnitude below which the device is treated as in free fall
    min_gravity_squared: f32,
    /// Minimum |east| before normalisation; smaller means gravity and field are collinear
    min_field_strength: f32,
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl OrientationEstimator {
    pub fn from_config(config: &EngineConfig) -> Self {
        let min_gravity = config.free_fall_gravity_ratio * STANDARD_GRAVITY;
        Self {
            min_gravity_squared: min_gravity * min_gravity,
            min_field_strength: config.min_field_strength,
        }
    }

    /// Device-to-world rotation, or `None` when the inputs are degenerate
    /// (zero vector, free fall, non-finite or collinear gravity and field).
    pub fn rotation_matrix(&self, gravity: &Vector3, magnetic: &Vector3) -> Option<RotationMatrix> {
        if !gravity.is_finite() || !magnetic.is_finite() {
            return None;
        }
        if gravity.norm_squared() < self.min_gravity_squared {
            return None;
        }

        let east = magnetic.cross(gravity);
        if east.norm() < self.min_field_strength {
            return None;
        }

        let east = east.normalized()?;
        let up = gravity.normalized()?;
        let north = up.cross(&east);

        Some(RotationMatrix::from_rows(east, north, up))
    }

    /// Yaw/pitch/roll from a rotation matrix
    pub fn orientation(matrix: &RotationMatrix) -> Orientation {
        Orientation {
            azimuth: matrix.get(0, 1).atan2(matrix.get(1, 1)),
            pitch: (-matrix.get(2, 1)).clamp(-1.0, 1.0).asin(),
            roll: (-matrix.get(2, 0)).atan2(matrix.get(2, 2)),
        }
    }

    /// Full orientation for the current buffer contents
    pub fn compute_orientation(&self, buffer: &SampleBuffer) -> Option<Orientation> {
        self.rotation_matrix(&buffer.last_accel, &buffer.last_magnetic)
            .map(|m| Self::orientation(&m))
    }

    /// Heading in signed degrees; `None` means no event should be emitted
    pub fn compute_heading(&self, buffer: &SampleBuffer) -> Option<HeadingReading> {
        self.compute_orientation(buffer).map(|o| {
            let mut azimuth_degrees = o.azimuth.to_degrees();
            // atan2(-0.0, negative) lands on the excluded lower bound
            if azimuth_degrees <= -180.0 {
                azimuth_degrees = 180.0;
            }
            HeadingReading { azimuth_degrees }
        })
    }
}
