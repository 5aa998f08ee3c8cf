use serde::{Deserialize, Serialize};

/// Platform-reported confidence in a sensor's current readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccuracyLevel {
    Unreliable,
    Low,
    Medium,
    High,
}

/// Raw ordinal codes used by the platform accuracy callback
pub mod codes {
    pub const NO_CONTACT: i32 = -1;
    pub const UNRELIABLE: i32 = 0;
    pub const LOW: i32 = 1;
    pub const MEDIUM: i32 = 2;
    pub const HIGH: i32 = 3;
}

/// Stateless mapping from raw accuracy codes to [`AccuracyLevel`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AccuracyMonitor;

impl AccuracyMonitor {
    /// Codes at or below `UNRELIABLE` (including no-contact) are unreliable,
    /// anything above `HIGH` is treated as high.
    pub fn classify(raw: i32) -> AccuracyLevel {
        match raw {
            i32::MIN..=codes::UNRELIABLE => AccuracyLevel::Unreliable,
            codes::LOW => AccuracyLevel::Low,
            codes::MEDIUM => AccuracyLevel::Medium,
            _ => AccuracyLevel::High,
        }
    }

    #[inline]
    pub fn is_degraded(level: AccuracyLevel) -> bool {
        level < AccuracyLevel::Medium
    }
}
