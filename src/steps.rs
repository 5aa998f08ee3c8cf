/// Latch for the platform's cumulative step counter.
///
/// The platform already debounces physical steps and reports a
/// non-decreasing total since boot, so no delta or detection happens here.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepTracker {
    count: f32,
}

impl StepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite with the delivered cumulative value and return it for emission
    #[inline]
    pub fn record(&mut self, value: f32) -> f32 {
        self.count = value;
        self.count
    }

    #[inline]
    pub fn count(&self) -> f32 {
        self.count
    }
}
