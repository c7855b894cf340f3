use super::AngleFilter;

/// Exponential smoothing filter: `out = smoothing * last + (1 - smoothing) * input`
pub struct ExponentialFilter {
    smoothing: f64,
    last: Option<(f64, f64)>,
}

impl ExponentialFilter {
    /// # Panics
    ///
    /// Panics if smoothing is not in [0, 1)
    #[must_use]
    pub fn new(smoothing: f64) -> Self {
        assert!((0.0..1.0).contains(&smoothing), "Smoothing must be in [0, 1)");
        Self { smoothing, last: None }
    }

    /// Last output, if any
    #[must_use]
    pub fn last(&self) -> Option<(f64, f64)> {
        self.last
    }
}

impl AngleFilter for ExponentialFilter {
    fn apply(&mut self, yaw: f64, pitch: f64) -> (f64, f64) {
        let filtered = match self.last {
            Some((last_yaw, last_pitch)) => (
                self.smoothing * last_yaw + (1.0 - self.smoothing) * yaw,
                self.smoothing * last_pitch + (1.0 - self.smoothing) * pitch,
            ),
            None => (yaw, pitch),
        };

        self.last = Some(filtered);
        filtered
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
