//! Temporal filters for smoothing angle pairs.
//!
//! Gaze vectors are smoothed per eye before the attention-cone test.

/// Exponential (first-order IIR) filter
pub mod exponential;

use crate::{Error, Result};

/// Trait for filters over a (yaw, pitch) pair
pub trait AngleFilter: Send + Sync {
    /// Apply filter to input values
    fn apply(&mut self, yaw: f64, pitch: f64) -> (f64, f64);

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl AngleFilter for NoFilter {
    fn apply(&mut self, yaw: f64, pitch: f64) -> (f64, f64) {
        (yaw, pitch)
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create a filter that keeps `smoothing` of the previous output each step.
/// Zero smoothing passes values through.
///
/// # Errors
///
/// Returns an error if `smoothing` is outside [0, 1)
pub fn create_filter(smoothing: f64) -> Result<Box<dyn AngleFilter>> {
    if !(0.0..1.0).contains(&smoothing) {
        return Err(Error::InvalidInput(format!(
            "Smoothing must be in [0, 1), got {smoothing}"
        )));
    }
    if smoothing == 0.0 {
        Ok(Box::new(NoFilter))
    } else {
        Ok(Box::new(exponential::ExponentialFilter::new(smoothing)))
    }
}
