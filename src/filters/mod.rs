//! Signal filtering algorithms for smoothing head offsets.
//!
//! Face detections jitter by a few pixels from frame to frame even when the
//! viewer holds still. These filters run over consecutive head offsets before
//! they reach the camera pose controller.

/// Exponential filter for responsive smoothing
pub mod exponential;

/// Moving average filter for simple smoothing
pub mod moving_average;

use crate::Result;
use nalgebra::Vector3;

/// Trait for all offset filters
pub trait OffsetFilter: Send + Sync {
    /// Apply filter to the next input value
    fn apply(&mut self, value: Vector3<f64>) -> Vector3<f64>;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl OffsetFilter for NoFilter {
    fn apply(&mut self, value: Vector3<f64>) -> Vector3<f64> {
        value
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create an offset filter from a spec string.
///
/// Accepted forms: `none`, `exponential`, `exponential:<alpha>`,
/// `moving_average`, `moving_average:<window>`.
pub fn create_filter(spec: &str) -> Result<Box<dyn OffsetFilter>> {
    let spec = spec.trim().to_lowercase();
    let (name, param) = match spec.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (spec.as_str(), None),
    };

    match name {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "exponential" | "ema" => {
            let alpha = match param {
                Some(p) => p
                    .parse::<f64>()
                    .map_err(|e| crate::Error::FilterError(format!("Invalid alpha '{p}': {e}")))?,
                None => crate::constants::DEFAULT_SMOOTHING_ALPHA,
            };
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(crate::Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        "moving_average" | "movingaverage" => {
            let window = match param {
                Some(p) => p
                    .parse::<usize>()
                    .map_err(|e| crate::Error::FilterError(format!("Invalid window '{p}': {e}")))?,
                None => 5,
            };
            if window == 0 {
                return Err(crate::Error::FilterError("Window size must be greater than 0".to_string()));
            }
            Ok(Box::new(moving_average::MovingAverageFilter::new(window)))
        }
        _ => Err(crate::Error::FilterError(format!("Unknown filter type: {spec}"))),
    }
}
