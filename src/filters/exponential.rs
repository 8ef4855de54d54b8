use super::OffsetFilter;
use nalgebra::Vector3;

/// Exponential smoothing filter
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<Vector3<f64>>,
}

impl ExponentialFilter {
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self { alpha, last: None }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl OffsetFilter for ExponentialFilter {
    fn apply(&mut self, value: Vector3<f64>) -> Vector3<f64> {
        let filtered = match self.last {
            Some(last) => value * self.alpha + last * (1.0 - self.alpha),
            None => value,
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
