//! Incremental orientation tracking from accelerometer samples.
//!
//! The estimator captures a baseline on the first sample after activation and
//! from then on reports the change since the *previous* sample, projected onto
//! scene axes. Integrating those deltas (with the parallax sign) is the camera
//! pose controller's job.

use crate::config::{OrientationConfig, SceneAxis};
use crate::sensor::OrientationSample;
use log::{debug, info};
use nalgebra::Vector3;

/// Baseline capture state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationCalibration {
    /// Set once the first sample after activation has been seen
    pub calibrated: bool,
    /// Sample captured at activation
    pub baseline: Option<OrientationSample>,
    /// Most recent sample, reference for the next delta
    pub previous: Option<OrientationSample>,
}

/// Change since the previous sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationDelta {
    /// Pitch and roll changes projected onto scene axes
    pub scene: Vector3<f64>,
    pub pitch: f64,
    pub roll: f64,
    pub azimuth: f64,
}

impl OrientationDelta {
    pub fn zero() -> Self {
        Self {
            scene: Vector3::zeros(),
            pitch: 0.0,
            roll: 0.0,
            azimuth: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.scene == Vector3::zeros()
    }
}

/// Turns absolute orientation samples into incremental scene-axis deltas
#[derive(Debug, Clone)]
pub struct OrientationEstimator {
    pitch_axis: SceneAxis,
    roll_axis: SceneAxis,
    calibration: OrientationCalibration,
}

impl OrientationEstimator {
    pub fn new(config: &OrientationConfig) -> Self {
        Self {
            pitch_axis: config.pitch_axis,
            roll_axis: config.roll_axis,
            calibration: OrientationCalibration::default(),
        }
    }

    /// Process one sample; the first after activation returns a zero delta
    pub fn update(&mut self, sample: OrientationSample) -> OrientationDelta {
        let Some(previous) = self.calibration.previous else {
            info!(
                "Orientation baseline captured: azimuth {:.3}, pitch {:.3}, roll {:.3}",
                sample.azimuth, sample.pitch, sample.roll
            );
            self.calibration = OrientationCalibration {
                calibrated: true,
                baseline: Some(sample),
                previous: Some(sample),
            };
            return OrientationDelta::zero();
        };

        let pitch = sample.pitch - previous.pitch;
        let roll = sample.roll - previous.roll;
        let azimuth = sample.azimuth - previous.azimuth;
        self.calibration.previous = Some(sample);

        let mut scene = Vector3::zeros();
        scene[self.pitch_axis.index()] += pitch;
        scene[self.roll_axis.index()] += roll;

        debug!("Orientation delta pitch {:.4}, roll {:.4}", pitch, roll);
        OrientationDelta {
            scene,
            pitch,
            roll,
            azimuth,
        }
    }

    /// Forget the baseline; the next sample re-calibrates
    pub fn reset(&mut self) {
        self.calibration = OrientationCalibration::default();
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.calibrated
    }

    pub fn baseline(&self) -> Option<OrientationSample> {
        self.calibration.baseline
    }

    pub fn calibration(&self) -> &OrientationCalibration {
        &self.calibration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> OrientationEstimator {
        OrientationEstimator::new(&OrientationConfig::default())
    }

    #[test]
    fn test_first_sample_is_zero_and_calibrates() {
        let mut est = estimator();
        assert!(!est.is_calibrated());
        let delta = est.update(OrientationSample::new(10.0, 5.0, 0.0));
        assert!(delta.is_zero());
        assert!(est.is_calibrated());
        assert_eq!(est.baseline(), Some(OrientationSample::new(10.0, 5.0, 0.0)));
    }

    #[test]
    fn test_delta_relative_to_previous_sample() {
        let mut est = estimator();
        est.update(OrientationSample::new(0.0, 100.0, -50.0));
        est.update(OrientationSample::new(0.0, 1.0, 1.0));
        let delta = est.update(OrientationSample::new(0.0, 4.0, 3.0));
        assert_eq!(delta.pitch, 3.0);
        assert_eq!(delta.roll, 2.0);
        assert_eq!(delta.scene, Vector3::new(3.0, 2.0, 0.0));
    }

    #[test]
    fn test_baseline_assigned_once() {
        let mut est = estimator();
        est.update(OrientationSample::new(1.0, 2.0, 3.0));
        est.update(OrientationSample::new(4.0, 5.0, 6.0));
        assert_eq!(est.baseline(), Some(OrientationSample::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_reset_rebaselines() {
        let mut est = estimator();
        est.update(OrientationSample::new(0.0, 0.0, 0.0));
        est.update(OrientationSample::new(0.0, 1.0, 1.0));
        est.reset();
        assert!(!est.is_calibrated());
        assert!(est.update(OrientationSample::new(0.0, 9.0, 9.0)).is_zero());
        assert_eq!(est.baseline(), Some(OrientationSample::new(0.0, 9.0, 9.0)));
    }

    #[test]
    fn test_custom_axis_mapping() {
        let config = OrientationConfig {
            pitch_axis: SceneAxis::Y,
            roll_axis: SceneAxis::Z,
            ..OrientationConfig::default()
        };
        let mut est = OrientationEstimator::new(&config);
        est.update(OrientationSample::new(0.0, 0.0, 0.0));
        let delta = est.update(OrientationSample::new(7.0, 1.0, 2.0));
        assert_eq!(delta.scene, Vector3::new(0.0, 1.0, 2.0));
        assert_eq!(delta.azimuth, 7.0);
    }
}
