//! Converts face regions into normalised head offsets.
//!
//! The horizontal and vertical components are the displacement of the face
//! centre from the frame centre divided by half the frame dimension, so they
//! lie in `[-1, 1]`. The depth component is the reciprocal of the face size
//! relative to a reference size, a coarse proxy for distance from the screen.
//!
//! Short detection dropouts are bridged: the last offset is held for a few
//! misses, then decays geometrically to zero.

use crate::config::HeadPoseConfig;
use crate::face_detection::FaceRegion;
use crate::filters::{create_filter, OffsetFilter};
use crate::Result;
use log::debug;
use nalgebra::Vector3;

/// Normalised head offset relative to the device centre.
///
/// `x` is positive when the face is right of centre in the image, `y` when it
/// is above centre, `z` when the face is farther than the reference distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadOffset(pub Vector3<f64>);

impl HeadOffset {
    pub fn zero() -> Self {
        Self(Vector3::zeros())
    }

    pub fn x(&self) -> f64 {
        self.0.x
    }

    pub fn y(&self) -> f64 {
        self.0.y
    }

    pub fn z(&self) -> f64 {
        self.0.z
    }

    pub fn magnitude(&self) -> f64 {
        self.0.norm()
    }
}

/// Raw offset for a single region, before smoothing.
///
/// Horizontal and vertical components are clamped to `[-1, 1]`, depth to
/// `[-max_offset, max_offset]`, and the whole vector to length `max_offset`.
pub fn region_offset(
    region: &FaceRegion,
    reference_face_size: f64,
    max_offset: f64,
    invert_x: bool,
    invert_y: bool,
) -> HeadOffset {
    let (cx, cy) = region.center();
    let half_w = f64::from(region.frame_width) / 2.0;
    let half_h = f64::from(region.frame_height) / 2.0;

    let mut x = ((cx - half_w) / half_w).clamp(-1.0, 1.0);
    // Image rows grow downward
    let mut y = ((half_h - cy) / half_h).clamp(-1.0, 1.0);
    if invert_x {
        x = -x;
    }
    if invert_y {
        y = -y;
    }

    let z = (reference_face_size / region.height_fraction() - 1.0).clamp(-max_offset, max_offset);

    HeadOffset(clamp_magnitude(Vector3::new(x, y, z), max_offset))
}

fn clamp_magnitude(v: Vector3<f64>, max: f64) -> Vector3<f64> {
    let norm = v.norm();
    if norm > max && norm > 0.0 {
        v * (max / norm)
    } else {
        v
    }
}

/// Smooths face detections into a stable head offset
pub struct HeadPoseEstimator {
    filter: Box<dyn OffsetFilter>,
    reference_face_size: f64,
    max_offset: f64,
    invert_x: bool,
    invert_y: bool,
    hold_frames: u32,
    decay: f64,
    zero_epsilon: f64,
    current: Option<HeadOffset>,
    misses: u32,
}

impl HeadPoseEstimator {
    pub fn new(config: &HeadPoseConfig) -> Result<Self> {
        config.validate()?;
        let filter = create_filter(&config.smoothing)?;

        Ok(Self {
            filter,
            reference_face_size: config.reference_face_size,
            max_offset: config.max_offset,
            invert_x: config.invert_x,
            invert_y: config.invert_y,
            hold_frames: config.hold_frames,
            decay: config.decay,
            zero_epsilon: config.zero_epsilon,
            current: None,
            misses: 0,
        })
    }

    /// Feed the detector output for one frame.
    ///
    /// Returns `None` only while no face has been seen since construction or
    /// the last [`reset`](Self::reset).
    pub fn update(&mut self, region: Option<FaceRegion>) -> Option<HeadOffset> {
        match region {
            Some(region) => {
                self.misses = 0;
                let raw =
                    region_offset(&region, self.reference_face_size, self.max_offset, self.invert_x, self.invert_y);
                let smoothed = clamp_magnitude(self.filter.apply(raw.0), self.max_offset);
                self.current = Some(HeadOffset(smoothed));
            }
            None => {
                let held = self.current?;
                self.misses = self.misses.saturating_add(1);
                if self.misses > self.hold_frames {
                    let decayed = self.decay_offset(held);
                    // Re-seed smoothing so a reacquired face blends from here
                    self.filter.reset();
                    self.filter.apply(decayed.0);
                    self.current = Some(decayed);
                }
                debug!("Face miss {} (hold {}), offset {:?}", self.misses, self.hold_frames, self.current);
            }
        }

        self.current
    }

    fn decay_offset(&self, offset: HeadOffset) -> HeadOffset {
        let decayed = offset.0 * self.decay;
        if decayed.norm() < self.zero_epsilon {
            HeadOffset::zero()
        } else {
            HeadOffset(decayed)
        }
    }

    /// Clear held, decayed and smoothing state
    pub fn reset(&mut self) {
        self.filter.reset();
        self.current = None;
        self.misses = 0;
    }

    /// Last reported offset
    pub fn current(&self) -> Option<HeadOffset> {
        self.current
    }

    /// Number of consecutive frames without a face
    pub fn consecutive_misses(&self) -> u32 {
        self.misses
    }

    pub fn max_offset(&self) -> f64 {
        self.max_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: u32, y: u32, size: u32) -> FaceRegion {
        FaceRegion::new(x, y, size, size, 640, 480).unwrap()
    }

    fn estimator(smoothing: &str) -> HeadPoseEstimator {
        let config = HeadPoseConfig {
            smoothing: smoothing.to_string(),
            ..HeadPoseConfig::default()
        };
        HeadPoseEstimator::new(&config).unwrap()
    }

    #[test]
    fn test_centered_face_has_zero_planar_offset() {
        let offset = region_offset(&region(280, 200, 80), 0.25, 1.5, false, false);
        assert!(offset.x().abs() < 1e-12);
        assert!(offset.y().abs() < 1e-12);
    }

    #[test]
    fn test_right_face_maps_to_positive_x() {
        let offset = region_offset(&region(560, 200, 80), 0.25, 1.5, false, false);
        assert!((offset.x() - 0.875).abs() < 1e-9);
        assert!(offset.y().abs() < 1e-12);
    }

    #[test]
    fn test_upper_face_maps_to_positive_y() {
        let offset = region_offset(&region(280, 0, 80), 0.25, 1.5, false, false);
        assert!(offset.y() > 0.0);
    }

    #[test]
    fn test_inversion_flips_axes() {
        let plain = region_offset(&region(560, 0, 80), 0.25, 1.5, false, false);
        let inverted = region_offset(&region(560, 0, 80), 0.25, 1.5, true, true);
        assert!((plain.x() + inverted.x()).abs() < 1e-12);
        assert!((plain.y() + inverted.y()).abs() < 1e-12);
    }

    #[test]
    fn test_depth_from_size() {
        // 120 / 480 = 0.25, the reference size
        let at_reference = region_offset(&region(260, 180, 120), 0.25, 1.5, false, false);
        assert!(at_reference.z().abs() < 1e-12);

        // Smaller face means farther away
        let far = region_offset(&region(280, 200, 80), 0.25, 1.5, false, false);
        assert!(far.z() > 0.0);

        // Larger face means closer
        let near = region_offset(&region(170, 90, 300), 0.25, 1.5, false, false);
        assert!(near.z() < 0.0);
    }

    #[test]
    fn test_magnitude_clamped() {
        let offset = region_offset(&region(0, 0, 10), 0.25, 1.0, false, false);
        assert!(offset.magnitude() <= 1.0 + 1e-12);
    }

    #[test]
    fn test_none_until_first_detection() {
        let mut est = estimator("exponential:0.6");
        assert!(est.update(None).is_none());
        assert!(est.update(None).is_none());
        assert!(est.update(Some(region(280, 200, 80))).is_some());
    }

    #[test]
    fn test_constant_input_converges() {
        let mut est = estimator("exponential:0.3");
        let r = region(400, 100, 120);
        let target = region_offset(&r, 0.25, 1.5, false, false);
        let mut last = est.update(Some(r)).unwrap();
        for _ in 0..50 {
            last = est.update(Some(r)).unwrap();
        }
        assert!((last.0 - target.0).norm() < 1e-9);
    }

    #[test]
    fn test_hold_then_decay_to_zero() {
        let mut est = estimator("none");
        let first = est.update(Some(region(500, 100, 120))).unwrap();

        for _ in 0..5 {
            assert_eq!(est.update(None).unwrap(), first);
        }

        let mut previous = first.magnitude();
        let mut reached_zero = false;
        for _ in 0..40 {
            let current = est.update(None).unwrap().magnitude();
            if current == 0.0 {
                reached_zero = true;
                break;
            }
            assert!(current < previous);
            previous = current;
        }
        assert!(reached_zero);
    }

    #[test]
    fn test_reacquired_face_blends_from_decayed_value() {
        let mut est = estimator("exponential:0.5");
        let r = region(500, 100, 120);
        est.update(Some(r));
        for _ in 0..10 {
            est.update(None);
        }
        let decayed = est.current().unwrap();
        let target = region_offset(&r, 0.25, 1.5, false, false);
        let blended = est.update(Some(r)).unwrap();
        assert!((blended.0 - (target.0 * 0.5 + decayed.0 * 0.5)).norm() < 1e-9);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut est = estimator("none");
        est.update(Some(region(280, 200, 80)));
        est.reset();
        assert!(est.current().is_none());
        assert!(est.update(None).is_none());
    }
}
