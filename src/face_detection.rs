//! Cascade face detection over single camera frames.
//!
//! The detector itself only knows about a [`CascadeClassifier`], a trait seam
//! that yields raw candidate rectangles. With the `opencv` feature the
//! [`crate::cascade`] module provides the OpenCV implementation; tests drive
//! the detector with scripted classifiers.

use crate::constants::DEFAULT_MIN_FACE_SIZE;
use crate::utils::{clip_rect, safe_cast::f64_to_u32_clamp};
use crate::{Error, Result};
use image::GrayImage;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Raw candidate rectangle as reported by a cascade classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

/// Primary face found in a frame, in pixel coordinates of that frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Width of the frame the region was detected in
    pub frame_width: u32,
    /// Height of the frame the region was detected in
    pub frame_height: u32,
}

impl FaceRegion {
    /// Create a region, checking that it is non-empty and lies inside the frame
    pub fn new(x: u32, y: u32, width: u32, height: u32, frame_width: u32, frame_height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!("Empty face region {width}x{height}")));
        }
        let inside_x = x.checked_add(width).is_some_and(|end| end <= frame_width);
        let inside_y = y.checked_add(height).is_some_and(|end| end <= frame_height);
        if !inside_x || !inside_y {
            return Err(Error::InvalidInput(format!(
                "Face region ({x}, {y}, {width}, {height}) exceeds frame {frame_width}x{frame_height}"
            )));
        }

        Ok(Self {
            x,
            y,
            width,
            height,
            frame_width,
            frame_height,
        })
    }

    /// Centre of the region in pixels
    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Region height relative to the frame height
    pub fn height_fraction(&self) -> f64 {
        f64::from(self.height) / f64::from(self.frame_height)
    }
}

/// Staged object detector producing candidate face rectangles
pub trait CascadeClassifier: Send {
    /// Run the detector over a frame, ignoring objects smaller than `min_size` pixels
    fn detect_multi_scale(&mut self, frame: &GrayImage, min_size: u32) -> Result<Vec<FaceRect>>;

    /// Human readable name for logging
    fn name(&self) -> &str {
        "cascade"
    }
}

/// Supplies a ready-to-use classifier when a tracker is initialised
pub trait ClassifierLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn CascadeClassifier>>;
}

impl<F> ClassifierLoader for F
where
    F: Fn() -> Result<Box<dyn CascadeClassifier>> + Send + Sync,
{
    fn load(&self) -> Result<Box<dyn CascadeClassifier>> {
        self()
    }
}

/// Loader used when no classifier asset is available; always fails
pub struct MissingClassifier;

impl ClassifierLoader for MissingClassifier {
    fn load(&self) -> Result<Box<dyn CascadeClassifier>> {
        Err(Error::ModelError("No cascade classifier configured".to_string()))
    }
}

/// Detection settings shared between the UI and the camera worker
#[derive(Debug)]
pub struct DetectorSettings {
    min_face_size_bits: AtomicU32,
    annotate_preview: AtomicBool,
}

impl DetectorSettings {
    pub fn new(min_face_size: f32) -> Result<Self> {
        validate_min_face_size(min_face_size)?;
        Ok(Self {
            min_face_size_bits: AtomicU32::new(min_face_size.to_bits()),
            annotate_preview: AtomicBool::new(false),
        })
    }

    /// Minimum face height as a fraction of the frame height
    pub fn min_face_size(&self) -> f32 {
        f32::from_bits(self.min_face_size_bits.load(Ordering::Acquire))
    }

    /// Change the minimum face size; takes effect on the next detection
    pub fn set_min_face_size(&self, fraction: f32) -> Result<()> {
        validate_min_face_size(fraction)?;
        self.min_face_size_bits.store(fraction.to_bits(), Ordering::Release);
        info!("Minimum face size set to {fraction}");
        Ok(())
    }

    pub fn annotate_preview(&self) -> bool {
        self.annotate_preview.load(Ordering::Acquire)
    }

    pub fn set_annotate_preview(&self, enabled: bool) {
        self.annotate_preview.store(enabled, Ordering::Release);
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_face_size_bits: AtomicU32::new(DEFAULT_MIN_FACE_SIZE.to_bits()),
            annotate_preview: AtomicBool::new(false),
        }
    }
}

fn validate_min_face_size(fraction: f32) -> Result<()> {
    if fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Minimum face size must be in (0, 1], got {fraction}")))
    }
}

/// Finds the primary face in frames of a fixed resolution
pub struct FaceDetector {
    classifier: Option<Box<dyn CascadeClassifier>>,
    settings: Arc<DetectorSettings>,
    frame_width: u32,
    frame_height: u32,
}

impl FaceDetector {
    /// Create a detector for frames of `width` x `height`.
    ///
    /// A `None` classifier puts the detector in degraded mode where every
    /// detection reports no face.
    pub fn new(
        classifier: Option<Box<dyn CascadeClassifier>>,
        settings: Arc<DetectorSettings>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!("Invalid frame size {width}x{height}")));
        }

        match &classifier {
            Some(c) => info!("Face detector using '{}' for {}x{} frames", c.name(), width, height),
            None => warn!("Face detector running without a classifier; no faces will be reported"),
        }

        Ok(Self {
            classifier,
            settings,
            frame_width: width,
            frame_height: height,
        })
    }

    pub fn is_degraded(&self) -> bool {
        self.classifier.is_none()
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// Smallest face height in pixels that will be reported
    pub fn min_face_pixels(&self) -> u32 {
        let fraction = f64::from(self.settings.min_face_size());
        f64_to_u32_clamp((fraction * f64::from(self.frame_height)).round(), 1, self.frame_height)
    }

    /// Detect the primary face in a frame
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the frame resolution differs from the one the
    /// detector was created for, or the classifier's own error if it fails.
    pub fn detect(&mut self, frame: &GrayImage) -> Result<Option<FaceRegion>> {
        let (width, height) = frame.dimensions();
        if (width, height) != (self.frame_width, self.frame_height) {
            return Err(Error::InvalidInput(format!(
                "Frame is {width}x{height}, detector initialised for {}x{}",
                self.frame_width, self.frame_height
            )));
        }

        let min_pixels = self.min_face_pixels();
        let Some(classifier) = self.classifier.as_mut() else {
            return Ok(None);
        };

        let candidates = classifier.detect_multi_scale(frame, min_pixels)?;
        let primary = select_primary(&candidates, min_pixels, self.frame_width, self.frame_height);
        debug!("{} candidate(s), primary: {:?}", candidates.len(), primary);
        Ok(primary)
    }

    /// Drop the classifier; later detections report no face
    pub(crate) fn release_classifier(&mut self) {
        self.classifier = None;
    }
}

/// Pick the largest candidate (first found on ties) that passes the size threshold.
///
/// Candidates are clipped to the frame first; the threshold applies to the
/// clipped height.
pub fn select_primary(
    candidates: &[FaceRect],
    min_pixels: u32,
    frame_width: u32,
    frame_height: u32,
) -> Option<FaceRegion> {
    let mut best: Option<FaceRegion> = None;

    for candidate in candidates {
        let clipped = clip_rect(
            candidate.x,
            candidate.y,
            candidate.width,
            candidate.height,
            frame_width,
            frame_height,
        );
        let Some((x, y, w, h)) = clipped else {
            continue;
        };
        if h < min_pixels {
            continue;
        }

        let region = FaceRegion {
            x,
            y,
            width: w,
            height: h,
            frame_width,
            frame_height,
        };
        if best.map_or(true, |b| region.area() > b.area()) {
            best = Some(region);
        }
    }

    best
}
