//! Face tracker lifecycle: init, per-frame detection, release.

use crate::face_detection::{ClassifierLoader, DetectorSettings, FaceDetector, FaceRegion};
use crate::utils::draw_region_outline;
use crate::{Error, Result};
use image::GrayImage;
use log::{error, info};
use std::sync::Arc;

const OUTLINE_INTENSITY: u8 = 255;

/// Where a tracker is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerLifecycle {
    Uninitialized,
    Initialized { width: u32, height: u32 },
    Released,
}

/// Frame after detection, possibly annotated for preview
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub frame: GrayImage,
    pub face: Option<FaceRegion>,
}

pub struct FaceTracker {
    loader: Arc<dyn ClassifierLoader>,
    settings: Arc<DetectorSettings>,
    detector: Option<FaceDetector>,
    lifecycle: TrackerLifecycle,
}

impl FaceTracker {
    pub fn new(loader: Arc<dyn ClassifierLoader>, settings: Arc<DetectorSettings>) -> Self {
        Self {
            loader,
            settings,
            detector: None,
            lifecycle: TrackerLifecycle::Uninitialized,
        }
    }

    /// Prepare for frames of the given size.
    ///
    /// A classifier that fails to load is logged and the tracker runs
    /// degraded, reporting no faces. Calling `init` again with a new size
    /// reloads. Fails only after `release`.
    pub fn init(&mut self, width: u32, height: u32) -> Result<()> {
        if self.lifecycle == TrackerLifecycle::Released {
            return Err(Error::Lifecycle("Tracker already released".to_string()));
        }

        let classifier = match self.loader.load() {
            Ok(classifier) => Some(classifier),
            Err(e) => {
                error!("Failed to load face classifier: {}", e);
                None
            }
        };

        self.detector = Some(FaceDetector::new(classifier, Arc::clone(&self.settings), width, height)?);
        self.lifecycle = TrackerLifecycle::Initialized { width, height };
        info!("Face tracker initialised for {}x{} frames", width, height);
        Ok(())
    }

    pub fn lifecycle(&self) -> TrackerLifecycle {
        self.lifecycle
    }

    /// True when initialised without a working classifier
    pub fn is_degraded(&self) -> bool {
        self.detector.as_ref().map_or(true, FaceDetector::is_degraded)
    }

    /// Primary face in `frame`
    ///
    /// # Errors
    ///
    /// `Lifecycle` before `init` or after `release`; `InvalidInput` if the
    /// frame does not match the initialised resolution.
    pub fn detect_face(&mut self, frame: &GrayImage) -> Result<Option<FaceRegion>> {
        match self.lifecycle {
            TrackerLifecycle::Uninitialized => Err(Error::Lifecycle("Tracker not initialised".to_string())),
            TrackerLifecycle::Released => Err(Error::Lifecycle("Tracker already released".to_string())),
            TrackerLifecycle::Initialized { .. } => match self.detector.as_mut() {
                Some(detector) => detector.detect(frame),
                None => Ok(None),
            },
        }
    }

    /// Detect, then outline the face on the frame when preview annotation is on
    pub fn process_frame(&mut self, mut frame: GrayImage) -> Result<ProcessedFrame> {
        let face = self.detect_face(&frame)?;
        if let Some(region) = face.as_ref() {
            if self.settings.annotate_preview() {
                draw_region_outline(&mut frame, region, OUTLINE_INTENSITY);
            }
        }
        Ok(ProcessedFrame { frame, face })
    }

    /// Release the classifier. Only the first call succeeds.
    pub fn release(&mut self) -> Result<()> {
        if self.lifecycle == TrackerLifecycle::Released {
            return Err(Error::Lifecycle("Tracker already released".to_string()));
        }
        if let Some(detector) = self.detector.as_mut() {
            detector.release_classifier();
        }
        self.detector = None;
        self.lifecycle = TrackerLifecycle::Released;
        info!("Face tracker released");
        Ok(())
    }
}
