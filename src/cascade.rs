//! OpenCV-backed cascade classifier (requires the `opencv` feature).

use crate::constants::{DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR};
use crate::face_detection::{CascadeClassifier, ClassifierLoader, FaceRect};
use crate::utils::{image_conversion::gray_to_mat, safe_cast::u32_to_i32};
use crate::{Error, Result};
use image::GrayImage;
use log::info;
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::{imgproc, objdetect, prelude::*};
use std::path::{Path, PathBuf};

/// Haar/LBP cascade classifier loaded from an XML file
pub struct OpenCvCascade {
    inner: objdetect::CascadeClassifier,
    scale_factor: f64,
    min_neighbors: i32,
    equalize: bool,
}

impl OpenCvCascade {
    /// Load a cascade from disk
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if OpenCV cannot parse the file or the resulting
    /// classifier is empty.
    pub fn load<P: AsRef<Path>>(path: P, scale_factor: f64, min_neighbors: i32) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::ModelError(format!("Non UTF-8 cascade path: {}", path.display())))?;

        let inner = objdetect::CascadeClassifier::new(path_str)
            .map_err(|e| Error::ModelError(format!("Failed to load cascade {}: {e}", path.display())))?;
        if inner.empty()? {
            return Err(Error::ModelError(format!("Cascade classifier is empty: {}", path.display())));
        }

        info!("Loaded cascade classifier from {}", path.display());
        Ok(Self {
            inner,
            scale_factor,
            min_neighbors,
            equalize: true,
        })
    }
}

impl CascadeClassifier for OpenCvCascade {
    fn detect_multi_scale(&mut self, frame: &GrayImage, min_size: u32) -> Result<Vec<FaceRect>> {
        let mat = gray_to_mat(frame)?;
        let input = if self.equalize {
            let mut equalized = Mat::default();
            imgproc::equalize_hist(&mat, &mut equalized)?;
            equalized
        } else {
            mat
        };

        let min = u32_to_i32(min_size)?;
        let mut faces = Vector::<Rect>::new();
        self.inner.detect_multi_scale(
            &input,
            &mut faces,
            self.scale_factor,
            self.min_neighbors,
            0,
            Size::new(min, min),
            Size::new(0, 0),
        )?;

        Ok(faces.iter().map(|r| FaceRect::new(r.x, r.y, r.width, r.height)).collect())
    }

    fn name(&self) -> &str {
        "opencv-cascade"
    }
}

/// Loads an [`OpenCvCascade`] from a file every time a tracker initialises
#[derive(Debug, Clone)]
pub struct CascadeFile {
    pub path: PathBuf,
    pub scale_factor: f64,
    pub min_neighbors: i32,
}

impl CascadeFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
        }
    }
}

impl ClassifierLoader for CascadeFile {
    fn load(&self) -> Result<Box<dyn CascadeClassifier>> {
        let cascade = OpenCvCascade::load(&self.path, self.scale_factor, self.min_neighbors)?;
        Ok(Box::new(cascade))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cascade_file_is_model_error() {
        let result = OpenCvCascade::load("does/not/exist.xml", 1.1, 2);
        assert!(matches!(result, Err(Error::ModelError(_))));
    }
}
