//! Webcam frame source backed by `opencv::videoio`.

use crate::utils::image_conversion::mat_to_gray;
use crate::{Error, Result};
use image::GrayImage;
use log::info;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};

/// Front camera delivering grayscale frames
pub struct OpenCvCamera {
    capture: VideoCapture,
}

impl OpenCvCamera {
    /// Open camera `index` and request the given resolution
    pub fn open(index: i32, width: u32, height: u32) -> Result<Self> {
        info!("Opening camera {}", index);
        let mut capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::IoError(format!("Cannot open camera {index}")));
        }

        // Keep latency low: only the newest frame matters
        capture.set(CAP_PROP_BUFFERSIZE, 1.0)?;
        capture.set(CAP_PROP_FRAME_WIDTH, f64::from(width))?;
        capture.set(CAP_PROP_FRAME_HEIGHT, f64::from(height))?;

        Ok(Self { capture })
    }

    /// Next frame, or `None` when the stream has ended
    pub fn read_gray(&mut self) -> Result<Option<GrayImage>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        mat_to_gray(&frame).map(Some)
    }

    /// Resolution the driver actually delivers
    pub fn resolution(&self) -> Result<(u32, u32)> {
        let width = self.capture.get(CAP_PROP_FRAME_WIDTH)?;
        let height = self.capture.get(CAP_PROP_FRAME_HEIGHT)?;
        if width <= 0.0 || height <= 0.0 {
            return Err(Error::InvalidInput(format!("Camera reports size {width}x{height}")));
        }
        Ok((width as u32, height as u32))
    }
}
