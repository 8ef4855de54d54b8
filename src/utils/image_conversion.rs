//! Conversions between `image::GrayImage` frames and OpenCV `Mat`s.

use crate::utils::safe_cast::{i32_to_u32, u32_to_i32};
use crate::{Error, Result};
use image::GrayImage;
use opencv::core::{Mat, CV_8UC1};
use opencv::imgproc;
use opencv::prelude::*;

/// Copy a luma frame into a single-channel 8-bit `Mat`
///
/// # Errors
/// * Returns error if the frame dimensions do not fit in i32
/// * Returns error if OpenCV fails to allocate the matrix
pub fn gray_to_mat(frame: &GrayImage) -> Result<Mat> {
    let (width, height) = frame.dimensions();
    let rows = u32_to_i32(height)?;
    let cols = u32_to_i32(width)?;

    let borrowed = Mat::new_rows_cols_with_data(rows, cols, frame.as_raw().as_slice())?;
    let mat = borrowed.try_clone()?;
    debug_assert_eq!(mat.typ(), CV_8UC1);
    Ok(mat)
}

/// Convert a BGR (or already gray) camera `Mat` into a luma frame
///
/// # Errors
/// * Returns error if the Mat is empty or has an unsupported channel count
/// * Returns error if OpenCV color conversion fails
pub fn mat_to_gray(mat: &Mat) -> Result<GrayImage> {
    if mat.empty() {
        return Err(Error::InvalidInput("Empty camera frame".to_string()));
    }

    let gray = match mat.channels() {
        1 => mat.try_clone()?,
        3 => {
            let mut gray = Mat::default();
            imgproc::cvt_color(mat, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
            gray
        }
        4 => {
            let mut gray = Mat::default();
            imgproc::cvt_color(mat, &mut gray, imgproc::COLOR_BGRA2GRAY, 0)?;
            gray
        }
        n => {
            return Err(Error::InvalidInput(format!("Unsupported channel count: {n}")));
        }
    };

    let width = i32_to_u32(gray.cols())?;
    let height = i32_to_u32(gray.rows())?;
    let continuous = if gray.is_continuous() { gray } else { gray.try_clone()? };
    let bytes = continuous.data_bytes()?.to_vec();

    GrayImage::from_raw(width, height, bytes)
        .ok_or_else(|| Error::InvalidInput(format!("Frame buffer does not match {width}x{height}")))
}
