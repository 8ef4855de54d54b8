//! Utility functions for pixel rectangles and preview annotation.

pub mod safe_cast;
#[cfg(feature = "opencv")]
pub mod image_conversion;

use crate::face_detection::FaceRegion;
use image::{GrayImage, Luma};

/// Clip a classifier rectangle to the frame.
///
/// Returns `(x, y, width, height)` of the visible part, or `None` if nothing
/// of the rectangle lies inside the frame.
#[must_use]
pub fn clip_rect(
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    frame_width: u32,
    frame_height: u32,
) -> Option<(u32, u32, u32, u32)> {
    if width <= 0 || height <= 0 {
        return None;
    }

    let fw = i64::from(frame_width);
    let fh = i64::from(frame_height);
    let x0 = i64::from(x).clamp(0, fw);
    let y0 = i64::from(y).clamp(0, fh);
    let x1 = (i64::from(x) + i64::from(width)).clamp(0, fw);
    let y1 = (i64::from(y) + i64::from(height)).clamp(0, fh);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    // All values are within [0, frame dimension] so they fit in u32
    Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

/// Draw a one pixel rectangle outline around a face region
pub fn draw_region_outline(frame: &mut GrayImage, region: &FaceRegion, intensity: u8) {
    let (fw, fh) = frame.dimensions();
    if region.width == 0 || region.height == 0 || region.x >= fw || region.y >= fh {
        return;
    }

    let x_end = (region.x + region.width - 1).min(fw - 1);
    let y_end = (region.y + region.height - 1).min(fh - 1);
    let pixel = Luma([intensity]);

    for x in region.x..=x_end {
        frame.put_pixel(x, region.y, pixel);
        frame.put_pixel(x, y_end, pixel);
    }
    for y in region.y..=y_end {
        frame.put_pixel(region.x, y, pixel);
        frame.put_pixel(x_end, y, pixel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_rect_inside() {
        assert_eq!(clip_rect(10, 20, 30, 40, 640, 480), Some((10, 20, 30, 40)));
    }

    #[test]
    fn test_clip_rect_partially_outside() {
        assert_eq!(clip_rect(-10, 450, 50, 50, 640, 480), Some((0, 450, 40, 30)));
        assert_eq!(clip_rect(620, 0, 50, 50, 640, 480), Some((620, 0, 20, 50)));
    }

    #[test]
    fn test_clip_rect_outside_or_empty() {
        assert_eq!(clip_rect(700, 10, 20, 20, 640, 480), None);
        assert_eq!(clip_rect(10, 10, 0, 20, 640, 480), None);
        assert_eq!(clip_rect(-30, -30, 20, 20, 640, 480), None);
    }

    #[test]
    fn test_draw_region_outline() {
        let mut frame = GrayImage::new(20, 20);
        let region = FaceRegion::new(5, 5, 4, 4, 20, 20).unwrap();
        draw_region_outline(&mut frame, &region, 255);

        assert_eq!(frame.get_pixel(5, 5)[0], 255);
        assert_eq!(frame.get_pixel(8, 8)[0], 255);
        assert_eq!(frame.get_pixel(5, 8)[0], 255);
        // Interior untouched
        assert_eq!(frame.get_pixel(6, 6)[0], 0);
    }
}
