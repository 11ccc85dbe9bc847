//! Undistortion of `image::GrayImage` frames.

use crate::{core, CalibrationRecord, StereoCalibrationRecord};

/// Errors produced when wrapping raw pixel buffers.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("invalid grayscale buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },
}

/// Borrow an `image::GrayImage` as a `pupil-calib-core` view.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Build an `image::GrayImage` from a raw row-major buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, FrameError> {
    let Some(expected) = (width as usize).checked_mul(height as usize) else {
        return Err(FrameError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(FrameError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(FrameError::InvalidGrayDimensions { width, height })
}

fn into_image(img: core::GrayImage, fallback: &::image::GrayImage) -> ::image::GrayImage {
    ::image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data)
        .unwrap_or_else(|| fallback.clone())
}

/// Undistort one frame; the frame comes back unchanged without maps.
pub fn undistort_frame(
    calibration: &CalibrationRecord,
    frame: &::image::GrayImage,
) -> ::image::GrayImage {
    into_image(calibration.undistort_image(&gray_view(frame)), frame)
}

/// Undistort a synchronized frame pair with each camera's own maps.
pub fn undistort_frames(
    calibration: &StereoCalibrationRecord,
    primary: &::image::GrayImage,
    secondary: &::image::GrayImage,
) -> (::image::GrayImage, ::image::GrayImage) {
    let (a, b) = calibration.undistort_images(&gray_view(primary), &gray_view(secondary));
    (into_image(a, primary), into_image(b, secondary))
}
