//! Geometric building blocks for calibrated pupil measurement.
//!
//! This crate knows nothing about pupils or calibration files. It provides
//! the pinhole camera model with OpenCV-compatible distortion, point
//! undistortion into a chosen target frame, the optimal new camera matrix,
//! per-pixel undistort/rectify maps and linear two-view triangulation.

mod camera;
mod distortion;
mod image;
mod logger;
mod new_camera;
mod remap;
mod triangulation;
mod undistort;

pub use camera::{CameraIntrinsics, CameraModelError, ImageSize};
pub use distortion::{Distortion, UndistortConfig};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use new_camera::{optimal_new_camera_matrix, OptimalCamera, PixelRect};
pub use remap::UndistortMap;
pub use triangulation::{dehomogenize, triangulate_points, TriangulationError};
pub use undistort::{undistort_points, PointTarget};

#[cfg(feature = "tracing")]
pub use logger::{init_tracing, TraceFormat};

pub use logger::{init_from_env, init_with_level, parse_level, DEFAULT_LEVEL, LOG_ENV};
