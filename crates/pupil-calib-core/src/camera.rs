//! Pinhole camera intrinsics.

use crate::Distortion;
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Errors raised while building camera models and derived tables.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraModelError {
    #[error("camera matrix must have positive focal lengths (fx={fx}, fy={fy})")]
    NonPositiveFocal { fx: f64, fy: f64 },
    #[error("camera matrix must be upper triangular with a positive last row [0 0 w]")]
    NotIntrinsicForm,
    #[error("camera matrix is singular")]
    Singular,
    #[error("unsupported number of distortion coefficients: {0} (expected 4, 5, 8 or 12)")]
    DistortionCount(usize),
    #[error("image size must be positive (width={width}, height={height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Camera matrix `K` plus lens distortion of one camera.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraIntrinsics {
    camera_matrix: Matrix3<f64>,
    k_inv: Matrix3<f64>,
    distortion: Distortion,
}

impl CameraIntrinsics {
    /// Validate `K` and pair it with a distortion model.
    ///
    /// `K` must be of the form `[fx s cx; 0 fy cy; 0 0 w]` with positive `fx`,
    /// `fy` and `w`.
    pub fn new(camera_matrix: Matrix3<f64>, distortion: Distortion) -> Result<Self, CameraModelError> {
        validate_camera_matrix(&camera_matrix)?;
        let k_inv = camera_matrix
            .try_inverse()
            .ok_or(CameraModelError::Singular)?;
        Ok(Self {
            camera_matrix,
            k_inv,
            distortion,
        })
    }

    /// Ideal pinhole camera without distortion.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraModelError> {
        let k = Matrix3::new(
            fx, 0.0, cx, //
            0.0, fy, cy, //
            0.0, 0.0, 1.0,
        );
        Self::new(k, Distortion::none())
    }

    #[inline]
    pub fn camera_matrix(&self) -> &Matrix3<f64> {
        &self.camera_matrix
    }

    #[inline]
    pub fn distortion(&self) -> &Distortion {
        &self.distortion
    }

    /// Pixel -> normalized (still distorted) image plane coordinates.
    #[inline]
    pub fn pixel_to_normalized(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.k_inv * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v.x / v.z, v.y / v.z)
    }

    /// Normalized image plane coordinates -> pixel, without distortion.
    #[inline]
    pub fn normalized_to_pixel(&self, n: Point2<f64>) -> Point2<f64> {
        let v = self.camera_matrix * Vector3::new(n.x, n.y, 1.0);
        Point2::new(v.x / v.z, v.y / v.z)
    }
}

pub(crate) fn validate_camera_matrix(k: &Matrix3<f64>) -> Result<(), CameraModelError> {
    let (fx, fy) = (k[(0, 0)], k[(1, 1)]);
    if !(fx.is_finite() && fy.is_finite()) || fx <= 0.0 || fy <= 0.0 {
        return Err(CameraModelError::NonPositiveFocal { fx, fy });
    }
    if k[(1, 0)] != 0.0 || k[(2, 0)] != 0.0 || k[(2, 1)] != 0.0 || k[(2, 2)] <= 0.0 {
        return Err(CameraModelError::NotIntrinsicForm);
    }
    if k.iter().any(|v| !v.is_finite()) {
        return Err(CameraModelError::NotIntrinsicForm);
    }
    Ok(())
}
