//! Optimal new camera matrix for undistorted output.
//!
//! A 9x9 grid spanning the source image is undistorted; the rectangle
//! inscribed in the undistorted grid contains only valid pixels, the
//! bounding rectangle contains every source pixel. `alpha` blends between the
//! camera that maps the inner rectangle onto the output (`alpha = 0`) and the
//! one that maps the outer rectangle onto it (`alpha = 1`).

use crate::{
    undistort_points, CameraIntrinsics, CameraModelError, ImageSize, PointTarget, UndistortConfig,
};
use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

const GRID_N: usize = 9;

/// Axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Result of [`optimal_new_camera_matrix`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OptimalCamera {
    pub camera_matrix: Matrix3<f64>,
    /// Region of the output image in which every pixel has a valid source.
    pub valid_roi: PixelRect,
}

#[derive(Clone, Copy, Debug)]
struct Rect64 {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

fn grid_points(size: ImageSize) -> Vec<Point2<f64>> {
    let step_x = (size.width as f64 - 1.0) / (GRID_N - 1) as f64;
    let step_y = (size.height as f64 - 1.0) / (GRID_N - 1) as f64;
    let mut pts = Vec::with_capacity(GRID_N * GRID_N);
    for y in 0..GRID_N {
        for x in 0..GRID_N {
            pts.push(Point2::new(x as f64 * step_x, y as f64 * step_y));
        }
    }
    pts
}

/// Inner (inscribed) and outer (bounding) rectangles of the undistorted grid.
fn undistorted_rectangles(
    camera: &CameraIntrinsics,
    target: &PointTarget,
    size: ImageSize,
) -> (Rect64, Rect64) {
    let pts = undistort_points(
        &grid_points(size),
        camera,
        target,
        &UndistortConfig::default(),
    );

    let (mut ix0, mut ix1, mut iy0, mut iy1) = (f64::MIN, f64::MAX, f64::MIN, f64::MAX);
    let (mut ox0, mut ox1, mut oy0, mut oy1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for (k, p) in pts.iter().enumerate() {
        let (gx, gy) = (k % GRID_N, k / GRID_N);
        ox0 = ox0.min(p.x);
        ox1 = ox1.max(p.x);
        oy0 = oy0.min(p.y);
        oy1 = oy1.max(p.y);
        if gx == 0 {
            ix0 = ix0.max(p.x);
        }
        if gx == GRID_N - 1 {
            ix1 = ix1.min(p.x);
        }
        if gy == 0 {
            iy0 = iy0.max(p.y);
        }
        if gy == GRID_N - 1 {
            iy1 = iy1.min(p.y);
        }
    }

    let inner = Rect64 {
        x: ix0,
        y: iy0,
        width: ix1 - ix0,
        height: iy1 - iy0,
    };
    let outer = Rect64 {
        x: ox0,
        y: oy0,
        width: ox1 - ox0,
        height: oy1 - oy0,
    };
    (inner, outer)
}

fn clip_to_image(r: Rect64, size: ImageSize) -> PixelRect {
    let x0 = r.x.round().max(0.0);
    let y0 = r.y.round().max(0.0);
    let x1 = (r.x.round() + r.width.round()).min(size.width as f64);
    let y1 = (r.y.round() + r.height.round()).min(size.height as f64);
    if x1 <= x0 || y1 <= y0 {
        return PixelRect::default();
    }
    PixelRect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    }
}

/// Compute the new camera matrix for undistorted images of `new_size`.
///
/// `alpha` is clamped to `[0, 1]`.
pub fn optimal_new_camera_matrix(
    camera: &CameraIntrinsics,
    image_size: ImageSize,
    alpha: f64,
    new_size: ImageSize,
) -> Result<OptimalCamera, CameraModelError> {
    for s in [image_size, new_size] {
        if s.is_empty() {
            return Err(CameraModelError::EmptyImage {
                width: s.width,
                height: s.height,
            });
        }
    }
    let alpha = alpha.clamp(0.0, 1.0);

    let (inner, outer) = undistorted_rectangles(camera, &PointTarget::normalized(), image_size);
    if inner.width <= 0.0 || inner.height <= 0.0 || outer.width <= 0.0 || outer.height <= 0.0 {
        return Err(CameraModelError::Singular);
    }

    let out_w = new_size.width as f64 - 1.0;
    let out_h = new_size.height as f64 - 1.0;

    let fx0 = out_w / inner.width;
    let fy0 = out_h / inner.height;
    let cx0 = -fx0 * inner.x;
    let cy0 = -fy0 * inner.y;

    let fx1 = out_w / outer.width;
    let fy1 = out_h / outer.height;
    let cx1 = -fx1 * outer.x;
    let cy1 = -fy1 * outer.y;

    let m = Matrix3::new(
        fx0 * (1.0 - alpha) + fx1 * alpha,
        0.0,
        cx0 * (1.0 - alpha) + cx1 * alpha,
        0.0,
        fy0 * (1.0 - alpha) + fy1 * alpha,
        cy0 * (1.0 - alpha) + cy1 * alpha,
        0.0,
        0.0,
        1.0,
    );
    crate::camera::validate_camera_matrix(&m)?;

    let (inner_px, _) = undistorted_rectangles(camera, &PointTarget::camera(m), image_size);
    Ok(OptimalCamera {
        camera_matrix: m,
        valid_roi: clip_to_image(inner_px, new_size),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Distortion;
    use approx::assert_relative_eq;

    #[test]
    fn zero_distortion_keeps_camera_matrix() {
        let cam = CameraIntrinsics::pinhole(1000.0, 1000.0, 320.0, 240.0).expect("K");
        let size = ImageSize::new(640, 480);
        let opt = optimal_new_camera_matrix(&cam, size, 1.0, size).expect("optimal");
        for (a, b) in opt.camera_matrix.iter().zip(cam.camera_matrix().iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9, max_relative = 1e-12);
        }
        assert_eq!(
            opt.valid_roi,
            PixelRect {
                x: 0,
                y: 0,
                width: 639,
                height: 479
            }
        );
    }

    #[test]
    fn barrel_distortion_alpha_one_shrinks_focal_length() {
        let k = Matrix3::new(
            600.0, 0.0, 320.0, //
            0.0, 600.0, 240.0, //
            0.0, 0.0, 1.0,
        );
        let cam = CameraIntrinsics::new(
            k,
            Distortion::from_coeffs(&[-0.3, 0.1, 0.0, 0.0, 0.0]).expect("coeffs"),
        )
        .expect("K");
        let size = ImageSize::new(640, 480);

        let all = optimal_new_camera_matrix(&cam, size, 1.0, size).expect("alpha 1");
        let valid = optimal_new_camera_matrix(&cam, size, 0.0, size).expect("alpha 0");

        // Barrel distortion pushes the undistorted corners outward: keeping
        // every source pixel needs a wider field of view than cropping.
        assert!(all.camera_matrix[(0, 0)] < valid.camera_matrix[(0, 0)]);
        assert!(all.camera_matrix[(0, 0)] < 600.0);
        assert!(!all.valid_roi.is_empty());
        assert!(all.valid_roi.width < size.width);
    }

    #[test]
    fn empty_image_is_rejected() {
        let cam = CameraIntrinsics::pinhole(100.0, 100.0, 1.0, 1.0).expect("K");
        let err = optimal_new_camera_matrix(&cam, ImageSize::new(0, 10), 1.0, ImageSize::new(4, 4))
            .unwrap_err();
        assert!(matches!(err, CameraModelError::EmptyImage { .. }));
    }
}
