use crate::{CameraIntrinsics, UndistortConfig};
use nalgebra::{Matrix3, Matrix3x4, Point2, Vector3};

/// Target frame for undistorted points.
///
/// Points are first undistorted into normalized coordinates, then rotated by
/// `rectification` and projected by `projection`:
/// `p' ~ (P[:, :3] * R) * [x, y, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointTarget {
    pub rectification: Matrix3<f64>,
    pub projection: Matrix3<f64>,
}

impl PointTarget {
    /// Normalized image coordinates (`R = I`, `P = I`).
    pub fn normalized() -> Self {
        Self {
            rectification: Matrix3::identity(),
            projection: Matrix3::identity(),
        }
    }

    /// Pixel coordinates of a new camera matrix, no rectification.
    pub fn camera(new_camera_matrix: Matrix3<f64>) -> Self {
        Self {
            rectification: Matrix3::identity(),
            projection: new_camera_matrix,
        }
    }

    /// Rectified pixel coordinates of a stereo projection matrix.
    ///
    /// Only the left 3x3 block of `projection` takes part; the last column
    /// (the baseline term) is used by triangulation instead.
    pub fn rectified(rectification: Matrix3<f64>, projection: &Matrix3x4<f64>) -> Self {
        Self {
            rectification,
            projection: projection.fixed_view::<3, 3>(0, 0).into_owned(),
        }
    }

    #[inline]
    fn combined(&self) -> Matrix3<f64> {
        self.projection * self.rectification
    }
}

/// Undistort pixel positions of one camera into `target`.
pub fn undistort_points(
    points: &[Point2<f64>],
    camera: &CameraIntrinsics,
    target: &PointTarget,
    cfg: &UndistortConfig,
) -> Vec<Point2<f64>> {
    let rr = target.combined();
    points
        .iter()
        .map(|&p| {
            let n = camera
                .distortion()
                .undistort(camera.pixel_to_normalized(p), cfg);
            let v = rr * Vector3::new(n.x, n.y, 1.0);
            let w = if v.z != 0.0 { v.z } else { 1.0 };
            Point2::new(v.x / w, v.y / w)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Distortion;

    fn distorted_camera() -> CameraIntrinsics {
        let k = Matrix3::new(
            900.0, 0.0, 330.0, //
            0.0, 905.0, 238.0, //
            0.0, 0.0, 1.0,
        );
        let d = Distortion::from_coeffs(&[-0.21, 0.05, 0.0008, -0.0004, 0.0]).expect("coeffs");
        CameraIntrinsics::new(k, d).expect("valid K")
    }

    #[test]
    fn zero_distortion_same_camera_is_identity() {
        let cam = CameraIntrinsics::pinhole(1000.0, 1000.0, 320.0, 240.0).expect("K");
        let target = PointTarget::camera(*cam.camera_matrix());
        let pts = [Point2::new(10.0, 20.0), Point2::new(600.0, 470.0)];
        let out = undistort_points(&pts, &cam, &target, &UndistortConfig::default());
        for (a, b) in out.iter().zip(pts.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn recovers_ideal_projection_of_distorted_point() {
        let cam = distorted_camera();
        let ideal_norm = Point2::new(0.18, -0.12);
        let distorted_px = cam.normalized_to_pixel(cam.distortion().distort(ideal_norm));

        let out = undistort_points(
            &[distorted_px],
            &cam,
            &PointTarget::camera(*cam.camera_matrix()),
            &UndistortConfig::default(),
        );
        let expected = cam.normalized_to_pixel(ideal_norm);
        assert!((out[0] - expected).norm() < 1e-6, "{:?} vs {:?}", out[0], expected);
    }

    #[test]
    fn normalized_target_returns_normalized_coordinates() {
        let cam = CameraIntrinsics::pinhole(500.0, 500.0, 100.0, 100.0).expect("K");
        let out = undistort_points(
            &[Point2::new(150.0, 50.0)],
            &cam,
            &PointTarget::normalized(),
            &UndistortConfig::default(),
        );
        assert!((out[0] - Point2::new(0.1, -0.1)).norm() < 1e-12);
    }

    #[test]
    fn rectification_rotates_before_projection() {
        let cam = CameraIntrinsics::pinhole(500.0, 500.0, 100.0, 100.0).expect("K");
        // 90 degrees about the optical axis: (x, y) -> (-y, x).
        let r = Matrix3::new(
            0.0, -1.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0,
        );
        let p = Matrix3x4::new(
            500.0, 0.0, 100.0, -25_000.0, //
            0.0, 500.0, 100.0, 0.0, //
            0.0, 0.0, 1.0, 0.0,
        );
        let out = undistort_points(
            &[Point2::new(150.0, 100.0)],
            &cam,
            &PointTarget::rectified(r, &p),
            &UndistortConfig::default(),
        );
        assert!((out[0] - Point2::new(100.0, 150.0)).norm() < 1e-9);
    }
}
