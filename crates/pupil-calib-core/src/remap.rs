//! Per-pixel undistort/rectify lookup tables.

use crate::{
    sample_bilinear_u8, CameraIntrinsics, CameraModelError, GrayImage, GrayImageView, ImageSize,
};
use nalgebra::{Matrix3, Point2, Vector3};

/// Source position for every destination pixel, stored as `f32`.
///
/// `map_x[y * width + x]`, `map_y[y * width + x]` is where destination pixel
/// `(x, y)` is sampled from in the distorted source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct UndistortMap {
    size: ImageSize,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl UndistortMap {
    /// Build the tables for `camera`, an optional rectification rotation and
    /// the camera matrix of the output image.
    pub fn new(
        camera: &CameraIntrinsics,
        rectification: Option<&Matrix3<f64>>,
        new_camera_matrix: &Matrix3<f64>,
        size: ImageSize,
    ) -> Result<Self, CameraModelError> {
        if size.is_empty() {
            return Err(CameraModelError::EmptyImage {
                width: size.width,
                height: size.height,
            });
        }
        crate::camera::validate_camera_matrix(new_camera_matrix)?;

        let r = rectification.copied().unwrap_or_else(Matrix3::identity);
        // destination pixel -> rotated ray -> source camera ray
        let inv = (new_camera_matrix * r)
            .try_inverse()
            .ok_or(CameraModelError::Singular)?;

        let (w, h) = (size.width as usize, size.height as usize);
        let mut map_x = vec![0.0f32; w * h];
        let mut map_y = vec![0.0f32; w * h];
        let distortion = camera.distortion();

        for y in 0..h {
            for x in 0..w {
                let ray = inv * Vector3::new(x as f64, y as f64, 1.0);
                let idx = y * w + x;
                if ray.z.abs() <= 1e-12 {
                    map_x[idx] = -1.0;
                    map_y[idx] = -1.0;
                    continue;
                }
                let n = Point2::new(ray.x / ray.z, ray.y / ray.z);
                let src = camera.normalized_to_pixel(distortion.distort(n));
                map_x[idx] = src.x as f32;
                map_y[idx] = src.y as f32;
            }
        }

        Ok(Self { size, map_x, map_y })
    }

    #[inline]
    pub fn size(&self) -> ImageSize {
        self.size
    }

    #[inline]
    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    #[inline]
    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }

    /// Source position of destination pixel `(x, y)`.
    #[inline]
    pub fn source_of(&self, x: usize, y: usize) -> Option<Point2<f32>> {
        let w = self.size.width as usize;
        if x >= w || y >= self.size.height as usize {
            return None;
        }
        let idx = y * w + x;
        Some(Point2::new(self.map_x[idx], self.map_y[idx]))
    }

    /// Remap a frame with bilinear interpolation and a constant black border.
    ///
    /// The output has the map's size. A frame of a different size is still
    /// sampled through the tables; pixels that fall outside it are black.
    pub fn apply(&self, src: &GrayImageView<'_>) -> GrayImage {
        let (w, h) = (self.size.width as usize, self.size.height as usize);
        let mut out = vec![0u8; w * h];
        for (idx, px) in out.iter_mut().enumerate() {
            *px = sample_bilinear_u8(src, self.map_x[idx], self.map_y[idx]);
        }
        GrayImage {
            width: w,
            height: h,
            data: out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Distortion;

    fn gradient(w: usize, h: usize) -> GrayImage {
        let data = (0..h)
            .flat_map(|y| (0..w).map(move |x| ((x * 3 + y * 2) % 256) as u8))
            .collect();
        GrayImage::from_raw(w, h, data).expect("sized")
    }

    #[test]
    fn zero_distortion_same_camera_is_identity() {
        let cam = CameraIntrinsics::pinhole(400.0, 400.0, 31.5, 23.5).expect("K");
        let size = ImageSize::new(64, 48);
        let map = UndistortMap::new(&cam, None, cam.camera_matrix(), size).expect("map");

        let src = gradient(64, 48);
        let out = map.apply(&src.view());
        assert_eq!(out, src);
    }

    #[test]
    fn maps_follow_the_distortion_model() {
        let k = Matrix3::new(
            300.0, 0.0, 40.0, //
            0.0, 300.0, 30.0, //
            0.0, 0.0, 1.0,
        );
        let d = Distortion::from_coeffs(&[-0.25, 0.0, 0.0, 0.0]).expect("coeffs");
        let cam = CameraIntrinsics::new(k, d).expect("K");
        let map = UndistortMap::new(&cam, None, &k, ImageSize::new(80, 60)).expect("map");

        // The principal point is a fixed point of radial distortion.
        let c = map.source_of(40, 30).expect("inside");
        assert!((c.x - 40.0).abs() < 1e-4 && (c.y - 30.0).abs() < 1e-4);

        // Barrel: an undistorted corner pixel is sampled closer to the centre.
        let corner = map.source_of(0, 0).expect("inside");
        assert!(corner.x > 0.0 && corner.y > 0.0);
        assert!(map.source_of(80, 0).is_none());
    }

    #[test]
    fn rejects_empty_size() {
        let cam = CameraIntrinsics::pinhole(10.0, 10.0, 1.0, 1.0).expect("K");
        let err = UndistortMap::new(&cam, None, cam.camera_matrix(), ImageSize::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, CameraModelError::EmptyImage { .. }));
    }
}
