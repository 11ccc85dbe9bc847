//! OpenCV-compatible lens distortion.
//!
//! Coefficient layout is `(k1, k2, p1, p2[, k3[, k4, k5, k6[, s1, s2, s3, s4]]])`:
//! radial terms in the numerator (`k1..k3`) and denominator (`k4..k6`) of the
//! rational model, tangential terms `p1, p2` and thin-prism terms `s1..s4`.

use crate::CameraModelError;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

impl TryFrom<Vec<f64>> for Distortion {
    type Error = CameraModelError;

    fn try_from(coeffs: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_coeffs(&coeffs)
    }
}

impl From<Distortion> for Vec<f64> {
    fn from(d: Distortion) -> Self {
        d.coeffs()
    }
}

/// Fixed-point inversion settings used by [`Distortion::undistort`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UndistortConfig {
    /// Maximum fixed-point iterations.
    pub max_iters: usize,
    /// Stop when the coordinate update norm drops below this threshold.
    pub eps: f64,
}

impl Default for UndistortConfig {
    fn default() -> Self {
        Self {
            max_iters: 20,
            eps: 1e-12,
        }
    }
}

/// Serialized as the plain OpenCV coefficient list, so deserialization goes
/// through [`Distortion::from_coeffs`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub s4: f64,
    /// Number of coefficients the model was created from (4, 5, 8 or 12).
    count: usize,
}

impl Default for Distortion {
    fn default() -> Self {
        Self::none()
    }
}

impl Distortion {
    /// Zero distortion, stored as the 5-coefficient model.
    pub fn none() -> Self {
        Self::from_array([0.0; 12], 5)
    }

    fn from_array(c: [f64; 12], count: usize) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
            k4: c[5],
            k5: c[6],
            k6: c[7],
            s1: c[8],
            s2: c[9],
            s3: c[10],
            s4: c[11],
            count,
        }
    }

    /// Build from an OpenCV-ordered coefficient vector.
    pub fn from_coeffs(coeffs: &[f64]) -> Result<Self, CameraModelError> {
        let count = coeffs.len();
        if !matches!(count, 4 | 5 | 8 | 12) {
            return Err(CameraModelError::DistortionCount(count));
        }
        let mut c = [0.0; 12];
        c[..count].copy_from_slice(coeffs);
        Ok(Self::from_array(c, count))
    }

    /// Coefficients in OpenCV order, with their stored length.
    pub fn coeffs(&self) -> Vec<f64> {
        let all = [
            self.k1, self.k2, self.p1, self.p2, self.k3, self.k4, self.k5, self.k6, self.s1,
            self.s2, self.s3, self.s4,
        ];
        all[..self.count].to_vec()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_identity(&self) -> bool {
        self.coeffs().iter().all(|c| *c == 0.0)
    }

    #[inline]
    fn radial_factor(&self, r2: f64) -> f64 {
        let num = 1.0 + ((self.k3 * r2 + self.k2) * r2 + self.k1) * r2;
        let den = 1.0 + ((self.k6 * r2 + self.k5) * r2 + self.k4) * r2;
        num / den
    }

    #[inline]
    fn tangential_prism(&self, x: f64, y: f64, r2: f64) -> (f64, f64) {
        let r4 = r2 * r2;
        let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x) + self.s1 * r2 + self.s2 * r4;
        let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y + self.s3 * r2 + self.s4 * r4;
        (dx, dy)
    }

    /// Apply distortion to normalized coordinates.
    pub fn distort(&self, n: Point2<f64>) -> Point2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = self.radial_factor(r2);
        let (dx, dy) = self.tangential_prism(x, y, r2);
        Point2::new(x * radial + dx, y * radial + dy)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    ///
    /// If the rational factor turns negative (far outside the calibrated
    /// field) the distorted input is returned unchanged.
    pub fn undistort(&self, n_dist: Point2<f64>, cfg: &UndistortConfig) -> Point2<f64> {
        let (x0, y0) = (n_dist.x, n_dist.y);
        let (mut x, mut y) = (x0, y0);
        for _ in 0..cfg.max_iters {
            let r2 = x * x + y * y;
            let radial = self.radial_factor(r2);
            if !radial.is_finite() || radial <= 0.0 {
                return n_dist;
            }
            let (dx, dy) = self.tangential_prism(x, y, r2);
            let xn = (x0 - dx) / radial;
            let yn = (y0 - dy) / radial;
            let step = ((xn - x).powi(2) + (yn - y).powi(2)).sqrt();
            x = xn;
            y = yn;
            if step < cfg.eps {
                break;
            }
        }
        Point2::new(x, y)
    }
}
