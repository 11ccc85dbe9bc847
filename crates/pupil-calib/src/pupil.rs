//! Pupil ellipse as reported by a pupil detector.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Confidence value of a pupil that was not detected.
pub const NO_CONFIDENCE: f32 = -1.0;

/// Center reported for a pupil that was not detected. It only marks the
/// row in recorded data; [`PupilMeasurement::is_valid`] does not look at it.
pub const NO_CENTER: Point2<f32> = Point2::new(-1.0, -1.0);

/// Oriented ellipse fitted to the pupil outline, in image pixels.
///
/// `width` and `height` are the full axis lengths along the ellipse's own x
/// and y directions, `angle` rotates them clockwise in degrees (image y axis
/// points down).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PupilMeasurement {
    pub center: Point2<f32>,
    pub width: f32,
    pub height: f32,
    pub angle: f32,
    pub confidence: f32,
    #[serde(default = "no_confidence")]
    pub outline_confidence: f32,
}

fn no_confidence() -> f32 {
    NO_CONFIDENCE
}

impl Default for PupilMeasurement {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PupilMeasurement {
    pub fn new(center: Point2<f32>, width: f32, height: f32, angle: f32, confidence: f32) -> Self {
        Self {
            center,
            width,
            height,
            angle,
            confidence,
            outline_confidence: NO_CONFIDENCE,
        }
    }

    /// Empty measurement: [`NO_CENTER`], zero size, sentinel confidence.
    pub fn invalid() -> Self {
        Self::new(NO_CENTER, 0.0, 0.0, 0.0, NO_CONFIDENCE)
    }

    /// Copy with a different orientation; `self` is left untouched.
    #[inline]
    pub fn with_angle(&self, angle: f32) -> Self {
        Self { angle, ..*self }
    }

    /// A measurement is usable when both axes are positive and its confidence
    /// exceeds `min_confidence`. The center takes no part: a pupil partly
    /// outside the frame may legitimately have negative coordinates.
    pub fn is_valid(&self, min_confidence: f32) -> bool {
        self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
            && self.confidence > min_confidence
    }

    #[inline]
    pub fn major_axis(&self) -> f32 {
        self.width.max(self.height)
    }

    #[inline]
    pub fn minor_axis(&self) -> f32 {
        self.width.min(self.height)
    }

    /// Pupil diameter in pixels as reported by the detector (the major axis).
    #[inline]
    pub fn diameter(&self) -> f32 {
        self.major_axis()
    }

    /// Ellipse perimeter (Ramanujan's first approximation).
    pub fn circumference(&self) -> f32 {
        let a = 0.5 * self.width as f64;
        let b = 0.5 * self.height as f64;
        let h = (3.0 * a + b) * (a + 3.0 * b);
        (std::f64::consts::PI * (3.0 * (a + b) - h.sqrt())) as f32
    }

    /// Corners of the oriented bounding rectangle, ordered bottom-left,
    /// top-left, top-right, bottom-right.
    pub fn rect_points(&self) -> [Point2<f64>; 4] {
        let theta = (self.angle as f64).to_radians();
        let b = theta.cos() * 0.5;
        let a = theta.sin() * 0.5;
        let (cx, cy) = (self.center.x as f64, self.center.y as f64);
        let (w, h) = (self.width as f64, self.height as f64);

        let p0 = Point2::new(cx - a * h - b * w, cy + b * h - a * w);
        let p1 = Point2::new(cx + a * h - b * w, cy - b * h - a * w);
        let p2 = Point2::new(2.0 * cx - p0.x, 2.0 * cy - p0.y);
        let p3 = Point2::new(2.0 * cx - p1.x, 2.0 * cy - p1.y);
        [p0, p1, p2, p3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_invalid_with_sentinel_confidence() {
        let p = PupilMeasurement::default();
        assert_eq!(p.confidence, NO_CONFIDENCE);
        assert!(!p.is_valid(-2.0));
    }

    #[test]
    fn validity_ignores_center() {
        let p = PupilMeasurement::invalid();
        assert_eq!(p.center, NO_CENTER);
        let edge = PupilMeasurement::new(NO_CENTER, 20.0, 18.0, 0.0, 0.9);
        assert!(edge.is_valid(0.5));
    }

    #[test]
    fn validity_uses_strict_confidence_threshold() {
        let p = PupilMeasurement::new(Point2::new(50.0, 50.0), 20.0, 18.0, 0.0, 0.5);
        assert!(p.is_valid(0.4));
        assert!(!p.is_valid(0.5));
        let flat = PupilMeasurement { width: 0.0, ..p };
        assert!(!flat.is_valid(0.0));
    }

    #[test]
    fn axis_aligned_rect_points_follow_corner_order() {
        let p = PupilMeasurement::new(Point2::new(100.0, 50.0), 40.0, 30.0, 0.0, 0.9);
        let [bl, tl, tr, br] = p.rect_points();
        assert_eq!(bl, Point2::new(80.0, 65.0));
        assert_eq!(tl, Point2::new(80.0, 35.0));
        assert_eq!(tr, Point2::new(120.0, 35.0));
        assert_eq!(br, Point2::new(120.0, 65.0));
    }

    #[test]
    fn rotated_rect_keeps_side_lengths() {
        let p = PupilMeasurement::new(Point2::new(0.0, 0.0), 40.0, 30.0, 33.0, 0.9);
        let [bl, tl, tr, br] = p.rect_points();
        assert!(((tr - tl).norm() - 40.0).abs() < 1e-9);
        assert!(((tl - bl).norm() - 30.0).abs() < 1e-9);
        assert!(((br - tr).norm() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn circle_circumference() {
        let p = PupilMeasurement::new(Point2::new(10.0, 10.0), 20.0, 20.0, 0.0, 1.0);
        assert!((p.circumference() - 20.0 * std::f32::consts::PI).abs() < 1e-3);
        assert_eq!(p.diameter(), 20.0);
        assert_eq!(p.minor_axis(), 20.0);
    }
}
