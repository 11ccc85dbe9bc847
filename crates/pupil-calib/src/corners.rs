//! Choosing the two bounding-rectangle corners that span the pupil's long side.
//!
//! The pupil ellipse is linearized into a single segment between two corners
//! of its bounding rectangle. Both the monocular and the stereo paths pick
//! corners through [`major_axis_corners`], so the two stay in lockstep.

use crate::PupilMeasurement;
use nalgebra::Point2;

/// Corner of a pupil's bounding rectangle, indexed in
/// [`PupilMeasurement::rect_points`] order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RectCorner {
    BottomLeft = 0,
    TopLeft = 1,
    TopRight = 2,
    BottomRight = 3,
}

impl RectCorner {
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Orientation the bounding rectangle is read in before corners are taken.
///
/// Corner selection works on the axis-aligned rectangle: the measured
/// ellipse angle does not take part.
pub const CORNER_SELECTION_ANGLE: f32 = 0.0;

/// Corner pair spanning the longer side of a `width` x `height` rectangle.
///
/// A wide rectangle uses its top edge (top-left, top-right), anything else
/// its left edge (top-left, bottom-left).
#[inline]
pub fn major_axis_corners(width: f32, height: f32) -> [RectCorner; 2] {
    if width > height {
        [RectCorner::TopLeft, RectCorner::TopRight]
    } else {
        [RectCorner::TopLeft, RectCorner::BottomLeft]
    }
}

/// Pixel positions of `pair` on the axis-aligned bounding rectangle of `pupil`.
pub fn corner_points(pupil: &PupilMeasurement, pair: [RectCorner; 2]) -> [Point2<f64>; 2] {
    let rect = pupil.with_angle(CORNER_SELECTION_ANGLE).rect_points();
    [rect[pair[0].index()], rect[pair[1].index()]]
}

/// Major-axis corner points of a single pupil.
#[inline]
pub fn major_axis_points(pupil: &PupilMeasurement) -> [Point2<f64>; 2] {
    corner_points(pupil, major_axis_corners(pupil.width, pupil.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_rectangle_uses_top_edge() {
        assert_eq!(
            major_axis_corners(40.0, 30.0),
            [RectCorner::TopLeft, RectCorner::TopRight]
        );
    }

    #[test]
    fn swapping_axes_selects_complementary_pair() {
        let wide = major_axis_corners(40.0, 30.0);
        let tall = major_axis_corners(30.0, 40.0);
        assert_eq!(wide[0], tall[0]);
        assert_eq!(wide[1], RectCorner::TopRight);
        assert_eq!(tall[1], RectCorner::BottomLeft);
    }

    #[test]
    fn square_uses_left_edge() {
        assert_eq!(
            major_axis_corners(25.0, 25.0),
            [RectCorner::TopLeft, RectCorner::BottomLeft]
        );
    }

    #[test]
    fn corner_points_ignore_ellipse_angle() {
        let p = PupilMeasurement::new(Point2::new(200.0, 100.0), 40.0, 30.0, 0.0, 0.9);
        let rotated = p.with_angle(57.0);
        assert_eq!(major_axis_points(&p), major_axis_points(&rotated));
        let [a, b] = major_axis_points(&rotated);
        assert_eq!(a, Point2::new(180.0, 85.0));
        assert_eq!(b, Point2::new(220.0, 85.0));
        // the input measurement is not modified
        assert_eq!(rotated.angle, 57.0);
    }

    #[test]
    fn tall_pupil_spans_height() {
        let p = PupilMeasurement::new(Point2::new(50.0, 50.0), 10.0, 22.0, 0.0, 0.9);
        let [a, b] = major_axis_points(&p);
        assert!(((b - a).norm() - 22.0).abs() < 1e-12);
    }
}
