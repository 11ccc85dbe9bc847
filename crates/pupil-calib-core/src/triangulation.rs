//! Linear two-view triangulation.

use nalgebra::{Matrix3x4, Matrix4, Point2, Point3, Vector4};

/// Errors returned by [`triangulate_points`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TriangulationError {
    #[error("mismatched point counts (first={first}, second={second})")]
    CountMismatch { first: usize, second: usize },
    #[error("svd failed during triangulation")]
    SvdFailed,
}

/// Homogeneous 3-D points seen at `pts1` through `p1` and at `pts2` through `p2`.
///
/// Each point solves the 4x4 DLT system
/// `[x1 P1_3 - P1_1; y1 P1_3 - P1_2; x2 P2_3 - P2_1; y2 P2_3 - P2_2] X = 0`
/// and is returned as the unit right singular vector of the smallest
/// singular value, without dividing by its scale.
pub fn triangulate_points(
    p1: &Matrix3x4<f64>,
    p2: &Matrix3x4<f64>,
    pts1: &[Point2<f64>],
    pts2: &[Point2<f64>],
) -> Result<Vec<Vector4<f64>>, TriangulationError> {
    if pts1.len() != pts2.len() {
        return Err(TriangulationError::CountMismatch {
            first: pts1.len(),
            second: pts2.len(),
        });
    }

    let mut out = Vec::with_capacity(pts1.len());
    for (a, b) in pts1.iter().zip(pts2.iter()) {
        let mut m = Matrix4::<f64>::zeros();
        for c in 0..4 {
            m[(0, c)] = a.x * p1[(2, c)] - p1[(0, c)];
            m[(1, c)] = a.y * p1[(2, c)] - p1[(1, c)];
            m[(2, c)] = b.x * p2[(2, c)] - p2[(0, c)];
            m[(3, c)] = b.y * p2[(2, c)] - p2[(1, c)];
        }
        let svd = m.svd(false, true);
        let v_t = svd.v_t.ok_or(TriangulationError::SvdFailed)?;
        let (min_idx, _) = svd.singular_values.argmin();
        let xh = v_t.row(min_idx);
        out.push(Vector4::new(xh[0], xh[1], xh[2], xh[3]));
    }
    Ok(out)
}

/// Divide a homogeneous point by its scale; a zero scale is treated as 1.
#[inline]
pub fn dehomogenize(h: &Vector4<f64>) -> Point3<f64> {
    let scale = if h[3] != 0.0 { h[3] } else { 1.0 };
    Point3::new(h[0] / scale, h[1] / scale, h[2] / scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(cam: &Matrix3x4<f64>, p: &Point3<f64>) -> Point2<f64> {
        let x = cam * Vector4::new(p.x, p.y, p.z, 1.0);
        Point2::new(x.x / x.z, x.y / x.z)
    }

    fn rig() -> (Matrix3x4<f64>, Matrix3x4<f64>) {
        let p1 = Matrix3x4::new(
            800.0, 0.0, 320.0, 0.0, //
            0.0, 800.0, 240.0, 0.0, //
            0.0, 0.0, 1.0, 0.0,
        );
        let p2 = Matrix3x4::new(
            800.0, 0.0, 320.0, -800.0 * 60.0, //
            0.0, 800.0, 240.0, 0.0, //
            0.0, 0.0, 1.0, 0.0,
        );
        (p1, p2)
    }

    #[test]
    fn two_views_recover_points() {
        let (p1, p2) = rig();
        let world = [Point3::new(10.0, -5.0, 400.0), Point3::new(-30.0, 12.0, 650.0)];
        let a: Vec<_> = world.iter().map(|w| project(&p1, w)).collect();
        let b: Vec<_> = world.iter().map(|w| project(&p2, w)).collect();

        let hs = triangulate_points(&p1, &p2, &a, &b).expect("triangulate");
        assert_eq!(hs.len(), 2);
        for (h, w) in hs.iter().zip(world.iter()) {
            let est = dehomogenize(h);
            assert!((est - w).norm() < 1e-6, "{est:?} vs {w:?}");
        }
    }

    #[test]
    fn zero_scale_falls_back_to_unit_scale() {
        let p = dehomogenize(&Vector4::new(1.5, -2.0, 3.0, 0.0));
        assert_eq!(p, Point3::new(1.5, -2.0, 3.0));
    }

    #[test]
    fn nonzero_scale_divides_through() {
        let p = dehomogenize(&Vector4::new(2.0, 4.0, 6.0, 2.0));
        assert_eq!(p, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn mismatched_counts_fail() {
        let (p1, p2) = rig();
        let err = triangulate_points(&p1, &p2, &[Point2::new(0.0, 0.0)], &[]).unwrap_err();
        assert_eq!(err, TriangulationError::CountMismatch { first: 1, second: 0 });
    }
}
