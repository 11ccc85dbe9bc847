//! Monocular pupil diameter correction.

use crate::corners::major_axis_points;
use crate::{CalibrationRecord, PupilMeasurement};
use log::debug;
use pupil_calib_core::{undistort_points, PointTarget, UndistortConfig};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Per-frame correction settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionParams {
    /// A measurement is corrected only when its confidence is strictly
    /// greater than this.
    pub min_confidence: f32,
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self {
            min_confidence: -2.0,
        }
    }
}

/// Monocular pupil diameter in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PupilSize {
    /// Distance between the undistorted major-axis corners.
    Undistorted(f64),
    /// Diameter as reported by the detector; no calibration was available or
    /// the measurement was not valid.
    Raw(f64),
}

impl PupilSize {
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            PupilSize::Undistorted(v) | PupilSize::Raw(v) => v,
        }
    }

    #[inline]
    pub fn is_undistorted(self) -> bool {
        matches!(self, PupilSize::Undistorted(_))
    }
}

/// Turns pupil ellipses of one camera into undistorted diameters.
///
/// Holds the calibration by shared reference, so one record can serve any
/// number of correctors and threads.
#[derive(Clone, Copy, Debug)]
pub struct PupilGeometryCorrector<'a> {
    calibration: Option<&'a CalibrationRecord>,
    params: CorrectionParams,
}

impl<'a> PupilGeometryCorrector<'a> {
    pub fn new(calibration: Option<&'a CalibrationRecord>, params: CorrectionParams) -> Self {
        Self {
            calibration,
            params,
        }
    }

    pub fn calibration(&self) -> Option<&'a CalibrationRecord> {
        self.calibration
    }

    pub fn params(&self) -> &CorrectionParams {
        &self.params
    }

    /// Undistorted major-axis length of `pupil`.
    ///
    /// Falls back to the detector's diameter when there is no calibration or
    /// the measurement is not valid.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn undistorted_diameter(&self, pupil: &PupilMeasurement) -> PupilSize {
        let raw = pupil.diameter() as f64;
        let Some(calibration) = self.calibration else {
            return PupilSize::Raw(raw);
        };
        if !pupil.is_valid(self.params.min_confidence) {
            debug!(
                "pupil not valid (confidence {}), keeping raw diameter",
                pupil.confidence
            );
            return PupilSize::Raw(raw);
        }

        let target = PointTarget::camera(*calibration.new_camera_matrix());
        let undistorted = undistort_points(
            &major_axis_points(pupil),
            calibration.camera(),
            &target,
            &UndistortConfig::default(),
        );
        PupilSize::Undistorted((undistorted[1] - undistorted[0]).norm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn without_calibration_reports_raw_diameter() {
        let corrector = PupilGeometryCorrector::new(None, CorrectionParams::default());
        let pupil = PupilMeasurement::new(Point2::new(100.0, 100.0), 40.0, 30.0, 0.0, 0.9);
        assert_eq!(corrector.undistorted_diameter(&pupil), PupilSize::Raw(40.0));
    }

    #[test]
    fn default_threshold_accepts_sentinel_confidence() {
        let params = CorrectionParams::default();
        let p = PupilMeasurement::new(Point2::new(1.0, 1.0), 4.0, 3.0, 0.0, -1.0);
        assert!(p.is_valid(params.min_confidence));
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: CorrectionParams = serde_json::from_str("{}").expect("params");
        assert_eq!(params, CorrectionParams::default());
        let strict: CorrectionParams =
            serde_json::from_str(r#"{"min_confidence": 0.5}"#).expect("params");
        assert_eq!(strict.min_confidence, 0.5);
    }

    #[test]
    fn size_value_is_shared_by_both_variants() {
        assert_eq!(PupilSize::Raw(3.5).value(), 3.5);
        assert!(PupilSize::Undistorted(2.0).is_undistorted());
        assert!(!PupilSize::Raw(2.0).is_undistorted());
    }
}
