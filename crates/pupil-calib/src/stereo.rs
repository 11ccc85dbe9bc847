//! Stereo pupil size: per-camera undistortion and metric triangulation.

use crate::corners::{corner_points, major_axis_corners, RectCorner};
use crate::stereo_record::StereoCameraView;
use crate::{CorrectionParams, PupilMeasurement, StereoCalibrationRecord};
use log::debug;
use nalgebra::Point2;
use pupil_calib_core::{
    dehomogenize, triangulate_points, undistort_points, PointTarget, UndistortConfig,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Per-camera pupil diameters in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StereoPupilSizes {
    Undistorted { primary: f64, secondary: f64 },
    /// Detector diameters, returned when there is no calibration or a
    /// measurement is not valid.
    Raw { primary: f64, secondary: f64 },
}

impl StereoPupilSizes {
    /// `(primary, secondary)` regardless of the variant.
    pub fn values(self) -> (f64, f64) {
        match self {
            StereoPupilSizes::Undistorted { primary, secondary }
            | StereoPupilSizes::Raw { primary, secondary } => (primary, secondary),
        }
    }
}

/// Pupil diameter in the physical unit of the calibration pattern.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricPupilSize {
    Metric(f64),
    NotComputable,
}

impl MetricPupilSize {
    /// Value written to pupil data files: the diameter, or `-1.0`.
    pub fn to_sentinel(self) -> f64 {
        match self {
            MetricPupilSize::Metric(v) => v,
            MetricPupilSize::NotComputable => -1.0,
        }
    }

    pub fn metric(self) -> Option<f64> {
        match self {
            MetricPupilSize::Metric(v) => Some(v),
            MetricPupilSize::NotComputable => None,
        }
    }
}

/// Measures pupils seen by both cameras of a calibrated pair.
#[derive(Clone, Copy, Debug)]
pub struct StereoTriangulator<'a> {
    calibration: Option<&'a StereoCalibrationRecord>,
    params: CorrectionParams,
}

impl<'a> StereoTriangulator<'a> {
    pub fn new(calibration: Option<&'a StereoCalibrationRecord>, params: CorrectionParams) -> Self {
        Self {
            calibration,
            params,
        }
    }

    pub fn calibration(&self) -> Option<&'a StereoCalibrationRecord> {
        self.calibration
    }

    pub fn params(&self) -> &CorrectionParams {
        &self.params
    }

    /// Calibration, if both measurements pass the validity check.
    fn usable(
        &self,
        primary: &PupilMeasurement,
        secondary: &PupilMeasurement,
    ) -> Option<&'a StereoCalibrationRecord> {
        let calibration = self.calibration?;
        let min = self.params.min_confidence;
        if primary.is_valid(min) && secondary.is_valid(min) {
            Some(calibration)
        } else {
            debug!(
                "stereo pupil not valid (confidence {} / {})",
                primary.confidence, secondary.confidence
            );
            None
        }
    }

    /// Undistort each camera's major-axis corners into its own new camera
    /// matrix, without rectification.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn undistort_pupil_sizes(
        &self,
        primary: &PupilMeasurement,
        secondary: &PupilMeasurement,
    ) -> StereoPupilSizes {
        let Some(calibration) = self.usable(primary, secondary) else {
            return StereoPupilSizes::Raw {
                primary: primary.diameter() as f64,
                secondary: secondary.diameter() as f64,
            };
        };
        let pair = major_axis_corners(primary.width, primary.height);
        let length = |view: &StereoCameraView, pupil: &PupilMeasurement| {
            let target = PointTarget::camera(*view.new_camera_matrix());
            let pts = undistort_points(
                &corner_points(pupil, pair),
                view.camera(),
                &target,
                &UndistortConfig::default(),
            );
            (pts[1] - pts[0]).norm()
        };
        StereoPupilSizes::Undistorted {
            primary: length(calibration.primary(), primary),
            secondary: length(calibration.secondary(), secondary),
        }
    }

    /// Metric pupil diameter from both views.
    ///
    /// The corner pair is chosen from the primary camera's aspect ratio and
    /// used for both cameras, so the two triangulated points are the same
    /// physical extremities of the pupil.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn triangulate_pupil_size(
        &self,
        primary: &PupilMeasurement,
        secondary: &PupilMeasurement,
    ) -> MetricPupilSize {
        let Some(calibration) = self.usable(primary, secondary) else {
            return MetricPupilSize::NotComputable;
        };
        let pair = major_axis_corners(primary.width, primary.height);
        let (first, second) = (calibration.primary(), calibration.secondary());
        let pts1 = rectified_corners(first, primary, pair);
        let pts2 = rectified_corners(second, secondary, pair);

        let homogeneous =
            match triangulate_points(first.projection(), second.projection(), &pts1, &pts2) {
                Ok(h) => h,
                Err(e) => {
                    debug!("triangulation failed: {e}");
                    return MetricPupilSize::NotComputable;
                }
            };
        let a = dehomogenize(&homogeneous[0]);
        let b = dehomogenize(&homogeneous[1]);
        let diameter = (b - a).norm();
        if diameter.is_finite() {
            MetricPupilSize::Metric(diameter)
        } else {
            MetricPupilSize::NotComputable
        }
    }
}

fn rectified_corners(
    view: &StereoCameraView,
    pupil: &PupilMeasurement,
    pair: [RectCorner; 2],
) -> Vec<Point2<f64>> {
    let target = PointTarget::rectified(*view.rectification(), view.projection());
    undistort_points(
        &corner_points(pupil, pair),
        view.camera(),
        &target,
        &UndistortConfig::default(),
    )
}
