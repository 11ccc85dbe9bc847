//! Single-camera calibration record.

use crate::io::{finite, positive_integral, OpenCvMat, SingleCalibrationFile};
use crate::{
    CalibrationError, CorrectionParams, PupilGeometryCorrector, PupilMeasurement, PupilSize,
};
use log::{info, warn};
use nalgebra::Matrix3;
use pupil_calib_core::{
    optimal_new_camera_matrix, CameraIntrinsics, Distortion, GrayImage, GrayImageView, ImageSize,
    PixelRect, UndistortMap,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Free scaling parameter used for monocular undistortion: every source
/// pixel stays in view.
pub const MONOCULAR_ALPHA: f64 = 1.0;

/// Inner-corner count of the calibration pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSize {
    pub width: u32,
    pub height: u32,
}

/// Sizes shared by single and stereo calibration files.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PatternGeometry {
    pub image_size: ImageSize,
    pub board_size: BoardSize,
    pub square_size: u32,
}

impl PatternGeometry {
    pub(crate) fn from_raw(
        image_size: [f64; 2],
        board_width: f64,
        board_height: f64,
        square_size: f64,
    ) -> Result<Self, CalibrationError> {
        Ok(Self {
            image_size: ImageSize::new(
                positive_integral("imageSize", image_size[0])?,
                positive_integral("imageSize", image_size[1])?,
            ),
            board_size: BoardSize {
                width: positive_integral("boardSize_width", board_width)?,
                height: positive_integral("boardSize_height", board_height)?,
            },
            square_size: positive_integral("squareSize", square_size)?,
        })
    }
}

/// Build validated intrinsics from a camera matrix and distortion node.
pub(crate) fn camera_from_nodes(
    matrix_key: &str,
    matrix: &OpenCvMat,
    coeffs_key: &str,
    coeffs: &OpenCvMat,
) -> Result<CameraIntrinsics, CalibrationError> {
    let k = matrix.to_fixed::<3, 3>(matrix_key)?;
    let distortion = Distortion::from_coeffs(&coeffs.to_vec(coeffs_key)?)
        .map_err(|e| CalibrationError::format(coeffs_key, e.to_string()))?;
    CameraIntrinsics::new(k, distortion)
        .map_err(|e| CalibrationError::format(matrix_key, e.to_string()))
}

/// New camera matrix, valid region and remap tables of one camera.
#[derive(Clone, Debug)]
pub(crate) struct Undistortion {
    pub new_camera_matrix: Matrix3<f64>,
    pub valid_roi: PixelRect,
    pub map: Option<UndistortMap>,
}

impl Undistortion {
    /// Derive the undistortion of `camera`.
    ///
    /// Failure is not fatal: the camera keeps its own matrix and frames pass
    /// through unchanged.
    pub(crate) fn derive(
        camera: &CameraIntrinsics,
        image_size: ImageSize,
        alpha: f64,
        label: &str,
    ) -> Self {
        let optimal = match optimal_new_camera_matrix(camera, image_size, alpha, image_size) {
            Ok(optimal) => optimal,
            Err(e) => {
                warn!("{label}: no optimal camera matrix ({e}), undistortion disabled");
                return Self::passthrough(camera, image_size);
            }
        };
        match UndistortMap::new(camera, None, &optimal.camera_matrix, image_size) {
            Ok(map) => Self {
                new_camera_matrix: optimal.camera_matrix,
                valid_roi: optimal.valid_roi,
                map: Some(map),
            },
            Err(e) => {
                warn!("{label}: undistortion map construction failed ({e}), frames pass through");
                Self {
                    new_camera_matrix: optimal.camera_matrix,
                    valid_roi: optimal.valid_roi,
                    map: None,
                }
            }
        }
    }

    fn passthrough(camera: &CameraIntrinsics, image_size: ImageSize) -> Self {
        Self {
            new_camera_matrix: *camera.camera_matrix(),
            valid_roi: PixelRect {
                x: 0,
                y: 0,
                width: image_size.width,
                height: image_size.height,
            },
            map: None,
        }
    }

    pub(crate) fn apply(&self, frame: &GrayImageView<'_>) -> GrayImage {
        match &self.map {
            Some(map) => map.apply(frame),
            None => frame.to_owned_image(),
        }
    }
}

/// Intrinsic calibration of one camera plus its quality statistics.
///
/// Built once from a calibration file and immutable afterwards. The
/// undistortion tables are derived at construction and shared by reference
/// by every per-frame operation.
#[derive(Clone, Debug)]
pub struct CalibrationRecord {
    source: Option<PathBuf>,
    camera: CameraIntrinsics,
    geometry: PatternGeometry,
    individual_errors: Vec<f64>,
    intrinsic_rmse: f64,
    avg_mae: f64,
    undistortion: Undistortion,
}

impl CalibrationRecord {
    /// Load a single-camera calibration file.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))
    )]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let file = SingleCalibrationFile::load_json(path)?;
        let record = Self::build(&file, Some(path.to_path_buf()))?;
        record.log_summary();
        Ok(record)
    }

    /// Build a record from an already parsed file.
    pub fn from_file(file: &SingleCalibrationFile) -> Result<Self, CalibrationError> {
        Self::build(file, None)
    }

    fn build(
        file: &SingleCalibrationFile,
        source: Option<PathBuf>,
    ) -> Result<Self, CalibrationError> {
        let camera = camera_from_nodes(
            "cameraMatrix",
            &file.camera_matrix,
            "distCoeffs",
            &file.dist_coeffs,
        )?;
        let geometry = PatternGeometry::from_raw(
            file.image_size,
            file.board_size_width,
            file.board_size_height,
            file.square_size,
        )?;
        let individual_errors = file
            .reprojection_points_mae
            .iter()
            .map(|&e| finite("reprojectionPointsMAE", e))
            .collect::<Result<Vec<_>, _>>()?;
        let undistortion =
            Undistortion::derive(&camera, geometry.image_size, MONOCULAR_ALPHA, "camera");

        Ok(Self {
            source,
            camera,
            geometry,
            individual_errors,
            intrinsic_rmse: finite("intrinsicRMSE", file.intrinsic_rmse)?,
            avg_mae: finite("avgMAE", file.avg_mae)?,
            undistortion,
        })
    }

    /// File the record was loaded from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn camera(&self) -> &CameraIntrinsics {
        &self.camera
    }

    pub fn camera_matrix(&self) -> &Matrix3<f64> {
        self.camera.camera_matrix()
    }

    pub fn dist_coeffs(&self) -> Vec<f64> {
        self.camera.distortion().coeffs()
    }

    pub fn image_size(&self) -> ImageSize {
        self.geometry.image_size
    }

    pub fn board_size(&self) -> BoardSize {
        self.geometry.board_size
    }

    /// Square edge of the calibration pattern, in the calibration's unit.
    pub fn square_size(&self) -> u32 {
        self.geometry.square_size
    }

    /// Mean absolute reprojection error of each calibration image, pixels.
    pub fn individual_reprojection_errors(&self) -> &[f64] {
        &self.individual_errors
    }

    pub fn nof_calibration_images(&self) -> usize {
        self.individual_errors.len()
    }

    pub fn intrinsic_rmse(&self) -> f64 {
        self.intrinsic_rmse
    }

    pub fn avg_mae(&self) -> f64 {
        self.avg_mae
    }

    /// Camera matrix of undistorted frames and points.
    pub fn new_camera_matrix(&self) -> &Matrix3<f64> {
        &self.undistortion.new_camera_matrix
    }

    /// `None` when map construction failed at load time.
    pub fn undistort_map(&self) -> Option<&UndistortMap> {
        self.undistortion.map.as_ref()
    }

    /// Remove lens distortion from a frame.
    ///
    /// Without maps the frame is returned unchanged.
    pub fn undistort_image(&self, frame: &GrayImageView<'_>) -> GrayImage {
        self.undistortion.apply(frame)
    }

    /// Undistorted pupil diameter with the default correction parameters.
    pub fn undistort_pupil_size(&self, pupil: &PupilMeasurement) -> PupilSize {
        PupilGeometryCorrector::new(Some(self), CorrectionParams::default())
            .undistorted_diameter(pupil)
    }

    /// Emit the calibration summary at `info` level.
    pub fn log_summary(&self) {
        for line in self.to_string().lines() {
            info!("{line}");
        }
    }
}

pub(crate) fn source_label(source: Option<&Path>) -> String {
    source.map_or_else(|| "<memory>".to_owned(), |p| p.display().to_string())
}

impl fmt::Display for CalibrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.geometry;
        writeln!(f, "single calibration")?;
        writeln!(f, "file: {}", source_label(self.source_path()))?;
        writeln!(f, "board size: {}x{}", g.board_size.width, g.board_size.height)?;
        writeln!(f, "square size: {}", g.square_size)?;
        writeln!(f, "image size: {}x{}", g.image_size.width, g.image_size.height)?;
        writeln!(f, "calibration images: {}", self.nof_calibration_images())?;
        writeln!(f, "intrinsic RMSE: {:.4}", self.intrinsic_rmse)?;
        writeln!(f, "avg. MAE [px]: {:.4}", self.avg_mae)?;
        write!(f, "indiv. MAE [px]: {:.4?}", self.individual_errors)
    }
}
