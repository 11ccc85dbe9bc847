//! Stereo calibration record: two cameras, their extrinsics and rectification.

use crate::io::{finite, OpenCvMat, StereoCalibrationFile};
use crate::record::{camera_from_nodes, source_label, BoardSize, PatternGeometry, Undistortion};
use crate::{
    CalibrationError, CorrectionParams, MetricPupilSize, PupilMeasurement, StereoPupilSizes,
    StereoTriangulator,
};
use log::info;
use nalgebra::{Matrix3, Matrix3x4, Vector3};
use pupil_calib_core::{
    CameraIntrinsics, GrayImage, GrayImageView, ImageSize, PixelRect, UndistortMap,
};
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Free scaling parameter used for each stereo camera's undistortion.
pub const STEREO_ALPHA: f64 = 1.0;

/// Which camera of a stereo pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraRole {
    Primary,
    Secondary,
}

impl CameraRole {
    fn label(self) -> &'static str {
        match self {
            CameraRole::Primary => "primary camera",
            CameraRole::Secondary => "secondary camera",
        }
    }
}

/// One camera of a stereo calibration.
#[derive(Clone, Debug)]
pub struct StereoCameraView {
    camera: CameraIntrinsics,
    rectification: Matrix3<f64>,
    projection: Matrix3x4<f64>,
    intrinsic_rmse: f64,
    avg_mae: f64,
    undistortion: Undistortion,
}

/// Raw nodes of one camera inside a stereo file.
struct CameraNodes<'a> {
    role: CameraRole,
    keys: [&'static str; 6],
    matrix: &'a OpenCvMat,
    coeffs: &'a OpenCvMat,
    rectification: &'a OpenCvMat,
    projection: &'a OpenCvMat,
    intrinsic_rmse: f64,
    avg_mae: f64,
}

impl StereoCameraView {
    fn build(nodes: CameraNodes<'_>, image_size: ImageSize) -> Result<Self, CalibrationError> {
        let [k_key, d_key, r_key, p_key, rmse_key, mae_key] = nodes.keys;
        let camera = camera_from_nodes(k_key, nodes.matrix, d_key, nodes.coeffs)?;
        let rectification = nodes.rectification.to_fixed::<3, 3>(r_key)?;
        let projection = nodes.projection.to_fixed::<3, 4>(p_key)?;
        let undistortion =
            Undistortion::derive(&camera, image_size, STEREO_ALPHA, nodes.role.label());
        Ok(Self {
            camera,
            rectification,
            projection,
            intrinsic_rmse: finite(rmse_key, nodes.intrinsic_rmse)?,
            avg_mae: finite(mae_key, nodes.avg_mae)?,
            undistortion,
        })
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

    /// Rotation into the common rectified frame.
    pub fn rectification(&self) -> &Matrix3<f64> {
        &self.rectification
    }

    /// Projection in the rectified frame.
    pub fn projection(&self) -> &Matrix3x4<f64> {
        &self.projection
    }

    pub fn intrinsic_rmse(&self) -> f64 {
        self.intrinsic_rmse
    }

    pub fn avg_mae(&self) -> f64 {
        self.avg_mae
    }

    pub fn new_camera_matrix(&self) -> &Matrix3<f64> {
        &self.undistortion.new_camera_matrix
    }

    /// Region of undistorted frames in which every pixel has a source.
    pub fn valid_roi(&self) -> PixelRect {
        self.undistortion.valid_roi
    }

    pub fn undistort_map(&self) -> Option<&UndistortMap> {
        self.undistortion.map.as_ref()
    }

    /// Remove lens distortion from a frame of this camera; identity without maps.
    pub fn undistort_image(&self, frame: &GrayImageView<'_>) -> GrayImage {
        self.undistortion.apply(frame)
    }
}

/// Calibration of a synchronized camera pair.
///
/// World-unit errors are stored as absolute deviations from the nominal
/// square size of the calibration pattern.
#[derive(Clone, Debug)]
pub struct StereoCalibrationRecord {
    source: Option<PathBuf>,
    geometry: PatternGeometry,
    primary: StereoCameraView,
    secondary: StereoCameraView,
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
    essential: Matrix3<f64>,
    fundamental: Matrix3<f64>,
    stereo_rmse: f64,
    avg_world_mae: f64,
    individual_world_maes: Vec<f64>,
}

impl StereoCalibrationRecord {
    /// Load a stereo calibration file.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))
    )]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let file = StereoCalibrationFile::load_json(path)?;
        let record = Self::build(&file, Some(path.to_path_buf()))?;
        record.log_summary();
        Ok(record)
    }

    pub fn from_file(file: &StereoCalibrationFile) -> Result<Self, CalibrationError> {
        Self::build(file, None)
    }

    fn build(
        file: &StereoCalibrationFile,
        source: Option<PathBuf>,
    ) -> Result<Self, CalibrationError> {
        let geometry = PatternGeometry::from_raw(
            file.image_size,
            file.board_size_width,
            file.board_size_height,
            file.square_size,
        )?;
        let primary = StereoCameraView::build(
            CameraNodes {
                role: CameraRole::Primary,
                keys: [
                    "cameraMatrix",
                    "distCoeffs",
                    "rectificationTransform",
                    "projectionMatrix",
                    "intrinsicRMSE",
                    "avgMAE",
                ],
                matrix: &file.camera_matrix,
                coeffs: &file.dist_coeffs,
                rectification: &file.rectification_transform,
                projection: &file.projection_matrix,
                intrinsic_rmse: file.intrinsic_rmse,
                avg_mae: file.avg_mae,
            },
            geometry.image_size,
        )?;
        let secondary = StereoCameraView::build(
            CameraNodes {
                role: CameraRole::Secondary,
                keys: [
                    "cameraMatrixSecondary",
                    "distCoeffsSecondary",
                    "rectificationTransformSecondary",
                    "projectionMatrixSecondary",
                    "intrinsicRMSESec",
                    "avgMAESec",
                ],
                matrix: &file.camera_matrix_secondary,
                coeffs: &file.dist_coeffs_secondary,
                rectification: &file.rectification_transform_secondary,
                projection: &file.projection_matrix_secondary,
                intrinsic_rmse: file.intrinsic_rmse_sec,
                avg_mae: file.avg_mae_sec,
            },
            geometry.image_size,
        )?;

        let square = geometry.square_size as f64;
        let avg_world_mae = (finite("avgWorldMAE", file.avg_world_mae)? - square).abs();
        let individual_world_maes = file
            .reprojection_world_points_mae
            .iter()
            .map(|&raw| finite("reprojectionWorldPointsMAE", raw).map(|v| (v - square).abs()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source,
            geometry,
            primary,
            secondary,
            rotation: file.rotation_matrix.to_fixed::<3, 3>("rotationMatrix")?,
            translation: file.translation_matrix.to_fixed::<3, 1>("translationMatrix")?,
            essential: file.essential_matrix.to_fixed::<3, 3>("essentialMatrix")?,
            fundamental: file.fundamental_matrix.to_fixed::<3, 3>("fundamentalMatrix")?,
            stereo_rmse: finite("stereoRMSE", file.stereo_rmse)?,
            avg_world_mae,
            individual_world_maes,
        })
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn primary(&self) -> &StereoCameraView {
        &self.primary
    }

    pub fn secondary(&self) -> &StereoCameraView {
        &self.secondary
    }

    pub fn camera(&self, role: CameraRole) -> &StereoCameraView {
        match role {
            CameraRole::Primary => &self.primary,
            CameraRole::Secondary => &self.secondary,
        }
    }

    pub fn image_size(&self) -> ImageSize {
        self.geometry.image_size
    }

    pub fn board_size(&self) -> BoardSize {
        self.geometry.board_size
    }

    pub fn square_size(&self) -> u32 {
        self.geometry.square_size
    }

    /// Rotation from the primary to the secondary camera frame.
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// Translation from the primary to the secondary camera frame.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    pub fn essential(&self) -> &Matrix3<f64> {
        &self.essential
    }

    pub fn fundamental(&self) -> &Matrix3<f64> {
        &self.fundamental
    }

    /// `(primary, secondary)`.
    pub fn intrinsic_rmse(&self) -> (f64, f64) {
        (self.primary.intrinsic_rmse, self.secondary.intrinsic_rmse)
    }

    /// `(primary, secondary)`, pixels.
    pub fn avg_mae(&self) -> (f64, f64) {
        (self.primary.avg_mae, self.secondary.avg_mae)
    }

    pub fn stereo_rmse(&self) -> f64 {
        self.stereo_rmse
    }

    /// Mean absolute world error, in the unit of the square size.
    pub fn avg_world_mae(&self) -> f64 {
        self.avg_world_mae
    }

    pub fn individual_world_maes(&self) -> &[f64] {
        &self.individual_world_maes
    }

    pub fn nof_calibration_images(&self) -> usize {
        self.individual_world_maes.len()
    }

    /// Undistort a synchronized frame pair, each with its own camera's maps.
    pub fn undistort_images(
        &self,
        primary: &GrayImageView<'_>,
        secondary: &GrayImageView<'_>,
    ) -> (GrayImage, GrayImage) {
        (
            self.primary.undistort_image(primary),
            self.secondary.undistort_image(secondary),
        )
    }

    /// Per-camera undistorted diameters with the default correction parameters.
    pub fn undistort_pupil_sizes(
        &self,
        primary: &PupilMeasurement,
        secondary: &PupilMeasurement,
    ) -> StereoPupilSizes {
        StereoTriangulator::new(Some(self), CorrectionParams::default())
            .undistort_pupil_sizes(primary, secondary)
    }

    /// Metric pupil diameter with the default correction parameters.
    pub fn triangulate_pupil_size(
        &self,
        primary: &PupilMeasurement,
        secondary: &PupilMeasurement,
    ) -> MetricPupilSize {
        StereoTriangulator::new(Some(self), CorrectionParams::default())
            .triangulate_pupil_size(primary, secondary)
    }

    pub fn log_summary(&self) {
        for line in self.to_string().lines() {
            info!("{line}");
        }
    }
}

impl fmt::Display for StereoCalibrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.geometry;
        let (rmse, rmse_sec) = self.intrinsic_rmse();
        let (mae, mae_sec) = self.avg_mae();
        writeln!(f, "stereo calibration")?;
        writeln!(f, "file: {}", source_label(self.source_path()))?;
        writeln!(f, "board size: {}x{}", g.board_size.width, g.board_size.height)?;
        writeln!(f, "square size: {}", g.square_size)?;
        writeln!(f, "image size: {}x{}", g.image_size.width, g.image_size.height)?;
        writeln!(f, "calibration images: {}", self.nof_calibration_images())?;
        writeln!(f, "intrinsic RMSE (primary, secondary): ({rmse:.4}, {rmse_sec:.4})")?;
        writeln!(f, "avg. MAE [px] (primary, secondary): ({mae:.4}, {mae_sec:.4})")?;
        writeln!(f, "stereo RMSE: {:.4}", self.stereo_rmse)?;
        writeln!(f, "stereo MAE [mm]: {:.4}", self.avg_world_mae)?;
        write!(f, "indiv. stereo MAE [mm]: {:.4?}", self.individual_world_maes)
    }
}
