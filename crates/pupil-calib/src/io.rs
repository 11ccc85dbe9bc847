//! Calibration files in the JSON flavour of OpenCV's FileStorage format.
//!
//! Matrices are stored as
//! `{"type_id": "opencv-matrix", "rows": r, "cols": c, "dt": "d", "data": [...]}`
//! with row-major `data`. FileStorage has no integer scalars, so sizes are
//! stored as reals and truncated when read.

use crate::CalibrationError;
use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

const OPENCV_MATRIX: &str = "opencv-matrix";

fn opencv_matrix_type() -> String {
    OPENCV_MATRIX.to_owned()
}

fn double_dt() -> String {
    "d".to_owned()
}

/// Matrix node of a FileStorage document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpenCvMat {
    #[serde(default = "opencv_matrix_type")]
    pub type_id: String,
    pub rows: usize,
    pub cols: usize,
    #[serde(default = "double_dt")]
    pub dt: String,
    pub data: Vec<f64>,
}

impl OpenCvMat {
    pub fn from_matrix<const R: usize, const C: usize>(m: &SMatrix<f64, R, C>) -> Self {
        let mut data = Vec::with_capacity(R * C);
        for r in 0..R {
            for c in 0..C {
                data.push(m[(r, c)]);
            }
        }
        Self {
            type_id: opencv_matrix_type(),
            rows: R,
            cols: C,
            dt: double_dt(),
            data,
        }
    }

    /// Single-column matrix holding `values`.
    pub fn column(values: &[f64]) -> Self {
        Self {
            type_id: opencv_matrix_type(),
            rows: values.len(),
            cols: 1,
            dt: double_dt(),
            data: values.to_vec(),
        }
    }

    fn check_layout(&self, key: &str) -> Result<(), CalibrationError> {
        if self.type_id != OPENCV_MATRIX {
            return Err(CalibrationError::format(
                key,
                format!("expected type_id `{OPENCV_MATRIX}`, got `{}`", self.type_id),
            ));
        }
        if self.data.len() != self.rows * self.cols {
            return Err(CalibrationError::format(
                key,
                format!(
                    "{}x{} matrix carries {} values",
                    self.rows,
                    self.cols,
                    self.data.len()
                ),
            ));
        }
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::format(key, "matrix contains non-finite values"));
        }
        Ok(())
    }

    /// Read as a fixed-size matrix, checking the stored shape.
    pub fn to_fixed<const R: usize, const C: usize>(
        &self,
        key: &str,
    ) -> Result<SMatrix<f64, R, C>, CalibrationError> {
        self.check_layout(key)?;
        if self.rows != R || self.cols != C {
            return Err(CalibrationError::format(
                key,
                format!("expected a {R}x{C} matrix, got {}x{}", self.rows, self.cols),
            ));
        }
        Ok(SMatrix::<f64, R, C>::from_row_slice(&self.data))
    }

    /// Read a row or column vector.
    pub fn to_vec(&self, key: &str) -> Result<Vec<f64>, CalibrationError> {
        self.check_layout(key)?;
        if self.rows != 1 && self.cols != 1 {
            return Err(CalibrationError::format(
                key,
                format!("expected a vector, got a {}x{} matrix", self.rows, self.cols),
            ));
        }
        Ok(self.data.clone())
    }
}

/// Narrow a FileStorage real to a positive integer by truncation.
pub(crate) fn positive_integral(key: &str, value: f64) -> Result<u32, CalibrationError> {
    let truncated = value.trunc();
    if !value.is_finite() || truncated < 1.0 || truncated > u32::MAX as f64 {
        return Err(CalibrationError::format(
            key,
            format!("expected a positive integral value, got {value}"),
        ));
    }
    Ok(truncated as u32)
}

pub(crate) fn finite(key: &str, value: f64) -> Result<f64, CalibrationError> {
    if !value.is_finite() {
        return Err(CalibrationError::format(key, "value is not finite"));
    }
    Ok(value)
}

fn read_document(path: &Path) -> Result<String, CalibrationError> {
    fs::read_to_string(path).map_err(|source| CalibrationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_document(path: &Path, json: String) -> Result<(), CalibrationError> {
    fs::write(path, json).map_err(|source| CalibrationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Persisted single-camera calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleCalibrationFile {
    pub camera_matrix: OpenCvMat,
    pub dist_coeffs: OpenCvMat,
    pub image_size: [f64; 2],
    #[serde(rename = "boardSize_width")]
    pub board_size_width: f64,
    #[serde(rename = "boardSize_height")]
    pub board_size_height: f64,
    pub square_size: f64,
    /// Mean absolute reprojection error of every calibration image, pixels.
    #[serde(rename = "reprojectionPointsMAE")]
    pub reprojection_points_mae: Vec<f64>,
    #[serde(rename = "intrinsicRMSE")]
    pub intrinsic_rmse: f64,
    #[serde(rename = "avgMAE")]
    pub avg_mae: f64,
}

/// Persisted stereo calibration.
///
/// `avgWorldMAE` and `reprojectionWorldPointsMAE` hold the raw measured
/// square size; the error against the nominal `squareSize` is derived when
/// the record is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StereoCalibrationFile {
    pub camera_matrix: OpenCvMat,
    pub dist_coeffs: OpenCvMat,
    pub camera_matrix_secondary: OpenCvMat,
    pub dist_coeffs_secondary: OpenCvMat,
    pub image_size: [f64; 2],
    #[serde(rename = "boardSize_width")]
    pub board_size_width: f64,
    #[serde(rename = "boardSize_height")]
    pub board_size_height: f64,
    pub square_size: f64,
    pub rotation_matrix: OpenCvMat,
    pub translation_matrix: OpenCvMat,
    pub essential_matrix: OpenCvMat,
    pub fundamental_matrix: OpenCvMat,
    pub rectification_transform: OpenCvMat,
    pub rectification_transform_secondary: OpenCvMat,
    pub projection_matrix: OpenCvMat,
    pub projection_matrix_secondary: OpenCvMat,
    #[serde(rename = "intrinsicRMSE")]
    pub intrinsic_rmse: f64,
    #[serde(rename = "intrinsicRMSESec")]
    pub intrinsic_rmse_sec: f64,
    #[serde(rename = "avgMAE")]
    pub avg_mae: f64,
    #[serde(rename = "avgMAESec")]
    pub avg_mae_sec: f64,
    #[serde(rename = "stereoRMSE")]
    pub stereo_rmse: f64,
    #[serde(rename = "avgWorldMAE")]
    pub avg_world_mae: f64,
    #[serde(rename = "reprojectionWorldPointsMAE")]
    pub reprojection_world_points_mae: Vec<f64>,
}

macro_rules! impl_json_document {
    ($ty:ty) => {
        impl $ty {
            /// Load a FileStorage JSON document from disk.
            pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
                let raw = read_document(path.as_ref())?;
                Ok(serde_json::from_str(&raw)?)
            }

            /// Write this document to disk as pretty JSON.
            pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
                let json = serde_json::to_string_pretty(self)?;
                write_document(path.as_ref(), json)
            }
        }
    };
}

impl_json_document!(SingleCalibrationFile);
impl_json_document!(StereoCalibrationFile);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CalibrationErrorKind;
    use nalgebra::{Matrix3, Matrix3x4};

    #[test]
    fn matrix_nodes_are_row_major() {
        let m = Matrix3x4::new(
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0,
        );
        let node = OpenCvMat::from_matrix(&m);
        assert_eq!(node.data[..4], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(node.to_fixed::<3, 4>("p").expect("shape"), m);
    }

    #[test]
    fn wrong_shape_is_a_format_error() {
        let node = OpenCvMat::from_matrix(&Matrix3::<f64>::identity());
        let err = node.to_fixed::<3, 4>("projectionMatrix").unwrap_err();
        assert_eq!(err.kind(), CalibrationErrorKind::Format);
        assert!(err.to_string().contains("projectionMatrix"));
    }

    #[test]
    fn short_data_is_rejected() {
        let node = OpenCvMat {
            type_id: opencv_matrix_type(),
            rows: 3,
            cols: 3,
            dt: double_dt(),
            data: vec![1.0; 8],
        };
        assert!(node.to_fixed::<3, 3>("cameraMatrix").is_err());
    }

    #[test]
    fn vectors_accept_rows_and_columns() {
        let col = OpenCvMat::column(&[0.1, 0.2, 0.0, 0.0, 0.3]);
        assert_eq!(col.to_vec("distCoeffs").expect("column").len(), 5);
        let row = OpenCvMat {
            rows: 1,
            cols: 5,
            ..col.clone()
        };
        assert!(row.to_vec("distCoeffs").is_ok());
        let square = OpenCvMat::from_matrix(&Matrix3::<f64>::identity());
        assert!(square.to_vec("distCoeffs").is_err());
    }

    #[test]
    fn integral_fields_truncate() {
        assert_eq!(positive_integral("squareSize", 24.9).expect("positive"), 24);
        assert_eq!(positive_integral("imageSize", 640.0).expect("positive"), 640);
        assert!(positive_integral("squareSize", 0.9).is_err());
        assert!(positive_integral("squareSize", -3.0).is_err());
        assert!(positive_integral("squareSize", f64::NAN).is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = SingleCalibrationFile::load_json(dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.kind(), CalibrationErrorKind::Io);
    }

    #[test]
    fn missing_key_is_a_format_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "squareSize": 5.0 }"#).expect("write");
        let err = SingleCalibrationFile::load_json(&path).unwrap_err();
        assert_eq!(err.kind(), CalibrationErrorKind::Format);
    }
}
