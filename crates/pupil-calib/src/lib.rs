//! Calibration-aware pupil size measurement.
//!
//! Loads single and stereo camera calibrations, removes lens distortion from
//! frames and from pupil ellipses, and triangulates a metric pupil diameter
//! from two synchronized views.
//!
//! ## Quickstart
//!
//! ```no_run
//! use pupil_calib::{
//!     CalibrationRecord, CorrectionParams, PupilGeometryCorrector, PupilMeasurement,
//! };
//! use nalgebra::Point2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // level from PUPIL_CALIB_LOG, `info` when unset
//! pupil_calib::core::init_from_env()?;
//! let calibration = CalibrationRecord::load("calibration.json")?;
//! let corrector = PupilGeometryCorrector::new(Some(&calibration), CorrectionParams::default());
//!
//! let pupil = PupilMeasurement::new(Point2::new(320.0, 240.0), 40.0, 30.0, 12.0, 0.9);
//! println!("diameter: {:?}", corrector.undistorted_diameter(&pupil));
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `pupil_calib::core`: camera model, undistortion, remap tables, triangulation,
//!   process logger.
//! - [`CalibrationRecord`], [`StereoCalibrationRecord`]: loaded calibrations.
//! - [`PupilGeometryCorrector`]: monocular undistorted diameter.
//! - [`StereoTriangulator`]: per-camera diameters and metric diameter.
//! - [`PupilDataWriter`]: per-frame CSV output.
//! - `pupil_calib::frame` (feature `image`): undistortion of `image::GrayImage`.

pub use pupil_calib_core as core;

mod corners;
mod correction;
mod data_writer;
mod error;
pub mod io;
mod pupil;
mod record;
mod stereo;
mod stereo_record;

#[cfg(feature = "image")]
pub mod frame;

pub use corners::{
    corner_points, major_axis_corners, major_axis_points, RectCorner, CORNER_SELECTION_ANGLE,
};
pub use correction::{CorrectionParams, PupilGeometryCorrector, PupilSize};
pub use data_writer::{DataWriterError, PupilDataWriter, NO_PHYSICAL_DIAMETER, PUPIL_DATA_HEADER};
pub use error::{CalibrationError, CalibrationErrorKind};
pub use io::{OpenCvMat, SingleCalibrationFile, StereoCalibrationFile};
pub use pupil::{PupilMeasurement, NO_CENTER, NO_CONFIDENCE};
pub use record::{BoardSize, CalibrationRecord, MONOCULAR_ALPHA};
pub use stereo::{MetricPupilSize, StereoPupilSizes, StereoTriangulator};
pub use stereo_record::{CameraRole, StereoCalibrationRecord, StereoCameraView, STEREO_ALPHA};
