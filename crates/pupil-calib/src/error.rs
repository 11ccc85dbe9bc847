use std::path::PathBuf;

/// Coarse classification of [`CalibrationError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationErrorKind {
    /// The file could not be opened, read or written.
    Io,
    /// The file was read but its content is unusable.
    Format,
}

/// Errors returned while loading, validating or writing calibration files.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("cannot access calibration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("calibration file is not a valid FileStorage document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("calibration entry `{key}` is malformed: {reason}")]
    Format { key: String, reason: String },
}

impl CalibrationError {
    pub(crate) fn format(key: &str, reason: impl Into<String>) -> Self {
        Self::Format {
            key: key.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> CalibrationErrorKind {
        match self {
            Self::Io { .. } => CalibrationErrorKind::Io,
            Self::Json(_) | Self::Format { .. } => CalibrationErrorKind::Format,
        }
    }
}
