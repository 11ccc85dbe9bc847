//! Per-frame pupil data as CSV.

use crate::PupilMeasurement;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Column names, in row order.
pub const PUPIL_DATA_HEADER: [&str; 12] = [
    "filename",
    "timestamp[ms]",
    "diameter[px]",
    "physicaldiameter[mm]",
    "width[px]",
    "height[px]",
    "center_x",
    "center_y",
    "angle[deg]",
    "circumference[px]",
    "confidence",
    "outline_confidence",
];

/// Physical diameter written when none was measured.
pub const NO_PHYSICAL_DIAMETER: f64 = -1.0;

#[derive(thiserror::Error, Debug)]
pub enum DataWriterError {
    #[error("cannot create pupil data file {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Serialize)]
struct PupilRow<'a> {
    filename: &'a str,
    timestamp: u64,
    diameter: f32,
    physical_diameter: f64,
    width: f32,
    height: f32,
    center_x: f32,
    center_y: f32,
    angle: f32,
    circumference: f32,
    confidence: f32,
    outline_confidence: f32,
}

impl<'a> PupilRow<'a> {
    fn new(
        timestamp: u64,
        pupil: &PupilMeasurement,
        physical_diameter: Option<f64>,
        filename: &'a str,
    ) -> Self {
        Self {
            filename,
            timestamp,
            diameter: pupil.diameter(),
            physical_diameter: physical_diameter.unwrap_or(NO_PHYSICAL_DIAMETER),
            width: pupil.width,
            height: pupil.height,
            center_x: pupil.center.x,
            center_y: pupil.center.y,
            angle: pupil.angle,
            circumference: pupil.circumference(),
            confidence: pupil.confidence,
            outline_confidence: pupil.outline_confidence,
        }
    }
}

/// Writes one CSV row per pupil measurement.
///
/// The header is written as soon as the writer is created, so an empty
/// recording still yields a well-formed file.
pub struct PupilDataWriter<W: Write = File> {
    inner: csv::Writer<W>,
}

impl PupilDataWriter<File> {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, DataWriterError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| DataWriterError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("writing pupil data to {}", path.display());
        Self::from_writer(file)
    }
}

impl<W: Write> PupilDataWriter<W> {
    pub fn from_writer(writer: W) -> Result<Self, DataWriterError> {
        let mut inner = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        inner.write_record(PUPIL_DATA_HEADER)?;
        Ok(Self { inner })
    }

    /// Append one measurement taken at `timestamp` (ms) from `filename`.
    pub fn append(
        &mut self,
        timestamp: u64,
        pupil: &PupilMeasurement,
        physical_diameter: Option<f64>,
        filename: &str,
    ) -> Result<(), DataWriterError> {
        self.inner
            .serialize(PupilRow::new(timestamp, pupil, physical_diameter, filename))?;
        Ok(())
    }

    /// Write a whole recording; the frame index is used as timestamp.
    pub fn write_all<'p>(
        &mut self,
        pupils: impl IntoIterator<Item = &'p PupilMeasurement>,
    ) -> Result<(), DataWriterError> {
        for (frame, pupil) in pupils.into_iter().enumerate() {
            self.append(frame as u64, pupil, None, "")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), DataWriterError> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W, DataWriterError> {
        self.inner
            .into_inner()
            .map_err(|e| DataWriterError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn written(writer: PupilDataWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner().expect("flush")).expect("utf8")
    }

    #[test]
    fn header_is_written_up_front() {
        let writer = PupilDataWriter::from_writer(Vec::new()).expect("writer");
        let text = written(writer);
        assert_eq!(text.trim_end(), PUPIL_DATA_HEADER.join(","));
    }

    #[test]
    fn row_carries_all_columns() {
        let mut writer = PupilDataWriter::from_writer(Vec::new()).expect("writer");
        let pupil = PupilMeasurement::new(Point2::new(12.5, 8.0), 20.0, 10.0, 15.0, 0.75);
        writer
            .append(1500, &pupil, Some(3.25), "frame_0001.png")
            .expect("row");
        let text = written(writer);
        let row = text.lines().nth(1).expect("row line");
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), PUPIL_DATA_HEADER.len());
        assert_eq!(fields[0], "frame_0001.png");
        assert_eq!(fields[1], "1500");
        assert_eq!(fields[2], "20.0");
        assert_eq!(fields[3], "3.25");
        assert_eq!(fields[6], "12.5");
        assert_eq!(fields[10], "0.75");
        assert_eq!(fields[11], "-1.0");
    }

    #[test]
    fn write_all_numbers_frames() {
        let mut writer = PupilDataWriter::from_writer(Vec::new()).expect("writer");
        let pupils = [PupilMeasurement::invalid(), PupilMeasurement::invalid()];
        writer.write_all(&pupils).expect("rows");
        let text = written(writer);
        let stamps: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|l| l.split(',').nth(1).expect("timestamp"))
            .collect();
        assert_eq!(stamps, ["0", "1"]);
        assert!(text.lines().skip(1).all(|l| l.split(',').nth(3) == Some("-1.0")));
    }
}
