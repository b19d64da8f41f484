use crate::{
    error::Error,
    exercise::{AngleType, ExerciseType},
    metrics::MetricRow,
    pose::BodyPart,
};
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::{debug, trace};

/// Token written for metrics that are not applicable or not visible.
pub(crate) const NAN_TOKEN: &str = "NaN";

pub(crate) const TIMESTAMP_COLUMN: &str = "timestamp";
pub(crate) const EXERCISE_COLUMN: &str = "exercise_type";

pub(crate) fn asymmetry_column(part: BodyPart) -> String {
    format!("{}_height_diff", part.name())
}

/// The fixed column schema shared by every exercise type.
pub(crate) fn header() -> Vec<String> {
    let mut columns = vec![TIMESTAMP_COLUMN.to_owned(), EXERCISE_COLUMN.to_owned()];
    columns.extend(BodyPart::ALL.iter().map(|&part| asymmetry_column(part)));
    columns.push(AngleType::Squat.column().to_owned());
    columns.push(AngleType::Plank.column().to_owned());
    for part in BodyPart::ALL.iter() {
        let name = part.name();
        columns.push(format!("left_{}_x", name));
        columns.push(format!("left_{}_y", name));
        columns.push(format!("right_{}_x", name));
        columns.push(format!("right_{}_y", name));
    }
    columns
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| NAN_TOKEN.to_owned(), |value| value.to_string())
}

fn to_record(row: &MetricRow) -> Vec<String> {
    let mut record = Vec::with_capacity(2 + 7 + 2 + 7 * 4);
    record.push(row.timestamp_ms.to_string());
    record.push(row.exercise.to_string());
    record.extend(row.asymmetry.iter().copied().map(cell));
    record.push(cell(row.squat_angle));
    record.push(cell(row.plank_angle));
    for pair in row.coordinates.iter() {
        record.push(cell(pair.left.map(|point| point.x())));
        record.push(cell(pair.left.map(|point| point.y())));
        record.push(cell(pair.right.map(|point| point.x())));
        record.push(cell(pair.right.map(|point| point.y())));
    }
    record
}

/// Appends one row per accepted frame to a session record.
///
/// Every row is flushed as soon as it is written, so a crash loses at most
/// the row in flight.
pub(crate) struct Recorder {
    path: PathBuf,
    exercise: ExerciseType,
    writer: Option<csv::Writer<File>>,
    last_timestamp_ms: Option<i64>,
    rows_written: usize,
}

impl Recorder {
    /// Create (or truncate) `path` and write the header.
    pub(crate) fn open<P>(path: P, exercise: ExerciseType) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| Error::OpenRecording(e, path.clone()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer
            .write_record(header())
            .map_err(|e| Error::WriteHeader(e, path.clone()))?;
        writer
            .flush()
            .map_err(|e| Error::FlushRecording(e, path.clone()))?;

        debug!(message = "opened recording", path = ?path, exercise = %exercise);

        Ok(Self {
            path,
            exercise,
            writer: Some(writer),
            last_timestamp_ms: None,
            rows_written: 0,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Whether a row stamped `timestamp_ms` would keep the record in strictly
    /// increasing order.
    pub(crate) fn accepts(&self, timestamp_ms: i64) -> bool {
        self.last_timestamp_ms
            .map_or(true, |last| timestamp_ms > last)
    }

    pub(crate) fn append_row(&mut self, row: &MetricRow) -> Result<(), Error> {
        if !self.accepts(row.timestamp_ms) {
            return Err(Error::NonIncreasingTimestamp {
                path: self.path.clone(),
                previous: self.last_timestamp_ms.unwrap_or_default(),
                timestamp: row.timestamp_ms,
            });
        }
        if row.exercise != self.exercise {
            return Err(Error::ExerciseMismatch(
                self.path.clone(),
                self.exercise,
                row.exercise.to_string(),
            ));
        }

        let path = &self.path;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::RecordingClosed(path.clone()))?;

        writer
            .write_record(to_record(row))
            .map_err(|e| Error::WriteRow(e, path.clone()))?;
        writer
            .flush()
            .map_err(|e| Error::FlushRecording(e, path.clone()))?;

        self.last_timestamp_ms = Some(row.timestamp_ms);
        self.rows_written += 1;
        trace!(message = "appended row", timestamp_ms = row.timestamp_ms);
        Ok(())
    }

    /// Flush and release the file. Closing an already closed recorder is a
    /// no-op.
    pub(crate) fn close(&mut self) -> Result<(), Error> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| Error::FlushRecording(e, self.path.clone()))?;
            debug!(
                message = "closed recording",
                path = ?self.path,
                rows = self.rows_written
            );
        }
        Ok(())
    }
}
