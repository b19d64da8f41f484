use crate::{error::Error, exercise::ExerciseType, metrics::MetricRow};
use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// One record per completed session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct SessionSummary {
    pub(crate) exercise_type: ExerciseType,
    pub(crate) file_path: PathBuf,
    /// Milliseconds since the Unix epoch at which the session completed.
    pub(crate) timestamp: i64,
    pub(crate) avg_asymmetry: Option<f64>,
    pub(crate) max_asymmetry: Option<f64>,
    /// Mean of the exercise's angle column.
    pub(crate) avg_angle: Option<f64>,
    pub(crate) max_angle: Option<f64>,
}

/// Running totals over the rows of one recording.
#[derive(Debug, Clone, Default)]
pub(crate) struct SummaryAccumulator {
    asymmetry: Running,
    angle: Running,
}

#[derive(Debug, Clone, Copy, Default)]
struct Running {
    sum: f64,
    max: Option<f64>,
    count: usize,
}

impl Running {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

impl SummaryAccumulator {
    /// Fold in every measured asymmetry cell and the exercise's angle cell.
    pub(crate) fn push(&mut self, row: &MetricRow) {
        for value in row.asymmetry.iter().flatten() {
            self.asymmetry.push(*value);
        }
        if let Some(angle) = row
            .exercise
            .angle_type()
            .and_then(|angle_type| row.angle(angle_type))
        {
            self.angle.push(angle);
        }
    }

    pub(crate) fn finish(
        &self,
        exercise_type: ExerciseType,
        file_path: PathBuf,
        timestamp: i64,
    ) -> SessionSummary {
        SessionSummary {
            exercise_type,
            file_path,
            timestamp,
            avg_asymmetry: self.asymmetry.mean(),
            max_asymmetry: self.asymmetry.max,
            avg_angle: self.angle.mean(),
            max_angle: self.angle.max,
        }
    }
}

/// Append-only persistence of session summaries.
pub(crate) trait SummaryStore {
    fn append(&mut self, summary: SessionSummary) -> Result<(), Error>;

    /// All stored summaries, oldest first.
    fn list(&self) -> Result<Vec<SessionSummary>, Error>;
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    summaries: Vec<SessionSummary>,
}

#[cfg(test)]
impl SummaryStore for MemoryStore {
    fn append(&mut self, summary: SessionSummary) -> Result<(), Error> {
        self.summaries.push(summary);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionSummary>, Error> {
        let mut summaries = self.summaries.clone();
        summaries.sort_by_key(|summary| summary.timestamp);
        Ok(summaries)
    }
}

/// Stores one JSON object per line.
#[derive(Debug, Clone)]
pub(crate) struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub(crate) fn new<P>(path: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SummaryStore for JsonLinesStore {
    fn append(&mut self, summary: SessionSummary) -> Result<(), Error> {
        let mut line = serde_json::to_string(&summary).map_err(Error::EncodeSummary)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::OpenSummaryStore(e, self.path.clone()))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| Error::AppendSummary(e, self.path.clone()))?;

        debug!(message = "stored session summary", path = ?self.path);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionSummary>, Error> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::OpenSummaryStore(e, self.path.clone())),
        };

        let mut summaries = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::ReadSummaries(e, self.path.clone()))?;
            if line.trim().is_empty() {
                continue;
            }
            summaries.push(
                serde_json::from_str(&line)
                    .map_err(|e| Error::DecodeSummary(e, self.path.clone(), i + 1))?,
            );
        }
        summaries.sort_by_key(|summary: &SessionSummary| summary.timestamp);
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonLinesStore, MemoryStore, SessionSummary, SummaryAccumulator, SummaryStore};
    use crate::{exercise::ExerciseType, metrics::MetricRow, recorder::tests::row};
    use assert_approx_eq::assert_approx_eq;
    use std::path::PathBuf;

    fn summary(timestamp: i64) -> SessionSummary {
        SessionSummary {
            exercise_type: ExerciseType::Pose,
            file_path: PathBuf::from(format!("{}.csv", timestamp)),
            timestamp,
            avg_asymmetry: Some(1.0),
            max_asymmetry: Some(2.0),
            avg_angle: None,
            max_angle: None,
        }
    }

    mod accumulator_tests {
        use super::*;

        #[test]
        fn front_view_uses_every_measured_cell() {
            let mut acc = SummaryAccumulator::default();
            // 1.5, 0.0 and 12.25 are measured in each row
            acc.push(&row(1, ExerciseType::Pose));
            acc.push(&row(2, ExerciseType::Pose));
            let summary = acc.finish(ExerciseType::Pose, "a.csv".into(), 5);
            assert_approx_eq!(summary.avg_asymmetry.unwrap(), 13.75 / 3.0);
            assert_approx_eq!(summary.max_asymmetry.unwrap(), 12.25);
            assert_eq!(summary.avg_angle, None);
            assert_eq!(summary.max_angle, None);
        }

        #[test]
        fn avg_angle_is_the_mean_not_the_max() {
            let mut acc = SummaryAccumulator::default();
            for (i, angle) in [100.0, 140.0, 180.0].iter().enumerate() {
                acc.push(&MetricRow {
                    asymmetry: [None; 7],
                    squat_angle: Some(*angle),
                    ..row(i as i64, ExerciseType::SideSquat)
                });
            }
            let summary = acc.finish(ExerciseType::SideSquat, "a.csv".into(), 5);
            assert_approx_eq!(summary.avg_angle.unwrap(), 140.0);
            assert_approx_eq!(summary.max_angle.unwrap(), 180.0);
            assert_ne!(summary.avg_angle, summary.max_angle);
            assert_eq!(summary.avg_asymmetry, None);
        }

        #[test]
        fn nothing_measured_is_none() {
            let summary =
                SummaryAccumulator::default().finish(ExerciseType::Plank, "a.csv".into(), 5);
            assert_eq!(summary.avg_angle, None);
            assert_eq!(summary.max_asymmetry, None);
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn memory_store_lists_by_timestamp() {
            let mut store = MemoryStore::default();
            store.append(summary(3)).unwrap();
            store.append(summary(1)).unwrap();
            store.append(summary(2)).unwrap();
            let timestamps = store
                .list()
                .unwrap()
                .iter()
                .map(|s| s.timestamp)
                .collect::<Vec<_>>();
            assert_eq!(timestamps, vec![1, 2, 3]);
        }

        #[test]
        fn json_lines_store_persists_across_instances() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("history.jsonl");
            JsonLinesStore::new(&path).append(summary(20)).unwrap();
            JsonLinesStore::new(&path).append(summary(10)).unwrap();

            let listed = JsonLinesStore::new(&path).list().unwrap();
            assert_eq!(listed, vec![summary(10), summary(20)]);
            assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
        }

        #[test]
        fn missing_store_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            let store = JsonLinesStore::new(dir.path().join("none.jsonl"));
            assert!(store.list().unwrap().is_empty());
        }

        #[test]
        fn corrupt_line_is_reported() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("history.jsonl");
            std::fs::write(&path, "{not json}\n").unwrap();
            assert!(JsonLinesStore::new(&path).list().is_err());
        }

        #[test]
        fn exercise_is_stored_as_recorded_token() {
            let json = serde_json::to_string(&summary(1)).unwrap();
            assert!(json.contains("\"exercise_type\":\"POSE\""));
        }
    }
}
