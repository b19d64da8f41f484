use crate::{exercise::ExerciseType, pose::KeypointKind};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("failed to convert keypoint variant to usize: {0:?}")]
    KeypointVariantToUSize(KeypointKind),

    #[error("failed to construct NotNan from f32: {1}")]
    ConstructNotNan(#[source] ordered_float::FloatIsNan, f32),

    #[error("unknown exercise type: {0}")]
    ParseExerciseType(String),

    #[error("unknown detector backend: {0}")]
    ParseBackendKind(String),

    #[error("frame dimensions must be positive, got {0}x{1}")]
    InvalidFrameDimensions(f32, f32),

    #[error("failed to create recording directory: {1:?}")]
    CreateRecordingDir(#[source] std::io::Error, PathBuf),

    #[error("failed to open recording: {1:?}")]
    OpenRecording(#[source] std::io::Error, PathBuf),

    #[error("failed to write header to recording: {1:?}")]
    WriteHeader(#[source] csv::Error, PathBuf),

    #[error("failed to write row to recording: {1:?}")]
    WriteRow(#[source] csv::Error, PathBuf),

    #[error("failed to flush recording: {1:?}")]
    FlushRecording(#[source] std::io::Error, PathBuf),

    #[error("row timestamp {timestamp} does not follow {previous} in {path:?}")]
    NonIncreasingTimestamp {
        path: PathBuf,
        previous: i64,
        timestamp: i64,
    },

    #[error("recording is closed: {0:?}")]
    RecordingClosed(PathBuf),

    #[error("failed to read recording: {1:?}")]
    ReadRecording(#[source] csv::Error, PathBuf),

    #[error("recording {0:?} has {1} line(s), expected a header and at least one row")]
    TooFewLines(PathBuf, usize),

    #[error("recording {0:?} is missing column {1}")]
    MissingColumn(PathBuf, String),

    #[error("recording {0:?} does not declare a {1} exercise, found {2}")]
    ExerciseMismatch(PathBuf, ExerciseType, String),

    #[error("failed to parse cell {value:?} in column {column} at line {line} of {path:?}")]
    ParseCell {
        #[source]
        source: std::num::ParseFloatError,
        path: PathBuf,
        column: String,
        line: usize,
        value: String,
    },

    #[error("failed to parse timestamp {value:?} at line {line} of {path:?}")]
    ParseTimestamp {
        #[source]
        source: std::num::ParseIntError,
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("a session is already active (state: {0})")]
    SessionActive(&'static str),

    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    #[error("failed to open detection stream: {1:?}")]
    OpenDetections(#[source] std::io::Error, PathBuf),

    #[error("failed to read detection stream at line {1}")]
    ReadDetections(#[source] std::io::Error, usize),

    #[error("failed to decode detection at line {1}")]
    DecodeDetection(#[source] serde_json::Error, usize),

    #[error("detection has {0} keypoints, expected {1}")]
    KeypointCount(usize, usize),

    #[error("failed to open summary store: {1:?}")]
    OpenSummaryStore(#[source] std::io::Error, PathBuf),

    #[error("failed to append session summary to {1:?}")]
    AppendSummary(#[source] std::io::Error, PathBuf),

    #[error("failed to encode session summary")]
    EncodeSummary(#[source] serde_json::Error),

    #[error("failed to decode session summary at line {2} of {1:?}")]
    DecodeSummary(#[source] serde_json::Error, PathBuf, usize),

    #[error("failed to read session summaries from {1:?}")]
    ReadSummaries(#[source] std::io::Error, PathBuf),

    #[error("failed to read system clock")]
    SystemClock(#[source] std::time::SystemTimeError),

    #[error("failed to convert value to i64")]
    ConvertToI64,
}
