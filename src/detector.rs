use crate::{
    error::Error,
    pose::{Keypoint, Keypoints, Pose, NUM_KEYPOINTS},
    visibility::VisibilityGate,
};
use crossbeam::channel::Sender;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tracing::{debug, warn};

/// One detector output as it arrives from the pose model, before any axis
/// correction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct RawDetection {
    pub(crate) timestamp_ms: i64,
    /// One `[a, b, score]` triple per keypoint, in `KeypointKind` order.
    /// The meaning of `a` and `b` depends on the backend.
    pub(crate) keypoints: Option<Vec<[f32; 3]>>,
}

/// A detection converted into the canonical pose frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DetectionEvent {
    pub(crate) timestamp_ms: i64,
    pub(crate) pose: Option<Pose>,
}

/// What the session needs from a detector backend.
///
/// Each backend reports keypoints in its own coordinate convention;
/// `to_pose` is the only place that convention is undone.
pub(crate) trait Backend: Sync {
    fn name(&self) -> &'static str;

    fn gate(&self) -> &VisibilityGate;

    /// Convert a raw detection into a pose in the canonical pixel frame.
    fn to_pose(&self, raw: &RawDetection) -> Result<Option<Pose>, Error>;

    fn is_pose_usable(&self, pose: &Pose) -> bool {
        self.gate().is_pose_usable(pose)
    }
}

fn build_pose<F>(triples: &[[f32; 3]], mut keypoint: F) -> Result<Pose, Error>
where
    F: FnMut([f32; 3]) -> Result<Keypoint, Error>,
{
    if triples.len() != NUM_KEYPOINTS {
        return Err(Error::KeypointCount(triples.len(), NUM_KEYPOINTS));
    }

    let mut keypoints: Keypoints = Default::default();
    for (slot, &triple) in keypoints.iter_mut().zip(triples) {
        *slot = Some(keypoint(triple)?);
    }
    Ok(Pose::new(keypoints))
}

/// Keypoints are `[x, y, score]` in pixels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PixelBackend {
    gate: VisibilityGate,
}

impl PixelBackend {
    pub(crate) fn new(gate: VisibilityGate) -> Self {
        Self { gate }
    }
}

impl Backend for PixelBackend {
    fn name(&self) -> &'static str {
        "pixel"
    }

    fn gate(&self) -> &VisibilityGate {
        &self.gate
    }

    fn to_pose(&self, raw: &RawDetection) -> Result<Option<Pose>, Error> {
        raw.keypoints
            .as_deref()
            .map(|triples| build_pose(triples, |[x, y, score]| Keypoint::new(x, y, score)))
            .transpose()
    }
}

/// Keypoints are `[y, x, score]`, normalized to the frame dimensions.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TransposedBackend {
    gate: VisibilityGate,
    frame_width: f32,
    frame_height: f32,
}

impl TransposedBackend {
    pub(crate) fn new(
        gate: VisibilityGate,
        frame_width: f32,
        frame_height: f32,
    ) -> Result<Self, Error> {
        if !(frame_width > 0.0 && frame_height > 0.0) {
            return Err(Error::InvalidFrameDimensions(frame_width, frame_height));
        }
        Ok(Self {
            gate,
            frame_width,
            frame_height,
        })
    }
}

impl Backend for TransposedBackend {
    fn name(&self) -> &'static str {
        "transposed"
    }

    fn gate(&self) -> &VisibilityGate {
        &self.gate
    }

    fn to_pose(&self, raw: &RawDetection) -> Result<Option<Pose>, Error> {
        let (width, height) = (self.frame_width, self.frame_height);
        raw.keypoints
            .as_deref()
            .map(|triples| {
                build_pose(triples, |[y, x, score]| {
                    Keypoint::new(x * width, y * height, score)
                })
            })
            .transpose()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum BackendKind {
    Pixel,
    Transposed,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pixel" => Ok(Self::Pixel),
            "transposed" => Ok(Self::Transposed),
            _ => Err(Error::ParseBackendKind(s.to_owned())),
        }
    }
}

/// Read a JSON-lines detection stream, one [`RawDetection`] per line.
pub(crate) fn read_detections<P>(path: P) -> Result<Vec<RawDetection>, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::OpenDetections(e, path.to_path_buf()))?;

    let mut detections = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::ReadDetections(e, i + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        detections
            .push(serde_json::from_str(&line).map_err(|e| Error::DecodeDetection(e, i + 1))?);
    }
    debug!(message = "read detections", path = ?path, count = detections.len());
    Ok(detections)
}

/// Publish `detections` on `tx` at one per `frame_interval`, the way a live
/// detector would, until the stream ends, `running` is cleared or the
/// receiver hangs up.
///
/// A detection the backend cannot convert is published as "no pose".
pub(crate) fn replay<B>(
    backend: &B,
    detections: &[RawDetection],
    frame_interval: Duration,
    running: &AtomicBool,
    tx: &Sender<DetectionEvent>,
) -> usize
where
    B: Backend + ?Sized,
{
    let mut sent = 0;
    for raw in detections {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let pose = backend.to_pose(raw).unwrap_or_else(|e| {
            warn!(
                message = "dropping malformed detection",
                backend = backend.name(),
                timestamp_ms = raw.timestamp_ms,
                error = %e
            );
            None
        });

        let event = DetectionEvent {
            timestamp_ms: raw.timestamp_ms,
            pose,
        };
        if tx.send(event).is_err() {
            break;
        }
        sent += 1;
        std::thread::sleep(frame_interval);
    }
    sent
}
