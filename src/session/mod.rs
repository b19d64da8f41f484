//! The timed exercise protocol: countdown, recording, then results.
//!
//! [`Session`] is a plain state machine driven by two inputs: detection
//! events, which update the latest pose and append metric rows while
//! recording, and ticks, which advance the countdown and recording clocks.
//! [`runner`] wires those inputs to channels and a wall-clock ticker.

use crate::{
    config::SessionConfig,
    detector::{Backend, DetectionEvent},
    error::Error,
    exercise::{ExerciseType, Orientation},
    metrics::{normalization_scale, MetricEngine, FALLBACK_SCALE},
    pose::Pose,
    recorder::Recorder,
    report::{self, Report, Thresholds},
    summary::{SessionSummary, SummaryAccumulator, SummaryStore},
};
use num_traits::ToPrimitive;
use std::{
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, error, info, trace, warn};

pub(crate) mod runner;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> Result<i64, Error> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(Error::SystemClock)?
        .as_millis()
        .to_i64()
        .ok_or(Error::ConvertToI64)
}

/// What a single tick did to the session.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tick {
    Countdown { remaining: u32 },
    /// The countdown ended on a usable pose.
    RecordingStarted { scale: f64, path: PathBuf },
    /// The countdown ended without a usable pose; the session is idle again.
    PoseNotDetected,
    Recording { remaining: u32 },
    /// The user left the frame. Recording must be stopped after `grace`.
    UserLost { grace: Duration },
    /// A tick arrived while waiting out the grace period.
    AwaitingGrace,
    /// Recording ran for its full length.
    Completed(SessionSummary),
}

struct Countdown {
    exercise: ExerciseType,
    remaining: u32,
    /// The pose seen on the most recent tick, if it was usable.
    last_usable: Option<Pose>,
}

struct Recording {
    exercise: ExerciseType,
    engine: MetricEngine,
    recorder: Recorder,
    accumulator: SummaryAccumulator,
    remaining: u32,
    user_lost: bool,
}

struct Completed {
    exercise: ExerciseType,
    summary: SessionSummary,
}

enum State {
    Idle,
    Countdown(Countdown),
    Recording(Recording),
    ReadyForResults(Completed),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Countdown(_) => "counting down",
            Self::Recording(_) => "recording",
            Self::ReadyForResults(_) => "ready for results",
        }
    }
}

/// One exercise session at a time.
pub(crate) struct Session<'b, B: ?Sized, S> {
    backend: &'b B,
    store: S,
    config: SessionConfig,
    min_scale: f32,
    state: State,
    latest: Option<Pose>,
}

impl<'b, B, S> Session<'b, B, S>
where
    B: Backend + ?Sized,
    S: SummaryStore,
{
    pub(crate) fn new(backend: &'b B, store: S, config: SessionConfig, min_scale: f32) -> Self {
        Self {
            backend,
            store,
            config,
            min_scale,
            state: State::Idle,
            latest: None,
        }
    }

    pub(crate) fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub(crate) fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub(crate) fn is_counting_down(&self) -> bool {
        matches!(self.state, State::Countdown(_))
    }

    pub(crate) fn is_recording(&self) -> bool {
        matches!(self.state, State::Recording(_))
    }

    fn latest_usable_pose(&self) -> Option<Pose> {
        self.latest.filter(|pose| self.backend.is_pose_usable(pose))
    }

    /// Leave whatever state we are in and clear everything transient. An
    /// open recording is closed without producing a summary.
    fn reset(&mut self) {
        if let State::Recording(recording) = &mut self.state {
            if let Err(e) = recording.recorder.close() {
                warn!(message = "failed to close abandoned recording", error = %e);
            }
        }
        self.state = State::Idle;
        self.latest = None;
    }

    /// Begin the countdown for `exercise`.
    pub(crate) fn start(&mut self, exercise: ExerciseType) -> Result<(), Error> {
        if !self.is_idle() {
            return Err(Error::SessionActive(self.state.name()));
        }
        info!(
            message = "starting countdown",
            exercise = %exercise,
            backend = self.backend.name(),
            ticks = self.config.countdown_ticks
        );
        self.state = State::Countdown(Countdown {
            exercise,
            remaining: self.config.countdown_ticks,
            last_usable: None,
        });
        Ok(())
    }

    /// Abandon the countdown. Nothing is written.
    pub(crate) fn cancel(&mut self) -> Result<(), Error> {
        if !self.is_counting_down() {
            return Err(Error::InvalidTransition {
                operation: "cancel the countdown",
                state: self.state.name(),
            });
        }
        info!(message = "countdown cancelled");
        self.reset();
        Ok(())
    }

    /// Feed one detector result into the session.
    ///
    /// While recording, every frame with a usable pose is turned into a
    /// metric row. A write failure abandons the recording and returns the
    /// session to idle.
    pub(crate) fn on_detection(&mut self, event: DetectionEvent) -> Result<(), Error> {
        self.latest = event.pose;

        let (recording, pose) = match (&mut self.state, event.pose) {
            (State::Recording(recording), Some(pose)) => (recording, pose),
            _ => return Ok(()),
        };

        if !self.backend.is_pose_usable(&pose) {
            trace!(
                message = "dropping unusable frame",
                timestamp_ms = event.timestamp_ms
            );
            return Ok(());
        }
        if !recording.recorder.accepts(event.timestamp_ms) {
            trace!(
                message = "dropping out of order frame",
                timestamp_ms = event.timestamp_ms
            );
            return Ok(());
        }

        let row = recording.engine.compute(event.timestamp_ms, &pose);
        if let Err(e) = recording.recorder.append_row(&row) {
            error!(message = "failed to record frame, abandoning session", error = %e);
            self.reset();
            return Err(e);
        }
        recording.accumulator.push(&row);
        trace!(message = "recorded frame", timestamp_ms = event.timestamp_ms);
        Ok(())
    }

    /// Advance the countdown or recording clock by one tick.
    pub(crate) fn tick(&mut self) -> Result<Tick, Error> {
        let usable = self.latest_usable_pose();

        match &mut self.state {
            State::Countdown(countdown) => {
                countdown.remaining = countdown.remaining.saturating_sub(1);
                countdown.last_usable = usable;
                debug!(
                    message = "countdown tick",
                    remaining = countdown.remaining,
                    usable = usable.is_some()
                );

                if countdown.remaining > 0 {
                    return Ok(Tick::Countdown {
                        remaining: countdown.remaining,
                    });
                }

                let (exercise, last_usable) = (countdown.exercise, countdown.last_usable);
                match last_usable {
                    Some(pose) => self.begin_recording(exercise, &pose),
                    None => {
                        info!(message = "could not detect pose", exercise = %exercise);
                        self.reset();
                        Ok(Tick::PoseNotDetected)
                    }
                }
            }
            State::Recording(recording) => {
                if recording.user_lost {
                    return Ok(Tick::AwaitingGrace);
                }

                if usable.is_none() {
                    recording.user_lost = true;
                    let grace = self.config.grace_period();
                    warn!(
                        message = "lost user, stopping after grace period",
                        remaining = recording.remaining,
                        grace_ms = self.config.grace_ms
                    );
                    return Ok(Tick::UserLost { grace });
                }

                recording.remaining = recording.remaining.saturating_sub(1);
                if recording.remaining > 0 {
                    return Ok(Tick::Recording {
                        remaining: recording.remaining,
                    });
                }

                self.finish().map(Tick::Completed)
            }
            state => Err(Error::InvalidTransition {
                operation: "tick",
                state: state.name(),
            }),
        }
    }

    fn begin_recording(&mut self, exercise: ExerciseType, pose: &Pose) -> Result<Tick, Error> {
        let scale = match exercise.orientation() {
            Orientation::Front => normalization_scale(self.backend.gate(), pose, self.min_scale),
            Orientation::Side => FALLBACK_SCALE,
        };

        let opened = now_millis().and_then(|millis| {
            let dir = &self.config.output_dir;
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::CreateRecordingDir(e, dir.clone()))?;
            let path = dir.join(format!(
                "{}_{}.csv",
                exercise.as_str().to_ascii_lowercase(),
                millis
            ));
            Recorder::open(path, exercise)
        });
        let recorder = match opened {
            Ok(recorder) => recorder,
            Err(e) => {
                error!(message = "failed to open recording", error = %e);
                self.reset();
                return Err(e);
            }
        };

        let path = recorder.path().to_path_buf();
        let engine = MetricEngine::new(*self.backend.gate(), exercise, scale);
        info!(
            message = "recording",
            path = ?path,
            scale = engine.scale(),
            ticks = self.config.recording_ticks
        );

        self.state = State::Recording(Recording {
            exercise,
            engine,
            recorder,
            accumulator: SummaryAccumulator::default(),
            remaining: self.config.recording_ticks,
            user_lost: false,
        });
        Ok(Tick::RecordingStarted { scale, path })
    }

    /// Stop recording now, whether at the user's request or because the
    /// grace period after losing the user ran out.
    pub(crate) fn stop(&mut self) -> Result<SessionSummary, Error> {
        if !self.is_recording() {
            return Err(Error::InvalidTransition {
                operation: "stop recording",
                state: self.state.name(),
            });
        }
        self.finish()
    }

    /// Close the recording, store its summary and wait for a report request.
    fn finish(&mut self) -> Result<SessionSummary, Error> {
        let mut recording = match std::mem::replace(&mut self.state, State::Idle) {
            State::Recording(recording) => recording,
            state => {
                let name = state.name();
                self.state = state;
                return Err(Error::InvalidTransition {
                    operation: "finish recording",
                    state: name,
                });
            }
        };

        let finished = recording
            .recorder
            .close()
            .and_then(|_| now_millis())
            .and_then(|timestamp| {
                let summary = recording.accumulator.finish(
                    recording.exercise,
                    recording.recorder.path().to_path_buf(),
                    timestamp,
                );
                self.store.append(summary.clone())?;
                Ok(summary)
            });

        match finished {
            Ok(summary) => {
                info!(
                    message = "recording finished",
                    path = ?summary.file_path,
                    rows = recording.recorder.rows_written()
                );
                self.state = State::ReadyForResults(Completed {
                    exercise: recording.exercise,
                    summary: summary.clone(),
                });
                Ok(summary)
            }
            Err(e) => {
                error!(message = "failed to finalize recording", error = %e);
                self.reset();
                Err(e)
            }
        }
    }

    /// Analyze the finished recording and return to idle.
    pub(crate) fn generate_report(&mut self, thresholds: &Thresholds) -> Result<Report, Error> {
        let completed = match std::mem::replace(&mut self.state, State::Idle) {
            State::ReadyForResults(completed) => completed,
            state => {
                let name = state.name();
                self.state = state;
                return Err(Error::InvalidTransition {
                    operation: "generate a report",
                    state: name,
                });
            }
        };
        self.reset();
        report::generate(
            &completed.summary.file_path,
            completed.exercise,
            thresholds,
        )
    }
}
