use super::{Session, Tick};
use crate::{
    detector::{Backend, DetectionEvent},
    error::Error,
    exercise::ExerciseType,
    report::{Report, Thresholds},
    summary::{SessionSummary, SummaryStore},
};
use crossbeam::channel::{after, never, select, tick, Receiver};
use tracing::{debug, info};

/// Requests from the user while a session is running.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Control {
    /// Cancel the countdown, or stop the recording early.
    Cancel,
}

#[derive(Debug)]
pub(crate) enum Outcome {
    /// The countdown ended without a usable pose.
    PoseNotDetected,
    /// The countdown was cancelled. Nothing was recorded.
    Cancelled,
    /// Recording finished and was analyzed. The report is kept separate from
    /// the summary since the summary is already stored when analysis runs.
    Completed {
        summary: SessionSummary,
        report: Result<Report, Error>,
    },
}

/// Run one session for `exercise` to completion.
///
/// Detection events are applied as they arrive, the session clock advances
/// once per configured tick, and a lost user stops the recording once the
/// grace period has passed. `observer` sees every tick result.
pub(crate) fn run<B, S, F>(
    session: &mut Session<'_, B, S>,
    exercise: ExerciseType,
    events: &Receiver<DetectionEvent>,
    control: &Receiver<Control>,
    thresholds: &Thresholds,
    mut observer: F,
) -> Result<Outcome, Error>
where
    B: Backend + ?Sized,
    S: SummaryStore,
    F: FnMut(&Tick),
{
    session.start(exercise)?;

    let ticker = tick(session.config().tick_interval());
    let mut events = events.clone();
    let mut control = control.clone();
    let mut grace = never();

    let summary = loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => session.on_detection(event)?,
                Err(_) => {
                    debug!(message = "detection stream ended", state = session.state_name());
                    events = never();
                }
            },
            recv(ticker) -> _ => {
                let result = session.tick()?;
                observer(&result);
                match result {
                    Tick::PoseNotDetected => return Ok(Outcome::PoseNotDetected),
                    Tick::UserLost { grace: period } => grace = after(period),
                    Tick::Completed(summary) => break summary,
                    _ => {}
                }
            },
            recv(grace) -> _ => {
                info!(message = "grace period elapsed, stopping recording");
                break session.stop()?;
            },
            recv(control) -> request => match request {
                Ok(Control::Cancel) if session.is_counting_down() => {
                    session.cancel()?;
                    return Ok(Outcome::Cancelled);
                }
                Ok(Control::Cancel) => {
                    info!(message = "stopping recording at user request");
                    break session.stop()?;
                }
                Err(_) => control = never(),
            },
        }
    };

    let report = session.generate_report(thresholds);
    Ok(Outcome::Completed { summary, report })
}
