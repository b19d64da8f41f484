use anyhow::{anyhow, Context, Result};
use config::{SessionConfig, ThresholdOpts, VisibilityConfig};
use detector::{Backend, BackendKind, PixelBackend, TransposedBackend};
use exercise::ExerciseType;
use indicatif::{ProgressBar, ProgressStyle};
use session::{
    runner::{self, Control, Outcome},
    Session, Tick,
};
use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use structopt::StructOpt;
use summary::{JsonLinesStore, SessionSummary, SummaryStore};
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use visibility::VisibilityGate;

mod config;
mod detector;
mod error;
mod exercise;
mod metrics;
mod pose;
mod recorder;
mod report;
mod session;
mod summary;
mod visibility;

const DEFAULT_STORE: &str = "sessions.jsonl";

#[derive(structopt::StructOpt)]
enum Command {
    /// Run one timed session against a replayed detection stream and print
    /// its report.
    Record {
        #[structopt(short, long)]
        exercise: ExerciseType,

        /// JSON-lines file with one detection per line.
        #[structopt(short, long, parse(from_os_str))]
        detections: PathBuf,

        /// Coordinate convention of the detections: pixel or transposed.
        #[structopt(short, long, default_value = "pixel")]
        backend: BackendKind,

        /// Frame width in pixels, used to scale transposed detections.
        #[structopt(long, default_value = "640")]
        frame_width: f32,

        /// Frame height in pixels, used to scale transposed detections.
        #[structopt(long, default_value = "480")]
        frame_height: f32,

        /// Delay between replayed detections, in milliseconds.
        #[structopt(long, default_value = "33")]
        frame_interval_ms: u64,

        #[structopt(short, long, default_value = DEFAULT_STORE, parse(from_os_str))]
        store: PathBuf,

        #[structopt(flatten)]
        session: SessionConfig,

        #[structopt(flatten)]
        visibility: VisibilityConfig,

        #[structopt(flatten)]
        thresholds: ThresholdOpts,
    },
    /// Analyze an existing session record.
    Report {
        #[structopt(short, long)]
        exercise: ExerciseType,

        #[structopt(parse(from_os_str))]
        path: PathBuf,

        #[structopt(flatten)]
        thresholds: ThresholdOpts,
    },
    /// List stored session summaries, oldest first.
    History {
        #[structopt(short, long, default_value = DEFAULT_STORE, parse(from_os_str))]
        store: PathBuf,
    },
}

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    #[structopt(subcommand)]
    command: Command,
}

fn show_tick(progress: &ProgressBar, tick: &Tick) {
    match tick {
        Tick::Countdown { remaining } => {
            progress.set_prefix("countdown");
            progress.set_message(format!("starting in {}", remaining));
        }
        Tick::RecordingStarted { path, .. } => {
            progress.set_prefix("recording");
            progress.set_message(format!("writing {}", path.display()));
        }
        Tick::Recording { remaining } => progress.set_message(format!("{} left", remaining)),
        Tick::UserLost { grace } => progress.set_message(format!(
            "lost you, stopping in {:.1}s",
            grace.as_secs_f64()
        )),
        Tick::AwaitingGrace => {}
        Tick::PoseNotDetected => progress.set_message("could not detect pose"),
        Tick::Completed(_) => progress.set_message("done"),
    }
    progress.tick();
}

fn format_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |value| format!("{:.2}", value))
}

fn print_summary(summary: &SessionSummary) {
    println!(
        "{:>15}  {:<10}  asym avg {:>6}  max {:>6}  angle avg {:>6}  max {:>6}  {}",
        summary.timestamp,
        summary.exercise_type,
        format_metric(summary.avg_asymmetry),
        format_metric(summary.max_asymmetry),
        format_metric(summary.avg_angle),
        format_metric(summary.max_angle),
        summary.file_path.display()
    );
}

#[allow(clippy::too_many_arguments)]
fn record(
    exercise: ExerciseType,
    detections: &Path,
    backend: BackendKind,
    frame_width: f32,
    frame_height: f32,
    frame_interval: Duration,
    store: &Path,
    session_config: SessionConfig,
    visibility: VisibilityConfig,
    thresholds: &ThresholdOpts,
) -> Result<()> {
    let gate = VisibilityGate::new(&visibility);
    let backend: Box<dyn Backend> = match backend {
        BackendKind::Pixel => Box::new(PixelBackend::new(gate)),
        BackendKind::Transposed => Box::new(
            TransposedBackend::new(gate, frame_width, frame_height)
                .context("failed constructing transposed backend")?,
        ),
    };
    let backend = &*backend;

    let detections = detector::read_detections(detections)
        .with_context(|| format!("failed reading detections from {}", detections.display()))?;
    info!(
        message = "replaying detections",
        backend = backend.name(),
        count = detections.len()
    );

    let (control_tx, control_rx) = crossbeam::channel::bounded(1);
    ctrlc::set_handler(move || {
        // a full channel means a request is already pending
        let _ = control_tx.try_send(Control::Cancel);
    })
    .context("failed setting Ctrl-C handler")?;

    let progress = ProgressBar::new_spinner().with_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{prefix:.bold.dim} {spinner} {wide_msg}"),
    );

    let thresholds = thresholds.thresholds();
    let mut session = Session::new(
        backend,
        JsonLinesStore::new(store),
        session_config,
        visibility.min_scale,
    );
    let running = AtomicBool::new(true);
    let (events_tx, events_rx) = crossbeam::channel::unbounded();

    let outcome = crossbeam::thread::scope(|scope| {
        let running_replay = &running;
        let detections = &detections;
        scope.spawn(move |_| {
            let sent = detector::replay(
                backend,
                detections,
                frame_interval,
                running_replay,
                &events_tx,
            );
            debug!(message = "replay finished", sent);
        });

        let outcome = runner::run(
            &mut session,
            exercise,
            &events_rx,
            &control_rx,
            &thresholds,
            |tick| show_tick(&progress, tick),
        );
        running.store(false, Ordering::SeqCst);
        drop(events_rx);
        outcome
    })
    .map_err(|_| anyhow!("detector thread panicked"))?
    .context("session failed")?;

    match outcome {
        Outcome::PoseNotDetected => {
            progress.finish_with_message("could not detect pose");
            println!("Could not detect a pose. Step fully into the frame and try again.");
        }
        Outcome::Cancelled => {
            progress.finish_with_message("cancelled");
        }
        Outcome::Completed { summary, report } => {
            progress.finish_and_clear();
            let stored = session
                .store()
                .list()
                .context("failed listing stored sessions")?
                .len();
            info!(
                message = "session stored",
                path = ?summary.file_path,
                stored
            );
            match report {
                Ok(report) => print!("{}", report),
                Err(e) => {
                    warn!(message = "report failed", error = %e);
                    return Err(e).context("failed generating report");
                }
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(opt.log_level),
    )?;

    match opt.command {
        Command::Record {
            exercise,
            detections,
            backend,
            frame_width,
            frame_height,
            frame_interval_ms,
            store,
            session,
            visibility,
            thresholds,
        } => record(
            exercise,
            &detections,
            backend,
            frame_width,
            frame_height,
            Duration::from_millis(frame_interval_ms),
            &store,
            session,
            visibility,
            &thresholds,
        ),
        Command::Report {
            exercise,
            path,
            thresholds,
        } => {
            let report = report::generate(&path, exercise, &thresholds.thresholds())
                .with_context(|| format!("failed analyzing {}", path.display()))?;
            print!("{}", report);
            Ok(())
        }
        Command::History { store } => {
            let summaries = JsonLinesStore::new(&store)
                .list()
                .with_context(|| format!("failed reading {}", store.display()))?;
            if summaries.is_empty() {
                println!("no sessions recorded");
            }
            for summary in &summaries {
                print_summary(summary);
            }
            Ok(())
        }
    }
}
