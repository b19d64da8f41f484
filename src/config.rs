//! Tunables for the session protocol, the visibility gate and report
//! classification.
//!
//! Every default lives in a `DEFAULT_*` string constant so the command line
//! and the `Default` impls cannot drift apart.

use crate::report::Thresholds;
use std::{path::PathBuf, time::Duration};

const DEFAULT_COUNTDOWN_TICKS: &str = "10";
const DEFAULT_RECORDING_TICKS: &str = "20";
const DEFAULT_TICK_MS: &str = "1000";
const DEFAULT_GRACE_MS: &str = "2000";
const DEFAULT_OUTPUT_DIR: &str = "recordings";

const DEFAULT_USABLE_CONFIDENCE: &str = "0.5";
const DEFAULT_METRIC_CONFIDENCE: &str = "0.7";
const DEFAULT_MIN_SCALE: &str = "10.0";

#[derive(Debug, Clone, structopt::StructOpt)]
pub(crate) struct SessionConfig {
    /// Number of one-tick countdown steps before recording starts.
    #[structopt(long, default_value = DEFAULT_COUNTDOWN_TICKS)]
    pub(crate) countdown_ticks: u32,

    /// Number of ticks to record for.
    #[structopt(long, default_value = DEFAULT_RECORDING_TICKS)]
    pub(crate) recording_ticks: u32,

    /// Length of one tick, in milliseconds.
    #[structopt(long, default_value = DEFAULT_TICK_MS)]
    pub(crate) tick_ms: u64,

    /// How long to keep recording after the user leaves the frame, in
    /// milliseconds.
    #[structopt(long, default_value = DEFAULT_GRACE_MS)]
    pub(crate) grace_ms: u64,

    /// Directory that session records are written to.
    #[structopt(long, default_value = DEFAULT_OUTPUT_DIR, parse(from_os_str))]
    pub(crate) output_dir: PathBuf,
}

impl SessionConfig {
    pub(crate) fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub(crate) fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: DEFAULT_COUNTDOWN_TICKS.parse().unwrap(),
            recording_ticks: DEFAULT_RECORDING_TICKS.parse().unwrap(),
            tick_ms: DEFAULT_TICK_MS.parse().unwrap(),
            grace_ms: DEFAULT_GRACE_MS.parse().unwrap(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

#[derive(Debug, Clone, Copy, structopt::StructOpt)]
pub(crate) struct VisibilityConfig {
    /// Confidence a keypoint must exceed to count towards pose usability.
    #[structopt(long, default_value = DEFAULT_USABLE_CONFIDENCE)]
    pub(crate) usable_confidence: f32,

    /// Confidence a keypoint must exceed before any metric is computed from
    /// it.
    #[structopt(long, default_value = DEFAULT_METRIC_CONFIDENCE)]
    pub(crate) metric_confidence: f32,

    /// Smallest shoulder-to-hip distance, in pixels, accepted as a
    /// normalization scale.
    #[structopt(long, default_value = DEFAULT_MIN_SCALE)]
    pub(crate) min_scale: f32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            usable_confidence: DEFAULT_USABLE_CONFIDENCE.parse().unwrap(),
            metric_confidence: DEFAULT_METRIC_CONFIDENCE.parse().unwrap(),
            min_scale: DEFAULT_MIN_SCALE.parse().unwrap(),
        }
    }
}

/// Overrides for the report's cut points. Anything left unset keeps its
/// default.
#[derive(Debug, Clone, Copy, Default, structopt::StructOpt)]
pub(crate) struct ThresholdOpts {
    /// Use the wider 5%/10% asymmetry cut points.
    #[structopt(long)]
    pub(crate) alternate_asymmetry_cuts: bool,

    #[structopt(long)]
    pub(crate) asymmetry_excellent_pct: Option<f64>,
    #[structopt(long)]
    pub(crate) asymmetry_good_pct: Option<f64>,
    #[structopt(long)]
    pub(crate) session_asymmetry_excellent_pct: Option<f64>,
    #[structopt(long)]
    pub(crate) session_asymmetry_good_pct: Option<f64>,
    #[structopt(long)]
    pub(crate) plank_excellent_deg: Option<f64>,
    #[structopt(long)]
    pub(crate) plank_good_deg: Option<f64>,
    #[structopt(long)]
    pub(crate) squat_excellent_min_deg: Option<f64>,
    #[structopt(long)]
    pub(crate) squat_excellent_max_deg: Option<f64>,
    #[structopt(long)]
    pub(crate) squat_good_min_deg: Option<f64>,
    #[structopt(long)]
    pub(crate) squat_good_max_deg: Option<f64>,
}

impl ThresholdOpts {
    pub(crate) fn thresholds(&self) -> Thresholds {
        let base = if self.alternate_asymmetry_cuts {
            Thresholds::default().with_alternate_asymmetry_cuts()
        } else {
            Thresholds::default()
        };
        Thresholds {
            asymmetry_excellent_pct: self
                .asymmetry_excellent_pct
                .unwrap_or(base.asymmetry_excellent_pct),
            asymmetry_good_pct: self.asymmetry_good_pct.unwrap_or(base.asymmetry_good_pct),
            session_asymmetry_excellent_pct: self
                .session_asymmetry_excellent_pct
                .unwrap_or(base.session_asymmetry_excellent_pct),
            session_asymmetry_good_pct: self
                .session_asymmetry_good_pct
                .unwrap_or(base.session_asymmetry_good_pct),
            plank_excellent_deg: self.plank_excellent_deg.unwrap_or(base.plank_excellent_deg),
            plank_good_deg: self.plank_good_deg.unwrap_or(base.plank_good_deg),
            squat_excellent_min_deg: self
                .squat_excellent_min_deg
                .unwrap_or(base.squat_excellent_min_deg),
            squat_excellent_max_deg: self
                .squat_excellent_max_deg
                .unwrap_or(base.squat_excellent_max_deg),
            squat_good_min_deg: self.squat_good_min_deg.unwrap_or(base.squat_good_min_deg),
            squat_good_max_deg: self.squat_good_max_deg.unwrap_or(base.squat_good_max_deg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionConfig, ThresholdOpts, VisibilityConfig};
    use crate::report::Thresholds;
    use std::time::Duration;
    use structopt::StructOpt;

    #[test]
    fn defaults_match_protocol() {
        let config = SessionConfig::default();
        assert_eq!(config.countdown_ticks, 10);
        assert_eq!(config.recording_ticks, 20);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.grace_period(), Duration::from_secs(2));
    }

    #[test]
    fn command_line_overrides_defaults() {
        let config =
            SessionConfig::from_iter(&["session", "--recording-ticks", "5", "--tick-ms", "10"]);
        assert_eq!(config.recording_ticks, 5);
        assert_eq!(config.tick_ms, 10);
        assert_eq!(config.countdown_ticks, 10);
    }

    #[test]
    fn metric_gate_is_stricter_than_usability_gate() {
        let config = VisibilityConfig::default();
        assert!(config.metric_confidence > config.usable_confidence);
    }

    mod threshold_opts_tests {
        use super::*;

        #[test]
        fn nothing_set_is_default() {
            assert_eq!(ThresholdOpts::default().thresholds(), Thresholds::default());
        }

        #[test]
        fn overrides_apply_on_top_of_alternate_cuts() {
            let opts = ThresholdOpts::from_iter(&[
                "report",
                "--alternate-asymmetry-cuts",
                "--asymmetry-good-pct",
                "12.5",
                "--plank-good-deg",
                "150",
            ]);
            let thresholds = opts.thresholds();
            assert_eq!(thresholds.asymmetry_excellent_pct, 5.0);
            assert_eq!(thresholds.asymmetry_good_pct, 12.5);
            assert_eq!(thresholds.session_asymmetry_good_pct, 10.0);
            assert_eq!(thresholds.plank_good_deg, 150.0);
        }
    }
}
