//! Rule-based quality tiers.
//!
//! Every cut point is a named constant. The 5%/10% asymmetry pair is an
//! alternative to the default 2%/5% and is only used when asked for.

use std::fmt;

pub(crate) const ASYMMETRY_EXCELLENT_PCT: f64 = 2.0;
pub(crate) const ASYMMETRY_GOOD_PCT: f64 = 5.0;

pub(crate) const SESSION_ASYMMETRY_EXCELLENT_PCT: f64 = 2.0;
pub(crate) const SESSION_ASYMMETRY_GOOD_PCT: f64 = 5.0;

pub(crate) const ALTERNATE_ASYMMETRY_EXCELLENT_PCT: f64 = 5.0;
pub(crate) const ALTERNATE_ASYMMETRY_GOOD_PCT: f64 = 10.0;

pub(crate) const PLANK_EXCELLENT_DEG: f64 = 170.0;
pub(crate) const PLANK_GOOD_DEG: f64 = 160.0;

pub(crate) const SQUAT_EXCELLENT_MIN_DEG: f64 = 60.0;
pub(crate) const SQUAT_EXCELLENT_MAX_DEG: f64 = 190.0;
pub(crate) const SQUAT_GOOD_MIN_DEG: f64 = 90.0;
pub(crate) const SQUAT_GOOD_MAX_DEG: f64 = 160.0;

/// Quality tier. Ordered from least to most severe.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Severity {
    Excellent,
    Good,
    NeedsWork,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::NeedsWork => "needs work",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Thresholds {
    pub(crate) asymmetry_excellent_pct: f64,
    pub(crate) asymmetry_good_pct: f64,
    pub(crate) session_asymmetry_excellent_pct: f64,
    pub(crate) session_asymmetry_good_pct: f64,
    pub(crate) plank_excellent_deg: f64,
    pub(crate) plank_good_deg: f64,
    pub(crate) squat_excellent_min_deg: f64,
    pub(crate) squat_excellent_max_deg: f64,
    pub(crate) squat_good_min_deg: f64,
    pub(crate) squat_good_max_deg: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            asymmetry_excellent_pct: ASYMMETRY_EXCELLENT_PCT,
            asymmetry_good_pct: ASYMMETRY_GOOD_PCT,
            session_asymmetry_excellent_pct: SESSION_ASYMMETRY_EXCELLENT_PCT,
            session_asymmetry_good_pct: SESSION_ASYMMETRY_GOOD_PCT,
            plank_excellent_deg: PLANK_EXCELLENT_DEG,
            plank_good_deg: PLANK_GOOD_DEG,
            squat_excellent_min_deg: SQUAT_EXCELLENT_MIN_DEG,
            squat_excellent_max_deg: SQUAT_EXCELLENT_MAX_DEG,
            squat_good_min_deg: SQUAT_GOOD_MIN_DEG,
            squat_good_max_deg: SQUAT_GOOD_MAX_DEG,
        }
    }
}

impl Thresholds {
    /// Apply the 5%/10% asymmetry cut points to both body-part and session
    /// classification.
    pub(crate) fn with_alternate_asymmetry_cuts(self) -> Self {
        Self {
            asymmetry_excellent_pct: ALTERNATE_ASYMMETRY_EXCELLENT_PCT,
            asymmetry_good_pct: ALTERNATE_ASYMMETRY_GOOD_PCT,
            session_asymmetry_excellent_pct: ALTERNATE_ASYMMETRY_EXCELLENT_PCT,
            session_asymmetry_good_pct: ALTERNATE_ASYMMETRY_GOOD_PCT,
            ..self
        }
    }

    /// Tier for one body part, from its mean asymmetry.
    pub(crate) fn body_part(&self, mean_pct: f64) -> Severity {
        below(
            mean_pct,
            self.asymmetry_excellent_pct,
            self.asymmetry_good_pct,
        )
    }

    /// Tier for a whole session, from the largest per-part mean asymmetry.
    pub(crate) fn session(&self, worst_mean_pct: f64) -> Severity {
        below(
            worst_mean_pct,
            self.session_asymmetry_excellent_pct,
            self.session_asymmetry_good_pct,
        )
    }

    /// Tier for a plank, from the mean hip angle.
    pub(crate) fn plank(&self, mean_deg: f64) -> Severity {
        if mean_deg >= self.plank_excellent_deg {
            Severity::Excellent
        } else if mean_deg >= self.plank_good_deg {
            Severity::Good
        } else {
            Severity::NeedsWork
        }
    }

    /// Tier for a side squat, from the knee's range of motion.
    pub(crate) fn squat(&self, min_deg: f64, max_deg: f64) -> Severity {
        if min_deg < self.squat_excellent_min_deg || max_deg > self.squat_excellent_max_deg {
            Severity::Excellent
        } else if min_deg <= self.squat_good_min_deg || max_deg >= self.squat_good_max_deg {
            Severity::Good
        } else {
            Severity::NeedsWork
        }
    }
}

fn below(value: f64, excellent: f64, good: f64) -> Severity {
    if value < excellent {
        Severity::Excellent
    } else if value < good {
        Severity::Good
    } else {
        Severity::NeedsWork
    }
}

#[cfg(test)]
mod tests {
    use super::{Severity, Thresholds};

    #[test]
    fn severity_orders_by_how_bad() {
        assert!(Severity::NeedsWork > Severity::Good);
        assert!(Severity::Good > Severity::Excellent);
    }

    mod body_part_tests {
        use super::{Severity, Thresholds};

        #[test]
        fn cut_points_are_exclusive() {
            let t = Thresholds::default();
            assert_eq!(t.body_part(1.99), Severity::Excellent);
            assert_eq!(t.body_part(2.0), Severity::Good);
            assert_eq!(t.body_part(4.99), Severity::Good);
            assert_eq!(t.body_part(5.0), Severity::NeedsWork);
        }

        #[test]
        fn alternate_cuts_are_wider() {
            let t = Thresholds::default().with_alternate_asymmetry_cuts();
            assert_eq!(t.body_part(4.0), Severity::Excellent);
            assert_eq!(t.session(9.0), Severity::Good);
            assert_eq!(t.session(10.0), Severity::NeedsWork);
            assert_eq!(t.plank_good_deg, Thresholds::default().plank_good_deg);
        }
    }

    mod plank_tests {
        use super::{Severity, Thresholds};

        #[test]
        fn tiers() {
            let t = Thresholds::default();
            assert_eq!(t.plank(175.0), Severity::Excellent);
            assert_eq!(t.plank(170.0), Severity::Excellent);
            assert_eq!(t.plank(165.0), Severity::Good);
            assert_eq!(t.plank(159.9), Severity::NeedsWork);
        }
    }

    mod squat_tests {
        use super::{Severity, Thresholds};

        #[test]
        fn deep_squat_is_excellent() {
            assert_eq!(Thresholds::default().squat(55.0, 150.0), Severity::Excellent);
        }

        #[test]
        fn parallel_squat_is_good() {
            assert_eq!(Thresholds::default().squat(90.0, 150.0), Severity::Good);
        }

        #[test]
        fn tall_stance_alone_is_good() {
            assert_eq!(Thresholds::default().squat(120.0, 170.0), Severity::Good);
        }

        #[test]
        fn shallow_squat_needs_work() {
            assert_eq!(Thresholds::default().squat(120.0, 150.0), Severity::NeedsWork);
        }
    }
}
