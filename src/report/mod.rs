use crate::{
    error::Error,
    exercise::{AngleType, ExerciseType, Orientation},
    pose::BodyPart,
    recorder::{asymmetry_column, EXERCISE_COLUMN, TIMESTAMP_COLUMN},
};
use ordered_float::OrderedFloat;
use std::{
    cmp::Reverse,
    collections::BTreeMap,
    convert::TryFrom,
    fmt,
    path::{Path, PathBuf},
};
use tracing::debug;

pub(crate) mod classify;
pub(crate) mod stats;

pub(crate) use classify::{Severity, Thresholds};
pub(crate) use stats::Stat;

pub(crate) type AsymmetryStat = Stat<BodyPart>;
pub(crate) type AngleStat = Stat<AngleType>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AnalysisResult {
    Asymmetry(BTreeMap<BodyPart, AsymmetryStat>),
    Angle(BTreeMap<AngleType, AngleStat>),
}

/// The columns of a session record, read back as numbers.
struct Columns {
    path: PathBuf,
    index: BTreeMap<String, usize>,
    rows: Vec<Vec<f64>>,
}

impl Columns {
    fn read(path: &Path, exercise: ExerciseType) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| Error::ReadRecording(e, path.to_path_buf()))?;

        let headers = reader
            .headers()
            .map_err(|e| Error::ReadRecording(e, path.to_path_buf()))?
            .clone();
        if headers.is_empty() {
            return Err(Error::TooFewLines(path.to_path_buf(), 0));
        }
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_owned(), i))
            .collect::<BTreeMap<_, _>>();

        let column = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| Error::MissingColumn(path.to_path_buf(), name.to_owned()))
        };
        let timestamp_idx = column(TIMESTAMP_COLUMN)?;
        let exercise_idx = column(EXERCISE_COLUMN)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::ReadRecording(e, path.to_path_buf()))?;
            let line = record
                .position()
                .and_then(|position| usize::try_from(position.line()).ok())
                .unwrap_or_default();

            let timestamp = record.get(timestamp_idx).unwrap_or_default().trim();
            timestamp
                .parse::<i64>()
                .map_err(|source| Error::ParseTimestamp {
                    source,
                    path: path.to_path_buf(),
                    line,
                    value: timestamp.to_owned(),
                })?;

            let recorded_exercise = record.get(exercise_idx).unwrap_or_default().trim();
            if recorded_exercise != exercise.as_str() {
                return Err(Error::ExerciseMismatch(
                    path.to_path_buf(),
                    exercise,
                    recorded_exercise.to_owned(),
                ));
            }

            let cells = headers
                .iter()
                .zip(record.iter())
                .enumerate()
                .map(|(i, (name, value))| {
                    if i == timestamp_idx || i == exercise_idx {
                        return Ok(f64::NAN);
                    }
                    let value = value.trim();
                    value.parse::<f64>().map_err(|source| Error::ParseCell {
                        source,
                        path: path.to_path_buf(),
                        column: name.to_owned(),
                        line,
                        value: value.to_owned(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(cells);
        }

        if rows.is_empty() {
            return Err(Error::TooFewLines(path.to_path_buf(), 1));
        }

        Ok(Self {
            path: path.to_path_buf(),
            index,
            rows,
        })
    }

    fn values<'a>(&'a self, name: &str) -> Result<impl Iterator<Item = f64> + 'a, Error> {
        let idx = self
            .index
            .get(name)
            .copied()
            .ok_or_else(|| Error::MissingColumn(self.path.clone(), name.to_owned()))?;
        Ok(self
            .rows
            .iter()
            .map(move |row| row.get(idx).copied().unwrap_or(f64::NAN)))
    }
}

/// Read a session record and aggregate the columns that matter for
/// `exercise`.
pub(crate) fn parse<P>(path: P, exercise: ExerciseType) -> Result<AnalysisResult, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let columns = Columns::read(path, exercise)?;
    debug!(
        message = "read session record",
        path = ?path,
        rows = columns.rows.len()
    );

    match (exercise.orientation(), exercise.angle_type()) {
        (Orientation::Side, Some(angle_type)) => {
            let mut stats = BTreeMap::new();
            if let Some(stat) = Stat::describe(angle_type, columns.values(angle_type.column())?) {
                stats.insert(angle_type, stat);
            }
            Ok(AnalysisResult::Angle(stats))
        }
        _ => {
            let mut stats = BTreeMap::new();
            for &part in BodyPart::ALL.iter() {
                if let Some(stat) = Stat::describe(part, columns.values(&asymmetry_column(part))?) {
                    stats.insert(part, stat);
                }
            }
            Ok(AnalysisResult::Asymmetry(stats))
        }
    }
}

/// One statistic block with its quality tier.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassifiedStat {
    pub(crate) label: String,
    pub(crate) mean: f64,
    pub(crate) max: f64,
    pub(crate) min: f64,
    pub(crate) std_dev: f64,
    pub(crate) sample_count: usize,
    pub(crate) severity: Severity,
}

impl ClassifiedStat {
    fn new<K: fmt::Display>(stat: &Stat<K>, severity: Severity) -> Self {
        Self {
            label: stat.key.to_string(),
            mean: stat.mean,
            max: stat.max,
            min: stat.min,
            std_dev: stat.std_dev,
            sample_count: stat.sample_count,
            severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Report {
    pub(crate) exercise: ExerciseType,
    pub(crate) feedback: String,
    /// `None` when no metric could be measured at all.
    pub(crate) overall: Option<Severity>,
    pub(crate) blocks: Vec<ClassifiedStat>,
}

impl Report {
    pub(crate) fn classify(
        exercise: ExerciseType,
        result: &AnalysisResult,
        thresholds: &Thresholds,
    ) -> Self {
        let (feedback, overall, blocks) = match result {
            AnalysisResult::Asymmetry(stats) => asymmetry_report(stats, thresholds),
            AnalysisResult::Angle(stats) => angle_report(stats, thresholds),
        };
        Self {
            exercise,
            feedback,
            overall,
            blocks,
        }
    }
}

fn asymmetry_report(
    stats: &BTreeMap<BodyPart, AsymmetryStat>,
    thresholds: &Thresholds,
) -> (String, Option<Severity>, Vec<ClassifiedStat>) {
    let mut blocks = stats
        .values()
        .map(|stat| ClassifiedStat::new(stat, thresholds.body_part(stat.mean)))
        .collect::<Vec<_>>();
    blocks.sort_by_key(|block| (Reverse(block.severity), Reverse(OrderedFloat(block.mean))));

    let worst = stats
        .values()
        .max_by_key(|stat| OrderedFloat(stat.mean));
    let worst = match worst {
        Some(worst) => worst,
        None => {
            return (
                "No body part was visible long enough to measure symmetry.".to_owned(),
                None,
                blocks,
            )
        }
    };

    let overall = thresholds.session(worst.mean);
    let feedback = match overall {
        Severity::Excellent => format!(
            "Excellent symmetry: every body part stayed within {:.1}% of level.",
            worst.mean
        ),
        Severity::Good => format!(
            "Good symmetry. Keep an eye on your {} (mean offset {:.1}%).",
            worst.key, worst.mean
        ),
        Severity::NeedsWork => format!(
            "Noticeable asymmetry at the {} (mean offset {:.1}%). Focus on keeping both sides level.",
            worst.key, worst.mean
        ),
    };
    (feedback, Some(overall), blocks)
}

fn angle_report(
    stats: &BTreeMap<AngleType, AngleStat>,
    thresholds: &Thresholds,
) -> (String, Option<Severity>, Vec<ClassifiedStat>) {
    let mut feedback = Vec::new();
    let mut overall = None;
    let mut blocks = Vec::new();

    for stat in stats.values() {
        let severity = match stat.key {
            AngleType::Squat => thresholds.squat(stat.min, stat.max),
            AngleType::Plank => thresholds.plank(stat.mean),
        };
        feedback.push(angle_feedback(stat, severity));
        overall = overall.max(Some(severity));
        blocks.push(ClassifiedStat::new(stat, severity));
    }

    if feedback.is_empty() {
        feedback.push("The tracked joint was not visible long enough to measure.".to_owned());
    }
    (feedback.join(" "), overall, blocks)
}

fn angle_feedback(stat: &AngleStat, severity: Severity) -> String {
    match (stat.key, severity) {
        (AngleType::Squat, Severity::Excellent) => format!(
            "Excellent depth: your knee reached {:.0}\u{b0}.",
            stat.min
        ),
        (AngleType::Squat, Severity::Good) => format!(
            "Good squat. Your deepest knee angle was {:.0}\u{b0}; try sinking a little lower.",
            stat.min
        ),
        (AngleType::Squat, Severity::NeedsWork) => format!(
            "Shallow squat: your knee only reached {:.0}\u{b0}. Bend further at the hips and knees.",
            stat.min
        ),
        (AngleType::Plank, Severity::Excellent) => format!(
            "Excellent plank: your body held a {:.0}\u{b0} line on average.",
            stat.mean
        ),
        (AngleType::Plank, Severity::Good) => format!(
            "Good plank ({:.0}\u{b0} on average). Tighten your core to straighten the line.",
            stat.mean
        ),
        (AngleType::Plank, Severity::NeedsWork) => format!(
            "Your hips are sagging or piking ({:.0}\u{b0} on average). Aim for a straight line from shoulders to ankles.",
            stat.mean
        ),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} session report", self.exercise)?;
        match self.overall {
            Some(overall) => writeln!(f, "overall: {}", overall)?,
            None => writeln!(f, "overall: not measured")?,
        }
        writeln!(f, "{}", self.feedback)?;
        for block in &self.blocks {
            writeln!(
                f,
                "  {:<10} {:<10} mean {:>7.2}  max {:>7.2}  min {:>7.2}  sd {:>6.2}  n {}",
                block.label,
                block.severity.to_string(),
                block.mean,
                block.max,
                block.min,
                block.std_dev,
                block.sample_count
            )?;
        }
        Ok(())
    }
}

/// Parse `path` and classify it in one step.
pub(crate) fn generate<P>(
    path: P,
    exercise: ExerciseType,
    thresholds: &Thresholds,
) -> Result<Report, Error>
where
    P: AsRef<Path>,
{
    let result = parse(path, exercise)?;
    Ok(Report::classify(exercise, &result, thresholds))
}
