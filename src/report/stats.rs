/// Descriptive statistics over the non-`NaN` samples of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Stat<K> {
    pub(crate) key: K,
    pub(crate) mean: f64,
    pub(crate) max: f64,
    pub(crate) min: f64,
    pub(crate) std_dev: f64,
    pub(crate) sample_count: usize,
}

impl<K> Stat<K> {
    /// Describe `samples`, ignoring `NaN`s. Returns `None` when nothing is
    /// left, so that empty groups are omitted rather than zero-filled.
    pub(crate) fn describe<I>(key: K, samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values = samples
            .into_iter()
            .filter(|value| !value.is_nan())
            .collect::<Vec<_>>();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;

        let mean = values.iter().sum::<f64>() / n;
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        Some(Self {
            key,
            mean,
            max,
            min,
            std_dev: population_std_dev(&values, mean),
            sample_count: values.len(),
        })
    }
}

/// Square root of `mean((x - mean)^2)`; zero for fewer than two samples.
pub(crate) fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt()
}
