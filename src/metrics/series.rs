use std::collections::BTreeMap;

use serde::Serialize;

/// A labelled numeric series: `values[i]` belongs to `labels[i]`.
/// Labels are day keys (`YYYY-MM-DD`) or sprint names, unique within a series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, value: f64) {
        self.labels.push(label.into());
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.values[i])
    }

    /// Unweighted mean of the values; 0 for an empty series.
    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

impl FromIterator<(String, f64)> for Series {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        let mut series = Series::new();
        for (label, value) in iter {
            series.push(label, value);
        }
        series
    }
}

/// Arithmetic mean; 0 when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pointwise average across repositories.
///
/// Labels are the sorted union of every input's labels. Each label's value is
/// the mean over only the series that contain that label; a repository with
/// no value for a label is skipped, not counted as zero.
pub fn cross_repo_average<'a, I>(series: I) -> Series
where
    I: IntoIterator<Item = &'a Series>,
{
    let mut buckets: BTreeMap<&'a str, (f64, usize)> = BTreeMap::new();
    for s in series {
        for (label, value) in s.labels.iter().zip(s.values.iter()) {
            let bucket = buckets.entry(label.as_str()).or_insert((0.0, 0));
            bucket.0 += value;
            bucket.1 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(label, (sum, count))| (label.to_string(), sum / count as f64))
        .collect()
}
