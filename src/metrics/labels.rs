use indexmap::IndexMap;

use super::types::{LabelRatio, ProfileItem};

/// Synthetic bucket holding everything outside the top N.
pub const OTHERS_LABEL: &str = "Others";

/// Label occurrence counts, in first-encountered order.
///
/// Every label on every item is counted, so the total can exceed the number
/// of items when items carry several labels. Ratios and the `Others` bucket
/// both use label occurrences as their base.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelCounts {
    counts: IndexMap<String, u64>,
}

/// Count every label on every item.
pub fn count_labels<'a, I>(label_lists: I) -> LabelCounts
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut counts: IndexMap<String, u64> = IndexMap::new();
    for labels in label_lists {
        for label in labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
    }
    LabelCounts { counts }
}

impl LabelCounts {
    /// Count for a label; absent labels count zero.
    pub fn get(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Total label occurrences.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct labels.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(label, count)| (label.as_str(), *count))
    }

    /// Labels by descending count. Ties keep first-encountered order.
    fn ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.iter().collect();
        // sort_by is stable, so equal counts stay in insertion order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// The `n` most frequent labels, descending. Ties keep first-encountered order.
    pub fn top_n(&self, n: usize) -> Vec<ProfileItem> {
        self.ranked()
            .into_iter()
            .take(n)
            .map(|(label, value)| ProfileItem {
                label: label.to_string(),
                value,
            })
            .collect()
    }

    /// Top `n` plus an `Others` bucket worth `total - sum(top n)`.
    /// The bucket counts always sum to `total()`. A real label named
    /// `Others` is never ranked; it is folded into the bucket.
    pub fn top_n_with_others(&self, n: usize) -> Vec<ProfileItem> {
        let mut items: Vec<ProfileItem> = self
            .ranked()
            .into_iter()
            .filter(|(label, _)| *label != OTHERS_LABEL)
            .take(n)
            .map(|(label, value)| ProfileItem {
                label: label.to_string(),
                value,
            })
            .collect();
        let top_sum: u64 = items.iter().map(|item| item.value).sum();
        items.push(ProfileItem {
            label: OTHERS_LABEL.to_string(),
            value: self.total() - top_sum,
        });
        items
    }

    /// Top `n` as percentages of total occurrences, plus `Others`.
    pub fn top_n_ratios(&self, n: usize, precision: u32) -> Vec<LabelRatio> {
        let total = self.total();
        self.top_n_with_others(n)
            .into_iter()
            .map(|item| LabelRatio {
                ratio: ratio(item.value, total, precision),
                label: item.label,
            })
            .collect()
    }

    /// Every label as a percentage of total occurrences, first-encountered order.
    pub fn ratios(&self, precision: u32) -> Vec<LabelRatio> {
        let total = self.total();
        self.counts
            .iter()
            .map(|(label, count)| LabelRatio {
                label: label.clone(),
                ratio: ratio(*count, total, precision),
            })
            .collect()
    }
}

/// `count / total * 100`, rounded to `precision` decimals; 0 when `total` is 0.
pub fn ratio(count: u64, total: u64, precision: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(count as f64 / total as f64 * 100.0, precision)
}

/// Round to `precision` decimals. Precisions too large to scale by are
/// returned unrounded.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(i32::MAX as u32) as i32);
    if !factor.is_finite() {
        return value;
    }
    (value * factor).round() / factor
}
