use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::PullRequest;

const MS_PER_MINUTE: i64 = 60 * 1000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Display value for a phase whose endpoints are not both known.
pub const NOT_AVAILABLE: &str = "N/A";

/// Milliseconds from `start` to `end`, only when both are present.
/// Out-of-order timestamps give a negative duration, not an error.
fn span_ms(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<i64> {
    Some((end? - start?).num_milliseconds())
}

/// The four phases of a pull request, in milliseconds.
/// `None` marks a phase with a missing endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDurations {
    pub coding: Option<i64>,
    pub pick_up: Option<i64>,
    pub review: Option<i64>,
    pub deploy: Option<i64>,
}

impl PhaseDurations {
    /// Sum of the phases with missing phases counted as zero.
    pub fn sum_ms(&self) -> i64 {
        [self.coding, self.pick_up, self.review, self.deploy]
            .iter()
            .map(|phase| phase.unwrap_or(0))
            .sum()
    }
}

/// Phase durations as used for aggregate sums (pick-up measured from first commit).
pub fn phase_durations(pr: &PullRequest) -> PhaseDurations {
    PhaseDurations {
        coding: coding_time(pr),
        pick_up: pick_up_from_commit(pr),
        review: review_time(pr),
        deploy: deploy_time(pr),
    }
}

/// mergedAt - firstCommitAt
pub fn coding_time(pr: &PullRequest) -> Option<i64> {
    span_ms(pr.first_commit_at, pr.merged_at)
}

/// firstReviewAt - firstCommitAt
pub fn pick_up_from_commit(pr: &PullRequest) -> Option<i64> {
    span_ms(pr.first_commit_at, pr.first_review_at)
}

/// firstReviewAt - prSubmittedAt; the waiting time shown in per-PR listings.
pub fn pick_up_from_submission(pr: &PullRequest) -> Option<i64> {
    span_ms(pr.pr_submitted_at, pr.first_review_at)
}

/// allApprovedAt - firstReviewAt
pub fn review_time(pr: &PullRequest) -> Option<i64> {
    span_ms(pr.first_review_at, pr.all_approved_at)
}

/// mergedAt - allApprovedAt
pub fn deploy_time(pr: &PullRequest) -> Option<i64> {
    span_ms(pr.all_approved_at, pr.merged_at)
}

/// Cycle time of a single pull request: mergedAt - firstCommitAt.
pub fn cycle_time(pr: &PullRequest) -> Option<i64> {
    span_ms(pr.first_commit_at, pr.merged_at)
}

/// Phase totals over a set of pull requests; missing phases add zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTotals {
    pub coding_ms: i64,
    pub pick_up_ms: i64,
    pub review_ms: i64,
    pub deploy_ms: i64,
    pub pr_count: usize,
}

impl PhaseTotals {
    pub fn from_pull_requests<'a, I>(prs: I) -> Self
    where
        I: IntoIterator<Item = &'a PullRequest>,
    {
        let mut totals = PhaseTotals::default();
        for pr in prs {
            let phases = phase_durations(pr);
            totals.coding_ms += phases.coding.unwrap_or(0);
            totals.pick_up_ms += phases.pick_up.unwrap_or(0);
            totals.review_ms += phases.review.unwrap_or(0);
            totals.deploy_ms += phases.deploy.unwrap_or(0);
            totals.pr_count += 1;
        }
        totals
    }

    fn average(&self, total_ms: i64) -> i64 {
        if self.pr_count == 0 {
            return 0;
        }
        total_ms / self.pr_count as i64
    }

    pub fn average_coding_ms(&self) -> i64 {
        self.average(self.coding_ms)
    }

    pub fn average_pick_up_ms(&self) -> i64 {
        self.average(self.pick_up_ms)
    }

    pub fn average_review_ms(&self) -> i64 {
        self.average(self.review_ms)
    }

    pub fn average_deploy_ms(&self) -> i64 {
        self.average(self.deploy_ms)
    }

    /// Aggregate cycle time: sum of all four phase totals over the PR count.
    pub fn average_cycle_time_ms(&self) -> i64 {
        self.average(self.coding_ms + self.pick_up_ms + self.review_ms + self.deploy_ms)
    }
}

/// Human-readable duration: `"{d}d {h}h"`, `"{h} hour"`, or `"{m} min"`.
/// Negative durations display as `"0 min"`.
pub fn format_duration(ms: i64) -> String {
    let ms = ms.max(0);
    let days = ms / MS_PER_DAY;
    let hours = (ms % MS_PER_DAY) / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours} hour")
    } else {
        format!("{minutes} min")
    }
}

/// Like [`format_duration`], with `"N/A"` for a missing phase.
pub fn format_phase(ms: Option<i64>) -> String {
    match ms {
        Some(ms) => format_duration(ms),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn ms_to_hours(ms: i64) -> f64 {
    ms as f64 / MS_PER_HOUR as f64
}
