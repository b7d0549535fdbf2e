//! DORA reducers: one per-repository series per metric, then a cross-repository
//! `"average"` entry built by [`cross_repo_average`].

use std::collections::BTreeMap;

use indexmap::IndexMap;

use super::lifecycle::{cycle_time, ms_to_hours};
use super::series::{cross_repo_average, Series};
use super::types::{ChartData, Dataset, DoraMetrics, MetricReport};
use crate::date_util::{all_dates_between, day_key, day_key_of, DateRange};
use crate::model::{DailyStats, Project, PullRequest};

/// Key of the synthetic cross-repository entry in every report.
pub const AVERAGE_KEY: &str = "average";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    CycleTime,
    DeployFrequency,
    Mttr,
    ChangeFailureRate,
}

impl MetricKind {
    pub fn title(&self) -> &'static str {
        match self {
            MetricKind::CycleTime => "cycle time",
            MetricKind::DeployFrequency => "deploy frequency",
            MetricKind::Mttr => "recovery time",
            MetricKind::ChangeFailureRate => "change failure rate",
        }
    }

    fn repo_label(&self, repo_name: &str) -> String {
        format!("{repo_name} {}", self.title())
    }

    fn average_label(&self) -> String {
        format!("Average {}", self.title())
    }
}

/// Repository id to project lookup, built once per request and passed to
/// each reducer. Iteration follows the order of the project list.
pub struct RepoIndex<'a> {
    projects: IndexMap<&'a str, &'a Project>,
}

impl<'a> RepoIndex<'a> {
    pub fn new(projects: &'a [Project]) -> Self {
        let projects = projects.iter().map(|p| (p.id.as_str(), p)).collect();
        Self { projects }
    }

    pub fn contains(&self, repo_id: &str) -> bool {
        self.projects.contains_key(repo_id)
    }

    /// Display name for a repository; the id itself when unknown.
    pub fn name<'b>(&self, repo_id: &'b str) -> &'b str
    where
        'a: 'b,
    {
        self.projects
            .get(repo_id)
            .copied()
            .map(Project::display_name)
            .unwrap_or(repo_id)
    }

    pub fn projects(&self) -> impl Iterator<Item = &'a Project> + '_ {
        self.projects.values().copied()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

type DayBuckets = BTreeMap<String, Vec<f64>>;

/// Group day buckets per repository into per-day mean series, keeping the
/// repository order of the index and dropping repositories with no buckets.
fn mean_series_by_repo(
    index: &RepoIndex<'_>,
    mut buckets: IndexMap<String, DayBuckets>,
) -> IndexMap<String, Series> {
    let mut out = IndexMap::new();
    for project in index.projects() {
        let Some(days) = buckets.shift_remove(&project.id) else {
            continue;
        };
        let series: Series = days
            .into_iter()
            .map(|(day, values)| {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                (day, mean)
            })
            .collect();
        out.insert(project.id.clone(), series);
    }
    out
}

/// Mean cycle time in hours per merge day, per repository.
///
/// Only pull requests with both `first_commit_at` and `merged_at` count, and
/// only when the merge day lies inside the range.
pub fn cycle_time_by_repo(
    index: &RepoIndex<'_>,
    pull_requests: &[PullRequest],
    range: &DateRange,
) -> IndexMap<String, Series> {
    let mut buckets: IndexMap<String, DayBuckets> = IndexMap::new();
    for pr in pull_requests {
        if !index.contains(&pr.repository_id) {
            continue;
        }
        let (Some(merged_at), Some(ms)) = (pr.merged_at, cycle_time(pr)) else {
            continue;
        };
        if !range.contains(&merged_at) {
            continue;
        }
        buckets
            .entry(pr.repository_id.clone())
            .or_default()
            .entry(day_key_of(&merged_at))
            .or_default()
            .push(ms_to_hours(ms));
    }
    mean_series_by_repo(index, buckets)
}

/// Deployments per day over every day of the range, zero-filled.
/// Repositories with no deployment inside the range are left out.
pub fn deploy_frequency_by_repo(
    index: &RepoIndex<'_>,
    range: &DateRange,
) -> IndexMap<String, Series> {
    let all_days = all_dates_between(range.start, range.end);
    let mut out = IndexMap::new();

    for project in index.projects() {
        let mut per_day: BTreeMap<String, u64> = BTreeMap::new();
        for deployment in &project.daily_deployments {
            if range.contains_day(deployment.date) {
                *per_day.entry(day_key(deployment.date)).or_insert(0) += deployment.count;
            }
        }
        if per_day.is_empty() {
            continue;
        }
        let series: Series = all_days
            .iter()
            .map(|day| (day.clone(), per_day.get(day).copied().unwrap_or(0) as f64))
            .collect();
        out.insert(project.id.clone(), series);
    }
    out
}

/// Mean bug fix minutes per day, from rows with `bug_fix_time > 0`.
pub fn mttr_by_repo(
    index: &RepoIndex<'_>,
    stats: &[DailyStats],
    range: &DateRange,
) -> IndexMap<String, Series> {
    let mut buckets: IndexMap<String, DayBuckets> = IndexMap::new();
    for row in stats {
        if row.bug_fix_time <= 0.0
            || !range.contains_day(row.date)
            || !index.contains(&row.repository_id)
        {
            continue;
        }
        buckets
            .entry(row.repository_id.clone())
            .or_default()
            .entry(day_key(row.date))
            .or_default()
            .push(row.bug_fix_time);
    }
    mean_series_by_repo(index, buckets)
}

/// Running change failure rate per repository.
///
/// Days with daily-stats rows are walked in ascending order. Each row adds a
/// deployment and each row with `bug_fix_time > 0` adds a failure; the value
/// for a day is `cumulative failures / cumulative deployments * 100`.
/// Every repository in the index gets an entry, possibly empty.
pub fn cfr_by_repo(
    index: &RepoIndex<'_>,
    stats: &[DailyStats],
    range: &DateRange,
) -> IndexMap<String, Series> {
    let mut days_by_repo: IndexMap<&str, BTreeMap<String, (u64, u64)>> = index
        .projects()
        .map(|p| (p.id.as_str(), BTreeMap::new()))
        .collect();

    for row in stats {
        if !range.contains_day(row.date) {
            continue;
        }
        let Some(days) = days_by_repo.get_mut(row.repository_id.as_str()) else {
            continue;
        };
        let day = days.entry(day_key(row.date)).or_insert((0, 0));
        day.0 += 1;
        if row.bug_fix_time > 0.0 {
            day.1 += 1;
        }
    }

    days_by_repo
        .into_iter()
        .map(|(repo_id, days)| {
            let mut deployments = 0u64;
            let mut failures = 0u64;
            let series: Series = days
                .into_iter()
                .map(|(day, (day_deployments, day_failures))| {
                    deployments += day_deployments;
                    failures += day_failures;
                    let rate = if deployments > 0 {
                        failures as f64 / deployments as f64 * 100.0
                    } else {
                        0.0
                    };
                    (day, rate)
                })
                .collect();
            (repo_id.to_string(), series)
        })
        .collect()
}

fn chart(series: Series, label: String) -> ChartData {
    ChartData {
        labels: series.labels,
        datasets: vec![Dataset {
            label,
            data: series.values,
        }],
    }
}

/// Assemble the per-repository series and their cross-repository average
/// into one report. Import rejects projects whose id is [`AVERAGE_KEY`].
pub fn build_report(
    kind: MetricKind,
    index: &RepoIndex<'_>,
    by_repo: IndexMap<String, Series>,
    total_days: Option<usize>,
) -> MetricReport {
    let average_series = cross_repo_average(by_repo.values());

    let mut report = MetricReport {
        total_days,
        ..Default::default()
    };
    for (repo_id, series) in by_repo {
        report.average.insert(repo_id.clone(), series.mean());
        let label = kind.repo_label(index.name(&repo_id));
        report.data.insert(repo_id, chart(series, label));
    }
    report
        .average
        .insert(AVERAGE_KEY.to_string(), average_series.mean());
    report
        .data
        .insert(AVERAGE_KEY.to_string(), chart(average_series, kind.average_label()));
    report
}

/// All four DORA metrics for a set of projects over a range.
pub fn compute_dora(
    projects: &[Project],
    pull_requests: &[PullRequest],
    stats: &[DailyStats],
    range: &DateRange,
) -> DoraMetrics {
    let index = RepoIndex::new(projects);
    log::debug!(
        "Computing DORA metrics for {} projects from {} to {}",
        index.len(),
        range.start,
        range.end
    );

    DoraMetrics {
        range: *range,
        cycle_time_data: build_report(
            MetricKind::CycleTime,
            &index,
            cycle_time_by_repo(&index, pull_requests, range),
            None,
        ),
        deploy_frequency_data: build_report(
            MetricKind::DeployFrequency,
            &index,
            deploy_frequency_by_repo(&index, range),
            Some(range.num_days()),
        ),
        mttr_data: build_report(MetricKind::Mttr, &index, mttr_by_repo(&index, stats, range), None),
        cfr_data: build_report(
            MetricKind::ChangeFailureRate,
            &index,
            cfr_by_repo(&index, stats, range),
            None,
        ),
    }
}
