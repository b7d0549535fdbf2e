//! Normalisation of imported records and the JSON snapshot format.
//!
//! Fetching from GitHub happens elsewhere; a snapshot is what that side
//! hands over. Import groups every record by project and derives the fields
//! the metrics rely on (`is_bug`, iteration, merged deployments, daily stats).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;

use crate::date_util::{parse_day, DateRange};
use crate::error::{Error, Result};
use crate::metrics::dora::AVERAGE_KEY;
use crate::model::{
    DailyDeployment, DailyStats, Issue, Project, ProjectRecords, PullRequest, Sprint, BACKLOG,
};

/// True if any label is "bug", ignoring case.
pub fn is_bug<S: AsRef<str>>(labels: &[S]) -> bool {
    labels.iter().any(|l| l.as_ref().eq_ignore_ascii_case("bug"))
}

/// One entry per calendar day, counts summed, ordered by day.
pub fn merge_daily_deployments(entries: &[DailyDeployment]) -> Vec<DailyDeployment> {
    let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for entry in entries {
        *by_day.entry(entry.date).or_insert(0) += entry.count;
    }
    by_day
        .into_iter()
        .map(|(date, count)| DailyDeployment { date, count })
        .collect()
}

/// End of an iteration that lasts `duration_days` from `start`, or `None`
/// when that lands outside the representable range.
pub fn sprint_end(start: DateTime<Utc>, duration_days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(duration_days).and_then(|d| start.checked_add_signed(d))
}

/// Name of the first sprint whose window holds `created_at`, else `Backlog`.
pub fn assign_iteration(created_at: Option<DateTime<Utc>>, sprints: &[Sprint]) -> String {
    created_at
        .and_then(|at| sprints.iter().find(|sprint| sprint.contains(&at)))
        .map(|sprint| sprint.name.clone())
        .unwrap_or_else(|| BACKLOG.to_string())
}

/// Mean minutes from creation to closure of the bugs closed on `day` (UTC).
pub fn daily_bug_fix_minutes(issues: &[Issue], day: NaiveDate) -> f64 {
    let fix_minutes: Vec<f64> = issues
        .iter()
        .filter(|issue| issue.is_bug)
        .filter_map(|issue| {
            let closed_at = issue.closed_at?;
            if closed_at.date_naive() != day {
                return None;
            }
            let created_at = issue.created_at?;
            Some((closed_at - created_at).num_seconds() as f64 / 60.0)
        })
        .collect();

    if fix_minutes.is_empty() {
        0.0
    } else {
        fix_minutes.iter().sum::<f64>() / fix_minutes.len() as f64
    }
}

/// One row per day of `range`, with commits from `commits_per_day` (0 when
/// absent) and bug fix time from the project's issues.
pub fn derive_daily_stats(
    project_id: &str,
    issues: &[Issue],
    commits_per_day: &BTreeMap<NaiveDate, u64>,
    range: &DateRange,
) -> Vec<DailyStats> {
    range
        .days()
        .into_iter()
        .map(|date| DailyStats {
            repository_id: project_id.to_string(),
            date,
            total_commits: commits_per_day.get(&date).copied().unwrap_or(0),
            bug_fix_time: daily_bug_fix_minutes(issues, date),
        })
        .collect()
}

/// Sprint as it appears in a snapshot: the end may be given directly or as
/// a duration in days.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSprint {
    pub repository_id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_days: Option<i64>,
}

impl SnapshotSprint {
    pub fn into_sprint(self) -> Result<Sprint> {
        let end_date = match (self.end_date, self.start_date, self.duration_days) {
            (Some(end), _, _) => Some(end),
            (None, Some(start), Some(days)) => Some(sprint_end(start, days).ok_or_else(|| {
                Error::Snapshot(format!(
                    "sprint {} of {}: duration of {days} days is out of range",
                    self.name, self.repository_id
                ))
            })?),
            _ => None,
        };
        Ok(Sprint {
            repository_id: self.repository_id,
            name: self.name,
            start_date: self.start_date,
            end_date,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub projects: Vec<Project>,
    pub pull_requests: Vec<PullRequest>,
    pub issues: Vec<Issue>,
    pub sprints: Vec<SnapshotSprint>,
    pub daily_stats: Vec<DailyStats>,
    /// Project id to `YYYY-MM-DD` to commit count.
    pub daily_commits: HashMap<String, BTreeMap<String, u64>>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| Error::Snapshot(format!("{}: {e}", path.display())))
    }
}

fn parse_commit_days(
    project_id: &str,
    raw: &BTreeMap<String, u64>,
) -> Result<BTreeMap<NaiveDate, u64>> {
    raw.iter()
        .map(|(day, count)| {
            parse_day(day)
                .map(|date| (date, *count))
                .map_err(|e| Error::Snapshot(format!("dailyCommits for {project_id}: {e}")))
        })
        .collect()
}

/// Group a snapshot by project and normalise every record.
///
/// Records whose repository is not among the snapshot's projects are
/// dropped with a warning. The project id `average` is reserved for the
/// cross-repository entry of metric reports. When a project has no daily
/// stats rows but does have commits per day, rows are derived over the span
/// of those days.
pub fn prepare_snapshot(snapshot: Snapshot) -> Result<Vec<ProjectRecords>> {
    let mut grouped: Vec<ProjectRecords> = Vec::with_capacity(snapshot.projects.len());
    let mut slot: HashMap<String, usize> = HashMap::new();

    for mut project in snapshot.projects {
        if project.id == AVERAGE_KEY {
            return Err(Error::Snapshot(format!("project id {AVERAGE_KEY} is reserved")));
        }
        if slot.contains_key(&project.id) {
            return Err(Error::Snapshot(format!("duplicate project id {}", project.id)));
        }
        project.daily_deployments = merge_daily_deployments(&project.daily_deployments);
        slot.insert(project.id.clone(), grouped.len());
        grouped.push(ProjectRecords::new(project));
    }

    let mut unknown = 0usize;
    let mut records_for = |repo_id: &str| -> Option<usize> {
        let found = slot.get(repo_id).copied();
        if found.is_none() {
            unknown += 1;
        }
        found
    };

    let mut sprint_slots = Vec::new();
    for sprint in snapshot.sprints {
        if let Some(i) = records_for(&sprint.repository_id) {
            sprint_slots.push((i, sprint.into_sprint()?));
        }
    }
    let mut pr_slots = Vec::new();
    for pr in snapshot.pull_requests {
        if let Some(i) = records_for(&pr.repository_id) {
            pr_slots.push((i, pr));
        }
    }
    let mut issue_slots = Vec::new();
    for issue in snapshot.issues {
        if let Some(i) = records_for(&issue.repository_id) {
            issue_slots.push((i, issue));
        }
    }
    let mut stats_slots = Vec::new();
    for stats in snapshot.daily_stats {
        if let Some(i) = records_for(&stats.repository_id) {
            stats_slots.push((i, stats));
        }
    }
    if unknown > 0 {
        log::warn!("Skipped {unknown} snapshot records with an unknown repository id");
    }

    for (i, sprint) in sprint_slots {
        grouped[i].sprints.push(sprint);
    }
    for (i, pr) in pr_slots {
        grouped[i].pull_requests.push(pr);
    }
    for (i, mut issue) in issue_slots {
        issue.is_bug = is_bug(&issue.labels);
        if issue.iteration.is_none() {
            issue.iteration = Some(assign_iteration(issue.created_at, &grouped[i].sprints));
        }
        grouped[i].issues.push(issue);
    }
    for (i, stats) in stats_slots {
        grouped[i].daily_stats.push(stats);
    }

    for records in &mut grouped {
        if !records.daily_stats.is_empty() {
            continue;
        }
        let Some(raw) = snapshot.daily_commits.get(&records.project.id) else {
            continue;
        };
        let commits = parse_commit_days(&records.project.id, raw)?;
        let (Some(first), Some(last)) = (commits.keys().next(), commits.keys().next_back()) else {
            continue;
        };
        let span = DateRange::new(*first, *last)?;
        records.daily_stats =
            derive_daily_stats(&records.project.id, &records.issues, &commits, &span);
    }

    Ok(grouped)
}
