use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};

use super::dora::RepoIndex;
use super::labels::{count_labels, LabelCounts};
use super::lifecycle::{
    coding_time, cycle_time, deploy_time, format_duration, format_phase, pick_up_from_submission,
    review_time, PhaseTotals, NOT_AVAILABLE,
};
use super::types::{
    CardValue, CycleTimeBreakdown, DashboardSummary, DurationItem, ExtendedStats,
    InvestmentProfile, PullRequestRow, StatCard,
};
use crate::config::MetricsSettings;
use crate::date_util::DateRange;
use crate::error::Result;
use crate::model::{DailyStats, Issue, Project, PullRequest};

/// Commit counts per project, injected into the dashboard.
pub trait CommitSource {
    fn commit_count(&self, project: &Project, range: &DateRange) -> Result<u64>;
}

/// Commit counts summed from stored daily stats rows.
#[derive(Debug, Clone, Default)]
pub struct StoredCommitCounts {
    by_repo: HashMap<String, Vec<(NaiveDate, u64)>>,
}

impl StoredCommitCounts {
    pub fn from_daily_stats(stats: &[DailyStats]) -> Self {
        let mut by_repo: HashMap<String, Vec<(NaiveDate, u64)>> = HashMap::new();
        for row in stats {
            by_repo
                .entry(row.repository_id.clone())
                .or_default()
                .push((row.date, row.total_commits));
        }
        Self { by_repo }
    }
}

impl CommitSource for StoredCommitCounts {
    fn commit_count(&self, project: &Project, range: &DateRange) -> Result<u64> {
        Ok(self
            .by_repo
            .get(&project.id)
            .map(|days| {
                days.iter()
                    .filter(|(date, _)| range.contains_day(*date))
                    .map(|(_, commits)| commits)
                    .sum()
            })
            .unwrap_or(0))
    }
}

/// Distinct pull-request authors and reviewers.
pub fn contributors<'a, I>(pull_requests: I) -> BTreeSet<&'a str>
where
    I: IntoIterator<Item = &'a PullRequest>,
{
    let mut people = BTreeSet::new();
    for pr in pull_requests {
        if let Some(author) = pr.primary_author() {
            if !author.username.is_empty() {
                people.insert(author.username.as_str());
            }
        }
        for review in &pr.reviews {
            if !review.reviewer.is_empty() {
                people.insert(review.reviewer.as_str());
            }
        }
    }
    people
}

fn card(icon: &str, value: CardValue, label: &str) -> StatCard {
    StatCard {
        icon: icon.to_string(),
        value,
        label: label.to_string(),
    }
}

/// The four headline cards.
pub fn stat_cards(
    total_commits: u64,
    totals: &PhaseTotals,
    contributors: usize,
    labels: &LabelCounts,
) -> Vec<StatCard> {
    vec![
        card("gitCommit", CardValue::Count(total_commits), "Git Commit"),
        card(
            "cycleTime",
            CardValue::Text(format_duration(totals.average_cycle_time_ms())),
            "Cycle Time",
        ),
        card("gitContributors", CardValue::Count(contributors as u64), "Contributors"),
        card(
            "investmentProfile",
            CardValue::Count(labels.distinct() as u64),
            "Investment Profile",
        ),
    ]
}

fn duration_item(label: &str, ms: i64) -> DurationItem {
    DurationItem {
        value: format_duration(ms),
        label: label.to_string(),
    }
}

pub fn extended_stats(totals: &PhaseTotals, labels: &LabelCounts, top_n: usize) -> ExtendedStats {
    ExtendedStats {
        cycle_time: CycleTimeBreakdown {
            items: vec![
                duration_item("Coding", totals.average_coding_ms()),
                duration_item("Pick-up", totals.average_pick_up_ms()),
                duration_item("Review", totals.average_review_ms()),
                duration_item("Deploy", totals.average_deploy_ms()),
            ],
        },
        investment_profile: InvestmentProfile {
            items: labels.top_n_with_others(top_n),
        },
    }
}

/// One listing row; pick-up here is measured from PR submission.
pub fn pull_request_row(pr: &PullRequest, index: &RepoIndex<'_>) -> PullRequestRow {
    PullRequestRow {
        pull_request: pr.title.clone(),
        author: pr
            .primary_author()
            .map(|a| a.username.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        repositories: pr
            .repository_name
            .clone()
            .unwrap_or_else(|| index.name(&pr.repository_id).to_string()),
        cycle_time: format_phase(cycle_time(pr)),
        coding_time: format_phase(coding_time(pr)),
        pick_up: format_phase(pick_up_from_submission(pr)),
        review: format_phase(review_time(pr)),
        deploy: format_phase(deploy_time(pr)),
        commits: pr.commit_count,
        pr_size: pr.size(),
    }
}

/// Dashboard payload for a user's projects over a range.
///
/// Pull requests and issues are kept when they belong to one of `projects`
/// and were created inside the range. A failed commit count is logged and
/// counted as zero.
pub fn compose_dashboard(
    projects: &[Project],
    pull_requests: &[PullRequest],
    issues: &[Issue],
    range: &DateRange,
    commits: &dyn CommitSource,
    settings: &MetricsSettings,
) -> DashboardSummary {
    let index = RepoIndex::new(projects);
    let in_scope = |repo_id: &str, created_at: Option<&DateTime<Utc>>| {
        index.contains(repo_id) && created_at.is_some_and(|at| range.contains(at))
    };

    let prs: Vec<&PullRequest> = pull_requests
        .iter()
        .filter(|pr| in_scope(pr.repository_id.as_str(), pr.created_at.as_ref()))
        .collect();
    let labels = count_labels(
        issues
            .iter()
            .filter(|issue| in_scope(issue.repository_id.as_str(), issue.created_at.as_ref()))
            .map(|issue| issue.labels.as_slice()),
    );

    let total_commits: u64 = projects
        .iter()
        .map(|project| match commits.commit_count(project, range) {
            Ok(count) => count,
            Err(e) => {
                log::warn!("Failed to count commits for {}: {e}", project.display_name());
                0
            }
        })
        .sum();

    let total_contributors = contributors(prs.iter().copied()).len();
    let time_stats = PhaseTotals::from_pull_requests(prs.iter().copied());
    log::debug!(
        "Dashboard over {} projects: {} pull requests, {} commits",
        projects.len(),
        prs.len(),
        total_commits
    );

    DashboardSummary {
        range: *range,
        total_commits,
        total_contributors,
        stats: stat_cards(total_commits, &time_stats, total_contributors, &labels),
        extended_stats: extended_stats(&time_stats, &labels, settings.top_label_count),
        pull_requests: prs.iter().map(|pr| pull_request_row(pr, &index)).collect(),
        time_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{Author, Review};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ts(s: &str) -> Option<DateTime<Utc>> {
        Some(s.parse().unwrap())
    }

    fn project(id: &str) -> Project {
        Project {
            id: id.into(),
            user_id: "u1".into(),
            name: format!("repo-{id}"),
            full_name: None,
            start_date: None,
            end_date: None,
            total_commits: 0,
            daily_deployments: vec![],
        }
    }

    fn range() -> DateRange {
        DateRange::new(d(2025, 3, 1), d(2025, 3, 10)).unwrap()
    }

    fn merged_pr(author: &str, reviewer: &str) -> PullRequest {
        PullRequest {
            repository_id: "p1".into(),
            title: "Add export".into(),
            author: vec![Author {
                username: author.into(),
                profile_image_url: None,
            }],
            reviews: vec![Review {
                reviewer: reviewer.into(),
                status: "APPROVED".into(),
                submitted_at: None,
            }],
            created_at: ts("2025-03-02T08:00:00Z"),
            first_commit_at: ts("2025-03-02T08:00:00Z"),
            pr_submitted_at: ts("2025-03-02T10:00:00Z"),
            first_review_at: ts("2025-03-02T12:00:00Z"),
            all_approved_at: ts("2025-03-02T14:00:00Z"),
            merged_at: ts("2025-03-02T15:00:00Z"),
            additions: 10,
            deletions: 4,
            ..Default::default()
        }
    }

    struct FailingCommits;

    impl CommitSource for FailingCommits {
        fn commit_count(&self, project: &Project, _range: &DateRange) -> Result<u64> {
            if project.id == "p1" {
                Err(Error::NotFound("repository".into()))
            } else {
                Ok(7)
            }
        }
    }

    #[test]
    fn test_stored_commit_counts_sum_in_range() {
        let stats = vec![
            DailyStats {
                repository_id: "p1".into(),
                date: d(2025, 3, 1),
                total_commits: 4,
                bug_fix_time: 0.0,
            },
            DailyStats {
                repository_id: "p1".into(),
                date: d(2025, 3, 11),
                total_commits: 100,
                bug_fix_time: 0.0,
            },
        ];
        let source = StoredCommitCounts::from_daily_stats(&stats);
        assert_eq!(source.commit_count(&project("p1"), &range()).unwrap(), 4);
        assert_eq!(source.commit_count(&project("p2"), &range()).unwrap(), 0);
    }

    #[test]
    fn test_contributors_union_authors_and_reviewers() {
        let prs = vec![merged_pr("alice", "bob"), merged_pr("bob", "carol")];
        let people = contributors(&prs);
        assert_eq!(people.into_iter().collect::<Vec<_>>(), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_compose_dashboard() {
        let projects = vec![project("p1"), project("p2")];
        let mut stale = merged_pr("dave", "erin");
        stale.created_at = ts("2025-02-01T00:00:00Z");
        let prs = vec![merged_pr("alice", "bob"), stale];
        let issues = vec![
            Issue {
                repository_id: "p1".into(),
                labels: vec!["bug".into(), "ui".into()],
                created_at: ts("2025-03-03T00:00:00Z"),
                ..Default::default()
            },
            Issue {
                repository_id: "elsewhere".into(),
                labels: vec!["docs".into()],
                created_at: ts("2025-03-03T00:00:00Z"),
                ..Default::default()
            },
        ];

        let summary = compose_dashboard(
            &projects,
            &prs,
            &issues,
            &range(),
            &FailingCommits,
            &MetricsSettings::default(),
        );

        // p1 fails and counts as zero
        assert_eq!(summary.total_commits, 7);
        assert_eq!(summary.total_contributors, 2);
        assert_eq!(summary.time_stats.pr_count, 1);
        assert_eq!(summary.stats[0].value, CardValue::Count(7));
        // 7h coding + 4h pick-up + 2h review + 1h deploy
        assert_eq!(summary.stats[1].value, CardValue::Text("14 hour".into()));
        assert_eq!(summary.stats[3].value, CardValue::Count(2));

        let phases: Vec<&str> = summary
            .extended_stats
            .cycle_time
            .items
            .iter()
            .map(|i| i.value.as_str())
            .collect();
        assert_eq!(phases, vec!["7 hour", "4 hour", "2 hour", "1 hour"]);

        let row = &summary.pull_requests[0];
        assert_eq!(summary.pull_requests.len(), 1);
        assert_eq!(row.author, "alice");
        assert_eq!(row.repositories, "repo-p1");
        assert_eq!(row.cycle_time, "7 hour");
        assert_eq!(row.pick_up, "2 hour");
        assert_eq!(row.commits, None);
        assert_eq!(row.pr_size, 12.0);
    }

    #[test]
    fn test_empty_dashboard() {
        let summary = compose_dashboard(
            &[],
            &[],
            &[],
            &range(),
            &StoredCommitCounts::default(),
            &MetricsSettings::default(),
        );
        assert_eq!(summary.total_commits, 0);
        assert_eq!(summary.total_contributors, 0);
        assert_eq!(summary.stats[1].value, CardValue::Text("0 min".into()));
        assert!(summary.pull_requests.is_empty());
        let others = &summary.extended_stats.investment_profile.items;
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].value, 0);
    }

    #[test]
    fn test_row_marks_missing_phases() {
        let pr = PullRequest {
            repository_id: "p9".into(),
            ..Default::default()
        };
        let projects: Vec<Project> = vec![];
        let row = pull_request_row(&pr, &RepoIndex::new(&projects));
        assert_eq!(row.author, NOT_AVAILABLE);
        assert_eq!(row.repositories, "p9");
        assert_eq!(row.cycle_time, NOT_AVAILABLE);
        assert_eq!(row.deploy, NOT_AVAILABLE);
    }
}
