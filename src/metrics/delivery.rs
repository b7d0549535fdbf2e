//! Sprint and delivery analysis per project, plus the portfolio summary
//! across projects.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::labels::{count_labels, ratio, round_to, LabelCounts};
use super::series::mean;
use super::types::{
    ActiveContributor, DeliveryOverview, InvestmentProfile, IterationLabelRatios,
    PlanningAccuracy, PortfolioSummary, ProfileItem, ProjectDelivery, ProjectSummary,
    SprintAccuracy, SprintActivity, SprintDelivery, SprintInvestmentProfile, SprintWindow,
};
use crate::config::MetricsSettings;
use crate::model::{Issue, Project, PullRequest, Sprint, BACKLOG};

/// Labels kept per project in the delivery overview.
const PROJECT_TOP_LABELS: usize = 2;

/// A sprint with both ends known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSprint<'a> {
    pub name: &'a str,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScheduledSprint<'_> {
    /// Inclusive on both ends.
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at <= self.end
    }

    fn window(&self) -> SprintWindow {
        SprintWindow {
            start_date: self.start,
            end_date: self.end,
        }
    }
}

/// Sprints with both dates present, ascending by start date.
pub fn sorted_sprints(sprints: &[Sprint]) -> Vec<ScheduledSprint<'_>> {
    let mut scheduled: Vec<ScheduledSprint<'_>> = sprints
        .iter()
        .filter_map(|sprint| {
            let (start, end) = sprint.window()?;
            Some(ScheduledSprint {
                name: &sprint.name,
                start,
                end,
            })
        })
        .collect();
    scheduled.sort_by_key(|s| s.start);
    scheduled
}

/// Issues planned into the sprint: the issue's iteration equals the sprint name.
pub fn sprint_issues<'i>(sprint: &ScheduledSprint<'_>, issues: &'i [Issue]) -> Vec<&'i Issue> {
    issues
        .iter()
        .filter(|issue| issue.iteration.as_deref() == Some(sprint.name))
        .collect()
}

fn created_in(sprint: &ScheduledSprint<'_>, issue: &Issue) -> bool {
    issue.created_at.is_some_and(|at| sprint.contains(&at))
}

fn closed_in(sprint: &ScheduledSprint<'_>, issue: &Issue) -> bool {
    issue.closed_at.is_some_and(|at| sprint.contains(&at))
}

/// `complete / (complete + carryover) * 100`; 0 when both are 0.
pub fn completion_rate(complete: usize, carryover: usize, precision: u32) -> f64 {
    ratio(complete as u64, (complete + carryover) as u64, precision)
}

/// Added, completed and carried-over issue counts for one sprint.
pub fn sprint_delivery(
    sprint: &ScheduledSprint<'_>,
    issues: &[Issue],
    precision: u32,
) -> SprintDelivery {
    let added = issues.iter().filter(|issue| created_in(sprint, issue)).count();

    let planned = sprint_issues(sprint, issues);
    let complete = planned.iter().filter(|issue| closed_in(sprint, issue)).count();
    let carryover = planned
        .iter()
        .filter(|issue| match issue.closed_at {
            None => true,
            Some(closed_at) => closed_at > sprint.end,
        })
        .count();

    SprintDelivery {
        sprint_name: sprint.name.to_string(),
        added,
        complete,
        carryover,
        completion_rate: completion_rate(complete, carryover, precision),
        start_date: sprint.start,
        end_date: sprint.end,
    }
}

/// Backlog-relative planning accuracy.
///
/// The backlog is every issue created before the first sprint starts. A
/// sprint's accuracy is the share of that backlog closed inside its window;
/// the overall figure is the mean over sprints. `None` without sprints.
pub fn planning_accuracy(
    sprints: &[ScheduledSprint<'_>],
    issues: &[Issue],
    precision: u32,
) -> Option<PlanningAccuracy> {
    let first = sprints.first()?;
    let backlog: Vec<&Issue> = issues
        .iter()
        .filter(|issue| issue.created_at.is_some_and(|at| at < first.start))
        .collect();

    let per_sprint: Vec<SprintAccuracy> = sprints
        .iter()
        .map(|sprint| {
            let closed = backlog.iter().filter(|issue| closed_in(sprint, issue)).count();
            SprintAccuracy {
                sprint_name: sprint.name.to_string(),
                planning_accuracy: ratio(closed as u64, backlog.len() as u64, precision),
                start_date: sprint.start,
                end_date: sprint.end,
            }
        })
        .collect();

    let values: Vec<f64> = per_sprint.iter().map(|s| s.planning_accuracy).collect();
    Some(PlanningAccuracy {
        overall: round_to(mean(&values), precision),
        sprints: per_sprint,
    })
}

fn label_counts<'i, I>(issues: I) -> LabelCounts
where
    I: IntoIterator<Item = &'i Issue>,
{
    count_labels(issues.into_iter().map(|issue| issue.labels.as_slice()))
}

/// Top-N labels by count plus `Others`.
pub fn investment_profile(issues: &[Issue], top_n: usize) -> InvestmentProfile {
    InvestmentProfile {
        items: label_counts(issues).top_n_with_others(top_n),
    }
}

/// Label ratios of the issues each sprint closed inside its own window.
pub fn sprint_investment_profiles(
    sprints: &[ScheduledSprint<'_>],
    issues: &[Issue],
    settings: &MetricsSettings,
) -> Vec<SprintInvestmentProfile> {
    sprints
        .iter()
        .map(|sprint| {
            let closed = sprint_issues(sprint, issues)
                .into_iter()
                .filter(|issue| closed_in(sprint, issue));
            SprintInvestmentProfile {
                sprint_name: sprint.name.to_string(),
                investment_profile: label_counts(closed)
                    .top_n_ratios(settings.top_label_count, settings.ratio_precision),
                start_date: sprint.start,
                end_date: sprint.end,
            }
        })
        .collect()
}

fn unique_authors<'i, I>(issues: I) -> BTreeSet<&'i str>
where
    I: IntoIterator<Item = &'i Issue>,
{
    issues
        .into_iter()
        .filter_map(|issue| issue.author.as_deref())
        .collect()
}

/// Distinct issue authors across the whole project.
pub fn team_size(issues: &[Issue]) -> usize {
    unique_authors(issues).len()
}

/// Distinct authors of the issues created inside each sprint window.
pub fn sprint_activity(sprints: &[ScheduledSprint<'_>], issues: &[Issue]) -> Vec<SprintActivity> {
    sprints
        .iter()
        .map(|sprint| SprintActivity {
            sprint_name: sprint.name.to_string(),
            active_people: unique_authors(issues.iter().filter(|i| created_in(sprint, i))).len(),
            start_date: sprint.start,
            end_date: sprint.end,
        })
        .collect()
}

/// Pull-request authors ranked by weighted change volume.
pub fn most_active(pull_requests: &[PullRequest], limit: usize) -> Vec<ActiveContributor> {
    let mut activity: IndexMap<&str, (f64, &str)> = IndexMap::new();
    for pr in pull_requests {
        let Some(author) = pr.primary_author() else {
            continue;
        };
        let image = author.profile_image_url.as_deref().unwrap_or("");
        activity
            .entry(author.username.as_str())
            .or_insert((0.0, image))
            .0 += pr.size();
    }

    let mut ranked: Vec<(&str, (f64, &str))> = activity.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.total_cmp(&a.1 .0));
    ranked
        .into_iter()
        .take(limit)
        .map(|(name, (active, image))| ActiveContributor {
            name: name.to_string(),
            active: active.round() as i64,
            profile_image_url: image.to_string(),
        })
        .collect()
}

/// Label ratios per iteration; issues without one fall under `Backlog`.
pub fn iteration_label_ratios(issues: &[Issue], precision: u32) -> Vec<IterationLabelRatios> {
    let mut groups: IndexMap<&str, Vec<&Issue>> = IndexMap::new();
    for issue in issues {
        let iteration = issue.iteration.as_deref().unwrap_or(BACKLOG);
        groups.entry(iteration).or_default().push(issue);
    }

    groups
        .into_iter()
        .map(|(iteration, group)| IterationLabelRatios {
            iteration: iteration.to_string(),
            label_ratios: label_counts(group).ratios(precision),
        })
        .collect()
}

/// The project's two most used labels.
pub fn top_labels(issues: &[Issue]) -> Vec<ProfileItem> {
    label_counts(issues).top_n(PROJECT_TOP_LABELS)
}

/// Full delivery analysis of one project from its own records.
pub fn analyze_project(
    project: &Project,
    issues: &[Issue],
    sprints: &[Sprint],
    pull_requests: &[PullRequest],
    settings: &MetricsSettings,
) -> ProjectDelivery {
    if pull_requests.is_empty() {
        log::warn!("No pull requests found for project {}", project.id);
    }

    let precision = settings.ratio_precision;
    let scheduled = sorted_sprints(sprints);
    let team_size = team_size(issues);
    let profile = investment_profile(issues, settings.top_label_count);
    let accuracy = planning_accuracy(&scheduled, issues, precision);

    ProjectDelivery {
        project_id: project.id.clone(),
        project_name: project.display_name().to_string(),
        team_size,
        top_labels: top_labels(issues),
        most_active: most_active(pull_requests, settings.most_active_count),
        sprint_activity: sprint_activity(&scheduled, issues),
        project_date: scheduled.iter().map(ScheduledSprint::window).collect(),
        sprint_investment_profiles: sprint_investment_profiles(&scheduled, issues, settings),
        project_delivery_metrics: scheduled
            .iter()
            .map(|sprint| sprint_delivery(sprint, issues, precision))
            .collect(),
        summary_data: ProjectSummary {
            active_people: team_size,
            investment_profile: profile.items.clone(),
            planning_accuracy: accuracy.as_ref().map(|a| a.overall).unwrap_or(0.0),
        },
        overall_investment_profile: profile,
        planning_accuracy: accuracy,
    }
}

/// Totals across every project: people are distinct issue authors.
pub fn portfolio_summary(
    projects: &[Project],
    issues: &[Issue],
    settings: &MetricsSettings,
) -> PortfolioSummary {
    PortfolioSummary {
        total_projects: projects.len(),
        total_people: unique_authors(issues).len(),
        label_summary: label_counts(issues).top_n_with_others(settings.top_label_count),
    }
}

fn owned_by<T: Clone>(records: &[T], project_id: &str, repo_of: impl Fn(&T) -> &str) -> Vec<T> {
    records
        .iter()
        .filter(|record| repo_of(record) == project_id)
        .cloned()
        .collect()
}

/// Delivery overview for a set of projects; records are matched to projects
/// by repository id.
pub fn analyze_portfolio(
    projects: &[Project],
    issues: &[Issue],
    sprints: &[Sprint],
    pull_requests: &[PullRequest],
    settings: &MetricsSettings,
) -> DeliveryOverview {
    let project_delivery_data = projects
        .iter()
        .map(|project| {
            analyze_project(
                project,
                &owned_by(issues, &project.id, |i| i.repository_id.as_str()),
                &owned_by(sprints, &project.id, |s| s.repository_id.as_str()),
                &owned_by(pull_requests, &project.id, |pr| pr.repository_id.as_str()),
                settings,
            )
        })
        .collect();

    DeliveryOverview {
        iteration_label_ratios: iteration_label_ratios(issues, settings.ratio_precision),
        project_delivery_data,
        summary_data: portfolio_summary(projects, issues, settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn sprint(name: &str, start: &str, end: &str) -> Sprint {
        Sprint {
            repository_id: "p1".into(),
            name: name.into(),
            start_date: Some(ts(start)),
            end_date: Some(ts(end)),
        }
    }

    fn issue(created: &str, closed: Option<&str>, iteration: Option<&str>) -> Issue {
        Issue {
            repository_id: "p1".into(),
            created_at: Some(ts(created)),
            closed_at: closed.map(ts),
            iteration: iteration.map(str::to_string),
            ..Default::default()
        }
    }

    fn labelled(labels: &[&str], author: &str) -> Issue {
        Issue {
            repository_id: "p1".into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            author: Some(author.into()),
            ..Default::default()
        }
    }

    fn pr_by(author: &str, additions: u64, deletions: u64) -> PullRequest {
        PullRequest {
            repository_id: "p1".into(),
            author: vec![Author {
                username: author.into(),
                profile_image_url: None,
            }],
            additions,
            deletions,
            ..Default::default()
        }
    }

    fn project() -> Project {
        Project {
            id: "p1".into(),
            user_id: "u1".into(),
            name: "api".into(),
            full_name: None,
            start_date: None,
            end_date: None,
            total_commits: 0,
            daily_deployments: vec![],
        }
    }

    #[test]
    fn test_sorted_sprints_drop_incomplete_windows() {
        let sprints = vec![
            sprint("Sprint 2", "2025-01-15T00:00:00Z", "2025-01-28T00:00:00Z"),
            Sprint {
                repository_id: "p1".into(),
                name: "Unscheduled".into(),
                start_date: None,
                end_date: None,
            },
            sprint("Sprint 1", "2025-01-01T00:00:00Z", "2025-01-14T00:00:00Z"),
        ];
        let sorted = sorted_sprints(&sprints);
        let names: Vec<&str> = sorted.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Sprint 1", "Sprint 2"]);
    }

    #[test]
    fn test_sprint_delivery_counts() {
        let sprints = vec![sprint("Sprint 1", "2025-01-01T00:00:00Z", "2025-01-14T00:00:00Z")];
        let scheduled = sorted_sprints(&sprints);
        let issues = vec![
            // Created in the window, closed in the window
            issue("2025-01-02T00:00:00Z", Some("2025-01-05T00:00:00Z"), Some("Sprint 1")),
            // Created before the sprint, never closed
            issue("2024-12-20T00:00:00Z", None, Some("Sprint 1")),
            // Closed after the sprint ended
            issue("2025-01-03T00:00:00Z", Some("2025-01-20T00:00:00Z"), Some("Sprint 1")),
            // Other iteration, created in the window
            issue("2025-01-04T00:00:00Z", None, Some("Sprint 9")),
        ];

        let delivery = sprint_delivery(&scheduled[0], &issues, 2);
        assert_eq!(delivery.added, 3);
        assert_eq!(delivery.complete, 1);
        assert_eq!(delivery.carryover, 2);
        assert_eq!(delivery.completion_rate, 33.33);
    }

    #[test]
    fn test_planning_accuracy_against_backlog() {
        let sprints = vec![sprint("Sprint 1", "2025-01-01T00:00:00Z", "2025-01-14T00:00:00Z")];
        let scheduled = sorted_sprints(&sprints);
        let issues = vec![
            issue("2024-12-01T00:00:00Z", Some("2025-01-02T00:00:00Z"), None),
            issue("2024-12-02T00:00:00Z", Some("2025-01-03T00:00:00Z"), None),
            issue("2024-12-03T00:00:00Z", Some("2025-01-04T00:00:00Z"), None),
            issue("2024-12-04T00:00:00Z", None, None),
            // Not backlog: created after the first sprint started
            issue("2025-01-05T00:00:00Z", Some("2025-01-06T00:00:00Z"), None),
        ];

        let accuracy = planning_accuracy(&scheduled, &issues, 2).unwrap();
        assert_eq!(accuracy.sprints[0].planning_accuracy, 75.0);
        assert_eq!(accuracy.overall, 75.0);
    }

    #[test]
    fn test_planning_accuracy_overall_is_mean_of_sprints() {
        let sprints = vec![
            sprint("Sprint 1", "2025-01-01T00:00:00Z", "2025-01-14T00:00:00Z"),
            sprint("Sprint 2", "2025-01-15T00:00:00Z", "2025-01-28T00:00:00Z"),
        ];
        let scheduled = sorted_sprints(&sprints);
        let issues = vec![
            issue("2024-12-01T00:00:00Z", Some("2025-01-02T00:00:00Z"), None),
            issue("2024-12-02T00:00:00Z", None, None),
        ];
        let accuracy = planning_accuracy(&scheduled, &issues, 2).unwrap();
        assert_eq!(accuracy.sprints[0].planning_accuracy, 50.0);
        assert_eq!(accuracy.sprints[1].planning_accuracy, 0.0);
        assert_eq!(accuracy.overall, 25.0);
    }

    #[test]
    fn test_planning_accuracy_needs_sprints_and_backlog() {
        assert!(planning_accuracy(&[], &[], 2).is_none());

        let sprints = vec![sprint("Sprint 1", "2025-01-01T00:00:00Z", "2025-01-14T00:00:00Z")];
        let accuracy = planning_accuracy(&sorted_sprints(&sprints), &[], 2).unwrap();
        assert_eq!(accuracy.overall, 0.0);
    }

    #[test]
    fn test_most_active_weights_deletions_and_ranks() {
        let prs = vec![
            pr_by("alice", 100, 0),
            pr_by("bob", 50, 301),
            pr_by("carol", 10, 10),
            pr_by("alice", 1, 1),
        ];
        let top = most_active(&prs, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "bob");
        // 50 + 150.5 rounds to 201
        assert_eq!(top[0].active, 201);
        assert_eq!(top[1].name, "alice");
        assert_eq!(top[1].active, 102);
        assert_eq!(top[1].profile_image_url, "");
    }

    #[test]
    fn test_team_size_and_activity_dedupe_authors() {
        let sprints = vec![sprint("Sprint 1", "2025-01-01T00:00:00Z", "2025-01-14T00:00:00Z")];
        let mut issues = vec![
            labelled(&["bug"], "alice"),
            labelled(&["bug"], "alice"),
            labelled(&["feature"], "bob"),
        ];
        issues[0].created_at = Some(ts("2025-01-02T00:00:00Z"));
        issues[1].created_at = Some(ts("2025-01-03T00:00:00Z"));
        issues[2].created_at = Some(ts("2025-02-01T00:00:00Z"));

        assert_eq!(team_size(&issues), 2);
        let activity = sprint_activity(&sorted_sprints(&sprints), &issues);
        assert_eq!(activity[0].active_people, 1);
    }

    #[test]
    fn test_iteration_label_ratios_group_backlog() {
        let mut issues = vec![
            labelled(&["bug", "ui"], "alice"),
            labelled(&["feature"], "bob"),
            labelled(&["bug"], "bob"),
        ];
        issues[0].iteration = Some("Sprint 1".into());
        issues[2].iteration = Some("Sprint 1".into());

        let ratios = iteration_label_ratios(&issues, 2);
        assert_eq!(ratios.len(), 2);
        assert_eq!(ratios[0].iteration, "Sprint 1");
        assert_eq!(ratios[0].label_ratios[0].label, "bug");
        assert_eq!(ratios[0].label_ratios[0].ratio, 66.67);
        assert_eq!(ratios[1].iteration, BACKLOG);
        assert_eq!(ratios[1].label_ratios[0].ratio, 100.0);
    }

    #[test]
    fn test_sprint_investment_profile_uses_closed_sprint_issues() {
        let sprints = vec![sprint("Sprint 1", "2025-01-01T00:00:00Z", "2025-01-14T00:00:00Z")];
        let mut done =
            issue("2025-01-01T00:00:00Z", Some("2025-01-03T00:00:00Z"), Some("Sprint 1"));
        done.labels = vec!["bug".into()];
        let mut open = issue("2025-01-01T00:00:00Z", None, Some("Sprint 1"));
        open.labels = vec!["feature".into()];

        let profiles = sprint_investment_profiles(
            &sorted_sprints(&sprints),
            &[done, open],
            &MetricsSettings::default(),
        );
        let items = &profiles[0].investment_profile;
        assert_eq!(items[0].label, "bug");
        assert_eq!(items[0].ratio, 100.0);
        assert_eq!(items.last().unwrap().label, "Others");
    }

    #[test]
    fn test_empty_project_is_all_zero() {
        let delivery = analyze_project(&project(), &[], &[], &[], &MetricsSettings::default());
        assert_eq!(delivery.team_size, 0);
        assert!(delivery.top_labels.is_empty());
        assert!(delivery.most_active.is_empty());
        assert!(delivery.sprint_activity.is_empty());
        assert!(delivery.project_delivery_metrics.is_empty());
        assert!(delivery.planning_accuracy.is_none());
        assert_eq!(delivery.summary_data.planning_accuracy, 0.0);
        assert_eq!(delivery.overall_investment_profile.items.len(), 1);
        assert_eq!(delivery.overall_investment_profile.items[0].value, 0);
    }

    #[test]
    fn test_portfolio_matches_records_to_projects() {
        let mut other = project();
        other.id = "p2".into();
        let mut foreign = labelled(&["docs"], "carol");
        foreign.repository_id = "p2".into();
        let issues = vec![labelled(&["bug"], "alice"), labelled(&["bug"], "bob"), foreign];

        let overview = analyze_portfolio(
            &[project(), other],
            &issues,
            &[],
            &[pr_by("alice", 10, 0)],
            &MetricsSettings::default(),
        );
        assert_eq!(overview.project_delivery_data.len(), 2);
        assert_eq!(overview.project_delivery_data[0].team_size, 2);
        assert_eq!(overview.project_delivery_data[0].most_active.len(), 1);
        assert_eq!(overview.project_delivery_data[1].team_size, 1);
        assert!(overview.project_delivery_data[1].most_active.is_empty());
        assert_eq!(overview.summary_data.total_projects, 2);
        assert_eq!(overview.summary_data.total_people, 3);
        assert_eq!(overview.summary_data.label_summary[0].label, "bug");
        assert_eq!(overview.summary_data.label_summary[0].value, 2);
    }
}
