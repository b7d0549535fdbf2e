//! Records the metrics read: one set per GitHub repository, produced by the
//! ingestion side and stored as-is. Nothing in `metrics` mutates them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Iteration name for issues outside every sprint.
pub const BACKLOG: &str = "Backlog";

/// A tracked GitHub repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_commits: u64,
    /// At most one entry per calendar day.
    #[serde(default)]
    pub daily_deployments: Vec<DailyDeployment>,
}

impl Project {
    /// Short name, falling back to `owner/repo`.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else {
            self.full_name.as_deref().unwrap_or(&self.id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyDeployment {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub username: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub reviewer: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequest {
    pub repository_id: String,
    pub title: String,
    pub repository_name: Option<String>,
    /// First element is the primary author.
    pub author: Vec<Author>,
    pub created_at: Option<DateTime<Utc>>,
    pub first_commit_at: Option<DateTime<Utc>>,
    pub pr_submitted_at: Option<DateTime<Utc>>,
    pub first_review_at: Option<DateTime<Utc>>,
    pub all_approved_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: u64,
    pub deletions: u64,
    pub commit_count: Option<u64>,
    pub reviews: Vec<Review>,
}

impl PullRequest {
    pub fn primary_author(&self) -> Option<&Author> {
        self.author.first()
    }

    /// Weighted change volume: deletions count half.
    pub fn size(&self) -> f64 {
        self.additions as f64 + self.deletions as f64 * 0.5
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Issue {
    pub repository_id: String,
    pub title: String,
    pub status: String,
    pub labels: Vec<String>,
    /// Login of the issue author.
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_bug: bool,
    /// Iteration (sprint) name the issue is planned into.
    pub iteration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub repository_id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl Sprint {
    /// The `[start, end]` window when both ends are known.
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.start_date?, self.end_date?))
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.window()
            .map(|(start, end)| *at >= start && *at <= end)
            .unwrap_or(false)
    }
}

/// One row per repository per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub repository_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub total_commits: u64,
    /// Mean minutes-to-close of bugs closed that day; 0 when none closed.
    #[serde(default)]
    pub bug_fix_time: f64,
}

/// Everything stored for one repository; replaced as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecords {
    pub project: Project,
    pub pull_requests: Vec<PullRequest>,
    pub issues: Vec<Issue>,
    pub sprints: Vec<Sprint>,
    pub daily_stats: Vec<DailyStats>,
}

impl ProjectRecords {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            pull_requests: Vec::new(),
            issues: Vec::new(),
            sprints: Vec::new(),
            daily_stats: Vec::new(),
        }
    }
}
