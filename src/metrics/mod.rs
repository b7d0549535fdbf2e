pub mod dashboard;
pub mod delivery;
pub mod dora;
pub mod labels;
pub mod lifecycle;
pub mod series;
pub mod types;

pub use types::*;

use crate::config::MetricsSettings;
use crate::date_util::DateRange;
use crate::error::{Error, Result};
use crate::model::Project;
use crate::repo_ref::RepoRef;
use crate::storage::repository;
use crate::storage::Database;

use dashboard::StoredCommitCounts;

/// Load typed settings from `app_config`, defaulting missing keys.
pub async fn load_settings(db: &Database) -> Result<MetricsSettings> {
    let pairs = db
        .reader()
        .call(|conn| repository::list_config(conn))
        .await?;
    MetricsSettings::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

/// Projects of a user, optionally narrowed to one repository.
async fn user_projects(
    db: &Database,
    user_id: &str,
    repo: Option<&RepoRef>,
) -> Result<Vec<Project>> {
    let user_id = user_id.to_string();
    let mut projects = db
        .reader()
        .call(move |conn| repository::list_projects_for_user(conn, &user_id))
        .await?;

    if let Some(repo) = repo {
        projects.retain(|p| {
            p.full_name.as_deref().is_some_and(|name| repo.matches(name))
        });
        if projects.is_empty() {
            return Err(Error::NotFound(format!("repository {repo}")));
        }
    }
    Ok(projects)
}

fn project_ids(projects: &[Project]) -> Vec<String> {
    projects.iter().map(|p| p.id.clone()).collect()
}

/// DORA metrics for a user's projects over a range.
pub async fn compute_user_dora(
    db: &Database,
    user_id: &str,
    range: &DateRange,
    repo: Option<&RepoRef>,
) -> Result<DoraMetrics> {
    let projects = user_projects(db, user_id, repo).await?;
    let ids = project_ids(&projects);
    let range_copy = *range;

    let (pull_requests, stats) = db
        .reader()
        .call(move |conn| {
            let prs = repository::list_pull_requests_merged_between(conn, &ids, &range_copy)?;
            let stats = repository::list_daily_stats_between(conn, &ids, &range_copy)?;
            Ok::<_, rusqlite::Error>((prs, stats))
        })
        .await?;

    Ok(dora::compute_dora(&projects, &pull_requests, &stats, range))
}

/// Dashboard summary for a user's projects over a range, counting commits
/// from stored daily stats.
pub async fn compute_user_dashboard(
    db: &Database,
    user_id: &str,
    range: &DateRange,
    settings: &MetricsSettings,
) -> Result<DashboardSummary> {
    let projects = user_projects(db, user_id, None).await?;
    let ids = project_ids(&projects);
    let range_copy = *range;

    let (pull_requests, issues, stats) = db
        .reader()
        .call(move |conn| {
            let prs = repository::list_pull_requests_created_between(conn, &ids, &range_copy)?;
            let issues = repository::list_issues_created_between(conn, &ids, &range_copy)?;
            let stats = repository::list_daily_stats_between(conn, &ids, &range_copy)?;
            Ok::<_, rusqlite::Error>((prs, issues, stats))
        })
        .await?;

    let commits = StoredCommitCounts::from_daily_stats(&stats);
    Ok(dashboard::compose_dashboard(
        &projects,
        &pull_requests,
        &issues,
        range,
        &commits,
        settings,
    ))
}

/// Sprint delivery analysis across every project of a user.
pub async fn compute_user_delivery(
    db: &Database,
    user_id: &str,
    settings: &MetricsSettings,
) -> Result<DeliveryOverview> {
    let projects = user_projects(db, user_id, None).await?;
    let ids = project_ids(&projects);

    let (issues, sprints, pull_requests) = db
        .reader()
        .call(move |conn| {
            let issues = repository::list_issues(conn, &ids)?;
            let sprints = repository::list_sprints(conn, &ids)?;
            let prs = repository::list_pull_requests(conn, &ids)?;
            Ok::<_, rusqlite::Error>((issues, sprints, prs))
        })
        .await?;

    Ok(delivery::analyze_portfolio(
        &projects,
        &issues,
        &sprints,
        &pull_requests,
        settings,
    ))
}
