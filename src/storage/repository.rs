use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::date_util::{day_key, parse_timestamp, DateRange, DAY_FORMAT};
use crate::model::{
    DailyDeployment, DailyStats, Issue, Project, ProjectRecords, PullRequest, Sprint,
};

// ── Projects ───────────────────────────────────────────────────────

pub fn upsert_project(conn: &Connection, project: &Project) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO projects (
            id, user_id, name, full_name, start_date, end_date, total_commits, cached_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
        ON CONFLICT(id) DO UPDATE SET
            user_id=excluded.user_id, name=excluded.name, full_name=excluded.full_name,
            start_date=excluded.start_date, end_date=excluded.end_date,
            total_commits=excluded.total_commits, cached_at=excluded.cached_at",
        params![
            project.id,
            project.user_id,
            project.name,
            project.full_name,
            timestamp_to_sql(project.start_date),
            timestamp_to_sql(project.end_date),
            project.total_commits as i64,
        ],
    )?;
    Ok(())
}

const PROJECT_COLUMNS: &str =
    "id, user_id, name, full_name, start_date, end_date, total_commits";

fn project_from_row(row: &Row<'_>) -> Result<Project, rusqlite::Error> {
    Ok(Project {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        full_name: row.get(3)?,
        start_date: timestamp_column(row, 4)?,
        end_date: timestamp_column(row, 5)?,
        total_commits: row.get::<_, i64>(6)? as u64,
        daily_deployments: Vec::new(),
    })
}

/// A user's projects in insertion order, with their daily deployments.
pub fn list_projects_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<Project>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = ?1 ORDER BY rowid"
    ))?;
    let mut projects = stmt
        .query_map(params![user_id], project_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for project in &mut projects {
        project.daily_deployments = list_daily_deployments(conn, &project.id)?;
    }
    Ok(projects)
}

pub fn get_project(conn: &Connection, id: &str) -> Result<Option<Project>, rusqlite::Error> {
    let project = conn
        .query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
            params![id],
            project_from_row,
        )
        .optional()?;
    match project {
        Some(mut project) => {
            project.daily_deployments = list_daily_deployments(conn, &project.id)?;
            Ok(Some(project))
        }
        None => Ok(None),
    }
}

/// Distinct owners of stored projects.
pub fn list_user_ids(conn: &Connection) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT DISTINCT user_id FROM projects ORDER BY user_id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

// ── Daily Deployments ──────────────────────────────────────────────

pub fn upsert_daily_deployment(
    conn: &Connection,
    project_id: &str,
    deployment: &DailyDeployment,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO daily_deployments (project_id, date, count) VALUES (?1, ?2, ?3)",
        params![project_id, day_key(deployment.date), deployment.count as i64],
    )?;
    Ok(())
}

pub fn list_daily_deployments(
    conn: &Connection,
    project_id: &str,
) -> Result<Vec<DailyDeployment>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT date, count FROM daily_deployments WHERE project_id = ?1 ORDER BY date",
    )?;
    let rows = stmt.query_map(params![project_id], |row| {
        Ok(DailyDeployment {
            date: date_column(row, 0)?,
            count: row.get::<_, i64>(1)? as u64,
        })
    })?;
    rows.collect()
}

// ── Wholesale replacement ──────────────────────────────────────────

/// Replace everything stored for one project inside a single transaction.
pub fn replace_project_records(
    conn: &Connection,
    records: &ProjectRecords,
) -> Result<(), rusqlite::Error> {
    let tx = conn.unchecked_transaction()?;
    let project_id = records.project.id.as_str();

    upsert_project(&tx, &records.project)?;
    for table in ["pull_requests", "issues", "sprints"] {
        tx.execute(
            &format!("DELETE FROM {table} WHERE repository_id = ?1"),
            params![project_id],
        )?;
    }
    tx.execute(
        "DELETE FROM daily_stats WHERE repository_id = ?1",
        params![project_id],
    )?;
    tx.execute(
        "DELETE FROM daily_deployments WHERE project_id = ?1",
        params![project_id],
    )?;

    for deployment in &records.project.daily_deployments {
        upsert_daily_deployment(&tx, project_id, deployment)?;
    }
    for pr in &records.pull_requests {
        insert_pull_request(&tx, pr)?;
    }
    for issue in &records.issues {
        insert_issue(&tx, issue)?;
    }
    for sprint in &records.sprints {
        insert_sprint(&tx, sprint)?;
    }
    for stats in &records.daily_stats {
        upsert_daily_stats(&tx, stats)?;
    }

    tx.commit()
}

// ── Pull Requests ──────────────────────────────────────────────────

pub fn insert_pull_request(conn: &Connection, pr: &PullRequest) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO pull_requests (
            repository_id, title, repository_name, authors_json, created_at,
            first_commit_at, pr_submitted_at, first_review_at, all_approved_at, merged_at,
            additions, deletions, commit_count, reviews_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            pr.repository_id,
            pr.title,
            pr.repository_name,
            to_json(&pr.author)?,
            timestamp_to_sql(pr.created_at),
            timestamp_to_sql(pr.first_commit_at),
            timestamp_to_sql(pr.pr_submitted_at),
            timestamp_to_sql(pr.first_review_at),
            timestamp_to_sql(pr.all_approved_at),
            timestamp_to_sql(pr.merged_at),
            pr.additions as i64,
            pr.deletions as i64,
            pr.commit_count.map(|c| c as i64),
            to_json(&pr.reviews)?,
        ],
    )?;
    Ok(())
}

const PULL_REQUEST_COLUMNS: &str = "repository_id, title, repository_name, authors_json, \
     created_at, first_commit_at, pr_submitted_at, first_review_at, all_approved_at, merged_at, \
     additions, deletions, commit_count, reviews_json";

fn pull_request_from_row(row: &Row<'_>) -> Result<PullRequest, rusqlite::Error> {
    Ok(PullRequest {
        repository_id: row.get(0)?,
        title: row.get(1)?,
        repository_name: row.get(2)?,
        author: json_column(row, 3)?,
        created_at: timestamp_column(row, 4)?,
        first_commit_at: timestamp_column(row, 5)?,
        pr_submitted_at: timestamp_column(row, 6)?,
        first_review_at: timestamp_column(row, 7)?,
        all_approved_at: timestamp_column(row, 8)?,
        merged_at: timestamp_column(row, 9)?,
        additions: row.get::<_, i64>(10)? as u64,
        deletions: row.get::<_, i64>(11)? as u64,
        commit_count: row.get::<_, Option<i64>>(12)?.map(|c| c as u64),
        reviews: json_column(row, 13)?,
    })
}

/// Pull requests of the given projects, optionally restricted to a range on
/// one timestamp column.
fn query_pull_requests(
    conn: &Connection,
    repo_ids: &[String],
    range_column: Option<(&str, &DateRange)>,
) -> Result<Vec<PullRequest>, rusqlite::Error> {
    query_records(
        conn,
        &format!("SELECT {PULL_REQUEST_COLUMNS} FROM pull_requests"),
        repo_ids,
        range_column,
        pull_request_from_row,
    )
}

pub fn list_pull_requests(
    conn: &Connection,
    repo_ids: &[String],
) -> Result<Vec<PullRequest>, rusqlite::Error> {
    query_pull_requests(conn, repo_ids, None)
}

pub fn list_pull_requests_merged_between(
    conn: &Connection,
    repo_ids: &[String],
    range: &DateRange,
) -> Result<Vec<PullRequest>, rusqlite::Error> {
    query_pull_requests(conn, repo_ids, Some(("merged_at", range)))
}

pub fn list_pull_requests_created_between(
    conn: &Connection,
    repo_ids: &[String],
    range: &DateRange,
) -> Result<Vec<PullRequest>, rusqlite::Error> {
    query_pull_requests(conn, repo_ids, Some(("created_at", range)))
}

// ── Issues ─────────────────────────────────────────────────────────

pub fn insert_issue(conn: &Connection, issue: &Issue) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO issues (
            repository_id, title, status, labels_json, author, created_at, closed_at,
            is_bug, iteration
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            issue.repository_id,
            issue.title,
            issue.status,
            to_json(&issue.labels)?,
            issue.author,
            timestamp_to_sql(issue.created_at),
            timestamp_to_sql(issue.closed_at),
            issue.is_bug as i32,
            issue.iteration,
        ],
    )?;
    Ok(())
}

fn issue_from_row(row: &Row<'_>) -> Result<Issue, rusqlite::Error> {
    Ok(Issue {
        repository_id: row.get(0)?,
        title: row.get(1)?,
        status: row.get(2)?,
        labels: json_column(row, 3)?,
        author: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
        closed_at: timestamp_column(row, 6)?,
        is_bug: row.get::<_, i32>(7)? != 0,
        iteration: row.get(8)?,
    })
}

const ISSUE_SELECT: &str = "SELECT repository_id, title, status, labels_json, author, \
     created_at, closed_at, is_bug, iteration FROM issues";

pub fn list_issues(conn: &Connection, repo_ids: &[String]) -> Result<Vec<Issue>, rusqlite::Error> {
    query_records(conn, ISSUE_SELECT, repo_ids, None, issue_from_row)
}

pub fn list_issues_created_between(
    conn: &Connection,
    repo_ids: &[String],
    range: &DateRange,
) -> Result<Vec<Issue>, rusqlite::Error> {
    query_records(
        conn,
        ISSUE_SELECT,
        repo_ids,
        Some(("created_at", range)),
        issue_from_row,
    )
}

// ── Sprints ────────────────────────────────────────────────────────

pub fn insert_sprint(conn: &Connection, sprint: &Sprint) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO sprints (repository_id, name, start_date, end_date) VALUES (?1, ?2, ?3, ?4)",
        params![
            sprint.repository_id,
            sprint.name,
            timestamp_to_sql(sprint.start_date),
            timestamp_to_sql(sprint.end_date),
        ],
    )?;
    Ok(())
}

pub fn list_sprints(
    conn: &Connection,
    repo_ids: &[String],
) -> Result<Vec<Sprint>, rusqlite::Error> {
    query_records(
        conn,
        "SELECT repository_id, name, start_date, end_date FROM sprints",
        repo_ids,
        None,
        |row| {
            Ok(Sprint {
                repository_id: row.get(0)?,
                name: row.get(1)?,
                start_date: timestamp_column(row, 2)?,
                end_date: timestamp_column(row, 3)?,
            })
        },
    )
}

// ── Daily Stats ────────────────────────────────────────────────────

pub fn upsert_daily_stats(conn: &Connection, stats: &DailyStats) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO daily_stats (repository_id, date, total_commits, bug_fix_time)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            stats.repository_id,
            day_key(stats.date),
            stats.total_commits as i64,
            stats.bug_fix_time,
        ],
    )?;
    Ok(())
}

/// Daily stats of the given projects whose day lies inside the range.
pub fn list_daily_stats_between(
    conn: &Connection,
    repo_ids: &[String],
    range: &DateRange,
) -> Result<Vec<DailyStats>, rusqlite::Error> {
    if repo_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT repository_id, date, total_commits, bug_fix_time FROM daily_stats
         WHERE repository_id IN ({}) AND date >= ? AND date <= ?
         ORDER BY repository_id, date",
        placeholders(repo_ids.len())
    );
    let mut values: Vec<String> = repo_ids.to_vec();
    values.push(day_key(range.start));
    values.push(day_key(range.end));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        Ok(DailyStats {
            repository_id: row.get(0)?,
            date: date_column(row, 1)?,
            total_commits: row.get::<_, i64>(2)? as u64,
            bug_fix_time: row.get(3)?,
        })
    })?;
    rows.collect()
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub projects: u64,
    pub pull_requests: u64,
    pub issues: u64,
    pub sprints: u64,
    pub daily_stats: u64,
}

pub fn record_counts(conn: &Connection) -> Result<RecordCounts, rusqlite::Error> {
    let count = |table: &str| -> Result<u64, rusqlite::Error> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as u64)
    };
    Ok(RecordCounts {
        projects: count("projects")?,
        pull_requests: count("pull_requests")?,
        issues: count("issues")?,
        sprints: count("sprints")?,
        daily_stats: count("daily_stats")?,
    })
}

// ── Helpers ────────────────────────────────────────────────────────

/// `?, ?, ?` for an IN list of `n` values.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Run `select` restricted to `repo_ids`, and to `[range.start, range.end]`
/// on the named timestamp column when given.
fn query_records<T, F>(
    conn: &Connection,
    select: &str,
    repo_ids: &[String],
    range_column: Option<(&str, &DateRange)>,
    map: F,
) -> Result<Vec<T>, rusqlite::Error>
where
    F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
{
    if repo_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut sql = format!(
        "{select} WHERE repository_id IN ({})",
        placeholders(repo_ids.len())
    );
    let mut values: Vec<String> = repo_ids.to_vec();
    if let Some((column, range)) = range_column {
        sql.push_str(&format!(" AND {column} >= ? AND {column} < ?"));
        values.push(timestamp_string(range.start_instant()));
        values.push(timestamp_string(range.end_instant_exclusive()));
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), map)?;
    rows.collect()
}

/// Timestamps are stored as fixed-width millisecond RFC 3339 in UTC so that
/// string comparison orders them chronologically.
fn timestamp_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn timestamp_to_sql(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(timestamp_string)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn date_column(row: &Row<'_>, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DAY_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> Result<T, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, rusqlite::Error> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;
    use crate::storage::Database;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ts(s: &str) -> Option<DateTime<Utc>> {
        Some(s.parse().unwrap())
    }

    fn project(id: &str, user_id: &str) -> Project {
        Project {
            id: id.into(),
            user_id: user_id.into(),
            name: format!("repo-{id}"),
            full_name: Some(format!("acme/repo-{id}")),
            start_date: ts("2025-01-01T00:00:00Z"),
            end_date: None,
            total_commits: 12,
            daily_deployments: vec![DailyDeployment {
                date: d(2025, 3, 2),
                count: 2,
            }],
        }
    }

    fn records(id: &str) -> ProjectRecords {
        let mut records = ProjectRecords::new(project(id, "u1"));
        records.pull_requests = vec![
            PullRequest {
                repository_id: id.into(),
                title: "Early".into(),
                author: vec![Author {
                    username: "alice".into(),
                    profile_image_url: Some("https://example.com/a.png".into()),
                }],
                created_at: ts("2025-03-01T09:00:00Z"),
                merged_at: ts("2025-03-01T18:30:00Z"),
                additions: 5,
                commit_count: Some(3),
                ..Default::default()
            },
            PullRequest {
                repository_id: id.into(),
                title: "Late".into(),
                created_at: ts("2025-03-05T09:00:00Z"),
                merged_at: ts("2025-03-06T00:00:00Z"),
                ..Default::default()
            },
        ];
        records.issues = vec![Issue {
            repository_id: id.into(),
            title: "Crash".into(),
            status: "CLOSED".into(),
            labels: vec!["bug".into(), "ui".into()],
            author: Some("bob".into()),
            created_at: ts("2025-03-01T00:00:00Z"),
            closed_at: ts("2025-03-02T00:00:00Z"),
            is_bug: true,
            iteration: Some("Sprint 1".into()),
        }];
        records.sprints = vec![Sprint {
            repository_id: id.into(),
            name: "Sprint 1".into(),
            start_date: ts("2025-03-01T00:00:00Z"),
            end_date: ts("2025-03-14T00:00:00Z"),
        }];
        records.daily_stats = vec![
            DailyStats {
                repository_id: id.into(),
                date: d(2025, 3, 1),
                total_commits: 4,
                bug_fix_time: 0.0,
            },
            DailyStats {
                repository_id: id.into(),
                date: d(2025, 3, 2),
                total_commits: 1,
                bug_fix_time: 1440.0,
            },
        ];
        records
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                set_config(conn, "top_label_count", "3")?;
                set_config(conn, "ratio_precision", "2")?;
                set_config(conn, "top_label_count", "5")?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let (value, missing, all) = db
            .reader()
            .call(|conn| {
                Ok::<_, rusqlite::Error>((
                    get_config(conn, "top_label_count")?,
                    get_config(conn, "nope")?,
                    list_config(conn)?,
                ))
            })
            .await
            .unwrap();

        assert_eq!(value.as_deref(), Some("5"));
        assert!(missing.is_none());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "ratio_precision");
    }

    #[tokio::test]
    async fn test_replace_project_records_round_trip() {
        let db = Database::open_memory().await.unwrap();
        let stored = records("p1");
        let expected = stored.clone();

        db.writer()
            .call(move |conn| replace_project_records(conn, &stored))
            .await
            .unwrap();

        let (projects, prs, issues, sprints) = db
            .reader()
            .call(|conn| {
                let ids = vec!["p1".to_string()];
                Ok::<_, rusqlite::Error>((
                    list_projects_for_user(conn, "u1")?,
                    list_pull_requests(conn, &ids)?,
                    list_issues(conn, &ids)?,
                    list_sprints(conn, &ids)?,
                ))
            })
            .await
            .unwrap();

        assert_eq!(projects, vec![expected.project]);
        assert_eq!(prs, expected.pull_requests);
        assert_eq!(issues, expected.issues);
        assert_eq!(sprints, expected.sprints);
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                replace_project_records(conn, &records("p1"))?;
                replace_project_records(conn, &records("p2"))?;
                // Second import of p1 with no pull requests or issues
                let mut fresh = records("p1");
                fresh.pull_requests.clear();
                fresh.issues.clear();
                fresh.project.daily_deployments.clear();
                replace_project_records(conn, &fresh)
            })
            .await
            .unwrap();

        let (counts, p1) = db
            .reader()
            .call(|conn| Ok::<_, rusqlite::Error>((record_counts(conn)?, get_project(conn, "p1")?)))
            .await
            .unwrap();

        assert_eq!(counts.projects, 2);
        assert_eq!(counts.pull_requests, 2);
        assert_eq!(counts.issues, 1);
        assert_eq!(counts.sprints, 2);
        assert_eq!(counts.daily_stats, 4);
        assert!(p1.unwrap().daily_deployments.is_empty());
    }

    #[tokio::test]
    async fn test_range_queries() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| replace_project_records(conn, &records("p1")))
            .await
            .unwrap();

        let range = DateRange::new(d(2025, 3, 1), d(2025, 3, 5)).unwrap();
        let (merged, created, issues, stats, none) = db
            .reader()
            .call(move |conn| {
                let ids = vec!["p1".to_string()];
                Ok::<_, rusqlite::Error>((
                    list_pull_requests_merged_between(conn, &ids, &range)?,
                    list_pull_requests_created_between(conn, &ids, &range)?,
                    list_issues_created_between(conn, &ids, &range)?,
                    list_daily_stats_between(conn, &ids, &range)?,
                    list_pull_requests(conn, &[])?,
                ))
            })
            .await
            .unwrap();

        // "Late" merged on the 6th, one day past the range
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Early");
        assert_eq!(created.len(), 2);
        assert_eq!(issues.len(), 1);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[1].bug_fix_time, 1440.0);
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_sub_second_timestamps_round_trip() {
        let db = Database::open_memory().await.unwrap();
        let mut stored = records("p1");
        stored.pull_requests.truncate(1);
        stored.pull_requests[0].created_at = ts("2025-03-01T09:00:00.123Z");
        stored.pull_requests[0].merged_at = ts("2025-03-05T23:59:59.999Z");
        let expected = stored.pull_requests.clone();

        db.writer()
            .call(move |conn| replace_project_records(conn, &stored))
            .await
            .unwrap();

        let range = DateRange::new(d(2025, 3, 1), d(2025, 3, 5)).unwrap();
        let (all, merged) = db
            .reader()
            .call(move |conn| {
                let ids = vec!["p1".to_string()];
                Ok::<_, rusqlite::Error>((
                    list_pull_requests(conn, &ids)?,
                    list_pull_requests_merged_between(conn, &ids, &range)?,
                ))
            })
            .await
            .unwrap();

        assert_eq!(all, expected);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            timestamp_string(ts("2025-03-01T09:00:00Z").unwrap()),
            "2025-03-01T09:00:00.000Z"
        );
    }

    #[tokio::test]
    async fn test_user_scoping() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                upsert_project(conn, &project("p1", "u1"))?;
                upsert_project(conn, &project("p2", "u2"))?;
                upsert_project(conn, &project("p3", "u1"))?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let (u1, users) = db
            .reader()
            .call(|conn| {
                let projects = list_projects_for_user(conn, "u1")?;
                Ok::<_, rusqlite::Error>((projects, list_user_ids(conn)?))
            })
            .await
            .unwrap();

        let ids: Vec<&str> = u1.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
        assert_eq!(users, vec!["u1", "u2"]);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
