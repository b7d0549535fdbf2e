pub mod config;
pub mod date_util;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod query;
pub mod repo_ref;
pub mod storage;

pub use config::MetricsSettings;
pub use date_util::DateRange;
pub use error::{Error, Result};
pub use metrics::{DashboardSummary, DeliveryOverview, DoraMetrics};
pub use query::period::{resolve_range, Period};
pub use repo_ref::{parse_repo_ref, RepoRef};
pub use storage::repository::RecordCounts;
pub use storage::Database;

use std::path::Path;

use serde::Serialize;

use ingest::Snapshot;
use storage::repository;

/// Records written for one repository by an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedProject {
    pub project_id: String,
    pub name: String,
    pub pull_requests: usize,
    pub issues: usize,
    pub sprints: usize,
    pub daily_stats: usize,
}

/// Main entry point for the delivery metrics warehouse.
pub struct DeliveryDW {
    db: Database,
}

impl DeliveryDW {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the warehouse at the default path.
    pub async fn open() -> Result<Self> {
        Ok(Self::new(Database::open().await?))
    }

    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open_at(path).await?))
    }

    pub async fn open_memory() -> Result<Self> {
        Ok(Self::new(Database::open_memory().await?))
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub async fn settings(&self) -> Result<MetricsSettings> {
        metrics::load_settings(&self.db).await
    }

    // ── Import ───────────────────────────────────────────────────

    /// Import a JSON snapshot file, replacing each listed repository's records.
    pub async fn import_snapshot(&self, path: impl AsRef<Path>) -> Result<Vec<ImportedProject>> {
        let snapshot = Snapshot::from_path(path)?;
        self.import(snapshot).await
    }

    pub async fn import(&self, snapshot: Snapshot) -> Result<Vec<ImportedProject>> {
        let prepared = ingest::prepare_snapshot(snapshot)?;
        let summary: Vec<ImportedProject> = prepared
            .iter()
            .map(|records| ImportedProject {
                project_id: records.project.id.clone(),
                name: records.project.display_name().to_string(),
                pull_requests: records.pull_requests.len(),
                issues: records.issues.len(),
                sprints: records.sprints.len(),
                daily_stats: records.daily_stats.len(),
            })
            .collect();

        self.db
            .writer()
            .call(move |conn| {
                for records in &prepared {
                    repository::replace_project_records(conn, records)?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await?;

        for item in &summary {
            log::info!(
                "Imported {}: {} pull requests, {} issues, {} sprints, {} daily stats",
                item.name,
                item.pull_requests,
                item.issues,
                item.sprints,
                item.daily_stats
            );
        }
        Ok(summary)
    }

    // ── Metrics ──────────────────────────────────────────────────

    pub async fn dora_metrics(
        &self,
        user_id: &str,
        range: &DateRange,
        repo: Option<&RepoRef>,
    ) -> Result<DoraMetrics> {
        metrics::compute_user_dora(&self.db, user_id, range, repo).await
    }

    pub async fn dashboard(&self, user_id: &str, range: &DateRange) -> Result<DashboardSummary> {
        let settings = self.settings().await?;
        metrics::compute_user_dashboard(&self.db, user_id, range, &settings).await
    }

    pub async fn delivery(&self, user_id: &str) -> Result<DeliveryOverview> {
        let settings = self.settings().await?;
        metrics::compute_user_delivery(&self.db, user_id, &settings).await
    }

    // ── Status ───────────────────────────────────────────────────

    pub async fn status(&self) -> Result<RecordCounts> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::record_counts(conn))
            .await?)
    }

    pub async fn user_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::list_user_ids(conn))
            .await?)
    }

    // ── Config commands ──────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await?)
    }

    /// Store a setting after checking the key is known and the value parses.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        config::validate(key, value)?;
        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await?;
        Ok(())
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?)
    }
}
