use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::date_util::DateRange;
use crate::metrics::lifecycle::PhaseTotals;

/// One named data series in a chart payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// Chart payload: `{labels, datasets: [{label, data}]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// One DORA metric over every repository, plus the `"average"` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricReport {
    /// Keyed by repository id, with `"average"` last.
    pub data: IndexMap<String, ChartData>,
    /// Scalar mean of each entry in `data`.
    pub average: IndexMap<String, f64>,
    /// Days in the requested range; set for deploy frequency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_days: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoraMetrics {
    pub range: DateRange,
    pub cycle_time_data: MetricReport,
    pub deploy_frequency_data: MetricReport,
    pub mttr_data: MetricReport,
    pub cfr_data: MetricReport,
}

/// A `{label, value}` count bucket (investment profile, label summary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileItem {
    pub label: String,
    pub value: u64,
}

/// A `{label, ratio}` percentage bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRatio {
    pub label: String,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentProfile {
    pub items: Vec<ProfileItem>,
}

// ── Dashboard ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CardValue {
    Count(u64),
    Text(String),
}

/// A formatted stat card: `{icon, value, label}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatCard {
    pub icon: String,
    pub value: CardValue,
    pub label: String,
}

/// A formatted duration with its phase name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationItem {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleTimeBreakdown {
    pub items: Vec<DurationItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedStats {
    pub cycle_time: CycleTimeBreakdown,
    pub investment_profile: InvestmentProfile,
}

/// One pull request in the cycle-time listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRow {
    pub pull_request: String,
    pub author: String,
    pub repositories: String,
    pub cycle_time: String,
    pub coding_time: String,
    pub pick_up: String,
    pub review: String,
    pub deploy: String,
    pub commits: Option<u64>,
    pub pr_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub range: DateRange,
    pub total_commits: u64,
    pub total_contributors: usize,
    pub time_stats: PhaseTotals,
    pub stats: Vec<StatCard>,
    pub extended_stats: ExtendedStats,
    pub pull_requests: Vec<PullRequestRow>,
}

// ── Delivery ───────────────────────────────────────────────────────

/// Per-sprint added/completed/carryover counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintDelivery {
    pub sprint_name: String,
    pub added: usize,
    pub complete: usize,
    pub carryover: usize,
    /// `complete / (complete + carryover) * 100`.
    pub completion_rate: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintAccuracy {
    pub sprint_name: String,
    pub planning_accuracy: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanningAccuracy {
    pub overall: f64,
    pub sprints: Vec<SprintAccuracy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintInvestmentProfile {
    pub sprint_name: String,
    pub investment_profile: Vec<LabelRatio>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintActivity {
    pub sprint_name: String,
    pub active_people: usize,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveContributor {
    pub name: String,
    /// Rounded `additions + deletions * 0.5` over the author's pull requests.
    pub active: i64,
    pub profile_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintWindow {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub active_people: usize,
    pub investment_profile: Vec<ProfileItem>,
    pub planning_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDelivery {
    pub project_id: String,
    pub project_name: String,
    pub team_size: usize,
    pub top_labels: Vec<ProfileItem>,
    pub most_active: Vec<ActiveContributor>,
    pub sprint_activity: Vec<SprintActivity>,
    pub project_date: Vec<SprintWindow>,
    pub overall_investment_profile: InvestmentProfile,
    pub sprint_investment_profiles: Vec<SprintInvestmentProfile>,
    pub project_delivery_metrics: Vec<SprintDelivery>,
    pub planning_accuracy: Option<PlanningAccuracy>,
    pub summary_data: ProjectSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationLabelRatios {
    pub iteration: String,
    pub label_ratios: Vec<LabelRatio>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_projects: usize,
    pub total_people: usize,
    pub label_summary: Vec<ProfileItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOverview {
    pub iteration_label_ratios: Vec<IterationLabelRatios>,
    pub project_delivery_data: Vec<ProjectDelivery>,
    pub summary_data: PortfolioSummary,
}
