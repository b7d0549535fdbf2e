use clap::{Args, Parser, Subcommand};

use deliverydw::metrics::lifecycle::format_duration;
use deliverydw::metrics::{CardValue, MetricReport};
use deliverydw::{DateRange, DeliveryDW, Period};

#[derive(Parser)]
#[command(name = "deliverydw", about = "GitHub delivery metrics warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.deliverydw/deliverydw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Reporting window shared by the range-based commands.
#[derive(Args)]
struct RangeArgs {
    /// Start date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "period")]
    start: Option<String>,
    /// End date (YYYY-MM-DD, default: today)
    #[arg(long, conflicts_with = "period")]
    end: Option<String>,
    /// Period: 30d, 2025, 2025-Q1, 2025-03, 2025-W05
    #[arg(long)]
    period: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a JSON snapshot of GitHub records
    Import {
        /// Snapshot file path
        path: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// DORA metrics for a user's repositories
    Dora {
        /// Owner of the tracked repositories
        #[arg(long)]
        user: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Restrict to one repository (owner/name or GitHub URL)
        #[arg(long)]
        repo: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Dashboard summary: stat cards, cycle time breakdown, pull requests
    Dashboard {
        #[arg(long)]
        user: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sprint delivery analysis per repository
    Delivery {
        #[arg(long)]
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Format a duration in milliseconds
    Duration { ms: i64 },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show warehouse status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let dw = match &cli.db {
        Some(path) => DeliveryDW::open_at(path).await?,
        None => DeliveryDW::open().await?,
    };

    match cli.command {
        Commands::Import { path, json } => {
            let imported = dw.import_snapshot(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&imported)?);
            } else {
                for item in &imported {
                    println!(
                        "{} ({}): {} pull requests, {} issues, {} sprints, {} daily stats",
                        item.name,
                        item.project_id,
                        item.pull_requests,
                        item.issues,
                        item.sprints,
                        item.daily_stats
                    );
                }
                println!("Imported {} repositories.", imported.len());
            }
        }
        Commands::Dora {
            user,
            range,
            repo,
            json,
        } => {
            let range = resolve(&dw, &range).await?;
            let repo = repo.as_deref().map(deliverydw::parse_repo_ref).transpose()?;
            let m = dw.dora_metrics(&user, &range, repo.as_ref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&m)?);
            } else {
                println!("DORA Metrics: {user} ({} .. {})", range.start, range.end);
                print_report("Cycle time (hours)", &m.cycle_time_data);
                print_report("Deploy frequency (per day)", &m.deploy_frequency_data);
                print_report("Recovery time (minutes)", &m.mttr_data);
                print_report("Change failure rate (%)", &m.cfr_data);
            }
        }
        Commands::Dashboard { user, range, json } => {
            let range = resolve(&dw, &range).await?;
            let s = dw.dashboard(&user, &range).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&s)?);
            } else {
                println!("Dashboard: {user} ({} .. {})", range.start, range.end);
                for card in &s.stats {
                    let value = match &card.value {
                        CardValue::Count(n) => n.to_string(),
                        CardValue::Text(t) => t.clone(),
                    };
                    println!("  {:<20} {value}", card.label);
                }
                println!("  Cycle time breakdown:");
                for item in &s.extended_stats.cycle_time.items {
                    println!("    {:<10} {}", item.label, item.value);
                }
                println!("  Investment profile:");
                for item in &s.extended_stats.investment_profile.items {
                    println!("    {:<20} {}", item.label, item.value);
                }
                println!("  Pull requests: {}", s.pull_requests.len());
                for row in &s.pull_requests {
                    println!(
                        "    [{}] {} by {} (cycle {})",
                        row.repositories, row.pull_request, row.author, row.cycle_time
                    );
                }
            }
        }
        Commands::Delivery { user, json } => {
            let overview = dw.delivery(&user).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                let summary = &overview.summary_data;
                println!(
                    "Delivery: {user} ({} repositories, {} people)",
                    summary.total_projects, summary.total_people
                );
                for project in &overview.project_delivery_data {
                    println!("  {} (team of {})", project.project_name, project.team_size);
                    println!(
                        "    Planning accuracy: {:.2}%",
                        project.summary_data.planning_accuracy
                    );
                    for sprint in &project.project_delivery_metrics {
                        println!(
                            "    {:<16} added {:>3}  complete {:>3}  carryover {:>3}  ({:.2}%)",
                            sprint.sprint_name,
                            sprint.added,
                            sprint.complete,
                            sprint.carryover,
                            sprint.completion_rate
                        );
                    }
                }
            }
        }
        Commands::Config { action } => {
            handle_config(&dw, action).await?;
        }
        Commands::Status { json } => {
            let counts = dw.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            } else {
                println!("Warehouse Status");
                println!("  Projects:      {}", counts.projects);
                println!("  Pull requests: {}", counts.pull_requests);
                println!("  Issues:        {}", counts.issues);
                println!("  Sprints:       {}", counts.sprints);
                println!("  Daily stats:   {}", counts.daily_stats);
            }
        }
        Commands::Duration { ms } => {
            println!("{}", format_duration(ms));
        }
    }

    Ok(())
}

async fn resolve(dw: &DeliveryDW, args: &RangeArgs) -> anyhow::Result<DateRange> {
    let settings = dw.settings().await?;
    let today = chrono::Local::now().date_naive();
    let start = args.start.as_deref().map(deliverydw::date_util::parse_day).transpose()?;
    let end = args.end.as_deref().map(deliverydw::date_util::parse_day).transpose()?;
    let period = args
        .period
        .as_deref()
        .map(|p| Period::parse(p, today))
        .transpose()?;
    Ok(deliverydw::resolve_range(
        start,
        end,
        period.as_ref(),
        today,
        settings.default_window_days,
    )?)
}

fn print_report(title: &str, report: &MetricReport) {
    println!("  {title}:");
    for (key, value) in &report.average {
        let name = report
            .data
            .get(key)
            .and_then(|chart| chart.datasets.first())
            .map(|ds| ds.label.as_str())
            .unwrap_or(key.as_str());
        println!("    {name:<40} {value:.2}");
    }
}

async fn handle_config(dw: &DeliveryDW, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dw.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dw.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = dw.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
