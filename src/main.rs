use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coaching_ops::capacity::{self, validate_default_capacity};
use coaching_ops::config::Config;
use coaching_ops::models::{CapacityCeiling, NpsScore};
use coaching_ops::report::{self, ReportInput};
use coaching_ops::{db, nps};

#[derive(Parser)]
#[command(name = "coach-ops")]
#[command(about = "Coach capacity and NPS reporting for coaching operations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import NPS survey responses from a CSV file
    ImportNps {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import client unit calculations from a CSV file
    ImportUnits {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Set the capacity used by coaches without an explicit ceiling
    SetDefaultCapacity { units: f64 },
    /// Set or clear a coach's explicit capacity ceiling
    #[command(group(
        ArgGroup::new("ceiling")
            .args(["units", "clear"])
            .required(true)
            .multiple(false)
    ))]
    SetCapacity {
        #[arg(long)]
        email: String,
        #[arg(long)]
        units: Option<f64>,
        /// Fall back to the default capacity
        #[arg(long)]
        clear: bool,
    },
    /// Pause a coach so they take no new clients
    Pause {
        #[arg(long)]
        email: String,
    },
    /// Resume a paused coach
    Resume {
        #[arg(long)]
        email: String,
    },
    /// Show capacity utilization per coach
    Capacity {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show Net Promoter Score overall and per coach
    Nps {
        #[arg(long)]
        coach: Option<String>,
        #[arg(long, default_value_t = 90)]
        since_days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown operations report
    Report {
        #[arg(long)]
        coach: Option<String>,
        #[arg(long, default_value_t = 90)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportNps { csv } => {
            let inserted = db::import_nps_csv(&pool, &csv).await?;
            println!("Inserted {inserted} NPS responses from {}.", csv.display());
        }
        Commands::ImportUnits { csv } => {
            let inserted = db::import_units_csv(&pool, &csv).await?;
            println!("Inserted {inserted} unit rows from {}.", csv.display());
        }
        Commands::SetDefaultCapacity { units } => {
            db::set_default_capacity(&pool, units).await?;
            println!("Default capacity set to {units} units.");
        }
        Commands::SetCapacity {
            email,
            units,
            clear,
        } => {
            let ceiling = match units {
                Some(units) if !clear => CapacityCeiling::explicit(units)?,
                _ => CapacityCeiling::UseDefault,
            };
            db::set_coach_capacity(&pool, &email, ceiling).await?;
            match ceiling {
                CapacityCeiling::Explicit(units) => {
                    println!("Capacity for {email} set to {units} units.")
                }
                CapacityCeiling::UseDefault => {
                    println!("Capacity for {email} now follows the default.")
                }
            }
        }
        Commands::Pause { email } => {
            db::set_coach_paused(&pool, &email, true).await?;
            println!("{email} paused.");
        }
        Commands::Resume { email } => {
            db::set_coach_paused(&pool, &email, false).await?;
            println!("{email} resumed.");
        }
        Commands::Capacity { email, json } => {
            let global_default = resolve_default_capacity(&pool, &config).await?;
            let coaches = db::fetch_coaches(&pool, email.as_deref()).await?;
            let units = db::fetch_client_units(&pool, email.as_deref()).await?;
            let capacities = capacity::summarize_coaches(&coaches, &units, global_default);

            if json {
                println!("{}", serde_json::to_string_pretty(&capacities)?);
                return Ok(());
            }

            if capacities.is_empty() {
                println!("No coaches found.");
                return Ok(());
            }

            println!("Coach utilization (default capacity {global_default} units):");
            for coach in &capacities {
                println!(
                    "- {} ({}) {:.1}/{:.1} units, {}% [{}], {} active clients",
                    coach.coach_name,
                    coach.coach_email,
                    coach.state.current_units,
                    coach.state.effective_capacity,
                    coach.state.utilization_percentage,
                    coach.level,
                    coach.active_clients
                );
            }
        }
        Commands::Nps {
            coach,
            since_days,
            json,
        } => {
            let since_date = nps::cutoff_date(since_days);
            let responses = db::fetch_nps_responses(&pool, since_date, coach.as_deref()).await?;
            let scores: Vec<NpsScore> = responses.iter().map(|response| response.score).collect();
            let overall = nps::aggregate_from_scores(&scores);
            let by_coach = nps::nps_by_coach(&responses);

            if json {
                let payload = serde_json::json!({
                    "since": since_date,
                    "overall": overall,
                    "byCoach": by_coach,
                    "trend": nps::monthly_trend(&responses),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }

            println!("NPS since {since_date}: {}", report::describe_nps(&overall));
            for entry in &by_coach {
                println!("- {}: {}", entry.coach_name, report::describe_nps(&entry.result));
            }
        }
        Commands::Report {
            coach,
            since_days,
            out,
        } => {
            let since_date = nps::cutoff_date(since_days);
            let global_default = resolve_default_capacity(&pool, &config).await?;
            let coaches = db::fetch_coaches(&pool, coach.as_deref()).await?;
            let units = db::fetch_client_units(&pool, coach.as_deref()).await?;
            let responses = db::fetch_nps_responses(&pool, since_date, coach.as_deref()).await?;

            let capacities = capacity::summarize_coaches(&coaches, &units, global_default);
            let scores: Vec<NpsScore> = responses.iter().map(|response| response.score).collect();
            let overall = nps::aggregate_from_scores(&scores);
            let by_coach = nps::nps_by_coach(&responses);
            let trend = nps::monthly_trend(&responses);

            let report = report::build_report(&ReportInput {
                scope: coach.as_deref(),
                since_days,
                cutoff: since_date,
                capacities: &capacities,
                overall: &overall,
                by_coach: &by_coach,
                trend: &trend,
                responses: &responses,
            });
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), "report written");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

/// Stored default capacity, or the configured fallback when none is stored.
async fn resolve_default_capacity(pool: &PgPool, config: &Config) -> anyhow::Result<f64> {
    match db::fetch_default_capacity(pool).await? {
        Some(units) => Ok(validate_default_capacity(units)
            .context("stored default coach capacity is invalid")?),
        None => {
            warn!(
                fallback = config.fallback_capacity,
                "no default capacity stored; using configured fallback"
            );
            Ok(config.fallback_capacity)
        }
    }
}
