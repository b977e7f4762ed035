use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diabetes_risk::db::{self, PgStore};
use diabetes_risk::{evaluate, report, Assessor, Gender, PatientSnapshot, TermDetector};

#[derive(Parser)]
#[command(name = "diabetes-risk")]
#[command(about = "Diabetes risk screening from patient notes", long_about = None)]
struct Cli {
    /// Postgres connection string for commands that read or write patients
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the reference test patients and their notes
    Seed,
    /// Import patient notes from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Assess one patient's diabetes risk
    Assess {
        patient_id: i64,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assess every patient and write a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Classify ad-hoc demographics and note text without a database
    Evaluate {
        #[arg(long)]
        age: i32,
        #[arg(long)]
        gender: String,
        #[arg(long = "note")]
        notes: Vec<String>,
    },
    /// List the trigger-term vocabulary
    Terms,
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url =
        database_url.context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diabetes_risk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let database_url = cli.database_url.as_deref();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(database_url).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(database_url).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(database_url).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} notes from {}.", csv.display());
        }
        Commands::Assess { patient_id, json } => {
            let pool = connect(database_url).await?;
            let store = PgStore::new(pool);
            let assessor = Assessor::new(store.clone(), store);
            let result = assessor.assess(patient_id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{} ({} y, {}): {} ({} trigger terms)",
                    result.patient_name,
                    result.patient_age,
                    result.patient_gender,
                    result.risk_level,
                    result.trigger_term_count
                );
                if !result.matched_terms.is_empty() {
                    println!("Matched: {}", result.matched_terms.join(", "));
                }
            }
        }
        Commands::Report { out } => {
            let pool = connect(database_url).await?;
            let store = PgStore::new(pool);
            let patient_ids = store.patient_ids().await?;
            let assessor = Assessor::new(store.clone(), store);

            let generated_at = Utc::now();
            let mut results = Vec::with_capacity(patient_ids.len());
            for patient_id in patient_ids {
                results.push(assessor.assess_at(patient_id, generated_at).await?);
            }

            let report = report::build_report(generated_at, &results);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Evaluate { age, gender, notes } => {
            let snapshot = PatientSnapshot {
                age,
                gender: Gender::parse(&gender),
            };
            let evaluation = evaluate(
                &TermDetector::standard(),
                snapshot,
                notes.iter().map(String::as_str),
            );
            println!(
                "{} ({} trigger terms)",
                evaluation.risk_level, evaluation.trigger_term_count
            );
            if !evaluation.matched_terms.is_empty() {
                println!("Matched: {}", evaluation.matched_terms.join(", "));
            }
        }
        Commands::Terms => {
            for term in TermDetector::standard().terms() {
                println!("- {term}");
            }
        }
    }

    Ok(())
}
