//! Sluicegate Migration CLI
//!
//! Command-line driver for the sluicegate migration runner. Exposes the same
//! modes as the deployed handler: the default migration run, history and
//! ad-hoc query inspection, and one-off fix scripts.

use anyhow::bail;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use sluicegate::handler::ResponseBody;
use sluicegate::{connect, handle, AppConfig, HistoryStore, MigrationEvent, PgExecutor};
use std::process;

#[derive(Parser)]
#[command(name = "sluicegate")]
#[command(about = "Versioned SQL migration runner for PostgreSQL")]
#[command(version = "0.1.0")]
struct Cli {
    /// Migrations directory path (overrides configuration)
    #[arg(long)]
    migrations_dir: Option<String>,

    /// Schema owning the migration history table (overrides configuration)
    #[arg(long)]
    schema: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations
    Run,

    /// Show the recorded migration history
    History,

    /// Run a read-only SQL query and print the rows as JSON
    Query {
        /// SQL statement to execute
        sql: String,
    },

    /// Run an auxiliary fix script from the migrations directory
    Fix {
        /// Script file name (default: fix_partners.sql)
        #[arg(long)]
        script: Option<String>,
    },
}

fn main() {
    dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    if cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    } else if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Some(dir) = cli.migrations_dir {
        config.runner.migrations_dir = dir;
    }
    if let Some(schema) = cli.schema {
        config.runner.history_schema = schema;
    }

    let result = match cli.command {
        Commands::Run => handle_run(&config),
        Commands::History => handle_history(&config),
        Commands::Query { sql } => handle_query(&config, &sql),
        Commands::Fix { script } => handle_fix(&config, script),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        process::exit(1);
    }
}

/// Unwrap a handler response, turning a failure body into an error
fn ensure_ok(response: sluicegate::MigrationResponse) -> anyhow::Result<ResponseBody> {
    if response.is_success() {
        Ok(response.body)
    } else {
        bail!(response
            .body
            .error
            .unwrap_or_else(|| "unknown failure".to_string()))
    }
}

fn handle_run(config: &AppConfig) -> anyhow::Result<()> {
    let body = ensure_ok(handle(config, &MigrationEvent::default()))?;

    println!(
        "✅ Applied {} migration(s), {} skipped, {} recorded in total",
        body.applied.unwrap_or(0),
        body.skipped.unwrap_or(0),
        body.total.unwrap_or(0),
    );
    Ok(())
}

fn handle_history(config: &AppConfig) -> anyhow::Result<()> {
    let client = connect(&config.database.connection_string())?;
    let executor = PgExecutor::new(client);
    let store = HistoryStore::new(config.runner.history_schema.clone());
    let records = store.list_all(&executor)?;

    if records.is_empty() {
        println!("No migrations recorded yet");
        return Ok(());
    }

    println!("\n📊 Migration History\n");
    for record in &records {
        let marker = if record.success { "✓" } else { "✗" };
        println!(
            "  {} {:>4}  V{} {} ({}, {}ms, {})",
            marker,
            record.installed_rank,
            record.version,
            record.description,
            record.installed_on.format("%Y-%m-%d %H:%M:%S"),
            record.execution_time_ms,
            record.installed_by,
        );
    }
    println!("\n📈 {} migration(s) recorded", records.len());

    Ok(())
}

fn handle_query(config: &AppConfig, sql: &str) -> anyhow::Result<()> {
    let event = MigrationEvent {
        query_only: true,
        query: Some(sql.to_string()),
        ..MigrationEvent::default()
    };
    let body = ensure_ok(handle(config, &event))?;

    let rows = body.rows.unwrap_or_default();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn handle_fix(config: &AppConfig, script: Option<String>) -> anyhow::Result<()> {
    let event = MigrationEvent {
        run_fix: true,
        script,
        ..MigrationEvent::default()
    };
    ensure_ok(handle(config, &event))?;

    println!("✅ Fix applied successfully");
    Ok(())
}
