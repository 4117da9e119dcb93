use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::{Config, LogFormat};
use database::ConnectionSupervisor;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// The main entry point for the AdventureWorks API.
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment and config.toml still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// REST API over the AdventureWorks sales database.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file. Defaults to ./config.toml when it exists.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `logging.format`.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Connect to the database and serve the HTTP API (the default).
    Serve,
    /// Connect once, run a health check and print the result as JSON.
    Check,
    /// Print the effective configuration, password redacted.
    ShowConfig,
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = configuration::load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::ShowConfig => {
            println!("{}", config_table(&config));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let _guard = configuration::init_tracing(&config.logging)?;
            handle_check(config).await
        }
        Commands::Serve => {
            let _guard = configuration::init_tracing(&config.logging)?;
            handle_serve(config).await
        }
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Connects with the bounded retry policy, serves until a signal arrives, then
/// closes the pool.
async fn handle_serve(config: Config) -> Result<ExitCode> {
    let addr = config.server.socket_addr()?;
    let supervisor = Arc::new(ConnectionSupervisor::postgres(config.database));

    if let Err(e) = supervisor.connect().await {
        tracing::error!(error = %e, "Could not connect to the database; exiting");
        supervisor.shutdown().await;
        return Ok(ExitCode::FAILURE);
    }

    let served = web_server::run_server(addr, supervisor.clone()).await;

    supervisor.shutdown().await;
    served?;
    tracing::info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}

async fn handle_check(config: Config) -> Result<ExitCode> {
    let supervisor = ConnectionSupervisor::postgres(config.database);

    let connected = supervisor.connect().await;
    let healthy = connected.is_ok() && supervisor.health_check().await;
    let report = serde_json::json!({
        "database": supervisor.config().describe(),
        "state": supervisor.state().await,
        "healthy": healthy,
        "pool": supervisor.pool_status().await,
        "error": connected.err().map(|e| supervisor.config().redact(&e.to_string())),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    supervisor.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if healthy { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn config_table(config: &Config) -> Table {
    let db = &config.database;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Setting", "Value"]);

    let rows: Vec<(&str, String)> = vec![
        ("server.host", config.server.host.clone()),
        ("server.port", config.server.port.to_string()),
        ("database.host", db.host.clone()),
        ("database.port", db.port.to_string()),
        ("database.database", db.database.clone()),
        ("database.user", db.user.clone()),
        ("database.password", db.password.to_string()),
        ("database.encrypt", db.encrypt.to_string()),
        ("database.trust_server_certificate", db.trust_server_certificate.to_string()),
        ("database.connect_timeout_ms", db.connect_timeout_ms.to_string()),
        ("database.request_timeout_ms", db.request_timeout_ms.to_string()),
        ("database.health_check_timeout_ms", db.health_check_timeout_ms.to_string()),
        ("database.shutdown_timeout_ms", db.shutdown_timeout_ms.to_string()),
        ("database.pool.min_connections", db.pool.min_connections.to_string()),
        ("database.pool.max_connections", db.pool.max_connections.to_string()),
        ("database.pool.idle_timeout_ms", db.pool.idle_timeout_ms.to_string()),
        ("database.pool.acquire_timeout_ms", db.pool.acquire_timeout_ms.to_string()),
        ("database.retry.max_attempts", db.retry.max_attempts.to_string()),
        ("database.retry.delay_ms", db.retry.delay_ms.to_string()),
        ("logging.filter", config.logging.filter.clone()),
        ("logging.format", format!("{:?}", config.logging.format).to_lowercase()),
        (
            "logging.directory",
            config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "(stdout)".to_string()),
        ),
    ];
    for (key, value) in rows {
        table.add_row(vec![key.to_string(), value]);
    }
    table
}
