// src/main.rs
// Strata - change-pattern detection for git history

use anyhow::Result;
use clap::Parser;
use strata::config::{EnvConfig, StrataConfig};
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

mod cli;

use cli::{Cli, Commands};

fn log_level(verbose: bool, env_level: Option<&str>) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    env_level
        .and_then(|name| name.parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env files (global first, then project - project overrides)
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".strata/.env"));
    }
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let env = EnvConfig::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli.verbose, env.log_level.as_deref()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = StrataConfig::load(cli.config.as_deref());
    env.apply(&mut config);
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
    debug!(db = %db_path.display(), "Using database");

    match cli.command {
        Commands::Ingest {
            path,
            rev,
            max_commits,
        } => {
            cli::run_ingest(&db_path, path, rev, max_commits).await?;
        }
        Commands::Analyze {
            path,
            from,
            to,
            json,
            no_persist,
        } => {
            let args = cli::analyze::AnalyzeArgs {
                path,
                from,
                to,
                json,
                no_persist,
            };
            cli::run_analyze(&db_path, config.analysis, args).await?;
        }
        Commands::Runs { path, limit } => {
            cli::run_runs(&db_path, path, limit).await?;
        }
        Commands::Insights { run, json } => {
            cli::run_insights(&db_path, run, json).await?;
        }
    }

    Ok(())
}
