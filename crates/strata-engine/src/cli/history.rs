// crates/strata-engine/src/cli/history.rs
// Run history commands: list runs, show a run's insights

use super::{lookup_project, path_or_cwd};
use anyhow::Result;
use std::path::{Path, PathBuf};
use strata::db::{DatabasePool, list_runs_sync, load_insights_sync};

pub async fn run_runs(db_path: &Path, path: Option<PathBuf>, limit: usize) -> Result<()> {
    let path = path_or_cwd(path);
    let pool = DatabasePool::open(db_path).await?;
    let project_id = lookup_project(&pool, &path).await?;

    let runs = pool
        .interact(move |conn| list_runs_sync(conn, project_id, limit).map_err(Into::into))
        .await?;

    if runs.is_empty() {
        println!("No runs recorded for {}", path.display());
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {}  {:<22} {:>6} commits {:>5} patterns {:>3} insights",
            run.run_id,
            run.started_at,
            run.outcome,
            run.commit_count,
            run.pattern_count,
            run.insight_count
        );
    }
    Ok(())
}

pub async fn run_insights(db_path: &Path, run_id: String, json: bool) -> Result<()> {
    let pool = DatabasePool::open(db_path).await?;
    let lookup_id = run_id.clone();
    let insights = pool
        .interact(move |conn| load_insights_sync(conn, &lookup_id))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }
    if insights.is_empty() {
        println!("No insights for run {}", run_id);
        return Ok(());
    }
    for insight in &insights {
        println!(
            "[{}] {} (confidence {:.2}, risk {})",
            insight.insight_type.as_str(),
            insight.description,
            insight.confidence,
            insight.risk.level.as_str()
        );
        for factor in &insight.risk.factors {
            println!("    * {}", factor);
        }
        for rec in &insight.recommendations {
            println!("    - {}", rec);
        }
    }
    Ok(())
}
