// crates/strata-engine/src/db/runs.rs
// Run persistence (append-only per run id) and run history queries

use super::pool::DatabasePool;
use crate::error::Result as StrataResult;
use crate::source::PatternSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, params};
use serde::Serialize;
use std::sync::Arc;
use strata_types::{
    AlgorithmStatus, AnalysisReport, Insight, InsightType, PatternRef, RiskAssessment, RiskLevel,
    SummaryStats,
};

/// One row of run history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub from_commit: Option<String>,
    pub to_commit: Option<String>,
    pub started_at: String,
    pub outcome: String,
    pub commit_count: i64,
    pub pattern_count: i64,
    pub insight_count: i64,
}

fn insert_algorithm_run(
    conn: &Connection,
    run_id: &str,
    algorithm: &str,
    status: &AlgorithmStatus,
    execution_ms: u64,
    stats: &SummaryStats,
) -> rusqlite::Result<()> {
    let (status_str, error) = match status {
        AlgorithmStatus::Succeeded { .. } => ("succeeded", None),
        AlgorithmStatus::Failed { error } => ("failed", Some(error.as_str())),
    };
    conn.execute(
        "INSERT INTO algorithm_runs
            (run_id, algorithm, status, error, skipped_records, execution_ms, pattern_count,
             mean_score, std_dev, significance_threshold, anomaly_count)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            run_id,
            algorithm,
            status_str,
            error,
            status.skipped_records() as i64,
            execution_ms as i64,
            stats.pattern_count as i64,
            stats.mean_score,
            stats.std_dev,
            stats.significance_threshold,
            stats.anomaly_count as i64,
        ],
    )?;
    Ok(())
}

/// Write a whole run in one transaction. A run id can only be written once.
pub fn persist_run_sync(conn: &Connection, report: &AnalysisReport) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    let run_id = report.run_id.as_str();

    tx.execute(
        "INSERT INTO analysis_runs
            (run_id, project_id, from_commit, to_commit, started_at, outcome, commit_count,
             pattern_count, insight_count, timings_json, warnings_json)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            run_id,
            report.project_id,
            report.range.from,
            report.range.to,
            report.started_at,
            report.outcome.as_str(),
            report.commit_count as i64,
            report.total_patterns() as i64,
            report.insights.len() as i64,
            serde_json::to_string(&report.timings)?,
            serde_json::to_string(&report.warnings)?,
        ],
    )
    .with_context(|| format!("Failed to record run {}", run_id))?;

    insert_algorithm_run(
        &tx,
        run_id,
        "cooccurrence",
        &report.cooccurrence.status,
        report.cooccurrence.execution_ms,
        &report.cooccurrence.stats,
    )?;
    insert_algorithm_run(
        &tx,
        run_id,
        "temporal",
        &report.temporal.status,
        report.temporal.execution_ms,
        &report.temporal.stats,
    )?;
    insert_algorithm_run(
        &tx,
        run_id,
        "developer",
        &report.developer.status,
        report.developer.execution_ms,
        &report.developer.stats,
    )?;
    insert_algorithm_run(
        &tx,
        run_id,
        "magnitude",
        &report.magnitude.status,
        report.magnitude.execution_ms,
        &report.magnitude.stats,
    )?;

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO cooccurrence_patterns
                (run_id, file_a, file_b, cooccurrence_count, support, confidence, lift,
                 strength, commits_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for p in &report.cooccurrence.patterns {
            stmt.execute(params![
                run_id,
                p.file_a,
                p.file_b,
                p.cooccurrence_count,
                p.support,
                p.confidence,
                p.lift,
                p.strength.as_str(),
                serde_json::to_string(&p.commits)?,
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO temporal_patterns
                (run_id, period_type, bins_json, peak_bins_json, significance, chi_square,
                 authors_json, files_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for p in &report.temporal.patterns {
            stmt.execute(params![
                run_id,
                p.period_type.as_str(),
                serde_json::to_string(&p.bins)?,
                serde_json::to_string(&p.peak_bins)?,
                p.significance,
                p.chi_square,
                serde_json::to_string(&p.contributing_authors)?,
                serde_json::to_string(&p.contributing_files)?,
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO developer_patterns
                (run_id, author_email, author_name, commit_count, specialties_json, velocity,
                 consistency, collaborators_json, shared_files_json, avg_files_per_commit,
                 avg_lines_per_commit, commit_types_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for p in &report.developer.patterns {
            stmt.execute(params![
                run_id,
                p.author.email,
                p.author.name,
                p.commit_count,
                serde_json::to_string(&p.specialty_files)?,
                p.velocity,
                p.consistency,
                serde_json::to_string(&p.collaborators)?,
                serde_json::to_string(&p.shared_files)?,
                p.avg_files_per_commit,
                p.avg_lines_per_commit,
                serde_json::to_string(&p.commit_types)?,
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO magnitude_patterns
                (run_id, file_path, size_category, avg_lines_changed, std_dev_lines,
                 change_count, contributor_count, lifespan_days, frequency_score,
                 volatility_score, trend, anomaly_score, risk_level)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for p in &report.magnitude.patterns {
            stmt.execute(params![
                run_id,
                p.file_path,
                p.size_category.as_str(),
                p.avg_lines_changed,
                p.std_dev_lines,
                p.change_count,
                p.contributor_count,
                p.lifespan_days,
                p.frequency_score,
                p.volatility_score,
                p.trend.as_str(),
                p.anomaly_score,
                p.risk_level.as_str(),
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO frequency_patterns
                (run_id, file_path, change_frequency, hotspot_score, stability_score,
                 contributor_diversity, change_types_json)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        for p in &report.frequency_patterns {
            stmt.execute(params![
                run_id,
                p.file_path,
                p.change_frequency,
                p.hotspot_score,
                p.stability_score,
                p.contributor_diversity,
                serde_json::to_string(&p.change_types)?,
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO insights
                (run_id, insight_type, description, confidence, patterns_json,
                 recommendations_json, risk_level, risk_factors_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for insight in &report.insights {
            stmt.execute(params![
                run_id,
                insight.insight_type.as_str(),
                insight.description,
                insight.confidence,
                serde_json::to_string(&insight.supporting_patterns)?,
                serde_json::to_string(&insight.recommendations)?,
                insight.risk.level.as_str(),
                serde_json::to_string(&insight.risk.factors)?,
            ])?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Runs for a project, newest first
pub fn list_runs_sync(
    conn: &Connection,
    project_id: i64,
    limit: usize,
) -> rusqlite::Result<Vec<RunSummary>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, from_commit, to_commit, started_at, outcome, commit_count,
                pattern_count, insight_count
         FROM analysis_runs
         WHERE project_id = ?
         ORDER BY started_at DESC, rowid DESC
         LIMIT ?",
    )?;
    let rows = stmt.query_map(params![project_id, limit as i64], |row| {
        Ok(RunSummary {
            run_id: row.get(0)?,
            from_commit: row.get(1)?,
            to_commit: row.get(2)?,
            started_at: row.get(3)?,
            outcome: row.get(4)?,
            commit_count: row.get(5)?,
            pattern_count: row.get(6)?,
            insight_count: row.get(7)?,
        })
    })?;
    rows.collect()
}

/// Insights of one run in the order they were synthesized
pub fn load_insights_sync(conn: &Connection, run_id: &str) -> Result<Vec<Insight>> {
    let mut stmt = conn.prepare(
        "SELECT insight_type, description, confidence, patterns_json, recommendations_json,
                risk_level, risk_factors_json
         FROM insights
         WHERE run_id = ?
         ORDER BY id",
    )?;
    let rows = stmt.query_map([run_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut insights = Vec::new();
    for row in rows {
        let (kind, description, confidence, patterns, recommendations, level, factors) = row?;
        let Some(insight_type) = InsightType::from_str(&kind) else {
            tracing::warn!("Skipping insight with unknown type '{}' in run {}", kind, run_id);
            continue;
        };
        let supporting_patterns: Vec<PatternRef> = serde_json::from_str(&patterns)?;
        insights.push(Insight {
            insight_type,
            description,
            confidence,
            supporting_patterns,
            recommendations: serde_json::from_str(&recommendations)?,
            risk: RiskAssessment {
                level: RiskLevel::from_str(&level).unwrap_or(RiskLevel::Low),
                factors: serde_json::from_str(&factors)?,
            },
        });
    }
    Ok(insights)
}

#[async_trait]
impl PatternSink for DatabasePool {
    async fn persist_run(&self, report: &AnalysisReport) -> StrataResult<()> {
        let report = Arc::new(report.clone());
        self.interact_with_retry(move |conn| persist_run_sync(conn, &report))
            .await?;
        Ok(())
    }
}
