// crates/strata-engine/src/cli/analyze.rs
// Pattern detection command and report printing

use super::{lookup_project, path_or_cwd};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata::config::AnalysisConfig;
use strata::db::DatabasePool;
use strata::engine::{AnalysisRequest, PatternEngine};
use strata_types::{AlgorithmReport, AnalysisReport};

/// Rows printed per pattern section
const TOP_N: usize = 5;

pub struct AnalyzeArgs {
    pub path: Option<PathBuf>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub json: bool,
    pub no_persist: bool,
}

pub async fn run_analyze(db_path: &Path, config: AnalysisConfig, args: AnalyzeArgs) -> Result<()> {
    let path = path_or_cwd(args.path);
    let pool = Arc::new(DatabasePool::open(db_path).await?);
    let project_id = lookup_project(&pool, &path).await?;

    let mut engine = PatternEngine::new(pool.clone(), config);
    if !args.no_persist {
        engine = engine.with_sink(pool.clone());
    }

    let request = AnalysisRequest::new(project_id).with_range(args.from, args.to);
    let report = engine.run(request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn section<T>(title: &str, report: &AlgorithmReport<T>) {
    println!(
        "\n{} ({} patterns, {}ms, mean {:.2})",
        title,
        report.patterns.len(),
        report.execution_ms,
        report.stats.mean_score
    );
    if let strata_types::AlgorithmStatus::Failed { error } = &report.status {
        println!("  FAILED: {}", error);
    }
}

fn print_report(report: &AnalysisReport) {
    println!("Run {} ({})", report.run_id, report.outcome.as_str());
    println!(
        "{} commits analyzed in {}ms",
        report.commit_count, report.timings.total_ms
    );

    section("Co-occurrence", &report.cooccurrence);
    for p in report.cooccurrence.patterns.iter().take(TOP_N) {
        println!(
            "  {} <-> {}  lift {:.2}  confidence {:.2}  [{}]",
            p.file_a,
            p.file_b,
            p.lift,
            p.confidence,
            p.strength.as_str()
        );
    }

    section("Temporal", &report.temporal);
    for p in &report.temporal.patterns {
        println!(
            "  {:<8} significance {:.2}  peaks: {}",
            p.period_type.as_str(),
            p.significance,
            p.peak_bins.join(", ")
        );
    }

    section("Developers", &report.developer);
    for p in report.developer.patterns.iter().take(TOP_N) {
        println!(
            "  {}  {} commits  {:.1}/week  consistency {:.2}",
            p.author.email, p.commit_count, p.velocity, p.consistency
        );
    }

    section("Magnitude", &report.magnitude);
    for p in report.magnitude.patterns.iter().take(TOP_N) {
        println!(
            "  {}  {}  anomaly {:.2}  risk {}",
            p.file_path,
            p.size_category.as_str(),
            p.anomaly_score,
            p.risk_level.as_str()
        );
    }

    println!("\nInsights ({})", report.insights.len());
    for insight in &report.insights {
        println!(
            "  [{}] {} (confidence {:.2}, risk {})",
            insight.insight_type.as_str(),
            insight.description,
            insight.confidence,
            insight.risk.level.as_str()
        );
        for rec in &insight.recommendations {
            println!("    - {}", rec);
        }
    }

    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
}
