// crates/strata-engine/src/engine.rs
// Run orchestration: fetch -> analyze (parallel) -> synthesize -> persist -> report
//
// The four analyzers run as blocking tasks over one shared, immutable dataset
// and are joined before synthesis. The wall-clock budget covers fetch through
// synthesis; persistence happens after and never fails the run.

use crate::config::AnalysisConfig;
use crate::error::{Result, StrataError};
use crate::insights::{self, PatternSet};
use crate::patterns::{
    AnalyzerOutput, ChangeDataset, MagnitudeOutput, cooccurrence, developer, magnitude, temporal,
};
use crate::source::{ChangeSource, PatternSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use strata_types::{
    Algorithm, AlgorithmReport, AlgorithmStatus, AnalysisReport, CommitRange, RunOutcome,
    RunTimings, SummaryStats,
};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

/// What to analyze: a project and an optional commit range
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub project_id: i64,
    pub range: CommitRange,
}

impl AnalysisRequest {
    pub fn new(project_id: i64) -> Self {
        Self {
            project_id,
            range: CommitRange::default(),
        }
    }

    pub fn with_range(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.range = CommitRange { from, to };
        self
    }
}

/// Stateless detection engine. Every call to [`run`](Self::run) is an
/// independent run with its own id.
pub struct PatternEngine {
    source: Arc<dyn ChangeSource>,
    sink: Option<Arc<dyn PatternSink>>,
    config: Arc<AnalysisConfig>,
}

impl PatternEngine {
    pub fn new(source: Arc<dyn ChangeSource>, config: AnalysisConfig) -> Self {
        Self {
            source,
            sink: None,
            config: Arc::new(config),
        }
    }

    /// Persist each finished run through `sink`
    pub fn with_sink(mut self, sink: Arc<dyn PatternSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Execute one detection run.
    ///
    /// An invalid config, fetch failures and budget overruns abort the run.
    /// A failing analyzer degrades the run; a failing persistence write
    /// becomes a warning.
    pub async fn run(&self, request: AnalysisRequest) -> Result<AnalysisReport> {
        self.config.validate().map_err(StrataError::Config)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = chrono::Utc::now().to_rfc3339();
        let total_start = Instant::now();

        info!(
            "Starting run {} for project {} (from {:?}, to {:?})",
            run_id, request.project_id, request.range.from, request.range.to
        );

        let budget = self.config.timeout();
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut report = match tokio::time::timeout(
            budget,
            self.detect(run_id.clone(), started_at, &request, &cancelled),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                cancelled.store(true, Ordering::Relaxed);
                warn!(
                    "Run {} exceeded its {}s budget, aborting",
                    run_id, self.config.timeout_secs
                );
                return Err(StrataError::Timeout(self.config.timeout_secs));
            }
        };
        report.timings.total_ms = elapsed_ms(total_start);

        if let Some(sink) = &self.sink {
            let persist_start = Instant::now();
            if let Err(e) = sink.persist_run(&report).await {
                warn!("Failed to persist run {}: {}", run_id, e);
                report.warnings.push(format!("persistence failed: {}", e));
            }
            report.timings.persist_ms = elapsed_ms(persist_start);
            report.timings.total_ms = elapsed_ms(total_start);
        }

        info!(
            "Run {} finished: {} ({} commits, {} patterns, {} insights, {}ms)",
            run_id,
            report.outcome.as_str(),
            report.commit_count,
            report.total_patterns(),
            report.insights.len(),
            report.timings.total_ms
        );
        Ok(report)
    }

    async fn detect(
        &self,
        run_id: String,
        started_at: String,
        request: &AnalysisRequest,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<AnalysisReport> {
        let fetch_start = Instant::now();
        let dataset = self
            .source
            .fetch_dataset(request.project_id, &request.range)
            .await
            .map_err(fetch_error)?;
        let fetch_ms = elapsed_ms(fetch_start);

        let dataset = Arc::new(dataset);
        debug!(
            "Fetched {} commits and {} file rows in {}ms",
            dataset.commits.len(),
            dataset.file_stats.len(),
            fetch_ms
        );

        let analyze_start = Instant::now();
        let (cooc, temp, dev, mag) = tokio::join!(
            spawn_timed(&dataset, &self.config, cancelled, |d, c| {
                cooccurrence::analyze(&d.commits, &c.cooccurrence)
            }),
            spawn_timed(&dataset, &self.config, cancelled, |d, c| {
                temporal::analyze(&d.commits, &c.temporal)
            }),
            spawn_timed(&dataset, &self.config, cancelled, |d, c| {
                developer::analyze(&d.commits, &c.developer)
            }),
            spawn_timed(&dataset, &self.config, cancelled, |d, c| {
                magnitude::analyze(&d.file_stats, &d.commits, &c.magnitude)
            }),
        );
        let analyze_ms = elapsed_ms(analyze_start);

        let (cooc, temp, dev, mag) = (settle(cooc), settle(temp), settle(dev), settle(mag));
        let config = &self.config;
        let cooccurrence = algorithm_report(
            Algorithm::Cooccurrence,
            cooc,
            analyze_ms,
            config.cooccurrence.min_confidence,
            |p| cooccurrence::summarize(p, &config.cooccurrence),
        );
        let temporal = algorithm_report(
            Algorithm::Temporal,
            temp,
            analyze_ms,
            config.temporal.min_strength,
            |p| temporal::summarize(p, &config.temporal),
        );
        let developer = algorithm_report(
            Algorithm::Developer,
            dev,
            analyze_ms,
            developer::CONSISTENT_THRESHOLD,
            developer::summarize,
        );
        let (mag, frequency_patterns) = match mag {
            Ok((MagnitudeOutput { magnitude, frequency }, ms)) => (Ok((magnitude, ms)), frequency),
            Err(e) => (Err(e), Vec::new()),
        };
        let magnitude = algorithm_report(
            Algorithm::Magnitude,
            mag,
            analyze_ms,
            magnitude::ANOMALY_THRESHOLD,
            magnitude::summarize,
        );

        let synthesize_start = Instant::now();
        let insights = insights::synthesize(&PatternSet {
            cooccurrence: &cooccurrence.patterns,
            temporal: &temporal.patterns,
            developer: &developer.patterns,
            magnitude: &magnitude.patterns,
        });
        let insight_stats = insights::summarize(&insights);
        let synthesize_ms = elapsed_ms(synthesize_start);

        let statuses = [
            (Algorithm::Cooccurrence, &cooccurrence.status),
            (Algorithm::Temporal, &temporal.status),
            (Algorithm::Developer, &developer.status),
            (Algorithm::Magnitude, &magnitude.status),
        ];
        let outcome = derive_outcome(&statuses);
        let warnings = status_warnings(&statuses);

        Ok(AnalysisReport {
            run_id,
            project_id: request.project_id,
            range: request.range.clone(),
            started_at,
            success: !matches!(outcome, RunOutcome::Degraded { .. }),
            outcome,
            commit_count: dataset.commits.len(),
            cooccurrence,
            temporal,
            developer,
            magnitude,
            frequency_patterns,
            insights,
            insight_stats,
            timings: RunTimings {
                fetch_ms,
                analyze_ms,
                synthesize_ms,
                persist_ms: 0,
                total_ms: 0,
            },
            warnings,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Anything the store reports that is not a caller mistake is a fetch failure
fn fetch_error(err: StrataError) -> StrataError {
    match err {
        StrataError::InvalidInput(_)
        | StrataError::UnknownProject(_)
        | StrataError::Fetch(_)
        | StrataError::Timeout(_)
        | StrataError::Cancelled => err,
        other => StrataError::Fetch(other.to_string()),
    }
}

/// Run an analyzer on the blocking pool and time it.
///
/// A task still queued when the run is cancelled returns `None` without
/// analyzing. Blocking tasks cannot be interrupted, so one that already
/// started runs to completion and its output is dropped with the run.
fn spawn_timed<T, F>(
    dataset: &Arc<ChangeDataset>,
    config: &Arc<AnalysisConfig>,
    cancelled: &Arc<AtomicBool>,
    analyze: F,
) -> tokio::task::JoinHandle<Option<(T, u64)>>
where
    T: Send + 'static,
    F: FnOnce(&ChangeDataset, &AnalysisConfig) -> T + Send + 'static,
{
    let dataset = Arc::clone(dataset);
    let config = Arc::clone(config);
    let cancelled = Arc::clone(cancelled);
    tokio::task::spawn_blocking(move || {
        if cancelled.load(Ordering::Relaxed) {
            return None;
        }
        let start = Instant::now();
        let output = analyze(&dataset, &config);
        Some((output, elapsed_ms(start)))
    })
}

/// Flatten a joined analyzer task into its output or a failure message
fn settle<T>(joined: std::result::Result<Option<T>, JoinError>) -> std::result::Result<T, String> {
    match joined {
        Ok(Some(output)) => Ok(output),
        Ok(None) => Err(StrataError::Cancelled.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn algorithm_report<T>(
    algorithm: Algorithm,
    joined: std::result::Result<(AnalyzerOutput<T>, u64), String>,
    fallback_ms: u64,
    significance_threshold: f64,
    summarize: impl FnOnce(&[T]) -> SummaryStats,
) -> AlgorithmReport<T> {
    match joined {
        Ok((output, execution_ms)) => {
            if output.skipped > 0 {
                debug!(
                    "{} analyzer skipped {} records",
                    algorithm.as_str(),
                    output.skipped
                );
            }
            let stats = summarize(&output.patterns);
            AlgorithmReport {
                patterns: output.patterns,
                execution_ms,
                status: AlgorithmStatus::Succeeded {
                    skipped_records: output.skipped,
                },
                stats,
            }
        }
        Err(e) => {
            error!("{} analyzer failed: {}", algorithm.as_str(), e);
            AlgorithmReport::failed(e, fallback_ms, significance_threshold)
        }
    }
}

/// Degraded if any analyzer failed, otherwise succeeded with or without skips
pub fn derive_outcome(statuses: &[(Algorithm, &AlgorithmStatus)]) -> RunOutcome {
    let failed: Vec<String> = statuses
        .iter()
        .filter(|(_, status)| status.is_failed())
        .map(|(algorithm, _)| algorithm.as_str().to_string())
        .collect();
    if !failed.is_empty() {
        return RunOutcome::Degraded {
            failed_algorithms: failed,
        };
    }

    let skipped: usize = statuses.iter().map(|(_, s)| s.skipped_records()).sum();
    if skipped > 0 {
        RunOutcome::SucceededWithSkips {
            skipped_records: skipped,
        }
    } else {
        RunOutcome::Succeeded
    }
}

fn status_warnings(statuses: &[(Algorithm, &AlgorithmStatus)]) -> Vec<String> {
    statuses
        .iter()
        .filter_map(|(algorithm, status)| match status {
            AlgorithmStatus::Failed { error } => {
                Some(format!("{} analyzer failed: {}", algorithm.as_str(), error))
            }
            AlgorithmStatus::Succeeded { skipped_records } if *skipped_records > 0 => Some(
                format!("{} analyzer skipped {} records", algorithm.as_str(), skipped_records),
            ),
            AlgorithmStatus::Succeeded { .. } => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{CommitRecord, FileChange, FileStatsRow};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MemorySource {
        commits: Vec<CommitRecord>,
        stats: Vec<FileStatsRow>,
    }

    #[async_trait]
    impl ChangeSource for MemorySource {
        async fn fetch_commits(&self, _: i64, _: &CommitRange) -> Result<Vec<CommitRecord>> {
            Ok(self.commits.clone())
        }

        async fn fetch_file_stats(&self, _: i64, _: &CommitRange) -> Result<Vec<FileStatsRow>> {
            Ok(self.stats.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl ChangeSource for BrokenSource {
        async fn fetch_commits(&self, _: i64, _: &CommitRange) -> Result<Vec<CommitRecord>> {
            Err(StrataError::Other("connection refused".to_string()))
        }

        async fn fetch_file_stats(&self, _: i64, _: &CommitRange) -> Result<Vec<FileStatsRow>> {
            Ok(Vec::new())
        }
    }

    struct SlowSource;

    #[async_trait]
    impl ChangeSource for SlowSource {
        async fn fetch_commits(&self, _: i64, _: &CommitRange) -> Result<Vec<CommitRecord>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        async fn fetch_file_stats(&self, _: i64, _: &CommitRange) -> Result<Vec<FileStatsRow>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        runs: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl PatternSink for RecordingSink {
        async fn persist_run(&self, report: &AnalysisReport) -> Result<()> {
            if self.fail {
                return Err(StrataError::Other("disk full".to_string()));
            }
            self.runs.lock().unwrap().push(report.run_id.clone());
            Ok(())
        }
    }

    fn commit(sha: &str, ts: i64, files: &[&str]) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            author_email: "dev@example.com".to_string(),
            author_name: "Dev".to_string(),
            timestamp: ts,
            tz_offset_minutes: 0,
            commit_type: "feat".to_string(),
            summary: String::new(),
            insertions: 10,
            deletions: 0,
            files_changed: files.len() as i64,
            files: files
                .iter()
                .map(|p| FileChange {
                    path: p.to_string(),
                    lines_added: 10,
                    lines_removed: 0,
                })
                .collect(),
        }
    }

    fn sample_source() -> MemorySource {
        let commits: Vec<CommitRecord> = (0..12)
            .map(|i| {
                let files: &[&str] = if i % 3 == 0 {
                    &["a.rs", "b.rs"]
                } else {
                    &["c.rs", "d.rs"]
                };
                commit(&format!("c{i:02}"), 1_704_067_200 + i * 86_400, files)
            })
            .collect();
        MemorySource {
            commits,
            stats: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_dataset_succeeds_with_nothing() {
        let source = Arc::new(MemorySource {
            commits: Vec::new(),
            stats: Vec::new(),
        });
        let engine = PatternEngine::new(source, AnalysisConfig::default());
        let report = engine.run(AnalysisRequest::new(1)).await.unwrap();
        assert!(report.success);
        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.total_patterns(), 0);
        assert!(report.insights.is_empty());
        assert_eq!(report.commit_count, 0);
        assert_eq!(report.cooccurrence.stats.mean_score, 0.0);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_run_without_persisting() {
        let sink = Arc::new(RecordingSink::default());
        let engine = PatternEngine::new(Arc::new(BrokenSource), AnalysisConfig::default())
            .with_sink(sink.clone());
        let result = engine.run(AnalysisRequest::new(1)).await;
        assert!(matches!(result, Err(StrataError::Fetch(_))));
        assert!(sink.runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_budget_overrun_fails_whole_run() {
        let config = AnalysisConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let engine = PatternEngine::new(Arc::new(SlowSource), config);
        let result = engine.run(AnalysisRequest::new(1)).await;
        assert!(matches!(result, Err(StrataError::Timeout(1))));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_fetch() {
        let mut config = AnalysisConfig::default();
        config.magnitude.reference_avg_lines = 0.0;
        let sink = Arc::new(RecordingSink::default());
        let engine =
            PatternEngine::new(Arc::new(sample_source()), config).with_sink(sink.clone());

        let result = engine.run(AnalysisRequest::new(1)).await;
        assert!(matches!(result, Err(StrataError::Config(_))));
        assert!(sink.runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_analyzer_does_not_start() {
        let dataset = Arc::new(ChangeDataset::default());
        let config = Arc::new(AnalysisConfig::default());
        let cancelled = Arc::new(AtomicBool::new(true));
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        let joined = spawn_timed(&dataset, &config, &cancelled, move |_, _| {
            flag.store(true, Ordering::Relaxed);
        })
        .await;

        assert!(matches!(joined, Ok(None)));
        assert!(!ran.load(Ordering::Relaxed));
        assert_eq!(settle(joined), Err("task cancelled".to_string()));
    }

    #[tokio::test]
    async fn test_persistence_failure_becomes_warning() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let engine = PatternEngine::new(Arc::new(sample_source()), AnalysisConfig::default())
            .with_sink(sink);
        let report = engine.run(AnalysisRequest::new(1)).await.unwrap();
        assert!(report.success);
        assert!(report.warnings.iter().any(|w| w.contains("persistence failed")));
    }

    #[tokio::test]
    async fn test_runs_are_independent_and_deterministic() {
        let sink = Arc::new(RecordingSink::default());
        let engine = PatternEngine::new(Arc::new(sample_source()), AnalysisConfig::default())
            .with_sink(sink.clone());

        let first = engine.run(AnalysisRequest::new(1)).await.unwrap();
        let second = engine.run(AnalysisRequest::new(1)).await.unwrap();
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.cooccurrence.patterns, second.cooccurrence.patterns);
        assert_eq!(first.temporal.patterns, second.temporal.patterns);
        assert_eq!(first.developer.patterns, second.developer.patterns);
        assert_eq!(first.insights, second.insights);
        assert_eq!(sink.runs.lock().unwrap().len(), 2);
        assert!(!first.cooccurrence.patterns.is_empty());
        assert_eq!(first.commit_count, 12);
    }

    #[test]
    fn test_outcome_derivation() {
        let ok = AlgorithmStatus::Succeeded { skipped_records: 0 };
        let skipped = AlgorithmStatus::Succeeded { skipped_records: 2 };
        let failed = AlgorithmStatus::Failed {
            error: "panicked".to_string(),
        };

        assert_eq!(
            derive_outcome(&[(Algorithm::Cooccurrence, &ok), (Algorithm::Temporal, &ok)]),
            RunOutcome::Succeeded
        );
        assert_eq!(
            derive_outcome(&[(Algorithm::Cooccurrence, &ok), (Algorithm::Developer, &skipped)]),
            RunOutcome::SucceededWithSkips { skipped_records: 2 }
        );
        assert_eq!(
            derive_outcome(&[(Algorithm::Magnitude, &failed), (Algorithm::Developer, &skipped)]),
            RunOutcome::Degraded {
                failed_algorithms: vec!["magnitude".to_string()]
            }
        );

        let warnings = status_warnings(&[
            (Algorithm::Magnitude, &failed),
            (Algorithm::Developer, &skipped),
        ]);
        assert_eq!(warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_analyzer_reports_failure() {
        let handle = tokio::task::spawn_blocking(|| -> (AnalyzerOutput<u32>, u64) {
            panic!("bad row");
        });
        let joined = handle.await.map_err(|e| e.to_string());
        let report = algorithm_report(Algorithm::Temporal, joined, 5, 0.3, |_: &[u32]| {
            SummaryStats::default()
        });
        assert!(report.status.is_failed());
        assert_eq!(report.stats.significance_threshold, 0.3);
        assert!(report.patterns.is_empty());
    }
}
