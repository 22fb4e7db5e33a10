// crates/strata-engine/src/patterns/magnitude.rs
// Magnitude and frequency analysis: per-file change size, churn rate and risk

use super::dataset::{AnalyzerOutput, CommitRecord, FileStatsRow};
use super::stats;
use crate::config::MagnitudeConfig;
use std::collections::{BTreeMap, HashMap};
use strata_types::{
    FrequencyPattern, MagnitudePattern, RiskLevel, SizeCategory, SummaryStats, Trend,
};

const SECONDS_PER_DAY: f64 = 86_400.0;
const VOLATILITY_CAP: f64 = 2.0;
/// Changes per week at which a file is a full hotspot
const HOTSPOT_FREQUENCY: f64 = 10.0;
/// Distinct contributors at which diversity saturates
const DIVERSE_CONTRIBUTORS: f64 = 5.0;
/// Anomaly scores above this count toward the summary anomaly count
pub const ANOMALY_THRESHOLD: f64 = 0.7;

/// Magnitude records plus the parallel hotspot view of the same files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagnitudeOutput {
    pub magnitude: AnalyzerOutput<MagnitudePattern>,
    pub frequency: Vec<FrequencyPattern>,
}

/// Per-file timeline and commit types, rebuilt from the commit list
#[derive(Default)]
struct FileHistory {
    timestamps: Vec<i64>,
    commit_types: BTreeMap<String, u32>,
}

fn file_histories(commits: &[CommitRecord]) -> HashMap<&str, FileHistory> {
    let mut histories: HashMap<&str, FileHistory> = HashMap::new();
    for commit in commits {
        let commit_type = if commit.commit_type.is_empty() {
            "other"
        } else {
            commit.commit_type.as_str()
        };
        for file in &commit.files {
            let history = histories.entry(file.path.as_str()).or_default();
            history.timestamps.push(commit.timestamp);
            *history
                .commit_types
                .entry(commit_type.to_string())
                .or_default() += 1;
        }
    }
    histories
}

/// Compare change counts in the later and earlier halves of the file's lifetime
pub fn classify_trend(timestamps: &[i64], first: i64, last: i64) -> Trend {
    if last <= first || timestamps.is_empty() {
        return Trend::Stable;
    }
    let midpoint = first as f64 + (last - first) as f64 / 2.0;
    let earlier = timestamps.iter().filter(|&&t| (t as f64) < midpoint).count() as f64;
    let later = timestamps.len() as f64 - earlier;

    if earlier == 0.0 {
        return if later > 0.0 { Trend::Increasing } else { Trend::Stable };
    }
    let ratio = later / earlier;
    if ratio >= 1.5 {
        Trend::Increasing
    } else if ratio <= 0.5 {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Mean deviation from the reference profile, divided by 3 again and capped at 1
pub fn anomaly_score(avg_lines: f64, volatility: f64, frequency: f64, config: &MagnitudeConfig) -> f64 {
    let ratio = |value: f64, reference: f64| (value - reference).abs() / reference;
    let combined = (ratio(avg_lines, config.reference_avg_lines)
        + ratio(volatility, config.reference_volatility)
        + ratio(frequency, config.reference_frequency))
        / 3.0;
    (combined / 3.0).clamp(0.0, 1.0)
}

fn is_malformed(row: &FileStatsRow) -> bool {
    row.path.is_empty()
        || row.change_count <= 0
        || row.contributor_count < 0
        || row.lines_sum < 0.0
        || row.lines_sq_sum < 0.0
        || !row.lines_sum.is_finite()
        || !row.lines_sq_sum.is_finite()
        || row.last_timestamp < row.first_timestamp
}

/// Profile every file with at least `min_changes` changes.
pub fn analyze(
    file_stats: &[FileStatsRow],
    commits: &[CommitRecord],
    config: &MagnitudeConfig,
) -> MagnitudeOutput {
    let histories = file_histories(commits);
    let empty = FileHistory::default();

    let mut skipped = 0;
    let mut magnitude = Vec::new();
    let mut frequency = Vec::new();

    for row in file_stats {
        if is_malformed(row) {
            tracing::debug!(path = %row.path, "Skipping malformed file statistics row");
            skipped += 1;
            continue;
        }
        if row.change_count < config.min_changes as i64 {
            continue;
        }

        let count = row.change_count as f64;
        let avg_lines = row.lines_sum / count;
        let std_dev = (row.lines_sq_sum / count - avg_lines * avg_lines).max(0.0).sqrt();
        let lifespan_days =
            ((row.last_timestamp - row.first_timestamp) as f64 / SECONDS_PER_DAY).max(1.0);
        let frequency_score = count / (lifespan_days / 7.0).max(1.0);
        let volatility = if avg_lines == 0.0 {
            0.0
        } else {
            (std_dev / avg_lines).min(VOLATILITY_CAP)
        };

        let history = histories.get(row.path.as_str()).unwrap_or(&empty);
        let size_category = SizeCategory::classify(avg_lines);
        let anomaly = anomaly_score(avg_lines, volatility, frequency_score, config);

        magnitude.push(MagnitudePattern {
            file_path: row.path.clone(),
            size_category,
            avg_lines_changed: avg_lines,
            std_dev_lines: std_dev,
            change_count: row.change_count as u32,
            contributor_count: row.contributor_count as u32,
            lifespan_days,
            frequency_score,
            volatility_score: volatility,
            trend: classify_trend(&history.timestamps, row.first_timestamp, row.last_timestamp),
            anomaly_score: anomaly,
            risk_level: RiskLevel::classify_magnitude(
                anomaly,
                size_category,
                volatility,
                frequency_score,
            ),
        });

        let hotspot = (frequency_score / HOTSPOT_FREQUENCY).min(1.0);
        frequency.push(FrequencyPattern {
            file_path: row.path.clone(),
            change_frequency: frequency_score,
            hotspot_score: hotspot,
            stability_score: 1.0 - hotspot,
            contributor_diversity: (row.contributor_count as f64 / DIVERSE_CONTRIBUTORS).min(1.0),
            change_types: stats::percentages(&history.commit_types),
        });
    }

    magnitude.sort_by(|a, b| {
        b.anomaly_score
            .total_cmp(&a.anomaly_score)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    frequency.sort_by(|a, b| {
        b.hotspot_score
            .total_cmp(&a.hotspot_score)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });

    MagnitudeOutput {
        magnitude: AnalyzerOutput {
            patterns: magnitude,
            skipped,
        },
        frequency,
    }
}

/// Score is the anomaly score.
pub fn summarize(patterns: &[MagnitudePattern]) -> SummaryStats {
    let scores: Vec<f64> = patterns.iter().map(|p| p.anomaly_score).collect();
    let anomalies = patterns
        .iter()
        .filter(|p| p.anomaly_score > ANOMALY_THRESHOLD)
        .count();
    stats::summarize(&scores, ANOMALY_THRESHOLD, anomalies)
}
