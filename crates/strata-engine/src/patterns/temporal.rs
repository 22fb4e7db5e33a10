// crates/strata-engine/src/patterns/temporal.rs
// Temporal analysis: non-uniform commit activity over hour, weekday, ISO week and month
//
// Fixed-bin series (hour/day/month) are scored by a chi-square test against a
// uniform null. The weekly series has a data-dependent bin count, so it is
// scored by the coefficient of variation of per-week counts instead.

use super::dataset::{AnalyzerOutput, CommitRecord};
use super::stats;
use crate::config::TemporalConfig;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike};
use std::collections::HashMap;
use strata_types::{PeriodType, SummaryStats, TemporalBin, TemporalPattern};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A commit's position in each cycle, in the author's local time
struct Stamp<'a> {
    commit: &'a CommitRecord,
    hour: usize,
    weekday: usize,
    month: usize,
    week_start: NaiveDate,
}

fn local_stamp(commit: &CommitRecord) -> Option<Stamp<'_>> {
    let offset = FixedOffset::east_opt(commit.tz_offset_minutes.checked_mul(60)?)?;
    let local = DateTime::from_timestamp(commit.timestamp, 0)?.with_timezone(&offset);
    let date = local.date_naive();
    let weekday = date.weekday().num_days_from_monday() as usize;
    Some(Stamp {
        commit,
        hour: local.hour() as usize,
        weekday,
        month: local.month0() as usize,
        week_start: date - Duration::days(weekday as i64),
    })
}

/// Bin labels for a period plus the bin index of every stamp
fn bin_series(period: PeriodType, stamps: &[Stamp<'_>]) -> (Vec<String>, Vec<usize>) {
    match period {
        PeriodType::Hourly => (
            (0..24).map(|h| format!("{:02}", h)).collect(),
            stamps.iter().map(|s| s.hour).collect(),
        ),
        PeriodType::Daily => (
            WEEKDAYS.iter().map(|d| d.to_string()).collect(),
            stamps.iter().map(|s| s.weekday).collect(),
        ),
        PeriodType::Monthly => (
            MONTHS.iter().map(|m| m.to_string()).collect(),
            stamps.iter().map(|s| s.month).collect(),
        ),
        PeriodType::Weekly => {
            let (Some(first), Some(last)) = (
                stamps.iter().map(|s| s.week_start).min(),
                stamps.iter().map(|s| s.week_start).max(),
            ) else {
                return (Vec::new(), Vec::new());
            };
            let weeks = ((last - first).num_days() / 7) as usize + 1;
            let labels = (0..weeks)
                .map(|i| {
                    let iso = (first + Duration::days(i as i64 * 7)).iso_week();
                    format!("{:04}-W{:02}", iso.year(), iso.week())
                })
                .collect();
            let assign = stamps
                .iter()
                .map(|s| ((s.week_start - first).num_days() / 7) as usize)
                .collect();
            (labels, assign)
        }
    }
}

/// Significance in [0, 1] and the chi-square statistic for fixed-bin series
fn significance(period: PeriodType, counts: &[f64], config: &TemporalConfig) -> (f64, Option<f64>) {
    if period == PeriodType::Weekly {
        if counts.len() < config.min_weekly_buckets {
            return (0.0, None);
        }
        return (stats::coefficient_of_variation(counts).clamp(0.0, 1.0), None);
    }

    let total: f64 = counts.iter().sum();
    if total == 0.0 || counts.len() < 2 {
        return (0.0, Some(0.0));
    }
    let expected = total / counts.len() as f64;
    let chi_square: f64 = counts
        .iter()
        .map(|&observed| (observed - expected).powi(2) / expected)
        .sum();

    let significance = match stats::chi_square_critical(counts.len() - 1, config.significance_level)
    {
        Some(critical) => (chi_square / critical).clamp(0.0, 1.0),
        None => 0.0,
    };
    (significance, Some(chi_square))
}

/// Rank keys by count descending, then key ascending, keeping `limit`
fn top_keys(counts: HashMap<&str, u32>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(&str, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(k, _)| k.to_string())
        .collect()
}

fn detect_period(
    period: PeriodType,
    stamps: &[Stamp<'_>],
    config: &TemporalConfig,
) -> Option<TemporalPattern> {
    let (labels, assign) = bin_series(period, stamps);
    if labels.is_empty() {
        return None;
    }

    let mut counts = vec![0u32; labels.len()];
    for &bin in &assign {
        counts[bin] += 1;
    }
    let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();

    let (significance, chi_square) = significance(period, &values, config);
    if significance <= config.min_strength {
        return None;
    }

    let threshold = stats::mean(&values) + stats::population_std_dev(&values);
    let is_peak: Vec<bool> = values.iter().map(|&v| v > threshold).collect();
    let peak_bins = labels
        .iter()
        .zip(&is_peak)
        .filter(|(_, peak)| **peak)
        .map(|(label, _)| label.clone())
        .collect();

    let mut authors: HashMap<&str, u32> = HashMap::new();
    let mut files: HashMap<&str, u32> = HashMap::new();
    for (stamp, &bin) in stamps.iter().zip(&assign) {
        if !is_peak[bin] {
            continue;
        }
        if stamp.commit.has_author() {
            *authors.entry(stamp.commit.author_email.trim()).or_default() += 1;
        }
        for file in &stamp.commit.files {
            *files.entry(file.path.as_str()).or_default() += 1;
        }
    }

    Some(TemporalPattern {
        period_type: period,
        bins: labels
            .into_iter()
            .zip(counts)
            .map(|(label, count)| TemporalBin { label, count })
            .collect(),
        peak_bins,
        significance,
        chi_square,
        contributing_authors: top_keys(authors, config.max_contributors),
        contributing_files: top_keys(files, config.max_contributors),
    })
}

/// Detect temporal clustering across all four period types.
pub fn analyze(commits: &[CommitRecord], config: &TemporalConfig) -> AnalyzerOutput<TemporalPattern> {
    let mut skipped = 0;
    let stamps: Vec<Stamp<'_>> = commits
        .iter()
        .filter_map(|commit| {
            let stamp = local_stamp(commit);
            if stamp.is_none() {
                tracing::debug!(sha = %commit.sha, "Skipping commit with unusable timestamp");
                skipped += 1;
            }
            stamp
        })
        .collect();

    if stamps.is_empty() {
        return AnalyzerOutput {
            patterns: Vec::new(),
            skipped,
        };
    }

    let patterns = PeriodType::ALL
        .iter()
        .filter_map(|&period| detect_period(period, &stamps, config))
        .collect();

    AnalyzerOutput { patterns, skipped }
}

/// Score is significance; strongly clustered periods count as anomalies.
pub fn summarize(patterns: &[TemporalPattern], config: &TemporalConfig) -> SummaryStats {
    let scores: Vec<f64> = patterns.iter().map(|p| p.significance).collect();
    let anomalies = patterns.iter().filter(|p| p.significance > 0.7).count();
    stats::summarize(&scores, config.min_strength, anomalies)
}
