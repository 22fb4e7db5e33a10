// crates/strata-engine/src/patterns/stats.rs
// Small statistics helpers shared by the analyzers

use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use strata_types::SummaryStats;

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.mean()
}

/// Population standard deviation, 0 for an empty slice
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let std = values.population_std_dev();
    if std.is_finite() { std } else { 0.0 }
}

/// stddev / mean, 0 when the mean is 0
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    population_std_dev(values) / m
}

/// Critical value of the chi-square distribution with `df` degrees of freedom
/// at significance level `alpha`.
pub fn chi_square_critical(df: usize, alpha: f64) -> Option<f64> {
    if df == 0 || !(alpha > 0.0 && alpha < 1.0) {
        return None;
    }
    let dist = ChiSquared::new(df as f64).ok()?;
    let critical = dist.inverse_cdf(1.0 - alpha);
    (critical.is_finite() && critical > 0.0).then_some(critical)
}

/// Integer percentages that sum to exactly 100 (largest remainder method).
///
/// Ties on the remainder go to the lexicographically smaller key.
pub fn percentages(counts: &BTreeMap<String, u32>) -> BTreeMap<String, u32> {
    let total: u64 = counts.values().map(|&c| c as u64).sum();
    if total == 0 {
        return BTreeMap::new();
    }

    let mut floors: Vec<(&String, u32, u64)> = counts
        .iter()
        .map(|(key, &count)| {
            let scaled = count as u64 * 100;
            (key, (scaled / total) as u32, scaled % total)
        })
        .collect();

    let assigned: u32 = floors.iter().map(|(_, pct, _)| pct).sum();
    let mut remaining = 100u32.saturating_sub(assigned);

    let mut order: Vec<usize> = (0..floors.len()).collect();
    order.sort_by(|&a, &b| floors[b].2.cmp(&floors[a].2).then_with(|| floors[a].0.cmp(floors[b].0)));
    for idx in order {
        if remaining == 0 {
            break;
        }
        floors[idx].1 += 1;
        remaining -= 1;
    }

    floors
        .into_iter()
        .map(|(key, pct, _)| (key.clone(), pct))
        .collect()
}

/// Summary statistics over the per-pattern scores of one algorithm
pub fn summarize(scores: &[f64], significance_threshold: f64, anomaly_count: usize) -> SummaryStats {
    SummaryStats {
        pattern_count: scores.len(),
        mean_score: mean(scores),
        std_dev: population_std_dev(scores),
        significance_threshold,
        anomaly_count,
    }
}
