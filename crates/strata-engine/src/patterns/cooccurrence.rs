// crates/strata-engine/src/patterns/cooccurrence.rs
// Co-occurrence analysis: file pairs that change together more often than chance
//
// Market-basket metrics over multi-file commits:
//   support    = c / N
//   confidence = max(c / freq(a), c / freq(b))
//   lift       = c * N / (freq(a) * freq(b))

use super::dataset::{AnalyzerOutput, CommitRecord};
use super::stats;
use crate::config::CooccurrenceConfig;
use std::collections::{BTreeSet, HashMap};
use strata_types::{CooccurrencePattern, StrengthTier, SummaryStats};

/// Detect co-change file pairs. Pure over its inputs.
pub fn analyze(
    commits: &[CommitRecord],
    config: &CooccurrenceConfig,
) -> AnalyzerOutput<CooccurrencePattern> {
    let mut skipped = 0;
    let mut baskets: Vec<(&str, Vec<&str>)> = Vec::new();

    for commit in commits {
        let mut files: BTreeSet<&str> = BTreeSet::new();
        for file in &commit.files {
            if file.path.is_empty() {
                skipped += 1;
            } else {
                files.insert(file.path.as_str());
            }
        }
        if files.len() < 2 {
            continue;
        }
        if files.len() > config.max_files_per_commit {
            tracing::debug!(
                sha = %commit.sha,
                files = files.len(),
                "Skipping oversized commit for co-occurrence"
            );
            skipped += 1;
            continue;
        }
        baskets.push((commit.sha.as_str(), files.into_iter().collect()));
    }

    let total = baskets.len();
    if total == 0 {
        return AnalyzerOutput {
            patterns: Vec::new(),
            skipped,
        };
    }

    let mut file_freq: HashMap<&str, u32> = HashMap::new();
    let mut pairs: HashMap<(&str, &str), Vec<&str>> = HashMap::new();
    for (sha, files) in &baskets {
        for file in files {
            *file_freq.entry(file).or_default() += 1;
        }
        // files are sorted, so (files[i], files[j]) with i < j is canonical
        for (i, a) in files.iter().enumerate() {
            for b in &files[i + 1..] {
                pairs.entry((*a, *b)).or_default().push(sha);
            }
        }
    }

    let n = total as f64;
    let mut patterns: Vec<CooccurrencePattern> = pairs
        .into_iter()
        .filter_map(|((a, b), shas)| {
            let c = shas.len() as f64;
            let freq_a = *file_freq.get(a)? as f64;
            let freq_b = *file_freq.get(b)? as f64;

            let support = c / n;
            let confidence = (c / freq_a).max(c / freq_b).min(1.0);
            let lift = c * n / (freq_a * freq_b);

            if support < config.min_support
                || confidence < config.min_confidence
                || lift < config.min_lift
            {
                return None;
            }

            Some(CooccurrencePattern {
                file_a: a.to_string(),
                file_b: b.to_string(),
                cooccurrence_count: shas.len() as u32,
                support,
                confidence,
                lift,
                commits: shas.into_iter().map(String::from).collect(),
                strength: StrengthTier::classify(lift, confidence),
            })
        })
        .collect();

    patterns.sort_by(|x, y| {
        y.lift
            .total_cmp(&x.lift)
            .then_with(|| x.file_a.cmp(&y.file_a))
            .then_with(|| x.file_b.cmp(&y.file_b))
    });

    AnalyzerOutput { patterns, skipped }
}

/// Score is confidence; very strong pairs count as anomalies.
pub fn summarize(patterns: &[CooccurrencePattern], config: &CooccurrenceConfig) -> SummaryStats {
    let scores: Vec<f64> = patterns.iter().map(|p| p.confidence).collect();
    let anomalies = patterns
        .iter()
        .filter(|p| p.strength == StrengthTier::VeryStrong)
        .count();
    stats::summarize(&scores, config.min_confidence, anomalies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::dataset::FileChange;
    use std::collections::HashSet;

    fn commit(sha: &str, files: &[&str]) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            author_email: "dev@example.com".to_string(),
            author_name: "Dev".to_string(),
            timestamp: 0,
            tz_offset_minutes: 0,
            commit_type: "feat".to_string(),
            summary: String::new(),
            insertions: 0,
            deletions: 0,
            files_changed: files.len() as i64,
            files: files
                .iter()
                .map(|p| FileChange {
                    path: p.to_string(),
                    lines_added: 1,
                    lines_removed: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty_input_yields_no_patterns() {
        let out = analyze(&[], &CooccurrenceConfig::default());
        assert!(out.patterns.is_empty());
        assert_eq!(out.skipped, 0);
        let summary = summarize(&out.patterns, &CooccurrenceConfig::default());
        assert_eq!(summary.pattern_count, 0);
        assert_eq!(summary.mean_score, 0.0);
    }

    #[test]
    fn test_single_file_commits_are_ignored() {
        let commits = vec![commit("c1", &["a.rs"]), commit("c2", &["a.rs", "a.rs"])];
        let out = analyze(&commits, &CooccurrenceConfig::default());
        assert!(out.patterns.is_empty());
    }

    #[test]
    fn test_scenario_pair_in_5_of_20_commits() {
        let mut commits = Vec::new();
        for i in 0..5 {
            commits.push(commit(&format!("ab{i}"), &["src/b.rs", "src/a.rs"]));
        }
        for i in 0..15 {
            commits.push(commit(&format!("xy{i}"), &["lib/x.rs", &format!("lib/y{i}.rs")]));
        }

        let out = analyze(&commits, &CooccurrenceConfig::default());
        let pair = out
            .patterns
            .iter()
            .find(|p| p.file_a == "src/a.rs" && p.file_b == "src/b.rs")
            .expect("pair detected");
        assert_eq!(pair.cooccurrence_count, 5);
        assert!((pair.support - 0.25).abs() < 1e-12);
        assert!((pair.confidence - 1.0).abs() < 1e-12);
        assert!((pair.lift - 4.0).abs() < 1e-12);
        assert_eq!(pair.strength, StrengthTier::VeryStrong);
        assert_eq!(pair.commits.len(), 5);
        // highest lift first
        assert_eq!(out.patterns[0].key(), "src/a.rs|src/b.rs");
    }

    #[test]
    fn test_thresholds_filter_pairs() {
        // a and b each appear often but rarely together
        let mut commits = Vec::new();
        commits.push(commit("ab", &["a", "b"]));
        for i in 0..10 {
            commits.push(commit(&format!("a{i}"), &["a", &format!("p{i}")]));
            commits.push(commit(&format!("b{i}"), &["b", &format!("q{i}")]));
        }
        let out = analyze(&commits, &CooccurrenceConfig::default());
        assert!(out.patterns.iter().all(|p| p.key() != "a|b"));
    }

    #[test]
    fn test_oversized_commits_are_skipped() {
        let config = CooccurrenceConfig {
            max_files_per_commit: 3,
            ..Default::default()
        };
        let commits = vec![
            commit("big", &["a", "b", "c", "d"]),
            commit("ok1", &["a", "b"]),
            commit("ok2", &["a", "b"]),
            commit("ok3", &["c", "d"]),
        ];
        let out = analyze(&commits, &config);
        assert_eq!(out.skipped, 1);
        let pair = out.patterns.iter().find(|p| p.key() == "a|b").expect("a|b");
        assert_eq!(pair.commits, vec!["ok1".to_string(), "ok2".to_string()]);
    }

    #[test]
    fn test_empty_paths_are_counted_as_skipped() {
        let commits = vec![
            commit("c1", &["a", "", "b"]),
            commit("c2", &["a", "b"]),
            commit("c3", &["", "c"]),
            commit("c4", &["x", "y"]),
            commit("c5", &["x", "z"]),
        ];
        let out = analyze(&commits, &CooccurrenceConfig::default());
        assert_eq!(out.skipped, 2);
        let pair = out.patterns.iter().find(|p| p.key() == "a|b").expect("a|b");
        assert_eq!(pair.cooccurrence_count, 2);
        assert!(out.patterns.iter().all(|p| !p.file_a.is_empty()));
    }

    #[test]
    fn test_metric_bounds_and_canonical_pairs() {
        // deterministic pseudo-random baskets
        let files = ["a", "b", "c", "d", "e", "f", "g"];
        let mut seed: u64 = 42;
        let mut commits = Vec::new();
        for i in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let picked: Vec<&str> = files
                .iter()
                .enumerate()
                .filter(|(j, _)| (seed >> (j * 5 + 7)) & 3 == 0)
                .map(|(_, f)| *f)
                .collect();
            commits.push(commit(&format!("c{i}"), &picked));
        }

        let config = CooccurrenceConfig {
            min_support: 0.0,
            min_confidence: 0.0,
            min_lift: 0.0,
            ..Default::default()
        };
        let out = analyze(&commits, &config);
        assert!(!out.patterns.is_empty());

        let mut seen = HashSet::new();
        for p in &out.patterns {
            assert!((0.0..=1.0).contains(&p.support));
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(p.lift >= 0.0);
            assert!(p.file_a < p.file_b);
            assert!(seen.insert(p.key()), "duplicate pair {}", p.key());
            assert_eq!(p.strength, StrengthTier::classify(p.lift, p.confidence));
        }
        assert!(out.patterns.windows(2).all(|w| w[0].lift >= w[1].lift));
    }

    #[test]
    fn test_deterministic_output() {
        let commits = vec![
            commit("1", &["a", "b", "c"]),
            commit("2", &["a", "b"]),
            commit("3", &["b", "c"]),
            commit("4", &["d", "e"]),
        ];
        let first = analyze(&commits, &CooccurrenceConfig::default());
        let second = analyze(&commits, &CooccurrenceConfig::default());
        assert_eq!(first, second);
    }
}
