// crates/strata-engine/src/patterns/developer.rs
// Developer analysis: specialization, velocity, consistency and collaboration per author

use super::dataset::{AnalyzerOutput, CommitRecord};
use super::stats;
use crate::config::DeveloperConfig;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strata_types::{AuthorIdentity, Collaborator, DeveloperPattern, FileTouch, SummaryStats};

const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_WEEK: f64 = 7.0 * SECONDS_PER_DAY;

/// Consistency below this counts as an anomaly
const ERRATIC_CONSISTENCY: f64 = 0.3;
/// Threshold reported alongside the developer summary
pub const CONSISTENT_THRESHOLD: f64 = 0.7;

#[derive(Default)]
struct AuthorActivity<'a> {
    name: &'a str,
    timestamps: Vec<i64>,
    touches: HashMap<&'a str, u32>,
    commit_types: BTreeMap<String, u32>,
    files_sum: i64,
    lines_sum: i64,
}

/// `1 - CV/2` over inter-commit intervals in days, clamped to [0, 1].
/// 0 with fewer than 3 commits or when every commit shares one timestamp.
pub fn consistency_score(timestamps: &[i64]) -> f64 {
    if timestamps.len() < 3 {
        return 0.0;
    }
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();
    let intervals: Vec<f64> = sorted
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / SECONDS_PER_DAY)
        .collect();

    if stats::mean(&intervals) <= 0.0 {
        return 0.0;
    }
    (1.0 - stats::coefficient_of_variation(&intervals) / 2.0).clamp(0.0, 1.0)
}

/// Commits per week over the author's active timespan, 0 for a zero span
pub fn velocity(commit_count: usize, first: i64, last: i64) -> f64 {
    let weeks = (last - first) as f64 / SECONDS_PER_WEEK;
    if weeks <= 0.0 {
        return 0.0;
    }
    commit_count as f64 / weeks
}

/// Build per-author profiles. Authors below `min_commits` are left out.
pub fn analyze(commits: &[CommitRecord], config: &DeveloperConfig) -> AnalyzerOutput<DeveloperPattern> {
    let mut skipped = 0;
    let mut authors: HashMap<&str, AuthorActivity<'_>> = HashMap::new();

    for commit in commits {
        if !commit.has_author() {
            tracing::debug!(sha = %commit.sha, "Skipping commit without author identity");
            skipped += 1;
            continue;
        }
        let activity = authors.entry(commit.author_email.trim()).or_default();
        // commits arrive in time order, so the latest display name wins
        if !commit.author_name.is_empty() {
            activity.name = commit.author_name.as_str();
        }
        activity.timestamps.push(commit.timestamp);
        let paths: BTreeSet<&str> = commit.files.iter().map(|f| f.path.as_str()).collect();
        for path in paths {
            *activity.touches.entry(path).or_default() += 1;
        }
        let commit_type = if commit.commit_type.is_empty() {
            "other"
        } else {
            commit.commit_type.as_str()
        };
        *activity.commit_types.entry(commit_type.to_string()).or_default() += 1;
        activity.files_sum += commit.files_changed;
        activity.lines_sum += commit.total_lines();
    }

    let mut emails: Vec<&str> = authors.keys().copied().collect();
    emails.sort_unstable();

    let mut patterns = Vec::new();
    for &email in &emails {
        let activity = &authors[email];
        let commit_count = activity.timestamps.len();
        if commit_count < config.min_commits {
            continue;
        }

        let mut ranked_files: Vec<(&str, u32)> =
            activity.touches.iter().map(|(p, c)| (*p, *c)).collect();
        ranked_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let specialty_files = ranked_files
            .iter()
            .take(config.top_specialties)
            .map(|(path, touches)| FileTouch {
                path: path.to_string(),
                touches: *touches,
            })
            .collect();

        let mut collaborators: Vec<Collaborator> = emails
            .iter()
            .filter(|other| **other != email)
            .filter_map(|other| {
                let theirs = &authors[other];
                let shared = activity
                    .touches
                    .keys()
                    .filter(|path| theirs.touches.contains_key(*path))
                    .count();
                (shared > 0).then(|| Collaborator {
                    email: other.to_string(),
                    name: theirs.name.to_string(),
                    shared_files: shared as u32,
                })
            })
            .collect();
        collaborators.sort_by(|a, b| {
            b.shared_files
                .cmp(&a.shared_files)
                .then_with(|| a.email.cmp(&b.email))
        });
        collaborators.truncate(config.max_collaborators);

        let shared_files = ranked_files
            .iter()
            .filter(|(path, _)| {
                emails
                    .iter()
                    .any(|other| *other != email && authors[other].touches.contains_key(path))
            })
            .take(config.max_shared_files)
            .map(|(path, _)| path.to_string())
            .collect();

        let first = activity.timestamps.iter().copied().min().unwrap_or(0);
        let last = activity.timestamps.iter().copied().max().unwrap_or(0);

        patterns.push(DeveloperPattern {
            author: AuthorIdentity {
                email: email.to_string(),
                name: activity.name.to_string(),
            },
            commit_count: commit_count as u32,
            specialty_files,
            velocity: velocity(commit_count, first, last),
            consistency: consistency_score(&activity.timestamps),
            collaborators,
            shared_files,
            avg_files_per_commit: activity.files_sum as f64 / commit_count as f64,
            avg_lines_per_commit: activity.lines_sum as f64 / commit_count as f64,
            commit_types: stats::percentages(&activity.commit_types),
        });
    }

    patterns.sort_by(|a, b| {
        b.commit_count
            .cmp(&a.commit_count)
            .then_with(|| a.author.email.cmp(&b.author.email))
    });

    AnalyzerOutput { patterns, skipped }
}

/// Score is consistency; erratic contributors count as anomalies.
pub fn summarize(patterns: &[DeveloperPattern]) -> SummaryStats {
    let scores: Vec<f64> = patterns.iter().map(|p| p.consistency).collect();
    let anomalies = patterns
        .iter()
        .filter(|p| p.consistency < ERRATIC_CONSISTENCY)
        .count();
    stats::summarize(&scores, CONSISTENT_THRESHOLD, anomalies)
}
