// crates/strata-engine/src/insights.rs
// Insight synthesis: cross-checks the four analyzers' patterns into ranked findings
//
// Pure rule engine. Each rule emits at most one insight, so a run never
// carries the same insight type twice. Output is ranked by risk, then
// confidence, with type and description as tie-breakers.

use crate::patterns::stats;
use std::collections::BTreeSet;
use strata_types::{
    CooccurrencePattern, DeveloperPattern, Insight, InsightType, MagnitudePattern, PatternKind,
    PatternRef, RiskAssessment, RiskLevel, SummaryStats, TemporalPattern,
};

/// Temporal significance above which clustering is worth reporting
const SIGNIFICANT_TEMPORAL: f64 = 0.7;
/// Minimum specialty files and consistency for a specialist
const SPECIALIST_FILES: usize = 5;
const SPECIALIST_CONSISTENCY: f64 = 0.7;
/// More than this many high-risk files triggers the high-risk insight on its own
const HIGH_RISK_FILE_LIMIT: usize = 3;
const ANOMALOUS_SCORE: f64 = 0.7;
/// Factor lists are truncated to this many entries
const MAX_FACTORS: usize = 5;

/// Everything the synthesizer reads, borrowed from the analyzer reports
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternSet<'a> {
    pub cooccurrence: &'a [CooccurrencePattern],
    pub temporal: &'a [TemporalPattern],
    pub developer: &'a [DeveloperPattern],
    pub magnitude: &'a [MagnitudePattern],
}

/// Run every rule and return the insights that fire, most urgent first.
pub fn synthesize(patterns: &PatternSet<'_>) -> Vec<Insight> {
    let rules: [fn(&PatternSet<'_>) -> Option<Insight>; 6] = [
        file_coupling,
        temporal_patterns,
        developer_specialization,
        high_risk_files,
        change_anomalies,
        coupled_hotspots,
    ];
    let mut insights: Vec<Insight> = rules.iter().filter_map(|rule| rule(patterns)).collect();
    rank(&mut insights);
    insights
}

/// Risk descending, confidence descending, then type and description ascending.
fn rank(insights: &mut [Insight]) {
    insights.sort_by(|a, b| {
        b.risk
            .level
            .cmp(&a.risk.level)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.insight_type.as_str().cmp(b.insight_type.as_str()))
            .then_with(|| a.description.cmp(&b.description))
    });
}

/// Score is confidence; high and critical risk insights count as anomalies.
pub fn summarize(insights: &[Insight]) -> SummaryStats {
    let scores: Vec<f64> = insights.iter().map(|i| i.confidence).collect();
    let anomalies = insights
        .iter()
        .filter(|i| i.risk.level >= RiskLevel::High)
        .count();
    stats::summarize(&scores, ANOMALOUS_SCORE, anomalies)
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", count, many)
    }
}

fn strong_pairs<'a>(patterns: &PatternSet<'a>) -> Vec<&'a CooccurrencePattern> {
    patterns
        .cooccurrence
        .iter()
        .filter(|p| p.strength.is_strong())
        .collect()
}

fn is_specialist(dev: &DeveloperPattern) -> bool {
    dev.specialty_files.len() >= SPECIALIST_FILES && dev.consistency > SPECIALIST_CONSISTENCY
}

fn file_coupling(patterns: &PatternSet<'_>) -> Option<Insight> {
    let strong = strong_pairs(patterns);
    if strong.is_empty() {
        return None;
    }

    Some(Insight {
        insight_type: InsightType::FileCoupling,
        description: format!(
            "{} change together far more often than chance",
            plural(strong.len(), "file pair", "file pairs")
        ),
        confidence: 0.9,
        supporting_patterns: strong
            .iter()
            .map(|p| PatternRef::new(PatternKind::Cooccurrence, p.key()))
            .collect(),
        recommendations: vec![
            "Review coupled files together when changing either one".to_string(),
            "Look for a shared abstraction behind the most tightly coupled pairs".to_string(),
            "Add tests that exercise coupled files as a unit".to_string(),
        ],
        risk: RiskAssessment {
            level: RiskLevel::scaled_by_count(strong.len(), 3, 10),
            factors: strong
                .iter()
                .take(MAX_FACTORS)
                .map(|p| {
                    format!(
                        "{} <-> {} (lift {:.2}, confidence {:.2})",
                        p.file_a, p.file_b, p.lift, p.confidence
                    )
                })
                .collect(),
        },
    })
}

fn temporal_patterns(patterns: &PatternSet<'_>) -> Option<Insight> {
    let significant: Vec<&TemporalPattern> = patterns
        .temporal
        .iter()
        .filter(|p| p.significance > SIGNIFICANT_TEMPORAL)
        .collect();
    if significant.is_empty() {
        return None;
    }

    Some(Insight {
        insight_type: InsightType::TemporalPatterns,
        description: format!(
            "Commit activity clusters strongly in {}",
            plural(significant.len(), "time dimension", "time dimensions")
        ),
        confidence: 0.8,
        supporting_patterns: significant
            .iter()
            .map(|p| PatternRef::new(PatternKind::Temporal, p.period_type.as_str()))
            .collect(),
        recommendations: vec![
            "Schedule reviews and releases around peak activity windows".to_string(),
            "Avoid risky deployments during the busiest periods".to_string(),
        ],
        risk: RiskAssessment {
            level: RiskLevel::Low,
            factors: significant
                .iter()
                .map(|p| {
                    format!(
                        "{} activity peaks at {} (significance {:.2})",
                        p.period_type.as_str(),
                        if p.peak_bins.is_empty() {
                            "no single bin".to_string()
                        } else {
                            p.peak_bins.join(", ")
                        },
                        p.significance
                    )
                })
                .collect(),
        },
    })
}

fn developer_specialization(patterns: &PatternSet<'_>) -> Option<Insight> {
    let specialists: Vec<&DeveloperPattern> =
        patterns.developer.iter().filter(|d| is_specialist(d)).collect();
    if specialists.is_empty() {
        return None;
    }

    Some(Insight {
        insight_type: InsightType::DeveloperSpecialization,
        description: format!(
            "{} consistently concentrate on a stable set of files",
            plural(specialists.len(), "contributor", "contributors")
        ),
        confidence: 0.8,
        supporting_patterns: specialists
            .iter()
            .map(|d| PatternRef::new(PatternKind::Developer, d.author.email.clone()))
            .collect(),
        recommendations: vec![
            "Route reviews of specialty files to their specialists".to_string(),
            "Pair specialists with other contributors to spread knowledge".to_string(),
            "Document the areas only one person changes".to_string(),
        ],
        risk: RiskAssessment {
            level: RiskLevel::scaled_by_count(specialists.len(), 2, 4),
            factors: specialists
                .iter()
                .take(MAX_FACTORS)
                .map(|d| {
                    format!(
                        "{} owns {} specialty files (consistency {:.2})",
                        d.author.email,
                        d.specialty_files.len(),
                        d.consistency
                    )
                })
                .collect(),
        },
    })
}

fn high_risk_files(patterns: &PatternSet<'_>) -> Option<Insight> {
    let critical = patterns
        .magnitude
        .iter()
        .filter(|p| p.risk_level == RiskLevel::Critical)
        .count();
    let flagged: Vec<&MagnitudePattern> = patterns
        .magnitude
        .iter()
        .filter(|p| p.risk_level >= RiskLevel::High)
        .collect();
    let high = flagged.len() - critical;
    if critical == 0 && high <= HIGH_RISK_FILE_LIMIT {
        return None;
    }

    let mut factors: Vec<String> = flagged
        .iter()
        .take(MAX_FACTORS)
        .map(|p| {
            format!(
                "{}: {} risk (anomaly {:.2}, volatility {:.2}, {:.1} changes/week)",
                p.file_path,
                p.risk_level.as_str(),
                p.anomaly_score,
                p.volatility_score,
                p.frequency_score
            )
        })
        .collect();

    // knowledge concentration: a flagged file only one specialist knows
    for file in &flagged {
        let owners: Vec<&DeveloperPattern> = patterns
            .developer
            .iter()
            .filter(|d| d.specialty_files.iter().any(|f| f.path == file.file_path))
            .collect();
        if let [owner] = owners.as_slice() {
            factors.push(format!(
                "knowledge concentration: {} is a specialty of {} only",
                file.file_path, owner.author.email
            ));
        }
    }

    Some(Insight {
        insight_type: InsightType::HighRiskFiles,
        description: format!(
            "{} and {} carry elevated change risk",
            plural(critical, "critical file", "critical files"),
            plural(high, "high-risk file", "high-risk files")
        ),
        confidence: 0.95,
        supporting_patterns: flagged
            .iter()
            .map(|p| PatternRef::new(PatternKind::Magnitude, p.file_path.clone()))
            .collect(),
        recommendations: vec![
            "Require an extra reviewer for changes to these files".to_string(),
            "Break large, volatile files into smaller units".to_string(),
            "Raise test coverage before the next change to them".to_string(),
        ],
        risk: RiskAssessment {
            level: RiskLevel::Critical,
            factors,
        },
    })
}

fn change_anomalies(patterns: &PatternSet<'_>) -> Option<Insight> {
    let anomalous: Vec<&MagnitudePattern> = patterns
        .magnitude
        .iter()
        .filter(|p| p.anomaly_score > ANOMALOUS_SCORE)
        .collect();
    if anomalous.is_empty() {
        return None;
    }

    Some(Insight {
        insight_type: InsightType::ChangeAnomalies,
        description: format!(
            "{} deviate sharply from the typical change profile",
            plural(anomalous.len(), "file", "files")
        ),
        confidence: 0.7,
        supporting_patterns: anomalous
            .iter()
            .map(|p| PatternRef::new(PatternKind::Magnitude, p.file_path.clone()))
            .collect(),
        recommendations: vec![
            "Investigate why these files change so differently from the rest".to_string(),
            "Check whether generated or vendored files should be excluded".to_string(),
        ],
        risk: RiskAssessment {
            level: RiskLevel::scaled_by_count(anomalous.len(), 3, 10),
            factors: anomalous
                .iter()
                .take(MAX_FACTORS)
                .map(|p| {
                    format!(
                        "{} anomaly {:.2} ({} changes, avg {:.0} lines)",
                        p.file_path, p.anomaly_score, p.change_count, p.avg_lines_changed
                    )
                })
                .collect(),
        },
    })
}

/// Files that are both risky on their own and strongly coupled to another file
fn coupled_hotspots(patterns: &PatternSet<'_>) -> Option<Insight> {
    let strong = strong_pairs(patterns);
    let hotspots: Vec<&MagnitudePattern> = patterns
        .magnitude
        .iter()
        .filter(|p| p.risk_level >= RiskLevel::High)
        .filter(|p| strong.iter().any(|pair| pair.involves(&p.file_path)))
        .collect();
    if hotspots.is_empty() {
        return None;
    }

    let mut supporting: Vec<PatternRef> = hotspots
        .iter()
        .map(|p| PatternRef::new(PatternKind::Magnitude, p.file_path.clone()))
        .collect();
    let pair_keys: BTreeSet<String> = strong
        .iter()
        .filter(|pair| hotspots.iter().any(|h| pair.involves(&h.file_path)))
        .map(|pair| pair.key())
        .collect();
    supporting.extend(
        pair_keys
            .into_iter()
            .map(|key| PatternRef::new(PatternKind::Cooccurrence, key)),
    );

    Some(Insight {
        insight_type: InsightType::CoupledHotspots,
        description: format!(
            "{} both high-risk and strongly coupled to other files",
            plural(hotspots.len(), "file is", "files are")
        ),
        confidence: 0.85,
        supporting_patterns: supporting,
        recommendations: vec![
            "Treat changes to these files and their partners as one review unit".to_string(),
            "Prioritize decoupling these files before refactoring elsewhere".to_string(),
        ],
        risk: RiskAssessment {
            level: RiskLevel::High,
            factors: hotspots
                .iter()
                .take(MAX_FACTORS)
                .map(|p| {
                    format!(
                        "{} is {} risk and strongly coupled",
                        p.file_path,
                        p.risk_level.as_str()
                    )
                })
                .collect(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use strata_types::{AuthorIdentity, FileTouch, PeriodType, SizeCategory, StrengthTier, Trend};

    fn pair(a: &str, b: &str, lift: f64, confidence: f64) -> CooccurrencePattern {
        CooccurrencePattern {
            file_a: a.to_string(),
            file_b: b.to_string(),
            cooccurrence_count: 5,
            support: 0.25,
            confidence,
            lift,
            commits: Vec::new(),
            strength: StrengthTier::classify(lift, confidence),
        }
    }

    fn file(path: &str, anomaly: f64, risk: RiskLevel) -> MagnitudePattern {
        MagnitudePattern {
            file_path: path.to_string(),
            size_category: SizeCategory::Large,
            avg_lines_changed: 200.0,
            std_dev_lines: 50.0,
            change_count: 10,
            contributor_count: 2,
            lifespan_days: 30.0,
            frequency_score: 2.3,
            volatility_score: 0.25,
            trend: Trend::Stable,
            anomaly_score: anomaly,
            risk_level: risk,
        }
    }

    fn developer(email: &str, files: &[&str], consistency: f64) -> DeveloperPattern {
        DeveloperPattern {
            author: AuthorIdentity {
                email: email.to_string(),
                name: email.to_string(),
            },
            commit_count: 20,
            specialty_files: files
                .iter()
                .map(|p| FileTouch {
                    path: p.to_string(),
                    touches: 3,
                })
                .collect(),
            velocity: 2.0,
            consistency,
            collaborators: Vec::new(),
            shared_files: Vec::new(),
            avg_files_per_commit: 2.0,
            avg_lines_per_commit: 40.0,
            commit_types: BTreeMap::new(),
        }
    }

    fn temporal(significance: f64) -> TemporalPattern {
        TemporalPattern {
            period_type: PeriodType::Hourly,
            bins: Vec::new(),
            peak_bins: vec!["09".to_string()],
            significance,
            chi_square: Some(50.0),
            contributing_authors: Vec::new(),
            contributing_files: Vec::new(),
        }
    }

    fn types(insights: &[Insight]) -> Vec<InsightType> {
        insights.iter().map(|i| i.insight_type).collect()
    }

    #[test]
    fn test_empty_patterns_yield_no_insights() {
        assert!(synthesize(&PatternSet::default()).is_empty());
        let summary = summarize(&[]);
        assert_eq!(summary.pattern_count, 0);
    }

    #[test]
    fn test_file_coupling_needs_strong_pair() {
        let weak = [pair("a", "b", 1.2, 0.35)];
        let set = PatternSet {
            cooccurrence: &weak,
            ..Default::default()
        };
        assert!(synthesize(&set).is_empty());

        let strong = [pair("a", "b", 4.0, 1.0), pair("c", "d", 2.5, 0.7)];
        let set = PatternSet {
            cooccurrence: &strong,
            ..Default::default()
        };
        let insights = synthesize(&set);
        assert_eq!(types(&insights), vec![InsightType::FileCoupling]);
        assert_eq!(insights[0].confidence, 0.9);
        assert_eq!(insights[0].supporting_patterns.len(), 2);
        assert_eq!(insights[0].risk.level, RiskLevel::Low);
    }

    #[test]
    fn test_temporal_insight_requires_high_significance() {
        let quiet = [temporal(0.5)];
        let set = PatternSet {
            temporal: &quiet,
            ..Default::default()
        };
        assert!(synthesize(&set).is_empty());

        let loud = [temporal(0.9)];
        let set = PatternSet {
            temporal: &loud,
            ..Default::default()
        };
        let insights = synthesize(&set);
        assert_eq!(types(&insights), vec![InsightType::TemporalPatterns]);
        assert_eq!(insights[0].risk.level, RiskLevel::Low);
        assert_eq!(insights[0].confidence, 0.8);
    }

    #[test]
    fn test_developer_specialization() {
        let files = ["a", "b", "c", "d", "e"];
        let devs = [
            developer("ana@x", &files, 0.9),
            developer("bob@x", &files[..4], 0.9),
            developer("cam@x", &files, 0.5),
        ];
        let set = PatternSet {
            developer: &devs,
            ..Default::default()
        };
        let insights = synthesize(&set);
        assert_eq!(types(&insights), vec![InsightType::DeveloperSpecialization]);
        assert_eq!(
            insights[0].supporting_patterns,
            vec![PatternRef::new(PatternKind::Developer, "ana@x")]
        );
    }

    #[test]
    fn test_high_risk_files_trigger() {
        // three high files are not enough
        let three_high: Vec<MagnitudePattern> = (0..3)
            .map(|i| file(&format!("h{i}"), 0.65, RiskLevel::High))
            .collect();
        let set = PatternSet {
            magnitude: &three_high,
            ..Default::default()
        };
        assert!(synthesize(&set).is_empty());

        let four_high: Vec<MagnitudePattern> = (0..4)
            .map(|i| file(&format!("h{i}"), 0.65, RiskLevel::High))
            .collect();
        let set = PatternSet {
            magnitude: &four_high,
            ..Default::default()
        };
        let insights = synthesize(&set);
        assert_eq!(types(&insights), vec![InsightType::HighRiskFiles]);
        assert_eq!(insights[0].risk.level, RiskLevel::Critical);
        assert_eq!(insights[0].confidence, 0.95);

        let one_critical = [file("c", 0.85, RiskLevel::Critical)];
        let set = PatternSet {
            magnitude: &one_critical,
            ..Default::default()
        };
        let insights = synthesize(&set);
        assert_eq!(
            types(&insights),
            vec![InsightType::HighRiskFiles, InsightType::ChangeAnomalies]
        );
    }

    #[test]
    fn test_knowledge_concentration_factor() {
        let files = [file("core.rs", 0.85, RiskLevel::Critical)];
        let devs = [developer("ana@x", &["core.rs"], 0.2)];
        let set = PatternSet {
            magnitude: &files,
            developer: &devs,
            ..Default::default()
        };
        let insights = synthesize(&set);
        let high_risk = &insights[0];
        assert!(
            high_risk
                .risk
                .factors
                .iter()
                .any(|f| f.contains("knowledge concentration") && f.contains("ana@x"))
        );
    }

    #[test]
    fn test_coupled_hotspots() {
        let pairs = [pair("core.rs", "util.rs", 4.0, 1.0)];
        let files = [
            file("core.rs", 0.65, RiskLevel::High),
            file("other.rs", 0.65, RiskLevel::High),
        ];
        let set = PatternSet {
            cooccurrence: &pairs,
            magnitude: &files,
            ..Default::default()
        };
        let insights = synthesize(&set);
        assert_eq!(
            types(&insights),
            vec![InsightType::FileCoupling, InsightType::CoupledHotspots]
        );
        let hotspot = &insights[1];
        assert_eq!(hotspot.confidence, 0.85);
        assert_eq!(hotspot.risk.level, RiskLevel::High);
        assert!(
            hotspot
                .supporting_patterns
                .contains(&PatternRef::new(PatternKind::Cooccurrence, "core.rs|util.rs"))
        );
    }

    #[test]
    fn test_every_rule_at_once_fires_each_type_once() {
        let pairs = [pair("core.rs", "util.rs", 4.0, 1.0)];
        let temporal_patterns = [temporal(0.95)];
        let devs = [developer("ana@x", &["a", "b", "c", "d", "e"], 0.9)];
        let files = [file("core.rs", 0.9, RiskLevel::Critical)];
        let set = PatternSet {
            cooccurrence: &pairs,
            temporal: &temporal_patterns,
            developer: &devs,
            magnitude: &files,
        };
        let insights = synthesize(&set);
        // critical, high, then the low-risk ones by confidence
        assert_eq!(
            types(&insights),
            vec![
                InsightType::HighRiskFiles,
                InsightType::CoupledHotspots,
                InsightType::FileCoupling,
                InsightType::DeveloperSpecialization,
                InsightType::TemporalPatterns,
                InsightType::ChangeAnomalies,
            ]
        );
        assert_eq!(synthesize(&set), insights);

        let summary = summarize(&insights);
        assert_eq!(summary.pattern_count, 6);
        assert_eq!(summary.anomaly_count, 2);
    }

    #[test]
    fn test_rank_orders_by_risk_then_confidence_then_type() {
        let make = |insight_type, level, confidence: f64, description: &str| Insight {
            insight_type,
            description: description.to_string(),
            confidence,
            supporting_patterns: Vec::new(),
            recommendations: Vec::new(),
            risk: RiskAssessment {
                level,
                factors: Vec::new(),
            },
        };
        let mut insights = vec![
            make(InsightType::TemporalPatterns, RiskLevel::Low, 0.8, "t"),
            make(InsightType::ChangeAnomalies, RiskLevel::Medium, 0.7, "c"),
            make(InsightType::DeveloperSpecialization, RiskLevel::Low, 0.8, "d"),
            make(InsightType::FileCoupling, RiskLevel::Medium, 0.9, "f2"),
            make(InsightType::FileCoupling, RiskLevel::Medium, 0.9, "f1"),
            make(InsightType::HighRiskFiles, RiskLevel::Critical, 0.5, "h"),
        ];
        rank(&mut insights);
        let order: Vec<&str> = insights.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(order, vec!["h", "f1", "f2", "c", "d", "t"]);

        let mut reversed: Vec<Insight> = insights.iter().rev().cloned().collect();
        rank(&mut reversed);
        assert_eq!(reversed, insights);
    }
}
