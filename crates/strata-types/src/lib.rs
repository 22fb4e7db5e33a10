// crates/strata-types/src/lib.rs
// Shared types for Strata (pattern records, insights, run reports)
// No native-only dependencies allowed here

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ═══════════════════════════════════════
// TIERS AND LEVELS
// ═══════════════════════════════════════

/// Strength tier of a co-occurrence pattern, derived from lift and confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthTier {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl StrengthTier {
    /// Classify a file pair. Never hand-set a tier, always go through here.
    pub fn classify(lift: f64, confidence: f64) -> Self {
        if lift >= 3.0 && confidence >= 0.8 {
            StrengthTier::VeryStrong
        } else if lift >= 2.0 && confidence >= 0.6 {
            StrengthTier::Strong
        } else if lift >= 1.5 && confidence >= 0.4 {
            StrengthTier::Moderate
        } else {
            StrengthTier::Weak
        }
    }

    /// True for `strong` and `very_strong`
    pub fn is_strong(&self) -> bool {
        matches!(self, StrengthTier::Strong | StrengthTier::VeryStrong)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrengthTier::Weak => "weak",
            StrengthTier::Moderate => "moderate",
            StrengthTier::Strong => "strong",
            StrengthTier::VeryStrong => "very_strong",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "weak" => Some(StrengthTier::Weak),
            "moderate" => Some(StrengthTier::Moderate),
            "strong" => Some(StrengthTier::Strong),
            "very_strong" => Some(StrengthTier::VeryStrong),
            _ => None,
        }
    }
}

/// Cyclical time dimension a temporal pattern is measured over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl PeriodType {
    pub const ALL: [PeriodType; 4] = [
        PeriodType::Hourly,
        PeriodType::Daily,
        PeriodType::Weekly,
        PeriodType::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Hourly => "hourly",
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "hourly" => Some(PeriodType::Hourly),
            "daily" => Some(PeriodType::Daily),
            "weekly" => Some(PeriodType::Weekly),
            "monthly" => Some(PeriodType::Monthly),
            _ => None,
        }
    }
}

/// Size bucket on average lines changed per touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
    Massive,
}

impl SizeCategory {
    pub fn classify(avg_lines_changed: f64) -> Self {
        if avg_lines_changed < 10.0 {
            SizeCategory::Small
        } else if avg_lines_changed < 100.0 {
            SizeCategory::Medium
        } else if avg_lines_changed < 500.0 {
            SizeCategory::Large
        } else {
            SizeCategory::Massive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeCategory::Small => "small",
            SizeCategory::Medium => "medium",
            SizeCategory::Large => "large",
            SizeCategory::Massive => "massive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "small" => Some(SizeCategory::Small),
            "medium" => Some(SizeCategory::Medium),
            "large" => Some(SizeCategory::Large),
            "massive" => Some(SizeCategory::Massive),
            _ => None,
        }
    }
}

/// Direction of change density over a file's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "increasing" => Some(Trend::Increasing),
            "decreasing" => Some(Trend::Decreasing),
            "stable" => Some(Trend::Stable),
            _ => None,
        }
    }
}

/// Risk level shared by magnitude patterns and insights
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Risk of modifying a file, from its magnitude statistics.
    ///
    /// Pure function: the same inputs always give the same level.
    pub fn classify_magnitude(
        anomaly_score: f64,
        size_category: SizeCategory,
        volatility_score: f64,
        frequency_score: f64,
    ) -> Self {
        if anomaly_score > 0.8 || (size_category == SizeCategory::Massive && volatility_score > 1.0) {
            RiskLevel::Critical
        } else if anomaly_score > 0.6 || volatility_score > 0.8 {
            RiskLevel::High
        } else if anomaly_score > 0.4 || frequency_score > 2.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Scale a level by how many patterns back an insight
    pub fn scaled_by_count(count: usize, medium_at: usize, high_at: usize) -> Self {
        if count >= high_at {
            RiskLevel::High
        } else if count >= medium_at {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════
// PATTERN RECORDS
// ═══════════════════════════════════════

/// Two files that change together more often than chance.
/// `file_a < file_b` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooccurrencePattern {
    pub file_a: String,
    pub file_b: String,
    pub cooccurrence_count: u32,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    pub commits: Vec<String>,
    pub strength: StrengthTier,
}

impl CooccurrencePattern {
    /// Canonical pair key used for references and storage
    pub fn key(&self) -> String {
        format!("{}|{}", self.file_a, self.file_b)
    }

    pub fn involves(&self, path: &str) -> bool {
        self.file_a == path || self.file_b == path
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalBin {
    pub label: String,
    pub count: u32,
}

/// A non-uniform distribution of commit activity over one period type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalPattern {
    pub period_type: PeriodType,
    pub bins: Vec<TemporalBin>,
    /// Labels of bins whose count exceeds mean + 1 stddev
    pub peak_bins: Vec<String>,
    pub significance: f64,
    /// None for the weekly series, which is scored by coefficient of variation
    pub chi_square: Option<f64>,
    pub contributing_authors: Vec<String>,
    pub contributing_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuthorIdentity {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTouch {
    pub path: String,
    pub touches: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub email: String,
    pub name: String,
    pub shared_files: u32,
}

/// Per-contributor specialization, velocity and collaboration profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeveloperPattern {
    pub author: AuthorIdentity,
    pub commit_count: u32,
    pub specialty_files: Vec<FileTouch>,
    /// Commits per week over the author's active timespan
    pub velocity: f64,
    pub consistency: f64,
    pub collaborators: Vec<Collaborator>,
    pub shared_files: Vec<String>,
    pub avg_files_per_commit: f64,
    pub avg_lines_per_commit: f64,
    /// Integer percentages keyed by commit type, summing to 100
    pub commit_types: BTreeMap<String, u32>,
}

/// Change size, frequency and risk profile of a single file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnitudePattern {
    pub file_path: String,
    pub size_category: SizeCategory,
    pub avg_lines_changed: f64,
    pub std_dev_lines: f64,
    pub change_count: u32,
    pub contributor_count: u32,
    pub lifespan_days: f64,
    /// Changes per week
    pub frequency_score: f64,
    pub volatility_score: f64,
    pub trend: Trend,
    pub anomaly_score: f64,
    pub risk_level: RiskLevel,
}

/// Hotspot view of the same file statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyPattern {
    pub file_path: String,
    pub change_frequency: f64,
    pub hotspot_score: f64,
    pub stability_score: f64,
    pub contributor_diversity: f64,
    pub change_types: BTreeMap<String, u32>,
}

// ═══════════════════════════════════════
// INSIGHTS
// ═══════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Cooccurrence,
    Temporal,
    Developer,
    Magnitude,
    Frequency,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Cooccurrence => "cooccurrence",
            PatternKind::Temporal => "temporal",
            PatternKind::Developer => "developer",
            PatternKind::Magnitude => "magnitude",
            PatternKind::Frequency => "frequency",
        }
    }
}

/// Reference from an insight to the pattern record backing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRef {
    pub kind: PatternKind,
    pub key: String,
}

impl PatternRef {
    pub fn new(kind: PatternKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    FileCoupling,
    TemporalPatterns,
    DeveloperSpecialization,
    HighRiskFiles,
    ChangeAnomalies,
    CoupledHotspots,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::FileCoupling => "file_coupling",
            InsightType::TemporalPatterns => "temporal_patterns",
            InsightType::DeveloperSpecialization => "developer_specialization",
            InsightType::HighRiskFiles => "high_risk_files",
            InsightType::ChangeAnomalies => "change_anomalies",
            InsightType::CoupledHotspots => "coupled_hotspots",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "file_coupling" => Some(InsightType::FileCoupling),
            "temporal_patterns" => Some(InsightType::TemporalPatterns),
            "developer_specialization" => Some(InsightType::DeveloperSpecialization),
            "high_risk_files" => Some(InsightType::HighRiskFiles),
            "change_anomalies" => Some(InsightType::ChangeAnomalies),
            "coupled_hotspots" => Some(InsightType::CoupledHotspots),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub factors: Vec<String>,
}

/// A synthesized finding with confidence, evidence and recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub insight_type: InsightType,
    pub description: String,
    pub confidence: f64,
    pub supporting_patterns: Vec<PatternRef>,
    pub recommendations: Vec<String>,
    pub risk: RiskAssessment,
}

// ═══════════════════════════════════════
// RUN REPORT
// ═══════════════════════════════════════

/// Optional commit bounds: `from` is exclusive, `to` is inclusive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Cooccurrence,
    Temporal,
    Developer,
    Magnitude,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Cooccurrence => "cooccurrence",
            Algorithm::Temporal => "temporal",
            Algorithm::Developer => "developer",
            Algorithm::Magnitude => "magnitude",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlgorithmStatus {
    Succeeded { skipped_records: usize },
    Failed { error: String },
}

impl AlgorithmStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, AlgorithmStatus::Failed { .. })
    }

    pub fn skipped_records(&self) -> usize {
        match self {
            AlgorithmStatus::Succeeded { skipped_records } => *skipped_records,
            AlgorithmStatus::Failed { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub pattern_count: usize,
    pub mean_score: f64,
    pub std_dev: f64,
    pub significance_threshold: f64,
    pub anomaly_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmReport<T> {
    pub patterns: Vec<T>,
    pub execution_ms: u64,
    pub status: AlgorithmStatus,
    pub stats: SummaryStats,
}

impl<T> AlgorithmReport<T> {
    /// Report for an analyzer that did not produce a result
    pub fn failed(error: impl Into<String>, execution_ms: u64, significance_threshold: f64) -> Self {
        Self {
            patterns: Vec::new(),
            execution_ms,
            status: AlgorithmStatus::Failed {
                error: error.into(),
            },
            stats: SummaryStats {
                significance_threshold,
                ..SummaryStats::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    SucceededWithSkips { skipped_records: usize },
    Degraded { failed_algorithms: Vec<String> },
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::SucceededWithSkips { .. } => "succeeded_with_skips",
            RunOutcome::Degraded { .. } => "degraded",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTimings {
    pub fetch_ms: u64,
    pub analyze_ms: u64,
    pub synthesize_ms: u64,
    pub persist_ms: u64,
    pub total_ms: u64,
}

/// Consolidated result of one detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub project_id: i64,
    pub range: CommitRange,
    pub started_at: String,
    pub success: bool,
    pub outcome: RunOutcome,
    pub commit_count: usize,
    pub cooccurrence: AlgorithmReport<CooccurrencePattern>,
    pub temporal: AlgorithmReport<TemporalPattern>,
    pub developer: AlgorithmReport<DeveloperPattern>,
    pub magnitude: AlgorithmReport<MagnitudePattern>,
    pub frequency_patterns: Vec<FrequencyPattern>,
    pub insights: Vec<Insight>,
    pub insight_stats: SummaryStats,
    pub timings: RunTimings,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl AnalysisReport {
    /// Pattern records across all four analyzers (frequency records excluded)
    pub fn total_patterns(&self) -> usize {
        self.cooccurrence.patterns.len()
            + self.temporal.patterns.len()
            + self.developer.patterns.len()
            + self.magnitude.patterns.len()
    }
}
