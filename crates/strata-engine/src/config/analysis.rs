// crates/strata-engine/src/config/analysis.rs
// Tunable thresholds for the four analyzers and the run budget
//
// Defaults are carried over unvalidated from the heuristics the engine was
// first tuned with. Change them through config.toml, not in code.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub cooccurrence: CooccurrenceConfig,
    pub temporal: TemporalConfig,
    pub developer: DeveloperConfig,
    pub magnitude: MagnitudeConfig,
    /// Wall-clock budget for fetch + analyze + synthesize
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cooccurrence: CooccurrenceConfig::default(),
            temporal: TemporalConfig::default(),
            developer: DeveloperConfig::default(),
            magnitude: MagnitudeConfig::default(),
            timeout_secs: 300,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject values that would make the statistics meaningless
    pub fn validate(&self) -> Result<(), String> {
        let c = &self.cooccurrence;
        if !(0.0..=1.0).contains(&c.min_support) || !(0.0..=1.0).contains(&c.min_confidence) {
            return Err("cooccurrence support/confidence thresholds must be within [0, 1]".into());
        }
        if !c.min_lift.is_finite() || c.min_lift < 0.0 {
            return Err("cooccurrence.min_lift must be >= 0".into());
        }
        let t = &self.temporal;
        if !(t.significance_level > 0.0 && t.significance_level < 1.0) {
            return Err("temporal.significance_level must be within (0, 1)".into());
        }
        let m = &self.magnitude;
        let references = [
            m.reference_avg_lines,
            m.reference_volatility,
            m.reference_frequency,
        ];
        if references.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err("magnitude reference thresholds must be > 0".into());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooccurrenceConfig {
    pub min_support: f64,
    pub min_confidence: f64,
    pub min_lift: f64,
    /// Commits touching more files than this are left out of pair counting
    pub max_files_per_commit: usize,
}

impl Default for CooccurrenceConfig {
    fn default() -> Self {
        Self {
            min_support: 0.01,
            min_confidence: 0.30,
            min_lift: 1.1,
            max_files_per_commit: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// A period type is reported only above this strength
    pub min_strength: f64,
    /// p-value for the chi-square critical value (0.05 -> 35.17 at 23 df)
    pub significance_level: f64,
    pub min_weekly_buckets: usize,
    pub max_contributors: usize,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            min_strength: 0.3,
            significance_level: 0.05,
            min_weekly_buckets: 3,
            max_contributors: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeveloperConfig {
    pub min_commits: usize,
    pub top_specialties: usize,
    pub max_collaborators: usize,
    pub max_shared_files: usize,
}

impl Default for DeveloperConfig {
    fn default() -> Self {
        Self {
            min_commits: 3,
            top_specialties: 10,
            max_collaborators: 5,
            max_shared_files: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnitudeConfig {
    pub min_changes: u32,
    pub reference_avg_lines: f64,
    pub reference_volatility: f64,
    pub reference_frequency: f64,
}

impl Default for MagnitudeConfig {
    fn default() -> Self {
        Self {
            min_changes: 2,
            reference_avg_lines: 100.0,
            reference_volatility: 0.5,
            reference_frequency: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_heuristics() {
        let config = AnalysisConfig::default();
        assert_eq!(config.cooccurrence.min_support, 0.01);
        assert_eq!(config.cooccurrence.min_confidence, 0.30);
        assert_eq!(config.cooccurrence.min_lift, 1.1);
        assert_eq!(config.temporal.min_strength, 0.3);
        assert_eq!(config.developer.min_commits, 3);
        assert_eq!(config.magnitude.reference_avg_lines, 100.0);
        assert_eq!(config.magnitude.reference_volatility, 0.5);
        assert_eq!(config.magnitude.reference_frequency, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
timeout_secs = 60

[cooccurrence]
min_lift = 2.0
"#,
        )
        .unwrap();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.cooccurrence.min_lift, 2.0);
        assert_eq!(config.cooccurrence.min_support, 0.01);
        assert_eq!(config.temporal, TemporalConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AnalysisConfig::default();
        config.cooccurrence.min_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.temporal.significance_level = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.magnitude.reference_avg_lines = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.magnitude.reference_frequency = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
