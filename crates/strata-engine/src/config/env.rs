// crates/strata-engine/src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use super::file::StrataConfig;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Settings read from STRATA_* environment variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    /// Database file (STRATA_DB_PATH)
    pub db_path: Option<PathBuf>,
    /// Run budget override (STRATA_RUN_TIMEOUT_SECS)
    pub run_timeout_secs: Option<u64>,
    /// Log level name (STRATA_LOG)
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary lookup (used by tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let run_timeout_secs = read("STRATA_RUN_TIMEOUT_SECS").and_then(|v| {
            match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(secs),
                _ => {
                    warn!(value = %v, "Ignoring invalid STRATA_RUN_TIMEOUT_SECS");
                    None
                }
            }
        });

        let config = Self {
            db_path: read("STRATA_DB_PATH").map(PathBuf::from),
            run_timeout_secs,
            log_level: read("STRATA_LOG").map(|v| v.trim().to_lowercase()),
        };
        debug!(?config, "Environment config loaded");
        config
    }

    /// Environment wins over the config file
    pub fn apply(&self, config: &mut StrataConfig) {
        if let Some(ref path) = self.db_path {
            config.database.path = Some(path.clone());
        }
        if let Some(secs) = self.run_timeout_secs {
            config.analysis.timeout_secs = secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_reads_all_vars() {
        let env = EnvConfig::from_lookup(lookup(&[
            ("STRATA_DB_PATH", "/tmp/s.db"),
            ("STRATA_RUN_TIMEOUT_SECS", "45"),
            ("STRATA_LOG", "DEBUG"),
        ]));
        assert_eq!(env.db_path, Some(PathBuf::from("/tmp/s.db")));
        assert_eq!(env.run_timeout_secs, Some(45));
        assert_eq!(env.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_ignores_empty_and_invalid() {
        let env = EnvConfig::from_lookup(lookup(&[
            ("STRATA_DB_PATH", "  "),
            ("STRATA_RUN_TIMEOUT_SECS", "soon"),
        ]));
        assert_eq!(env, EnvConfig::default());

        let env = EnvConfig::from_lookup(lookup(&[("STRATA_RUN_TIMEOUT_SECS", "0")]));
        assert_eq!(env.run_timeout_secs, None);
    }

    #[test]
    fn test_apply_overrides_file_config() {
        let mut config = StrataConfig::default();
        let env = EnvConfig::from_lookup(lookup(&[
            ("STRATA_DB_PATH", "/data/strata.db"),
            ("STRATA_RUN_TIMEOUT_SECS", "10"),
        ]));
        env.apply(&mut config);
        assert_eq!(config.db_path(), PathBuf::from("/data/strata.db"));
        assert_eq!(config.analysis.timeout_secs, 10);
    }
}
