// crates/strata-engine/src/config/file.rs
// File-based configuration from ~/.strata/config.toml

use super::analysis::AnalysisConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level config structure
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct StrataConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Database configuration section
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Override for the database file (default: ~/.strata/strata.db)
    pub path: Option<PathBuf>,
}

impl StrataConfig {
    /// Load config from an explicit path, or ~/.strata/config.toml.
    ///
    /// A missing file yields defaults. A file that fails to parse or validate
    /// is logged and replaced by defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Self::default();
            }
        };

        match Self::parse(&contents) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded config from file");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config file");
                Self::default()
            }
        }
    }

    /// Parse and validate a TOML document
    pub fn parse(contents: &str) -> Result<Self, String> {
        let config: StrataConfig = toml::from_str(contents).map_err(|e| e.to_string())?;
        config.analysis.validate()?;
        Ok(config)
    }

    /// Directory holding config.toml and the default database
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".strata")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Database path from config, falling back to ~/.strata/strata.db
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("strata.db"))
    }
}
