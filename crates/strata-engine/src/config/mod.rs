// crates/strata-engine/src/config/mod.rs
// Configuration: analysis thresholds, config file, environment

pub mod analysis;
pub mod env;
pub mod file;

pub use analysis::{
    AnalysisConfig, CooccurrenceConfig, DeveloperConfig, MagnitudeConfig, TemporalConfig,
};
pub use env::EnvConfig;
pub use file::StrataConfig;
