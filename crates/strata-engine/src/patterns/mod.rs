// crates/strata-engine/src/patterns/mod.rs
// The four leaf analyzers and the dataset they share

pub mod cooccurrence;
pub mod dataset;
pub mod developer;
pub mod magnitude;
pub mod stats;
pub mod temporal;

pub use dataset::{AnalyzerOutput, ChangeDataset, CommitRecord, FileChange, FileStatsRow};
pub use magnitude::MagnitudeOutput;
