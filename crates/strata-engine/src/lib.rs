// crates/strata-engine/src/lib.rs
// Strata - change-pattern detection over git commit history

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod git;
pub mod insights;
pub mod patterns;
pub mod source;
pub use error::{Result, StrataError};
