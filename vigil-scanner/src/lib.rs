//! Vigil Scanner - Trivy orchestration and report normalization
//!
//! This crate shells out to the Trivy CLI for vulnerability and secret
//! scanning and reshapes its JSON report into the fixed internal schema
//! the result store persists.

pub mod report;
pub mod trivy;

pub use report::{normalize, TrivyReport};
pub use trivy::{ScanError, TrivyScanner};
