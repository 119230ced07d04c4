//! Trivy subprocess invocation
//!
//! One external process per scan, synchronous from the caller's view,
//! bounded by a hard wall-clock timeout. No retries: every failure is
//! terminal for that invocation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

use vigil_core::models::ScanReport;

use crate::report::{self, TrivyReport};

/// Default Trivy binary name, overridable via `TRIVY_PATH`
const DEFAULT_BINARY: &str = "trivy";

/// Hard wall-clock bound on one scanner invocation
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Errors that can occur while running the external scanner
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to launch trivy: {0}")]
    Launch(#[from] std::io::Error),

    #[error("Trivy scan timed out for {container_name}")]
    Timeout { container_name: String },

    #[error("Trivy scan failed: {stderr}")]
    ScannerFailed { stderr: String },

    #[error("Failed to parse Trivy output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Wrapper around the Trivy CLI, configured for combined vulnerability
/// and secret scanning against insecure registries
pub struct TrivyScanner {
    binary: PathBuf,
    timeout: Duration,
}

impl TrivyScanner {
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    /// Build a scanner that invokes a specific binary instead of the
    /// default one on PATH.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Build a scanner from the environment: `TRIVY_PATH` overrides the
    /// binary looked up on PATH.
    pub fn from_env() -> Self {
        match std::env::var("TRIVY_PATH") {
            Ok(path) => Self::with_binary(path),
            Err(_) => Self::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a combined vulnerability and secret scan against a container
    /// reference and normalize the report.
    ///
    /// Exceeding the timeout is a terminal failure for this invocation,
    /// not a retry condition. A non-zero exit surfaces the scanner's
    /// stderr text; malformed report JSON is a parse failure with no
    /// partial result.
    pub async fn scan(&self, container_name: &str) -> Result<ScanReport, ScanError> {
        tracing::info!("Starting Trivy combined scan for: {}", container_name);

        let result = timeout(
            self.timeout,
            Command::new(&self.binary)
                .args([
                    "image",
                    "--scanners",
                    "vuln,secret",
                    "--format",
                    "json",
                    "--insecure",
                    container_name,
                ])
                .env("TRIVY_INSECURE", "true")
                // Reap the scanner if the timeout fires
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match result {
            Ok(output) => output?,
            Err(_) => {
                return Err(ScanError::Timeout {
                    container_name: container_name.to_string(),
                })
            }
        };

        if !output.status.success() {
            return Err(ScanError::ScannerFailed {
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let raw: TrivyReport = serde_json::from_slice(&output.stdout)?;
        let scan_date = chrono::Utc::now().to_rfc3339();
        let report = report::normalize(container_name, scan_date, raw);

        match &report.check_results {
            Some(results) => tracing::info!(
                "Trivy found {} exposed secrets",
                results.summary.total_checks
            ),
            None => tracing::info!("No exposed secrets found"),
        }

        Ok(report)
    }
}

impl Default for TrivyScanner {
    fn default() -> Self {
        Self::new()
    }
}
