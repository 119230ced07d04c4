//! Database models for Vigil

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::Severity;

/// Vulnerability histogram with the five counted severity buckets.
///
/// Serialized keys match the `vulnerability_counts` object of the scan
/// response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub negligible: i64,
}

impl SeverityCounts {
    /// Increment the bucket for a severity. `Unknown` is not counted.
    pub fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Negligible => self.negligible += 1,
            Severity::Unknown => {}
        }
    }

    pub fn total(&self) -> i64 {
        self.critical + self.high + self.medium + self.low + self.negligible
    }
}

/// A single normalized vulnerability finding from the scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    pub cve_id: String,
    /// Uppercase severity, one of the `Severity` values
    pub severity: String,
    pub package_name: String,
    pub installed_version: String,
    pub fixed_version: String,
    pub title: String,
    /// Truncated to 500 characters at normalization time
    pub description: String,
}

/// A single normalized secret-exposure finding, shaped as a check item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFinding {
    pub check_id: String,
    /// Always "FAIL" for secret findings; the scanner only reports
    /// confirmed exposures
    pub status: String,
    pub title: String,
    pub description: String,
    /// Uppercase severity, defaulting to HIGH when the scanner omits it
    pub severity: String,
}

/// Aggregate counts over a batch of check findings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub total_checks: i64,
    pub pass_count: i64,
    pub warn_count: i64,
    pub fail_count: i64,
    pub info_count: i64,
    pub note_count: i64,
    /// Derived strictly from `total_checks`: max(0, 100 - total_checks)
    pub score: i64,
}

/// Check-run summary plus its individual findings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResults {
    pub summary: CheckSummary,
    pub checks: Vec<CheckFinding>,
}

/// A complete normalized scan report, ready for persistence.
///
/// Only produced for successful scanner invocations; failures surface as
/// `ScanError` and never reach the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub container_name: String,
    /// ISO-8601 timestamp taken when the scan completed
    pub scan_date: String,
    pub vulnerability_counts: SeverityCounts,
    pub vulnerabilities: Vec<VulnerabilityFinding>,
    pub total_vulnerabilities: i64,
    /// `None` when the scan found no exposed secrets; the API omits
    /// `bench_summary` entirely in that case
    pub check_results: Option<CheckResults>,
}

/// A scan row joined with its optional check-run aggregate.
///
/// Note: timestamps are `String` because SQLite returns TEXT format and
/// this struct derives FromRow for direct database queries. The aggregate
/// fields are `Option` because the join is a LEFT JOIN - scans without a
/// check run still appear.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanSummaryRow {
    pub id: i64,
    pub container_name: String,
    pub scan_date: String,
    pub total_critical: i64,
    pub total_high: i64,
    pub total_medium: i64,
    pub total_low: i64,
    pub total_negligible: i64,
    pub total_checks: Option<i64>,
    pub pass_count: Option<i64>,
    pub warn_count: Option<i64>,
    pub fail_count: Option<i64>,
    pub info_count: Option<i64>,
    pub note_count: Option<i64>,
    pub score: Option<i64>,
    /// critical + high + medium + low, computed in the query
    pub total_issues: i64,
    /// fail_count + warn_count with nulls coalesced to zero
    pub config_issues: i64,
}

/// A vulnerability row from the database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VulnerabilityRow {
    pub id: i64,
    pub scan_id: i64,
    pub cve_id: String,
    pub severity: String,
    pub package_name: String,
    pub installed_version: String,
    pub fixed_version: String,
    pub title: String,
    pub description: String,
}

/// A check item row from the database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckItemRow {
    pub id: i64,
    pub check_run_id: i64,
    pub check_id: String,
    pub status: String,
    pub title: String,
    pub description: String,
}

/// Full detail for one scan: the summary row, its vulnerabilities ordered
/// most severe first, and its check items ordered failures first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDetails {
    pub scan: ScanSummaryRow,
    pub vulnerabilities: Vec<VulnerabilityRow>,
    pub check_items: Vec<CheckItemRow>,
}

/// Dashboard summary statistics.
///
/// `total_scans` is all-time; the critical and at-risk aggregates are
/// windowed to the 20 most recent scans to bound query cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_scans: i64,
    pub total_critical: i64,
    pub containers_with_issues: i64,
    pub recent_scans: Vec<ScanSummaryRow>,
}
