//! Shared type definitions for Vigil

use serde::{Deserialize, Serialize};

/// Severity level for a vulnerability finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Negligible,
    /// Reported by the scanner with no severity attached
    Unknown,
}

impl Severity {
    /// Sort rank, most severe first. Used instead of string comparison
    /// when ordering findings for display.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 1,
            Severity::High => 2,
            Severity::Medium => 3,
            Severity::Low => 4,
            Severity::Negligible => 5,
            Severity::Unknown => 6,
        }
    }

    /// Rank for a severity string as stored in the database.
    /// Unrecognized values sort last.
    pub fn rank_of(s: &str) -> u8 {
        s.parse::<Severity>().map_or(7, Severity::rank)
    }

    /// Parse a severity as reported by the scanner, case-insensitively.
    /// Missing or unrecognized values normalize to `Unknown`.
    pub fn from_report(s: Option<&str>) -> Severity {
        s.and_then(|s| s.parse().ok()).unwrap_or(Severity::Unknown)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
            Severity::Negligible => write!(f, "NEGLIGIBLE"),
            Severity::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CRITICAL" => Ok(Severity::Critical),
            "HIGH" => Ok(Severity::High),
            "MEDIUM" => Ok(Severity::Medium),
            "LOW" => Ok(Severity::Low),
            "NEGLIGIBLE" => Ok(Severity::Negligible),
            "UNKNOWN" => Ok(Severity::Unknown),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Status of an individual check item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Fail,
    Warn,
    Info,
    Note,
    Pass,
}

impl CheckStatus {
    /// Sort rank, failures first.
    pub fn rank(self) -> u8 {
        match self {
            CheckStatus::Fail => 1,
            CheckStatus::Warn => 2,
            CheckStatus::Info => 3,
            CheckStatus::Note => 4,
            CheckStatus::Pass => 5,
        }
    }

    /// Rank for a status string as stored in the database.
    /// Unrecognized values sort last.
    pub fn rank_of(s: &str) -> u8 {
        s.parse::<CheckStatus>().map_or(6, CheckStatus::rank)
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Fail => write!(f, "FAIL"),
            CheckStatus::Warn => write!(f, "WARN"),
            CheckStatus::Info => write!(f, "INFO"),
            CheckStatus::Note => write!(f, "NOTE"),
            CheckStatus::Pass => write!(f, "PASS"),
        }
    }
}

impl std::str::FromStr for CheckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FAIL" => Ok(CheckStatus::Fail),
            "WARN" => Ok(CheckStatus::Warn),
            "INFO" => Ok(CheckStatus::Info),
            "NOTE" => Ok(CheckStatus::Note),
            "PASS" => Ok(CheckStatus::Pass),
            _ => Err(format!("Unknown check status: {}", s)),
        }
    }
}
