//! Database connection and query functions

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;

use crate::models::{
    CheckItemRow, DashboardSummary, ScanDetails, ScanReport, ScanSummaryRow, VulnerabilityRow,
};
use crate::types::{CheckStatus, Severity};

/// Default row cap for recent-scan listings. Bounds response size on a
/// growing table.
pub const DEFAULT_RECENT_LIMIT: i64 = 20;

/// Window for the dashboard's critical and at-risk aggregates. The
/// all-time scan count is deliberately not windowed.
const RECENT_SCAN_WINDOW: i64 = 20;

/// Shared column list for scan summaries joined with their optional
/// check-run aggregate.
const SUMMARY_SELECT: &str = "\
    SELECT s.id, s.container_name, s.scan_date, \
           s.total_critical, s.total_high, s.total_medium, s.total_low, s.total_negligible, \
           c.total_checks, c.pass_count, c.warn_count, c.fail_count, c.info_count, c.note_count, c.score, \
           (s.total_critical + s.total_high + s.total_medium + s.total_low) AS total_issues, \
           (COALESCE(c.fail_count, 0) + COALESCE(c.warn_count, 0)) AS config_issues \
    FROM scans s \
    LEFT JOIN check_runs c ON s.id = c.scan_id";

/// Schema DDL: four tables with cascading foreign keys plus the secondary
/// indexes. Executed statement by statement by `create_schema`.
const SCHEMA: &[&str] = &[
    "CREATE TABLE scans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        container_name TEXT NOT NULL,
        scan_date TEXT NOT NULL,
        total_critical INTEGER DEFAULT 0,
        total_high INTEGER DEFAULT 0,
        total_medium INTEGER DEFAULT 0,
        total_low INTEGER DEFAULT 0,
        total_negligible INTEGER DEFAULT 0,
        scan_status TEXT DEFAULT 'completed',
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE vulnerabilities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scan_id INTEGER NOT NULL,
        cve_id TEXT,
        severity TEXT,
        package_name TEXT,
        installed_version TEXT,
        fixed_version TEXT,
        title TEXT,
        description TEXT,
        FOREIGN KEY (scan_id) REFERENCES scans (id) ON DELETE CASCADE
    )",
    "CREATE TABLE check_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scan_id INTEGER NOT NULL,
        total_checks INTEGER DEFAULT 0,
        pass_count INTEGER DEFAULT 0,
        warn_count INTEGER DEFAULT 0,
        fail_count INTEGER DEFAULT 0,
        info_count INTEGER DEFAULT 0,
        note_count INTEGER DEFAULT 0,
        score INTEGER DEFAULT 0,
        FOREIGN KEY (scan_id) REFERENCES scans (id) ON DELETE CASCADE
    )",
    "CREATE TABLE check_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        check_run_id INTEGER NOT NULL,
        check_id TEXT,
        status TEXT,
        title TEXT,
        description TEXT,
        FOREIGN KEY (check_run_id) REFERENCES check_runs (id) ON DELETE CASCADE
    )",
    "CREATE INDEX idx_scans_container ON scans(container_name)",
    "CREATE INDEX idx_scans_date ON scans(scan_date)",
    "CREATE INDEX idx_vulns_scan_id ON vulnerabilities(scan_id)",
    "CREATE INDEX idx_vulns_severity ON vulnerabilities(severity)",
    "CREATE INDEX idx_check_runs_scan_id ON check_runs(scan_id)",
    "CREATE INDEX idx_check_items_check_run_id ON check_items(check_run_id)",
];

/// Create all tables and indexes on an empty database.
///
/// Shared by the setup tool and the test fixtures.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Database connection pool wrapper
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist a normalized scan report: the scan row, its vulnerabilities,
    /// and the optional check run with its items, all in one transaction.
    ///
    /// Returns the generated scan id. Any failure rolls the whole insert
    /// sequence back.
    pub async fn save_scan(&self, report: &ScanReport) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let scan_id = sqlx::query(
            "INSERT INTO scans (container_name, scan_date, total_critical, total_high, \
             total_medium, total_low, total_negligible, scan_status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 'completed')",
        )
        .bind(&report.container_name)
        .bind(&report.scan_date)
        .bind(report.vulnerability_counts.critical)
        .bind(report.vulnerability_counts.high)
        .bind(report.vulnerability_counts.medium)
        .bind(report.vulnerability_counts.low)
        .bind(report.vulnerability_counts.negligible)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for vuln in &report.vulnerabilities {
            sqlx::query(
                "INSERT INTO vulnerabilities (scan_id, cve_id, severity, package_name, \
                 installed_version, fixed_version, title, description) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(scan_id)
            .bind(&vuln.cve_id)
            .bind(&vuln.severity)
            .bind(&vuln.package_name)
            .bind(&vuln.installed_version)
            .bind(&vuln.fixed_version)
            .bind(&vuln.title)
            .bind(&vuln.description)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(check_results) = &report.check_results {
            let summary = &check_results.summary;
            let check_run_id = sqlx::query(
                "INSERT INTO check_runs (scan_id, total_checks, pass_count, warn_count, \
                 fail_count, info_count, note_count, score) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(scan_id)
            .bind(summary.total_checks)
            .bind(summary.pass_count)
            .bind(summary.warn_count)
            .bind(summary.fail_count)
            .bind(summary.info_count)
            .bind(summary.note_count)
            .bind(summary.score)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            for check in &check_results.checks {
                sqlx::query(
                    "INSERT INTO check_items (check_run_id, check_id, status, title, description) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(check_run_id)
                .bind(&check.check_id)
                .bind(&check.status)
                .bind(&check.title)
                .bind(&check.description)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(scan_id)
    }

    /// List the most recent scans with their check-run aggregate, newest
    /// first, capped at `limit` rows.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<ScanSummaryRow>, sqlx::Error> {
        let sql = format!("{} ORDER BY s.scan_date DESC LIMIT ?", SUMMARY_SELECT);
        sqlx::query_as::<_, ScanSummaryRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    /// Fetch full detail for one scan, or `None` if the id does not exist.
    ///
    /// Vulnerabilities are ordered most severe first and check items
    /// failures first, using the explicit severity/status ranks.
    pub async fn scan_details(&self, scan_id: i64) -> Result<Option<ScanDetails>, sqlx::Error> {
        let sql = format!("{} WHERE s.id = ?", SUMMARY_SELECT);
        let Some(scan) = sqlx::query_as::<_, ScanSummaryRow>(&sql)
            .bind(scan_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let mut vulnerabilities = sqlx::query_as::<_, VulnerabilityRow>(
            "SELECT id, scan_id, cve_id, severity, package_name, installed_version, \
             fixed_version, title, description \
             FROM vulnerabilities WHERE scan_id = ?",
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;
        vulnerabilities.sort_by_key(|v| Severity::rank_of(&v.severity));

        let mut check_items = sqlx::query_as::<_, CheckItemRow>(
            "SELECT ci.id, ci.check_run_id, ci.check_id, ci.status, ci.title, ci.description \
             FROM check_items ci \
             JOIN check_runs cr ON ci.check_run_id = cr.id \
             WHERE cr.scan_id = ?",
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;
        check_items.sort_by_key(|c| CheckStatus::rank_of(&c.status));

        Ok(Some(ScanDetails {
            scan,
            vulnerabilities,
            check_items,
        }))
    }

    /// Dashboard summary statistics.
    ///
    /// The scan count is all-time; the critical and at-risk aggregates
    /// only consider the 20 most recent scans.
    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, sqlx::Error> {
        let total_scans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await?;

        let total_critical: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_critical), 0) FROM ( \
                SELECT total_critical FROM scans \
                ORDER BY scan_date DESC \
                LIMIT ?)",
        )
        .bind(RECENT_SCAN_WINDOW)
        .fetch_one(&self.pool)
        .await?;

        let containers_with_issues: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ( \
                SELECT id FROM scans \
                WHERE total_critical > 0 OR total_high > 0 \
                ORDER BY scan_date DESC \
                LIMIT ?)",
        )
        .bind(RECENT_SCAN_WINDOW)
        .fetch_one(&self.pool)
        .await?;

        let recent_scans = self.list_recent(DEFAULT_RECENT_LIMIT).await?;

        Ok(DashboardSummary {
            total_scans,
            total_critical,
            containers_with_issues,
            recent_scans,
        })
    }

    /// Delete a scan and its full descendant tree in one transaction.
    ///
    /// Children are removed in dependency order: check items, check runs,
    /// vulnerabilities, then the scan row. Returns whether a scan row was
    /// actually deleted.
    pub async fn delete_scan(&self, scan_id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM check_items WHERE check_run_id IN ( \
                SELECT id FROM check_runs WHERE scan_id = ?)",
        )
        .bind(scan_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM check_runs WHERE scan_id = ?")
            .bind(scan_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM vulnerabilities WHERE scan_id = ?")
            .bind(scan_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM scans WHERE id = ?")
            .bind(scan_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// Delete all rows from all four tables and reset their autoincrement
    /// counters, in one transaction.
    pub async fn clear_all(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM check_items")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM check_runs")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM vulnerabilities")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM scans")
            .execute(&mut *tx)
            .await?;

        // sqlite_sequence only exists once an AUTOINCREMENT insert has
        // happened on this database file.
        let has_sequence: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
        )
        .fetch_optional(&mut *tx)
        .await?;
        if has_sequence.is_some() {
            sqlx::query(
                "DELETE FROM sqlite_sequence \
                 WHERE name IN ('scans', 'vulnerabilities', 'check_runs', 'check_items')",
            )
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CheckFinding, CheckResults, CheckSummary, ScanReport, SeverityCounts, VulnerabilityFinding,
    };

    async fn test_db() -> Database {
        // A single connection keeps every query on the same in-memory
        // database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        create_schema(&pool).await.expect("Failed to create schema");
        Database::from_pool(pool)
    }

    fn vuln(cve: &str, severity: &str) -> VulnerabilityFinding {
        VulnerabilityFinding {
            cve_id: cve.to_string(),
            severity: severity.to_string(),
            package_name: "openssl".to_string(),
            installed_version: "1.1.1".to_string(),
            fixed_version: "1.1.1w".to_string(),
            title: "test vulnerability".to_string(),
            description: "test description".to_string(),
        }
    }

    fn check(id: &str, status: &str) -> CheckFinding {
        CheckFinding {
            check_id: id.to_string(),
            status: status.to_string(),
            title: "exposed secret".to_string(),
            description: "Secret found in config: xxx".to_string(),
            severity: "HIGH".to_string(),
        }
    }

    fn sample_report(container: &str, scan_date: &str) -> ScanReport {
        ScanReport {
            container_name: container.to_string(),
            scan_date: scan_date.to_string(),
            vulnerability_counts: SeverityCounts {
                critical: 2,
                high: 1,
                ..Default::default()
            },
            vulnerabilities: vec![
                vuln("CVE-2024-0001", "CRITICAL"),
                vuln("CVE-2024-0002", "CRITICAL"),
                vuln("CVE-2024-0003", "HIGH"),
            ],
            total_vulnerabilities: 3,
            check_results: None,
        }
    }

    fn report_with_checks(container: &str, scan_date: &str) -> ScanReport {
        let checks = vec![check("aws-access-key-id", "FAIL"), check("github-pat", "FAIL")];
        ScanReport {
            check_results: Some(CheckResults {
                summary: CheckSummary {
                    total_checks: 2,
                    fail_count: 2,
                    score: 98,
                    ..Default::default()
                },
                checks,
            }),
            ..sample_report(container, scan_date)
        }
    }

    #[tokio::test]
    async fn test_save_persists_severity_counters() {
        let db = test_db().await;
        let scan_id = db
            .save_scan(&sample_report("nginx:alpine", "2026-01-01T10:00:00Z"))
            .await
            .unwrap();

        let details = db.scan_details(scan_id).await.unwrap().unwrap();
        assert_eq!(details.scan.total_critical, 2);
        assert_eq!(details.scan.total_high, 1);
        assert_eq!(details.vulnerabilities.len(), 3);

        // Counters equal the per-severity row counts
        let critical_rows = details
            .vulnerabilities
            .iter()
            .filter(|v| v.severity == "CRITICAL")
            .count() as i64;
        assert_eq!(details.scan.total_critical, critical_rows);
    }

    #[tokio::test]
    async fn test_save_without_checks_leaves_aggregate_null() {
        let db = test_db().await;
        db.save_scan(&sample_report("nginx:alpine", "2026-01-01T10:00:00Z"))
            .await
            .unwrap();

        let rows = db.list_recent(DEFAULT_RECENT_LIMIT).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_checks, None);
        assert_eq!(rows[0].score, None);
        assert_eq!(rows[0].config_issues, 0);
        assert_eq!(rows[0].total_issues, 3);
    }

    #[tokio::test]
    async fn test_save_with_checks_persists_run_and_items() {
        let db = test_db().await;
        let scan_id = db
            .save_scan(&report_with_checks("redis:7", "2026-01-01T10:00:00Z"))
            .await
            .unwrap();

        let details = db.scan_details(scan_id).await.unwrap().unwrap();
        assert_eq!(details.scan.total_checks, Some(2));
        assert_eq!(details.scan.score, Some(98));
        assert_eq!(details.check_items.len(), 2);
        assert_eq!(details.scan.config_issues, 2);
    }

    #[tokio::test]
    async fn test_details_orders_vulnerabilities_by_severity() {
        let db = test_db().await;
        let mut report = sample_report("nginx:alpine", "2026-01-01T10:00:00Z");
        report.vulnerabilities = vec![
            vuln("CVE-A", "LOW"),
            vuln("CVE-B", "CRITICAL"),
            vuln("CVE-C", "MEDIUM"),
            vuln("CVE-D", "HIGH"),
        ];
        let scan_id = db.save_scan(&report).await.unwrap();

        let details = db.scan_details(scan_id).await.unwrap().unwrap();
        let order: Vec<&str> = details
            .vulnerabilities
            .iter()
            .map(|v| v.severity.as_str())
            .collect();
        assert_eq!(order, vec!["CRITICAL", "HIGH", "MEDIUM", "LOW"]);
    }

    #[tokio::test]
    async fn test_details_orders_check_items_by_status() {
        let db = test_db().await;
        let mut report = report_with_checks("redis:7", "2026-01-01T10:00:00Z");
        report.check_results.as_mut().unwrap().checks = vec![
            check("c1", "PASS"),
            check("c2", "FAIL"),
            check("c3", "INFO"),
            check("c4", "WARN"),
            check("c5", "NOTE"),
        ];
        let scan_id = db.save_scan(&report).await.unwrap();

        let details = db.scan_details(scan_id).await.unwrap().unwrap();
        let order: Vec<&str> = details
            .check_items
            .iter()
            .map(|c| c.status.as_str())
            .collect();
        assert_eq!(order, vec!["FAIL", "WARN", "INFO", "NOTE", "PASS"]);
    }

    #[tokio::test]
    async fn test_scan_details_missing_id_is_none() {
        let db = test_db().await;
        assert!(db.scan_details(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_scan_removes_descendants() {
        let db = test_db().await;
        let scan_id = db
            .save_scan(&report_with_checks("redis:7", "2026-01-01T10:00:00Z"))
            .await
            .unwrap();

        assert!(db.delete_scan(scan_id).await.unwrap());
        assert!(db.scan_details(scan_id).await.unwrap().is_none());

        let vulns: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vulnerabilities")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM check_items")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(vulns, 0);
        assert_eq!(items, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_scan_returns_false() {
        let db = test_db().await;
        assert!(!db.delete_scan(99).await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_all_empties_dashboard() {
        let db = test_db().await;
        db.save_scan(&report_with_checks("redis:7", "2026-01-01T10:00:00Z"))
            .await
            .unwrap();
        db.save_scan(&sample_report("nginx:alpine", "2026-01-02T10:00:00Z"))
            .await
            .unwrap();

        db.clear_all().await.unwrap();

        let summary = db.dashboard_summary().await.unwrap();
        assert_eq!(summary.total_scans, 0);
        assert_eq!(summary.total_critical, 0);
        assert!(summary.recent_scans.is_empty());

        // Autoincrement counters reset: the next scan starts over at id 1
        let scan_id = db
            .save_scan(&sample_report("nginx:alpine", "2026-01-03T10:00:00Z"))
            .await
            .unwrap();
        assert_eq!(scan_id, 1);
    }

    #[tokio::test]
    async fn test_list_recent_caps_and_orders_by_date() {
        let db = test_db().await;
        for day in 1..=25 {
            let report = sample_report(
                &format!("image-{}", day),
                &format!("2026-01-{:02}T10:00:00Z", day),
            );
            db.save_scan(&report).await.unwrap();
        }

        let rows = db.list_recent(20).await.unwrap();
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[0].container_name, "image-25");
        assert_eq!(rows[19].container_name, "image-6");

        let capped = db.list_recent(5).await.unwrap();
        assert_eq!(capped.len(), 5);
    }

    #[tokio::test]
    async fn test_dashboard_summary_aggregates_two_scans() {
        let db = test_db().await;
        db.save_scan(&sample_report("nginx:alpine", "2026-01-01T10:00:00Z"))
            .await
            .unwrap();
        db.save_scan(&sample_report("redis:7", "2026-01-02T10:00:00Z"))
            .await
            .unwrap();

        let summary = db.dashboard_summary().await.unwrap();
        assert_eq!(summary.total_scans, 2);
        assert_eq!(summary.total_critical, 4);
        assert_eq!(summary.containers_with_issues, 2);
        assert_eq!(summary.recent_scans.len(), 2);
        assert_eq!(summary.recent_scans[0].container_name, "redis:7");
    }

    #[tokio::test]
    async fn test_dashboard_critical_sum_is_windowed() {
        let db = test_db().await;
        // 21 scans with one critical each: the oldest falls outside the
        // 20-scan window while the all-time count keeps it.
        for day in 1..=21 {
            let mut report = sample_report(
                &format!("image-{}", day),
                &format!("2026-01-{:02}T10:00:00Z", day),
            );
            report.vulnerability_counts = SeverityCounts {
                critical: 1,
                ..Default::default()
            };
            report.vulnerabilities = vec![vuln("CVE-X", "CRITICAL")];
            db.save_scan(&report).await.unwrap();
        }

        let summary = db.dashboard_summary().await.unwrap();
        assert_eq!(summary.total_scans, 21);
        assert_eq!(summary.total_critical, 20);
        assert_eq!(summary.containers_with_issues, 20);
    }
}
