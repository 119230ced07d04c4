//! Vigil Setup - one-shot database bootstrap
//!
//! Creates the dashboard schema with backup-before-recreate semantics:
//! an existing database file is renamed to a timestamped backup, never
//! overwritten silently. A verification pass checks that every table
//! exists and reports its column count. Not part of the serving path;
//! run once per deployment or reset.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const REQUIRED_TABLES: &[&str] = &["scans", "vulnerabilities", "check_runs", "check_items"];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_setup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Setting up Vigil dashboard database...");

    let db_path =
        std::env::var("VIGIL_DB_PATH").unwrap_or_else(|_| "./data/vigil.db".to_string());
    let path = Path::new(&db_path);

    if let Some(backup) = backup_existing(path)? {
        tracing::info!("Existing database backed up as: {}", backup.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await
        .context("Failed to create database")?;

    vigil_core::db::create_schema(&pool)
        .await
        .context("Failed to create schema")?;
    tracing::info!("Database created successfully: {}", db_path);

    verify(&pool).await?;
    tracing::info!("Database verification complete");

    Ok(())
}

/// Rename an existing database file to a timestamped backup.
///
/// Returns the backup path, or `None` when there was nothing to back up.
fn backup_existing(path: &Path) -> std::io::Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup = backup_path(path, &stamp);
    std::fs::rename(path, &backup)?;
    Ok(Some(backup))
}

fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("vigil");
    path.with_file_name(format!("{}_backup_{}.db", stem, stamp))
}

/// Check that every required table exists and report column counts.
async fn verify(pool: &SqlitePool) -> Result<()> {
    for table in REQUIRED_TABLES {
        let exists: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_optional(pool)
        .await?;
        if exists.is_none() {
            bail!("Table '{}' missing", table);
        }

        let columns: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?)")
            .bind(table)
            .fetch_one(pool)
            .await?;
        tracing::info!("Table '{}' has {} columns", table, columns);
    }
    Ok(())
}
