//! API routes for the dashboard

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use vigil_core::models::ScanReport;
use vigil_core::Database;
use vigil_scanner::TrivyScanner;

/// Application state shared across handlers
pub struct AppState {
    /// Database connection
    pub db: Database,
    /// External scanner wrapper
    pub scanner: TrivyScanner,
}

/// Create the API router
pub fn create_router(db: Database) -> Router {
    router(Arc::new(AppState {
        db,
        scanner: TrivyScanner::from_env(),
    }))
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/scan", post(scan_container))
        .route("/api/dashboard", get(dashboard_summary))
        .route("/api/clear-data", post(clear_data))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main dashboard page
async fn index() -> Html<&'static str> {
    Html(include_str!("../static/dashboard.html"))
}

/// Handler for unmatched routes
async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Endpoint not found" })),
    )
}

/// Pull `container_name` out of a JSON request body. `None` for bodies
/// that are not JSON objects or lack the field.
fn extract_container_name(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Value>(body)
        .ok()?
        .get("container_name")?
        .as_str()
        .map(str::to_string)
}

/// Condensed scan response: counts plus the check-run summary under the
/// `bench_summary` key the dashboard consumes. The key is entirely
/// absent when the scan produced no check run.
fn build_scan_response(scan_id: i64, report: &ScanReport) -> Value {
    let mut response = json!({
        "success": true,
        "scan_id": scan_id,
        "container_name": report.container_name,
        "vulnerability_counts": report.vulnerability_counts,
        "total_vulnerabilities": report.total_vulnerabilities,
    });

    if let Some(results) = &report.check_results {
        response["bench_summary"] = json!({
            "total_checks": results.summary.total_checks,
            "fail_count": results.summary.fail_count,
            "warn_count": results.summary.warn_count,
            "pass_count": results.summary.pass_count,
            "score": results.summary.score,
        });
    }

    response
}

/// Trigger a scan and persist its results
async fn scan_container(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let Some(container_name) = extract_container_name(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Missing container_name in JSON body"
            })),
        )
            .into_response();
    };

    tracing::info!("Starting combined scan for: {}", container_name);

    let report = match state.scanner.scan(&container_name).await {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!("Scan failed for {}: {}", container_name, err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
                .into_response();
        }
    };

    let scan_id = match state.db.save_scan(&report).await {
        Ok(id) => id,
        Err(err) => {
            tracing::error!("Database error saving scan: {}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to save scan results to database"
                })),
            )
                .into_response();
        }
    };

    Json(build_scan_response(scan_id, &report)).into_response()
}

/// Dashboard summary statistics
async fn dashboard_summary(State(state): State<Arc<AppState>>) -> Response {
    match state.db.dashboard_summary().await {
        Ok(data) => Json(json!({ "success": true, "data": data })).into_response(),
        Err(err) => {
            tracing::error!("Database error loading dashboard: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

/// Clear all stored scan data
async fn clear_data(State(state): State<Arc<AppState>>) -> Response {
    match state.db.clear_all().await {
        Ok(()) => Json(json!({
            "success": true,
            "message": "All scan data cleared successfully"
        }))
        .into_response(),
        Err(err) => {
            tracing::error!("Database error clearing data: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": format!("Failed to clear data: {}", err)
                })),
            )
                .into_response()
        }
    }
}
