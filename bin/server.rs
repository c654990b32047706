// Medallion ETL - Web Server
// Read-only REST API over the published warehouse tables

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use medallion_etl::config::{is_identifier, load_config};
use medallion_etl::reports::{find_report, GOLD_REPORTS};
use medallion_etl::telemetry::{init_tracing, DEFAULT_FILTER};
use medallion_etl::warehouse::Warehouse;
use medallion_etl::VERSION;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

type Row = serde_json::Map<String, serde_json::Value>;

/// Shared application state
#[derive(Clone)]
struct AppState {
    warehouse: Arc<Mutex<Warehouse>>,
    gold_dataset: String,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ReportInfo {
    name: &'static str,
    description: &'static str,
}

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

fn fail<T>(status: StatusCode, message: impl Into<String>) -> ApiResult<T> {
    (status, Json(ApiResponse::err(message)))
}

/// Rows of dataset.table, with 404 for anything not published
fn load_rows(state: &AppState, dataset: &str, table: &str) -> ApiResult<Vec<Row>> {
    if !is_identifier(dataset) || !is_identifier(table) {
        return fail(StatusCode::BAD_REQUEST, "dataset and table must be identifiers");
    }

    let Ok(mut warehouse) = state.warehouse.lock() else {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "warehouse lock poisoned");
    };

    let found = match warehouse.open_dataset(dataset) {
        Ok(true) => warehouse.table_exists(dataset, table),
        other => other,
    };
    match found {
        Ok(true) => {}
        Ok(false) => {
            return fail(
                StatusCode::NOT_FOUND,
                format!("{}.{} is not published", dataset, table),
            )
        }
        Err(e) => {
            error!(dataset, table, error = %e, "lookup failed");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    }

    match warehouse.read_rows(dataset, table) {
        Ok(rows) => (StatusCode::OK, Json(ApiResponse::ok(rows))),
        Err(e) => {
            error!(dataset, table, error = %e, "read failed");
            fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "OK",
        version: VERSION,
    }))
}

/// GET /api/tables/:dataset/:table - All rows of a published table
async fn get_table(
    State(state): State<AppState>,
    Path((dataset, table)): Path<(String, String)>,
) -> impl IntoResponse {
    load_rows(&state, &dataset, &table)
}

/// GET /api/reports - Gold report catalog
async fn list_reports() -> impl IntoResponse {
    let reports: Vec<ReportInfo> = GOLD_REPORTS
        .iter()
        .map(|r| ReportInfo {
            name: r.name,
            description: r.description,
        })
        .collect();
    Json(ApiResponse::ok(reports))
}

/// GET /api/reports/:name - Rows of one gold report
async fn get_report(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match find_report(&name) {
        Some(report) => load_rows(&state, &state.gold_dataset, report.name),
        None => fail(StatusCode::NOT_FOUND, format!("unknown report '{}'", name)),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(DEFAULT_FILTER)?;
    println!("🌐 Medallion ETL - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_file = std::env::var_os("MEDALLION_CONFIG").map(PathBuf::from);
    let config =
        load_config(config_file.as_deref(), None).context("Failed to load configuration")?;

    let warehouse = Warehouse::for_config(&config).context("Failed to open warehouse")?;
    println!("✓ Warehouse opened: {}", config.warehouse_dir.display());

    // Create shared state
    let state = AppState {
        warehouse: Arc::new(Mutex::new(warehouse)),
        gold_dataset: config.gold_dataset.clone(),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/tables/:dataset/:table", get(get_table))
        .route("/reports", get(list_reports))
        .route("/reports/:name", get(get_report))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = std::env::var("MEDALLION_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, "server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/reports", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
