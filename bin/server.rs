// Contract Registry - Web Server
// Read-only JSON API with Axum. The acting organization comes from the
// X-Organization-Id header; contract routes are scoped to it.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use contract_registry::{
    get_all_organizations, get_contract, get_family_tree, get_organization, open_database,
    scoped_to_current_organization, validate_organization_access, Config, Contract, FamilyTree,
    Organization, Query, ValidationErrors,
};
use log::{error, info};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
    )
        .into_response()
}

fn internal_error(context: &str, e: anyhow::Error) -> Response {
    error!("{}: {:#}", context, e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, context)
}

/// Resolve the acting organization from the request headers
fn acting_organization(conn: &Connection, headers: &HeaderMap) -> Result<Organization, Response> {
    let raw = headers
        .get(ORGANIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "missing X-Organization-Id header"))?;

    let id: i64 = raw
        .trim()
        .parse()
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "X-Organization-Id must be an integer"))?;

    match get_organization(conn, id) {
        Ok(Some(org)) => Ok(org),
        Ok(None) => Err(api_error(StatusCode::UNAUTHORIZED, "unknown organization")),
        Err(e) => Err(internal_error("Error loading organization", e)),
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/organizations - Organizations are global
async fn list_organizations(State(state): State<AppState>) -> Response {
    let Ok(conn) = state.db.lock() else {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned");
    };

    match get_all_organizations(&conn) {
        Ok(orgs) => ApiResponse::ok(orgs),
        Err(e) => internal_error("Error getting organizations", e),
    }
}

/// GET /api/families - Contract family tree
async fn list_families(State(state): State<AppState>) -> Response {
    let Ok(conn) = state.db.lock() else {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned");
    };

    match get_family_tree(&conn) {
        Ok(tree) => ApiResponse::<FamilyTree>::ok(tree),
        Err(e) => internal_error("Error getting contract families", e),
    }
}

/// GET /api/contracts - Contracts owned by the acting organization
async fn list_contracts(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Ok(conn) = state.db.lock() else {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned");
    };

    let organization = match acting_organization(&conn, &headers) {
        Ok(org) => org,
        Err(response) => return response,
    };

    let query = scoped_to_current_organization(
        Query::<Contract>::all().order_by("reference"),
        Some(&organization),
    );

    match query.load(&conn) {
        Ok(contracts) => ApiResponse::ok(contracts),
        Err(e) => internal_error("Error getting contracts", e),
    }
}

/// GET /api/contracts/:id - One contract, 403 if owned by someone else
async fn show_contract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let Ok(conn) = state.db.lock() else {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned");
    };

    let organization = match acting_organization(&conn, &headers) {
        Ok(org) => org,
        Err(response) => return response,
    };

    let contract = match get_contract(&conn, id) {
        Ok(Some(contract)) => contract,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "contract not found"),
        Err(e) => return internal_error("Error getting contract", e),
    };

    let mut errors = ValidationErrors::new("Contract");
    validate_organization_access(&contract, Some(&organization), &mut errors);
    if !errors.is_empty() {
        return api_error(StatusCode::FORBIDDEN, errors.to_string());
    }

    ApiResponse::ok(contract)
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🌐 Contract Registry - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env()?;
    let conn = open_database(&config.database_path)?;
    info!("Database opened: {}", config.database_path.display());

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/organizations", get(list_organizations))
        .route("/families", get(list_families))
        .route("/contracts", get(list_contracts))
        .route("/contracts/:id", get(show_contract))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;

    println!("\n🚀 Server running on http://{}", config.server_addr);
    println!("   API: http://{}/api/contracts", config.server_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;

    Ok(())
}
