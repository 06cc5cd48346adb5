// 🌐 Query API - Axum routes over an immutable QueryCatalog

use crate::catalog::{PageMeta, QueryCatalog};
use crate::error::PipelineError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

const TOP_REGIONS: usize = 5;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<QueryCatalog>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<PageMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        let body = ApiResponse { success: true, data: Some(data), meta: None, error: None };
        (StatusCode::OK, Json(body)).into_response()
    }

    fn page(data: T, meta: PageMeta) -> Response {
        let body = ApiResponse { success: true, data: Some(data), meta: Some(meta), error: None };
        (StatusCode::OK, Json(body)).into_response()
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        meta: None,
        error: Some(message.to_string()),
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    page: Option<usize>,
    limit: Option<usize>,
    search: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/operators?page&limit&search
async fn list_operators(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);

    match state.catalog.list_operators(page, limit, params.search.as_deref()) {
        Ok(result) => ApiResponse::page(result.data, result.meta),
        Err(PipelineError::InvalidPage(msg)) => error_response(StatusCode::BAD_REQUEST, &msg),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /api/operators/:registration
async fn get_operator(State(state): State<AppState>, Path(registration): Path<String>) -> Response {
    match state.catalog.operator(&registration) {
        Some(op) => ApiResponse::ok(op.clone()),
        None => error_response(StatusCode::NOT_FOUND, "operator not found"),
    }
}

/// GET /api/operators/:registration/expenses
async fn get_operator_expenses(
    State(state): State<AppState>,
    Path(registration): Path<String>,
) -> Response {
    match state.catalog.expenses(&registration) {
        Some(points) => ApiResponse::ok(points),
        None => error_response(StatusCode::NOT_FOUND, "operator not found"),
    }
}

/// GET /api/statistics - top regions by total expense
async fn get_statistics(State(state): State<AppState>) -> Response {
    if !state.catalog.has_aggregates() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "aggregates not loaded");
    }
    ApiResponse::ok(state.catalog.top_regions(TOP_REGIONS))
}

pub fn router(catalog: Arc<QueryCatalog>) -> Router {
    let state = AppState { catalog };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/operators", get(list_operators))
        .route("/operators/:registration", get(get_operator))
        .route("/operators/:registration/expenses", get(get_operator_expenses))
        .route("/statistics", get(get_statistics))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
