//! Liveness HTTP server.
//!
//! A minimal JSON API for supervisors and dashboards:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check (returns version) |
//! | `GET`  | `/status` | Latest known rank per (phrase, SKU) |
//!
//! The server only ever reads fully persisted log snapshots, so it needs
//! no coordination with the tracking pipeline.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::history;
use crate::models::format_minute;
use crate::report::build_status_snapshot;

#[derive(Clone)]
struct AppState {
    pool: sqlx::SqlitePool,
}

/// Start the liveness server on `bind`. Runs until the process exits.
pub async fn serve(bind: &str, pool: sqlx::SqlitePool) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .layer(cors)
        .with_state(AppState { pool });

    tracing::info!(bind, "liveness server listening");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "internal".to_string(),
                message: self.0.to_string(),
            },
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /status ============

#[derive(Serialize)]
struct StatusEntry {
    phrase: String,
    sku: String,
    position: i64,
    promo_position: Option<i64>,
    seen: String,
}

#[derive(Serialize)]
struct StatusResponse {
    entries: Vec<StatusEntry>,
}

async fn handle_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let log = history::load_all(&state.pool).await?;
    let snapshot = build_status_snapshot(&log);

    let entries = snapshot
        .into_iter()
        .map(|((phrase, sku), obs)| StatusEntry {
            phrase,
            sku,
            position: obs.position,
            promo_position: obs.promo_position,
            seen: format_minute(&obs.timestamp),
        })
        .collect();

    Ok(Json(StatusResponse { entries }))
}
