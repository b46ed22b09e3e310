//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use catalog::{CatalogStore, ProductFilter};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub catalog: &'static str,
    pub open_sessions: usize,
}

/// GET /health: probes the catalog store with a one-row read.
pub async fn check<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let probe = state
        .store()
        .list_products(ProductFilter::new().limit(1))
        .await;
    let open_sessions = state.session_count().await;

    match probe {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                catalog: "up",
                open_sessions,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    catalog: "down",
                    open_sessions,
                }),
            )
        }
    }
}
