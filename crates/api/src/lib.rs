//! HTTP API server with observability for stock reconciliation.
//!
//! Exposes catalog reads, batch stock operations for bulk import and
//! interactive packaging sessions, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use catalog::CatalogStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CatalogStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/products", get(routes::products::list::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route(
            "/products/barcode/{barcode}",
            get(routes::products::by_barcode::<S>),
        )
        .route("/products/{id}/resolve", get(routes::products::resolve::<S>))
        .route(
            "/stock/requirements",
            post(routes::stock::requirements::<S>),
        )
        .route("/stock/validate", post(routes::stock::validate::<S>))
        .route("/stock/deduct", post(routes::stock::deduct::<S>))
        .route("/stock/restore", post(routes::stock::restore::<S>))
        .route("/batches/{id}", get(routes::batches::get::<S>))
        .route("/batches/{id}/void", post(routes::batches::void::<S>))
        .route("/sessions", post(routes::sessions::create::<S>))
        .route(
            "/sessions/{id}",
            get(routes::sessions::get::<S>).delete(routes::sessions::abandon::<S>),
        )
        .route("/sessions/{id}/scans", post(routes::sessions::scan::<S>))
        .route(
            "/sessions/{id}/scans/{index}",
            delete(routes::sessions::remove_scan::<S>),
        )
        .route("/sessions/{id}/commit", post(routes::sessions::commit::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a catalog store.
pub fn create_default_state<S: CatalogStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store))
}
