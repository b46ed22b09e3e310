//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use catalog::CatalogError;
use reconcile::{ReconcileError, Shortfall};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Catalog store error.
    Catalog(CatalogError),
    /// Reconciliation error.
    Reconcile(ReconcileError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, kind, shortfalls) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None, Vec::new()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None, Vec::new()),
            ApiError::Catalog(err) => {
                let (status, msg) = catalog_error_to_response(&err);
                (status, msg, None, Vec::new())
            }
            ApiError::Reconcile(err) => {
                let kind = err.kind();
                let (status, msg, shortfalls) = reconcile_error_to_response(err);
                (status, msg, Some(kind), shortfalls)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg, None, Vec::new())
            }
        };

        let mut body = serde_json::json!({ "error": message });
        if let Some(kind) = kind {
            body["kind"] = serde_json::json!(kind);
        }
        if !shortfalls.is_empty() {
            body["shortfalls"] = serde_json::json!(shortfalls);
        }
        (status, axum::Json(body)).into_response()
    }
}

fn catalog_error_to_response(err: &CatalogError) -> (StatusCode, String) {
    let status = match err {
        CatalogError::ProductNotFound(_) | CatalogError::ComponentNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        CatalogError::DuplicateBarcode(_) | CatalogError::DuplicateSku(_) => StatusCode::CONFLICT,
        CatalogError::InvalidComponent(_) | CatalogError::NegativeStock { .. } => {
            StatusCode::BAD_REQUEST
        }
        CatalogError::Unavailable(_) | CatalogError::Database(_) => {
            tracing::warn!(error = %err, "catalog store unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
        CatalogError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn reconcile_error_to_response(err: ReconcileError) -> (StatusCode, String, Vec<Shortfall>) {
    let message = err.to_string();
    match err {
        ReconcileError::InsufficientStock { shortfalls } => {
            (StatusCode::CONFLICT, message, shortfalls)
        }
        ReconcileError::NotFound(_) => (StatusCode::NOT_FOUND, message, Vec::new()),
        ReconcileError::Transport(inner) => {
            let (status, _) = catalog_error_to_response(&inner);
            (status, message, Vec::new())
        }
        ReconcileError::InvalidScanIndex { .. } => (StatusCode::BAD_REQUEST, message, Vec::new()),
        ReconcileError::NotVoidable(_) => (StatusCode::CONFLICT, message, Vec::new()),
        _ => {
            tracing::error!(error = %message, "reconciliation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, message, Vec::new())
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        ApiError::Reconcile(err)
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;

    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Reconcile(ReconcileError::InsufficientStock {
                    shortfalls: vec![Shortfall {
                        product_id: ProductId::new(),
                        name: "Gadget".to_string(),
                        barcode: "G".to_string(),
                        required: 2,
                        available: 1,
                    }],
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Reconcile(ReconcileError::Transport(CatalogError::Unavailable(
                    "down".to_string(),
                ))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Catalog(CatalogError::ProductNotFound(ProductId::new())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Reconcile(ReconcileError::InvalidScanIndex { index: 3, len: 1 }),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_reconcile_errors_carry_kind() {
        let response = ApiError::Reconcile(ReconcileError::Transport(CatalogError::Unavailable(
            "down".to_string(),
        )))
        .into_response();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "operational");

        let response = ApiError::NotFound("gone".to_string()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("kind").is_none());
    }
}
