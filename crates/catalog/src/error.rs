//! Catalog store error types.

use common::{ComponentId, ProductId};
use thiserror::Error;

/// Errors returned by a [`CatalogStore`](crate::CatalogStore).
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No product with the given id.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// No component edge with the given id.
    #[error("Component not found: {0}")]
    ComponentNotFound(ComponentId),

    /// Another product already uses the barcode.
    #[error("Barcode already in use: {0}")]
    DuplicateBarcode(String),

    /// Another product already uses the SKU.
    #[error("SKU already in use: {0}")]
    DuplicateSku(String),

    /// A bundle edge violates the one-level bundle shape.
    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    /// Stock counters never go below zero.
    #[error("Negative stock {quantity} for product {product_id}")]
    NegativeStock { product_id: ProductId, quantity: i64 },

    /// The store could not be reached or refused the request.
    #[error("Catalog store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl CatalogError {
    /// Returns true if the error describes a missing record rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::ProductNotFound(_) | CatalogError::ComponentNotFound(_)
        )
    }

    /// Returns true if the error is an operational fault against the backing store.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CatalogError::Unavailable(_) | CatalogError::Database(_) | CatalogError::Migration(_)
        )
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
