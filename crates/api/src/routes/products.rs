//! Catalog read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use catalog::{CatalogStore, Product, ProductFilter, ProductId, ProductKind};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub kind: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ProductQuery {
    fn into_filter(self) -> Result<ProductFilter, ApiError> {
        let mut filter = ProductFilter::new();
        if let Some(kind) = self.kind {
            let kind: ProductKind = kind.parse().map_err(ApiError::BadRequest)?;
            filter = filter.kind(kind);
        }
        if let Some(search) = self.search.filter(|s| !s.trim().is_empty()) {
            filter = filter.search(search);
        }
        if let Some(limit) = self.limit {
            filter = filter.limit(limit);
        }
        if let Some(offset) = self.offset {
            filter = filter.offset(offset);
        }
        Ok(filter)
    }
}

#[derive(Serialize)]
pub struct ResolvedLine {
    pub product: Product,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub product_id: ProductId,
    pub components: Vec<ResolvedLine>,
}

/// GET /products: list products matching the query filters.
#[tracing::instrument(skip(state))]
pub async fn list<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let filter = query.into_filter()?;
    Ok(Json(state.store().list_products(filter).await?))
}

/// GET /products/{id}: load one product.
#[tracing::instrument(skip(state))]
pub async fn get<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    state
        .store()
        .get_product(product_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))
}

/// GET /products/barcode/{barcode}: look a product up by barcode.
#[tracing::instrument(skip(state))]
pub async fn by_barcode<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(barcode): Path<String>,
) -> Result<Json<Product>, ApiError> {
    state
        .store()
        .get_product_by_barcode(&barcode)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No product with barcode {barcode}")))
}

/// GET /products/{id}/resolve: base products consumed by one unit.
#[tracing::instrument(skip(state))]
pub async fn resolve<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let components = state
        .engine
        .resolve_bundle(product_id)
        .await?
        .into_iter()
        .map(|(product, quantity)| ResolvedLine { product, quantity })
        .collect();

    Ok(Json(ResolveResponse {
        product_id,
        components,
    }))
}
