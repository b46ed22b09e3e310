use async_trait::async_trait;
use common::{ComponentId, ProductId};

use crate::{
    CatalogError, NewComponent, NewProduct, Product, ProductComponent, ProductFilter,
    ProductPatch, Result,
};

/// Authoritative store for products, bundle edges and stock counters.
///
/// The store offers single-record writes only. There is no multi-record
/// transaction primitive, so callers coordinating several stock writes must
/// compensate on their own. All implementations must be thread-safe.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Loads a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Loads a product by barcode.
    async fn get_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>>;

    /// Loads every listed product in one round trip.
    ///
    /// Unknown ids are omitted from the result; duplicates are returned once.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Loads every product matching one of the barcodes in one round trip.
    async fn get_products_by_barcodes(&self, barcodes: &[String]) -> Result<Vec<Product>>;

    /// Lists products matching a filter, ordered by name.
    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>>;

    /// Creates a product.
    async fn create_product(&self, new: NewProduct) -> Result<Product>;

    /// Applies a partial update and returns the updated product.
    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Product>;

    /// Deletes a product together with every bundle edge referencing it.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    /// Lists the bundle edges of one parent. Never served from a cache.
    async fn list_components(&self, parent_id: ProductId) -> Result<Vec<ProductComponent>>;

    /// Lists the bundle edges of several parents in one round trip.
    async fn list_components_for(&self, parent_ids: &[ProductId])
    -> Result<Vec<ProductComponent>>;

    /// Creates a bundle edge.
    ///
    /// Duplicate `(parent, child)` edges are accepted; readers sum them.
    async fn create_component(&self, new: NewComponent) -> Result<ProductComponent>;

    /// Deletes a bundle edge.
    async fn delete_component(&self, id: ComponentId) -> Result<()>;

    /// Overwrites a product's stock counter.
    ///
    /// This is a last-write-wins set, not a compare-and-swap: two writers
    /// racing on the same product can lose one update.
    async fn set_stock(&self, id: ProductId, quantity: i64) -> Result<Product>;
}

/// Checks that an edge links a bundle to a base product with a positive quantity.
pub fn validate_component(
    new: &NewComponent,
    parent: &Product,
    child: &Product,
) -> std::result::Result<(), CatalogError> {
    if new.quantity == 0 {
        return Err(CatalogError::InvalidComponent(
            "quantity must be at least 1".to_string(),
        ));
    }
    if !parent.is_bundle() {
        return Err(CatalogError::InvalidComponent(format!(
            "parent '{}' is not a bundle",
            parent.name
        )));
    }
    if !child.is_single() {
        return Err(CatalogError::InvalidComponent(format!(
            "child '{}' is not a base product",
            child.name
        )));
    }
    Ok(())
}

/// Rejects negative stock values before they reach a store.
pub fn validate_stock(id: ProductId, quantity: i64) -> std::result::Result<(), CatalogError> {
    if quantity < 0 {
        return Err(CatalogError::NegativeStock {
            product_id: id,
            quantity,
        });
    }
    Ok(())
}
