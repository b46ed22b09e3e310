//! Authoritative stock reads and shortfall detection.

use std::collections::HashMap;

use catalog::{CatalogStore, Product, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, Shortfall};
use crate::requirements::StockRequirement;
use crate::scan::ProductRef;

/// Current stock of a set of products, keyed by id.
pub type StockSnapshot = HashMap<ProductId, Product>;

/// Fetches authoritative stock for many base products in one round trip.
#[derive(Clone)]
pub struct BatchStockReader<C> {
    store: C,
}

impl<C: CatalogStore> BatchStockReader<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    /// Reads every listed product. Unknown ids are absent from the snapshot.
    #[tracing::instrument(skip(self, ids), fields(products = ids.len()))]
    pub async fn read(&self, ids: &[ProductId]) -> Result<StockSnapshot> {
        if ids.is_empty() {
            return Ok(StockSnapshot::new());
        }

        let products = self.store.get_products(ids).await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }
}

/// Compares a requirement against a snapshot.
///
/// Returns one entry per product whose stock is below its requirement.
/// Products absent from the snapshot are not reported here.
pub fn find_shortfalls(requirement: &StockRequirement, stock: &StockSnapshot) -> Vec<Shortfall> {
    requirement
        .iter()
        .filter_map(|(product_id, required)| {
            let product = stock.get(&product_id)?;
            (product.stock_quantity < i64::from(required)).then(|| Shortfall {
                product_id,
                name: product.name.clone(),
                barcode: product.barcode.clone(),
                required,
                available: product.stock_quantity,
            })
        })
        .collect()
}

/// Removes requirement entries whose product no longer exists.
pub fn drop_unknown(requirement: &mut StockRequirement, stock: &StockSnapshot) -> Vec<ProductRef> {
    let unknown: Vec<ProductId> = requirement
        .product_ids()
        .into_iter()
        .filter(|id| !stock.contains_key(id))
        .collect();

    for id in &unknown {
        requirement.remove(id);
        tracing::warn!(product = %id, "required product no longer exists");
    }
    unknown.into_iter().map(ProductRef::Id).collect()
}

/// Result of a pre-flight stock check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockValidation {
    pub valid: bool,
    pub shortfalls: Vec<Shortfall>,
    pub missing: Vec<ProductRef>,
}

#[cfg(test)]
mod tests {
    use catalog::{InMemoryCatalogStore, NewProduct};

    use super::*;

    #[tokio::test]
    async fn test_read_is_one_round_trip() {
        let store = InMemoryCatalogStore::new();
        let a = store
            .create_product(NewProduct::single("1", "A", 3))
            .await
            .unwrap();
        let b = store
            .create_product(NewProduct::single("2", "B", 4))
            .await
            .unwrap();

        let reader = BatchStockReader::new(store.clone());
        let snapshot = reader.read(&[a.id, b.id]).await.unwrap();

        assert_eq!(snapshot[&a.id].stock_quantity, 3);
        assert_eq!(snapshot[&b.id].stock_quantity, 4);
        assert_eq!(store.batch_read_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_read_skips_store() {
        let store = InMemoryCatalogStore::new();
        let reader = BatchStockReader::new(store.clone());
        assert!(reader.read(&[]).await.unwrap().is_empty());
        assert_eq!(store.batch_read_count().await, 0);
    }

    #[tokio::test]
    async fn test_shortfalls_and_unknown() {
        let store = InMemoryCatalogStore::new();
        let widget = store
            .create_product(NewProduct::single("1", "Widget", 5))
            .await
            .unwrap();
        let gadget = store
            .create_product(NewProduct::single("2", "Gadget", 1))
            .await
            .unwrap();
        let ghost = ProductId::new();

        let mut requirement: StockRequirement = [(widget.id, 4), (gadget.id, 2), (ghost, 1)]
            .into_iter()
            .collect();
        let snapshot = BatchStockReader::new(store)
            .read(&requirement.product_ids())
            .await
            .unwrap();

        assert_eq!(drop_unknown(&mut requirement, &snapshot), vec![ProductRef::Id(ghost)]);

        let shortfalls = find_shortfalls(&requirement, &snapshot);
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].name, "Gadget");
        assert_eq!(shortfalls[0].required, 2);
        assert_eq!(shortfalls[0].available, 1);
    }
}
