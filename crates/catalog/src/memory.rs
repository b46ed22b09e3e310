use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{ComponentId, ProductId};
use tokio::sync::RwLock;

use crate::{
    CatalogError, NewComponent, NewProduct, Product, ProductComponent, ProductFilter,
    ProductPatch, Result,
    store::{CatalogStore, validate_component, validate_stock},
};

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<ProductId, Product>,
    /// Kept in insertion order so bundle expansion is deterministic.
    components: Vec<ProductComponent>,
    /// Remaining successful stock writes per product before injected failures start.
    stock_faults: HashMap<ProductId, usize>,
    fail_reads: bool,
    /// Latency added before every stock write.
    stock_write_delay: Option<Duration>,
    batch_reads: usize,
    stock_writes: usize,
}

impl MemoryState {
    fn check_reads(&self) -> Result<()> {
        if self.fail_reads {
            return Err(CatalogError::Unavailable(
                "injected read failure".to_string(),
            ));
        }
        Ok(())
    }

    fn check_unique(&self, id: Option<ProductId>, barcode: &str, sku: Option<&str>) -> Result<()> {
        for other in self.products.values() {
            if Some(other.id) == id {
                continue;
            }
            if other.barcode == barcode {
                return Err(CatalogError::DuplicateBarcode(barcode.to_string()));
            }
            if let Some(sku) = sku
                && other.sku.as_deref() == Some(sku)
            {
                return Err(CatalogError::DuplicateSku(sku.to_string()));
            }
        }
        Ok(())
    }
}

/// In-memory catalog store for tests and local runs.
///
/// Cloning shares the underlying state. Besides the [`CatalogStore`]
/// contract it counts round trips and can inject transport faults.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryCatalogStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every stock write for the product fail.
    pub async fn fail_stock_updates(&self, id: ProductId) {
        self.fail_stock_updates_after(id, 0).await;
    }

    /// Lets `successes` stock writes for the product through, then fails the rest.
    pub async fn fail_stock_updates_after(&self, id: ProductId, successes: usize) {
        self.state.write().await.stock_faults.insert(id, successes);
    }

    /// Removes all injected stock write failures.
    pub async fn clear_stock_faults(&self) {
        self.state.write().await.stock_faults.clear();
    }

    /// Holds every stock write for `delay` before it is applied.
    pub async fn delay_stock_updates(&self, delay: Duration) {
        self.state.write().await.stock_write_delay = Some(delay);
    }

    /// Makes every read fail while set.
    pub async fn fail_reads(&self, fail: bool) {
        self.state.write().await.fail_reads = fail;
    }

    /// Number of batch reads (`get_products*`, `list_components_for`) served.
    pub async fn batch_read_count(&self) -> usize {
        self.state.read().await.batch_reads
    }

    /// Number of stock writes attempted, including failed ones.
    pub async fn stock_write_count(&self) -> usize {
        self.state.read().await.stock_writes
    }

    /// Returns the current stock of a product, if it exists.
    pub async fn stock_of(&self, id: ProductId) -> Option<i64> {
        self.state
            .read()
            .await
            .products
            .get(&id)
            .map(|p| p.stock_quantity)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        state.check_reads()?;
        Ok(state.products.get(&id).cloned())
    }

    async fn get_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let state = self.state.read().await;
        state.check_reads()?;
        Ok(state
            .products
            .values()
            .find(|p| p.barcode == barcode)
            .cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut state = self.state.write().await;
        state.batch_reads += 1;
        state.check_reads()?;

        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn get_products_by_barcodes(&self, barcodes: &[String]) -> Result<Vec<Product>> {
        let mut state = self.state.write().await;
        state.batch_reads += 1;
        state.check_reads()?;

        let wanted: HashSet<&str> = barcodes.iter().map(String::as_str).collect();
        Ok(state
            .products
            .values()
            .filter(|p| wanted.contains(p.barcode.as_str()))
            .cloned()
            .collect())
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        state.check_reads()?;

        let mut products: Vec<_> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.barcode.cmp(&b.barcode)));

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(products.into_iter().skip(offset).take(limit).collect())
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;
        state.check_unique(None, &new.barcode, new.sku.as_deref())?;

        let id = ProductId::new();
        validate_stock(id, new.stock_quantity)?;

        let now = Utc::now();
        let product = Product {
            id,
            barcode: new.barcode,
            sku: new.sku,
            name: new.name,
            kind: new.kind,
            cost_cents: new.cost_cents,
            stock_quantity: new.stock_quantity,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Product> {
        let mut state = self.state.write().await;
        let mut product = state
            .products
            .get(&id)
            .cloned()
            .ok_or(CatalogError::ProductNotFound(id))?;

        patch.apply_to(&mut product);
        validate_stock(id, product.stock_quantity)?;
        state.check_unique(Some(id), &product.barcode, product.sku.as_deref())?;

        product.updated_at = Utc::now();
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .products
            .remove(&id)
            .ok_or(CatalogError::ProductNotFound(id))?;
        state
            .components
            .retain(|c| c.parent_product_id != id && c.child_product_id != id);
        Ok(())
    }

    async fn list_components(&self, parent_id: ProductId) -> Result<Vec<ProductComponent>> {
        let state = self.state.read().await;
        state.check_reads()?;
        Ok(state
            .components
            .iter()
            .filter(|c| c.parent_product_id == parent_id)
            .cloned()
            .collect())
    }

    async fn list_components_for(
        &self,
        parent_ids: &[ProductId],
    ) -> Result<Vec<ProductComponent>> {
        let mut state = self.state.write().await;
        state.batch_reads += 1;
        state.check_reads()?;

        let wanted: HashSet<&ProductId> = parent_ids.iter().collect();
        Ok(state
            .components
            .iter()
            .filter(|c| wanted.contains(&c.parent_product_id))
            .cloned()
            .collect())
    }

    async fn create_component(&self, new: NewComponent) -> Result<ProductComponent> {
        let mut state = self.state.write().await;
        let parent = state
            .products
            .get(&new.parent_product_id)
            .ok_or(CatalogError::ProductNotFound(new.parent_product_id))?;
        let child = state
            .products
            .get(&new.child_product_id)
            .ok_or(CatalogError::ProductNotFound(new.child_product_id))?;
        validate_component(&new, parent, child)?;

        let component = ProductComponent {
            id: ComponentId::new(),
            parent_product_id: new.parent_product_id,
            child_product_id: new.child_product_id,
            quantity: new.quantity,
        };
        state.components.push(component.clone());
        Ok(component)
    }

    async fn delete_component(&self, id: ComponentId) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.components.len();
        state.components.retain(|c| c.id != id);
        if state.components.len() == before {
            return Err(CatalogError::ComponentNotFound(id));
        }
        Ok(())
    }

    async fn set_stock(&self, id: ProductId, quantity: i64) -> Result<Product> {
        let delay = self.state.read().await.stock_write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        state.stock_writes += 1;

        if let Some(remaining) = state.stock_faults.get_mut(&id) {
            if *remaining == 0 {
                tracing::debug!(product = %id, "injected stock update failure");
                return Err(CatalogError::Unavailable(format!(
                    "injected stock update failure for {id}"
                )));
            }
            *remaining -= 1;
        }

        validate_stock(id, quantity)?;
        let product = state
            .products
            .get_mut(&id)
            .ok_or(CatalogError::ProductNotFound(id))?;
        product.stock_quantity = quantity;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }
}
