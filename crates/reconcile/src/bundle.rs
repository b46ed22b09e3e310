//! Bundle graph resolution: one product to its base products.

use catalog::{CatalogStore, Product, ProductId};

use crate::error::{ReconcileError, Result};
use crate::scan::{ComponentLine, ProductRef, ResolvedProduct};

/// Expands products into base-product/quantity pairs.
///
/// Components are always read fresh from the store, so composition edits
/// apply to every scan made after them. Children are assumed to be base
/// products; nested bundles are not expanded further.
#[derive(Clone)]
pub struct BundleResolver<C> {
    store: C,
}

impl<C: CatalogStore> BundleResolver<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    /// Resolves a product id to the base products one unit consumes.
    ///
    /// A base product yields `[(product, 1)]`. A bundle yields one pair per
    /// recorded edge; an empty bundle yields nothing.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, product_id: ProductId) -> Result<Vec<(Product, u32)>> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(ReconcileError::NotFound(ProductRef::Id(product_id)))?;

        let resolved = self.resolve_product(product).await?;
        Ok(resolved
            .expand()
            .into_iter()
            .map(|(product, quantity)| (product.clone(), quantity))
            .collect())
    }

    /// Joins a loaded product with its current components.
    pub async fn resolve_product(&self, product: Product) -> Result<ResolvedProduct> {
        if product.is_single() {
            return Ok(ResolvedProduct::Single(product));
        }

        let components = self.store.list_components(product.id).await?;
        if components.is_empty() {
            tracing::debug!(bundle = %product.id, "bundle has no components");
            return Ok(ResolvedProduct::Bundle(product, Vec::new()));
        }

        let child_ids: Vec<ProductId> = components.iter().map(|c| c.child_product_id).collect();
        let children = self.store.get_products(&child_ids).await?;

        let lines = components
            .into_iter()
            .map(|component| {
                let child = children
                    .iter()
                    .find(|p| p.id == component.child_product_id)
                    .cloned()
                    .ok_or(ReconcileError::NotFound(ProductRef::Id(
                        component.child_product_id,
                    )))?;
                Ok(ComponentLine {
                    component_id: component.id,
                    product: child,
                    quantity: component.quantity,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedProduct::Bundle(product, lines))
    }
}

#[cfg(test)]
mod tests {
    use catalog::{InMemoryCatalogStore, NewComponent, NewProduct};

    use super::*;

    #[tokio::test]
    async fn test_single_resolves_to_itself() {
        let store = InMemoryCatalogStore::new();
        let pen = store
            .create_product(NewProduct::single("1", "Pen", 10))
            .await
            .unwrap();

        let resolver = BundleResolver::new(store);
        let lines = resolver.resolve(pen.id).await.unwrap();
        assert_eq!(lines, vec![(pen, 1)]);
    }

    #[tokio::test]
    async fn test_bundle_resolves_to_components() {
        let store = InMemoryCatalogStore::new();
        let kit = store
            .create_product(NewProduct::bundle("9", "Gift Set"))
            .await
            .unwrap();
        let widget = store
            .create_product(NewProduct::single("1", "Widget", 5))
            .await
            .unwrap();
        let gadget = store
            .create_product(NewProduct::single("2", "Gadget", 1))
            .await
            .unwrap();
        store
            .create_component(NewComponent::new(kit.id, widget.id, 2))
            .await
            .unwrap();
        store
            .create_component(NewComponent::new(kit.id, gadget.id, 1))
            .await
            .unwrap();

        let resolver = BundleResolver::new(store);
        let lines = resolver.resolve(kit.id).await.unwrap();
        assert_eq!(lines, vec![(widget, 2), (gadget, 1)]);
    }

    #[tokio::test]
    async fn test_empty_bundle_is_inert() {
        let store = InMemoryCatalogStore::new();
        let kit = store
            .create_product(NewProduct::bundle("9", "Empty Kit"))
            .await
            .unwrap();

        let resolver = BundleResolver::new(store);
        assert!(resolver.resolve(kit.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_composition_edits_are_seen_immediately() {
        let store = InMemoryCatalogStore::new();
        let kit = store
            .create_product(NewProduct::bundle("9", "Kit"))
            .await
            .unwrap();
        let widget = store
            .create_product(NewProduct::single("1", "Widget", 5))
            .await
            .unwrap();
        let edge = store
            .create_component(NewComponent::new(kit.id, widget.id, 2))
            .await
            .unwrap();

        let resolver = BundleResolver::new(store.clone());
        assert_eq!(resolver.resolve(kit.id).await.unwrap().len(), 1);

        store.delete_component(edge.id).await.unwrap();
        assert!(resolver.resolve(kit.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let resolver = BundleResolver::new(InMemoryCatalogStore::new());
        let result = resolver.resolve(ProductId::new()).await;
        assert!(matches!(result, Err(ReconcileError::NotFound(_))));
    }
}
