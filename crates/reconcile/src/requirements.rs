//! Requirement aggregation: scan lists folded into per-product quantities.

use std::collections::{BTreeMap, HashMap, HashSet};

use catalog::{CatalogStore, Product, ProductComponent, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scan::{ProductRef, ScanEvent, ScanItem};

/// Aggregated quantity of each base product needed by one batch.
///
/// Adding is commutative and associative: repeated scans accumulate and
/// scan order never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockRequirement(BTreeMap<ProductId, u32>);

impl StockRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` units of a base product.
    ///
    /// A zero quantity never creates an entry, so it can never become a
    /// stock write.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            return;
        }
        let total = self.0.entry(product_id).or_insert(0);
        *total = total.saturating_add(quantity);
    }

    /// Adds what one session scan consumes.
    pub fn add_event(&mut self, event: &ScanEvent) {
        for (product, quantity) in event.resolved.expand() {
            self.add(product.id, quantity);
        }
    }

    /// Folds session scans into a requirement.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ScanEvent>) -> Self {
        let mut requirement = Self::new();
        for event in events {
            requirement.add_event(event);
        }
        requirement
    }

    /// Required quantity for a product; zero if untouched.
    pub fn get(&self, product_id: &ProductId) -> u32 {
        self.0.get(product_id).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.0.iter().map(|(id, qty)| (*id, *qty))
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.0.keys().copied().collect()
    }

    pub fn remove(&mut self, product_id: &ProductId) -> Option<u32> {
        self.0.remove(product_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ProductId, u32)> for StockRequirement {
    fn from_iter<I: IntoIterator<Item = (ProductId, u32)>>(iter: I) -> Self {
        let mut requirement = Self::new();
        for (product_id, quantity) in iter {
            requirement.add(product_id, quantity);
        }
        requirement
    }
}

/// Requirements of a scan list plus the items whose product could not be found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub quantities: StockRequirement,
    pub missing: Vec<ProductRef>,
}

/// Derives a [`StockRequirement`] from submitted scan items.
///
/// Items carrying a component snapshot are folded without any read.
/// Every other item is resolved with at most one batch read per identity
/// kind (ids, barcodes), plus one batch read for the components of
/// unsnapshotted bundles.
#[derive(Clone)]
pub struct RequirementCalculator<C> {
    store: C,
}

impl<C: CatalogStore> RequirementCalculator<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn calculate(&self, items: &[ScanItem]) -> Result<Requirements> {
        let mut ids = Vec::new();
        let mut barcodes = Vec::new();
        let mut seen = HashSet::new();
        for item in items.iter().filter(|item| item.components.is_none()) {
            if !seen.insert(&item.product) {
                continue;
            }
            match &item.product {
                ProductRef::Id(id) => ids.push(*id),
                ProductRef::Barcode(code) => barcodes.push(code.clone()),
            }
        }

        let by_id: HashMap<ProductId, Product> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .get_products(&ids)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };
        let by_barcode: HashMap<String, Product> = if barcodes.is_empty() {
            HashMap::new()
        } else {
            self.store
                .get_products_by_barcodes(&barcodes)
                .await?
                .into_iter()
                .map(|p| (p.barcode.clone(), p))
                .collect()
        };

        let bundle_ids: Vec<ProductId> = by_id
            .values()
            .chain(by_barcode.values())
            .filter(|p| p.is_bundle())
            .map(|p| p.id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let mut components: HashMap<ProductId, Vec<ProductComponent>> = HashMap::new();
        if !bundle_ids.is_empty() {
            for component in self.store.list_components_for(&bundle_ids).await? {
                components
                    .entry(component.parent_product_id)
                    .or_default()
                    .push(component);
            }
        }

        let mut requirements = Requirements::default();
        for item in items {
            if let Some(snapshot) = &item.components {
                for line in snapshot {
                    requirements.quantities.add(line.product_id, line.quantity);
                }
                continue;
            }

            let product = match &item.product {
                ProductRef::Id(id) => by_id.get(id),
                ProductRef::Barcode(code) => by_barcode.get(code),
            };
            match product {
                Some(product) if product.is_bundle() => {
                    for component in components.get(&product.id).into_iter().flatten() {
                        requirements
                            .quantities
                            .add(component.child_product_id, component.quantity);
                    }
                }
                Some(product) => requirements.quantities.add(product.id, 1),
                None => {
                    tracing::warn!(product = %item.product, "scanned product not found");
                    requirements.missing.push(item.product.clone());
                }
            }
        }

        Ok(requirements)
    }
}
