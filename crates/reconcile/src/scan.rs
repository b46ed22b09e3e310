//! Scan inputs: what the packaging and import workflows hand to the core.

use catalog::{ComponentId, Product, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a scanned product is identified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRef {
    Id(ProductId),
    Barcode(String),
}

impl std::fmt::Display for ProductRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductRef::Id(id) => write!(f, "id {id}"),
            ProductRef::Barcode(code) => write!(f, "barcode {code}"),
        }
    }
}

/// One base product of a bundle as it was composed at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A scanned item submitted for requirement calculation or commit.
///
/// When `components` is present it is used as-is, so catalog edits made
/// after the scan cannot change what the item consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanItem {
    pub product: ProductRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentSnapshot>>,
}

impl ScanItem {
    /// An item identified by product id, resolved at commit time.
    pub fn by_id(id: ProductId) -> Self {
        Self {
            product: ProductRef::Id(id),
            components: None,
        }
    }

    /// An item identified by barcode, resolved at commit time.
    pub fn by_barcode(barcode: impl Into<String>) -> Self {
        Self {
            product: ProductRef::Barcode(barcode.into()),
            components: None,
        }
    }

    /// Attaches a pre-resolved bundle breakdown.
    pub fn with_components(mut self, components: Vec<ComponentSnapshot>) -> Self {
        self.components = Some(components);
        self
    }
}

/// A bundle edge joined with its child product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLine {
    pub component_id: ComponentId,
    pub product: Product,
    pub quantity: u32,
}

/// A product expanded one level. Bundles never nest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ResolvedProduct {
    Single(Product),
    Bundle(Product, Vec<ComponentLine>),
}

impl ResolvedProduct {
    /// The scanned product itself.
    pub fn product(&self) -> &Product {
        match self {
            ResolvedProduct::Single(product) | ResolvedProduct::Bundle(product, _) => product,
        }
    }

    /// Base products and quantities consumed by one unit of this product.
    ///
    /// Duplicate bundle edges appear once per edge.
    pub fn expand(&self) -> Vec<(&Product, u32)> {
        match self {
            ResolvedProduct::Single(product) => vec![(product, 1)],
            ResolvedProduct::Bundle(_, lines) => {
                lines.iter().map(|line| (&line.product, line.quantity)).collect()
            }
        }
    }

    /// The frozen breakdown of a bundle; `None` for a base product.
    pub fn snapshot(&self) -> Option<Vec<ComponentSnapshot>> {
        match self {
            ResolvedProduct::Single(_) => None,
            ResolvedProduct::Bundle(_, lines) => Some(
                lines
                    .iter()
                    .map(|line| ComponentSnapshot {
                        product_id: line.product.id,
                        quantity: line.quantity,
                    })
                    .collect(),
            ),
        }
    }
}

/// A scan accepted into a packaging session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub resolved: ResolvedProduct,
    pub scanned_at: DateTime<Utc>,
}

impl ScanEvent {
    pub fn new(resolved: ResolvedProduct) -> Self {
        Self {
            resolved,
            scanned_at: Utc::now(),
        }
    }

    /// Converts the scan into a commit input, carrying the bundle snapshot.
    pub fn to_item(&self) -> ScanItem {
        ScanItem {
            product: ProductRef::Id(self.resolved.product().id),
            components: self.resolved.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use catalog::ProductKind;

    use super::*;

    fn product(name: &str, kind: ProductKind) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            barcode: name.to_lowercase(),
            sku: None,
            name: name.to_string(),
            kind,
            cost_cents: 0,
            stock_quantity: 5,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn single_expands_to_itself() {
        let pen = product("Pen", ProductKind::Single);
        let resolved = ResolvedProduct::Single(pen.clone());
        assert_eq!(resolved.expand(), vec![(&pen, 1)]);
        assert_eq!(resolved.snapshot(), None);
    }

    #[test]
    fn bundle_snapshot_keeps_every_edge() {
        let widget = product("Widget", ProductKind::Single);
        let kit = product("Kit", ProductKind::Bundle);
        let lines = vec![
            ComponentLine {
                component_id: ComponentId::new(),
                product: widget.clone(),
                quantity: 2,
            },
            ComponentLine {
                component_id: ComponentId::new(),
                product: widget.clone(),
                quantity: 1,
            },
        ];
        let event = ScanEvent::new(ResolvedProduct::Bundle(kit.clone(), lines));

        let item = event.to_item();
        assert_eq!(item.product, ProductRef::Id(kit.id));
        assert_eq!(item.components.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn scan_item_json_shape() {
        let item = ScanItem::by_barcode("4711");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, serde_json::json!({ "product": { "barcode": "4711" } }));
    }
}
