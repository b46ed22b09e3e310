//! Catalog entities: products and bundle edges.

use chrono::{DateTime, Utc};
use common::{ComponentId, ProductId};
use serde::{Deserialize, Serialize};

/// Whether a product carries its own stock or is composed of other products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// A base product with an independent stock count.
    #[default]
    Single,

    /// A product composed of base products; carries no stock of its own.
    Bundle,
}

impl ProductKind {
    /// Returns the storage name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Single => "single",
            ProductKind::Bundle => "bundle",
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProductKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(ProductKind::Single),
            "bundle" => Ok(ProductKind::Bundle),
            other => Err(format!("unknown product kind '{other}'")),
        }
    }
}

/// A sellable catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Unique scan code.
    pub barcode: String,
    /// Optional unique stock-keeping code.
    pub sku: Option<String>,
    pub name: String,
    pub kind: ProductKind,
    /// Unit cost in cents.
    pub cost_cents: i64,
    /// On-hand units. Only meaningful for [`ProductKind::Single`].
    pub stock_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns true if this product is a base product.
    pub fn is_single(&self) -> bool {
        self.kind == ProductKind::Single
    }

    /// Returns true if this product is a bundle.
    pub fn is_bundle(&self) -> bool {
        self.kind == ProductKind::Bundle
    }
}

/// A bundle edge: `quantity` units of `child_product_id` per unit of `parent_product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductComponent {
    pub id: ComponentId,
    pub parent_product_id: ProductId,
    pub child_product_id: ProductId,
    pub quantity: u32,
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub barcode: String,
    pub sku: Option<String>,
    pub name: String,
    pub kind: ProductKind,
    #[serde(default)]
    pub cost_cents: i64,
    #[serde(default)]
    pub stock_quantity: i64,
}

impl NewProduct {
    /// Creates input for a base product with the given stock.
    pub fn single(barcode: impl Into<String>, name: impl Into<String>, stock: i64) -> Self {
        Self {
            barcode: barcode.into(),
            sku: None,
            name: name.into(),
            kind: ProductKind::Single,
            cost_cents: 0,
            stock_quantity: stock,
        }
    }

    /// Creates input for a bundle. Bundles never carry stock.
    pub fn bundle(barcode: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            sku: None,
            name: name.into(),
            kind: ProductKind::Bundle,
            cost_cents: 0,
            stock_quantity: 0,
        }
    }

    /// Sets the SKU.
    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// Sets the unit cost in cents.
    pub fn with_cost_cents(mut self, cost_cents: i64) -> Self {
        self.cost_cents = cost_cents;
        self
    }
}

/// Partial update of a product. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub barcode: Option<String>,
    /// `Some(None)` clears the SKU.
    pub sku: Option<Option<String>>,
    pub name: Option<String>,
    pub cost_cents: Option<i64>,
    pub stock_quantity: Option<i64>,
}

impl ProductPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the product.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Changes the barcode.
    pub fn barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// Sets or clears the SKU.
    pub fn sku(mut self, sku: Option<String>) -> Self {
        self.sku = Some(sku);
        self
    }

    /// Changes the unit cost.
    pub fn cost_cents(mut self, cost_cents: i64) -> Self {
        self.cost_cents = Some(cost_cents);
        self
    }

    /// Overwrites the stock count.
    pub fn stock_quantity(mut self, stock_quantity: i64) -> Self {
        self.stock_quantity = Some(stock_quantity);
        self
    }

    /// Applies the patch to a product in place.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(barcode) = &self.barcode {
            product.barcode = barcode.clone();
        }
        if let Some(sku) = &self.sku {
            product.sku = sku.clone();
        }
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(cost) = self.cost_cents {
            product.cost_cents = cost;
        }
        if let Some(stock) = self.stock_quantity {
            product.stock_quantity = stock;
        }
    }
}

/// Input for creating a bundle edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComponent {
    pub parent_product_id: ProductId,
    pub child_product_id: ProductId,
    pub quantity: u32,
}

impl NewComponent {
    pub fn new(parent: ProductId, child: ProductId, quantity: u32) -> Self {
        Self {
            parent_product_id: parent,
            child_product_id: child,
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            barcode: "100".to_string(),
            sku: Some("W-1".to_string()),
            name: "Widget".to_string(),
            kind: ProductKind::Single,
            cost_cents: 250,
            stock_quantity: 5,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ProductKind::Bundle).unwrap(),
            "\"bundle\""
        );
        assert_eq!("single".parse::<ProductKind>(), Ok(ProductKind::Single));
        assert!("kit".parse::<ProductKind>().is_err());
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut product = widget();
        ProductPatch::new()
            .name("Blue Widget")
            .sku(None)
            .apply_to(&mut product);

        assert_eq!(product.name, "Blue Widget");
        assert_eq!(product.sku, None);
        assert_eq!(product.barcode, "100");
        assert_eq!(product.stock_quantity, 5);
    }

    #[test]
    fn bundle_input_has_no_stock() {
        let input = NewProduct::bundle("900", "Gift Set");
        assert_eq!(input.kind, ProductKind::Bundle);
        assert_eq!(input.stock_quantity, 0);
    }
}
