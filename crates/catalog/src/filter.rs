use crate::product::{Product, ProductKind};

/// Builder for listing catalog products.
///
/// All criteria are optional and combine with AND. `search` matches
/// case-insensitively against name, barcode and SKU.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Filter by product kind.
    pub kind: Option<ProductKind>,

    /// Free-text search over name, barcode and SKU.
    pub search: Option<String>,

    /// Maximum number of products to return.
    pub limit: Option<usize>,

    /// Number of products to skip.
    pub offset: Option<usize>,
}

impl ProductFilter {
    /// Creates a filter matching every product.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter for one product kind.
    pub fn for_kind(kind: ProductKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// Filters by product kind.
    pub fn kind(mut self, kind: ProductKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filters by free-text search.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Limits the number of products returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many products before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the product satisfies the kind and search criteria.
    ///
    /// Paging is applied by the store, not here.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(kind) = self.kind
            && product.kind != kind
        {
            return false;
        }

        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                product.name.to_lowercase().contains(&term)
                    || product.barcode.to_lowercase().contains(&term)
                    || product
                        .sku
                        .as_deref()
                        .is_some_and(|sku| sku.to_lowercase().contains(&term))
            }
            None => true,
        }
    }

    /// SQL `LIKE` pattern for the search term.
    pub(crate) fn search_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|term| {
            let escaped = term
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::ProductId;

    use super::*;

    fn product(name: &str, barcode: &str, sku: Option<&str>, kind: ProductKind) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            barcode: barcode.to_string(),
            sku: sku.map(String::from),
            name: name.to_string(),
            kind,
            cost_cents: 0,
            stock_quantity: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = ProductFilter::new();
        assert!(filter.matches(&product("Pen", "1", None, ProductKind::Single)));
        assert!(filter.matches(&product("Kit", "2", None, ProductKind::Bundle)));
    }

    #[test]
    fn kind_filter() {
        let filter = ProductFilter::for_kind(ProductKind::Bundle);
        assert!(!filter.matches(&product("Pen", "1", None, ProductKind::Single)));
        assert!(filter.matches(&product("Kit", "2", None, ProductKind::Bundle)));
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let pen = product("Blue Pen", "4711", Some("PEN-BLU"), ProductKind::Single);
        assert!(ProductFilter::new().search("blue").matches(&pen));
        assert!(ProductFilter::new().search("471").matches(&pen));
        assert!(ProductFilter::new().search("pen-b").matches(&pen));
        assert!(!ProductFilter::new().search("red").matches(&pen));
    }

    #[test]
    fn search_pattern_escapes_wildcards() {
        let filter = ProductFilter::new().search("50%_off");
        assert_eq!(filter.search_pattern().unwrap(), "%50\\%\\_off%");
    }
}
