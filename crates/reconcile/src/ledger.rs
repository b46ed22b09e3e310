//! Session-local speculative stock tracking.

use std::collections::HashMap;

use catalog::{Product, ProductId};

use crate::error::{ReconcileError, Result, Shortfall};
use crate::requirements::StockRequirement;

/// Tentative available stock for the base products touched by one session.
///
/// Untouched products fall back to the catalog stock the caller passes in.
/// The ledger only guards a session against over-committing itself; other
/// sessions writing the same counters are invisible to it.
#[derive(Debug, Clone, Default)]
pub struct ReservationLedger {
    entries: HashMap<ProductId, i64>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger value if touched this session, else `catalog_stock`.
    pub fn available(&self, product_id: ProductId, catalog_stock: i64) -> i64 {
        self.entries
            .get(&product_id)
            .copied()
            .unwrap_or(catalog_stock)
    }

    /// Subtracts `delta`, materializing the entry from `catalog_stock` first.
    ///
    /// Unchecked; callers go through [`ReservationLedger::try_reserve`] or
    /// [`ReservationLedger::hold`].
    fn reserve(&mut self, product_id: ProductId, catalog_stock: i64, delta: u32) {
        let entry = self.entries.entry(product_id).or_insert(catalog_stock);
        *entry -= i64::from(delta);
    }

    /// Adds `delta` back to a touched product.
    ///
    /// Releasing an untouched product is a no-op: nothing was reserved
    /// against it since the ledger was last reset.
    pub fn release(&mut self, product_id: ProductId, delta: u32) {
        if let Some(entry) = self.entries.get_mut(&product_id) {
            *entry += i64::from(delta);
        }
    }

    /// Reports every product whose ledger availability is below its demand.
    pub fn check(&self, demand: &StockRequirement, products: &[&Product]) -> Vec<Shortfall> {
        demand
            .iter()
            .filter_map(|(product_id, required)| {
                let product = products.iter().find(|p| p.id == product_id)?;
                let available = self.available(product_id, product.stock_quantity);
                (available < i64::from(required)).then(|| Shortfall {
                    product_id,
                    name: product.name.clone(),
                    barcode: product.barcode.clone(),
                    required,
                    available,
                })
            })
            .collect()
    }

    /// Reserves the whole demand or nothing.
    ///
    /// `products` supplies the catalog stock of each demanded product.
    pub fn try_reserve(&mut self, demand: &StockRequirement, products: &[&Product]) -> Result<()> {
        let shortfalls = self.check(demand, products);
        if !shortfalls.is_empty() {
            return Err(ReconcileError::InsufficientStock { shortfalls });
        }

        for (product_id, quantity) in demand.iter() {
            if let Some(product) = products.iter().find(|p| p.id == product_id) {
                self.reserve(product_id, product.stock_quantity, quantity);
            }
        }
        Ok(())
    }

    /// Reserves the whole demand even where it exceeds availability.
    ///
    /// Carries already accepted scans over a catalog re-read. A product
    /// left below zero blocks every further scan that consumes it.
    pub fn hold(&mut self, demand: &StockRequirement, products: &[&Product]) {
        for (product_id, quantity) in demand.iter() {
            if let Some(product) = products.iter().find(|p| p.id == product_id) {
                self.reserve(product_id, product.stock_quantity, quantity);
            }
        }
    }

    /// Returns a previously reserved demand.
    pub fn release_all(&mut self, demand: &StockRequirement) {
        for (product_id, quantity) in demand.iter() {
            self.release(product_id, quantity);
        }
    }

    /// Forgets every tentative value.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Touched products and their tentative availability.
    pub fn entries(&self) -> impl Iterator<Item = (ProductId, i64)> + '_ {
        self.entries.iter().map(|(id, qty)| (*id, *qty))
    }
}

#[cfg(test)]
mod tests {
    use catalog::ProductKind;
    use chrono::Utc;

    use super::*;

    fn product(name: &str, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            barcode: name.to_lowercase(),
            sku: None,
            name: name.to_string(),
            kind: ProductKind::Single,
            cost_cents: 0,
            stock_quantity: stock,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_untouched_falls_back_to_catalog() {
        let ledger = ReservationLedger::new();
        assert_eq!(ledger.available(ProductId::new(), 7), 7);
    }

    #[test]
    fn test_reserve_then_release() {
        let pen = product("Pen", 10);
        let mut ledger = ReservationLedger::new();
        let demand: StockRequirement = [(pen.id, 3)].into_iter().collect();

        ledger.try_reserve(&demand, &[&pen]).unwrap();
        assert_eq!(ledger.available(pen.id, pen.stock_quantity), 7);

        ledger.release_all(&demand);
        assert_eq!(ledger.available(pen.id, pen.stock_quantity), 10);
    }

    #[test]
    fn test_reservations_accumulate_across_scans() {
        let pen = product("Pen", 2);
        let mut ledger = ReservationLedger::new();
        let one: StockRequirement = [(pen.id, 1)].into_iter().collect();

        ledger.try_reserve(&one, &[&pen]).unwrap();
        ledger.try_reserve(&one, &[&pen]).unwrap();
        let third = ledger.try_reserve(&one, &[&pen]);

        assert!(matches!(third, Err(ReconcileError::InsufficientStock { .. })));
        assert_eq!(ledger.available(pen.id, pen.stock_quantity), 0);
    }

    #[test]
    fn test_rejection_is_all_or_nothing() {
        let widget = product("Widget", 5);
        let gadget = product("Gadget", 1);
        let mut ledger = ReservationLedger::new();
        let demand: StockRequirement = [(widget.id, 2), (gadget.id, 2)].into_iter().collect();

        let err = ledger.try_reserve(&demand, &[&widget, &gadget]).unwrap_err();

        assert_eq!(err.shortfalls().len(), 1);
        assert_eq!(err.shortfalls()[0].name, "Gadget");
        assert!(ledger.is_empty());
        assert_eq!(ledger.available(widget.id, 5), 5);
    }

    #[test]
    fn test_hold_can_overdraw() {
        let pen = product("Pen", 1);
        let mut ledger = ReservationLedger::new();
        let demand: StockRequirement = [(pen.id, 3)].into_iter().collect();

        ledger.hold(&demand, &[&pen]);

        assert_eq!(ledger.available(pen.id, pen.stock_quantity), -2);
        let one: StockRequirement = [(pen.id, 1)].into_iter().collect();
        assert!(ledger.try_reserve(&one, &[&pen]).is_err());
    }

    #[test]
    fn test_release_of_untouched_is_noop() {
        let mut ledger = ReservationLedger::new();
        let id = ProductId::new();
        ledger.release(id, 3);
        assert!(ledger.is_empty());
        assert_eq!(ledger.available(id, 4), 4);
    }

    #[test]
    fn test_reset_forgets_everything() {
        let pen = product("Pen", 10);
        let mut ledger = ReservationLedger::new();
        let demand: StockRequirement = [(pen.id, 4)].into_iter().collect();
        ledger.try_reserve(&demand, &[&pen]).unwrap();

        ledger.reset();
        assert!(ledger.is_empty());
        assert_eq!(ledger.available(pen.id, 10), 10);
    }
}
