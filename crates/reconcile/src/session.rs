//! Packaging sessions: scan-time reservations ahead of one batch commit.

use catalog::{CatalogStore, Product};
use chrono::{DateTime, Utc};
use common::SessionId;

use crate::audit::AuditSink;
use crate::engine::StockEngine;
use crate::error::{ReconcileError, Result};
use crate::ledger::ReservationLedger;
use crate::outcome::CommitOutcome;
use crate::requirements::StockRequirement;
use crate::scan::{ProductRef, ScanEvent, ScanItem};
use crate::stock::{BatchStockReader, StockSnapshot};

/// One operator's scanning session.
///
/// Each scan is checked against the session's [`ReservationLedger`], so a
/// session can never reserve more than the catalog held when each product
/// was first touched, or last re-read after a failed commit. The
/// authoritative check happens again at commit.
pub struct PackagingSession<C, A> {
    id: SessionId,
    engine: StockEngine<C, A>,
    ledger: ReservationLedger,
    scans: Vec<ScanEvent>,
    opened_at: DateTime<Utc>,
}

impl<C, A> PackagingSession<C, A>
where
    C: CatalogStore + Clone + 'static,
    A: AuditSink + Clone + 'static,
{
    /// Opens an empty session.
    pub fn open(engine: StockEngine<C, A>) -> Self {
        Self {
            id: SessionId::new(),
            engine,
            ledger: ReservationLedger::new(),
            scans: Vec::new(),
            opened_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Accepted scans, in scan order.
    pub fn scans(&self) -> &[ScanEvent] {
        &self.scans
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    /// Tentative availability of a product within this session.
    pub fn available(&self, product: &Product) -> i64 {
        self.ledger.available(product.id, product.stock_quantity)
    }

    /// Total base-product demand of the accepted scans.
    pub fn requirements(&self) -> StockRequirement {
        StockRequirement::from_events(&self.scans)
    }

    /// Scan list as commit input, with bundle snapshots attached.
    pub fn items(&self) -> Vec<ScanItem> {
        self.scans.iter().map(ScanEvent::to_item).collect()
    }

    /// Looks up a barcode, expands it and reserves what it consumes.
    ///
    /// Rejected scans leave the ledger and scan list untouched.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn scan(&mut self, barcode: &str) -> Result<ScanEvent> {
        let product = self
            .engine
            .store()
            .get_product_by_barcode(barcode)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(ProductRef::Barcode(barcode.to_string())))?;

        let resolved = self.engine.resolver().resolve_product(product).await?;
        let event = ScanEvent::new(resolved);
        let demand = StockRequirement::from_events([&event]);
        let products: Vec<&Product> = event
            .resolved
            .expand()
            .into_iter()
            .map(|(product, _)| product)
            .collect();

        self.ledger.try_reserve(&demand, &products)?;

        tracing::debug!(product = %event.resolved.product().id, "scan accepted");
        self.scans.push(event.clone());
        Ok(event)
    }

    /// Removes the scan at `index` and releases its reservation.
    pub fn remove(&mut self, index: usize) -> Result<ScanEvent> {
        if index >= self.scans.len() {
            return Err(ReconcileError::InvalidScanIndex {
                index,
                len: self.scans.len(),
            });
        }

        let event = self.scans.remove(index);
        self.ledger
            .release_all(&StockRequirement::from_events([&event]));
        Ok(event)
    }

    /// Drops every scan and reservation without touching the catalog.
    pub fn abandon(&mut self) {
        tracing::info!(session = %self.id, scans = self.scans.len(), "session abandoned");
        self.scans.clear();
        self.ledger.reset();
    }

    /// Commits the accepted scans as one deduction batch.
    ///
    /// The scans leave the session before the batch is submitted, so a
    /// caller that stops waiting cannot submit them twice; the detached
    /// attempt still writes its own audit entry. When the batch does not
    /// commit, the scans come back and are reserved again against freshly
    /// read stock.
    pub async fn commit(&mut self, actor: &str) -> CommitOutcome {
        let scans = std::mem::take(&mut self.scans);
        self.ledger.reset();

        let items: Vec<ScanItem> = scans.iter().map(ScanEvent::to_item).collect();
        let outcome = self.engine.commit_deduction(&items, actor).await;

        if !outcome.success() {
            self.scans = scans;
            self.reserve_kept_scans().await;
        }
        outcome
    }

    /// Rebuilds the ledger from the kept scans after a failed commit.
    async fn reserve_kept_scans(&mut self) {
        let demand = self.requirements();
        let stock = match BatchStockReader::new(self.engine.store().clone())
            .read(&demand.product_ids())
            .await
        {
            Ok(stock) => stock,
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "stock re-read failed, using scan-time stock");
                self.scan_time_stock()
            }
        };

        let products: Vec<&Product> = stock.values().collect();
        self.ledger.hold(&demand, &products);
    }

    fn scan_time_stock(&self) -> StockSnapshot {
        self.scans
            .iter()
            .flat_map(|event| event.resolved.expand())
            .map(|(product, _)| (product.id, product.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use catalog::{InMemoryCatalogStore, NewComponent, NewProduct};

    use super::*;
    use crate::audit::InMemoryAuditSink;
    use crate::outcome::CommitStatus;

    fn session(
        store: &InMemoryCatalogStore,
    ) -> PackagingSession<InMemoryCatalogStore, InMemoryAuditSink> {
        PackagingSession::open(StockEngine::new(store.clone(), InMemoryAuditSink::new()))
    }

    #[tokio::test]
    async fn test_scan_reserves_stock() {
        let store = InMemoryCatalogStore::new();
        let pen = store
            .create_product(NewProduct::single("111", "Pen", 2))
            .await
            .unwrap();
        let mut session = session(&store);

        session.scan("111").await.unwrap();
        assert_eq!(session.available(&pen), 1);
        session.scan("111").await.unwrap();
        assert_eq!(session.available(&pen), 0);

        let err = session.scan("111").await.unwrap_err();
        assert!(matches!(err, ReconcileError::InsufficientStock { .. }));
        assert_eq!(session.scans().len(), 2);
        // no write happened at scan time
        assert_eq!(store.stock_of(pen.id).await, Some(2));
    }

    #[tokio::test]
    async fn test_unknown_barcode() {
        let store = InMemoryCatalogStore::new();
        let mut session = session(&store);

        let err = session.scan("nope").await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::NotFound(ProductRef::Barcode(ref code)) if code == "nope"
        ));
        assert!(session.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_bundle_scan_reserves_components() {
        let store = InMemoryCatalogStore::new();
        let kit = store
            .create_product(NewProduct::bundle("900", "Kit"))
            .await
            .unwrap();
        let widget = store
            .create_product(NewProduct::single("1", "Widget", 5))
            .await
            .unwrap();
        store
            .create_component(NewComponent::new(kit.id, widget.id, 2))
            .await
            .unwrap();
        let mut session = session(&store);

        session.scan("900").await.unwrap();
        session.scan("900").await.unwrap();
        assert_eq!(session.available(&widget), 1);
        assert!(session.scan("900").await.is_err());
        assert_eq!(session.requirements().get(&widget.id), 4);
    }

    #[tokio::test]
    async fn test_remove_releases_reservation() {
        let store = InMemoryCatalogStore::new();
        let pen = store
            .create_product(NewProduct::single("111", "Pen", 1))
            .await
            .unwrap();
        let mut session = session(&store);

        session.scan("111").await.unwrap();
        assert!(session.scan("111").await.is_err());
        session.remove(0).unwrap();
        assert_eq!(session.available(&pen), 1);
        session.scan("111").await.unwrap();

        let err = session.remove(5).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::InvalidScanIndex { index: 5, len: 1 }
        ));
    }

    #[tokio::test]
    async fn test_commit_clears_session() {
        let store = InMemoryCatalogStore::new();
        let pen = store
            .create_product(NewProduct::single("111", "Pen", 3))
            .await
            .unwrap();
        let mut session = session(&store);
        session.scan("111").await.unwrap();

        let outcome = session.commit("packer").await;

        assert!(outcome.success());
        assert!(session.scans().is_empty());
        assert!(session.ledger().is_empty());
        assert_eq!(store.stock_of(pen.id).await, Some(2));
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_scans() {
        let store = InMemoryCatalogStore::new();
        let pen = store
            .create_product(NewProduct::single("111", "Pen", 3))
            .await
            .unwrap();
        let mut session = session(&store);
        session.scan("111").await.unwrap();
        store.fail_stock_updates(pen.id).await;

        let outcome = session.commit("packer").await;

        assert_eq!(outcome.status, CommitStatus::Compensated);
        assert_eq!(session.scans().len(), 1);
        assert_eq!(session.available(&pen), 2);
        assert_eq!(store.stock_of(pen.id).await, Some(3));
    }

    #[tokio::test]
    async fn test_failed_commit_still_guards_scans() {
        let store = InMemoryCatalogStore::new();
        let pen = store
            .create_product(NewProduct::single("111", "Pen", 2))
            .await
            .unwrap();
        let mut session = session(&store);
        session.scan("111").await.unwrap();
        session.scan("111").await.unwrap();
        store.fail_stock_updates(pen.id).await;

        let outcome = session.commit("packer").await;
        store.clear_stock_faults().await;

        assert_eq!(outcome.status, CommitStatus::Compensated);
        let err = session.scan("111").await.unwrap_err();
        assert!(matches!(err, ReconcileError::InsufficientStock { .. }));
        assert_eq!(session.scans().len(), 2);
        assert_eq!(session.requirements().get(&pen.id), 2);
    }

    #[tokio::test]
    async fn test_rejected_commit_keeps_overdrawn_scans_blocked() {
        let store = InMemoryCatalogStore::new();
        let pen = store
            .create_product(NewProduct::single("111", "Pen", 2))
            .await
            .unwrap();
        let mut session = session(&store);
        session.scan("111").await.unwrap();
        session.scan("111").await.unwrap();
        // another workflow sells one in the meantime
        store.set_stock(pen.id, 1).await.unwrap();

        let outcome = session.commit("packer").await;

        assert_eq!(outcome.status, CommitStatus::Rejected);
        assert_eq!(session.scans().len(), 2);
        assert_eq!(session.ledger().available(pen.id, 1), -1);
        assert!(session.scan("111").await.is_err());
        session.remove(0).unwrap();
        assert_eq!(session.ledger().available(pen.id, 1), 0);
    }

    #[tokio::test]
    async fn test_dropped_commit_is_not_deducted_twice() {
        let store = InMemoryCatalogStore::new();
        let audit = InMemoryAuditSink::new();
        let pen = store
            .create_product(NewProduct::single("111", "Pen", 10))
            .await
            .unwrap();
        let mut session = PackagingSession::open(StockEngine::new(store.clone(), audit.clone()));
        session.scan("111").await.unwrap();
        store.delay_stock_updates(Duration::from_millis(100)).await;

        let waited = tokio::time::timeout(Duration::from_millis(20), session.commit("packer")).await;
        assert!(waited.is_err());
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(store.stock_of(pen.id).await, Some(9));
        assert_eq!(audit.entry_count().await, 1);
        assert!(session.scans().is_empty());
        assert!(session.ledger().is_empty());

        let retry = session.commit("packer").await;
        assert!(retry.success());
        assert!(retry.record.is_empty());
        assert_eq!(store.stock_of(pen.id).await, Some(9));
    }

    #[tokio::test]
    async fn test_abandon() {
        let store = InMemoryCatalogStore::new();
        store
            .create_product(NewProduct::single("111", "Pen", 3))
            .await
            .unwrap();
        let mut session = session(&store);
        session.scan("111").await.unwrap();

        session.abandon();

        assert!(session.scans().is_empty());
        assert!(session.ledger().is_empty());
        assert_eq!(store.stock_write_count().await, 0);
    }
}
