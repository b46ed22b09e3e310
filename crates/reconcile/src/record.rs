//! Per-batch record of applied stock changes.

use catalog::ProductId;
use chrono::{DateTime, Utc};
use common::BatchId;
use serde::{Deserialize, Serialize};

/// Direction of a committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitKind {
    /// Stock consumed by packaging.
    Deduction,
    /// Stock returned by voiding a batch.
    Restoration,
}

impl CommitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitKind::Deduction => "deduction",
            CommitKind::Restoration => "restoration",
        }
    }
}

/// One product's counter before and after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: ProductId,
    pub previous_stock: i64,
    pub new_stock: i64,
}

impl StockChange {
    /// Signed change applied to the counter.
    pub fn delta(&self) -> i64 {
        self.new_stock - self.previous_stock
    }
}

/// Exact deltas left applied by one batch.
///
/// Voiding replays these deltas in reverse, so later bundle composition
/// edits do not affect what gets restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub batch_id: BatchId,
    pub kind: CommitKind,
    pub changes: Vec<StockChange>,
    pub recorded_at: DateTime<Utc>,
}

impl CommitRecord {
    pub fn new(batch_id: BatchId, kind: CommitKind, changes: Vec<StockChange>) -> Self {
        Self {
            batch_id,
            kind,
            changes,
            recorded_at: Utc::now(),
        }
    }

    /// An empty record for a batch that changed nothing.
    pub fn empty(batch_id: BatchId, kind: CommitKind) -> Self {
        Self::new(batch_id, kind, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The change recorded for a product, if any.
    pub fn change_for(&self, product_id: ProductId) -> Option<&StockChange> {
        self.changes.iter().find(|c| c.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_sign() {
        let change = StockChange {
            product_id: ProductId::new(),
            previous_stock: 10,
            new_stock: 7,
        };
        assert_eq!(change.delta(), -3);
    }

    #[test]
    fn test_change_lookup() {
        let id = ProductId::new();
        let record = CommitRecord::new(
            BatchId::new(),
            CommitKind::Deduction,
            vec![StockChange {
                product_id: id,
                previous_stock: 2,
                new_stock: 1,
            }],
        );
        assert_eq!(record.change_for(id).map(|c| c.new_stock), Some(1));
        assert!(record.change_for(ProductId::new()).is_none());
        assert!(CommitRecord::empty(BatchId::new(), CommitKind::Restoration).is_empty());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&CommitKind::Restoration).unwrap();
        assert_eq!(json, "\"restoration\"");
    }
}
