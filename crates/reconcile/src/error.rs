//! Reconciliation error types.

use catalog::{CatalogError, ProductId};
use common::BatchId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scan::ProductRef;

/// A base product that cannot cover its requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub product_id: ProductId,
    pub name: String,
    pub barcode: String,
    pub required: u32,
    pub available: i64,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (barcode {}): required {}, available {}",
            self.name, self.barcode, self.required, self.available
        )
    }
}

/// One stock write that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpdate {
    pub product_id: ProductId,
    pub name: String,
    pub reason: String,
}

impl std::fmt::Display for FailedUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.reason)
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Pre-flight business rule: stock cannot cover the batch. Nothing was mutated.
    #[error("Insufficient stock: {}", join(.shortfalls))]
    InsufficientStock { shortfalls: Vec<Shortfall> },

    /// A referenced product does not exist. Fails only the item, not the batch.
    #[error("Product not found: {0}")]
    NotFound(ProductRef),

    /// A read or write against the catalog store failed.
    #[error("Catalog store error: {0}")]
    Transport(#[from] CatalogError),

    /// Some stock writes of a batch failed while others succeeded.
    #[error("Stock update failed for {}", join(.failed))]
    PartialCommit { failed: Vec<FailedUpdate> },

    /// A compensating write failed; the product keeps the committed value.
    #[error("Compensation failed for {name} ({product_id}): {reason}")]
    CompensationFailed {
        product_id: ProductId,
        name: String,
        reason: String,
    },

    /// An additive restoration write failed and needs manual follow-up.
    #[error("Stock restoration failed for {name} ({product_id}): {reason}")]
    RestorationFailed {
        product_id: ProductId,
        name: String,
        reason: String,
    },

    /// A session operation referenced a scan that does not exist.
    #[error("No scan at index {index} (session holds {len})")]
    InvalidScanIndex { index: usize, len: usize },

    /// Only deduction batches can be voided.
    #[error("Batch {0} is not a deduction and cannot be voided")]
    NotVoidable(BatchId),

    /// A commit task ended abnormally.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReconcileError {
    /// Returns true for pre-flight failures reported before any mutation.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            ReconcileError::InsufficientStock { .. }
                | ReconcileError::NotFound(_)
                | ReconcileError::InvalidScanIndex { .. }
                | ReconcileError::NotVoidable(_)
        )
    }

    /// Returns true for operational faults against the backing store.
    pub fn is_operational(&self) -> bool {
        !self.is_business_rule()
    }

    /// `"business_rule"` or `"operational"`, for clients that branch on it.
    pub fn kind(&self) -> &'static str {
        if self.is_business_rule() {
            "business_rule"
        } else {
            "operational"
        }
    }

    /// Enumerated shortfalls, if this is a stock validation failure.
    pub fn shortfalls(&self) -> &[Shortfall] {
        match self {
            ReconcileError::InsufficientStock { shortfalls } => shortfalls,
            _ => &[],
        }
    }
}

/// An audit sink refused or lost an entry.
#[derive(Debug, Error)]
#[error("Audit sink error: {0}")]
pub struct AuditError(pub String);

/// Convenience type alias for reconciliation results.
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_lists_every_shortfall() {
        let err = ReconcileError::InsufficientStock {
            shortfalls: vec![
                Shortfall {
                    product_id: ProductId::new(),
                    name: "Gadget".to_string(),
                    barcode: "222".to_string(),
                    required: 2,
                    available: 1,
                },
                Shortfall {
                    product_id: ProductId::new(),
                    name: "Widget".to_string(),
                    barcode: "111".to_string(),
                    required: 9,
                    available: 5,
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("Insufficient stock"));
        assert!(message.contains("Gadget (barcode 222): required 2, available 1"));
        assert!(message.contains("Widget"));
        assert_eq!(err.shortfalls().len(), 2);
        assert!(err.is_business_rule());
        assert_eq!(err.kind(), "business_rule");
    }

    #[test]
    fn partial_commit_names_failed_products() {
        let err = ReconcileError::PartialCommit {
            failed: vec![FailedUpdate {
                product_id: ProductId::new(),
                name: "B".to_string(),
                reason: "timeout".to_string(),
            }],
        };
        assert_eq!(err.to_string(), "Stock update failed for B (timeout)");
        assert!(err.is_operational());
        assert!(err.shortfalls().is_empty());
    }

    #[test]
    fn transport_errors_are_operational() {
        let err: ReconcileError = CatalogError::Unavailable("down".to_string()).into();
        assert!(err.is_operational());
        assert_eq!(err.kind(), "operational");
    }
}
