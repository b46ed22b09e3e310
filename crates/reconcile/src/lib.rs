//! Stock reconciliation for finished-goods packaging.
//!
//! This crate turns scanned products into authoritative stock changes:
//! - Bundles are expanded into the base products they consume
//! - Packaging sessions reserve stock at scan time against a local ledger
//! - Commits batch-read stock, validate, and apply every write in parallel
//!
//! The catalog store offers no multi-record transactions, so a commit that
//! fails part-way is rolled back by compensating writes that restore each
//! touched counter to its pre-commit value.

pub mod audit;
pub mod bundle;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod outcome;
pub mod record;
pub mod requirements;
pub mod scan;
pub mod session;
pub mod stock;

pub use audit::{AuditAction, AuditEntry, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use bundle::BundleResolver;
pub use engine::{DEFAULT_ACTOR, StockEngine};
pub use error::{AuditError, FailedUpdate, ReconcileError, Result, Shortfall};
pub use ledger::ReservationLedger;
pub use outcome::{CommitOutcome, CommitStatus};
pub use record::{CommitKind, CommitRecord, StockChange};
pub use requirements::{RequirementCalculator, Requirements, StockRequirement};
pub use scan::{ComponentLine, ComponentSnapshot, ProductRef, ResolvedProduct, ScanEvent, ScanItem};
pub use session::PackagingSession;
pub use stock::{BatchStockReader, StockSnapshot, StockValidation, drop_unknown, find_shortfalls};
