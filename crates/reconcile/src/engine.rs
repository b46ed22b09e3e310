//! Commit and restoration engine for authoritative stock counters.

use std::time::Instant;

use catalog::{CatalogStore, Product, ProductId};
use chrono::Utc;
use common::BatchId;
use futures_util::future::join_all;
use tracing::Instrument;

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::bundle::BundleResolver;
use crate::error::{FailedUpdate, ReconcileError, Result};
use crate::outcome::{CommitOutcome, CommitStatus};
use crate::record::{CommitKind, CommitRecord, StockChange};
use crate::requirements::{RequirementCalculator, Requirements, StockRequirement};
use crate::scan::{ProductRef, ScanItem};
use crate::stock::{BatchStockReader, StockSnapshot, StockValidation, drop_unknown, find_shortfalls};

/// Actor recorded when the caller does not name one.
pub const DEFAULT_ACTOR: &str = "system";

/// One counter write planned for a batch.
#[derive(Debug, Clone)]
struct PlannedWrite {
    product_id: ProductId,
    name: String,
    previous: i64,
    target: i64,
}

/// What the apply phase left behind.
#[derive(Debug, Default)]
struct ApplyReport {
    /// Changes still in effect after compensation.
    applied: Vec<StockChange>,
    failed: Vec<FailedUpdate>,
    compensation_failures: Vec<ReconcileError>,
}

/// Applies stock deductions and restorations against a [`CatalogStore`].
///
/// The store has no multi-record transactions, so a deduction runs as a
/// saga: batch read, validate, parallel writes, then compensating writes
/// back to the pre-commit values if any write failed. Writes are plain
/// sets rather than compare-and-swap; a concurrent session touching the
/// same product between the read and the write can lose its update.
#[derive(Clone)]
pub struct StockEngine<C, A> {
    store: C,
    audit: A,
}

impl<C, A> StockEngine<C, A>
where
    C: CatalogStore + Clone + 'static,
    A: AuditSink + Clone + 'static,
{
    /// Creates a new engine.
    pub fn new(store: C, audit: A) -> Self {
        Self { store, audit }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &C {
        &self.store
    }

    /// Returns a bundle resolver over the same store.
    pub fn resolver(&self) -> BundleResolver<C> {
        BundleResolver::new(self.store.clone())
    }

    /// Expands a product into base products and per-unit quantities.
    pub async fn resolve_bundle(&self, product_id: ProductId) -> Result<Vec<(Product, u32)>> {
        self.resolver().resolve(product_id).await
    }

    /// Folds scan items into required quantities per base product.
    pub async fn calculate_requirements(&self, items: &[ScanItem]) -> Result<Requirements> {
        RequirementCalculator::new(self.store.clone())
            .calculate(items)
            .await
    }

    /// Checks authoritative stock against the scan items without writing.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn validate_stock(&self, items: &[ScanItem]) -> Result<StockValidation> {
        let Requirements {
            quantities: mut requirement,
            mut missing,
        } = self.calculate_requirements(items).await?;

        let stock = self.read_stock(&requirement).await?;
        missing.extend(drop_unknown(&mut requirement, &stock));
        let shortfalls = find_shortfalls(&requirement, &stock);

        Ok(StockValidation {
            valid: shortfalls.is_empty(),
            shortfalls,
            missing,
        })
    }

    /// Deducts the stock consumed by the scan items.
    ///
    /// Nothing is written unless every base product can cover its
    /// requirement. The attempt runs on its own task: once started, its
    /// writes, compensation, metrics and audit entry all complete even if
    /// the caller stops waiting.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn commit_deduction(&self, items: &[ScanItem], actor: &str) -> CommitOutcome {
        let engine = self.clone();
        let items = items.to_vec();
        let actor = actor.to_string();
        let batch_id = BatchId::new();

        detached(batch_id, CommitKind::Deduction, async move {
            metrics::counter!("stock_commits_total", "kind" => "deduction").increment(1);
            let start = Instant::now();

            let outcome = engine.run_deduction(batch_id, &items).await;

            engine.observe(&outcome, CommitKind::Deduction, start);
            engine
                .audit(&actor, AuditAction::StockDeduction, &outcome, None)
                .await;
            outcome
        })
        .await
    }

    /// Adds back the stock consumed by the scan items.
    ///
    /// There is no stock precondition for adding. Failed writes are
    /// reported, not compensated.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn commit_restoration(&self, items: &[ScanItem], actor: &str) -> CommitOutcome {
        let engine = self.clone();
        let items = items.to_vec();
        let actor = actor.to_string();
        let batch_id = BatchId::new();

        detached(batch_id, CommitKind::Restoration, async move {
            metrics::counter!("stock_restorations_total").increment(1);
            let start = Instant::now();

            let outcome = match engine.calculate_requirements(&items).await {
                Ok(requirements) => {
                    engine
                        .run_restoration(batch_id, requirements.quantities, requirements.missing)
                        .await
                }
                Err(e) => Self::rejected(batch_id, CommitKind::Restoration, e, Vec::new()),
            };

            engine.observe(&outcome, CommitKind::Restoration, start);
            engine
                .audit(&actor, AuditAction::StockRestoration, &outcome, None)
                .await;
            outcome
        })
        .await
    }

    /// Voids a committed deduction by adding back its recorded deltas.
    #[tracing::instrument(skip(self, record), fields(batch_id = %record.batch_id))]
    pub async fn restore_record(&self, record: &CommitRecord, actor: &str) -> CommitOutcome {
        let engine = self.clone();
        let record = record.clone();
        let actor = actor.to_string();
        let batch_id = BatchId::new();

        detached(batch_id, CommitKind::Restoration, async move {
            metrics::counter!("stock_restorations_total").increment(1);
            let start = Instant::now();

            let outcome = if record.kind != CommitKind::Deduction {
                Self::rejected(
                    batch_id,
                    CommitKind::Restoration,
                    ReconcileError::NotVoidable(record.batch_id),
                    Vec::new(),
                )
            } else {
                let requirement: StockRequirement = record
                    .changes
                    .iter()
                    .filter_map(|change| {
                        let returned = u32::try_from(-change.delta()).ok()?;
                        (returned > 0).then_some((change.product_id, returned))
                    })
                    .collect();
                engine
                    .run_restoration(batch_id, requirement, Vec::new())
                    .await
            };

            engine.observe(&outcome, CommitKind::Restoration, start);
            engine
                .audit(
                    &actor,
                    AuditAction::BatchVoid,
                    &outcome,
                    Some(record.batch_id),
                )
                .await;
            outcome
        })
        .await
    }

    async fn run_deduction(&self, batch_id: BatchId, items: &[ScanItem]) -> CommitOutcome {
        let kind = CommitKind::Deduction;

        // 1. Requirements, recomputed from the scan list
        let Requirements {
            quantities: mut requirement,
            missing: mut skipped,
        } = match self.calculate_requirements(items).await {
            Ok(requirements) => requirements,
            Err(e) => return Self::rejected(batch_id, kind, e, Vec::new()),
        };

        // 2. Batch read of authoritative stock
        let stock = match self.read_stock(&requirement).await {
            Ok(stock) => stock,
            Err(e) => return Self::rejected(batch_id, kind, e, skipped),
        };
        skipped.extend(drop_unknown(&mut requirement, &stock));

        // 3. Validate before any write
        let shortfalls = find_shortfalls(&requirement, &stock);
        if !shortfalls.is_empty() {
            tracing::info!(%batch_id, shortfalls = shortfalls.len(), "deduction rejected");
            return Self::rejected(
                batch_id,
                kind,
                ReconcileError::InsufficientStock { shortfalls },
                skipped,
            );
        }

        let plan = Self::plan(&requirement, &stock, |current, required| current - required);

        // 4. Apply, compensating on partial failure
        self.apply(batch_id, kind, plan, skipped).await
    }

    async fn run_restoration(
        &self,
        batch_id: BatchId,
        mut requirement: StockRequirement,
        mut skipped: Vec<ProductRef>,
    ) -> CommitOutcome {
        let kind = CommitKind::Restoration;

        let stock = match self.read_stock(&requirement).await {
            Ok(stock) => stock,
            Err(e) => return Self::rejected(batch_id, kind, e, skipped),
        };
        skipped.extend(drop_unknown(&mut requirement, &stock));

        let plan = Self::plan(&requirement, &stock, |current, required| current + required);
        self.apply(batch_id, kind, plan, skipped).await
    }

    async fn read_stock(&self, requirement: &StockRequirement) -> Result<StockSnapshot> {
        BatchStockReader::new(self.store.clone())
            .read(&requirement.product_ids())
            .await
    }

    fn plan(
        requirement: &StockRequirement,
        stock: &StockSnapshot,
        target: impl Fn(i64, i64) -> i64,
    ) -> Vec<PlannedWrite> {
        requirement
            .iter()
            .filter_map(|(product_id, required)| {
                let product = stock.get(&product_id)?;
                Some(PlannedWrite {
                    product_id,
                    name: product.name.clone(),
                    previous: product.stock_quantity,
                    target: target(product.stock_quantity, i64::from(required)),
                })
            })
            .collect()
    }

    async fn apply(
        &self,
        batch_id: BatchId,
        kind: CommitKind,
        plan: Vec<PlannedWrite>,
        skipped: Vec<ProductRef>,
    ) -> CommitOutcome {
        if plan.is_empty() {
            return CommitOutcome {
                batch_id,
                status: CommitStatus::Committed,
                errors: Vec::new(),
                skipped,
                record: CommitRecord::empty(batch_id, kind),
            };
        }

        let compensate = kind == CommitKind::Deduction;
        tracing::debug!(%batch_id, writes = plan.len(), compensate, "applying stock batch");

        let report = apply_plan(&self.store, plan, compensate).await;

        let record = CommitRecord::new(batch_id, kind, report.applied);
        if report.failed.is_empty() {
            tracing::info!(%batch_id, kind = kind.as_str(), products = record.changes.len(), "stock batch committed");
            return CommitOutcome {
                batch_id,
                status: CommitStatus::Committed,
                errors: Vec::new(),
                skipped,
                record,
            };
        }

        let (status, errors) = if compensate {
            let status = if report.compensation_failures.is_empty() {
                CommitStatus::Compensated
            } else {
                CommitStatus::CompensationIncomplete
            };
            let mut errors = vec![ReconcileError::PartialCommit {
                failed: report.failed,
            }];
            errors.extend(report.compensation_failures);
            (status, errors)
        } else {
            let errors = report
                .failed
                .into_iter()
                .map(|f| ReconcileError::RestorationFailed {
                    product_id: f.product_id,
                    name: f.name,
                    reason: f.reason,
                })
                .collect();
            (CommitStatus::PartiallyApplied, errors)
        };

        tracing::warn!(%batch_id, kind = kind.as_str(), %status, "stock batch failed");
        CommitOutcome {
            batch_id,
            status,
            errors,
            skipped,
            record,
        }
    }

    fn rejected(
        batch_id: BatchId,
        kind: CommitKind,
        error: ReconcileError,
        skipped: Vec<ProductRef>,
    ) -> CommitOutcome {
        CommitOutcome {
            batch_id,
            status: CommitStatus::Rejected,
            errors: vec![error],
            skipped,
            record: CommitRecord::empty(batch_id, kind),
        }
    }

    fn observe(&self, outcome: &CommitOutcome, kind: CommitKind, start: Instant) {
        metrics::histogram!("stock_commit_duration_seconds", "kind" => kind.as_str())
            .record(start.elapsed().as_secs_f64());

        match outcome.status {
            CommitStatus::Committed => {}
            CommitStatus::Rejected => {
                metrics::counter!("stock_commit_rejected_total", "kind" => kind.as_str())
                    .increment(1);
            }
            CommitStatus::Compensated => {
                metrics::counter!("stock_commit_compensated_total").increment(1);
            }
            CommitStatus::CompensationIncomplete => {
                metrics::counter!("stock_commit_compensated_total").increment(1);
                let failures = outcome
                    .errors
                    .iter()
                    .filter(|e| matches!(e, ReconcileError::CompensationFailed { .. }))
                    .count();
                metrics::counter!("stock_compensation_failures_total")
                    .increment(failures as u64);
            }
            CommitStatus::PartiallyApplied => {
                metrics::counter!("stock_restoration_failures_total").increment(1);
            }
        }
    }

    /// Writes the single summary entry for a commit attempt.
    async fn audit(
        &self,
        actor: &str,
        action: AuditAction,
        outcome: &CommitOutcome,
        voided_batch: Option<BatchId>,
    ) {
        let messages = outcome.error_messages();
        let detail = serde_json::json!({
            "status": outcome.status.as_str(),
            "changes": outcome.record.changes,
            "skipped": outcome.skipped,
            "shortfalls": outcome.shortfalls(),
            "errors": messages,
            "voided_batch": voided_batch,
        });

        let entry = AuditEntry {
            actor: actor.to_string(),
            action,
            resource_id: outcome.batch_id.to_string(),
            detail,
            success: outcome.success(),
            error_message: (!messages.is_empty()).then(|| messages.join("; ")),
            recorded_at: Utc::now(),
        };

        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(batch_id = %outcome.batch_id, error = %e, "failed to write audit entry");
        }
    }
}

/// Runs one commit attempt on its own task and waits for it.
///
/// A task that panics is reported with the most cautious status for its
/// kind, since some of its writes may have landed.
async fn detached<F>(batch_id: BatchId, kind: CommitKind, attempt: F) -> CommitOutcome
where
    F: Future<Output = CommitOutcome> + Send + 'static,
{
    match tokio::spawn(attempt.in_current_span()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(%batch_id, error = %e, "stock commit task ended abnormally");
            CommitOutcome {
                batch_id,
                status: match kind {
                    CommitKind::Deduction => CommitStatus::CompensationIncomplete,
                    CommitKind::Restoration => CommitStatus::PartiallyApplied,
                },
                errors: vec![ReconcileError::Internal(e.to_string())],
                skipped: Vec::new(),
                record: CommitRecord::empty(batch_id, kind),
            }
        }
    }
}

/// Issues every planned write concurrently, then reverts the successful
/// ones if any failed and `compensate` is set.
async fn apply_plan<C: CatalogStore>(
    store: &C,
    plan: Vec<PlannedWrite>,
    compensate: bool,
) -> ApplyReport {
    let results = join_all(
        plan.iter()
            .map(|write| store.set_stock(write.product_id, write.target)),
    )
    .await;

    let mut applied = Vec::new();
    let mut failed = Vec::new();
    for (write, result) in plan.iter().zip(results) {
        match result {
            Ok(product) => applied.push((
                write,
                StockChange {
                    product_id: write.product_id,
                    previous_stock: write.previous,
                    new_stock: product.stock_quantity,
                },
            )),
            Err(e) => {
                tracing::warn!(product = %write.product_id, error = %e, "stock update failed");
                failed.push(FailedUpdate {
                    product_id: write.product_id,
                    name: write.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if failed.is_empty() || !compensate {
        return ApplyReport {
            applied: applied.into_iter().map(|(_, change)| change).collect(),
            failed,
            compensation_failures: Vec::new(),
        };
    }

    tracing::warn!(
        failed = failed.len(),
        compensating = applied.len(),
        "partial stock commit, compensating"
    );

    let results = join_all(
        applied
            .iter()
            .map(|(write, _)| store.set_stock(write.product_id, write.previous)),
    )
    .await;

    let mut still_applied = Vec::new();
    let mut compensation_failures = Vec::new();
    for ((write, change), result) in applied.into_iter().zip(results) {
        if let Err(e) = result {
            tracing::error!(product = %write.product_id, error = %e, "compensation failed");
            compensation_failures.push(ReconcileError::CompensationFailed {
                product_id: write.product_id,
                name: write.name.clone(),
                reason: e.to_string(),
            });
            still_applied.push(change);
        }
    }

    ApplyReport {
        applied: still_applied,
        failed,
        compensation_failures,
    }
}
