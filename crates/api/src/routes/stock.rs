//! Batch stock endpoints used by the bulk-import workflow.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use catalog::CatalogStore;
use common::BatchId;
use reconcile::{
    CommitOutcome, CommitStatus, DEFAULT_ACTOR, ProductRef, ReconcileError, Requirements,
    ScanItem, StockChange, StockValidation,
};
use serde::{Deserialize, Serialize};

use super::detached;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<ScanItem>,
    #[serde(default)]
    pub actor: Option<String>,
}

impl BatchRequest {
    fn actor(&self) -> &str {
        self.actor.as_deref().unwrap_or(DEFAULT_ACTOR)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActorRequest {
    #[serde(default)]
    pub actor: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub batch_id: BatchId,
    pub success: bool,
    pub status: &'static str,
    /// `operational` when any error came from the store, else `business_rule`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    pub errors: Vec<String>,
    pub skipped: Vec<ProductRef>,
    pub changes: Vec<StockChange>,
}

impl From<CommitOutcome> for CommitResponse {
    fn from(outcome: CommitOutcome) -> Self {
        let error_kind = outcome
            .errors
            .iter()
            .find(|e| e.is_operational())
            .or(outcome.errors.first())
            .map(ReconcileError::kind);
        Self {
            batch_id: outcome.batch_id,
            success: outcome.success(),
            status: outcome.status.as_str(),
            error_kind,
            errors: outcome.error_messages(),
            skipped: outcome.skipped,
            changes: outcome.record.changes,
        }
    }
}

/// Maps a commit outcome to a response.
///
/// A rejected batch surfaces its error status; a batch that reached the
/// apply phase always answers 200 with `success` telling how it ended.
pub(crate) fn commit_response(outcome: CommitOutcome) -> Result<Json<CommitResponse>, ApiError> {
    if outcome.status == CommitStatus::Rejected {
        let error = outcome
            .errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ReconcileError::Internal("rejected without a cause".to_string()));
        return Err(error.into());
    }
    Ok(Json(outcome.into()))
}

// -- Handlers --

/// POST /stock/requirements: aggregate base-product quantities.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn requirements<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<Requirements>, ApiError> {
    Ok(Json(state.engine.calculate_requirements(&req.items).await?))
}

/// POST /stock/validate: check stock without writing.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn validate<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<StockValidation>, ApiError> {
    Ok(Json(state.engine.validate_stock(&req.items).await?))
}

/// POST /stock/deduct: commit a deduction batch.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn deduct<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let outcome = detached(async move {
        let outcome = state
            .engine
            .commit_deduction(&req.items, req.actor())
            .await;
        state.remember(&outcome).await;
        outcome
    })
    .await?;
    commit_response(outcome)
}

/// POST /stock/restore: add back what the scan items consume.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn restore<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let outcome = state
        .engine
        .commit_restoration(&req.items, req.actor())
        .await;
    commit_response(outcome)
}
