//! Committed batch lookup and voiding.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use catalog::CatalogStore;
use common::BatchId;
use reconcile::{CommitRecord, DEFAULT_ACTOR};

use super::{detached, parse_id};
use super::stock::{ActorRequest, CommitResponse, commit_response};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /batches/{id}: the changes a deduction left applied.
#[tracing::instrument(skip(state))]
pub async fn get<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CommitRecord>, ApiError> {
    let batch_id: BatchId = parse_id(&id, "batch")?;
    state
        .batch(batch_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Batch {id} not found")))
}

/// POST /batches/{id}/void: restore the recorded deltas of a deduction.
#[tracing::instrument(skip(state, req))]
pub async fn void<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    req: Option<Json<ActorRequest>>,
) -> Result<Json<CommitResponse>, ApiError> {
    let batch_id: BatchId = parse_id(&id, "batch")?;
    let actor = req
        .and_then(|Json(req)| req.actor)
        .unwrap_or_else(|| DEFAULT_ACTOR.to_string());

    let outcome = detached(async move {
        let record = state.claim_batch(batch_id).await?;
        let outcome = state.engine.restore_record(&record, &actor).await;
        state.release_batch(record, &outcome).await;
        Some(outcome)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Batch {id} not found")))?;
    commit_response(outcome)
}
