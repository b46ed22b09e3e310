//! Interactive packaging session endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use catalog::{CatalogStore, ProductId};
use chrono::{DateTime, Utc};
use common::SessionId;
use reconcile::{AuditSink, DEFAULT_ACTOR, PackagingSession, ScanEvent, StockRequirement};
use serde::{Deserialize, Serialize};

use super::{detached, parse_id};
use super::stock::{ActorRequest, CommitResponse, commit_response};
use crate::error::ApiError;
use crate::state::{AppState, SharedSession};

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub barcode: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: SessionId,
    pub opened_at: DateTime<Utc>,
    pub scans: Vec<ScanEvent>,
    pub requirements: StockRequirement,
    /// Tentative availability of every product touched this session.
    pub reservations: BTreeMap<ProductId, i64>,
}

impl<S, A> From<&PackagingSession<S, A>> for SessionResponse
where
    S: CatalogStore + Clone + 'static,
    A: AuditSink + Clone + 'static,
{
    fn from(session: &PackagingSession<S, A>) -> Self {
        Self {
            id: session.id(),
            opened_at: session.opened_at(),
            scans: session.scans().to_vec(),
            requirements: session.requirements(),
            reservations: session.ledger().entries().collect(),
        }
    }
}

async fn find<S: CatalogStore + Clone + 'static>(
    state: &AppState<S>,
    id: &str,
) -> Result<SharedSession<S>, ApiError> {
    let session_id: SessionId = parse_id(id, "session")?;
    state
        .session(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session {id} not found")))
}

/// POST /sessions: open a packaging session.
#[tracing::instrument(skip(state))]
pub async fn create<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<SessionResponse>) {
    let session = state.open_session().await;
    let session = session.lock().await;
    (StatusCode::CREATED, Json(SessionResponse::from(&*session)))
}

/// GET /sessions/{id}: scans, requirements and reservations.
#[tracing::instrument(skip(state))]
pub async fn get<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = find(&state, &id).await?;
    let session = session.lock().await;
    Ok(Json(SessionResponse::from(&*session)))
}

/// POST /sessions/{id}/scans: scan a barcode into the session.
#[tracing::instrument(skip(state, req), fields(barcode = %req.barcode))]
pub async fn scan<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ScanRequest>,
) -> Result<(StatusCode, Json<ScanEvent>), ApiError> {
    let session = find(&state, &id).await?;
    let event = session.lock().await.scan(&req.barcode).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// DELETE /sessions/{id}/scans/{index}: undo one scan.
#[tracing::instrument(skip(state))]
pub async fn remove_scan<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = find(&state, &id).await?;
    let mut session = session.lock().await;
    session.remove(index)?;
    Ok(Json(SessionResponse::from(&*session)))
}

/// POST /sessions/{id}/commit: commit the session's scans as one batch.
#[tracing::instrument(skip(state, req))]
pub async fn commit<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    req: Option<Json<ActorRequest>>,
) -> Result<Json<CommitResponse>, ApiError> {
    let actor = req
        .and_then(|Json(req)| req.actor)
        .unwrap_or_else(|| DEFAULT_ACTOR.to_string());

    let session = find(&state, &id).await?;
    let outcome = detached(async move {
        let outcome = session.lock().await.commit(&actor).await;
        state.remember(&outcome).await;
        outcome
    })
    .await?;
    commit_response(outcome)
}

/// DELETE /sessions/{id}: abandon the session and drop its reservations.
#[tracing::instrument(skip(state))]
pub async fn abandon<S: CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id: SessionId = parse_id(&id, "session")?;
    let session = state
        .close_session(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session {id} not found")))?;
    session.lock().await.abandon();
    Ok(StatusCode::NO_CONTENT)
}
