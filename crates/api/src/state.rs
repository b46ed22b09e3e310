//! Shared application state: the engine, open sessions and voidable batches.

use std::collections::HashMap;
use std::sync::Arc;

use catalog::CatalogStore;
use common::{BatchId, SessionId};
use reconcile::{
    CommitKind, CommitOutcome, CommitRecord, PackagingSession, StockEngine, TracingAuditSink,
};
use tokio::sync::{Mutex, RwLock};

/// Engine type served over HTTP.
pub type Engine<S> = StockEngine<S, TracingAuditSink>;

/// A registered session. Each one is locked independently.
pub type SharedSession<S> = Arc<Mutex<PackagingSession<S, TracingAuditSink>>>;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub engine: Engine<S>,
    sessions: RwLock<HashMap<SessionId, SharedSession<S>>>,
    batches: RwLock<HashMap<BatchId, CommitRecord>>,
}

impl<S: CatalogStore + Clone + 'static> AppState<S> {
    pub fn new(store: S) -> Self {
        Self {
            engine: StockEngine::new(store, TracingAuditSink),
            sessions: RwLock::new(HashMap::new()),
            batches: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        self.engine.store()
    }

    /// Opens and registers a new packaging session.
    pub async fn open_session(&self) -> SharedSession<S> {
        let session = PackagingSession::open(self.engine.clone());
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        metrics::gauge!("packaging_sessions_open").increment(1.0);
        tracing::info!(session = %id, "session opened");
        shared
    }

    pub async fn session(&self, id: SessionId) -> Option<SharedSession<S>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn close_session(&self, id: SessionId) -> Option<SharedSession<S>> {
        let removed = self.sessions.write().await.remove(&id);
        if removed.is_some() {
            metrics::gauge!("packaging_sessions_open").decrement(1.0);
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Keeps the record of a deduction that left changes applied.
    pub async fn remember(&self, outcome: &CommitOutcome) {
        if outcome.record.kind == CommitKind::Deduction
            && outcome.status.left_changes()
            && !outcome.record.is_empty()
        {
            self.batches
                .write()
                .await
                .insert(outcome.batch_id, outcome.record.clone());
        }
    }

    pub async fn batch(&self, id: BatchId) -> Option<CommitRecord> {
        self.batches.read().await.get(&id).cloned()
    }

    /// Takes a batch out of the registry so only one void can run for it.
    pub async fn claim_batch(&self, id: BatchId) -> Option<CommitRecord> {
        self.batches.write().await.remove(&id)
    }

    /// Puts back whatever part of a claimed batch the void did not restore.
    pub async fn release_batch(&self, record: CommitRecord, void: &CommitOutcome) {
        if void.success() {
            return;
        }

        let remaining: Vec<_> = record
            .changes
            .iter()
            .filter(|change| void.record.change_for(change.product_id).is_none())
            .copied()
            .collect();
        if remaining.is_empty() {
            return;
        }

        tracing::warn!(
            batch_id = %record.batch_id,
            unrestored = remaining.len(),
            "batch only partly voided"
        );
        let batch_id = record.batch_id;
        self.batches.write().await.insert(
            batch_id,
            CommitRecord {
                changes: remaining,
                ..record
            },
        );
    }
}
