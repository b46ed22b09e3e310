pub mod batches;
pub mod health;
pub mod metrics;
pub mod products;
pub mod sessions;
pub mod stock;

use std::str::FromStr;

use tracing::Instrument;

use crate::error::ApiError;

/// Parses a UUID-backed path id.
pub(crate) fn parse_id<T>(id: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} id: {e}")))
}

/// Runs `work` on its own task so a client disconnect cannot stop it
/// between a commit and the bookkeeping that follows.
pub(crate) async fn detached<T, F>(work: F) -> Result<T, ApiError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work.in_current_span())
        .await
        .map_err(|e| ApiError::Internal(format!("request task failed: {e}")))
}
