//! Deadlines for calls into external collaborators.

use std::future::Future;
use std::time::Duration;

use crate::db::RepositoryError;

use super::TokenError;

/// Run `fut` with a deadline, leaving its own result untouched.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<Result<T, RepositoryError>, TokenError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        tracing::warn!(operation, limit_ms = limit.as_millis(), "Upstream call timed out");
        TokenError::Timeout(operation)
    })
}

/// Run `fut` with a deadline and map repository failures to [`TokenError`].
pub(crate) async fn call<T, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, TokenError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    bounded(limit, operation, fut)
        .await?
        .map_err(|e| TokenError::from_repository(operation, &e))
}
