use std::{future::Future, time::Duration};

use crate::error::AppError;

/// Bounds an external call. An elapsed deadline becomes `AppError::Timeout` so
/// callers apply the same policy as for a failed response.
pub async fn bounded<F, T>(operation: &'static str, limit: Duration, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation,
            secs: limit.as_secs(),
        }),
    }
}
