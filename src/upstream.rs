/// Bounded calls to external collaborators
use crate::error::{AppError, AppResult};
use std::{future::Future, time::Duration};
use tracing::warn;

/// Await `fut`, failing with `UpstreamTimeout(service)` once `timeout` elapses
pub async fn bounded<T, F>(service: &str, timeout: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} did not answer within {:?}", service, timeout);
            Err(AppError::UpstreamTimeout(service.to_string()))
        }
    }
}
