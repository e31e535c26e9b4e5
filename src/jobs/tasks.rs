/// Background task implementations
use crate::{context::AppContext, db, error::AppResult};

/// Purge idle in-process rate limit windows
pub async fn purge_rate_limit_windows(ctx: &AppContext) -> usize {
    match &ctx.memory_limiter {
        Some(limiter) => limiter.purge_expired().await,
        None => 0,
    }
}

/// Health check - verify the post store is operational
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    db::test_connection(&ctx.db).await
}
