/// Rate Limiting System
///
/// Two independent layers:
/// - a per-key sliding window in front of post submission ([`RateLimiter`]),
///   backed either in-process or by Redis
/// - a coarse process-wide request limiter applied as HTTP middleware
pub mod memory;
pub mod redis;

pub use memory::SlidingWindowLimiter;
pub use self::redis::RedisSlidingWindowLimiter;

use crate::{
    context::AppContext,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use serde::Serialize;
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::warn;

/// Window shape shared by all sliding-window limiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindow {
    pub window: Duration,
    pub quota: u32,
}

impl SlidingWindow {
    pub fn new(window: Duration, quota: u32) -> Self {
        Self { window, quota }
    }
}

impl Default for SlidingWindow {
    /// 3 admitted submissions per 60 seconds
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            quota: 3,
        }
    }
}

/// Outcome of one admission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub key: String,
    /// Admissions left in the current window after this decision
    pub remaining: u32,
    /// Time until the oldest admission leaves the window; zero when allowed
    pub retry_after: Duration,
}

impl RateLimitDecision {
    /// Turn a rejection into `RateLimited`
    pub fn into_result(self) -> AppResult<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(AppError::RateLimited {
                retry_after: self.retry_after,
            })
        }
    }
}

/// Per-key sliding-window admission control
///
/// An attempt is admitted iff fewer than `quota` admitted attempts for the
/// same key fall inside the trailing window. Rejected attempts are not
/// recorded.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn limit(&self, key: &str) -> AppResult<RateLimitDecision>;
}

/// Process-wide request limiter
#[derive(Clone)]
pub struct GlobalRateLimiter {
    limiter: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    requests_per_minute: u32,
}

impl GlobalRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Self {
            limiter: Arc::new(GovernorLimiter::direct(Quota::per_minute(per_minute))),
            requests_per_minute: per_minute.get(),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Check the global budget for one request
    pub fn check(&self) -> AppResult<()> {
        self.limiter.check().map_err(|not_until| AppError::RateLimited {
            retry_after: not_until.wait_time_from(DefaultClock::default().now()),
        })
    }
}

/// Global rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(e) = ctx.global_limiter.check() {
        warn!(
            "Global request budget of {}/min exhausted for {}",
            ctx.global_limiter.requests_per_minute(),
            request.uri().path()
        );
        crate::metrics::HTTP_REQUESTS_THROTTLED_TOTAL.inc();
        return Err(e);
    }

    Ok(next.run(request).await)
}
