/// Distributed sliding window limiter using Redis
///
/// Every admission is a member of a per-key sorted set scored by its
/// timestamp in milliseconds. Trimming, counting and recording happen in a
/// single Lua script, so concurrent requests from any number of processes
/// see a consistent window.
use crate::{
    error::{AppError, AppResult},
    rate_limit::{RateLimitDecision, RateLimiter, SlidingWindow},
};
use ::redis::{aio::ConnectionManager, Client, Script};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// KEYS[1] = window key
/// ARGV = now_ms, window_ms, quota, member
/// Returns {allowed, remaining, retry_after_ms}
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local quota = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)

if count < quota then
    redis.call('ZADD', key, now, ARGV[4])
    redis.call('PEXPIRE', key, window)
    return {1, quota - count - 1, 0}
end

local retry = window
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
    retry = tonumber(oldest[2]) + window - now
end
return {0, 0, retry}
"#;

#[derive(Clone)]
pub struct RedisSlidingWindowLimiter {
    connection: ConnectionManager,
    script: Script,
    window: SlidingWindow,
    prefix: String,
    timeout: Duration,
}

impl RedisSlidingWindowLimiter {
    /// Connect to Redis and prepare the limiter
    pub async fn connect(
        redis_url: &str,
        window: SlidingWindow,
        prefix: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        info!("Connecting to Redis rate limit store");

        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AppError::Config(format!("Invalid Redis URL: {}", e))
        })?;

        let connection = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| AppError::UpstreamTimeout("redis connection".to_string()))?
            .map_err(|e| {
                error!("Failed to connect to Redis: {}", e);
                AppError::UpstreamUnavailable(format!("Redis connection failed: {}", e))
            })?;

        info!("✓ Redis connection established");

        Ok(Self {
            connection,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
            window,
            prefix: prefix.into(),
            timeout,
        })
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

/// Interpret the script reply
fn decision_from_reply(key: &str, reply: &[i64]) -> AppResult<RateLimitDecision> {
    match reply {
        [allowed, remaining, retry_after_ms] => Ok(RateLimitDecision {
            allowed: *allowed == 1,
            key: key.to_string(),
            remaining: (*remaining).max(0) as u32,
            retry_after: Duration::from_millis((*retry_after_ms).max(0) as u64),
        }),
        other => Err(AppError::UpstreamUnavailable(format!(
            "Unexpected rate limit script reply: {:?}",
            other
        ))),
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl RateLimiter for RedisSlidingWindowLimiter {
    async fn limit(&self, key: &str) -> AppResult<RateLimitDecision> {
        let redis_key = self.build_key(key);
        let now = now_millis();
        // Unique member so two admissions in the same millisecond both count
        let member = format!("{}-{}", now, Uuid::new_v4());

        let mut conn = self.connection.clone();
        let mut invocation = self.script.prepare_invoke();
        invocation
            .key(&redis_key)
            .arg(now)
            .arg(self.window.window.as_millis() as i64)
            .arg(self.window.quota)
            .arg(member);

        let reply: Vec<i64> = tokio::time::timeout(self.timeout, invocation.invoke_async(&mut conn))
            .await
            .map_err(|_| AppError::UpstreamTimeout("redis rate limiter".to_string()))?
            .map_err(|e| {
                warn!("Redis rate limit script failed for {}: {}", redis_key, e);
                AppError::UpstreamUnavailable(format!("Rate limiter unavailable: {}", e))
            })?;

        let decision = decision_from_reply(key, &reply)?;
        debug!(
            "Rate limit check: {} => allowed={} remaining={}",
            redis_key, decision.allowed, decision.remaining
        );

        Ok(decision)
    }
}
