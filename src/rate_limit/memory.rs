/// In-process sliding window limiter
///
/// Keeps a log of admission instants per key. Used when no shared store is
/// configured; state is lost on restart and not shared between processes.
use crate::{
    error::AppResult,
    rate_limit::{RateLimitDecision, RateLimiter, SlidingWindow},
};
use async_trait::async_trait;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

#[derive(Clone)]
pub struct SlidingWindowLimiter {
    window: SlidingWindow,
    prefix: String,
    log: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: SlidingWindow, prefix: impl Into<String>) -> Self {
        Self {
            window,
            prefix: prefix.into(),
            log: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Drop keys whose whole log has aged out
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut log = self.log.lock().await;
        let before = log.len();
        log.retain(|_, admitted| {
            admitted
                .back()
                .is_some_and(|last| now.duration_since(*last) < self.window.window)
        });
        before - log.len()
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn limit(&self, key: &str) -> AppResult<RateLimitDecision> {
        let full_key = format!("{}{}", self.prefix, key);
        let now = Instant::now();
        let quota = self.window.quota as usize;

        let mut log = self.log.lock().await;
        let admitted = log.entry(full_key).or_default();

        while admitted
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.window.window)
        {
            admitted.pop_front();
        }

        let decision = if admitted.len() < quota {
            admitted.push_back(now);
            RateLimitDecision {
                allowed: true,
                key: key.to_string(),
                remaining: (quota - admitted.len()) as u32,
                retry_after: Duration::ZERO,
            }
        } else {
            let retry_after = admitted
                .front()
                .map(|oldest| self.window.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window.window);
            RateLimitDecision {
                allowed: false,
                key: key.to_string(),
                remaining: 0,
                retry_after,
            }
        };

        debug!(
            "Sliding window check: {} => allowed={} remaining={}",
            key, decision.allowed, decision.remaining
        );

        Ok(decision)
    }
}
