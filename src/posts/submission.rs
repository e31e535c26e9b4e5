/// Post submission pipeline
///
/// Validation, admission and persistence run in that fixed order and stop
/// at the first failure:
///
/// 1. content must satisfy the [`ContentPolicy`]
/// 2. the author's sliding window must admit the attempt
/// 3. the post is appended to the store
///
/// Admission and persistence are not transactional. A crash between them
/// leaves an attempt counted but not written, which only tightens the
/// author's budget.
use crate::{
    config::PostConfig,
    error::{AppError, AppResult},
    metrics,
    posts::{Post, PostStore},
    rate_limit::RateLimiter,
    upstream,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

lazy_static! {
    /// Strings made only of pictographs and emoji components (modifiers,
    /// ZWJ, variation selectors, keycap bases)
    static ref EMOJI_ONLY: Regex =
        Regex::new(r"^(?:\p{Extended_Pictographic}|\p{Emoji_Component})+$")
            .expect("emoji pattern is valid");
}

/// Accepted shape of post content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentPolicy {
    /// Bounds in Unicode scalar values, inclusive
    pub min_chars: usize,
    pub max_chars: usize,
    pub emoji_only: bool,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self {
            min_chars: 1,
            max_chars: 250,
            emoji_only: true,
        }
    }
}

impl From<&PostConfig> for ContentPolicy {
    fn from(config: &PostConfig) -> Self {
        Self {
            min_chars: config.min_chars,
            max_chars: config.max_chars,
            emoji_only: config.emoji_only,
        }
    }
}

impl ContentPolicy {
    pub fn validate(&self, content: &str) -> AppResult<()> {
        let len = content.chars().count();

        if len < self.min_chars {
            return Err(AppError::Validation(format!(
                "Content must be at least {} character(s)",
                self.min_chars
            )));
        }

        if len > self.max_chars {
            return Err(AppError::Validation(format!(
                "Content exceeds maximum length of {} characters: {}",
                self.max_chars, len
            )));
        }

        if self.emoji_only && !content.is_empty() && !EMOJI_ONLY.is_match(content) {
            return Err(AppError::Validation("Only emojis are allowed".to_string()));
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct SubmissionPipeline {
    policy: ContentPolicy,
    limiter: Arc<dyn RateLimiter>,
    store: Arc<dyn PostStore>,
    timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(
        policy: ContentPolicy,
        limiter: Arc<dyn RateLimiter>,
        store: Arc<dyn PostStore>,
    ) -> Self {
        Self {
            policy,
            limiter,
            store,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate, admit and persist a post for `author_id`
    pub async fn submit(&self, author_id: &str, content: &str) -> AppResult<Post> {
        if author_id.trim().is_empty() {
            return Err(AppError::Authentication(
                "A post requires an authenticated author".to_string(),
            ));
        }

        if let Err(e) = self.policy.validate(content) {
            warn!("Rejected post from {}: {}", author_id, e);
            metrics::POST_REJECTIONS_TOTAL
                .with_label_values(&["validation"])
                .inc();
            return Err(e);
        }

        let decision =
            upstream::bounded("rate limiter", self.timeout, self.limiter.limit(author_id)).await?;
        if !decision.allowed {
            warn!(
                "Rate limited post from {} (retry after {:?})",
                author_id, decision.retry_after
            );
            metrics::POST_REJECTIONS_TOTAL
                .with_label_values(&["rate_limited"])
                .inc();
        }
        decision.into_result()?;

        let post = upstream::bounded(
            "post store",
            self.timeout,
            self.store.insert(author_id, content),
        )
        .await?;

        metrics::POSTS_CREATED_TOTAL.inc();
        info!("Created post {} for {}", post.id, author_id);

        Ok(post)
    }
}
