/// Caller-facing post operations
use crate::{
    error::{AppError, AppResult},
    feed::{FeedAssembler, FeedEntry},
    posts::{Post, PostQuery, PostStore, SubmissionPipeline},
    upstream,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// Default number of posts per feed page
pub const DEFAULT_FEED_LIMIT: i64 = 100;

/// Response of the `hello` probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    pub greeting: String,
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn PostStore>,
    pipeline: SubmissionPipeline,
    assembler: FeedAssembler,
    feed_limit: i64,
    timeout: Duration,
}

impl PostService {
    pub fn new(
        store: Arc<dyn PostStore>,
        pipeline: SubmissionPipeline,
        assembler: FeedAssembler,
    ) -> Self {
        Self {
            store,
            pipeline,
            assembler,
            feed_limit: DEFAULT_FEED_LIMIT,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_feed_limit(mut self, feed_limit: i64) -> Self {
        self.feed_limit = feed_limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn hello(&self, text: &str) -> Greeting {
        Greeting {
            greeting: format!("Hello {}", text),
        }
    }

    /// Create a post as `caller_id`
    pub async fn create_post(&self, caller_id: &str, content: &str) -> AppResult<Post> {
        self.pipeline.submit(caller_id, content).await
    }

    /// Newest posts across all authors
    pub async fn get_all_posts(&self) -> AppResult<Vec<FeedEntry>> {
        self.feed(PostQuery::latest(self.feed_limit)).await
    }

    /// Newest posts by one author
    pub async fn get_posts_by_user(&self, user_id: &str) -> AppResult<Vec<FeedEntry>> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("userId is required".to_string()));
        }
        self.feed(PostQuery::by_author(user_id, self.feed_limit)).await
    }

    /// A single post with its author
    pub async fn get_post_by_id(&self, id: &str) -> AppResult<FeedEntry> {
        let post = upstream::bounded("post store", self.timeout, self.store.get(id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;

        let mut entries = self.assembler.assemble(vec![post]).await?;
        entries
            .pop()
            .ok_or_else(|| AppError::Internal("Feed assembly returned no entry".to_string()))
    }

    async fn feed(&self, query: PostQuery) -> AppResult<Vec<FeedEntry>> {
        let posts =
            upstream::bounded("post store", self.timeout, self.store.query_many(&query)).await?;
        debug!("Assembling feed of {} post(s)", posts.len());
        self.assembler.assemble(posts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DisplayNamePolicy,
        db::create_memory_pool,
        identity::{IdentityRecord, StaticDirectory},
        posts::{ContentPolicy, SqlitePostStore},
        rate_limit::{SlidingWindow, SlidingWindowLimiter},
    };
    use chrono::{Duration as ChronoDuration, Utc};

    fn user(id: &str, username: &str) -> IdentityRecord {
        IdentityRecord {
            id: id.to_string(),
            username: Some(username.to_string()),
            external_username: None,
            image_url: String::new(),
        }
    }

    async fn create_test_service() -> (PostService, Arc<SqlitePostStore>) {
        let store = Arc::new(SqlitePostStore::new(create_memory_pool().await.unwrap()));
        let limiter = Arc::new(SlidingWindowLimiter::new(SlidingWindow::default(), "test:"));
        let directory = Arc::new(StaticDirectory::new([
            user("user_alice", "alice"),
            user("user_bob", "bob"),
        ]));

        let policy = ContentPolicy {
            emoji_only: false,
            ..ContentPolicy::default()
        };
        let pipeline = SubmissionPipeline::new(policy, limiter, store.clone());
        let assembler = FeedAssembler::new(directory, DisplayNamePolicy::Placeholder);

        (PostService::new(store.clone(), pipeline, assembler), store)
    }

    #[tokio::test]
    async fn test_hello() {
        let (service, _) = create_test_service().await;
        assert_eq!(service.hello("world").greeting, "Hello world");
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (service, _) = create_test_service().await;

        service.create_post("user_alice", "hello").await.unwrap();

        let feed = service.get_all_posts().await.unwrap();
        let matching: Vec<_> = feed.iter().filter(|e| e.post.content == "hello").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].author.id, "user_alice");
        assert_eq!(matching[0].author.username, "alice");
    }

    #[tokio::test]
    async fn test_get_all_posts_newest_first() {
        let (service, store) = create_test_service().await;
        let base = Utc::now();

        for (i, author) in ["user_alice", "user_bob", "user_alice"].iter().enumerate() {
            store
                .insert_at(author, &format!("post {}", i), base + ChronoDuration::seconds(i as i64))
                .await
                .unwrap();
        }

        let feed = service.get_all_posts().await.unwrap();
        assert!(feed
            .windows(2)
            .all(|pair| pair[0].post.created_at > pair[1].post.created_at));
        assert_eq!(feed[0].post.content, "post 2");
    }

    #[tokio::test]
    async fn test_get_posts_by_user() {
        let (service, _) = create_test_service().await;

        service.create_post("user_alice", "from alice").await.unwrap();
        service.create_post("user_bob", "from bob").await.unwrap();

        let feed = service.get_posts_by_user("user_bob").await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].author.username, "bob");

        assert!(matches!(
            service.get_posts_by_user("  ").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_get_post_by_id() {
        let (service, _) = create_test_service().await;

        let post = service.create_post("user_alice", "single").await.unwrap();
        let entry = service.get_post_by_id(&post.id).await.unwrap();
        assert_eq!(entry.post, post);
        assert_eq!(entry.author.id, "user_alice");

        assert!(matches!(
            service.get_post_by_id("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_orphaned_post_fails_feed() {
        let (service, store) = create_test_service().await;

        service.create_post("user_alice", "fine").await.unwrap();
        store.insert("user_deleted", "orphan").await.unwrap();

        assert!(matches!(
            service.get_all_posts().await,
            Err(AppError::AuthorNotFound(id)) if id == "user_deleted"
        ));
    }
}
