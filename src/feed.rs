/// Feed assembly: joins stored posts with author identity
///
/// Posts and profiles live in different systems. The assembler batches the
/// distinct author ids into identity lookups and attaches an [`AuthorView`]
/// to every post, preserving input order. A post whose author cannot be
/// resolved fails the whole feed; nothing is silently dropped.
use crate::{
    config::DisplayNamePolicy,
    error::{AppError, AppResult},
    identity::{AuthorView, IdentityLookup, IdentityRecord},
    metrics,
    posts::Post,
    upstream,
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, error};

/// Largest id batch the identity provider accepts per call
pub const MAX_LOOKUP_BATCH: usize = 100;

/// One post with its resolved author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub post: Post,
    pub author: AuthorView,
}

#[derive(Clone)]
pub struct FeedAssembler {
    identity: Arc<dyn IdentityLookup>,
    policy: DisplayNamePolicy,
    batch_limit: usize,
    timeout: Duration,
}

impl FeedAssembler {
    pub fn new(identity: Arc<dyn IdentityLookup>, policy: DisplayNamePolicy) -> Self {
        Self {
            identity,
            policy,
            batch_limit: MAX_LOOKUP_BATCH,
            timeout: Duration::from_secs(5),
        }
    }

    /// Ids per lookup call, capped at [`MAX_LOOKUP_BATCH`]
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit.clamp(1, MAX_LOOKUP_BATCH);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach authors to `posts`, keeping their order
    pub async fn assemble(&self, posts: Vec<Post>) -> AppResult<Vec<FeedEntry>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let author_ids = distinct_author_ids(&posts);
        let records = self.lookup(&author_ids).await?;

        let authors: HashMap<&str, &IdentityRecord> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();

        posts
            .into_iter()
            .map(|post| -> AppResult<FeedEntry> {
                let record = authors.get(post.author_id.as_str()).ok_or_else(|| {
                    error!("Author {} for post {} not found", post.author_id, post.id);
                    metrics::FEED_ASSEMBLY_FAILURES_TOTAL
                        .with_label_values(&["author_not_found"])
                        .inc();
                    AppError::AuthorNotFound(post.author_id.clone())
                })?;

                let author = record.to_author_view(self.policy).map_err(|e| {
                    error!("Author {} for post {} has no display name", post.author_id, post.id);
                    metrics::FEED_ASSEMBLY_FAILURES_TOTAL
                        .with_label_values(&["author_identity_incomplete"])
                        .inc();
                    e
                })?;

                Ok(FeedEntry { post, author })
            })
            .collect()
    }

    /// One bounded lookup per chunk of ids, issued concurrently
    async fn lookup(&self, author_ids: &[String]) -> AppResult<Vec<IdentityRecord>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Resolving {} author(s) in batches of {}",
            author_ids.len(),
            self.batch_limit
        );

        let calls = author_ids.chunks(self.batch_limit).map(|chunk| {
            upstream::bounded(
                "identity provider",
                self.timeout,
                self.identity.get_users(chunk, self.batch_limit),
            )
        });

        match try_join_all(calls).await {
            Ok(batches) => {
                metrics::IDENTITY_LOOKUPS_TOTAL.with_label_values(&["ok"]).inc();
                Ok(batches.into_iter().flatten().collect())
            }
            Err(e) => {
                metrics::IDENTITY_LOOKUPS_TOTAL.with_label_values(&["error"]).inc();
                Err(e)
            }
        }
    }
}

/// Distinct non-empty author ids in first-seen order
fn distinct_author_ids(posts: &[Post]) -> Vec<String> {
    let mut seen = HashSet::new();
    posts
        .iter()
        .map(|p| p.author_id.as_str())
        .filter(|id| !id.trim().is_empty())
        .filter(|id| seen.insert(*id))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{StaticDirectory, UNKNOWN_USERNAME};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Mutex;

    fn post(id: &str, author_id: &str) -> Post {
        Post {
            id: id.to_string(),
            author_id: author_id.to_string(),
            content: "🦀".to_string(),
            created_at: Utc::now(),
        }
    }

    fn user(id: &str, username: Option<&str>) -> IdentityRecord {
        IdentityRecord {
            id: id.to_string(),
            username: username.map(String::from),
            external_username: None,
            image_url: format!("https://img.example.com/{}.png", id),
        }
    }

    /// Records every batch it is asked for
    struct RecordingLookup {
        inner: StaticDirectory,
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl IdentityLookup for RecordingLookup {
        async fn get_users(&self, ids: &[String], limit: usize) -> AppResult<Vec<IdentityRecord>> {
            self.calls.lock().unwrap().push(ids.to_vec());
            self.inner.get_users(ids, limit).await
        }
    }

    struct SlowLookup;

    #[async_trait]
    impl IdentityLookup for SlowLookup {
        async fn get_users(&self, _ids: &[String], _limit: usize) -> AppResult<Vec<IdentityRecord>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    fn assembler(users: Vec<IdentityRecord>) -> FeedAssembler {
        FeedAssembler::new(
            Arc::new(StaticDirectory::new(users)),
            DisplayNamePolicy::Placeholder,
        )
    }

    #[tokio::test]
    async fn test_resolvable_author() {
        let p = post("p1", "user_alice");
        let feed = assembler(vec![user("user_alice", Some("alice"))])
            .assemble(vec![p.clone()])
            .await
            .unwrap();

        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post, p);
        assert_eq!(feed[0].author.id, "user_alice");
        assert_eq!(feed[0].author.username, "alice");
    }

    #[tokio::test]
    async fn test_missing_author_fails_whole_feed() {
        let posts = vec![post("p1", "user_alice"), post("p2", "user_ghost")];
        let err = assembler(vec![user("user_alice", Some("alice"))])
            .assemble(posts)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AuthorNotFound(id) if id == "user_ghost"));
    }

    #[tokio::test]
    async fn test_empty_author_id_is_not_looked_up() {
        let lookup = Arc::new(RecordingLookup {
            inner: StaticDirectory::new([user("user_alice", Some("alice"))]),
            calls: Mutex::new(Vec::new()),
        });
        let assembler = FeedAssembler::new(lookup.clone(), DisplayNamePolicy::Placeholder);

        let err = assembler
            .assemble(vec![post("p1", "user_alice"), post("p2", "")])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AuthorNotFound(id) if id.is_empty()));
        assert_eq!(*lookup.calls.lock().unwrap(), vec![vec!["user_alice".to_string()]]);
    }

    #[tokio::test]
    async fn test_preserves_order_and_dedupes_lookup() {
        let lookup = Arc::new(RecordingLookup {
            inner: StaticDirectory::new([
                user("user_alice", Some("alice")),
                user("user_bob", Some("bob")),
            ]),
            calls: Mutex::new(Vec::new()),
        });
        let assembler = FeedAssembler::new(lookup.clone(), DisplayNamePolicy::Placeholder);

        let mut posts = vec![
            post("p1", "user_bob"),
            post("p2", "user_alice"),
            post("p3", "user_bob"),
        ];
        for (i, p) in posts.iter_mut().enumerate() {
            p.created_at = Utc::now() - ChronoDuration::minutes(i as i64);
        }

        let feed = assembler.assemble(posts.clone()).await.unwrap();
        let ids: Vec<_> = feed.iter().map(|e| e.post.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
        assert_eq!(feed[2].author.username, "bob");

        let calls = lookup.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["user_bob".to_string(), "user_alice".to_string()]);
    }

    #[tokio::test]
    async fn test_chunks_large_author_sets() {
        let users: Vec<_> = (0..250)
            .map(|i| user(&format!("user_{}", i), Some("someone")))
            .collect();
        let posts: Vec<_> = (0..250)
            .map(|i| post(&format!("p{}", i), &format!("user_{}", i)))
            .collect();

        let lookup = Arc::new(RecordingLookup {
            inner: StaticDirectory::new(users),
            calls: Mutex::new(Vec::new()),
        });
        let assembler = FeedAssembler::new(lookup.clone(), DisplayNamePolicy::Placeholder);

        let feed = assembler.assemble(posts).await.unwrap();
        assert_eq!(feed.len(), 250);

        let mut sizes: Vec<_> = lookup.calls.lock().unwrap().iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![50, 100, 100]);
    }

    #[tokio::test]
    async fn test_display_name_policies() {
        let users = vec![user("user_anon", None)];
        let posts = vec![post("p1", "user_anon")];

        let lenient = assembler(users.clone()).assemble(posts.clone()).await.unwrap();
        assert_eq!(lenient[0].author.username, UNKNOWN_USERNAME);

        let strict = FeedAssembler::new(
            Arc::new(StaticDirectory::new(users)),
            DisplayNamePolicy::Strict,
        )
        .assemble(posts)
        .await
        .unwrap_err();
        assert!(matches!(strict, AppError::AuthorIdentityIncomplete(_)));
    }

    #[tokio::test]
    async fn test_assemble_is_idempotent() {
        let assembler = assembler(vec![
            user("user_alice", Some("alice")),
            user("user_bob", None),
        ]);
        let posts = vec![post("p1", "user_alice"), post("p2", "user_bob")];

        let first = assembler.assemble(posts.clone()).await.unwrap();
        let second = assembler.assemble(posts).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_call() {
        let lookup = Arc::new(RecordingLookup {
            inner: StaticDirectory::default(),
            calls: Mutex::new(Vec::new()),
        });
        let assembler = FeedAssembler::new(lookup.clone(), DisplayNamePolicy::Placeholder);

        assert!(assembler.assemble(Vec::new()).await.unwrap().is_empty());
        assert!(lookup.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_identity_provider_times_out() {
        let assembler = FeedAssembler::new(Arc::new(SlowLookup), DisplayNamePolicy::Placeholder)
            .with_timeout(Duration::from_secs(2));

        let err = assembler
            .assemble(vec![post("p1", "user_alice")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamTimeout(_)));
    }
}
