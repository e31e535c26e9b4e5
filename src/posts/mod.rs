/// Posts: model, storage seam, submission pipeline and caller-facing service
///
/// Posts are append-only. They are created exclusively through the
/// [`SubmissionPipeline`] and read back through the [`PostStore`], always
/// newest first.

pub mod service;
pub mod store;
pub mod submission;

pub use service::{Greeting, PostService};
pub use store::SqlitePostStore;
pub use submission::{ContentPolicy, SubmissionPipeline};

use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Range query over stored posts
///
/// Results are always ordered by `created_at` descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub limit: i64,
    pub author_id: Option<String>,
}

impl PostQuery {
    /// Newest posts across all authors
    pub fn latest(limit: i64) -> Self {
        Self {
            limit,
            author_id: None,
        }
    }

    /// Newest posts by one author
    pub fn by_author(author_id: impl Into<String>, limit: i64) -> Self {
        Self {
            limit,
            author_id: Some(author_id.into()),
        }
    }
}

/// Post storage backend trait
///
/// Implementations assign the id and creation timestamp on insert.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Append a new post
    async fn insert(&self, author_id: &str, content: &str) -> AppResult<Post>;

    /// Fetch posts newest first, optionally filtered by author
    async fn query_many(&self, query: &PostQuery) -> AppResult<Vec<Post>>;

    /// Fetch a single post by id
    async fn get(&self, id: &str) -> AppResult<Option<Post>>;
}
