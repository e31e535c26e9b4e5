/// SQLite-backed post store
use crate::{
    error::{AppError, AppResult},
    posts::{Post, PostQuery, PostStore},
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// Post store over the `post` table
#[derive(Clone)]
pub struct SqlitePostStore {
    db: SqlitePool,
}

impl SqlitePostStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a post with an explicit timestamp
    pub async fn insert_at(
        &self,
        author_id: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<Post> {
        // Stored text must sort chronologically, so the precision is fixed
        let created_at = created_at.trunc_subsecs(6);
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO post (id, author_id, content, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&id)
        .bind(author_id)
        .bind(content)
        .bind(format_timestamp(&created_at))
        .execute(&self.db)
        .await?;

        debug!("Inserted post {} for author {}", id, author_id);

        Ok(Post {
            id,
            author_id: author_id.to_string(),
            content: content.to_string(),
            created_at,
        })
    }

    fn parse_post(row: SqliteRow) -> AppResult<Post> {
        let created_at: String = row.try_get("created_at")?;

        Ok(Post {
            id: row.try_get("id")?,
            author_id: row.try_get("author_id")?,
            content: row.try_get("content")?,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn insert(&self, author_id: &str, content: &str) -> AppResult<Post> {
        self.insert_at(author_id, content, Utc::now()).await
    }

    async fn query_many(&self, query: &PostQuery) -> AppResult<Vec<Post>> {
        let rows = if let Some(author_id) = &query.author_id {
            sqlx::query(
                r#"
                SELECT id, author_id, content, created_at
                FROM post
                WHERE author_id = ?1
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?2
                "#,
            )
            .bind(author_id)
            .bind(query.limit)
            .fetch_all(&self.db)
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT id, author_id, content, created_at
                FROM post
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?1
                "#,
            )
            .bind(query.limit)
            .fetch_all(&self.db)
            .await?
        };

        rows.into_iter().map(Self::parse_post).collect()
    }

    async fn get(&self, id: &str) -> AppResult<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, author_id, content, created_at
            FROM post
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Self::parse_post).transpose()
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Invalid timestamp: {}", e)))
}
