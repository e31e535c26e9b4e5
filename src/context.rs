/// Application context and dependency injection
use crate::{
    auth::SessionVerifier,
    config::{IdentityProviderConfig, ServerConfig},
    db,
    error::AppResult,
    feed::FeedAssembler,
    identity::{HttpIdentityLookup, HttpIdentityLookupConfig, IdentityLookup, StaticDirectory},
    posts::{ContentPolicy, PostService, PostStore, SqlitePostStore, SubmissionPipeline},
    rate_limit::{
        GlobalRateLimiter, RateLimiter, RedisSlidingWindowLimiter, SlidingWindow,
        SlidingWindowLimiter,
    },
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub posts: Arc<PostService>,
    pub session_verifier: Arc<SessionVerifier>,
    // Process-wide request budget
    pub global_limiter: GlobalRateLimiter,
    // Set when post admission runs in-process, for periodic purging
    pub memory_limiter: Option<SlidingWindowLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        // Validate configuration
        config.validate()?;

        let db = db::create_pool(
            &config.storage.database_path,
            db::DatabaseOptions {
                max_connections: config.storage.max_connections,
                ..db::DatabaseOptions::default()
            },
        )
        .await?;

        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let timeout = config.upstream.timeout();

        let identity: Arc<dyn IdentityLookup> = match &config.identity.provider {
            IdentityProviderConfig::Http { api_url, secret_key } => {
                info!("Identity lookups via {}", api_url);
                Arc::new(HttpIdentityLookup::new(
                    HttpIdentityLookupConfig::new(api_url.clone(), secret_key.clone())
                        .with_timeout(timeout),
                )?)
            }
            IdentityProviderConfig::Static { users_file } => {
                info!("Identity lookups from static directory {:?}", users_file);
                Arc::new(StaticDirectory::from_file(users_file).await?)
            }
        };

        let window = SlidingWindow::new(
            Duration::from_secs(config.rate_limit.window_secs),
            config.rate_limit.quota,
        );
        let (limiter, memory_limiter): (Arc<dyn RateLimiter>, _) =
            match &config.rate_limit.redis_url {
                Some(url) => {
                    let limiter = RedisSlidingWindowLimiter::connect(
                        url,
                        window,
                        config.rate_limit.key_prefix.clone(),
                        timeout,
                    )
                    .await?;
                    (Arc::new(limiter) as Arc<dyn RateLimiter>, None)
                }
                None => {
                    info!("No Redis configured - post rate limits are per process");
                    let limiter =
                        SlidingWindowLimiter::new(window, config.rate_limit.key_prefix.clone());
                    (Arc::new(limiter.clone()) as Arc<dyn RateLimiter>, Some(limiter))
                }
            };

        let mut ctx = Self::from_parts(config, db, identity, limiter)?;
        ctx.memory_limiter = memory_limiter;
        Ok(ctx)
    }

    /// Wire services from already-constructed collaborators
    pub fn from_parts(
        config: ServerConfig,
        db: SqlitePool,
        identity: Arc<dyn IdentityLookup>,
        limiter: Arc<dyn RateLimiter>,
    ) -> AppResult<Self> {
        let timeout = config.upstream.timeout();
        let store: Arc<dyn PostStore> = Arc::new(SqlitePostStore::new(db.clone()));

        let pipeline =
            SubmissionPipeline::new(ContentPolicy::from(&config.posts), limiter, store.clone())
                .with_timeout(timeout);
        let assembler = FeedAssembler::new(identity, config.identity.display_name_policy)
            .with_batch_limit(config.identity.lookup_batch_limit)
            .with_timeout(timeout);
        let posts = PostService::new(store, pipeline, assembler)
            .with_feed_limit(config.posts.feed_limit)
            .with_timeout(timeout);

        let session_verifier = SessionVerifier::from_config(&config.authentication)?;
        let global_limiter = GlobalRateLimiter::new(config.rate_limit.global_requests_per_minute);

        Ok(Self {
            config: Arc::new(config),
            db,
            posts: Arc::new(posts),
            session_verifier: Arc::new(session_verifier),
            global_limiter,
            memory_limiter: None,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
