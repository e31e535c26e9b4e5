/// Post RPC endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::{AppError, AppResult},
    feed::FeedEntry,
    posts::{Greeting, Post},
};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

/// Build post routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/rpc/post.hello", get(hello))
        .route("/rpc/post.create", post(create))
        .route("/rpc/post.getAll", get(get_all))
        .route("/rpc/post.getByUser", get(get_by_user))
        .route("/rpc/post.getById", get(get_by_id))
}

#[derive(Debug, Deserialize)]
struct HelloQuery {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePostRequest {
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByUserQuery {
    #[serde(default)]
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ByIdQuery {
    #[serde(default)]
    id: String,
}

/// Log a failed call at a level matching who is at fault
fn log_failure(method: &str, err: &AppError) {
    match err {
        AppError::Validation(_)
        | AppError::Authentication(_)
        | AppError::NotFound(_)
        | AppError::RateLimited { .. } => debug!("{}: rejected: {}", method, err),
        e if e.is_retryable() => warn!("{}: upstream failure: {}", method, e),
        e => error!("{}: failed: {}", method, e),
    }
}

/// Liveness probe echoing its input
async fn hello(
    State(ctx): State<AppContext>,
    Query(query): Query<HelloQuery>,
) -> AppResult<Json<Greeting>> {
    let text = query
        .text
        .ok_or_else(|| AppError::Validation("text is required".to_string()))?;
    Ok(Json(ctx.posts.hello(&text)))
}

/// Create a post as the authenticated caller
async fn create(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> AppResult<Json<Post>> {
    debug!(
        "post.create: caller {} (session {})",
        auth.user_id,
        auth.session_id.as_deref().unwrap_or("-")
    );

    let Json(req) = body.map_err(|rejection| {
        let err = AppError::Validation(rejection.body_text());
        log_failure("post.create", &err);
        err
    })?;

    let post = ctx
        .posts
        .create_post(&auth.user_id, &req.content)
        .await
        .map_err(|e| {
            log_failure("post.create", &e);
            e
        })?;

    info!("post.create: {} created {}", auth.user_id, post.id);
    Ok(Json(post))
}

/// Newest posts across all authors
async fn get_all(State(ctx): State<AppContext>) -> AppResult<Json<Vec<FeedEntry>>> {
    let feed = ctx.posts.get_all_posts().await.map_err(|e| {
        log_failure("post.getAll", &e);
        e
    })?;
    Ok(Json(feed))
}

/// Newest posts by one author
async fn get_by_user(
    State(ctx): State<AppContext>,
    Query(query): Query<ByUserQuery>,
) -> AppResult<Json<Vec<FeedEntry>>> {
    let feed = ctx
        .posts
        .get_posts_by_user(&query.user_id)
        .await
        .map_err(|e| {
            log_failure("post.getByUser", &e);
            e
        })?;
    Ok(Json(feed))
}

/// A single post with its author
async fn get_by_id(
    State(ctx): State<AppContext>,
    Query(query): Query<ByIdQuery>,
) -> AppResult<Json<FeedEntry>> {
    if query.id.trim().is_empty() {
        return Err(AppError::Validation("id is required".to_string()));
    }

    let entry = ctx.posts.get_post_by_id(&query.id).await.map_err(|e| {
        log_failure("post.getById", &e);
        e
    })?;
    Ok(Json(entry))
}
