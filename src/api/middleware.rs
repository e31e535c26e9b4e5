/// Request instrumentation middleware
use crate::metrics::{self, HTTP_REQUESTS_ACTIVE};
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Holds one slot of the in-flight gauge; released on drop, including
/// when the client goes away and the request future is cancelled
struct ActiveRequest;

impl ActiveRequest {
    fn start() -> Self {
        HTTP_REQUESTS_ACTIVE.inc();
        ActiveRequest
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        HTTP_REQUESTS_ACTIVE.dec();
    }
}

/// Count and time each request, labelled by its route template
pub async fn track_http_metrics(req: Request, next: Next) -> Response {
    let method = req.method().as_str().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let start = Instant::now();

    let active = ActiveRequest::start();
    let response = next.run(req).await;
    drop(active);

    metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
