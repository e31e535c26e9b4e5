/// Microblog - rate-limited posting and author-annotated feeds
///
/// Posts are stored locally; author identities live with an external
/// identity provider and are joined onto feeds at read time.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod feed;
pub mod identity;
pub mod jobs;
pub mod metrics;
pub mod posts;
pub mod rate_limit;
pub mod server;
pub mod upstream;
