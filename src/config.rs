/// Configuration management for the microblog service
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub authentication: AuthConfig,
    pub posts: PostConfig,
    pub rate_limit: RateLimitConfig,
    pub upstream: UpstreamConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database_path: PathBuf,
    pub max_connections: u32,
}

/// Which identity backend answers author lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IdentityProviderConfig {
    /// Hosted identity provider reached over HTTP
    Http { api_url: String, secret_key: String },
    /// Fixed user directory loaded from a JSON file
    Static { users_file: PathBuf },
}

/// What to do when an author has neither a username nor an external handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayNamePolicy {
    /// Substitute the literal `"unknown"`
    #[default]
    Placeholder,
    /// Fail the whole feed with `AuthorIdentityIncomplete`
    Strict,
}

impl FromStr for DisplayNamePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "placeholder" | "lenient" => Ok(DisplayNamePolicy::Placeholder),
            "strict" => Ok(DisplayNamePolicy::Strict),
            _ => Err(AppError::Config(format!("Invalid display name policy: {}", s))),
        }
    }
}

/// Identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub provider: IdentityProviderConfig,
    pub display_name_policy: DisplayNamePolicy,
    /// Maximum ids per identity lookup call
    pub lookup_batch_limit: usize,
}

/// Authentication configuration
///
/// Session tokens are issued by the identity provider; this service only
/// verifies them and reads the `sub` claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwt_public_key_pem: Option<String>,
    pub leeway_secs: u64,
}

/// Post content and feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostConfig {
    pub min_chars: usize,
    pub max_chars: usize,
    pub emoji_only: bool,
    pub feed_limit: i64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub quota: u32,
    pub key_prefix: String,
    /// Shared limiter state; in-process limiter when absent
    pub redis_url: Option<String>,
    pub global_requests_per_minute: u32,
}

/// Timeouts for calls to external collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("MICROBLOG_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("MICROBLOG_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| AppError::Config("Invalid port number".to_string()))?;
        let version = env!("CARGO_PKG_VERSION").to_string();

        let data_directory: PathBuf = env::var("MICROBLOG_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database_path = env::var("MICROBLOG_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("microblog.sqlite"));
        let max_connections = env_or("MICROBLOG_DATABASE_MAX_CONNECTIONS", 10);

        let provider = match env::var("MICROBLOG_IDENTITY_PROVIDER")
            .unwrap_or_else(|_| "http".to_string())
            .to_lowercase()
            .as_str()
        {
            "http" => IdentityProviderConfig::Http {
                api_url: env::var("MICROBLOG_IDENTITY_API_URL")
                    .unwrap_or_else(|_| "https://api.clerk.com".to_string()),
                secret_key: env::var("MICROBLOG_IDENTITY_SECRET_KEY").unwrap_or_default(),
            },
            "static" => IdentityProviderConfig::Static {
                users_file: env::var("MICROBLOG_IDENTITY_STATIC_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_directory.join("users.json")),
            },
            other => {
                return Err(AppError::Config(format!(
                    "Unknown identity provider: {}",
                    other
                )))
            }
        };
        let display_name_policy = env::var("MICROBLOG_DISPLAY_NAME_POLICY")
            .map(|v| v.parse::<DisplayNamePolicy>())
            .unwrap_or(Ok(DisplayNamePolicy::default()))?;

        let jwt_secret = env_opt("MICROBLOG_JWT_SECRET");
        let jwt_public_key_pem = env_opt("MICROBLOG_JWT_PUBLIC_KEY_PEM");

        let rate_limit = RateLimitConfig {
            window_secs: env_or("MICROBLOG_RATE_LIMIT_WINDOW_SECS", 60),
            quota: env_or("MICROBLOG_RATE_LIMIT_QUOTA", 3),
            key_prefix: env::var("MICROBLOG_RATE_LIMIT_PREFIX")
                .unwrap_or_else(|_| "microblog:ratelimit:".to_string()),
            redis_url: env_opt("MICROBLOG_REDIS_URL"),
            global_requests_per_minute: env_or("MICROBLOG_GLOBAL_REQUESTS_PER_MINUTE", 3000),
        };

        let log_level = env::var("MICROBLOG_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database_path,
                max_connections,
            },
            identity: IdentityConfig {
                provider,
                display_name_policy,
                lookup_batch_limit: env_or("MICROBLOG_IDENTITY_BATCH_LIMIT", 100),
            },
            authentication: AuthConfig {
                jwt_secret,
                jwt_public_key_pem,
                leeway_secs: env_or("MICROBLOG_JWT_LEEWAY_SECS", 60),
            },
            posts: PostConfig {
                min_chars: env_or("MICROBLOG_POST_MIN_CHARS", 1),
                max_chars: env_or("MICROBLOG_POST_MAX_CHARS", 250),
                emoji_only: env_or("MICROBLOG_POST_EMOJI_ONLY", true),
                feed_limit: env_or("MICROBLOG_FEED_LIMIT", 100),
            },
            rate_limit,
            upstream: UpstreamConfig {
                timeout_ms: env_or("MICROBLOG_UPSTREAM_TIMEOUT_MS", 5000),
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Config("Hostname cannot be empty".to_string()));
        }

        if self.posts.min_chars > self.posts.max_chars {
            return Err(AppError::Config(format!(
                "Post length bounds are inverted: {} > {}",
                self.posts.min_chars, self.posts.max_chars
            )));
        }

        if self.posts.feed_limit <= 0 {
            return Err(AppError::Config("Feed limit must be positive".to_string()));
        }

        if self.rate_limit.quota == 0 || self.rate_limit.window_secs == 0 {
            return Err(AppError::Config(
                "Rate limit quota and window must be non-zero".to_string(),
            ));
        }

        if self.identity.lookup_batch_limit == 0 {
            return Err(AppError::Config(
                "Identity lookup batch limit must be non-zero".to_string(),
            ));
        }

        if self.upstream.timeout_ms == 0 {
            return Err(AppError::Config("Upstream timeout must be non-zero".to_string()));
        }

        if let IdentityProviderConfig::Http { api_url, secret_key } = &self.identity.provider {
            if api_url.is_empty() || secret_key.is_empty() {
                return Err(AppError::Config(
                    "Identity provider URL and secret key are required".to_string(),
                ));
            }
        }

        match (&self.authentication.jwt_secret, &self.authentication.jwt_public_key_pem) {
            (None, None) => {
                return Err(AppError::Config(
                    "Either a JWT secret or a JWT public key is required".to_string(),
                ))
            }
            (Some(secret), None) if secret.len() < 32 => {
                return Err(AppError::Config(
                    "JWT secret must be at least 32 characters".to_string(),
                ))
            }
            _ => {}
        }

        Ok(())
    }
}
