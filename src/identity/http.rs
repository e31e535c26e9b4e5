/// Identity lookup against a hosted identity provider over HTTP
///
/// Speaks the provider's user-list endpoint:
/// `GET {api_url}/v1/users?user_id=a&user_id=b&limit=N` with a bearer
/// secret key, answering a JSON array of users.
use crate::{
    error::{AppError, AppResult},
    identity::{IdentityLookup, IdentityRecord},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP identity lookup configuration
#[derive(Debug, Clone)]
pub struct HttpIdentityLookupConfig {
    /// Base URL of the provider API, without trailing slash
    pub api_url: String,
    /// Server-side secret key
    pub secret_key: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User-Agent header for HTTP requests
    pub user_agent: String,
}

impl HttpIdentityLookupConfig {
    pub fn new(api_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            timeout: Duration::from_secs(5),
            user_agent: format!("microblog/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// User object as returned by the provider
#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    external_accounts: Vec<ProviderExternalAccount>,
}

#[derive(Debug, Deserialize)]
struct ProviderExternalAccount {
    #[serde(default)]
    username: Option<String>,
}

impl From<ProviderUser> for IdentityRecord {
    fn from(user: ProviderUser) -> Self {
        let external_username = user
            .external_accounts
            .into_iter()
            .filter_map(|account| account.username)
            .find(|name| !name.is_empty());

        IdentityRecord {
            id: user.id,
            username: user.username,
            external_username,
            image_url: user.image_url.unwrap_or_default(),
        }
    }
}

/// Identity provider client
#[derive(Clone)]
pub struct HttpIdentityLookup {
    http_client: reqwest::Client,
    config: HttpIdentityLookupConfig,
}

impl HttpIdentityLookup {
    /// Create a new identity lookup client
    pub fn new(config: HttpIdentityLookupConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::UpstreamTimeout(format!(
                "identity provider did not answer within {:?}",
                self.config.timeout
            ))
        } else {
            AppError::UpstreamUnavailable(format!("identity provider request failed: {}", e))
        }
    }
}

#[async_trait]
impl IdentityLookup for HttpIdentityLookup {
    async fn get_users(&self, ids: &[String], limit: usize) -> AppResult<Vec<IdentityRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/users", self.config.api_url);
        let mut params: Vec<(&str, String)> =
            ids.iter().map(|id| ("user_id", id.clone())).collect();
        params.push(("limit", limit.to_string()));

        debug!("Identity lookup for {} user(s)", ids.len());

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.config.secret_key)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Identity provider returned {}", status);
            return Err(AppError::UpstreamUnavailable(format!(
                "identity provider returned error: {}",
                status
            )));
        }

        let users: Vec<ProviderUser> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_transport_error(e)
            } else {
                AppError::UpstreamUnavailable(format!("Invalid identity provider response: {}", e))
            }
        })?;

        Ok(users.into_iter().map(IdentityRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn lookup_for(server: &MockServer) -> HttpIdentityLookup {
        HttpIdentityLookup::new(
            HttpIdentityLookupConfig::new(server.uri(), "sk_test_secret")
                .with_timeout(Duration::from_millis(500)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_users_maps_provider_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .and(query_param("user_id", "user_alice"))
            .and(query_param("limit", "100"))
            .and(header("authorization", "Bearer sk_test_secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "user_alice",
                    "username": "alice",
                    "image_url": "https://img.example.com/alice.png",
                    "external_accounts": []
                },
                {
                    "id": "user_bob",
                    "username": null,
                    "image_url": "https://img.example.com/bob.png",
                    "external_accounts": [{ "username": "" }, { "username": "bob-gh" }]
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let lookup = lookup_for(&server);
        let ids = vec!["user_alice".to_string(), "user_bob".to_string()];
        let users = lookup.get_users(&ids, 100).await.unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username.as_deref(), Some("alice"));
        assert_eq!(users[1].username, None);
        assert_eq!(users[1].external_username.as_deref(), Some("bob-gh"));
        assert_eq!(users[1].display_name(), Some("bob-gh"));
    }

    #[tokio::test]
    async fn test_empty_ids_skip_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let users = lookup_for(&server).get_users(&[], 100).await.unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = lookup_for(&server)
            .get_users(&["user_alice".to_string()], 100)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_slow_provider_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = lookup_for(&server)
            .get_users(&["user_alice".to_string()], 100)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamTimeout(_)));
    }
}
