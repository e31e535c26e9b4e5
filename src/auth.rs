/// Caller authentication
///
/// Sessions are owned by the external identity provider. Requests carry the
/// provider-issued session JWT as a bearer token; this module only verifies
/// its signature and expiry and exposes the `sub` claim as the caller id.
use crate::{
    config::AuthConfig,
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims read from a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Caller's user id at the identity provider
    pub sub: String,
    pub exp: usize,
    /// Provider session id, when present
    #[serde(default)]
    pub sid: Option<String>,
}

/// Verifies provider-issued session tokens
#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    /// Build from configuration: RS256 with a PEM public key, else HS256
    pub fn from_config(config: &AuthConfig) -> AppResult<Self> {
        let (key, algorithm) = match (&config.jwt_public_key_pem, &config.jwt_secret) {
            (Some(pem), _) => (
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| AppError::Config(format!("Invalid JWT public key: {}", e)))?,
                Algorithm::RS256,
            ),
            (None, Some(secret)) => (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256),
            (None, None) => {
                return Err(AppError::Config(
                    "No JWT verification key configured".to_string(),
                ))
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self { key, validation })
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> AppResult<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::warn!("Session token verification failed: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::Authentication("Token has expired".to_string())
                }
                ErrorKind::InvalidSignature => {
                    AppError::Authentication("Invalid token signature".to_string())
                }
                _ => AppError::Authentication(format!("Invalid token: {}", e)),
            }
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AppError::Authentication("Token has no subject".to_string()));
        }

        Ok(data.claims)
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticated caller - rejects the request with 401 when absent or invalid
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub session_id: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let claims = state.session_verifier.verify(token)?;

        Ok(AuthContext {
            user_id: claims.sub,
            session_id: claims.sid,
        })
    }
}
