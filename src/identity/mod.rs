/// Identity Lookup
///
/// Author profiles live in an external identity provider. The service only
/// ever asks it one question: "who are these ids?". Both the hosted
/// provider and a static directory answer through [`IdentityLookup`].

pub mod directory;
pub mod http;

pub use directory::StaticDirectory;
pub use http::{HttpIdentityLookup, HttpIdentityLookupConfig};

use crate::{
    config::DisplayNamePolicy,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Placeholder shown when an author has no usable name
pub const UNKNOWN_USERNAME: &str = "unknown";

/// A user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Handle of a linked external account (e.g. an OAuth login)
    #[serde(default)]
    pub external_username: Option<String>,
    #[serde(default)]
    pub image_url: String,
}

impl IdentityRecord {
    /// First non-empty name in the chain: username, then external handle
    pub fn display_name(&self) -> Option<&str> {
        [&self.username, &self.external_username]
            .into_iter()
            .flatten()
            .map(|s| s.as_str())
            .find(|s| !s.trim().is_empty())
    }

    /// Project the record into the shape exposed to readers
    pub fn to_author_view(&self, policy: DisplayNamePolicy) -> AppResult<AuthorView> {
        let username = match (self.display_name(), policy) {
            (Some(name), _) => name.to_string(),
            (None, DisplayNamePolicy::Placeholder) => UNKNOWN_USERNAME.to_string(),
            (None, DisplayNamePolicy::Strict) => {
                return Err(AppError::AuthorIdentityIncomplete(self.id.clone()))
            }
        };

        Ok(AuthorView {
            id: self.id.clone(),
            username,
            image_url: self.image_url.clone(),
        })
    }
}

/// Author identity attached to a feed entry; rebuilt on every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: String,
    pub username: String,
    pub image_url: String,
}

/// Batched user lookup against the identity provider
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Return the records for `ids` that the provider knows about
    ///
    /// Unknown ids are simply absent from the result. Callers keep `ids`
    /// at or below `limit`.
    async fn get_users(&self, ids: &[String], limit: usize) -> AppResult<Vec<IdentityRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(username: Option<&str>, external: Option<&str>) -> IdentityRecord {
        IdentityRecord {
            id: "user_1".to_string(),
            username: username.map(String::from),
            external_username: external.map(String::from),
            image_url: "https://img.example.com/1.png".to_string(),
        }
    }

    #[test]
    fn test_display_name_prefers_username() {
        assert_eq!(record(Some("alice"), Some("gh-alice")).display_name(), Some("alice"));
    }

    #[test]
    fn test_display_name_falls_back_to_external() {
        assert_eq!(record(None, Some("gh-alice")).display_name(), Some("gh-alice"));
        assert_eq!(record(Some("  "), Some("gh-alice")).display_name(), Some("gh-alice"));
    }

    #[test]
    fn test_placeholder_policy() {
        let view = record(None, None)
            .to_author_view(DisplayNamePolicy::Placeholder)
            .unwrap();
        assert_eq!(view.username, UNKNOWN_USERNAME);
        assert_eq!(view.id, "user_1");
        assert_eq!(view.image_url, "https://img.example.com/1.png");
    }

    #[test]
    fn test_strict_policy() {
        let err = record(None, None)
            .to_author_view(DisplayNamePolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, AppError::AuthorIdentityIncomplete(id) if id == "user_1"));

        // Strict only bites when the whole chain is empty
        let view = record(None, Some("gh-alice"))
            .to_author_view(DisplayNamePolicy::Strict)
            .unwrap();
        assert_eq!(view.username, "gh-alice");
    }

    #[test]
    fn test_author_view_wire_shape() {
        let view = record(Some("alice"), None)
            .to_author_view(DisplayNamePolicy::Placeholder)
            .unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": "user_1",
                "username": "alice",
                "imageUrl": "https://img.example.com/1.png"
            })
        );
    }
}
