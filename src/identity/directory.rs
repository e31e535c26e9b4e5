/// Static user directory
///
/// Serves identity lookups from a fixed set of records, loaded from a JSON
/// file for local development or built in code for tests.
use crate::{
    error::{AppError, AppResult},
    identity::{IdentityLookup, IdentityRecord},
};
use async_trait::async_trait;
use std::{collections::HashMap, path::Path, sync::Arc};
use tracing::info;

#[derive(Clone, Default)]
pub struct StaticDirectory {
    users: Arc<HashMap<String, IdentityRecord>>,
}

impl StaticDirectory {
    pub fn new(records: impl IntoIterator<Item = IdentityRecord>) -> Self {
        let users = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            users: Arc::new(users),
        }
    }

    /// Load a JSON array of identity records
    pub async fn from_file(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Config(format!("Failed to read user directory {:?}: {}", path, e))
        })?;
        let records: Vec<IdentityRecord> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Config(format!("Invalid user directory {:?}: {}", path, e))
        })?;

        info!("Loaded {} user(s) from {:?}", records.len(), path);
        Ok(Self::new(records))
    }
}

#[async_trait]
impl IdentityLookup for StaticDirectory {
    async fn get_users(&self, ids: &[String], limit: usize) -> AppResult<Vec<IdentityRecord>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).cloned())
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn alice() -> IdentityRecord {
        IdentityRecord {
            id: "user_alice".to_string(),
            username: Some("alice".to_string()),
            external_username: None,
            image_url: "https://img.example.com/alice.png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unknown_ids_are_absent() {
        let directory = StaticDirectory::new([alice()]);
        let ids = vec!["user_alice".to_string(), "user_ghost".to_string()];

        let users = directory.get_users(&ids, 100).await.unwrap();
        assert_eq!(users, vec![alice()]);
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(
            &path,
            r#"[{"id":"user_alice","username":"alice","imageUrl":"https://img.example.com/alice.png"}]"#,
        )
        .unwrap();

        let directory = StaticDirectory::from_file(&path).await.unwrap();
        let users = directory
            .get_users(&["user_alice".to_string()], 100)
            .await
            .unwrap();
        assert_eq!(users, vec![alice()]);
    }

    #[tokio::test]
    async fn test_from_missing_file() {
        let dir = tempdir().unwrap();
        let result = StaticDirectory::from_file(&dir.path().join("nope.json")).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
