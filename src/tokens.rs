use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("failed to read token store at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write token store at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse token store: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Interface-only persistence for platform OAuth tokens (`platform ->
/// TokenRecord`). Performs no OAuth refresh logic itself — it's a typed
/// contract the (out-of-scope) platform adapters write to and read from.
pub struct TokenStore {
    path: PathBuf,
    records: Mutex<HashMap<String, TokenRecord>>,
}

impl TokenStore {
    pub async fn load(path: PathBuf) -> Result<Self, TokenStoreError> {
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(TokenStoreError::Read {
                    path,
                    source: e,
                })
            }
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub async fn get(&self, platform: &str) -> Option<TokenRecord> {
        self.records.lock().await.get(platform).cloned()
    }

    pub async fn put(&self, platform: &str, record: TokenRecord) -> Result<(), TokenStoreError> {
        let mut records = self.records.lock().await;
        records.insert(platform.to_string(), record);
        self.persist(&records).await
    }

    async fn persist(
        &self,
        records: &HashMap<String, TokenRecord>,
    ) -> Result<(), TokenStoreError> {
        let body = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| TokenStoreError::Write {
                path: self.path.clone(),
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::load(dir.path().join("tokens.json")).await.unwrap();
        assert!(store.get("twitch").await.is_none());
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::load(dir.path().join("tokens.json")).await.unwrap();
        let record = TokenRecord {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.put("twitch", record.clone()).await.unwrap();
        let got = store.get("twitch").await.unwrap();
        assert_eq!(got.access_token, "a");
    }
}
