//! Persisted client state (the dashboard's cookie jar and local storage).
//!
//! Values are stored as JSON in a single sqlite table keyed by name. The two
//! session cookies (`user-token`, `refresh-token`) live in the same table and
//! are exposed through [`PersistentTokenStore`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use zhex_auth::{Credentials, TokenStore, TokenStoreError};

/// Cookie holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "user-token";
/// Cookie holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh-token";

const UPSERT: &str = r#"
    INSERT INTO client_state (key, value, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(key)
    DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at
"#;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend failed: {0:#}")]
    Backend(#[from] anyhow::Error),
    #[error("stored value for {key:?} could not be decoded: {reason}")]
    Corrupt { key: String, reason: String },
}

/// SQLite-backed key/value store for client state.
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state directory at {:?}", parent))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open state database at {:?}", path))?;

        Self::with_pool(pool).await
    }

    /// A private in-memory store (tests, throwaway sessions).
    pub async fn in_memory() -> Result<Self, StorageError> {
        // One connection: every new connection to :memory: is a new database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory state database")?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS client_state (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create client_state table")?;

        Ok(Self { pool })
    }

    pub async fn get<T>(&self, key: &str) -> Result<Option<T>, StorageError>
    where
        T: DeserializeOwned,
    {
        let row = sqlx::query(
            r#"
            SELECT value
            FROM client_state
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to read {key:?} from state"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.try_get("value").context("state row without value")?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), StorageError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize {key:?} for state"))?;

        sqlx::query(UPSERT)
            .bind(key)
            .bind(&payload)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to write {key:?} to state"))?;

        Ok(())
    }

    /// Write several keys atomically: either every entry is stored or none is.
    pub async fn set_all<T>(&self, entries: &[(&str, &T)]) -> Result<(), StorageError>
    where
        T: Serialize + ?Sized,
    {
        let mut payloads = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let payload = serde_json::to_string(value)
                .with_context(|| format!("failed to serialize {key:?} for state"))?;
            payloads.push((*key, payload));
        }
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await.context("failed to begin state transaction")?;
        for (key, payload) in &payloads {
            sqlx::query(UPSERT)
                .bind(*key)
                .bind(payload)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to write {key:?} to state"))?;
        }
        tx.commit().await.context("failed to commit state transaction")?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM client_state WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to remove {key:?} from state"))?;
        Ok(())
    }

    /// Remove several keys atomically.
    pub async fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.context("failed to begin state transaction")?;
        for key in keys {
            sqlx::query("DELETE FROM client_state WHERE key = ?1")
                .bind(*key)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to remove {key:?} from state"))?;
        }
        tx.commit().await.context("failed to commit state transaction")?;
        Ok(())
    }

    /// Drop every stored value.
    pub async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM client_state")
            .execute(&self.pool)
            .await
            .context("failed to clear state")?;
        Ok(())
    }

    /// Typed handle over one key.
    pub fn persisted<T>(&self, key: impl Into<String>, default: T) -> PersistedState<T>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        PersistedState {
            store: self.clone(),
            key: key.into(),
            default,
        }
    }
}

/// A single persisted value with a fallback default.
#[derive(Debug, Clone)]
pub struct PersistedState<T> {
    store: LocalStore,
    key: String,
    default: T,
}

impl<T> PersistedState<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored value, or the default when nothing (or something unreadable) is stored.
    pub async fn load(&self) -> Result<T, StorageError> {
        match self.store.get(&self.key).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Ok(self.default.clone()),
            Err(StorageError::Corrupt { key, reason }) => {
                tracing::warn!(%key, %reason, "discarding unreadable persisted value");
                Ok(self.default.clone())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, value: &T) -> Result<(), StorageError> {
        self.store.set(&self.key, value).await
    }

    pub async fn reset(&self) -> Result<(), StorageError> {
        self.store.remove(&self.key).await
    }
}

/// [`TokenStore`] persisted as the two session cookies.
#[derive(Debug, Clone)]
pub struct PersistentTokenStore {
    store: LocalStore,
}

impl PersistentTokenStore {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }
}

fn backend(err: StorageError) -> TokenStoreError {
    TokenStoreError::Backend(err.to_string())
}

#[async_trait]
impl TokenStore for PersistentTokenStore {
    async fn access_token(&self) -> Result<Option<String>, TokenStoreError> {
        self.store.get(ACCESS_TOKEN_KEY).await.map_err(backend)
    }

    async fn refresh_token(&self) -> Result<Option<String>, TokenStoreError> {
        self.store.get(REFRESH_TOKEN_KEY).await.map_err(backend)
    }

    async fn store(&self, credentials: &Credentials) -> Result<(), TokenStoreError> {
        self.store
            .set_all(&[
                (ACCESS_TOKEN_KEY, credentials.access_token.as_str()),
                (REFRESH_TOKEN_KEY, credentials.refresh_token.as_str()),
            ])
            .await
            .map_err(backend)
    }

    async fn set_access_token(&self, token: String) -> Result<(), TokenStoreError> {
        self.store.set(ACCESS_TOKEN_KEY, &token).await.map_err(backend)
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        self.store
            .remove_all(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
            .await
            .map_err(backend)
    }
}

/// Resolve the default state database path: `{app_data_dir}/zhex/state.db`.
pub fn default_state_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut path = base;
    path.push("zhex");
    path.push("state.db");
    Ok(path)
}
