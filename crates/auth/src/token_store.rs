//! Where the session credentials live between requests.

use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::Credentials;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenStoreError {
    /// The backing storage could not be read or written.
    #[error("token storage failed: {0}")]
    Backend(String),

    /// Internal lock poisoning.
    #[error("token storage lock poisoned")]
    Poisoned,
}

/// Storage seam for the access/refresh token pair.
///
/// Implementations must be safe to share across tasks; the HTTP gateway and
/// the realtime channel both read from the same store.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn access_token(&self) -> Result<Option<String>, TokenStoreError>;

    async fn refresh_token(&self) -> Result<Option<String>, TokenStoreError>;

    /// Store both tokens (successful login).
    async fn store(&self, credentials: &Credentials) -> Result<(), TokenStoreError>;

    /// Replace the access token only (successful refresh).
    async fn set_access_token(&self, token: String) -> Result<(), TokenStoreError>;

    /// Remove both tokens (logout or unrecoverable refresh failure).
    async fn clear(&self) -> Result<(), TokenStoreError>;
}

/// In-memory token store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    inner: RwLock<Slots>,
}

#[derive(Debug, Default)]
struct Slots {
    access: Option<String>,
    refresh: Option<String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: &Credentials) -> Self {
        Self {
            inner: RwLock::new(Slots {
                access: Some(credentials.access_token.clone()),
                refresh: Some(credentials.refresh_token.clone()),
            }),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn access_token(&self) -> Result<Option<String>, TokenStoreError> {
        let slots = self.inner.read().map_err(|_| TokenStoreError::Poisoned)?;
        Ok(slots.access.clone())
    }

    async fn refresh_token(&self) -> Result<Option<String>, TokenStoreError> {
        let slots = self.inner.read().map_err(|_| TokenStoreError::Poisoned)?;
        Ok(slots.refresh.clone())
    }

    async fn store(&self, credentials: &Credentials) -> Result<(), TokenStoreError> {
        let mut slots = self.inner.write().map_err(|_| TokenStoreError::Poisoned)?;
        slots.access = Some(credentials.access_token.clone());
        slots.refresh = Some(credentials.refresh_token.clone());
        Ok(())
    }

    async fn set_access_token(&self, token: String) -> Result<(), TokenStoreError> {
        let mut slots = self.inner.write().map_err(|_| TokenStoreError::Poisoned)?;
        slots.access = Some(token);
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        let mut slots = self.inner.write().map_err(|_| TokenStoreError::Poisoned)?;
        slots.access = None;
        slots.refresh = None;
        tracing::debug!("session tokens cleared");
        Ok(())
    }
}
