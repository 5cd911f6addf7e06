//! Session cache port
//!
//! Persists the active session across restarts. The cache is written on
//! sign-in and token renewal, cleared on sign-out or expiry.

use async_trait::async_trait;
use hts_domain::SessionTokens;
use serde::{Deserialize, Serialize};

/// Errors that can occur during session cache operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionCacheError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No location is available to store the cache.
    #[error("no session cache location available")]
    NoLocation,
}

/// A session as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    /// Provider username.
    pub username: String,
    /// Tokens issued at sign-in or last renewal.
    pub tokens: SessionTokens,
}

/// Repository trait for session persistence.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Loads the cached session, `None` if nothing is cached.
    async fn load(&self) -> Result<Option<PersistedSession>, SessionCacheError>;

    /// Replaces the cached session.
    async fn save(&self, session: &PersistedSession) -> Result<(), SessionCacheError>;

    /// Removes the cached session. Succeeds if nothing is cached.
    async fn clear(&self) -> Result<(), SessionCacheError>;
}
