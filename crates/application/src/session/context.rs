//! Explicit session state.
//!
//! Holds the signed-in account and its tokens. A `SessionContext` is a cheap
//! cloneable handle; clones share the same state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hts_domain::SessionTokens;
use tokio::sync::RwLock;

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Provider username the session belongs to.
    pub username: String,
    /// Current token set.
    pub tokens: SessionTokens,
    /// When the tokens were issued or last renewed.
    pub established_at: DateTime<Utc>,
}

/// Thread-safe holder of the active session.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    active: Arc<RwLock<Option<ActiveSession>>>,
}

impl SessionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `tokens` the active session, replacing any previous one.
    pub async fn establish(&self, username: String, tokens: SessionTokens, at: DateTime<Utc>) {
        let mut active = self.active.write().await;
        *active = Some(ActiveSession {
            username,
            tokens,
            established_at: at,
        });
    }

    /// Drops the active session. Returns true if one existed.
    pub async fn clear(&self) -> bool {
        let mut active = self.active.write().await;
        active.take().is_some()
    }

    /// Drops the session only if it is still exactly `seen`.
    ///
    /// Returns false if the session was ended, replaced or renewed since
    /// `seen` was read.
    pub(crate) async fn clear_if_unchanged(&self, seen: &ActiveSession) -> bool {
        let mut active = self.active.write().await;
        if active.as_ref() == Some(seen) {
            *active = None;
            true
        } else {
            false
        }
    }

    /// Replaces the tokens of a session that is still exactly `seen`.
    ///
    /// Returns false, leaving the context untouched, if the session was ended,
    /// replaced or renewed while the renewal was in flight.
    pub(crate) async fn renew(
        &self,
        seen: &ActiveSession,
        tokens: SessionTokens,
        at: DateTime<Utc>,
    ) -> bool {
        let mut active = self.active.write().await;
        match active.as_mut() {
            Some(session) if *session == *seen => {
                session.tokens = tokens;
                session.established_at = at;
                true
            }
            _ => false,
        }
    }

    /// Returns a copy of the active session.
    pub async fn current(&self) -> Option<ActiveSession> {
        self.active.read().await.clone()
    }

    /// Returns true if a session is held, without checking expiry.
    pub async fn is_active(&self) -> bool {
        self.active.read().await.is_some()
    }
}
