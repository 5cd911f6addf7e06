//! Token source port

use std::sync::Arc;

use async_trait::async_trait;
use hts_domain::ClientResult;

/// Supplies the bearer token for outbound API requests.
///
/// Implementations must look the token up on every call rather than hand out
/// a copy captured earlier, so a lapsed session is noticed per request.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a bearer token for the active session.
    ///
    /// # Errors
    ///
    /// Returns an auth error when no valid session exists.
    async fn bearer_token(&self) -> ClientResult<String>;
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn bearer_token(&self) -> ClientResult<String> {
        (**self).bearer_token().await
    }
}
