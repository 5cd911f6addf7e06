//! Identity service port
//!
//! The managed identity provider as seen by the session layer. Methods map
//! one-to-one onto provider actions and report failures as the provider
//! describes them; translation into client errors happens in the session
//! provider, never here.

use async_trait::async_trait;
use hts_domain::{SessionTokens, UserAttributes};

/// Failure reported by an identity service adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with an error code.
    #[error("{code}: {message}")]
    Service {
        /// Provider error code, e.g. `NotAuthorizedException`.
        code: String,
        /// Provider message.
        message: String,
    },

    /// No response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered but the response could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Creates a service error.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Provider response to a sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpResponse {
    /// Whether the account is already confirmed (no verification needed).
    pub user_confirmed: bool,
    /// Provider user id.
    pub user_sub: Option<String>,
}

/// Provider response to a password sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credentials accepted; tokens issued.
    Authenticated(SessionTokens),
    /// The provider requires another step (e.g. `NEW_PASSWORD_REQUIRED`).
    Challenge {
        /// Provider challenge name.
        name: String,
    },
}

/// Account details fetched with an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Provider username.
    pub username: String,
    /// Attribute snapshot.
    pub attributes: UserAttributes,
}

/// Port for the managed identity service.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Creates an unconfirmed account and triggers a verification message.
    async fn sign_up(
        &self,
        username: &str,
        password: &str,
        attributes: &UserAttributes,
    ) -> Result<SignUpResponse, ProviderError>;

    /// Confirms an account with the emailed code.
    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), ProviderError>;

    /// Sends the verification code again.
    async fn resend_confirmation_code(&self, username: &str) -> Result<(), ProviderError>;

    /// Exchanges a username (or email alias) and password for tokens.
    async fn initiate_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, ProviderError>;

    /// Exchanges a refresh token for new id and access tokens.
    ///
    /// The returned set carries the refresh token to keep using, which may be
    /// the one passed in.
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, ProviderError>;

    /// Fetches the account behind an access token.
    async fn get_user(&self, access_token: &str) -> Result<UserProfile, ProviderError>;

    /// Starts the forgot-password flow; a reset code is sent out of band.
    async fn forgot_password(&self, username: &str) -> Result<(), ProviderError>;

    /// Sets a new password using the reset code.
    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), ProviderError>;

    /// Changes the password of the account behind an access token.
    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ProviderError>;
}
