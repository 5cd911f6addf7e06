//! Session and account types

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::jwt::decode_claims;

/// Seconds of clock skew tolerated when judging token expiry.
pub const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Email and password pair. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email, also usable as the sign-in alias.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tokens issued by a successful sign-in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    /// Identity token; the bearer credential sent to the classification API.
    pub id_token: String,
    /// Access token; authorises calls back to the identity provider.
    pub access_token: String,
    /// Long-lived token used to renew the other two.
    pub refresh_token: String,
}

impl SessionTokens {
    /// Creates a token set.
    pub fn new(
        id_token: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            id_token: id_token.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Returns true if both the id and access token are unexpired at `now`.
    ///
    /// Tokens that cannot be decoded count as expired.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let skew = Duration::seconds(EXPIRY_SKEW_SECONDS);
        [&self.id_token, &self.access_token]
            .into_iter()
            .all(|token| decode_claims(token).is_ok_and(|c| !c.is_expired_at(now, skew)))
    }

    /// Returns true if the tokens are valid right now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Returns true if a refresh can be attempted.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Short prefix of a token for log output.
    #[must_use]
    pub fn preview(token: &str) -> String {
        if token.chars().count() > 12 {
            let head: String = token.chars().take(8).collect();
            format!("{head}...")
        } else {
            "***".to_string()
        }
    }
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("id_token", &Self::preview(&self.id_token))
            .field("access_token", &Self::preview(&self.access_token))
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// User attributes keyed by attribute name (`email`, `name`, `sub`, ...).
pub type UserAttributes = BTreeMap<String, String>;

/// Attributes of the active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Provider username of the signed-in account.
    pub username: String,
    /// Attribute snapshot fetched for this call.
    pub attributes: UserAttributes,
}

impl SessionSnapshot {
    /// The `email` attribute, if present.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.attributes.get("email").map(String::as_str)
    }

    /// The `name` attribute, if present.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.attributes.get("name").map(String::as_str)
    }
}

/// Result of starting account registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    /// True until the out-of-band verification code is confirmed.
    pub pending_verification: bool,
    /// Provider-compatible identifier to use for verification and resends.
    /// Not necessarily equal to the email.
    pub identifier: String,
    /// Provider user id, when returned.
    pub user_sub: Option<String>,
}

impl RegistrationOutcome {
    /// Derives a registration identifier from an email address.
    ///
    /// The pool signs users in by email alias but requires a distinct
    /// username at sign-up, so the local part is prefixed and suffixed with
    /// the registration time in milliseconds. Malformed addresses still get
    /// an identifier; rejecting them is left to the provider.
    #[must_use]
    pub fn synthesize_identifier(email: &str, at: DateTime<Utc>) -> String {
        let local = email.split('@').next().unwrap_or_default().trim();
        if local.is_empty() {
            format!("user_{}", at.timestamp_millis())
        } else {
            format!("user_{local}_{}", at.timestamp_millis())
        }
    }
}
