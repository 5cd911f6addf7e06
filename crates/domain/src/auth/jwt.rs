//! JWT claim inspection.
//!
//! Tokens issued by the identity provider are treated as opaque bearer
//! credentials. The only thing read from them locally is their expiry, so a
//! lapsed session is detected before a request is sent. Signatures are not
//! verified; the remote API does that.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::{DomainError, DomainResult};

/// Claims read from a token payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JwtClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Issue time, seconds since the Unix epoch.
    #[serde(default)]
    pub iat: Option<i64>,
    /// Subject (the provider's user id).
    #[serde(default)]
    pub sub: Option<String>,
    /// Provider username, present on Cognito id tokens.
    #[serde(default, rename = "cognito:username")]
    pub username: Option<String>,
    /// Email claim, present on id tokens.
    #[serde(default)]
    pub email: Option<String>,
    /// `id` or `access`.
    #[serde(default)]
    pub token_use: Option<String>,
}

impl JwtClaims {
    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Returns true if the token is expired at `now`, or will be within `skew`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at().is_none_or(|exp| now + skew >= exp)
    }
}

/// Decodes the payload of a JWT without validating its signature.
///
/// # Errors
///
/// Returns [`DomainError::InvalidToken`] if the token does not have three
/// segments or the payload is not base64url-encoded JSON with an `exp` claim.
pub fn decode_claims(token: &str) -> DomainResult<JwtClaims> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(DomainError::InvalidToken("expected three segments".to_string()));
    };

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DomainError::InvalidToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| DomainError::InvalidToken(format!("payload is not valid claims: {e}")))
}
