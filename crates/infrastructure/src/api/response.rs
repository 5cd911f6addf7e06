//! Mapping of classification API responses onto [`ClientError`].

use hts_domain::{ClientError, ErrorKind, ProviderCode};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Extracts the `message` field of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

/// Classifies a non-2xx response.
///
/// Only a 4xx whose body carries a JSON `message` is attributed to the
/// caller (401/403 as auth, the rest as validation). Anything else, including
/// a 401 with an empty or non-JSON body, is unknown. `fallback` is used as
/// the message when the body carries none.
pub(crate) fn status_error(status: StatusCode, body: &str, fallback: &str) -> ClientError {
    let message = error_message(body);
    let kind = match (status.as_u16(), &message) {
        (401 | 403, Some(_)) => ErrorKind::Auth,
        (400..=499, Some(_)) => ErrorKind::Validation,
        _ => ErrorKind::Unknown,
    };
    ClientError::new(kind, message.unwrap_or_else(|| fallback.to_string()))
        .with_code(ProviderCode::HttpStatus(status.as_u16()))
}

/// Decodes a 2xx body, treating anything undecodable as an unknown error.
pub(crate) fn decode<T: DeserializeOwned>(body: &str, fallback: &str) -> Result<T, ClientError> {
    serde_json::from_str(body)
        .map_err(|e| ClientError::unknown(format!("{fallback}: unexpected response ({e})")))
}
