//! Provider error translation.

use hts_domain::{ClientError, ProviderCode};

use crate::ports::ProviderError;

/// Translates an identity-service failure into a client error.
///
/// This is the only place provider error shapes are inspected.
#[must_use]
pub fn map_provider_error(error: ProviderError) -> ClientError {
    match error {
        ProviderError::Service { code, message } => {
            let code = ProviderCode::from_provider(&code);
            let message = if message.is_empty() {
                code.user_message()
                    .map_or_else(|| code.to_string(), str::to_string)
            } else {
                message
            };
            ClientError::from_code(code, message)
        }
        ProviderError::Transport(message) => ClientError::network(message),
        ProviderError::InvalidResponse(message) => ClientError::unknown(message),
    }
}
