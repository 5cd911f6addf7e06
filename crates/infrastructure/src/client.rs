//! Wiring of the session provider and API client from settings.

use std::sync::Arc;

use hts_application::{SessionCache, SessionProvider, TokenSource};
use tracing::info;

use crate::api::ApiClient;
use crate::config::{ClientSettings, ConfigError};
use crate::identity::CognitoIdentityService;
use crate::persistence::FileSessionCache;

/// A session provider and an API client sharing one session.
pub struct HtsClient {
    session: Arc<SessionProvider>,
    api: ApiClient,
}

impl HtsClient {
    /// Combines an existing provider and API client.
    #[must_use]
    pub const fn new(session: Arc<SessionProvider>, api: ApiClient) -> Self {
        Self { session, api }
    }

    /// Builds the Cognito-backed client described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if settings are incomplete or an adapter
    /// cannot be constructed.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        let endpoint = settings.identity_endpoint()?;
        let identity = CognitoIdentityService::new(
            endpoint.clone(),
            settings.identity.client_id.clone(),
            settings.api_timeout(),
        )
        .map_err(|e| ConfigError::Init {
            component: "identity service",
            message: e.to_string(),
        })?;

        let mut provider = SessionProvider::new(Arc::new(identity));
        if settings.session.persist {
            let cache = match &settings.session.cache_path {
                Some(path) => FileSessionCache::new(path.clone()),
                None => FileSessionCache::at_default_location().map_err(|e| ConfigError::Init {
                    component: "session cache",
                    message: e.to_string(),
                })?,
            };
            let cache: Arc<dyn SessionCache> = Arc::new(cache);
            provider = provider.with_cache(cache);
        }
        let session = Arc::new(provider);

        let tokens: Arc<dyn TokenSource> = session.clone();
        let api = ApiClient::new(settings.api_base_url()?, tokens, settings.api_timeout())
            .map_err(|e| ConfigError::Init {
                component: "API client",
                message: e.to_string(),
            })?;

        info!(
            api = %api.base_url(),
            identity = %endpoint,
            persist = settings.session.persist,
            "Client configured"
        );
        Ok(Self::new(session, api))
    }

    /// Loads a persisted session, if any. Returns true if one was restored.
    pub async fn restore_session(&self) -> bool {
        self.session.restore().await
    }

    /// The session provider.
    #[must_use]
    pub fn session(&self) -> &SessionProvider {
        &self.session
    }

    /// The classification API client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }
}
