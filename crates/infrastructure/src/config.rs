//! Client configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. an optional `hts-classify.{toml,yaml,json}` file (or an explicit path)
//! 3. `HTS_`-prefixed environment variables, nested with `__`
//!    (`HTS_API__BASE_URL`, `HTS_IDENTITY__CLIENT_ID`, ...)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::identity::CognitoIdentityService;

/// Default API root, matching a locally running backend.
pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";

/// Base name of the optional configuration file.
const CONFIG_FILE: &str = "hts-classify";

/// Errors raised while loading or interpreting configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A required setting is empty.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// A URL setting does not parse.
    #[error("invalid URL in `{field}`: {source}")]
    InvalidUrl {
        /// Setting name.
        field: &'static str,
        /// Parse failure.
        source: url::ParseError,
    },

    /// No identity endpoint could be derived from the pool id.
    #[error("no region in user pool id `{0}`; set identity.region or identity.endpoint")]
    NoRegion(String),

    /// An adapter could not be constructed.
    #[error("failed to initialise {component}: {message}")]
    Init {
        /// Component that failed.
        component: &'static str,
        /// Failure description.
        message: String,
    },
}

/// Classification API settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiSettings {
    /// API root, including the `/api` prefix.
    pub base_url: String,
    /// Optional request timeout; the transport default applies otherwise.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Identity provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentitySettings {
    /// User pool id, e.g. `us-east-1_AbC123`.
    #[serde(default)]
    pub user_pool_id: String,
    /// App client id of the pool.
    #[serde(default)]
    pub client_id: String,
    /// Region override; derived from the pool id when absent.
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint override, e.g. for a local emulator.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Session persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionSettings {
    /// Whether the session survives restarts.
    pub persist: bool,
    /// Cache file; the platform config directory is used when absent.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

/// All client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSettings {
    /// Classification API.
    pub api: ApiSettings,
    /// Identity provider.
    pub identity: IdentitySettings,
    /// Session persistence.
    pub session: SessionSettings,
}

impl ClientSettings {
    /// Loads settings from the default sources.
    ///
    /// `file` replaces the optional `hts-classify.*` lookup in the working
    /// directory with a required file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if a source is unreadable or a value has
    /// the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(
            file,
            Environment::with_prefix("HTS")
                .prefix_separator("_")
                .separator("__"),
        )
    }

    /// Loads settings using a caller-supplied environment source.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_with(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .set_default("api.base_url", DEFAULT_API_URL)?
            .set_default("identity.user_pool_id", "")?
            .set_default("identity.client_id", "")?
            .set_default("session.persist", true)?
            .add_source(file)
            .add_source(env.try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parsed API root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `api.base_url` does not parse.
    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.api.base_url).map_err(|source| ConfigError::InvalidUrl {
            field: "api.base_url",
            source,
        })
    }

    /// Request timeout, if configured.
    #[must_use]
    pub fn api_timeout(&self) -> Option<Duration> {
        self.api.timeout_secs.map(Duration::from_secs)
    }

    /// Endpoint of the identity provider.
    ///
    /// An explicit endpoint wins, then an explicit region, then the region
    /// prefix of the pool id.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is malformed or no region is known.
    pub fn identity_endpoint(&self) -> Result<Url, ConfigError> {
        let identity = &self.identity;
        if let Some(endpoint) = identity.endpoint.as_deref().filter(|e| !e.is_empty()) {
            return Url::parse(endpoint).map_err(|source| ConfigError::InvalidUrl {
                field: "identity.endpoint",
                source,
            });
        }
        if let Some(region) = identity.region.as_deref().filter(|r| !r.is_empty()) {
            return Url::parse(&format!("https://cognito-idp.{region}.amazonaws.com/")).map_err(
                |source| ConfigError::InvalidUrl {
                    field: "identity.region",
                    source,
                },
            );
        }
        CognitoIdentityService::endpoint_for_pool(&identity.user_pool_id)
            .ok_or_else(|| ConfigError::NoRegion(identity.user_pool_id.clone()))
    }

    /// Checks that required settings are present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for the first empty required setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("identity.client_id"));
        }
        if self.identity.user_pool_id.trim().is_empty() && self.identity.endpoint.is_none() {
            return Err(ConfigError::Missing("identity.user_pool_id"));
        }
        self.api_base_url()?;
        self.identity_endpoint()?;
        Ok(())
    }
}
