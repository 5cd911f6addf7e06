//! HTS Classify Infrastructure - Adapters and wiring
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus the classification API client:
//! - Cognito user-pool identity service over its JSON API
//! - Classification/history API client with typed error mapping
//! - File-backed session cache
//! - Configuration loading and tracing setup

pub mod api;
pub mod client;
pub mod config;
pub mod identity;
pub mod persistence;
pub mod telemetry;

pub use api::ApiClient;
pub use client::HtsClient;
pub use config::{
    ApiSettings, ClientSettings, ConfigError, DEFAULT_API_URL, IdentitySettings, SessionSettings,
};
pub use identity::CognitoIdentityService;
pub use persistence::FileSessionCache;
pub use telemetry::init_tracing;
