//! HTS Classify Application - Session lifecycle and ports
//!
//! This crate defines the application layer with:
//! - Port traits for the identity service, session cache, token source and clock
//! - The session provider, which owns the session lifecycle and translates
//!   identity-provider failures into the client error taxonomy

pub mod ports;
pub mod session;

pub use ports::{
    AuthOutcome, Clock, IdentityService, PersistedSession, ProviderError, SessionCache,
    SessionCacheError, SignUpResponse, SystemClock, TokenSource, UserProfile,
};
pub use session::{ActiveSession, SessionContext, SessionProvider, map_provider_error};
