//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the session layer and external
//! systems. Each port is a trait implemented by an adapter in the
//! infrastructure crate, or by a hand-written fake in tests.

mod clock;
mod identity_service;
mod session_cache;
mod token_source;

pub use clock::{Clock, SystemClock};
pub use identity_service::{
    AuthOutcome, IdentityService, ProviderError, SignUpResponse, UserProfile,
};
pub use session_cache::{PersistedSession, SessionCache, SessionCacheError};
pub use token_source::TokenSource;
