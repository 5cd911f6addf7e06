//! Session module.
//!
//! This module provides:
//! - An explicit session context holding the signed-in account
//! - The session provider wrapping every identity-service flow
//! - Translation of provider failures into client errors

mod context;
mod errors;
mod provider;

pub use context::{ActiveSession, SessionContext};
pub use errors::map_provider_error;
pub use provider::SessionProvider;
