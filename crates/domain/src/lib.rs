//! HTS Classify Domain - Core client types
//!
//! This crate defines the data model shared by the session provider and the
//! classification API client. All types here are pure Rust with no I/O
//! dependencies.

pub mod auth;
pub mod classification;
pub mod error;
pub mod history;

pub use auth::{
    Credentials, JwtClaims, RegistrationOutcome, SessionSnapshot, SessionTokens, UserAttributes,
    decode_claims,
};
pub use classification::{
    Classification, ClassificationRequest, ClassificationResult, CodeDescription, HtsStructure,
};
pub use error::{ClientError, ClientResult, DomainError, DomainResult, ErrorKind, ProviderCode};
pub use history::{
    ClassificationRecord, ClassificationUpdate, HistoryQuery, PagedResponse, PagedResult, UserStats,
};
