//! Authentication domain types

mod jwt;
mod types;

pub use jwt::{JwtClaims, decode_claims};
pub use types::{Credentials, RegistrationOutcome, SessionSnapshot, SessionTokens, UserAttributes};
