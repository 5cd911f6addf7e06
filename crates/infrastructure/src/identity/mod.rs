//! Identity provider adapters.

mod cognito;

pub use cognito::CognitoIdentityService;
