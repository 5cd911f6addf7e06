//! Error types
//!
//! `ClientError` is the closed taxonomy every public operation fails with.
//! Provider and transport failures are translated into it once, at the
//! adapter boundary; callers branch on [`ErrorKind`] and [`ProviderCode`]
//! without knowing which identity backend or HTTP stack produced them.

use std::fmt;

use thiserror::Error;

/// Domain-level errors raised while inspecting values locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A token is not a well-formed JWT.
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Category of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No or expired session, invalid credentials, unconfirmed or unknown account.
    Auth,
    /// The remote side rejected the input (bad code, password policy, 4xx).
    Validation,
    /// Transport-level failure: no response was received.
    Network,
    /// Anything not classified above, including malformed error bodies.
    Unknown,
}

impl ErrorKind {
    /// Returns the canonical name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "AuthError",
            Self::Validation => "ValidationError",
            Self::Network => "NetworkError",
            Self::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific condition carried alongside a [`ClientError`].
///
/// Recognised identity-provider codes are mapped to named variants so that
/// callers can tell e.g. an unconfirmed account from bad credentials.
/// Unrecognised codes are kept verbatim in [`ProviderCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderCode {
    /// No session is active.
    NoSession,
    /// The active session lapsed and could not be renewed.
    SessionExpired,
    /// Incorrect username or password, or an operation not permitted.
    NotAuthorized,
    /// The account exists but its email was never verified.
    UserNotConfirmed,
    /// No account matches the given identifier.
    UserNotFound,
    /// The provider requires a password reset before sign-in.
    PasswordResetRequired,
    /// The provider answered sign-in with a new-password challenge.
    NewPasswordRequired,
    /// The verification code does not match.
    CodeMismatch,
    /// The verification code has expired.
    CodeExpired,
    /// The account identifier is already taken.
    UsernameExists,
    /// The email is already used by another account.
    AliasExists,
    /// The password violates the pool's password policy.
    InvalidPassword,
    /// A parameter was rejected as malformed.
    InvalidParameter,
    /// Too many code deliveries or attempts.
    LimitExceeded,
    /// Request rate too high.
    TooManyRequests,
    /// Too many failed verification attempts.
    TooManyFailedAttempts,
    /// HTTP status reported by the classification API.
    HttpStatus(u16),
    /// Any other provider code, verbatim.
    Other(String),
}

impl ProviderCode {
    /// Parses a raw identity-provider error code.
    ///
    /// Accepts both the bare exception name (`NotAuthorizedException`) and
    /// the namespaced form (`com.amazonaws...#NotAuthorizedException`).
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        let name = raw.rsplit('#').next().unwrap_or(raw).trim();
        match name {
            "NotAuthorizedException" => Self::NotAuthorized,
            "UserNotConfirmedException" => Self::UserNotConfirmed,
            "UserNotFoundException" => Self::UserNotFound,
            "PasswordResetRequiredException" => Self::PasswordResetRequired,
            "CodeMismatchException" => Self::CodeMismatch,
            "ExpiredCodeException" => Self::CodeExpired,
            "UsernameExistsException" => Self::UsernameExists,
            "AliasExistsException" => Self::AliasExists,
            "InvalidPasswordException" => Self::InvalidPassword,
            "InvalidParameterException" => Self::InvalidParameter,
            "LimitExceededException" => Self::LimitExceeded,
            "TooManyRequestsException" => Self::TooManyRequests,
            "TooManyFailedAttemptsException" => Self::TooManyFailedAttempts,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the error kind this provider code belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSession
            | Self::SessionExpired
            | Self::NotAuthorized
            | Self::UserNotConfirmed
            | Self::UserNotFound
            | Self::PasswordResetRequired
            | Self::NewPasswordRequired => ErrorKind::Auth,
            Self::CodeMismatch
            | Self::CodeExpired
            | Self::UsernameExists
            | Self::AliasExists
            | Self::InvalidPassword
            | Self::InvalidParameter
            | Self::LimitExceeded
            | Self::TooManyRequests
            | Self::TooManyFailedAttempts => ErrorKind::Validation,
            Self::HttpStatus(status) => match *status {
                401 | 403 => ErrorKind::Auth,
                400..=499 => ErrorKind::Validation,
                _ => ErrorKind::Unknown,
            },
            Self::Other(_) => ErrorKind::Unknown,
        }
    }

    /// A message suitable for showing to an end user, when one is known.
    #[must_use]
    pub const fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::NoSession => Some("You are not signed in."),
            Self::SessionExpired => Some("Your session has expired. Please sign in again."),
            Self::NotAuthorized => Some("Incorrect email or password. Please try again."),
            Self::UserNotConfirmed => Some(
                "Please verify your email address. Check your inbox for the verification code.",
            ),
            Self::UserNotFound => Some("No account found with this email address."),
            Self::CodeMismatch => Some("Invalid verification code. Please check and try again."),
            Self::CodeExpired => Some("Verification code has expired. Please request a new one."),
            Self::UsernameExists | Self::AliasExists => {
                Some("An account with this email already exists. Please try logging in.")
            }
            Self::InvalidPassword => Some(
                "Password does not meet requirements. Use at least 8 characters with uppercase, lowercase, numbers, and special characters.",
            ),
            Self::InvalidParameter => {
                Some("Invalid email or password format. Please check your input.")
            }
            _ => None,
        }
    }
}

impl fmt::Display for ProviderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => f.write_str("NoSession"),
            Self::SessionExpired => f.write_str("SessionExpired"),
            Self::NotAuthorized => f.write_str("NotAuthorized"),
            Self::UserNotConfirmed => f.write_str("UserNotConfirmed"),
            Self::UserNotFound => f.write_str("UserNotFound"),
            Self::PasswordResetRequired => f.write_str("PasswordResetRequired"),
            Self::NewPasswordRequired => f.write_str("NewPasswordRequired"),
            Self::CodeMismatch => f.write_str("CodeMismatch"),
            Self::CodeExpired => f.write_str("CodeExpired"),
            Self::UsernameExists => f.write_str("UsernameExists"),
            Self::AliasExists => f.write_str("AliasExists"),
            Self::InvalidPassword => f.write_str("InvalidPassword"),
            Self::InvalidParameter => f.write_str("InvalidParameter"),
            Self::LimitExceeded => f.write_str("LimitExceeded"),
            Self::TooManyRequests => f.write_str("TooManyRequests"),
            Self::TooManyFailedAttempts => f.write_str("TooManyFailedAttempts"),
            Self::HttpStatus(status) => write!(f, "Http{status}"),
            Self::Other(code) => f.write_str(code),
        }
    }
}

/// The error every session and API operation fails with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ClientError {
    /// Category the caller branches on.
    pub kind: ErrorKind,
    /// Human-readable message suitable for direct display.
    pub message: String,
    /// Provider-specific condition, when one was reported.
    pub provider_code: Option<ProviderCode>,
}

impl ClientError {
    /// Creates an error of the given kind with no provider code.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider_code: None,
        }
    }

    /// Creates an error whose kind is derived from the provider code.
    pub fn from_code(code: ProviderCode, message: impl Into<String>) -> Self {
        Self {
            kind: code.kind(),
            message: message.into(),
            provider_code: Some(code),
        }
    }

    /// Creates an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Creates an unclassified error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// No session is active.
    #[must_use]
    pub fn no_session() -> Self {
        Self::from_code(ProviderCode::NoSession, "No user logged in")
    }

    /// The session lapsed and could not be renewed.
    #[must_use]
    pub fn session_expired() -> Self {
        Self::from_code(ProviderCode::SessionExpired, "Session expired")
    }

    /// Attaches a provider code without changing the kind.
    #[must_use]
    pub fn with_code(mut self, code: ProviderCode) -> Self {
        self.provider_code = Some(code);
        self
    }

    /// Returns true if the error carries the given provider code.
    #[must_use]
    pub fn has_code(&self, code: &ProviderCode) -> bool {
        self.provider_code.as_ref() == Some(code)
    }

    /// Returns true when the error means the caller should sign in again.
    ///
    /// Pure classification over kind and message: auth-kind errors always
    /// qualify; other kinds qualify when the message mentions an
    /// authorization problem.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        if self.kind == ErrorKind::Auth {
            return true;
        }
        let message = self.message.to_lowercase();
        message.contains("unauthorized")
            || message.contains("token")
            || message.contains("authentication")
    }

    /// The friendliest available message for this error.
    #[must_use]
    pub fn display_message(&self) -> &str {
        self.provider_code
            .as_ref()
            .and_then(ProviderCode::user_message)
            .unwrap_or(&self.message)
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
