//! Session provider.
//!
//! Mediates every call to the identity service and keeps the
//! [`SessionContext`] in step with what the provider reports. Each operation
//! resolves exactly once with either a value or a [`ClientError`]; provider
//! failures are translated by [`map_provider_error`] and nowhere else.

use std::sync::Arc;

use async_trait::async_trait;
use hts_domain::{
    ClientError, ClientResult, Credentials, ErrorKind, ProviderCode, RegistrationOutcome,
    SessionSnapshot, SessionTokens, UserAttributes, decode_claims,
};
use tracing::{debug, info, warn};

use super::context::{ActiveSession, SessionContext};
use super::errors::map_provider_error;
use crate::ports::{
    AuthOutcome, Clock, IdentityService, PersistedSession, ProviderError, SessionCache,
    SystemClock, TokenSource,
};

/// Challenge name the provider uses for a forced password change.
const NEW_PASSWORD_CHALLENGE: &str = "NEW_PASSWORD_REQUIRED";

/// Uniform session surface over an identity service.
pub struct SessionProvider {
    identity: Arc<dyn IdentityService>,
    context: SessionContext,
    cache: Option<Arc<dyn SessionCache>>,
    clock: Arc<dyn Clock>,
}

impl SessionProvider {
    /// Creates a provider with an empty session and no persistence.
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self {
            identity,
            context: SessionContext::new(),
            cache: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Uses an existing session context.
    #[must_use]
    pub fn with_context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }

    /// Persists the session through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Reads time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The session context this provider mutates.
    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Loads a persisted session into the context.
    ///
    /// Returns true if a session was restored. A missing or unreadable cache
    /// leaves the context empty. Expiry is not checked here; the next token
    /// lookup renews or discards the session.
    pub async fn restore(&self) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        match cache.load().await {
            Ok(Some(persisted)) => {
                debug!(username = %persisted.username, "Restoring cached session");
                self.context
                    .establish(persisted.username, persisted.tokens, self.clock.now())
                    .await;
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read session cache");
                false
            }
        }
    }

    /// Starts account creation and triggers the verification message.
    ///
    /// The returned identifier, not the email, must be used for
    /// [`confirm_registration`](Self::confirm_registration) and
    /// [`resend_verification_code`](Self::resend_verification_code).
    ///
    /// # Errors
    ///
    /// Validation errors for a taken email, a weak password or malformed
    /// input; network errors when the provider is unreachable.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> ClientResult<RegistrationOutcome> {
        let identifier = RegistrationOutcome::synthesize_identifier(email, self.clock.now());
        let attributes = UserAttributes::from([
            ("email".to_string(), email.to_string()),
            ("name".to_string(), display_name.to_string()),
        ]);

        let response = self
            .identity
            .sign_up(&identifier, password, &attributes)
            .await
            .map_err(map_provider_error)?;

        info!(
            identifier = %identifier,
            confirmed = response.user_confirmed,
            "Registration started"
        );

        Ok(RegistrationOutcome {
            pending_verification: !response.user_confirmed,
            identifier,
            user_sub: response.user_sub,
        })
    }

    /// Activates an account with the emailed code.
    ///
    /// # Errors
    ///
    /// Validation errors with `CodeMismatch` or `CodeExpired`; an auth error
    /// when the account is already confirmed.
    pub async fn confirm_registration(&self, identifier: &str, code: &str) -> ClientResult<()> {
        self.identity
            .confirm_sign_up(identifier, code.trim())
            .await
            .map_err(map_provider_error)?;
        info!(identifier = %identifier, "Registration confirmed");
        Ok(())
    }

    /// Sends the verification code again.
    ///
    /// No throttling is applied; callers rate-limit themselves.
    ///
    /// # Errors
    ///
    /// Validation error with `LimitExceeded` when the provider throttles.
    pub async fn resend_verification_code(&self, identifier: &str) -> ClientResult<()> {
        self.identity
            .resend_confirmation_code(identifier)
            .await
            .map_err(map_provider_error)?;
        debug!(identifier = %identifier, "Verification code resent");
        Ok(())
    }

    /// Exchanges credentials for tokens and makes them the active session.
    ///
    /// # Errors
    ///
    /// Auth errors whose provider code tells apart bad credentials
    /// (`NotAuthorized`), an unverified account (`UserNotConfirmed`) and an
    /// unknown account (`UserNotFound`).
    pub async fn authenticate(&self, credentials: &Credentials) -> ClientResult<SessionTokens> {
        let outcome = self
            .identity
            .initiate_auth(&credentials.email, &credentials.password)
            .await
            .map_err(|e| {
                let err = map_provider_error(e);
                debug!(code = ?err.provider_code, "Sign-in rejected");
                err
            })?;

        let tokens = match outcome {
            AuthOutcome::Authenticated(tokens) => tokens,
            AuthOutcome::Challenge { name } => {
                let code = if name == NEW_PASSWORD_CHALLENGE {
                    ProviderCode::NewPasswordRequired
                } else {
                    ProviderCode::Other(name)
                };
                let err = ClientError::new(ErrorKind::Auth, "New password required");
                return Err(err.with_code(code));
            }
        };

        let username = decode_claims(&tokens.id_token)
            .ok()
            .and_then(|claims| claims.username)
            .unwrap_or_else(|| credentials.email.clone());

        let session = ActiveSession {
            username: username.clone(),
            tokens: tokens.clone(),
            established_at: self.clock.now(),
        };
        self.context
            .establish(username.clone(), tokens.clone(), session.established_at)
            .await;
        self.persist(&session).await;

        info!(
            username = %username,
            token = %SessionTokens::preview(&tokens.id_token),
            "User signed in"
        );
        Ok(tokens)
    }

    /// Ends the local session. Never fails; a no-op without a session.
    pub async fn end_session(&self) {
        if self.context.clear().await {
            info!("User signed out");
        } else {
            debug!("Sign-out without an active session");
        }
        self.forget().await;
    }

    /// Re-validates the session and returns its attributes.
    ///
    /// Returns `None` when no session exists, it lapsed and could not be
    /// renewed, or the provider no longer accepts its tokens.
    ///
    /// # Errors
    ///
    /// Network and unknown errors while talking to the provider.
    pub async fn current_session(&self) -> ClientResult<Option<SessionSnapshot>> {
        let session = match self.valid_session().await {
            Ok(session) => session,
            Err(e) if e.kind == ErrorKind::Auth => return Ok(None),
            Err(e) => return Err(e),
        };

        match self.identity.get_user(&session.tokens.access_token).await {
            Ok(profile) => Ok(Some(SessionSnapshot {
                username: profile.username,
                attributes: profile.attributes,
            })),
            Err(e) => {
                let err = map_provider_error(e);
                if err.kind == ErrorKind::Auth {
                    warn!(username = %session.username, "Provider rejected session tokens");
                    self.expire(&session).await;
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Returns true if a valid session exists. Errors count as signed out.
    pub async fn is_authenticated(&self) -> bool {
        matches!(self.current_session().await, Ok(Some(_)))
    }

    /// Returns a fresh bearer token for the active session.
    ///
    /// Expired tokens are renewed once through the refresh token; a failed
    /// renewal ends the session.
    ///
    /// # Errors
    ///
    /// Auth error `NoSession` without a session, `SessionExpired` when the
    /// session lapsed and could not be renewed.
    pub async fn current_token(&self) -> ClientResult<String> {
        Ok(self.valid_session().await?.tokens.id_token)
    }

    /// Sends a password reset code to the account's email.
    ///
    /// # Errors
    ///
    /// Auth error `UserNotFound`, validation error `LimitExceeded`.
    pub async fn request_password_reset(&self, email: &str) -> ClientResult<()> {
        self.identity
            .forgot_password(email)
            .await
            .map_err(map_provider_error)?;
        info!(email = %email, "Password reset requested");
        Ok(())
    }

    /// Sets a new password using the reset code.
    ///
    /// # Errors
    ///
    /// Validation errors for a wrong or expired code or a weak password.
    pub async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> ClientResult<()> {
        self.identity
            .confirm_forgot_password(email, code.trim(), new_password)
            .await
            .map_err(map_provider_error)?;
        info!(email = %email, "Password reset confirmed");
        Ok(())
    }

    /// Changes the password of the signed-in account.
    ///
    /// # Errors
    ///
    /// Auth error `NoSession`/`SessionExpired` without a valid session,
    /// `NotAuthorized` when the old password is wrong.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> ClientResult<()> {
        let session = self.valid_session().await?;
        self.identity
            .change_password(&session.tokens.access_token, old_password, new_password)
            .await
            .map_err(map_provider_error)?;
        info!(username = %session.username, "Password changed");
        Ok(())
    }

    /// The active session, renewed if its tokens lapsed.
    async fn valid_session(&self) -> ClientResult<ActiveSession> {
        let Some(session) = self.context.current().await else {
            return Err(ClientError::no_session());
        };
        if session.tokens.is_valid_at(self.clock.now()) {
            return Ok(session);
        }
        self.renew(session).await
    }

    async fn renew(&self, session: ActiveSession) -> ClientResult<ActiveSession> {
        if !session.tokens.can_refresh() {
            return self.lapse(&session).await;
        }

        debug!(username = %session.username, "Renewing expired session");
        let tokens = match self.identity.refresh(&session.tokens.refresh_token).await {
            Ok(tokens) => tokens,
            Err(ProviderError::Transport(message)) => {
                return Err(ClientError::network(message));
            }
            Err(e) => {
                warn!(username = %session.username, error = %e, "Session renewal rejected");
                return self.lapse(&session).await;
            }
        };

        let now = self.clock.now();
        if !tokens.is_valid_at(now) {
            warn!(username = %session.username, "Provider renewed session with expired tokens");
            return self.lapse(&session).await;
        }

        if !self.context.renew(&session, tokens.clone(), now).await {
            return self.replacement().await;
        }

        let renewed = ActiveSession {
            username: session.username,
            tokens,
            established_at: now,
        };
        self.persist(&renewed).await;
        info!(username = %renewed.username, "Session renewed");
        Ok(renewed)
    }

    /// Ends `session` after a failed renewal, unless another call already
    /// replaced it, in which case the replacement is used.
    async fn lapse(&self, session: &ActiveSession) -> ClientResult<ActiveSession> {
        if self.expire(session).await {
            Err(ClientError::session_expired())
        } else {
            self.replacement().await
        }
    }

    /// The session that superseded one being renewed.
    async fn replacement(&self) -> ClientResult<ActiveSession> {
        match self.context.current().await {
            Some(current) if current.tokens.is_valid_at(self.clock.now()) => Ok(current),
            Some(_) => Err(ClientError::session_expired()),
            None => Err(ClientError::no_session()),
        }
    }

    /// Clears `session` and the cache if it is still the active one.
    async fn expire(&self, session: &ActiveSession) -> bool {
        let cleared = self.context.clear_if_unchanged(session).await;
        if cleared {
            info!(username = %session.username, "Session expired");
            self.forget().await;
        }
        cleared
    }

    async fn persist(&self, session: &ActiveSession) {
        let Some(cache) = &self.cache else {
            return;
        };
        let persisted = PersistedSession {
            username: session.username.clone(),
            tokens: session.tokens.clone(),
        };
        if let Err(e) = cache.save(&persisted).await {
            warn!(error = %e, "Failed to write session cache");
        }
    }

    async fn forget(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(e) = cache.clear().await {
            warn!(error = %e, "Failed to clear session cache");
        }
    }
}

#[async_trait]
impl TokenSource for SessionProvider {
    async fn bearer_token(&self) -> ClientResult<String> {
        self.current_token().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::significant_drop_tightening)]
mod tests {
    use super::*;
    use crate::ports::{SessionCacheError, SignUpResponse, UserProfile};
    use base64::{Engine as _, engine::general_purpose};
    use chrono::{DateTime, Duration, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn jwt(username: &str, exp: DateTime<Utc>) -> String {
        let payload = format!(
            r#"{{"cognito:username":"{username}","exp":{}}}"#,
            exp.timestamp()
        );
        format!(
            "eyJhbGciOiJub25lIn0.{}.sig",
            general_purpose::URL_SAFE_NO_PAD.encode(payload)
        )
    }

    struct Account {
        username: String,
        email: String,
        password: String,
        name: String,
        confirmed: bool,
        codes: Vec<String>,
        reset_code: Option<String>,
    }

    /// Cognito-like behaviour over an in-memory user table.
    #[derive(Default)]
    struct FakeIdentity {
        state: Mutex<FakeState>,
    }

    #[derive(Default)]
    struct FakeState {
        accounts: Vec<Account>,
        sessions: HashMap<String, String>,
        token_ttl_secs: i64,
        refresh_allowed: bool,
        rotate_refresh: bool,
        refresh_owners: HashMap<String, String>,
        refresh_calls: u32,
        refresh_counter: u32,
        code_counter: u32,
    }

    impl FakeIdentity {
        fn new() -> Self {
            let fake = Self::default();
            {
                let mut state = fake.state.lock().unwrap();
                state.token_ttl_secs = 3600;
                state.refresh_allowed = true;
            }
            fake
        }

        fn with_account(self, email: &str, password: &str, confirmed: bool) -> Self {
            {
                let mut state = self.state.lock().unwrap();
                state.accounts.push(Account {
                    username: format!("user_{}", email.split('@').next().unwrap()),
                    email: email.to_string(),
                    password: password.to_string(),
                    name: "Test User".to_string(),
                    confirmed,
                    codes: vec![],
                    reset_code: None,
                });
            }
            self
        }

        fn set_token_ttl(&self, secs: i64) {
            self.state.lock().unwrap().token_ttl_secs = secs;
        }

        fn set_refresh_allowed(&self, allowed: bool) {
            self.state.lock().unwrap().refresh_allowed = allowed;
        }

        fn set_refresh_rotation(&self, rotate: bool) {
            self.state.lock().unwrap().rotate_refresh = rotate;
        }

        fn refresh_calls(&self) -> u32 {
            self.state.lock().unwrap().refresh_calls
        }

        fn codes_for(&self, username: &str) -> Vec<String> {
            let state = self.state.lock().unwrap();
            state
                .accounts
                .iter()
                .find(|a| a.username == username)
                .map(|a| a.codes.clone())
                .unwrap_or_default()
        }

        fn issue(state: &mut FakeState, username: &str) -> SessionTokens {
            let exp = Utc::now() + Duration::seconds(state.token_ttl_secs);
            let access = jwt(username, exp);
            state.sessions.insert(access.clone(), username.to_string());
            state.refresh_counter += 1;
            let refresh = format!("refresh-{username}-{}", state.refresh_counter);
            state
                .refresh_owners
                .insert(refresh.clone(), username.to_string());
            SessionTokens::new(jwt(username, exp), access, refresh)
        }

        fn not_found() -> ProviderError {
            ProviderError::service("UserNotFoundException", "User does not exist.")
        }
    }

    #[async_trait]
    impl IdentityService for FakeIdentity {
        async fn sign_up(
            &self,
            username: &str,
            password: &str,
            attributes: &UserAttributes,
        ) -> Result<SignUpResponse, ProviderError> {
            let mut state = self.state.lock().unwrap();
            let email = attributes.get("email").cloned().unwrap_or_default();
            if !email.contains('@') {
                return Err(ProviderError::service(
                    "InvalidParameterException",
                    "Invalid email address format.",
                ));
            }
            if state.accounts.iter().any(|a| a.email == email) {
                return Err(ProviderError::service(
                    "UsernameExistsException",
                    "An account with the given email already exists.",
                ));
            }
            if password.len() < 8 {
                return Err(ProviderError::service(
                    "InvalidPasswordException",
                    "Password did not conform with policy",
                ));
            }
            state.code_counter += 1;
            let code = format!("{:06}", state.code_counter);
            state.accounts.push(Account {
                username: username.to_string(),
                email,
                password: password.to_string(),
                name: attributes.get("name").cloned().unwrap_or_default(),
                confirmed: false,
                codes: vec![code],
                reset_code: None,
            });
            Ok(SignUpResponse {
                user_confirmed: false,
                user_sub: Some(format!("sub-{username}")),
            })
        }

        async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), ProviderError> {
            let mut state = self.state.lock().unwrap();
            let account = state
                .accounts
                .iter_mut()
                .find(|a| a.username == username)
                .ok_or_else(Self::not_found)?;
            if account.confirmed {
                return Err(ProviderError::service(
                    "NotAuthorizedException",
                    "User cannot be confirmed. Current status is CONFIRMED",
                ));
            }
            if !account.codes.iter().any(|c| c == code) {
                return Err(ProviderError::service(
                    "CodeMismatchException",
                    "Invalid verification code provided, please try again.",
                ));
            }
            account.confirmed = true;
            account.codes.clear();
            Ok(())
        }

        async fn resend_confirmation_code(&self, username: &str) -> Result<(), ProviderError> {
            let mut state = self.state.lock().unwrap();
            state.code_counter += 1;
            let code = format!("{:06}", state.code_counter);
            let account = state
                .accounts
                .iter_mut()
                .find(|a| a.username == username)
                .ok_or_else(Self::not_found)?;
            account.codes.push(code);
            Ok(())
        }

        async fn initiate_auth(
            &self,
            username: &str,
            password: &str,
        ) -> Result<AuthOutcome, ProviderError> {
            let mut state = self.state.lock().unwrap();
            let account = state
                .accounts
                .iter()
                .find(|a| a.username == username || a.email == username)
                .ok_or_else(Self::not_found)?;
            if account.password != password {
                return Err(ProviderError::service(
                    "NotAuthorizedException",
                    "Incorrect username or password.",
                ));
            }
            if !account.confirmed {
                return Err(ProviderError::service(
                    "UserNotConfirmedException",
                    "User is not confirmed.",
                ));
            }
            if account.password == "must-change" {
                return Ok(AuthOutcome::Challenge {
                    name: NEW_PASSWORD_CHALLENGE.to_string(),
                });
            }
            let username = account.username.clone();
            Ok(AuthOutcome::Authenticated(Self::issue(&mut state, &username)))
        }

        async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, ProviderError> {
            // lets concurrent renewals overlap
            tokio::task::yield_now().await;
            let mut state = self.state.lock().unwrap();
            state.refresh_calls += 1;
            if !state.refresh_allowed {
                return Err(ProviderError::service(
                    "NotAuthorizedException",
                    "Refresh Token has expired",
                ));
            }
            let owner = if state.rotate_refresh {
                state.refresh_owners.remove(refresh_token)
            } else {
                state.refresh_owners.get(refresh_token).cloned()
            };
            let Some(username) = owner else {
                return Err(ProviderError::service(
                    "NotAuthorizedException",
                    "Invalid Refresh Token",
                ));
            };
            state.token_ttl_secs = 3600;
            Ok(Self::issue(&mut state, &username))
        }

        async fn get_user(&self, access_token: &str) -> Result<UserProfile, ProviderError> {
            let state = self.state.lock().unwrap();
            let username = state.sessions.get(access_token).ok_or_else(|| {
                ProviderError::service("NotAuthorizedException", "Access Token has been revoked")
            })?;
            let account = state
                .accounts
                .iter()
                .find(|a| &a.username == username)
                .ok_or_else(Self::not_found)?;
            Ok(UserProfile {
                username: account.username.clone(),
                attributes: UserAttributes::from([
                    ("email".to_string(), account.email.clone()),
                    ("name".to_string(), account.name.clone()),
                ]),
            })
        }

        async fn forgot_password(&self, username: &str) -> Result<(), ProviderError> {
            let mut state = self.state.lock().unwrap();
            let account = state
                .accounts
                .iter_mut()
                .find(|a| a.email == username || a.username == username)
                .ok_or_else(Self::not_found)?;
            account.reset_code = Some("654321".to_string());
            Ok(())
        }

        async fn confirm_forgot_password(
            &self,
            username: &str,
            code: &str,
            new_password: &str,
        ) -> Result<(), ProviderError> {
            let mut state = self.state.lock().unwrap();
            let account = state
                .accounts
                .iter_mut()
                .find(|a| a.email == username || a.username == username)
                .ok_or_else(Self::not_found)?;
            match &account.reset_code {
                Some(expected) if expected == code => {
                    account.password = new_password.to_string();
                    account.reset_code = None;
                    Ok(())
                }
                Some(_) => Err(ProviderError::service(
                    "CodeMismatchException",
                    "Invalid verification code provided, please try again.",
                )),
                None => Err(ProviderError::service(
                    "ExpiredCodeException",
                    "Invalid code provided, please request a code again.",
                )),
            }
        }

        async fn change_password(
            &self,
            access_token: &str,
            old_password: &str,
            new_password: &str,
        ) -> Result<(), ProviderError> {
            let mut state = self.state.lock().unwrap();
            let username = state
                .sessions
                .get(access_token)
                .cloned()
                .ok_or_else(|| ProviderError::service("NotAuthorizedException", "Invalid token"))?;
            let account = state
                .accounts
                .iter_mut()
                .find(|a| a.username == username)
                .ok_or_else(Self::not_found)?;
            if account.password != old_password {
                return Err(ProviderError::service(
                    "NotAuthorizedException",
                    "Incorrect username or password.",
                ));
            }
            account.password = new_password.to_string();
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        stored: Mutex<Option<PersistedSession>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl SessionCache for MemoryCache {
        async fn load(&self) -> Result<Option<PersistedSession>, SessionCacheError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn save(&self, session: &PersistedSession) -> Result<(), SessionCacheError> {
            if self.fail_writes {
                return Err(SessionCacheError::NoLocation);
            }
            *self.stored.lock().unwrap() = Some(session.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<(), SessionCacheError> {
            if self.fail_writes {
                return Err(SessionCacheError::NoLocation);
            }
            *self.stored.lock().unwrap() = None;
            Ok(())
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn provider(identity: &Arc<FakeIdentity>) -> SessionProvider {
        SessionProvider::new(identity.clone())
    }

    fn jane() -> Arc<FakeIdentity> {
        Arc::new(FakeIdentity::new().with_account("jane@example.com", "Secret123!", true))
    }

    fn jane_credentials() -> Credentials {
        Credentials::new("jane@example.com", "Secret123!")
    }

    #[tokio::test]
    async fn current_token_without_session_is_no_session() {
        let identity = Arc::new(FakeIdentity::new());
        let provider = provider(&identity);

        let err = provider.current_token().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.has_code(&ProviderCode::NoSession));
    }

    #[tokio::test]
    async fn authenticate_then_token_until_sign_out() {
        let identity = jane();
        let provider = provider(&identity);

        let tokens = provider.authenticate(&jane_credentials()).await.unwrap();
        let first = provider.current_token().await.unwrap();
        let second = provider.current_token().await.unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, tokens.id_token);
        assert_eq!(first, second);
        assert_eq!(identity.refresh_calls(), 0);

        provider.end_session().await;
        let err = provider.current_token().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.has_code(&ProviderCode::NoSession));
    }

    #[tokio::test]
    async fn end_session_without_session_is_noop() {
        let identity = Arc::new(FakeIdentity::new());
        let provider = provider(&identity);
        provider.end_session().await;
        provider.end_session().await;
        assert!(!provider.context().is_active().await);
    }

    #[tokio::test]
    async fn sign_in_failures_are_distinguishable() {
        let identity = Arc::new(
            FakeIdentity::new()
                .with_account("confirmed@example.com", "Secret123!", true)
                .with_account("pending@example.com", "Secret123!", false),
        );
        let provider = provider(&identity);

        let unconfirmed = provider
            .authenticate(&Credentials::new("pending@example.com", "Secret123!"))
            .await
            .unwrap_err();
        let bad_password = provider
            .authenticate(&Credentials::new("confirmed@example.com", "wrong-password"))
            .await
            .unwrap_err();
        let missing = provider
            .authenticate(&Credentials::new("nobody@example.com", "Secret123!"))
            .await
            .unwrap_err();

        for err in [&unconfirmed, &bad_password, &missing] {
            assert_eq!(err.kind, ErrorKind::Auth);
        }
        assert_eq!(
            unconfirmed.provider_code,
            Some(ProviderCode::UserNotConfirmed)
        );
        assert_eq!(
            bad_password.provider_code,
            Some(ProviderCode::NotAuthorized)
        );
        assert_eq!(missing.provider_code, Some(ProviderCode::UserNotFound));
        assert!(!provider.context().is_active().await);
    }

    #[tokio::test]
    async fn new_password_challenge_is_an_auth_error() {
        let identity =
            Arc::new(FakeIdentity::new().with_account("old@example.com", "must-change", true));
        let provider = provider(&identity);

        let err = provider
            .authenticate(&Credentials::new("old@example.com", "must-change"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.has_code(&ProviderCode::NewPasswordRequired));
    }

    #[tokio::test]
    async fn register_returns_synthesized_identifier() {
        let identity = Arc::new(FakeIdentity::new());
        let at = DateTime::from_timestamp_millis(1_736_500_000_000).unwrap();
        let provider = provider(&identity).with_clock(Arc::new(FixedClock(at)));

        let outcome = provider
            .register("jane@example.com", "Secret123!", "Jane")
            .await
            .unwrap();
        assert!(outcome.pending_verification);
        assert_eq!(outcome.identifier, "user_jane_1736500000000");
        assert_ne!(outcome.identifier, "jane@example.com");
        assert_eq!(
            outcome.user_sub.as_deref(),
            Some("sub-user_jane_1736500000000")
        );
    }

    #[tokio::test]
    async fn register_surfaces_provider_rejections_as_validation() {
        let identity =
            Arc::new(FakeIdentity::new().with_account("taken@example.com", "Secret123!", true));
        let provider = provider(&identity);

        let err = provider
            .register("not-an-email", "Secret123!", "X")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.has_code(&ProviderCode::InvalidParameter));

        let err = provider
            .register("taken@example.com", "Secret123!", "X")
            .await
            .unwrap_err();
        assert!(err.has_code(&ProviderCode::UsernameExists));

        let err = provider
            .register("new@example.com", "short", "X")
            .await
            .unwrap_err();
        assert!(err.has_code(&ProviderCode::InvalidPassword));
    }

    #[tokio::test]
    async fn repeated_resend_keeps_original_code_valid() {
        let identity = Arc::new(FakeIdentity::new());
        let provider = provider(&identity);

        let outcome = provider
            .register("jane@example.com", "Secret123!", "Jane")
            .await
            .unwrap();
        let original = identity.codes_for(&outcome.identifier)[0].clone();

        provider
            .resend_verification_code(&outcome.identifier)
            .await
            .unwrap();
        provider
            .resend_verification_code(&outcome.identifier)
            .await
            .unwrap();
        assert_eq!(identity.codes_for(&outcome.identifier).len(), 3);

        provider
            .confirm_registration(&outcome.identifier, &original)
            .await
            .unwrap();
        provider.authenticate(&jane_credentials()).await.unwrap();
    }

    #[tokio::test]
    async fn confirm_registration_code_errors() {
        let identity = Arc::new(FakeIdentity::new());
        let provider = provider(&identity);
        let outcome = provider
            .register("jane@example.com", "Secret123!", "Jane")
            .await
            .unwrap();

        let err = provider
            .confirm_registration(&outcome.identifier, "999999")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.has_code(&ProviderCode::CodeMismatch));

        let code = identity.codes_for(&outcome.identifier)[0].clone();
        provider
            .confirm_registration(&outcome.identifier, &format!(" {code} "))
            .await
            .unwrap();

        let err = provider
            .confirm_registration(&outcome.identifier, &code)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
    }

    #[tokio::test]
    async fn expired_tokens_are_renewed() {
        let identity = jane();
        identity.set_token_ttl(-300);
        let provider = provider(&identity);

        let stale = provider.authenticate(&jane_credentials()).await.unwrap();
        let fresh = provider.current_token().await.unwrap();
        assert_ne!(fresh, stale.id_token);
        assert_eq!(identity.refresh_calls(), 1);

        // renewed tokens are reused without another refresh
        assert_eq!(provider.current_token().await.unwrap(), fresh);
        assert_eq!(identity.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn failed_renewal_expires_session() {
        let identity = jane();
        identity.set_token_ttl(-300);
        identity.set_refresh_allowed(false);
        let cache = Arc::new(MemoryCache::default());
        let provider = provider(&identity).with_cache(cache.clone());

        provider.authenticate(&jane_credentials()).await.unwrap();
        assert!(cache.stored.lock().unwrap().is_some());

        let err = provider.current_token().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.has_code(&ProviderCode::SessionExpired));
        assert!(cache.stored.lock().unwrap().is_none());

        let err = provider.current_token().await.unwrap_err();
        assert!(err.has_code(&ProviderCode::NoSession));
    }

    #[tokio::test]
    async fn concurrent_renewals_with_rotating_refresh_tokens_keep_the_session() {
        let identity = jane();
        identity.set_token_ttl(-300);
        identity.set_refresh_rotation(true);
        let cache = Arc::new(MemoryCache::default());
        let provider = provider(&identity).with_cache(cache.clone());
        provider.authenticate(&jane_credentials()).await.unwrap();

        let (first, second) = tokio::join!(provider.current_token(), provider.current_token());
        assert_eq!(identity.refresh_calls(), 2);
        let first = first.unwrap();
        assert_eq!(second.unwrap(), first);

        assert!(provider.context().is_active().await);
        assert!(cache.stored.lock().unwrap().is_some());
        assert_eq!(provider.current_token().await.unwrap(), first);
        assert_eq!(identity.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn rejected_refresh_ends_only_the_session_it_tried_to_renew() {
        let identity = jane();
        identity.set_token_ttl(-300);
        let provider = provider(&identity);
        provider.authenticate(&jane_credentials()).await.unwrap();
        let stale = provider.context().current().await.unwrap();

        // another call renews the session before this one gives up
        let renewed = SessionTokens::new(
            jwt("user_jane", Utc::now() + Duration::hours(1)),
            jwt("user_jane", Utc::now() + Duration::hours(1)),
            "refresh-user_jane-next",
        );
        assert!(
            provider
                .context()
                .renew(&stale, renewed.clone(), Utc::now())
                .await
        );

        identity.set_refresh_allowed(false);
        let outcome = provider.renew(stale).await.unwrap();
        assert_eq!(outcome.tokens, renewed);
        assert!(provider.context().is_active().await);
    }

    #[tokio::test]
    async fn current_session_returns_attributes_or_none() {
        let identity = jane();
        let provider = provider(&identity);

        assert_eq!(provider.current_session().await.unwrap(), None);
        assert!(!provider.is_authenticated().await);

        provider.authenticate(&jane_credentials()).await.unwrap();
        let snapshot = provider.current_session().await.unwrap().unwrap();
        assert_eq!(snapshot.username, "user_jane");
        assert_eq!(snapshot.email(), Some("jane@example.com"));
        assert!(provider.is_authenticated().await);
    }

    #[tokio::test]
    async fn revoked_tokens_end_the_session() {
        let identity = jane();
        let provider = provider(&identity);
        provider.authenticate(&jane_credentials()).await.unwrap();

        identity.state.lock().unwrap().sessions.clear();

        assert_eq!(provider.current_session().await.unwrap(), None);
        let err = provider.current_token().await.unwrap_err();
        assert!(err.has_code(&ProviderCode::NoSession));
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let identity = jane();
        let provider = provider(&identity);

        let err = provider
            .confirm_password_reset("jane@example.com", "654321", "NewSecret1!")
            .await
            .unwrap_err();
        assert!(err.has_code(&ProviderCode::CodeExpired));

        provider
            .request_password_reset("jane@example.com")
            .await
            .unwrap();
        let err = provider
            .confirm_password_reset("jane@example.com", "000000", "NewSecret1!")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.has_code(&ProviderCode::CodeMismatch));

        provider
            .confirm_password_reset("jane@example.com", "654321", "NewSecret1!")
            .await
            .unwrap();
        provider
            .authenticate(&Credentials::new("jane@example.com", "NewSecret1!"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn change_password_requires_session() {
        let identity = jane();
        let provider = provider(&identity);

        let err = provider
            .change_password("Secret123!", "Other123!")
            .await
            .unwrap_err();
        assert!(err.has_code(&ProviderCode::NoSession));

        provider.authenticate(&jane_credentials()).await.unwrap();
        let err = provider
            .change_password("wrong", "Other123!")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.has_code(&ProviderCode::NotAuthorized));
        assert!(provider.context().is_active().await);

        provider
            .change_password("Secret123!", "Other123!")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn restore_loads_cached_session() {
        let identity = jane();
        let cache = Arc::new(MemoryCache::default());

        let first = provider(&identity).with_cache(cache.clone());
        let tokens = first.authenticate(&jane_credentials()).await.unwrap();

        let second = provider(&identity).with_cache(cache.clone());
        assert!(second.restore().await);
        assert_eq!(second.current_token().await.unwrap(), tokens.id_token);

        second.end_session().await;
        assert!(cache.stored.lock().unwrap().is_none());
        let third = provider(&identity).with_cache(cache);
        assert!(!third.restore().await);
    }

    #[tokio::test]
    async fn cache_failures_do_not_fail_operations() {
        let identity = jane();
        let cache = Arc::new(MemoryCache {
            stored: Mutex::new(None),
            fail_writes: true,
        });
        let provider = provider(&identity).with_cache(cache);

        provider.authenticate(&jane_credentials()).await.unwrap();
        provider.end_session().await;
        assert!(!provider.context().is_active().await);
    }

    #[tokio::test]
    async fn token_source_delegates_to_current_token() {
        let identity = jane();
        let provider = Arc::new(provider(&identity));
        assert!(provider.bearer_token().await.is_err());

        let tokens = provider.authenticate(&jane_credentials()).await.unwrap();
        assert_eq!(provider.bearer_token().await.unwrap(), tokens.id_token);
    }
}
