//! Cognito user-pool adapter.
//!
//! Talks to the user-pool JSON API directly: every action is a `POST` to the
//! pool endpoint with an `X-Amz-Target` header naming the action. Only the
//! unauthenticated, client-id based actions are used, so no request signing
//! is needed.

use std::time::Duration;

use async_trait::async_trait;
use hts_application::{AuthOutcome, IdentityService, ProviderError, SignUpResponse, UserProfile};
use hts_domain::{SessionTokens, UserAttributes};
use reqwest::{Client, StatusCode, header::HeaderMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

/// Content type required by the user-pool API.
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Target prefix for user-pool actions.
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

/// Header some gateways use to report the error type.
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

const USER_AGENT: &str = concat!("hts-classify/", env!("CARGO_PKG_VERSION"));

/// Identity service backed by a Cognito user pool.
#[derive(Debug, Clone)]
pub struct CognitoIdentityService {
    client: Client,
    endpoint: Url,
    client_id: String,
}

impl CognitoIdentityService {
    /// Creates an adapter for the app client `client_id` at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be built.
    pub fn new(
        endpoint: Url,
        client_id: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self::with_client(client, endpoint, client_id))
    }

    /// Creates an adapter around an existing HTTP client.
    pub fn with_client(client: Client, endpoint: Url, client_id: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            client_id: client_id.into(),
        }
    }

    /// Regional endpoint for a pool id such as `us-east-1_AbC123`.
    ///
    /// Returns `None` if the id has no region prefix.
    #[must_use]
    pub fn endpoint_for_pool(user_pool_id: &str) -> Option<Url> {
        let region = region_of(user_pool_id)?;
        Url::parse(&format!("https://cognito-idp.{region}.amazonaws.com/")).ok()
    }

    /// The endpoint requests are sent to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        body: Value,
    ) -> Result<T, ProviderError> {
        debug!(action, "Calling identity provider");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", AMZ_JSON)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                warn!(action, error = %e, "Identity provider unreachable");
                ProviderError::Transport(e.to_string())
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            let err = parse_error(status, &headers, &text);
            debug!(
                action,
                status = status.as_u16(),
                error = %err,
                "Identity provider rejected request"
            );
            return Err(err);
        }

        // Some actions answer with an empty body.
        let text = if text.trim().is_empty() {
            "{}"
        } else {
            text.as_str()
        };
        serde_json::from_str(text).map_err(|e| {
            ProviderError::InvalidResponse(format!("{action} response could not be decoded: {e}"))
        })
    }

    async fn call_empty(&self, action: &str, body: Value) -> Result<(), ProviderError> {
        let _: Value = self.call(action, body).await?;
        Ok(())
    }
}

/// Region prefix of a pool id (`us-east-1` for `us-east-1_AbC123`).
fn region_of(user_pool_id: &str) -> Option<&str> {
    let (region, rest) = user_pool_id.split_once('_')?;
    (region.contains('-') && !rest.is_empty()).then_some(region)
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

fn parse_error(status: StatusCode, headers: &HeaderMap, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let header_code = headers
        .get(ERROR_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(':').next().unwrap_or(v).to_string());

    let code = parsed
        .as_ref()
        .and_then(|b| b.kind.clone())
        .or(header_code)
        .filter(|c| !c.is_empty());
    let message = parsed.and_then(|b| b.message).unwrap_or_default();

    match code {
        Some(code) => ProviderError::Service { code, message },
        None => ProviderError::InvalidResponse(format!(
            "identity provider returned {status} without an error code"
        )),
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeType {
    name: String,
    value: String,
}

fn to_attribute_list(attributes: &UserAttributes) -> Vec<AttributeType> {
    attributes
        .iter()
        .map(|(name, value)| AttributeType {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResult {
    #[serde(default)]
    user_confirmed: bool,
    #[serde(default)]
    user_sub: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResult {
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
    #[serde(default)]
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResult {
    username: String,
    #[serde(default)]
    user_attributes: Vec<AttributeType>,
}

#[async_trait]
impl IdentityService for CognitoIdentityService {
    async fn sign_up(
        &self,
        username: &str,
        password: &str,
        attributes: &UserAttributes,
    ) -> Result<SignUpResponse, ProviderError> {
        let result: SignUpResult = self
            .call(
                "SignUp",
                json!({
                    "ClientId": self.client_id,
                    "Username": username,
                    "Password": password,
                    "UserAttributes": to_attribute_list(attributes),
                }),
            )
            .await?;

        Ok(SignUpResponse {
            user_confirmed: result.user_confirmed,
            user_sub: result.user_sub,
        })
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), ProviderError> {
        self.call_empty(
            "ConfirmSignUp",
            json!({
                "ClientId": self.client_id,
                "Username": username,
                "ConfirmationCode": code,
            }),
        )
        .await
    }

    async fn resend_confirmation_code(&self, username: &str) -> Result<(), ProviderError> {
        self.call_empty(
            "ResendConfirmationCode",
            json!({ "ClientId": self.client_id, "Username": username }),
        )
        .await
    }

    async fn initiate_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, ProviderError> {
        let result: InitiateAuthResult = self
            .call(
                "InitiateAuth",
                json!({
                    "AuthFlow": "USER_PASSWORD_AUTH",
                    "ClientId": self.client_id,
                    "AuthParameters": { "USERNAME": username, "PASSWORD": password },
                }),
            )
            .await?;

        if let Some(auth) = result.authentication_result {
            return Ok(AuthOutcome::Authenticated(SessionTokens::new(
                auth.id_token,
                auth.access_token,
                auth.refresh_token.unwrap_or_default(),
            )));
        }
        match result.challenge_name {
            Some(name) => Ok(AuthOutcome::Challenge { name }),
            None => Err(ProviderError::InvalidResponse(
                "sign-in returned neither tokens nor a challenge".to_string(),
            )),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, ProviderError> {
        let result: InitiateAuthResult = self
            .call(
                "InitiateAuth",
                json!({
                    "AuthFlow": "REFRESH_TOKEN_AUTH",
                    "ClientId": self.client_id,
                    "AuthParameters": { "REFRESH_TOKEN": refresh_token },
                }),
            )
            .await?;

        let auth = result.authentication_result.ok_or_else(|| {
            ProviderError::InvalidResponse("refresh returned no tokens".to_string())
        })?;

        // The pool only rotates the refresh token when rotation is enabled.
        Ok(SessionTokens::new(
            auth.id_token,
            auth.access_token,
            auth.refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        ))
    }

    async fn get_user(&self, access_token: &str) -> Result<UserProfile, ProviderError> {
        let result: GetUserResult = self
            .call("GetUser", json!({ "AccessToken": access_token }))
            .await?;

        Ok(UserProfile {
            username: result.username,
            attributes: result
                .user_attributes
                .into_iter()
                .map(|a| (a.name, a.value))
                .collect(),
        })
    }

    async fn forgot_password(&self, username: &str) -> Result<(), ProviderError> {
        self.call_empty(
            "ForgotPassword",
            json!({ "ClientId": self.client_id, "Username": username }),
        )
        .await
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), ProviderError> {
        self.call_empty(
            "ConfirmForgotPassword",
            json!({
                "ClientId": self.client_id,
                "Username": username,
                "ConfirmationCode": code,
                "Password": new_password,
            }),
        )
        .await
    }

    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ProviderError> {
        self.call_empty(
            "ChangePassword",
            json!({
                "AccessToken": access_token,
                "PreviousPassword": old_password,
                "ProposedPassword": new_password,
            }),
        )
        .await
    }
}
