//! HTTP client for the classification and history API.
//!
//! Every request carries `Content-Type: application/json` and, when a session
//! is available, a bearer token fetched fresh from the [`TokenSource`].
//! Unauthenticated requests are still sent; the service decides whether to
//! serve them.

use std::sync::Arc;
use std::time::Duration;

use hts_application::TokenSource;
use hts_domain::{
    ClassificationRecord, ClassificationRequest, ClassificationResult, ClassificationUpdate,
    ClientError, ClientResult, HistoryQuery, PagedResponse, PagedResult, UserStats,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::response::{decode, status_error};

const USER_AGENT: &str = concat!("hts-classify/", env!("CARGO_PKG_VERSION"));

/// Client for the classification service.
pub struct ApiClient {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    /// Creates a client for the API rooted at `base_url` (e.g.
    /// `http://localhost:3001/api`).
    ///
    /// # Errors
    ///
    /// Returns an unknown error if the HTTP client cannot be built.
    pub fn new(
        base_url: Url,
        tokens: Arc<dyn TokenSource>,
        timeout: Option<Duration>,
    ) -> ClientResult<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::unknown(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url, tokens))
    }

    /// Creates a client around an existing reqwest client.
    #[must_use]
    pub fn with_client(client: Client, mut base_url: Url, tokens: Arc<dyn TokenSource>) -> Self {
        // Relative joins replace the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client,
            base_url,
            tokens,
        }
    }

    /// The API root requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Headers for the next request.
    ///
    /// Adds a bearer authorization entry only if the token source yields a
    /// token right now. Never fails.
    pub async fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match self.tokens.bearer_token().await {
            Ok(token) => match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Session token is not a valid header value; sending without it"),
            },
            Err(e) => debug!(kind = %e.kind, "Sending request without authorization"),
        }
        headers
    }

    /// Classifies a product.
    ///
    /// # Errors
    ///
    /// Network, validation, auth or unknown errors per the response mapping.
    pub async fn classify(
        &self,
        product_description: &str,
        country_of_origin: &str,
    ) -> ClientResult<ClassificationResult> {
        let body = ClassificationRequest::new(product_description, country_of_origin);
        let request = self
            .request(Method::POST, self.url("classify")?)
            .await
            .json(&body);
        let text = self.execute(request, "Classification failed").await?;
        let result: ClassificationResult = decode(&text, "Classification failed")?;
        debug!(hts_code = %result.hts_code(), "Product classified");
        Ok(result)
    }

    /// Lists classification history.
    ///
    /// # Errors
    ///
    /// Same mapping as [`classify`](Self::classify).
    pub async fn get_history(
        &self,
        query: &HistoryQuery,
    ) -> ClientResult<PagedResult<ClassificationRecord>> {
        let mut url = self.url("history")?;
        url.query_pairs_mut().extend_pairs(query.to_query_pairs());

        let page: PagedResponse<ClassificationRecord> = self
            .fetch(Method::GET, url, "Failed to fetch history")
            .await?;
        Ok(page.into_paged(query))
    }

    /// Fetches one stored classification.
    ///
    /// # Errors
    ///
    /// Same mapping as [`classify`](Self::classify).
    pub async fn get_classification(&self, id: i64) -> ClientResult<ClassificationRecord> {
        let url = self.url(&format!("history/{id}"))?;
        self.fetch(Method::GET, url, "Failed to fetch classification")
            .await
    }

    /// Applies a partial update to a stored classification.
    ///
    /// # Errors
    ///
    /// Same mapping as [`classify`](Self::classify).
    pub async fn update_classification(
        &self,
        id: i64,
        update: &ClassificationUpdate,
    ) -> ClientResult<ClassificationRecord> {
        const FAILED: &str = "Failed to update classification";
        let url = self.url(&format!("history/{id}"))?;
        let request = self.request(Method::PATCH, url).await.json(update);
        let text = self.execute(request, FAILED).await?;
        decode(&text, FAILED)
    }

    /// Sets or clears the bookmark flag.
    ///
    /// # Errors
    ///
    /// Same mapping as [`classify`](Self::classify).
    pub async fn toggle_bookmark(
        &self,
        id: i64,
        is_bookmarked: bool,
    ) -> ClientResult<ClassificationRecord> {
        self.update_classification(id, &ClassificationUpdate::bookmark(is_bookmarked))
            .await
    }

    /// Replaces the notes of a stored classification.
    ///
    /// # Errors
    ///
    /// Same mapping as [`classify`](Self::classify).
    pub async fn update_notes(&self, id: i64, notes: &str) -> ClientResult<ClassificationRecord> {
        self.update_classification(id, &ClassificationUpdate::notes(notes))
            .await
    }

    /// Deletes one stored classification.
    ///
    /// # Errors
    ///
    /// Same mapping as [`classify`](Self::classify).
    pub async fn delete_classification(&self, id: i64) -> ClientResult<()> {
        let url = self.url(&format!("history/{id}"))?;
        let request = self.request(Method::DELETE, url).await;
        self.execute(request, "Failed to delete classification")
            .await?;
        Ok(())
    }

    /// Deletes the whole history of the signed-in user.
    ///
    /// # Errors
    ///
    /// Same mapping as [`classify`](Self::classify).
    pub async fn clear_history(&self) -> ClientResult<()> {
        let request = self.request(Method::DELETE, self.url("history")?).await;
        self.execute(request, "Failed to clear history").await?;
        Ok(())
    }

    /// Usage statistics of the signed-in user.
    ///
    /// # Errors
    ///
    /// Same mapping as [`classify`](Self::classify).
    pub async fn get_user_stats(&self) -> ClientResult<UserStats> {
        let url = self.url("history/user/stats")?;
        self.fetch(Method::GET, url, "Failed to fetch stats").await
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::unknown(format!("Invalid request path {path}: {e}")))
    }

    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let headers = self.build_headers().await;
        self.client.request(method, url).headers(headers)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        failure: &str,
    ) -> ClientResult<T> {
        let request = self.request(method, url).await;
        let text = self.execute(request, failure).await?;
        decode(&text, failure)
    }

    /// Sends a request and returns the body of a 2xx response.
    async fn execute(&self, request: RequestBuilder, failure: &str) -> ClientResult<String> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Classification API unreachable");
            ClientError::network(format!("{failure}: {e}"))
        })?;

        let status = response.status();
        let path = response.url().path().to_string();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::network(format!("{failure}: {e}")))?;

        debug!(status = status.as_u16(), path = %path, "API response");

        if status.is_success() {
            Ok(text)
        } else {
            let err = status_error(status, &text, failure);
            warn!(
                status = status.as_u16(),
                path = %path,
                kind = %err.kind,
                "API request failed"
            );
            Err(err)
        }
    }
}
