//! API client for communicating with the expense backend.
//!
//! `ApiClient` owns the HTTP connection pool, the session store and the
//! token refresher. All authenticated traffic goes through `execute`, which
//! attaches the bearer token and handles the 401 → refresh → retry cycle.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::auth::SessionStore;
use crate::models::ApiResponse;

use super::events::AuthEvent;
use super::refresh::{RefreshPhase, Refresher, Renewal};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Backend used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Token renewal endpoint, relative to the base URL.
pub(crate) const REFRESH_PATH: &str = "/users/refresh-token";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Capacity of the auth event channel. Slow subscribers lose old events.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Whether a request has already been resent after a token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retried,
}

/// API client for the expense backend.
/// Clone is cheap - the connection pool, session store and refresher are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionStore,
    refresher: Arc<Refresher>,
    events: broadcast::Sender<AuthEvent>,
}

impl ApiClient {
    /// Client for the default backend URL.
    pub fn new(session: SessionStore) -> Result<Self, ApiError> {
        Self::builder().session(session).build()
    }

    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Receive login, refresh and logout notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn refresh_phase(&self) -> RefreshPhase {
        self.refresher.phase()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL for `path` followed by one percent-encoded path segment.
    pub(crate) fn url_with_segment(&self, path: &str, segment: &str) -> Result<String, ApiError> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| ApiError::InvalidInput(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidInput(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(segment);
        Ok(url.into())
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Send an authenticated request and return the raw successful response.
    ///
    /// Non-2xx statuses other than a recoverable 401 come back as errors.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        headers: Option<&HeaderMap>,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);
        self.execute(|| {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(headers) = headers {
                request = request.headers(headers.clone());
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            request
        })
        .await
    }

    /// Run a request built by `build`, refreshing the token once on 401.
    ///
    /// `build` is called again for the retry since a sent request cannot be
    /// reused.
    pub(crate) async fn execute<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut token = self.session.access_token()?;
        let mut attempt = Attempt::First;

        loop {
            let mut request = build();
            if let Some(ref token) = token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Self::check_response(response).await;
            }

            match attempt {
                Attempt::Retried => {
                    warn!(url = %response.url(), "Request still unauthorized after token refresh");
                    return Err(ApiError::Unauthorized);
                }
                Attempt::First => {
                    debug!(url = %response.url(), "Unauthorized, refreshing access token");
                    let renewed = self
                        .refresher
                        .renewed_token(token.as_deref())
                        .await
                        .map_err(ApiError::SessionExpired)?;
                    token = Some(renewed);
                    attempt = Attempt::Retried;
                }
            }
        }
    }

    /// Check if response is successful, returning an error with body if not.
    pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Decode the `{ success, data, message }` envelope.
    pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        Self::envelope::<T>(response).await?.into_result()
    }

    pub(crate) async fn envelope<T: DeserializeOwned>(
        response: Response,
    ) -> Result<ApiResponse<T>, ApiError> {
        let url = response.url().to_string();
        let text = response.text().await?;
        Self::parse_envelope(&url, &text)
    }

    fn parse_envelope<T: DeserializeOwned>(url: &str, text: &str) -> Result<ApiResponse<T>, ApiError> {
        serde_json::from_str(text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_url(&self.url(path)).await
    }

    pub(crate) async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.execute(|| self.client.get(url)).await?;
        Self::decode(response).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.execute(|| self.client.post(&url).json(body)).await?;
        Self::decode(response).await
    }

    pub(crate) async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.execute(|| self.client.put(&url).json(body)).await?;
        Self::decode(response).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        let response = self.execute(|| self.client.delete(&url)).await?;
        // An empty body (204, or chunked with no content) is an ack
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(());
        }
        Self::parse_envelope::<serde_json::Value>(&url, &text)?.into_ack()
    }
}

/// Builder for `ApiClient`
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    session: Option<SessionStore>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn session(mut self, session: SessionStore) -> Self {
        self.session = Some(session);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client. Without a session store, an in-memory one is used.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| concat!("splitledger/", env!("CARGO_PKG_VERSION")).to_string()),
            )
            .build()?;

        let session = self.session.unwrap_or_else(SessionStore::in_memory);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let refresher = Refresher::new(Renewal {
            client: client.clone(),
            url: format!("{}{}", base_url, REFRESH_PATH),
            session: session.clone(),
            events: events.clone(),
        });

        Ok(ApiClient {
            client,
            base_url,
            session,
            refresher: Arc::new(refresher),
            events,
        })
    }
}
