//! REST backend client.
//!
//! # Architecture
//!
//! - JSON over HTTP with `reqwest`; one shared connection pool per client
//! - The backend is the source of truth; nothing is persisted locally
//! - Profiles and shipping options are cached in memory via `moka` (5 minute TTL)
//! - Every request carries an `x-request-id` header for log correlation
//!
//! Endpoint groups live in their own modules as `impl ApiClient` blocks:
//! `users`, `conversations`, `marketplace`, `cards`, `collection`, `shipping`
//! and `orders`.

mod cache;
mod cards;
mod collection;
mod conversations;
mod conversions;
mod marketplace;
mod orders;
mod shipping;
mod users;
mod wire;

use std::sync::Arc;

use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;

pub use cards::CardPage;
pub use orders::{CheckoutRedirect, CheckoutRequest};
pub use users::{ProfileUpdate, UserProfile};

use cache::{CacheKey, CacheValue};
use wire::SuccessResponse;

/// Request correlation header.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest response body excerpt kept in errors and logs.
const BODY_EXCERPT_CHARS: usize = 200;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Response parsed but is missing required data.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Backend answered `success: false`.
    #[error("Request refused: {0}")]
    Rejected(String),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Whether the error is a 404 from the backend.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Status { status: 404, .. })
    }
}

/// Client for the marketplace REST backend.
///
/// Cheap to clone; clones share the connection pool and the cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| ApiError::InvalidResponse(format!("Invalid API token format: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(std::time::Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                cache,
            }),
        })
    }

    /// Base URL all endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Drop every cached response.
    pub fn invalidate_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Resolve an endpoint path (no leading slash) against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Resolve an endpoint and append query parameters.
    fn endpoint_with_query<K, V>(&self, path: &str, pairs: &[(K, V)]) -> Result<Url, ApiError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self.endpoint(path)?;
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    /// GET and decode a JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let body = self.execute(self.inner.client.get(url)).await?;
        decode(&body)
    }

    /// POST a JSON body and decode the JSON answer.
    async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = self.execute(self.inner.client.post(url).json(body)).await?;
        decode(&body)
    }

    /// POST a JSON body and ignore the answer.
    async fn post_unit<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<(), ApiError> {
        self.execute(self.inner.client.post(url).json(body)).await?;
        Ok(())
    }

    /// POST a JSON body to an endpoint answering `{ success, message }`.
    async fn post_checked<B: Serialize + Sync>(
        &self,
        url: Url,
        body: &B,
        action: &str,
    ) -> Result<(), ApiError> {
        let response: Option<SuccessResponse> = self.post_json(url, body).await?;
        check_success(response.unwrap_or_default(), action)
    }

    /// PUT a JSON body and ignore the answer.
    async fn put_unit<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<(), ApiError> {
        self.execute(self.inner.client.put(url).json(body)).await?;
        Ok(())
    }

    /// DELETE a resource and ignore the answer.
    async fn delete_unit(&self, url: Url) -> Result<(), ApiError> {
        self.execute(self.inner.client.delete(url)).await?;
        Ok(())
    }

    /// Send a request and return the body of a successful response.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let response = request
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await?;
        let status = response.status();
        let url = response.url().path().to_string();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(path = %url, "Backend returned 404");
            return Err(ApiError::NotFound(url));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                path = %url,
                body = %excerpt(&response_text, 500),
                "Backend returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: excerpt(&response_text, BODY_EXCERPT_CHARS),
            });
        }

        Ok(response_text)
    }
}

/// Decode a JSON body, logging the payload on failure.
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    // Some endpoints answer 200 with an empty body; treat it as `null`.
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %excerpt(body, 500),
            "Failed to parse backend response"
        );
        ApiError::Parse(e)
    })
}

/// Turn `success: false` into [`ApiError::Rejected`], with the backend's
/// reason when it gave one.
fn check_success(response: SuccessResponse, action: &str) -> Result<(), ApiError> {
    if response.success {
        return Ok(());
    }
    let reason = response
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("{action} failed"));
    Err(ApiError::Rejected(reason))
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Percent-encode one path segment.
fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&ClientConfig::new(base).unwrap()).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = client("https://api.example.com/api");
        let url = api.endpoint("users/email/a%40b.fr").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/api/users/email/a%40b.fr");
    }

    #[test]
    fn test_endpoint_with_query() {
        let api = client("https://api.example.com/api/");
        let url = api
            .endpoint_with_query("marketplace/search", &[("priceMin", "0"), ("priceMax", "10")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/marketplace/search?priceMin=0&priceMax=10"
        );

        let empty: [(&str, &str); 0] = [];
        let url = api.endpoint_with_query("marketplace/all", &empty).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_segment_encodes_email() {
        assert_eq!(segment("jean.dupont@exemple.fr"), "jean.dupont%40exemple.fr");
    }

    #[test]
    fn test_decode_empty_body_as_null() {
        let value: Option<serde_json::Value> = decode("").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_check_success() {
        let ok: SuccessResponse = serde_json::from_str(r#"{"success": 1}"#).unwrap();
        assert!(check_success(ok, "publish").is_ok());

        let refused: SuccessResponse =
            serde_json::from_str(r#"{"success": false, "message": "Carte déjà présente"}"#).unwrap();
        assert!(matches!(
            check_success(refused, "publish"),
            Err(ApiError::Rejected(reason)) if reason == "Carte déjà présente"
        ));
        assert!(matches!(
            check_success(SuccessResponse::default(), "publish"),
            Err(ApiError::Rejected(reason)) if reason == "publish failed"
        ));
    }

    #[test]
    fn test_not_found_detection() {
        assert!(ApiError::NotFound("/x".to_string()).is_not_found());
        assert!(
            ApiError::Status {
                status: 404,
                message: String::new()
            }
            .is_not_found()
        );
        assert!(
            !ApiError::Status {
                status: 500,
                message: String::new()
            }
            .is_not_found()
        );
    }
}
