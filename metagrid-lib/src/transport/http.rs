//! reqwest-based transport

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::WWW_AUTHENTICATE;
use serde_json::Value;
use url::Url;

use super::ApiRequest;
use super::TokenProvider;
use super::Transport;
use super::Verb;
use crate::error::ApiError;
use crate::model::value_text;

/// Transport over HTTPS with an optional bearer token.
///
/// Cheap to clone.
///
/// # Example
///
/// ```ignore
/// use metagrid_lib::transport::{HttpTransport, StaticTokenProvider};
///
/// let transport = HttpTransport::builder()
///     .base_url("https://api.example.org/api/")
///     .token_provider(StaticTokenProvider::new("token"))
///     .lang_id("2")
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    base_url: Url,
    token_provider: Option<Arc<dyn TokenProvider>>,
    http_client: Client,
    timeout: Option<Duration>,
    lang_id: Option<String>,
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder<Missing> {
        HttpTransportBuilder::new()
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn build_url(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = self
            .inner
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", request.path, e)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

fn method(verb: Verb) -> Method {
    match verb {
        Verb::Get => Method::GET,
        Verb::Post => Method::POST,
        Verb::Put => Method::PUT,
        Verb::Delete => Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.build_url(&request)?;
        log::debug!("{} {}", request.verb, url);

        let mut builder = self.inner.http_client.request(method(request.verb), url);

        if let Some(provider) = &self.inner.token_provider {
            let token = provider.get_token().await?;
            builder = builder.bearer_auth(&token.access_token);
        }
        if let Some(lang_id) = &self.inner.lang_id {
            builder = builder.header("LangId", lang_id);
        }
        if let Some(timeout) = self.inner.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.inner.timeout.unwrap_or_default())
            } else {
                ApiError::from(e)
            }
        })?;

        let status = response.status();
        let expired = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .is_some_and(|h| h.contains("expired"));
        let body = response.text().await.map_err(ApiError::from)?;

        if status.is_success() {
            Ok(parse_body(&body))
        } else {
            Err(status_error(status, expired, &body))
        }
    }
}

/// Decodes a success body; empty is null, non-JSON text is kept as a string.
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

fn status_error(status: StatusCode, expired: bool, body: &str) -> ApiError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized { expired },
        _ => server_error(status, body),
    }
}

fn server_error(status: StatusCode, body: &str) -> ApiError {
    let fallback = || {
        if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("Request failed").to_string()
        } else {
            body.to_string()
        }
    };

    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body) else {
        return ApiError::server(status.as_u16(), fallback());
    };

    let message = ["message", "title", "error"]
        .iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()).map(value_text))
        .unwrap_or_else(fallback);

    let mut field_errors = Vec::new();
    match obj.get("errors") {
        Some(Value::Object(errors)) => {
            for value in errors.values() {
                match value {
                    Value::Array(items) => field_errors.extend(items.iter().map(value_text)),
                    other => field_errors.push(value_text(other)),
                }
            }
        }
        Some(Value::Array(items)) => field_errors.extend(items.iter().map(value_text)),
        _ => {}
    }

    ApiError::Server {
        status: status.as_u16(),
        message,
        field_errors,
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for [`HttpTransport`]; `base_url` is required.
pub struct HttpTransportBuilder<U> {
    base_url: U,
    token_provider: Option<Arc<dyn TokenProvider>>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    lang_id: Option<String>,
    http_client: Option<Client>,
}

impl HttpTransportBuilder<Missing> {
    pub fn new() -> Self {
        Self {
            base_url: Missing,
            token_provider: None,
            timeout: None,
            connect_timeout: None,
            lang_id: None,
            http_client: None,
        }
    }

    pub fn base_url(self, url: impl Into<String>) -> HttpTransportBuilder<Set<String>> {
        HttpTransportBuilder {
            base_url: Set(url.into()),
            token_provider: self.token_provider,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            lang_id: self.lang_id,
            http_client: self.http_client,
        }
    }
}

impl Default for HttpTransportBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> HttpTransportBuilder<U> {
    pub fn token_provider<T: TokenProvider + 'static>(mut self, provider: T) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Applied when the HTTP client is built here.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Language id sent in the `LangId` header.
    pub fn lang_id(mut self, lang_id: impl Into<String>) -> Self {
        self.lang_id = Some(lang_id.into());
        self
    }

    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl HttpTransportBuilder<Set<String>> {
    pub fn build(self) -> Result<HttpTransport, ApiError> {
        let raw = self.base_url.0;
        let normalized = if raw.ends_with('/') { raw } else { format!("{}/", raw) };
        let base_url = Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", normalized, e)))?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                builder.build().map_err(ApiError::from)?
            }
        };

        Ok(HttpTransport {
            inner: Arc::new(HttpTransportInner {
                base_url,
                token_provider: self.token_provider,
                http_client,
                timeout: self.timeout,
                lang_id: self.lang_id,
            }),
        })
    }
}
