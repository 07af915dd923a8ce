//! Rate-limit-aware HTTP client for the Discord REST API.
//!
//! All outbound calls go through [`RestClient`] so that auth headers, audit
//! reasons, 429 back-off and error mapping live in one place. There are two
//! entry points, [`RestClient::do_json`] and [`RestClient::do_multipart`];
//! they differ only in how the request body is framed.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::config::ProviderConfig;
use crate::error::{ApiError, Error, Result};
use crate::ratelimit::{sleep_or_cancel, RateLimitGate};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Attempts per call, counting the first one.
pub const MAX_ATTEMPTS: u32 = 10;

const AUDIT_LOG_REASON: &str = "x-audit-log-reason";
const RATE_LIMIT_GLOBAL: &str = "x-ratelimit-global";
const RATE_LIMIT_RESET_AFTER: &str = "x-ratelimit-reset-after";
const RETRY_AFTER: &str = "retry-after";

/// Fallback when neither the body nor the headers carry a usable delay.
const DEFAULT_RETRY_AFTER_S: f64 = 1.0;

// ---------------------------------------------------------------------------
// Request pieces
// ---------------------------------------------------------------------------

/// Ordered query parameters; keys may repeat.
pub type Query<'a> = &'a [(&'a str, &'a str)];

/// A single file attached to a multipart request.
#[derive(Debug, Clone, Default)]
pub struct FilePart {
    /// Form field name. Empty means "no file part".
    pub field_name: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Body framing, computed once and reused across retries.
enum Payload {
    Empty,
    Json(Vec<u8>),
    Multipart { content_type: String, body: Vec<u8> },
}

/// Parse an HTTP verb supplied by a caller (e.g. the API escape-hatch resource).
pub fn parse_method(verb: &str) -> Result<Method> {
    match verb.trim().to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(Error::InvalidMethod(verb.to_string())),
    }
}

/// Percent-encode an audit reason for the `X-Audit-Log-Reason` header.
pub fn encode_audit_reason(reason: &str) -> String {
    url::form_urlencoded::byte_serialize(reason.as_bytes()).collect()
}

// ---------------------------------------------------------------------------
// Rate-limit signal
// ---------------------------------------------------------------------------

/// What a 429 reply tells us about how long to back off.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitSignal {
    pub message: String,
    pub retry_after: f64,
    pub global: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    retry_after: f64,
    #[serde(default)]
    global: bool,
}

impl RateLimitSignal {
    /// Body first, then `Retry-After`, then `X-RateLimit-Reset-After`, then 1s.
    /// `global` is set by either the body flag or a `true` global header.
    pub fn from_response(body: &[u8], headers: &HeaderMap) -> Self {
        let parsed: RateLimitBody = serde_json::from_slice(body).unwrap_or_default();

        let retry_after = Some(parsed.retry_after)
            .filter(|v| usable_delay(*v))
            .or_else(|| header_f64(headers, RETRY_AFTER))
            .or_else(|| header_f64(headers, RATE_LIMIT_RESET_AFTER))
            .unwrap_or(DEFAULT_RETRY_AFTER_S);

        let global_header = headers
            .get(RATE_LIMIT_GLOBAL)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        Self {
            message: parsed.message,
            retry_after,
            global: parsed.global || global_header,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_after)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_RETRY_AFTER_S))
    }
}

fn usable_delay(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| usable_delay(*v))
}

// ---------------------------------------------------------------------------
// API error body
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

fn api_error(method: &Method, path: &str, status: StatusCode, body: &[u8]) -> ApiError {
    let err = ApiError::new(method.as_str(), path, status.as_u16());
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.message.is_empty() => {
            err.with_code(parsed.code).with_message(parsed.message)
        }
        _ => err.with_raw(String::from_utf8_lossy(body).into_owned()),
    }
}

// ---------------------------------------------------------------------------
// RestClient
// ---------------------------------------------------------------------------

struct Inner {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    gate: RateLimitGate,
}

/// Discord REST client. Cheap to clone (internals are behind `Arc`).
///
/// Each client owns its own [`RateLimitGate`].
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
}

impl RestClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent())
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: Url::parse(&config.api_url)?,
                token: config.token.clone(),
                gate: RateLimitGate::new(),
            }),
        })
    }

    pub fn gate(&self) -> &RateLimitGate {
        &self.inner.gate
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Send a JSON request and decode the reply into `T`.
    ///
    /// Returns `Ok(None)` for 204 or an empty body.
    pub async fn do_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
        query: Option<Query<'_>>,
        body: Option<&serde_json::Value>,
        audit_reason: Option<&str>,
    ) -> Result<Option<T>> {
        let payload = match body {
            Some(value) => Payload::Json(serde_json::to_vec(value)?),
            None => Payload::Empty,
        };
        let bytes = self
            .execute(cancel, method, path, query, payload, audit_reason)
            .await?;
        decode(bytes)
    }

    /// Like [`do_json`](Self::do_json) for callers that want no output.
    pub async fn do_json_discard(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
        query: Option<Query<'_>>,
        body: Option<&serde_json::Value>,
        audit_reason: Option<&str>,
    ) -> Result<()> {
        let payload = match body {
            Some(value) => Payload::Json(serde_json::to_vec(value)?),
            None => Payload::Empty,
        };
        self.execute(cancel, method, path, query, payload, audit_reason)
            .await?;
        Ok(())
    }

    /// Send a `multipart/form-data` request: one text part per field, in
    /// order, then at most one file part.
    #[allow(clippy::too_many_arguments)]
    pub async fn do_multipart<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
        query: Option<Query<'_>>,
        fields: &[(String, String)],
        file: Option<&FilePart>,
        audit_reason: Option<&str>,
    ) -> Result<Option<T>> {
        // A body of only the closing delimiter has no parts at all.
        let has_file = file.is_some_and(|f| !f.field_name.is_empty());
        if fields.is_empty() && !has_file {
            return Err(Error::EmptyMultipart);
        }
        let boundary = format!("DiscordProviderBoundary{:016x}", rand::random::<u64>());
        let body = build_multipart(&boundary, fields, file);
        let payload = Payload::Multipart {
            content_type: format!("multipart/form-data; boundary={boundary}"),
            body,
        };
        let bytes = self
            .execute(cancel, method, path, query, payload, audit_reason)
            .await?;
        decode(bytes)
    }

    /// `{base_url}{path}` plus the encoded query.
    pub fn build_url(&self, path: &str, query: Option<Query<'_>>) -> Url {
        let mut url = self.inner.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        if path.starts_with('/') {
            url.set_path(&format!("{base_path}{path}"));
        } else {
            url.set_path(&format!("{base_path}/{path}"));
        }
        url.set_query(None);
        if let Some(pairs) = query.filter(|q| !q.is_empty()) {
            url.query_pairs_mut().extend_pairs(pairs.iter());
        }
        url
    }

    // ------------------------------------------------------------------
    // Low-level: the single loop everything funnels through
    // ------------------------------------------------------------------

    /// Returns the raw body on 2xx, or `None` when there is nothing to decode.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
        query: Option<Query<'_>>,
        payload: Payload,
        audit_reason: Option<&str>,
    ) -> Result<Option<Vec<u8>>> {
        let url = self.build_url(path, query);
        let reason = audit_reason
            .filter(|r| !r.is_empty())
            .map(encode_audit_reason);

        for attempt in 1..=MAX_ATTEMPTS {
            self.inner.gate.wait(cancel).await?;

            let request = self.build_request(&method, &url, &payload, reason.as_deref());
            debug!(method = %method, path, attempt, "sending discord request");

            let (status, headers, body) = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = round_trip(request) => result?,
            };

            if status == StatusCode::TOO_MANY_REQUESTS {
                let signal = RateLimitSignal::from_response(&body, &headers);
                let delay = signal.delay();
                warn!(
                    method = %method,
                    path,
                    attempt,
                    retry_after_s = signal.retry_after,
                    global = signal.global,
                    "rate-limited by Discord, backing off"
                );
                if signal.global {
                    self.inner.gate.set_cooldown(delay).await;
                }
                sleep_or_cancel(delay, cancel).await?;
                continue;
            }

            if !status.is_success() {
                let err = api_error(&method, path, status, &body);
                debug!(error = %err, "discord request failed");
                return Err(err.into());
            }

            if status == StatusCode::NO_CONTENT || body.is_empty() {
                return Ok(None);
            }
            return Ok(Some(body));
        }

        Err(ApiError::new(method.as_str(), path, 429)
            .with_message("exceeded rate limit retry attempts")
            .into())
    }

    fn build_request(
        &self,
        method: &Method,
        url: &Url,
        payload: &Payload,
        encoded_reason: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, format!("Bot {}", self.inner.token))
            .header(ACCEPT, "application/json");

        if let Some(reason) = encoded_reason {
            builder = builder.header(AUDIT_LOG_REASON, reason);
        }

        match payload {
            Payload::Empty => builder,
            Payload::Json(bytes) if bytes.is_empty() => builder,
            Payload::Json(bytes) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.clone()),
            Payload::Multipart { content_type, body } => builder
                .header(CONTENT_TYPE, content_type.as_str())
                .body(body.clone()),
        }
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Send and read the whole body so the connection is released.
async fn round_trip(request: reqwest::RequestBuilder) -> Result<(StatusCode, HeaderMap, Vec<u8>)> {
    let response = request.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Ok((status, headers, body.to_vec()))
}

fn decode<T: DeserializeOwned>(bytes: Option<Vec<u8>>) -> Result<Option<T>> {
    match bytes {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Build a multipart/form-data body as raw bytes.
///
/// Text fields come first in the given order. `payload_json` is labelled
/// `application/json` as Discord expects. An empty `field_name` on the file
/// means no file part at all. Callers must supply at least one part.
fn build_multipart(boundary: &str, fields: &[(String, String)], file: Option<&FilePart>) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::new();

    for (name, value) in fields {
        buf.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n",
                escape_quoted(name)
            )
            .as_bytes(),
        );
        if name == "payload_json" {
            buf.extend_from_slice(b"Content-Type: application/json\r\n");
        }
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    if let Some(file) = file.filter(|f| !f.field_name.is_empty()) {
        buf.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quoted(&file.field_name),
                escape_quoted(&file.file_name)
            )
            .as_bytes(),
        );
        buf.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        buf.extend_from_slice(&file.bytes);
        buf.extend_from_slice(b"\r\n");
    }

    // Closing boundary.
    buf.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    buf
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\r', "%0D")
        .replace('\n', "%0A")
        .replace('"', "%22")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
