//! HTTP transport layer.
//!
//! [`HttpTransport`] performs exactly one request attempt and maps the
//! outcome to either a JSON body or a domain [`Error`]. Retry, auth
//! selection and tracing live one level up, in the dispatcher.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use ih_domain::error::{Error, Result};
use reqwest::header::{HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Auth header attached to a request.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `X-API-Key: <key>`
    ApiKey(String),
    #[default]
    Anonymous,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// One fully-described API call. Sent unchanged on every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub credentials: Credentials,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            credentials: Credentials::Anonymous,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append `key=value` only when `value` is present.
    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Short label for logs, e.g. `GET /api/skills`.
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// A 2xx response: the status the server answered with and the decoded
/// body (`Null` when empty).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// A `200 OK` carrying `body`.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

/// Trait for the request-capable side of the connection.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform a single attempt. Non-2xx statuses become
    /// [`Error::Request`], network failures [`Error::Transport`] or
    /// [`Error::Timeout`].
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// reqwest transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Production transport backed by a pooled `reqwest::Client`.
///
/// The client is built lazily by reqwest: no socket is opened until the
/// first request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut rb = self
            .http
            .request(request.method.clone(), self.url(&request.path))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, concat!("ihuman-sdk-rust/", env!("CARGO_PKG_VERSION")));

        if !request.query.is_empty() {
            rb = rb.query(&request.query);
        }
        rb = match &request.credentials {
            Credentials::Bearer(token) => rb.bearer_auth(token),
            Credentials::ApiKey(key) => rb.header("X-API-Key", key),
            Credentials::Anonymous => rb,
        };
        if let Some(ref body) = request.body {
            rb = rb.json(body);
        }

        let resp = rb.send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let body = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Request {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        let body = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)?
        };
        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Message for a failed response: the body's `message` field when the
/// server sent one, otherwise `HTTP <status>`.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Transport`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Transport(e.to_string())
    }
}
