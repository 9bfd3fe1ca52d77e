//! Transport adapter: the single seam between the dispatcher and the network.
//!
//! The dispatcher only needs `execute(request) -> response | failure`. The failure
//! type keeps the shapes the error classifier distinguishes (explicit response
//! status, generic status code, or neither), so alternative transports and test
//! doubles can report failures the same way the reqwest implementation does.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Fixed per-request timeout bounding the worst-case latency of a single call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// A fully resolved outbound request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A successful (2xx) response with its decoded JSON body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest)
        -> Result<TransportResponse, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-2xx status.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    #[error("Request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("Invalid response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// Failure raised by a non-HTTP transport, optionally with its own status code.
    #[error("Transport error: {message}")]
    Other {
        message: String,
        code: Option<String>,
    },
}

impl TransportError {
    /// Build a status failure, preferring the remote `error.message` field for the text.
    pub fn from_status(status: u16, body: Option<Value>) -> Self {
        let message = body
            .as_ref()
            .and_then(|b| b.pointer("/error/message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status code {}", status));
        TransportError::Status {
            status,
            message,
            body,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        TransportError::Other {
            message: message.into(),
            code: None,
        }
    }

    /// The HTTP status of the response that caused the failure, if one was received.
    pub fn response_status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_failure_prefers_remote_message() {
        let err = TransportError::from_status(
            404,
            Some(json!({"error": {"code": "DeploymentNotFound", "message": "The API deployment for this resource does not exist."}})),
        );
        assert_eq!(
            err.to_string(),
            "The API deployment for this resource does not exist."
        );
        assert_eq!(err.response_status(), Some(404));
    }

    #[test]
    fn status_failure_without_body_uses_generic_text() {
        let err = TransportError::from_status(502, None);
        assert_eq!(err.to_string(), "Request failed with status code 502");
    }

    #[test]
    fn request_headers_lookup_is_case_insensitive() {
        let req = TransportRequest::post("http://localhost/x", json!({}))
            .header("api-key", "secret")
            .header("Content-Type", "application/json");
        assert_eq!(req.header_value("API-KEY"), Some("secret"));
        assert_eq!(req.timeout, REQUEST_TIMEOUT);
        assert_eq!(req.method.as_str(), "POST");
        assert!(TransportError::other("boom").response_status().is_none());
    }
}
