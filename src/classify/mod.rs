//! Error classification: transport failure → normalized error record, plus the
//! run-level continue/abort policy.

mod class;

pub use class::FailureClass;

use crate::transport::TransportError;
use crate::Error;
use serde::{Serialize, Serializer};
use std::fmt;

/// Status indicator recovered from a failure: an HTTP status, a transport-specific
/// code, or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCode {
    Http(u16),
    Code(String),
    Unknown,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Http(status) => write!(f, "{}", status),
            StatusCode::Code(code) => f.write_str(code),
            StatusCode::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for StatusCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            StatusCode::Http(status) => serializer.serialize_u16(*status),
            StatusCode::Code(code) => serializer.serialize_str(code),
            StatusCode::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    #[serde(rename = "error")]
    pub message: String,
    #[serde(rename = "status")]
    pub status_code: StatusCode,
    pub class: FailureClass,
}

/// Reduce whichever failure shape the transport raised to an [`ErrorRecord`].
pub fn classify(err: &TransportError) -> ErrorRecord {
    let message = match err {
        TransportError::Status { message, .. } | TransportError::Other { message, .. } => {
            message.clone()
        }
        other => other.to_string(),
    };
    let message = if message.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        message
    };

    let status_code = match (err.response_status(), err) {
        (Some(status), _) => StatusCode::Http(status),
        (None, TransportError::Other { code: Some(code), .. }) => StatusCode::Code(code.clone()),
        _ => StatusCode::Unknown,
    };

    let class = match (&status_code, err) {
        (StatusCode::Http(status), _) => FailureClass::from_http_status(*status),
        (_, TransportError::Timeout { .. }) => FailureClass::Timeout,
        (_, TransportError::Http(e)) if e.is_timeout() => FailureClass::Timeout,
        (_, TransportError::Http(e)) if e.is_connect() || e.is_request() => {
            FailureClass::Connection
        }
        _ => FailureClass::Unknown,
    };

    ErrorRecord {
        message,
        status_code,
        class,
    }
}

/// What happens to a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Emit the failure as an inline error record and keep going.
    Continue,
    /// Abort the whole run; no partial output is returned.
    Abort,
}

impl FailurePolicy {
    pub fn from_continue_on_failure(continue_on_failure: bool) -> Self {
        if continue_on_failure {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        }
    }

    /// Apply the policy to the failure of item `index`.
    pub fn apply(&self, index: usize, err: &TransportError) -> crate::Result<ErrorRecord> {
        let record = classify(err);
        match self {
            FailurePolicy::Continue => Ok(record),
            FailurePolicy::Abort => Err(escalate(index, record)),
        }
    }
}

/// Turn an error record into the run-level fatal error.
pub fn escalate(index: usize, record: ErrorRecord) -> Error {
    Error::RunAborted {
        index,
        description: format!(
            "Status: {}. Check your credentials and deployment configuration.",
            record.status_code
        ),
        message: record.message,
    }
}
