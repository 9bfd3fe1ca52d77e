//! Coarse failure classes attached to error records.
//!
//! | Class | Typical cause |
//! |-------|---------------|
//! | `invalid_request` | 400, malformed body or unsupported parameter |
//! | `authentication` | 401, wrong or expired `api-key` |
//! | `permission_denied` | 403 |
//! | `not_found` | 404, unknown deployment or API version |
//! | `rate_limited` | 429 |
//! | `server_error` / `overloaded` | 5xx |
//! | `timeout` | 408, 504, or the local 60 s request timeout |
//! | `connection` | no response received |

use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    InvalidRequest,
    Authentication,
    PermissionDenied,
    NotFound,
    RequestTooLarge,
    RateLimited,
    ServerError,
    Overloaded,
    Timeout,
    Conflict,
    Connection,
    Unknown,
}

impl FailureClass {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::Conflict => "conflict",
            Self::Connection => "connection",
            Self::Unknown => "unknown",
        }
    }

    /// True when the same request could plausibly succeed later. Informational only:
    /// nothing is retried automatically.
    #[inline]
    pub fn transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::ServerError
                | Self::Overloaded
                | Self::Timeout
                | Self::Conflict
                | Self::Connection
        )
    }

    /// Maps an HTTP status code to the most likely class.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimited,
            503 => Self::Overloaded,
            504 => Self::Timeout,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for FailureClass {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}
