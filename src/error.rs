// Error handling module
// Defines the client error taxonomy and backend response mapping

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors surfaced by the session manager and the API client.
///
/// Every variant carries owned strings so the error is `Clone`; a single
/// refresh result is handed to every task waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Bad username/password at login; the server's message, verbatim
    #[error("{0}")]
    Credentials(String),

    /// 401 on an authenticated call that could not be recovered
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Refresh was requested without a stored refresh token
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// The backend rejected the refresh token
    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    /// A logout or new login superseded this operation while it was in flight
    #[error("Session ended before the operation completed")]
    SessionEnded,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    Server(String),

    /// Any other non-success status
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Transport failure; the backend was never reached or never answered
    #[error("Network error ({kind}): {message}")]
    Network { kind: String, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Durable credential store failure
    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Map a non-success status and its body to an error
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = extract_detail(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::Server(message),
            code => ApiError::Api {
                status: code,
                message,
            },
        }
    }

    /// Map a failed login response. 400 and 401 are credential problems.
    pub fn from_login_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            400 | 401 => ApiError::Credentials(extract_detail(body)),
            _ => Self::from_status(status, body),
        }
    }

    /// Map a failed refresh response. Any rejection ends the session.
    pub fn from_refresh_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            400 | 401 | 403 | 422 => ApiError::RefreshFailed(extract_detail(body)),
            _ => Self::from_status(status, body),
        }
    }

    /// Status code the backend answered with, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited => Some(429),
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Credentials(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::AccessDenied(msg)
            | ApiError::NotFound(msg)
            | ApiError::Server(msg) => msg.clone(),
            ApiError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        // Categorize the error for better debugging
        let kind = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connection_failed"
        } else if e.is_request() {
            "request_error"
        } else if e.is_body() {
            "body_error"
        } else if e.is_decode() {
            "decode_error"
        } else {
            "unknown"
        };

        ApiError::Network {
            kind: kind.to_string(),
            message: e.to_string(),
        }
    }
}

/// Pull the human-readable message out of a backend error body.
///
/// The backend answers `{"detail": "..."}` for most failures and
/// `{"detail": [{"msg": "..."}, ...]}` for validation failures. Anything
/// else falls back to the (truncated) raw body.
pub fn extract_detail(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        match json.get("detail") {
            Some(Value::String(s)) => return s.clone(),
            Some(Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !msgs.is_empty() {
                    return msgs.join("; ");
                }
            }
            _ => {}
        }
        if let Some(msg) = json.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }
    truncate_body(body)
}

/// Truncate a response body to avoid logging excessive data
pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}... (truncated, {} total bytes)",
        &body[..end],
        body.len()
    )
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
