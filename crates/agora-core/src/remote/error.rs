use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unauthorized - API key may be invalid")]
    Unauthorized,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl RemoteError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => RemoteError::Unauthorized,
            404 | 406 => RemoteError::NotFound(truncated),
            408 | 504 => RemoteError::Timeout,
            429 => RemoteError::RateLimited,
            500..=599 => RemoteError::ServerError(truncated),
            _ => RemoteError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Every failure except `NotFound` means the backend could not answer.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, RemoteError::NotFound(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            RemoteError::from_status(StatusCode::NOT_FOUND, "missing"),
            RemoteError::NotFound(_)
        ));
        assert!(matches!(
            RemoteError::from_status(StatusCode::GATEWAY_TIMEOUT, ""),
            RemoteError::Timeout
        ));
        assert!(matches!(
            RemoteError::from_status(StatusCode::SERVICE_UNAVAILABLE, "down"),
            RemoteError::ServerError(_)
        ));
        assert!(matches!(
            RemoteError::from_status(StatusCode::CONFLICT, "dup"),
            RemoteError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_is_unavailable() {
        assert!(!RemoteError::NotFound("x".into()).is_unavailable());
        assert!(RemoteError::Timeout.is_unavailable());
        assert!(RemoteError::Unauthorized.is_unavailable());
    }

    #[test]
    fn test_truncate_body() {
        let body = "é".repeat(400);
        let truncated = RemoteError::truncate_body(&body);
        assert!(truncated.contains("truncated, 800 total bytes"));
        assert_eq!(RemoteError::truncate_body("short"), "short");
    }
}
