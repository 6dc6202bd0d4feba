use hyper::StatusCode;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("invalid relay target '{target}': {details}")]
    InvalidTarget { target: String, details: String },

    #[error("upstream request to '{target}' failed: {details}")]
    Upstream { target: String, details: String },

    #[error("response relay failed: {0}")]
    Stream(String),

    #[error("could not load landing document: {0}")]
    Landing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl RelayError {
    /// Machine-readable error kind carried in the JSON error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::InvalidTarget { .. } => "invalid_target",
            RelayError::Upstream { .. } => "upstream_failed",
            RelayError::Stream(_) => "relay_failed",
            RelayError::Landing(_) => "landing_unavailable",
            RelayError::Io(_) => "io_error",
            RelayError::Http(_) => "http_error",
        }
    }

    /// Status code for the error response sent to the caller.
    ///
    /// Validation failures are the caller's fault (4xx); everything else
    /// maps to a 5xx. A `Stream` error can only occur after the response
    /// head was already flushed, so its status is never actually sent.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidTarget { .. } => StatusCode::BAD_REQUEST,
            RelayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            RelayError::Landing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Stream(_) | RelayError::Io(_) | RelayError::Http(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON payload for the error response body.
    ///
    /// The attempted target is echoed back for diagnosis when one exists.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RelayError::InvalidTarget { target, details } => json!({
                "error": "Invalid proxy target",
                "kind": self.kind(),
                "details": details,
                "target": target,
            }),
            RelayError::Upstream { target, details } => json!({
                "error": "Proxy request failed",
                "kind": self.kind(),
                "details": details,
                "target": target,
            }),
            RelayError::Landing(details) => json!({
                "error": "Could not load landing document",
                "kind": self.kind(),
                "details": details,
            }),
            other => json!({
                "error": "Relay error",
                "kind": other.kind(),
                "details": other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_client_side() {
        let err = RelayError::InvalidTarget {
            target: "not-a-url".to_string(),
            details: "relative URL without a base".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "invalid_target");

        let payload = err.to_json();
        assert_eq!(payload["target"], "not-a-url");
        assert_eq!(payload["kind"], "invalid_target");
    }

    #[test]
    fn test_transport_errors_are_server_side() {
        let err = RelayError::Upstream {
            target: "http://example.com/".to_string(),
            details: "connection refused".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_json()["error"], "Proxy request failed");
        assert_eq!(err.to_json()["target"], "http://example.com/");
    }
}
