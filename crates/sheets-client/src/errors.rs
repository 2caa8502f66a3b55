use common::retry::Retryable;
use thiserror::Error;

/// Errors raised by a single HTTP call against the host APIs.
///
/// Classification drives the retry loop: rate-limit responses and server
/// errors back off and retry, client errors fail the call immediately.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decoding response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Retryable for ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Server { .. } => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { .. } | Self::Decode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        assert!(ClientError::Server { status: 503 }.is_retryable());
        assert!(ClientError::RateLimited.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = ClientError::Status {
            status: 404,
            message: "not found".into(),
        };
        assert!(!err.is_retryable());

        let decode: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!ClientError::Decode(decode).is_retryable());
    }
}
