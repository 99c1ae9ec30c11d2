use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single call to the tracker API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server error {status}")]
    Server { status: StatusCode },
    #[error("unexpected http status {status}")]
    Http { status: StatusCode },
    #[error("{message}")]
    Rejected { message: String },
    #[error("failed to parse response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether sending the same request later could succeed. Only these failures are queued for
    /// the sync daemon, everything else is reported right away.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Server { .. })
    }

    pub(crate) fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            ApiError::Server { status }
        } else {
            ApiError::Http { status }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ApiError::Decode(value.to_string())
        } else {
            ApiError::Transport(value.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::ApiError;

    #[test]
    fn only_transport_and_server_errors_are_retryable() {
        assert!(ApiError::Transport("timeout".into()).is_retryable());
        assert!(ApiError::from_status(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!ApiError::from_status(StatusCode::NOT_FOUND).is_retryable());
        assert!(!ApiError::Rejected {
            message: "Invalid credentials".into()
        }
        .is_retryable());
        assert!(!ApiError::Decode("eof".into()).is_retryable());
    }
}
