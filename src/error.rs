use thiserror::Error;

/// Failures raised by the REST client.
///
/// `Timeout`, `Network`, and 5xx `Http` errors are transient and retried by
/// the client up to its configured budget; `Api` (an application-level
/// `success: false` in a 200 response) and 4xx `Http` errors are not.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("network request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("API request failed: {0}")]
    Api(String),

    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ApiError {
    /// Whether the retry policy applies to this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Network(_) => true,
            ApiError::Http { status, .. } => *status >= 500,
            ApiError::Api(_) | ApiError::Decode(_) => false,
        }
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_by_variant() {
        assert!(ApiError::Timeout.is_retryable());
        assert!(
            ApiError::Http {
                status: 503,
                message: "unavailable".into()
            }
            .is_retryable()
        );
        assert!(
            !ApiError::Http {
                status: 404,
                message: "not found".into()
            }
            .is_retryable()
        );
        assert!(!ApiError::Api("rejected".into()).is_retryable());
    }
}
