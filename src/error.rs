//! Error types shared by the relays and the backend client.

use thiserror::Error;

/// Failures talking to the backend search service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unable to connect to the server ({url}). Make sure the backend server is running.")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("Received invalid response from server: {0}")]
    Decode(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// Failures moving messages between extension contexts.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Could not establish connection. Receiving end does not exist.")]
    NoReceiver,

    #[error("The message port closed before a response was received.")]
    NoResponse,

    #[error("No active tab found")]
    NoActiveTab,

    #[error("Cannot inject into this page: {0}")]
    UnsupportedPage(String),

    #[error("Page did not become ready within {0} ms")]
    ReadyTimeout(u64),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Failed to load chat interface: {0}")]
    Injection(String),

    #[error("Please enter a search query.")]
    EmptyQuery,

    #[error("Invalid selector `{0}`")]
    Selector(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Failure reported by another context, already user-readable.
    #[error("{0}")]
    Remote(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_code() {
        let err = ApiError::Status(500);
        assert_eq!(err.to_string(), "HTTP error! status: 500");
    }

    #[test]
    fn test_decode_error() {
        let err = ApiError::Decode("expected value".to_string());
        assert!(err.to_string().contains("invalid response"));
    }

    #[test]
    fn test_no_receiver_message() {
        let err = RelayError::NoReceiver;
        assert!(err.to_string().contains("Receiving end does not exist"));
    }

    #[test]
    fn test_ready_timeout() {
        let err = RelayError::ReadyTimeout(2000);
        assert!(err.to_string().contains("2000 ms"));
    }

    #[test]
    fn test_relay_error_from_api() {
        let err: RelayError = ApiError::Status(404).into();
        assert!(matches!(err, RelayError::Api(ApiError::Status(404))));
        assert_eq!(err.to_string(), "HTTP error! status: 404");
    }

    #[test]
    fn test_empty_query_prompt() {
        assert_eq!(RelayError::EmptyQuery.to_string(), "Please enter a search query.");
    }
}
