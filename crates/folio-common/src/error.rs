use thiserror::Error;

/// Errors shared by every relay request
#[derive(Error, Debug)]
pub enum CommonRequestError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The relay answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message extracted from the error body
        message: String,
    },

    /// Success status but a body we could not make sense of
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Text stuck behind a data line that failed to parse grew past the configured limit
    #[error("{pending} bytes stuck behind an unparseable stream line, limit is {limit}")]
    PendingOverflow {
        /// Bytes held when the limit was hit
        pending: usize,
        /// Configured limit
        limit: usize,
    },
}

/// Parse error response from HTTP status and body
pub fn parse_error_response(status: reqwest::StatusCode, body: &bytes::Bytes) -> CommonRequestError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|json| extract_error_message(&json))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    CommonRequestError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Extract error message from the JSON error shapes the functions return
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    // Function handlers: {"error": "..."}
    if let Some(error) = json.get("error") {
        if let Some(msg) = error.as_str() {
            return Some(msg.to_string());
        }
        // Gateway format: {"error": {"message": "..."}}
        if let Some(msg) = error.get("message").and_then(|m| m.as_str()) {
            return Some(msg.to_string());
        }
    }

    // Generic message field
    json.get("message")
        .and_then(|m| m.as_str())
        .map(ToString::to_string)
}
