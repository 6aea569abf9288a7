use folio_common::CommonRequestError;
use thiserror::Error;

/// Errors that can occur when talking to the folio relays
#[derive(Debug, Error)]
pub enum RelayError {
    /// Transport, decoding and relay-reported failures
    #[error(transparent)]
    Request(#[from] CommonRequestError),

    /// Missing API key
    #[error("Missing API key (set FOLIO_API_KEY)")]
    MissingApiKey,

    /// Missing functions base URL
    #[error("Missing functions URL (set FOLIO_FUNCTIONS_URL)")]
    MissingBaseUrl,

    /// Environment value present but unusable
    #[error("Invalid value for {name}: {reason}")]
    InvalidConfig { name: &'static str, reason: String },

    /// Input rejected before any request was made
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl RelayError {
    /// Shorthand for [`RelayError::Validation`]
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Message returned by the relay, when the failure came from a non-success response
    pub fn api_message(&self) -> Option<&str> {
        match self {
            RelayError::Request(CommonRequestError::Api { message, .. }) => Some(message),
            _ => None,
        }
    }
}
