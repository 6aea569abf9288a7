use bon::Builder;
use folio_common::{BoxStream, ChatMessage};
use futures_util::StreamExt;
use log::debug;

use crate::{
    RelayError,
    contact::{ContactAck, ContactForm},
    internal::RelayRequestHelper,
};

/// Function name of the chat relay
pub const DEFAULT_CHAT_PATH: &str = "chat";

/// Function name of the contact-form relay
pub const DEFAULT_CONTACT_PATH: &str = "send-contact-email";

/// Client for the portfolio's hosted functions
#[derive(Debug, Clone, Builder)]
pub struct FolioRelay {
    /// Public project key, sent on every request
    #[builder(into)]
    api_key: String,

    /// Base URL of the functions gateway, e.g. `https://<project>.example.co/functions/v1`
    #[builder(into)]
    pub base_url: String,

    /// Session token of a signed-in user
    #[builder(into)]
    access_token: Option<String>,

    /// Function path of the chat relay
    #[builder(default = DEFAULT_CHAT_PATH.to_string(), into)]
    chat_path: String,

    /// Function path of the contact-form relay
    #[builder(default = DEFAULT_CONTACT_PATH.to_string(), into)]
    contact_path: String,

    /// Most bytes the stream decoder may hold behind a data line that failed to parse
    pending_limit: Option<usize>,

    /// HTTP client for making requests
    #[builder(default)]
    client: reqwest::Client,
}

impl FolioRelay {
    /// Create a client for the given gateway with default paths
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::builder().base_url(base_url).api_key(api_key).build()
    }

    /// Create a client from `FOLIO_FUNCTIONS_URL`, `FOLIO_API_KEY`,
    /// `FOLIO_ACCESS_TOKEN` and `FOLIO_PENDING_LIMIT`
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a client from configuration values fetched by name
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let base_url = lookup("FOLIO_FUNCTIONS_URL").ok_or(RelayError::MissingBaseUrl)?;
        let api_key = lookup("FOLIO_API_KEY").ok_or(RelayError::MissingApiKey)?;
        let access_token = lookup("FOLIO_ACCESS_TOKEN");

        let pending_limit = lookup("FOLIO_PENDING_LIMIT")
            .map(|raw| {
                raw.trim()
                    .parse::<usize>()
                    .map_err(|e| RelayError::InvalidConfig {
                        name: "FOLIO_PENDING_LIMIT",
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        Ok(Self::builder()
            .base_url(base_url)
            .api_key(api_key)
            .maybe_access_token(access_token)
            .maybe_pending_limit(pending_limit)
            .build())
    }

    /// Act on behalf of a signed-in user
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    /// Request helper carrying this client's configuration
    fn request_helper(&self) -> RelayRequestHelper {
        RelayRequestHelper::new(
            self.client.clone(),
            &self.base_url,
            &self.api_key,
            self.access_token.as_deref(),
            &self.chat_path,
            &self.contact_path,
        )
        .with_pending_limit(self.pending_limit)
    }

    /// Stream the assistant reply to `history` as text deltas.
    ///
    /// A non-success response surfaces as a single error item. Dropping the
    /// stream aborts the underlying read.
    pub fn stream_chat(
        &self,
        history: &[ChatMessage],
    ) -> BoxStream<'static, Result<String, RelayError>> {
        debug!("Streaming chat reply for {} messages", history.len());
        self.request_helper()
            .stream_chat(history)
            .map(|delta| delta.map_err(RelayError::from))
            .boxed()
    }

    /// Wait for the whole reply to `history`
    pub async fn collect_reply(&self, history: &[ChatMessage]) -> Result<String, RelayError> {
        let mut stream = self.stream_chat(history);
        let mut reply = String::new();
        while let Some(delta) = stream.next().await {
            reply.push_str(&delta?);
        }
        Ok(reply)
    }

    /// Validate and submit a contact form
    pub async fn submit_contact(&self, form: &ContactForm) -> Result<ContactAck, RelayError> {
        let form = form.validated()?;
        Ok(self.request_helper().submit_contact(&form).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_reads_all_settings() {
        let relay = FolioRelay::from_lookup(lookup_in(&[
            ("FOLIO_FUNCTIONS_URL", "https://example.com/functions/v1"),
            ("FOLIO_API_KEY", "anon"),
            ("FOLIO_ACCESS_TOKEN", "jwt"),
            ("FOLIO_PENDING_LIMIT", " 4096 "),
        ]))
        .unwrap();

        assert_eq!(relay.base_url, "https://example.com/functions/v1");
        assert_eq!(relay.api_key, "anon");
        assert_eq!(relay.access_token.as_deref(), Some("jwt"));
        assert_eq!(relay.pending_limit, Some(4096));
        assert_eq!(relay.chat_path, DEFAULT_CHAT_PATH);
    }

    #[test]
    fn test_from_lookup_optional_settings_absent() {
        let relay = FolioRelay::from_lookup(lookup_in(&[
            ("FOLIO_FUNCTIONS_URL", "https://example.com"),
            ("FOLIO_API_KEY", "anon"),
        ]))
        .unwrap();

        assert!(relay.access_token.is_none());
        assert!(relay.pending_limit.is_none());
    }

    #[test]
    fn test_from_lookup_missing_base_url() {
        let result = FolioRelay::from_lookup(lookup_in(&[("FOLIO_API_KEY", "anon")]));
        assert!(matches!(result, Err(RelayError::MissingBaseUrl)));
    }

    #[test]
    fn test_from_lookup_missing_api_key() {
        let result =
            FolioRelay::from_lookup(lookup_in(&[("FOLIO_FUNCTIONS_URL", "https://example.com")]));
        assert!(matches!(result, Err(RelayError::MissingApiKey)));
    }

    #[test]
    fn test_from_lookup_rejects_non_numeric_pending_limit() {
        let result = FolioRelay::from_lookup(lookup_in(&[
            ("FOLIO_FUNCTIONS_URL", "https://example.com"),
            ("FOLIO_API_KEY", "anon"),
            ("FOLIO_PENDING_LIMIT", "lots"),
        ]));
        assert!(matches!(
            result,
            Err(RelayError::InvalidConfig {
                name: "FOLIO_PENDING_LIMIT",
                ..
            })
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let relay = FolioRelay::builder()
            .base_url("https://example.com/functions/v1")
            .api_key("anon")
            .build();

        assert_eq!(relay.chat_path, DEFAULT_CHAT_PATH);
        assert_eq!(relay.contact_path, DEFAULT_CONTACT_PATH);
        assert!(relay.access_token.is_none());
        assert!(relay.pending_limit.is_none());
    }

    #[test]
    fn test_with_access_token() {
        let relay = FolioRelay::new("https://example.com", "anon").with_access_token("jwt");
        assert_eq!(relay.access_token.as_deref(), Some("jwt"));
    }
}
