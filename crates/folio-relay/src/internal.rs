use folio_common::{
    BoxStream, ChatMessage, CommonRequestError,
    request_builder::{AuthMethod, Endpoint, RequestBuilder, RequestConfig},
};

use crate::contact::{ContactAck, ContactForm};

/// Relay calls expressed over the common RequestBuilder
pub struct RelayRequestHelper {
    request_builder: RequestBuilder,
    chat_path: String,
    contact_path: String,
    pending_limit: Option<usize>,
}

impl RelayRequestHelper {
    /// Helper for the gateway at `base_url` with the given function paths
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: &str,
        access_token: Option<&str>,
        chat_path: &str,
        contact_path: &str,
    ) -> Self {
        // The gateway wants the project key in `apikey` and the caller's
        // identity as bearer; anonymous callers present the key twice.
        let config = RequestConfig::new(base_url)
            .with_auth(AuthMethod::ApiKey {
                header_name: "apikey".to_string(),
                key: api_key.to_string(),
            })
            .with_auth(AuthMethod::Bearer(
                access_token.unwrap_or(api_key).to_string(),
            ))
            .with_user_agent(concat!("folio-relay/", env!("CARGO_PKG_VERSION")));

        Self {
            request_builder: RequestBuilder::new(client, config),
            chat_path: chat_path.to_string(),
            contact_path: contact_path.to_string(),
            pending_limit: None,
        }
    }

    /// Pending limit handed to every chat decoder
    pub fn with_pending_limit(mut self, pending_limit: Option<usize>) -> Self {
        self.pending_limit = pending_limit;
        self
    }

    /// Stream the assistant reply to `history` as text deltas
    pub fn stream_chat(
        &self,
        history: &[ChatMessage],
    ) -> BoxStream<'static, Result<String, CommonRequestError>> {
        let endpoint = Endpoint::new(&self.chat_path);
        self.request_builder
            .stream_deltas(&endpoint, history, self.pending_limit)
    }

    /// Post a validated contact form
    pub async fn submit_contact(&self, form: &ContactForm) -> Result<ContactAck, CommonRequestError> {
        let endpoint = Endpoint::new(&self.contact_path);
        self.request_builder.request_json(&endpoint, Some(form)).await
    }
}
