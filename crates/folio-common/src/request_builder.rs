use crate::{
    error::{self, CommonRequestError},
    streaming::{ChunkDecoder, decode_response},
};
use async_stream::try_stream;
use futures_util::{
    StreamExt,
    stream::{self, BoxStream},
};
use log::{debug, warn};
use reqwest::{RequestBuilder as ReqwestRequestBuilder, Response};
use serde::{Deserialize, Serialize};

/// Authentication attached to every request
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Bearer token authentication (Authorization: Bearer <token>)
    Bearer(String),
    /// API key header (e.g., apikey: <key>)
    ApiKey {
        /// Header carrying the key
        header_name: String,
        /// The key itself
        key: String,
    },
}

/// A relay function, reached with `POST {base_url}/{path}`
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Function path relative to the base URL
    pub path: String,
}

impl Endpoint {
    /// Endpoint for the function at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Configuration for request building
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Gateway URL every endpoint path is joined onto
    pub base_url: String,
    /// Applied in order to every request
    pub auth: Vec<AuthMethod>,
    /// Value of the `user-agent` header
    pub user_agent: Option<String>,
}

impl RequestConfig {
    /// Configuration without auth or user agent
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: Vec::new(),
            user_agent: None,
        }
    }

    /// Add an authentication method; several may be combined
    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth.push(auth);
        self
    }

    /// Set the `user-agent` header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Generic request builder that handles the relay HTTP patterns
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    /// Shared HTTP client
    client: reqwest::Client,
    /// Base URL, auth and user agent
    config: RequestConfig,
}

impl RequestBuilder {
    /// Request builder over `client` with the given configuration
    pub fn new(client: reqwest::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    /// Full URL of an endpoint
    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.path.trim_start_matches('/')
        )
    }

    /// Build a reqwest POST request for the given endpoint
    pub fn build_request(&self, endpoint: &Endpoint) -> ReqwestRequestBuilder {
        let mut req = self.client.post(self.url(endpoint));

        for auth in &self.config.auth {
            req = match auth {
                AuthMethod::Bearer(token) => req.bearer_auth(token),
                AuthMethod::ApiKey { header_name, key } => req.header(header_name, key),
            };
        }

        if let Some(ref user_agent) = self.config.user_agent {
            req = req.header("user-agent", user_agent);
        }

        req
    }

    /// Execute a request with JSON body and return deserialized response
    pub async fn request_json<T: for<'de> Deserialize<'de>, B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<T, CommonRequestError> {
        let mut req = self.build_request(endpoint);
        if let Some(body) = body {
            req = req.json(body);
        }

        debug!("POST {}", endpoint.path);
        let res = req.send().await?;
        self.handle_response(res).await
    }

    /// POST a JSON body and decode the streamed reply into text deltas
    pub fn stream_deltas<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: &B,
        pending_limit: Option<usize>,
    ) -> BoxStream<'static, Result<String, CommonRequestError>> {
        let payload = match serde_json::to_vec(body) {
            Ok(payload) => payload,
            Err(e) => return Box::pin(stream::once(async move { Err(CommonRequestError::Json(e)) })),
        };

        let req = self
            .build_request(endpoint)
            .header("content-type", "application/json")
            .body(payload);
        let path = endpoint.path.clone();

        Box::pin(try_stream! {
            debug!("STREAM {path}");
            let response = req.send().await?;
            let status = response.status();

            if !status.is_success() {
                let bytes = response.bytes().await?;
                warn!("Stream request to {path} failed with HTTP {}", status.as_u16());
                Err(error::parse_error_response(status, &bytes))?;
            } else {
                let decoder = match pending_limit {
                    Some(limit) => ChunkDecoder::with_pending_limit(limit),
                    None => ChunkDecoder::new(),
                };
                let mut deltas = decode_response(response, decoder);

                while let Some(delta) = deltas.next().await {
                    yield delta?;
                }
            }
        })
    }

    /// Handle response and parse errors
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        res: Response,
    ) -> Result<T, CommonRequestError> {
        let status = res.status();
        let bytes = res.bytes().await?;

        if status.is_success() {
            serde_json::from_slice::<T>(&bytes).map_err(|e| {
                CommonRequestError::UnexpectedResponse(format!(
                    "HTTP {} but failed to decode JSON: {}; body: {}",
                    status.as_u16(),
                    e,
                    String::from_utf8_lossy(&bytes)
                ))
            })
        } else {
            warn!("Request failed with HTTP {}", status.as_u16());
            Err(error::parse_error_response(status, &bytes))
        }
    }
}
