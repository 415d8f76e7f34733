//! HTTPS chat-completions client.
//!
//! Posts the request as JSON with a bearer token. The endpoint is validated
//! once at construction; plain `http` is refused unless it targets loopback
//! and the development flag is set.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};
use url::Url;

use super::base::{ChatBackend, LlmError, LlmResult};
use super::types::{ChatCompletionsRequest, ChatCompletionsResponse};
use crate::utils::url_validation::validate_llm_endpoint;

/// Request timeout for one completion round-trip
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest response body echoed into error messages
const MAX_ERROR_BODY_LEN: usize = 512;

pub struct HttpsChatBackend {
    http_client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpsChatBackend {
    /// Create a client for `endpoint`.
    ///
    /// # Errors
    /// Returns `LlmError::InsecureEndpoint` when the URL is malformed or not
    /// https (loopback http is accepted only with `allow_insecure_localhost`).
    pub fn new(endpoint: &str, api_key: &str, allow_insecure_localhost: bool) -> LlmResult<Self> {
        let endpoint = validate_llm_endpoint(endpoint, allow_insecure_localhost)
            .map_err(|e| LlmError::InsecureEndpoint(e.to_string()))?;

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| LlmError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint,
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Drop for HttpsChatBackend {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

#[async_trait]
impl ChatBackend for HttpsChatBackend {
    async fn complete(
        &self,
        request: &ChatCompletionsRequest,
    ) -> LlmResult<ChatCompletionsResponse> {
        debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completions request"
        );

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Network(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            error!(status = status.as_u16(), "LLM backend returned an error status");
            let mut body = body;
            body.truncate(
                body.char_indices()
                    .nth(MAX_ERROR_BODY_LEN)
                    .map(|(i, _)| i)
                    .unwrap_or(body.len()),
            );
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Chat completions response: {} bytes", body.len());
        serde_json::from_str(&body).map_err(|e| LlmError::Decode(e.to_string()))
    }

    fn name(&self) -> &str {
        "https"
    }
}
