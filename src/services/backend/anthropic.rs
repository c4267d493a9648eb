//! Anthropic Messages API backend

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    CompletionBackend, MAX_TOKENS, STOP_TOKEN, SYSTEM_PROMPT, TEMPERATURE, build_prompt,
    clean_suggestion, http_agent, normalize_base_url, require_key, run_blocking,
};
use crate::error::BackendError;
use crate::models::context::ContextInfo;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
    stop_sequences: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    message: String,
}

pub struct AnthropicBackend {
    agent: ureq::Agent,
    url: String,
    api_key: String,
    api_version: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        api_version: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let api_key = require_key(api_key, "providers.anthropic.api_key", "ANTHROPIC_API_KEY")?;
        let base = normalize_base_url(base_url, "providers.anthropic.base_url")?;

        Ok(Self {
            agent: http_agent(timeout),
            url: format!("{base}/messages"),
            api_key,
            api_version,
            model,
        })
    }

    fn request_body(&self, context: &ContextInfo) -> MessagesRequest<'_> {
        MessagesRequest {
            model: &self.model,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: build_prompt(context),
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            stop_sequences: vec![STOP_TOKEN],
        }
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    fn identify(&self) -> String {
        format!("anthropic ({})", self.model)
    }

    async fn get_suggestion(&self, context: &ContextInfo) -> Result<String, BackendError> {
        let body = serde_json::to_value(self.request_body(context))
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let agent = self.agent.clone();
        let url = self.url.clone();
        let api_key = self.api_key.clone();
        let api_version = self.api_version.clone();

        tracing::debug!("Requesting suggestion from {}", self.identify());
        let response: MessagesResponse = run_blocking(move || {
            agent
                .post(&url)
                .set("x-api-key", &api_key)
                .set("anthropic-version", &api_version)
                .set("Accept", "application/json")
                .send_json(body)?
                .into_json()
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))
        })
        .await?;

        if let Some(error) = response.error {
            return Err(BackendError::Api(format!("{}: {}", error.kind, error.message)));
        }
        if response.stop_reason.as_deref() == Some("max_tokens") {
            tracing::debug!("Suggestion from {} hit the token limit", self.identify());
        }

        let text = response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| BackendError::InvalidResponse("no text content in response".into()))?;
        Ok(clean_suggestion(&text, &context.language_id))
    }
}
