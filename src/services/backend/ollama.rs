//! Ollama `/api/generate` backend

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    CompletionBackend, MAX_TOKENS, STOP_TOKEN, SYSTEM_PROMPT, TEMPERATURE, build_prompt,
    clean_suggestion, http_agent, normalize_base_url, run_blocking,
};
use crate::error::BackendError;
use crate::models::context::ContextInfo;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f64,
    stop: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaBackend {
    agent: ureq::Agent,
    url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(host: &str, model: String, timeout: Duration) -> Result<Self, BackendError> {
        let base = normalize_base_url(host, "providers.ollama.host")?;
        Ok(Self {
            agent: http_agent(timeout),
            url: format!("{base}/api/generate"),
            model,
        })
    }

    fn request_body(&self, context: &ContextInfo) -> GenerateRequest<'_> {
        GenerateRequest {
            model: &self.model,
            prompt: build_prompt(context),
            system: SYSTEM_PROMPT,
            stream: false,
            options: GenerateOptions {
                num_predict: MAX_TOKENS,
                temperature: TEMPERATURE,
                stop: vec![STOP_TOKEN],
            },
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn identify(&self) -> String {
        format!("ollama ({})", self.model)
    }

    async fn get_suggestion(&self, context: &ContextInfo) -> Result<String, BackendError> {
        let body = serde_json::to_value(self.request_body(context))
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let agent = self.agent.clone();
        let url = self.url.clone();

        tracing::debug!("Requesting suggestion from {}", self.identify());
        let response: GenerateResponse = run_blocking(move || {
            agent
                .post(&url)
                .set("Accept", "application/json")
                .send_json(body)?
                .into_json()
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))
        })
        .await?;

        if let Some(error) = response.error.filter(|e| !e.is_empty()) {
            return Err(BackendError::Api(error));
        }
        Ok(clean_suggestion(&response.response, &context.language_id))
    }
}
