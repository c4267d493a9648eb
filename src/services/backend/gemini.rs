//! Google Gemini `generateContent` backend

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    CompletionBackend, MAX_TOKENS, STOP_TOKEN, SYSTEM_PROMPT, TEMPERATURE, build_prompt,
    clean_suggestion, http_agent, normalize_base_url, path_segment, require_key, run_blocking,
};
use crate::error::BackendError;
use crate::models::context::ContextInfo;

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
    stop_sequences: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    status: String,
    message: String,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, BackendError> {
        if let Some(error) = self.error {
            return Err(BackendError::Api(format!("{}: {}", error.status, error.message)));
        }
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(BackendError::Api(format!("prompt blocked ({reason})")));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("no candidates in response".into()))?;
        match candidate.finish_reason.as_deref() {
            Some("SAFETY") => return Err(BackendError::Api("completion blocked by safety filter".into())),
            Some("MAX_TOKENS") => tracing::debug!("Gemini suggestion hit the token limit"),
            _ => {}
        }

        let text: String = candidate
            .content
            .map(|content| content.parts.into_iter().map(|part| part.text).collect())
            .unwrap_or_default();
        Ok(text)
    }
}

pub struct GeminiBackend {
    agent: ureq::Agent,
    url: String,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let api_key = require_key(api_key, "providers.gemini.api_key", "GOOGLE_API_KEY")?;
        let base = normalize_base_url(base_url, "providers.gemini.base_url")?;
        let model = path_segment(&model, "providers.gemini.model")?;

        Ok(Self {
            agent: http_agent(timeout),
            url: format!("{base}/models/{model}:generateContent"),
            api_key,
            model,
        })
    }

    fn request_body(&self, context: &ContextInfo) -> GenerateRequest {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: build_prompt(context),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_TOKENS,
                temperature: TEMPERATURE,
                stop_sequences: vec![STOP_TOKEN],
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_MEDIUM_AND_ABOVE",
                })
                .collect(),
        }
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn identify(&self) -> String {
        format!("gemini ({})", self.model)
    }

    async fn get_suggestion(&self, context: &ContextInfo) -> Result<String, BackendError> {
        let body = serde_json::to_value(self.request_body(context))
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let agent = self.agent.clone();
        let url = self.url.clone();
        let api_key = self.api_key.clone();

        tracing::debug!("Requesting suggestion from {}", self.identify());
        let response: GenerateResponse = run_blocking(move || {
            agent
                .post(&url)
                .set("x-goog-api-key", &api_key)
                .set("Accept", "application/json")
                .send_json(body)?
                .into_json()
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))
        })
        .await?;

        let text = response.into_text()?;
        Ok(clean_suggestion(&text, &context.language_id))
    }
}
