//! OpenAI-compatible `/chat/completions` backend

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    CompletionBackend, MAX_TOKENS, STOP_TOKEN, SYSTEM_PROMPT, TEMPERATURE, build_prompt,
    clean_suggestion, http_agent, normalize_base_url, require_key, run_blocking,
};
use crate::error::BackendError;
use crate::models::context::ContextInfo;

/// Chat completion body, shared with Azure (which omits `model`)
#[derive(Debug, Serialize)]
pub(super) struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    stop: Vec<&'static str>,
}

impl<'a> ChatRequest<'a> {
    pub(super) fn new(model: Option<&'a str>, context: &ContextInfo) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: build_prompt(context),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            stop: vec![STOP_TOKEN],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

impl ChatResponse {
    /// Content of the first choice
    pub(super) fn into_content(self) -> Result<String, BackendError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| BackendError::InvalidResponse("no choices in response".into()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiBackend {
    agent: ureq::Agent,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let api_key = require_key(api_key, "providers.openai.api_key", "OPENAI_API_KEY")?;
        let base = normalize_base_url(base_url, "providers.openai.base_url")?;

        Ok(Self {
            agent: http_agent(timeout),
            url: format!("{base}/chat/completions"),
            api_key,
            model,
        })
    }

    fn request_body(&self, context: &ContextInfo) -> ChatRequest<'_> {
        ChatRequest::new(Some(&self.model), context)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn identify(&self) -> String {
        format!("openai ({})", self.model)
    }

    async fn get_suggestion(&self, context: &ContextInfo) -> Result<String, BackendError> {
        let body = serde_json::to_value(self.request_body(context))
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let agent = self.agent.clone();
        let url = self.url.clone();
        let authorization = format!("Bearer {}", self.api_key);

        tracing::debug!("Requesting suggestion from {}", self.identify());
        let response: ChatResponse = run_blocking(move || {
            agent
                .post(&url)
                .set("Authorization", &authorization)
                .send_json(body)?
                .into_json()
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))
        })
        .await?;

        let content = response.into_content()?;
        Ok(clean_suggestion(&content, &context.language_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::backend::test_support::serve_once;

    fn context() -> ContextInfo {
        ContextInfo {
            language_id: "python".into(),
            filename: "app.py".into(),
            current_line_prefix: "return os.pa".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_api_key() {
        let result = OpenAiBackend::new(
            "https://api.openai.com/v1",
            Some("  ".into()),
            "gpt-4o".into(),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(BackendError::NotConfigured(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let backend = OpenAiBackend::new(
            "https://api.openai.com/v1/",
            Some("sk-test".into()),
            "gpt-4o-mini".into(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(backend.url, "https://api.openai.com/v1/chat/completions");

        let json = serde_json::to_value(backend.request_body(&context())).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 50);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert!(
            json["messages"][1]["content"]
                .as_str()
                .unwrap()
                .contains("return os.pa<CURSOR>")
        );
    }

    #[tokio::test]
    async fn test_suggestion_roundtrip() {
        let (url, server) = serve_once(
            200,
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"```python\nth.join(a, b)\n```"}}]}"#,
        );
        let backend = OpenAiBackend::new(
            &url,
            Some("sk-test".into()),
            "gpt-4o".into(),
            Duration::from_secs(5),
        )
        .unwrap();

        let suggestion = backend.get_suggestion(&context()).await.unwrap();
        assert_eq!(suggestion, "th.join(a, b)");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /chat/completions"));
        assert!(
            request
                .lines()
                .any(|line| line.eq_ignore_ascii_case("authorization: Bearer sk-test"))
        );
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let (url, server) = serve_once(200, r#"{"choices":[]}"#);
        let backend =
            OpenAiBackend::new(&url, Some("k".into()), "m".into(), Duration::from_secs(5)).unwrap();

        let err = backend.get_suggestion(&context()).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
        server.join().unwrap();
    }
}
