//! Azure OpenAI deployment backend

use std::time::Duration;

use async_trait::async_trait;

use super::openai::{ChatRequest, ChatResponse};
use super::{
    CompletionBackend, clean_suggestion, http_agent, normalize_base_url, path_segment,
    require_key, run_blocking,
};
use crate::error::BackendError;
use crate::models::context::ContextInfo;

pub struct AzureBackend {
    agent: ureq::Agent,
    url: String,
    api_key: String,
    api_version: String,
    deployment: String,
    model: String,
}

/// Settings for one Azure deployment
pub struct AzureSettings {
    pub endpoint: Option<String>,
    pub deployment_id: Option<String>,
    pub api_key: Option<String>,
    pub api_version: String,
    /// Display name; defaults to the deployment
    pub model: Option<String>,
}

impl AzureBackend {
    pub fn new(settings: AzureSettings, timeout: Duration) -> Result<Self, BackendError> {
        let endpoint = settings.endpoint.ok_or_else(|| {
            BackendError::NotConfigured(
                "set providers.azure.endpoint or AZURE_OPENAI_ENDPOINT".to_string(),
            )
        })?;
        let endpoint = normalize_base_url(&endpoint, "providers.azure.endpoint")?;
        let deployment = settings
            .deployment_id
            .ok_or_else(|| {
                BackendError::NotConfigured(
                    "set providers.azure.deployment_id or AZURE_OPENAI_DEPLOYMENT".to_string(),
                )
            })
            .and_then(|id| path_segment(&id, "providers.azure.deployment_id"))?;
        let api_key = require_key(settings.api_key, "providers.azure.api_key", "AZURE_OPENAI_KEY")?;

        Ok(Self {
            agent: http_agent(timeout),
            url: format!("{endpoint}/openai/deployments/{deployment}/chat/completions"),
            api_key,
            api_version: settings.api_version,
            model: settings.model.unwrap_or_else(|| deployment.clone()),
            deployment,
        })
    }
}

#[async_trait]
impl CompletionBackend for AzureBackend {
    fn identify(&self) -> String {
        format!("azure ({}, deployment {})", self.model, self.deployment)
    }

    async fn get_suggestion(&self, context: &ContextInfo) -> Result<String, BackendError> {
        let body = serde_json::to_value(ChatRequest::new(None, context))
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let agent = self.agent.clone();
        let url = self.url.clone();
        let api_key = self.api_key.clone();
        let api_version = self.api_version.clone();

        tracing::debug!("Requesting suggestion from {}", self.identify());
        let response: ChatResponse = run_blocking(move || {
            agent
                .post(&url)
                .query("api-version", &api_version)
                .set("api-key", &api_key)
                .send_json(body)?
                .into_json()
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))
        })
        .await?;

        let content = response.into_content()?;
        Ok(clean_suggestion(&content, &context.language_id))
    }
}
