//! Completion backends
//!
//! A backend turns a [`ContextInfo`] into suggestion text. Concrete providers
//! speak blocking HTTP through `ureq` on the blocking pool; dropping the
//! returned future abandons the result.

mod anthropic;
mod azure;
mod gemini;
mod ollama;
mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RuntimeConfig;
use crate::error::BackendError;
use crate::models::config::{GrasshopperConfig, ProviderKind};
use crate::models::context::ContextInfo;

pub use anthropic::AnthropicBackend;
pub use azure::{AzureBackend, AzureSettings};
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

/// Swappable suggestion provider
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Human-readable provider and model, for logs
    fn identify(&self) -> String;

    async fn get_suggestion(&self, context: &ContextInfo) -> Result<String, BackendError>;
}

pub(crate) const STOP_TOKEN: &str = "<END>";
pub(crate) const CURSOR_MARKER: &str = "<CURSOR>";
pub(crate) const MAX_TOKENS: u32 = 50;
pub(crate) const TEMPERATURE: f64 = 0.1;

pub(crate) const SYSTEM_PROMPT: &str = "You are a code completion engine. Reply with only the code \
that belongs at <CURSOR>: no explanations, no markdown fences. Finish with <END>.";

/// Backend selected by `config.provider`; `Ok(None)` when none is configured
pub fn build_backend(
    config: &GrasshopperConfig,
    runtime: &RuntimeConfig,
) -> Result<Option<Arc<dyn CompletionBackend>>, BackendError> {
    let Some(provider) = config.provider else {
        return Ok(None);
    };

    // HTTP deadline backs up the orchestrator's own timeout so abandoned
    // blocking calls do not linger
    let http_timeout = runtime.request_timeout();
    let providers = &config.providers;
    let backend: Arc<dyn CompletionBackend> = match provider {
        ProviderKind::Ollama => Arc::new(OllamaBackend::new(
            &config.ollama_host(),
            config.ollama_model(),
            http_timeout,
        )?),
        ProviderKind::OpenAi => Arc::new(OpenAiBackend::new(
            &providers.openai.base_url,
            providers.openai.api_key.clone(),
            config.openai_model(),
            http_timeout,
        )?),
        ProviderKind::Azure => Arc::new(AzureBackend::new(
            AzureSettings {
                endpoint: providers.azure.endpoint.clone(),
                deployment_id: providers.azure.deployment_id.clone(),
                api_key: providers.azure.api_key.clone(),
                api_version: providers.azure.api_version.clone(),
                model: config.azure_model(),
            },
            http_timeout,
        )?),
        ProviderKind::Anthropic => Arc::new(AnthropicBackend::new(
            &providers.anthropic.base_url,
            providers.anthropic.api_key.clone(),
            providers.anthropic.api_version.clone(),
            config.anthropic_model(),
            http_timeout,
        )?),
        ProviderKind::Gemini => Arc::new(GeminiBackend::new(
            &providers.gemini.base_url,
            providers.gemini.api_key.clone(),
            config.gemini_model(),
            http_timeout,
        )?),
    };

    tracing::info!("Completion backend: {}", backend.identify());
    Ok(Some(backend))
}

pub(crate) fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout.min(Duration::from_secs(3)))
        .timeout(timeout)
        .build()
}

/// Validate an `http(s)://` base URL and drop any trailing slash
pub(crate) fn normalize_base_url(url: &str, key: &str) -> Result<String, BackendError> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(BackendError::NotConfigured(format!(
            "{key} must be an http(s) URL, got '{url}'"
        )));
    }
    Ok(trimmed.to_string())
}

/// Non-blank API key, or a hint naming where to set it
pub(crate) fn require_key(
    key: Option<String>,
    setting: &str,
    env: &str,
) -> Result<String, BackendError> {
    key.filter(|key| !key.trim().is_empty())
        .ok_or_else(|| BackendError::NotConfigured(format!("set {setting} or {env}")))
}

/// A value spliced into a URL path: letters, digits, `-`, `_`, `.`, `:`
pub(crate) fn path_segment(value: &str, key: &str) -> Result<String, BackendError> {
    let value = value.trim();
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if !valid {
        return Err(BackendError::NotConfigured(format!(
            "{key} has unsupported characters: '{value}'"
        )));
    }
    Ok(value.to_string())
}

/// Run a blocking HTTP exchange off the async runtime
pub(crate) async fn run_blocking<T, F>(call: F) -> Result<T, BackendError>
where
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| BackendError::Transport(format!("request task failed: {e}")))?
}

/// Render the user prompt for a context
pub fn build_prompt(context: &ContextInfo) -> String {
    let language = if context.language_id.is_empty() {
        "text"
    } else {
        context.language_id.as_str()
    };

    let mut prompt = format!(
        "Complete the {language} code at {CURSOR_MARKER}.\nFile: {}\n",
        context.filename
    );

    if !context.imports.is_empty() {
        prompt.push_str("Imports:\n");
        for import in &context.imports {
            prompt.push_str("- ");
            prompt.push_str(import);
            prompt.push('\n');
        }
    }

    if let Some(enclosing) = &context.enclosing_node
        && let Some(header) = enclosing.text.lines().next()
    {
        prompt.push_str(&format!("Inside {}: {}\n", enclosing.kind, header.trim()));
    }

    prompt.push_str(&format!("\n```{language}\n"));
    prompt.push_str(&context.prefix);
    prompt.push_str(&context.current_line_prefix);
    prompt.push_str(CURSOR_MARKER);
    prompt.push_str(&context.current_line_suffix);
    prompt.push('\n');
    prompt.push_str(&context.suffix);
    if !context.suffix.is_empty() && !context.suffix.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```\n");
    prompt
}

/// Strip fences and stop tokens, keep the first line
pub fn clean_suggestion(raw: &str, language_id: &str) -> String {
    let fenced = format!("```{}", language_id.to_lowercase());
    let mut cleaned = raw.trim_start();
    cleaned = cleaned.strip_prefix(fenced.as_str()).unwrap_or(cleaned);
    cleaned = cleaned.strip_prefix("```").unwrap_or(cleaned);
    cleaned = cleaned.strip_prefix('\n').unwrap_or(cleaned);

    let mut cleaned = cleaned.trim_end();
    cleaned = cleaned.strip_suffix(STOP_TOKEN).unwrap_or(cleaned);
    cleaned = cleaned.trim_end();
    cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned);
    let cleaned = cleaned.replace(STOP_TOKEN, "");
    let cleaned = cleaned.trim();

    cleaned.lines().next().unwrap_or_default().trim_end().to_string()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::context::NodeInfo;

    fn sample_context() -> ContextInfo {
        ContextInfo {
            language_id: "go".into(),
            filename: "main.go".into(),
            prefix: "package main\n\nfunc main() {\n".into(),
            suffix: "}\n".into(),
            current_line_prefix: "\tfmt.Pri".into(),
            current_line_suffix: "".into(),
            cursor_node: None,
            enclosing_node: Some(NodeInfo {
                kind: "function_declaration".into(),
                text: "func main() {\n\tfmt.Pri\n}".into(),
                start_byte: 14,
                end_byte: 38,
            }),
            imports: vec!["fmt".into()],
        }
    }

    #[test]
    fn test_prompt_contains_cursor_and_context() {
        let prompt = build_prompt(&sample_context());
        assert!(prompt.contains("Complete the go code at <CURSOR>."));
        assert!(prompt.contains("File: main.go"));
        assert!(prompt.contains("- fmt\n"));
        assert!(prompt.contains("Inside function_declaration: func main() {"));
        assert!(prompt.contains("func main() {\n\tfmt.Pri<CURSOR>\n}\n```"));
    }

    #[test]
    fn test_prompt_without_optional_context() {
        let context = ContextInfo {
            filename: "notes".into(),
            current_line_prefix: "hello".into(),
            ..Default::default()
        };
        let prompt = build_prompt(&context);
        assert!(prompt.contains("Complete the text code"));
        assert!(!prompt.contains("Imports:"));
        assert!(!prompt.contains("Inside"));
        assert!(prompt.contains("hello<CURSOR>\n```"));
    }

    #[test]
    fn test_clean_suggestion() {
        assert_eq!(clean_suggestion("ntln(\"hi\")<END>", "go"), "ntln(\"hi\")");
        assert_eq!(
            clean_suggestion("```go\nntln(x)\n```", "go"),
            "ntln(x)"
        );
        assert_eq!(clean_suggestion("```\nfoo()\nbar()\n```", "go"), "foo()");
        assert_eq!(clean_suggestion("  value + 1  \n", "python"), "value + 1");
        assert_eq!(clean_suggestion("```go\nx\n```", "Go"), "x");
        assert_eq!(clean_suggestion("<END>", "go"), "");
        assert_eq!(clean_suggestion("", "go"), "");
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:11434/", "host").unwrap(),
            "http://localhost:11434"
        );
        assert!(matches!(
            normalize_base_url("localhost:11434", "host"),
            Err(BackendError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_build_backend_selection() {
        let runtime = RuntimeConfig::default();

        let none = build_backend(&GrasshopperConfig::default(), &runtime).unwrap();
        assert!(none.is_none());

        let mut config = GrasshopperConfig {
            provider: Some(ProviderKind::Ollama),
            ..Default::default()
        };
        let backend = build_backend(&config, &runtime).unwrap().unwrap();
        assert_eq!(backend.identify(), "ollama (codellama:latest)");

        config.provider = Some(ProviderKind::OpenAi);
        config.providers.openai.api_key = None;
        assert!(matches!(
            build_backend(&config, &runtime),
            Err(BackendError::NotConfigured(_))
        ));

        config.providers.openai.api_key = Some("sk-test".into());
        let backend = build_backend(&config, &runtime).unwrap().unwrap();
        assert_eq!(backend.identify(), "openai (gpt-4o)");
    }

    #[test]
    fn test_build_hosted_backends() {
        let runtime = RuntimeConfig::default();
        let mut config = GrasshopperConfig {
            model: Some("shared".into()),
            ..Default::default()
        };

        config.provider = Some(ProviderKind::Azure);
        assert!(matches!(
            build_backend(&config, &runtime),
            Err(BackendError::NotConfigured(_))
        ));
        config.providers.azure.endpoint = Some("https://acme.openai.azure.com".into());
        config.providers.azure.deployment_id = Some("completions".into());
        config.providers.azure.api_key = Some("az".into());
        let backend = build_backend(&config, &runtime).unwrap().unwrap();
        assert_eq!(backend.identify(), "azure (shared, deployment completions)");

        config.provider = Some(ProviderKind::Anthropic);
        assert!(build_backend(&config, &runtime).is_err());
        config.providers.anthropic.api_key = Some("ant".into());
        let backend = build_backend(&config, &runtime).unwrap().unwrap();
        assert_eq!(backend.identify(), "anthropic (shared)");

        config.provider = Some(ProviderKind::Gemini);
        config.model = None;
        assert!(build_backend(&config, &runtime).is_err());
        config.providers.gemini.api_key = Some("goog".into());
        let backend = build_backend(&config, &runtime).unwrap().unwrap();
        assert_eq!(backend.identify(), "gemini (gemini-1.5-flash-latest)");
    }

    #[test]
    fn test_path_segment() {
        assert_eq!(
            path_segment(" gemini-1.5-flash ", "model").unwrap(),
            "gemini-1.5-flash"
        );
        assert!(path_segment("models/x", "model").is_err());
        assert!(path_segment("..", "model").is_err());
        assert!(path_segment("a?key=1", "model").is_err());
        assert!(path_segment("", "model").is_err());
    }
}
