//! Configuration model for Grasshopper
//!
//! Loaded once at startup from `config.toml`. Every field has a default so an
//! empty or missing file yields a working (backend-less) server.

use serde::{Deserialize, Serialize};

/// Grasshopper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrasshopperConfig {
    /// Active completion provider
    #[serde(default)]
    pub provider: Option<ProviderKind>,

    /// Default model when a provider section does not name one
    #[serde(default)]
    pub model: Option<String>,

    /// Global request timeout
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// Quiet interval before a background reparse
    #[serde(default = "defaults::debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for GrasshopperConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            timeout_ms: defaults::timeout_ms(),
            debounce_ms: defaults::debounce_ms(),
            context: ContextConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    #[serde(alias = "open_ai")]
    OpenAi,
    Azure,
    Anthropic,
    Gemini,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAi => write!(f, "openai"),
            Self::Azure => write!(f, "azure"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// Byte caps for the prompt windows around the cursor line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "defaults::prefix_bytes")]
    pub prefix_bytes: usize,

    #[serde(default = "defaults::suffix_bytes")]
    pub suffix_bytes: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            prefix_bytes: defaults::prefix_bytes(),
            suffix_bytes: defaults::suffix_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OllamaConfig {
    /// Falls back to `OLLAMA_HOST`, then `http://localhost:11434`
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "defaults::openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: defaults::openai_base_url(),
        }
    }
}

/// Azure OpenAI; `endpoint` and `deployment_id` are required
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// e.g. `https://my-resource.openai.azure.com`
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub deployment_id: Option<String>,

    #[serde(default = "defaults::azure_api_version")]
    pub api_version: String,

    /// Display name only; the deployment decides the model
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            deployment_id: None,
            api_version: defaults::azure_api_version(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "defaults::anthropic_api_version")]
    pub api_version: String,

    #[serde(default = "defaults::anthropic_base_url")]
    pub base_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            api_version: defaults::anthropic_api_version(),
            base_url: defaults::anthropic_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "defaults::gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: defaults::gemini_base_url(),
        }
    }
}

pub(crate) mod defaults {
    // General
    pub fn timeout_ms() -> u64 {
        10_000
    }
    pub fn debounce_ms() -> u64 {
        300
    }

    // Context windows
    pub fn prefix_bytes() -> usize {
        2048
    }
    pub fn suffix_bytes() -> usize {
        256
    }

    // Providers
    pub fn ollama_host() -> String {
        "http://localhost:11434".to_string()
    }
    pub fn ollama_model() -> String {
        "codellama:latest".to_string()
    }
    pub fn openai_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }
    pub fn openai_model() -> String {
        "gpt-4o".to_string()
    }
    pub fn azure_api_version() -> String {
        "2023-07-01-preview".to_string()
    }
    pub fn anthropic_base_url() -> String {
        "https://api.anthropic.com/v1".to_string()
    }
    pub fn anthropic_api_version() -> String {
        "2023-06-01".to_string()
    }
    pub fn anthropic_model() -> String {
        "claude-3-haiku-20240307".to_string()
    }
    pub fn gemini_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }
    pub fn gemini_model() -> String {
        "gemini-1.5-flash-latest".to_string()
    }
}

// Model resolution: provider section, then global `model`, then built-in
impl GrasshopperConfig {
    fn model_for(&self, section: &Option<String>) -> Option<String> {
        section
            .clone()
            .or_else(|| self.model.clone())
            .filter(|model| !model.trim().is_empty())
    }

    pub fn ollama_host(&self) -> String {
        self.providers
            .ollama
            .host
            .clone()
            .filter(|host| !host.trim().is_empty())
            .unwrap_or_else(defaults::ollama_host)
    }

    pub fn ollama_model(&self) -> String {
        self.model_for(&self.providers.ollama.model)
            .unwrap_or_else(defaults::ollama_model)
    }

    pub fn openai_model(&self) -> String {
        self.model_for(&self.providers.openai.model)
            .unwrap_or_else(defaults::openai_model)
    }

    /// No built-in model: Azure falls back to the deployment name
    pub fn azure_model(&self) -> Option<String> {
        self.model_for(&self.providers.azure.model)
    }

    pub fn anthropic_model(&self) -> String {
        self.model_for(&self.providers.anthropic.model)
            .unwrap_or_else(defaults::anthropic_model)
    }

    pub fn gemini_model(&self) -> String {
        self.model_for(&self.providers.gemini.model)
            .unwrap_or_else(defaults::gemini_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: GrasshopperConfig = toml::from_str("").unwrap();
        assert!(config.provider.is_none());
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.context.prefix_bytes, 2048);
        assert_eq!(config.context.suffix_bytes, 256);
        assert!(config.providers.ollama.host.is_none());
        assert_eq!(config.ollama_host(), "http://localhost:11434");
        assert_eq!(config.providers.azure.api_version, "2023-07-01-preview");
        assert_eq!(config.providers.anthropic.api_version, "2023-06-01");
    }

    #[test]
    fn test_provider_sections() {
        let config: GrasshopperConfig = toml::from_str(
            r#"
provider = "ollama"
timeout_ms = 4000

[providers.ollama]
host = "http://gpu-box:11434"
model = "qwen2.5-coder"
"#,
        )
        .unwrap();

        assert_eq!(config.provider, Some(ProviderKind::Ollama));
        assert_eq!(config.timeout_ms, 4000);
        assert_eq!(config.ollama_host(), "http://gpu-box:11434");
        assert_eq!(config.ollama_model(), "qwen2.5-coder");
    }

    #[test]
    fn test_azure_section() {
        let config: GrasshopperConfig = toml::from_str(
            r#"
provider = "azure"

[providers.azure]
endpoint = "https://acme.openai.azure.com/"
deployment_id = "code-completion"
"#,
        )
        .unwrap();

        assert_eq!(config.provider, Some(ProviderKind::Azure));
        let azure = &config.providers.azure;
        assert_eq!(azure.endpoint.as_deref(), Some("https://acme.openai.azure.com/"));
        assert_eq!(azure.deployment_id.as_deref(), Some("code-completion"));
        assert_eq!(azure.api_version, "2023-07-01-preview");
        assert!(config.azure_model().is_none());
    }

    #[test]
    fn test_model_fallback_chain() {
        let config: GrasshopperConfig = toml::from_str(
            r#"
provider = "openai"
model = "shared-model"

[providers.gemini]
model = "gemini-2.0-flash"
"#,
        )
        .unwrap();
        assert_eq!(config.provider, Some(ProviderKind::OpenAi));
        assert_eq!(config.openai_model(), "shared-model");
        assert_eq!(config.ollama_model(), "shared-model");
        assert_eq!(config.anthropic_model(), "shared-model");
        assert_eq!(config.azure_model().as_deref(), Some("shared-model"));
        assert_eq!(config.gemini_model(), "gemini-2.0-flash");

        let bare = GrasshopperConfig::default();
        assert_eq!(bare.openai_model(), "gpt-4o");
        assert_eq!(bare.ollama_model(), "codellama:latest");
        assert_eq!(bare.anthropic_model(), "claude-3-haiku-20240307");
        assert_eq!(bare.gemini_model(), "gemini-1.5-flash-latest");
        assert!(bare.azure_model().is_none());
    }

    #[test]
    fn test_provider_names() {
        for (name, kind) in [
            ("ollama", ProviderKind::Ollama),
            ("openai", ProviderKind::OpenAi),
            ("azure", ProviderKind::Azure),
            ("anthropic", ProviderKind::Anthropic),
            ("gemini", ProviderKind::Gemini),
        ] {
            let config: GrasshopperConfig =
                toml::from_str(&format!("provider = \"{name}\"")).unwrap();
            assert_eq!(config.provider, Some(kind));
            assert_eq!(kind.to_string(), name);
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result: Result<GrasshopperConfig, _> = toml::from_str(r#"provider = "clippy""#);
        assert!(result.is_err());
    }
}
