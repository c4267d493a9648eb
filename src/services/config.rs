//! Configuration service for Grasshopper

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ConfigError;
use crate::models::config::{GrasshopperConfig, ProviderKind};

#[async_trait]
pub trait ConfigService: Send + Sync {
    async fn load(&self) -> Result<GrasshopperConfig, ConfigError>;
    fn config_path(&self) -> Option<PathBuf>;
}

pub struct DefaultConfigService {
    explicit: Option<PathBuf>,
}

impl DefaultConfigService {
    pub fn new(explicit: Option<&Path>) -> Self {
        Self {
            explicit: explicit.map(Path::to_path_buf),
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        // XDG standard: ~/.config/grasshopper/config.toml
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(dirs::config_dir)
            .map(|dir| dir.join("grasshopper").join("config.toml"))
    }

    async fn load_from_path(path: &Path) -> Result<GrasshopperConfig, ConfigError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Fill settings the file left unset from the environment
    fn apply_env_fallbacks(config: &mut GrasshopperConfig, env: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        let fill = |slot: &mut Option<String>, key: &str| {
            if slot.as_deref().is_none_or(|value| value.trim().is_empty()) {
                *slot = lookup(key);
            }
        };

        let providers = &mut config.providers;
        fill(&mut providers.openai.api_key, "OPENAI_API_KEY");
        fill(&mut providers.azure.api_key, "AZURE_OPENAI_KEY");
        fill(&mut providers.anthropic.api_key, "ANTHROPIC_API_KEY");
        fill(&mut providers.gemini.api_key, "GOOGLE_API_KEY");
        fill(&mut providers.ollama.host, "OLLAMA_HOST");

        if config.provider == Some(ProviderKind::Azure) {
            fill(&mut providers.azure.endpoint, "AZURE_OPENAI_ENDPOINT");
            fill(&mut providers.azure.deployment_id, "AZURE_OPENAI_DEPLOYMENT");
            if providers.azure.endpoint.is_none() || providers.azure.deployment_id.is_none() {
                tracing::warn!("Azure provider selected without an endpoint or deployment id");
            }
        }
    }

    fn validate(config: &GrasshopperConfig) -> Result<(), ConfigError> {
        if config.debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "debounce_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        if config.context.prefix_bytes == 0 && config.context.suffix_bytes == 0 {
            tracing::warn!("Both context windows are disabled; prompts carry only the cursor line");
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigService for DefaultConfigService {
    async fn load(&self) -> Result<GrasshopperConfig, ConfigError> {
        let mut config = match self.config_path() {
            Some(path) if self.explicit.is_some() || path.exists() => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::load_from_path(&path).await?
            }
            Some(path) => {
                tracing::info!(
                    "No config at {}; using defaults and environment",
                    path.display()
                );
                GrasshopperConfig::default()
            }
            None => {
                tracing::warn!("Cannot determine config directory; using defaults");
                GrasshopperConfig::default()
            }
        };

        Self::apply_env_fallbacks(&mut config, |key| std::env::var(key).ok());
        Self::validate(&config)?;
        Ok(config)
    }

    fn config_path(&self) -> Option<PathBuf> {
        self.explicit.clone().or_else(Self::global_config_path)
    }
}
