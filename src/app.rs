//! Application container for Grasshopper

use std::path::Path;
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::GrasshopperResult;
use crate::infra::ast::parser::{ParseService, TreeSitterParser};
use crate::models::config::GrasshopperConfig;
use crate::server::Server;
use crate::services::backend::{CompletionBackend, build_backend};
use crate::services::config::{ConfigService, DefaultConfigService};

pub struct App {
    pub(crate) config: GrasshopperConfig,
    pub(crate) runtime: RuntimeConfig,
    pub(crate) parser: Arc<dyn ParseService>,
    pub(crate) backend: Option<Arc<dyn CompletionBackend>>,
}

impl App {
    /// Load configuration and build every collaborator the server needs.
    ///
    /// Configuration and grammar failures are fatal. A backend that cannot
    /// be built is logged and the server runs without one.
    pub async fn load(config_path: Option<&Path>) -> GrasshopperResult<Self> {
        let config_service = DefaultConfigService::new(config_path);
        let config = config_service.load().await?;
        Self::from_config(config)
    }

    pub fn from_config(config: GrasshopperConfig) -> GrasshopperResult<Self> {
        let runtime = RuntimeConfig::from(&config);
        let parser: Arc<dyn ParseService> = Arc::new(TreeSitterParser::new()?);

        let backend = match build_backend(&config, &runtime) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!("Completion backend unavailable: {}", e);
                None
            }
        };
        if backend.is_none() {
            tracing::info!("No completion backend; completions will be empty");
        }

        tracing::debug!(
            "Runtime: request timeout {:?}, completion timeout {:?}, debounce {:?}",
            runtime.request_timeout(),
            runtime.completion_timeout(),
            runtime.debounce
        );

        Ok(Self {
            config,
            runtime,
            parser,
            backend,
        })
    }

    pub fn config(&self) -> &GrasshopperConfig {
        &self.config
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn into_server(self) -> Server {
        Server::new(self.runtime, self.parser, self.backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrasshopperError;
    use crate::models::config::ProviderKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_load_with_ollama_backend() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
provider = "ollama"

[providers.ollama]
host = "http://127.0.0.1:11434"
model = "starcoder2"
"#
        )
        .unwrap();

        let app = App::load(Some(file.path())).await.unwrap();
        assert_eq!(app.config().provider, Some(ProviderKind::Ollama));
        assert!(app.has_backend());
    }

    #[tokio::test]
    async fn test_broken_backend_is_not_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
provider = "ollama"

[providers.ollama]
host = "not a url"
"#
        )
        .unwrap();

        let app = App::load(Some(file.path())).await.unwrap();
        assert!(!app.has_backend());
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timeout_ms = \"soon\"").unwrap();

        let result = App::load(Some(file.path())).await;
        assert!(matches!(result, Err(GrasshopperError::Config(_))));
    }
}
