//! Command-line interface for Grasshopper
//!
//! Editors launch the binary directly; the flags only tune startup.

use std::path::PathBuf;

use clap::Parser;

const LONG_ABOUT: &str = r#"
Grasshopper - AST-aware AI code completion language server

Speaks the Language Server Protocol over stdin/stdout. Logs go to stderr.

CONFIGURATION:
  --config <PATH>, else $XDG_CONFIG_HOME/grasshopper/config.toml,
  else the platform config directory. A missing file means defaults.

PROVIDERS:
  ollama, openai, azure, anthropic, gemini. Keys left unset fall back to
  OPENAI_API_KEY, AZURE_OPENAI_KEY, ANTHROPIC_API_KEY, GOOGLE_API_KEY;
  Ollama's host falls back to OLLAMA_HOST.

EXAMPLE config.toml:
  provider = "ollama"
  timeout_ms = 5000

  [providers.ollama]
  host = "http://localhost:11434"
  model = "codellama:latest"
"#;

/// Grasshopper - AST-aware AI code completion language server
#[derive(Parser, Debug)]
#[command(name = "grasshopper")]
#[command(author, version, about, long_about = LONG_ABOUT)]
pub struct Cli {
    /// Path to config.toml
    #[arg(long, value_name = "PATH", env = "GRASSHOPPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter for stderr (overrides RUST_LOG), e.g. "debug" or "grasshopper=trace"
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Serve over stdin/stdout (always on; accepted because editors pass it)
    #[arg(long)]
    pub stdio: bool,
}

impl Cli {
    pub const DEFAULT_LOG_FILTER: &'static str = "grasshopper=info";

    /// Filter for the stderr subscriber: `--log-level`, then `RUST_LOG`, then the default
    pub fn log_filter(&self) -> String {
        match &self.log_level {
            Some(level) if !level.contains('=') && !level.contains(',') => {
                format!("grasshopper={level}")
            }
            Some(filter) => filter.clone(),
            None => std::env::var("RUST_LOG")
                .ok()
                .filter(|filter| !filter.is_empty())
                .unwrap_or_else(|| Self::DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "grasshopper",
            "--stdio",
            "--config",
            "/tmp/g.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert!(cli.stdio);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/g.toml")));
        assert_eq!(cli.log_filter(), "grasshopper=debug");
    }

    #[test]
    fn test_full_filter_passes_through() {
        let cli =
            Cli::try_parse_from(["grasshopper", "--log-level", "grasshopper=trace,ureq=warn"])
                .unwrap();
        assert_eq!(cli.log_filter(), "grasshopper=trace,ureq=warn");
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["grasshopper", "--port", "9"]).is_err());
    }
}
