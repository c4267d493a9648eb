//! Error types for Grasshopper

use thiserror::Error;

pub type GrasshopperResult<T> = std::result::Result<T, GrasshopperError>;

#[derive(Debug, Error)]
pub enum GrasshopperError {
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Position(#[from] PositionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Framing and envelope failures on the wire
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Missing Content-Length header")]
    MissingContentLength,

    #[error("Invalid Content-Length header: {0}")]
    InvalidContentLength(String),

    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Malformed JSON-RPC message: {0}")]
    InvalidMessage(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Errors after which the stream can no longer be read
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("Negative position: line {line}, character {character}")]
    Negative { line: i64, character: i64 },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to load grammar for '{language}': {message}")]
    Grammar { language: String, message: String },

    #[error("Parser for '{0}' is unavailable (lock poisoned)")]
    Poisoned(String),

    #[error("Parsing failed for '{0}'")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend request timed out")]
    Timeout,

    #[error("Backend request cancelled")]
    Cancelled,

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP {status} from backend: {body}")]
    Http { status: u16, body: String },

    #[error("Cannot reach backend: {0}")]
    Transport(String),

    #[error("Unexpected backend response: {0}")]
    InvalidResponse(String),

    #[error("Backend returned an error: {0}")]
    Api(String),
}

impl BackendError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Both mean "no suggestion in time", not a malfunction
    pub fn is_deadline(&self) -> bool {
        self.is_cancelled() || self.is_timeout()
    }
}

impl From<ureq::Error> for BackendError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                Self::Http { status, body }
            }
            ureq::Error::Transport(transport) => {
                let message = transport.to_string();
                if message.to_lowercase().contains("timed out") {
                    Self::Timeout
                } else {
                    Self::Transport(message)
                }
            }
        }
    }
}
