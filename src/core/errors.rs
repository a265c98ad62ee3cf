use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication required but no credentials configured")]
    AuthenticationRequired,

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error (HTTP {status}): code={code:?} message={message}")]
    ApiError {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Stream status error: {0}")]
    StreamStatus(String),

    #[error("Stream connect error: {0}")]
    StreamConnect(String),

    #[error("Stream I/O error: {0}")]
    StreamIo(String),

    #[error("Keepalive timeout: no pong for {elapsed_ms}ms")]
    KeepaliveTimeout { elapsed_ms: u64 },

    #[error("Stream session is closed")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl ExchangeError {
    /// Whether the error happened before anything was sent over the network.
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::AuthenticationRequired | Self::AuthError(_)
        )
    }

    /// Venue error code, when the error body carried one.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::ApiError { code, .. } => *code,
            _ => None,
        }
    }
}
