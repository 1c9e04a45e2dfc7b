//! Error types for the WildFly bot
//!
//! Structured error definitions use thiserror; anyhow is only used at the
//! binary and server boundary and converts into [`BotError::Other`].

use thiserror::Error;

/// Main error type for bot operations
#[derive(Error, Debug)]
pub enum BotError {
    /// The policy file is not valid YAML or does not fit the schema
    #[error("Policy parse error: {0}")]
    PolicyParse(#[from] serde_yaml::Error),

    /// The policy parsed but violates a structural invariant
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// A call against the hosting platform failed
    #[error("Platform error during {operation}: {message}")]
    Platform { operation: String, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Outbound email could not be delivered
    #[error("Mail error: {0}")]
    Mail(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Webhook delivery rejected (bad signature, malformed payload)
    #[error("Webhook error: {0}")]
    Webhook(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl BotError {
    /// Shorthand for a failed platform call
    pub fn platform(operation: impl Into<String>, message: impl Into<String>) -> Self {
        BotError::Platform {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, BotError>;

/// Convert anyhow::Error to BotError
impl From<anyhow::Error> for BotError {
    fn from(err: anyhow::Error) -> Self {
        BotError::Other(err.to_string())
    }
}
