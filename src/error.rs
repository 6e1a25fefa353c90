//! Error types for the Iris gateway

use thiserror::Error;

/// Result type alias for Iris operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Iris gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Frame processing error (undecodable bytes, resize failure)
    #[error("frame error: {0}")]
    Frame(String),

    /// Captioning collaborator failure
    #[error("caption error: {0}")]
    Caption(String),

    /// Ephemeral credential minting failure
    #[error("credential error: {0}")]
    Credential(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
