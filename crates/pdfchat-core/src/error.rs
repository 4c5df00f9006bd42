//! Error types for pdfchat

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types shared by every pdfchat crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Search service error: {0}")]
    Search(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Text extraction error: {0}")]
    Extraction(String),

    #[error("Prompt template error: {0}")]
    Template(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Error for a required environment variable that is unset or empty
    pub fn missing_env(name: &str) -> Self {
        Error::Configuration(format!("{name} environment variable is not set"))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
