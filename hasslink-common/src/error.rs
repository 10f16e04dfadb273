use thiserror::Error;

/// Common error type for hasslink components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid topic: {0}")]
    Topic(String),
}

/// Result type alias using hasslink's Error.
pub type Result<T> = std::result::Result<T, Error>;
