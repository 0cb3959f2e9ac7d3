//! Error types for MaidanIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// MaidanIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (socket setup, config file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
