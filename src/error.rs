use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// The Error type for annotation service operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration validation error: {0}")]
    ConfigValidationError(String),

    /// The engine pool has been shut down; no further handles can be acquired.
    #[error("Engine pool is closed")]
    PoolClosed,

    /// The annotation engine failed while building, duplicating or executing.
    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },
}
