use thiserror::Error;

/// Top-level error type for the FreshGraph platform.
#[derive(Error, Debug)]
pub enum FreshGraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed entity id '{0}': expected 'prefix:id'")]
    MalformedEntityId(String),

    #[error("Malformed triple: {0}")]
    MalformedTriple(String),

    #[error("Unknown object type: {0}")]
    UnknownObjectType(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FreshGraphError>;
