//! Error types for the freshgraph-ontology crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OntologyError {
    #[error("Class not found: {0}")]
    ClassNotFound(i64),

    #[error("Property not found: {0}")]
    PropertyNotFound(i64),

    #[error("Duplicate class prefix: {0}")]
    DuplicatePrefix(String),

    #[error("Duplicate class name: {0}")]
    DuplicateClassName(String),

    #[error("Duplicate property name: {0}")]
    DuplicateProperty(String),

    #[error("Invalid range for property {prop_name}: {reason}")]
    InvalidRange { prop_name: String, reason: String },

    #[error("Cyclic class hierarchy reached from class {class_id}")]
    CyclicHierarchy { class_id: i64 },

    #[error("Store error: {0}")]
    Store(#[from] freshgraph_graph::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OntologyError>;
