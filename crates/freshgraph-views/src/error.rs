//! Error types for the freshgraph-views crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Store error: {0}")]
    Store(#[from] freshgraph_graph::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ViewError>;
