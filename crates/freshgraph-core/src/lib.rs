//! freshgraph-core: Shared types, configuration, and error handling for the FreshGraph platform.
//!
//! This crate provides the foundational types used across all FreshGraph components:
//! - Entity identifiers and triples for the EAV knowledge graph
//! - Ontology class and property definitions
//! - Change events published by every store write
//! - The dispatch lifecycle vocabulary (order, task, courier)
//! - Layered configuration loading
//! - Common error types

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod types;

pub use error::FreshGraphError;
pub use events::{ChangeEvent, ChangeKind};
pub use types::{
    EntityId, ObjectType, OntologyClass, OntologyProperty, OntologySchema, Triple, TripleFilter,
    TripleInput,
};
