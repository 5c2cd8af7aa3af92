//! FreshGraph Ontology: the schema that governs the triple store.
//!
//! Pipeline:
//! 1. **Schema**: classes (with single-parent inheritance) and typed properties
//! 2. **Validate**: check a triple against the schema, collecting every violation
//! 3. **Write**: validated (or advisory) upserts into a [`TripleStore`](freshgraph_graph::TripleStore)
//!
//! [`seed`] builds the FreshMart delivery ontology and its demo facts.

pub mod error;
pub mod schema;
pub mod seed;
pub mod validator;
pub mod writer;

pub use error::{OntologyError, Result};
pub use schema::{ClassUpdate, NewClass, NewProperty, Ontology, PropertyUpdate};
pub use validator::{validate, ValidationErrorDetail, ValidationErrorType, ValidationResult};
pub use writer::{TripleWriter, WriteOutcome};
