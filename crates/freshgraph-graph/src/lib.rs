//! FreshGraph Graph: triple storage for the knowledge graph.
//!
//! Every fact read or written by the platform goes through a [`TripleStore`].
//! Two backends are provided: an in-process [`MemoryTripleStore`] and a
//! [`Neo4jTripleStore`] over the shared [`GraphClient`]. Both publish a
//! [`ChangeEvent`](freshgraph_core::ChangeEvent) for every committed write.

pub mod client;
pub mod memory;
pub mod mutations;
pub mod neo4j;
pub mod queries;
pub mod store;

pub use client::{GraphClient, GraphConfig, StoreError};
pub use memory::MemoryTripleStore;
pub use neo4j::Neo4jTripleStore;
pub use store::{ChangeFeed, TripleStore, CHANGE_FEED_CAPACITY};
