//! Neo4j connection management, shared graph client, and store errors.

use neo4rs::{ConfigBuilder, Graph, Query};
use serde::Deserialize;

use freshgraph_core::FreshGraphError;

/// Errors from triple store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Malformed triple: {0}")]
    Malformed(#[from] FreshGraphError),

    #[error("Triple not found: ({subject_id}, {predicate})")]
    NotFound {
        subject_id: String,
        predicate: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Configuration for connecting to Neo4j (`[neo4j]` config section).
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}
fn default_user() -> String {
    "neo4j".to_string()
}
fn default_password() -> String {
    "freshgraph-dev".to_string()
}
fn default_max_connections() -> u32 {
    16
}
fn default_fetch_size() -> usize {
    256
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, StoreError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a write-only query.
    pub async fn run(&self, query: Query) -> Result<(), StoreError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, StoreError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>, StoreError> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_config_fills_missing_fields() {
        let cfg: GraphConfig =
            serde_json::from_str(r#"{"uri": "bolt://graph:7687", "fetch_size": 64}"#).unwrap();
        assert_eq!(cfg.uri, "bolt://graph:7687");
        assert_eq!(cfg.fetch_size, 64);
        assert_eq!(cfg.user, "neo4j");
        assert_eq!(cfg.max_connections, 16);
    }
}
