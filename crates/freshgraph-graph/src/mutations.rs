//! Write operations for triples stored in Neo4j.
//!
//! Each triple is a `(:Triple)` node identified by `(subject_id, predicate)`.
//! All writes use MERGE (upsert) semantics. Timestamps are RFC 3339 strings.

use chrono::Utc;
use neo4rs::query;

use freshgraph_core::{Triple, TripleInput};

use crate::client::{GraphClient, StoreError};
use crate::queries::{row_to_triple, TRIPLE_COLUMNS};

impl GraphClient {
    // ── Schema ───────────────────────────────────────────────────

    /// Create the uniqueness constraint and lookup indexes for triples.
    pub async fn ensure_triple_schema(&self) -> Result<(), StoreError> {
        for cypher in [
            "CREATE CONSTRAINT triple_key IF NOT EXISTS
             FOR (t:Triple) REQUIRE (t.subject_id, t.predicate) IS UNIQUE",
            "CREATE INDEX triple_object IF NOT EXISTS
             FOR (t:Triple) ON (t.predicate, t.object_value)",
        ] {
            self.run(query(cypher)).await?;
        }
        tracing::info!("Triple schema ensured");
        Ok(())
    }

    // ── Upserts ──────────────────────────────────────────────────

    /// Upsert one triple and return the stored row.
    pub async fn merge_triple(&self, input: &TripleInput) -> Result<Triple, StoreError> {
        let cypher = format!(
            "MERGE (t:Triple {{subject_id: $subject_id, predicate: $predicate}})
             ON CREATE SET t.created_at = $now
             SET t.object_value = $object_value,
                 t.object_type = $object_type,
                 t.updated_at = $now
             RETURN {TRIPLE_COLUMNS}"
        );
        let q = query(&cypher)
            .param("subject_id", input.subject_id.clone())
            .param("predicate", input.predicate.clone())
            .param("object_value", input.object_value.clone())
            .param("object_type", input.object_type.as_str())
            .param("now", Utc::now().to_rfc3339());

        match self.query_one(q).await? {
            Some(row) => row_to_triple(&row),
            None => Err(StoreError::NotFound {
                subject_id: input.subject_id.clone(),
                predicate: input.predicate.clone(),
            }),
        }
    }

    /// Re-stamp `updated_at` on an existing triple.
    pub async fn touch_triple(
        &self,
        subject_id: &str,
        predicate: &str,
    ) -> Result<Option<Triple>, StoreError> {
        let cypher = format!(
            "MATCH (t:Triple {{subject_id: $subject_id, predicate: $predicate}})
             SET t.updated_at = $now
             RETURN {TRIPLE_COLUMNS}"
        );
        let q = query(&cypher)
            .param("subject_id", subject_id.to_string())
            .param("predicate", predicate.to_string())
            .param("now", Utc::now().to_rfc3339());

        self.query_one(q).await?.map(|row| row_to_triple(&row)).transpose()
    }

    // ── Deletes ──────────────────────────────────────────────────

    /// Delete one triple, returning the removed row.
    pub async fn delete_triple(
        &self,
        subject_id: &str,
        predicate: &str,
    ) -> Result<Vec<Triple>, StoreError> {
        let q = query(&deleting("t.subject_id = $subject_id AND t.predicate = $predicate"))
            .param("subject_id", subject_id.to_string())
            .param("predicate", predicate.to_string());
        self.collect_triples(q).await
    }

    /// Delete every triple whose subject id starts with `subject_prefix`.
    pub async fn delete_triples_with_prefix(
        &self,
        subject_prefix: &str,
    ) -> Result<Vec<Triple>, StoreError> {
        let q = query(&deleting("t.subject_id STARTS WITH $prefix"))
            .param("prefix", subject_prefix.to_string());
        self.collect_triples(q).await
    }
}

/// A delete statement that returns the removed rows' columns.
fn deleting(condition: &str) -> String {
    format!(
        "MATCH (t:Triple) WHERE {condition}
         WITH t, {TRIPLE_COLUMNS}
         DELETE t
         RETURN subject_id, predicate, object_value, object_type, created_at, updated_at"
    )
}
