//! Read operations and row decoding for triples stored in Neo4j.

use chrono::{DateTime, Utc};
use neo4rs::{query, Query};

use freshgraph_core::{ObjectType, Triple, TripleFilter};

use crate::client::{GraphClient, StoreError};

/// Projection of a `(:Triple)` node bound to `t` into named columns.
pub(crate) const TRIPLE_COLUMNS: &str = "t.subject_id AS subject_id, \
     t.predicate AS predicate, \
     t.object_value AS object_value, \
     t.object_type AS object_type, \
     t.created_at AS created_at, \
     t.updated_at AS updated_at";

impl GraphClient {
    /// Get the live triple for `(subject_id, predicate)`.
    pub async fn get_triple(
        &self,
        subject_id: &str,
        predicate: &str,
    ) -> Result<Option<Triple>, StoreError> {
        let cypher = format!(
            "MATCH (t:Triple {{subject_id: $subject_id, predicate: $predicate}})
             RETURN {TRIPLE_COLUMNS}"
        );
        let q = query(&cypher)
            .param("subject_id", subject_id.to_string())
            .param("predicate", predicate.to_string());

        self.query_one(q).await?.map(|row| row_to_triple(&row)).transpose()
    }

    /// All triples of one subject, ordered by predicate.
    pub async fn subject_triples(&self, subject_id: &str) -> Result<Vec<Triple>, StoreError> {
        let cypher = format!(
            "MATCH (t:Triple {{subject_id: $subject_id}})
             RETURN {TRIPLE_COLUMNS}
             ORDER BY predicate"
        );
        let q = query(&cypher).param("subject_id", subject_id.to_string());
        self.collect_triples(q).await
    }

    /// Reverse lookup: triples whose object equals `object_value`.
    pub async fn triples_by_object(
        &self,
        predicate: &str,
        object_value: &str,
    ) -> Result<Vec<Triple>, StoreError> {
        let cypher = format!(
            "MATCH (t:Triple {{predicate: $predicate, object_value: $object_value}})
             RETURN {TRIPLE_COLUMNS}
             ORDER BY subject_id"
        );
        let q = query(&cypher)
            .param("predicate", predicate.to_string())
            .param("object_value", object_value.to_string());
        self.collect_triples(q).await
    }

    /// Distinct subject ids starting with `pattern`.
    pub async fn subjects_starting_with(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let q = query(
            "MATCH (t:Triple) WHERE t.subject_id STARTS WITH $pattern
             RETURN DISTINCT t.subject_id AS subject_id
             ORDER BY subject_id",
        )
        .param("pattern", pattern.to_string());

        let rows = self.query_rows(q).await?;
        rows.iter()
            .map(|row| {
                row.get::<String>("subject_id")
                    .map_err(|e| StoreError::Serialization(format!("subject_id: {e}")))
            })
            .collect()
    }

    /// Triples matching every set field of the filter.
    pub async fn filter_triples(&self, filter: &TripleFilter) -> Result<Vec<Triple>, StoreError> {
        let mut conditions = Vec::new();
        if filter.subject_id.is_some() {
            conditions.push("t.subject_id = $subject_id");
        }
        if filter.predicate.is_some() {
            conditions.push("t.predicate = $predicate");
        }
        if filter.object_value.is_some() {
            conditions.push("t.object_value = $object_value");
        }
        if filter.object_type.is_some() {
            conditions.push("t.object_type = $object_type");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let cypher = format!(
            "MATCH (t:Triple) {where_clause}
             RETURN {TRIPLE_COLUMNS}
             ORDER BY subject_id, predicate"
        );
        let mut q = query(&cypher);
        if let Some(v) = &filter.subject_id {
            q = q.param("subject_id", v.clone());
        }
        if let Some(v) = &filter.predicate {
            q = q.param("predicate", v.clone());
        }
        if let Some(v) = &filter.object_value {
            q = q.param("object_value", v.clone());
        }
        if let Some(v) = &filter.object_type {
            q = q.param("object_type", v.as_str());
        }
        self.collect_triples(q).await
    }

    pub(crate) async fn collect_triples(&self, q: Query) -> Result<Vec<Triple>, StoreError> {
        let rows = self.query_rows(q).await?;
        rows.iter().map(row_to_triple).collect()
    }
}

// ── Row Decoding ─────────────────────────────────────────────────

/// Decode a row produced with [`TRIPLE_COLUMNS`].
pub(crate) fn row_to_triple(row: &neo4rs::Row) -> Result<Triple, StoreError> {
    let text = |key: &str| -> Result<String, StoreError> {
        row.get::<String>(key)
            .map_err(|e| StoreError::Serialization(format!("{key}: {e}")))
    };

    let object_type: ObjectType = text("object_type")?
        .parse()
        .map_err(|e: freshgraph_core::FreshGraphError| StoreError::Serialization(e.to_string()))?;

    Ok(Triple {
        subject_id: text("subject_id")?,
        predicate: text("predicate")?,
        object_value: text("object_value")?,
        object_type,
        created_at: parse_timestamp(&text("created_at")?)?,
        updated_at: parse_timestamp(&text("updated_at")?)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_through_rfc3339() {
        let now = Utc::now();
        assert_eq!(parse_timestamp(&now.to_rfc3339()).unwrap(), now);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn projection_names_every_triple_field() {
        for column in [
            "subject_id",
            "predicate",
            "object_value",
            "object_type",
            "created_at",
            "updated_at",
        ] {
            assert!(TRIPLE_COLUMNS.contains(&format!("AS {column}")));
        }
    }
}
