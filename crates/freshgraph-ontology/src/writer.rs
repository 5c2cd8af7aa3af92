//! Validated write path into a triple store.
//!
//! Validation is advisory: callers pass `validate: false` to write without
//! consulting the ontology. Batch writes report one outcome per input and a
//! failing item never prevents the others from being written.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use freshgraph_core::{Triple, TripleInput};
use freshgraph_graph::TripleStore;

use crate::schema::Ontology;
use crate::validator::{validate, ValidationResult};

/// Result of writing one triple.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    Written { triple: Triple },
    /// Failed schema validation; nothing was written.
    Rejected { validation: ValidationResult },
    /// Structurally invalid (bad subject id, empty predicate).
    Malformed { message: String },
    /// Storage error or broken schema.
    Failed { message: String },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

pub struct TripleWriter {
    ontology: Arc<RwLock<Ontology>>,
    store: Arc<dyn TripleStore>,
}

impl TripleWriter {
    pub fn new(ontology: Arc<RwLock<Ontology>>, store: Arc<dyn TripleStore>) -> Self {
        Self { ontology, store }
    }

    pub fn store(&self) -> &Arc<dyn TripleStore> {
        &self.store
    }

    pub async fn write(&self, input: TripleInput, validate: bool) -> WriteOutcome {
        if let Err(e) = input.check_structure() {
            return WriteOutcome::Malformed {
                message: e.to_string(),
            };
        }

        if validate {
            let result = {
                let ontology = self.ontology.read().await;
                crate::validator::validate(&ontology, &input)
            };
            match result {
                Ok(v) if v.is_valid => {}
                Ok(v) => {
                    tracing::debug!(
                        subject = %input.subject_id,
                        predicate = %input.predicate,
                        errors = v.errors.len(),
                        "Triple rejected by ontology"
                    );
                    return WriteOutcome::Rejected { validation: v };
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Validation aborted");
                    return WriteOutcome::Failed {
                        message: e.to_string(),
                    };
                }
            }
        }

        match self.store.upsert(input).await {
            Ok(triple) => WriteOutcome::Written { triple },
            Err(e) => {
                tracing::warn!(error = %e, "Triple write failed");
                WriteOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Write each input independently, in order.
    pub async fn write_batch(&self, inputs: Vec<TripleInput>, validate: bool) -> Vec<WriteOutcome> {
        let total = inputs.len();
        let mut outcomes = Vec::with_capacity(total);
        for input in inputs {
            outcomes.push(self.write(input, validate).await);
        }
        let written = outcomes.iter().filter(|o| o.is_written()).count();
        tracing::info!(total, written, not_written = total - written, "Batch write complete");
        outcomes
    }

    /// Validate without writing.
    pub async fn check(&self, input: &TripleInput) -> crate::Result<ValidationResult> {
        let ontology = self.ontology.read().await;
        validate(&ontology, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshgraph_core::ObjectType;
    use freshgraph_graph::MemoryTripleStore;

    use crate::seed::freshmart;

    fn writer() -> (TripleWriter, Arc<MemoryTripleStore>) {
        let store = Arc::new(MemoryTripleStore::new());
        let ontology = Arc::new(RwLock::new(freshmart().unwrap()));
        (TripleWriter::new(ontology, store.clone()), store)
    }

    #[tokio::test]
    async fn batch_reports_each_item() {
        let (writer, store) = writer();
        let outcomes = writer
            .write_batch(
                vec![
                    TripleInput::new("order:FM-1", "order_status", "CREATED", ObjectType::String),
                    TripleInput::new("order:FM-1", "customer_name", "Ada", ObjectType::String),
                    TripleInput::new("FM-1", "order_status", "CREATED", ObjectType::String),
                    TripleInput::new("order:FM-2", "order_status", "CREATED", ObjectType::String),
                ],
                true,
            )
            .await;

        assert!(matches!(outcomes[0], WriteOutcome::Written { .. }));
        assert!(matches!(outcomes[1], WriteOutcome::Rejected { .. }));
        assert!(matches!(outcomes[2], WriteOutcome::Malformed { .. }));
        assert!(matches!(outcomes[3], WriteOutcome::Written { .. }));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn validation_is_advisory() {
        let (writer, store) = writer();
        let input = TripleInput::new("order:FM-1", "customer_name", "Ada", ObjectType::String);

        let report = writer.check(&input).await.unwrap();
        assert!(!report.is_valid);

        let outcome = writer.write(input, false).await;
        assert!(outcome.is_written());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn malformed_is_reported_even_without_validation() {
        let (writer, _) = writer();
        let outcome = writer
            .write(TripleInput::new("order:FM-1", "", "x", ObjectType::String), false)
            .await;
        assert!(matches!(outcome, WriteOutcome::Malformed { .. }));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = WriteOutcome::Malformed {
            message: "bad".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "malformed");
    }
}
