//! Triple validation against the ontology.
//!
//! Validation collects every applicable violation instead of stopping at the
//! first one, except that an unknown subject class or unknown predicate ends
//! the check immediately (nothing else can be evaluated without them).

use serde::{Deserialize, Serialize};

use freshgraph_core::types::{prefix_of, ID_SEPARATOR};
use freshgraph_core::{ObjectType, TripleInput};

use crate::error::Result;
use crate::schema::Ontology;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorType {
    UnknownClass,
    UnknownPredicate,
    DomainViolation,
    RangeTypeMismatch,
    InvalidEntityRef,
    RangeClassMismatch,
    InvalidLiteral,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationErrorDetail {
    pub error_type: ValidationErrorType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ValidationErrorDetail {
    fn new(error_type: ValidationErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            predicate: None,
            expected: None,
            actual: None,
        }
    }

    fn predicate(mut self, predicate: &str) -> Self {
        self.predicate = Some(predicate.to_string());
        self
    }

    fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationErrorDetail>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationErrorDetail>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn has(&self, error_type: ValidationErrorType) -> bool {
        self.errors.iter().any(|e| e.error_type == error_type)
    }
}

/// Validate one triple against the ontology.
///
/// Schema violations are reported in the returned [`ValidationResult`]. The
/// only `Err` is a cyclic class hierarchy, which is a defect of the schema
/// rather than of the triple.
pub fn validate(ontology: &Ontology, triple: &TripleInput) -> Result<ValidationResult> {
    use ValidationErrorType::*;

    let subject_prefix = prefix_of(&triple.subject_id);
    let Some(subject_class) = ontology.class_by_prefix(subject_prefix) else {
        return Ok(ValidationResult::from_errors(vec![ValidationErrorDetail::new(
            UnknownClass,
            format!("No class registered for subject prefix '{subject_prefix}'"),
        )
        .actual(subject_prefix)]));
    };

    let Some(prop) = ontology.property_by_name(&triple.predicate) else {
        return Ok(ValidationResult::from_errors(vec![ValidationErrorDetail::new(
            UnknownPredicate,
            format!("Unknown predicate '{}'", triple.predicate),
        )
        .predicate(&triple.predicate)]));
    };

    let mut errors = Vec::new();

    // Domain
    if !ontology.is_subclass_or_self(subject_class.id, prop.domain_class_id)? {
        let expected = class_label(ontology, prop.domain_class_id);
        errors.push(
            ValidationErrorDetail::new(
                DomainViolation,
                format!(
                    "Predicate '{}' does not apply to class '{}' (expected {})",
                    prop.prop_name, subject_class.class_name, expected
                ),
            )
            .predicate(&prop.prop_name)
            .expected(expected)
            .actual(subject_class.class_name.clone()),
        );
    }

    // Range kind
    if prop.range_kind != triple.object_type {
        errors.push(
            ValidationErrorDetail::new(
                RangeTypeMismatch,
                format!(
                    "Predicate '{}' expects {} but got {}",
                    prop.prop_name, prop.range_kind, triple.object_type
                ),
            )
            .predicate(&prop.prop_name)
            .expected(prop.range_kind.as_str())
            .actual(triple.object_type.as_str()),
        );
    }

    // Entity references
    if triple.object_type == ObjectType::EntityRef {
        if !triple.object_value.contains(ID_SEPARATOR) {
            errors.push(
                ValidationErrorDetail::new(
                    InvalidEntityRef,
                    format!(
                        "Entity reference '{}' is not of the form prefix:id",
                        triple.object_value
                    ),
                )
                .predicate(&prop.prop_name)
                .actual(triple.object_value.clone()),
            );
        } else if let Some(range_class) = prop.range_class_id.and_then(|id| ontology.class(id)) {
            let object_prefix = prefix_of(&triple.object_value);
            let conforms = match ontology.class_by_prefix(object_prefix) {
                Some(object_class) => {
                    ontology.is_subclass_or_self(object_class.id, range_class.id)?
                }
                None => false,
            };
            if !conforms {
                errors.push(
                    ValidationErrorDetail::new(
                        RangeClassMismatch,
                        format!(
                            "Object '{}' is not a {}",
                            triple.object_value, range_class.class_name
                        ),
                    )
                    .predicate(&prop.prop_name)
                    .expected(range_class.class_name.clone())
                    .actual(object_prefix),
                );
            }
        }
    }

    // Literals
    if triple.object_type.is_checked_literal() && !literal_parses(triple) {
        errors.push(
            ValidationErrorDetail::new(
                InvalidLiteral,
                format!(
                    "Value '{}' is not a valid {}",
                    triple.object_value, triple.object_type
                ),
            )
            .predicate(&prop.prop_name)
            .expected(triple.object_type.as_str())
            .actual(triple.object_value.clone()),
        );
    }

    Ok(ValidationResult::from_errors(errors))
}

fn literal_parses(triple: &TripleInput) -> bool {
    let value = triple.object_value.trim();
    match triple.object_type {
        ObjectType::Int => value.parse::<i64>().is_ok(),
        ObjectType::Float => value.parse::<f64>().is_ok(),
        // Booleans are matched exactly, padding included.
        ObjectType::Bool => {
            let raw = triple.object_value.as_str();
            raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false")
        }
        _ => true,
    }
}

fn class_label(ontology: &Ontology, id: i64) -> String {
    ontology
        .class(id)
        .map(|c| c.class_name.clone())
        .unwrap_or_else(|| format!("class #{id}"))
}

impl Ontology {
    /// Shorthand for [`validate`].
    pub fn validate(&self, triple: &TripleInput) -> Result<ValidationResult> {
        validate(self, triple)
    }
}
