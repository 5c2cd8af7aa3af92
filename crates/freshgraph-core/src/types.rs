//! Core domain types for the FreshGraph knowledge graph.
//!
//! Facts are stored as entity-attribute-value triples. Entities are named by
//! `prefix:local-id` strings and the prefix alone decides the entity's
//! ontology class.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FreshGraphError;

// ── Entity Identity ───────────────────────────────────────────────

/// Separator between an entity's class prefix and its local id.
pub const ID_SEPARATOR: char = ':';

/// A parsed `prefix:local-id` entity identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    raw: String,
    split: usize,
}

impl EntityId {
    /// Parse an entity id. The prefix is everything before the first `:`
    /// and must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, FreshGraphError> {
        match raw.find(ID_SEPARATOR) {
            Some(split) if split > 0 => Ok(Self {
                raw: raw.to_string(),
                split,
            }),
            _ => Err(FreshGraphError::MalformedEntityId(raw.to_string())),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.raw[..self.split]
    }

    pub fn local_id(&self) -> &str {
        &self.raw[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for EntityId {
    type Error = FreshGraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.raw
    }
}

/// The class prefix of a raw id string, without validating the rest.
///
/// Returns the text before the first `:`, or the whole string when there is
/// no separator.
pub fn prefix_of(raw: &str) -> &str {
    raw.split(ID_SEPARATOR).next().unwrap_or(raw)
}

// ── Object Types ──────────────────────────────────────────────────

/// The declared type of a triple's object value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    String,
    Int,
    Float,
    Bool,
    Date,
    Timestamp,
    EntityRef,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::EntityRef => "entity_ref",
        }
    }

    /// Whether literal values of this type must parse before they are accepted.
    pub fn is_checked_literal(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Bool)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = FreshGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            "date" => Ok(Self::Date),
            "timestamp" => Ok(Self::Timestamp),
            "entity_ref" => Ok(Self::EntityRef),
            other => Err(FreshGraphError::UnknownObjectType(other.to_string())),
        }
    }
}

// ── Triples ───────────────────────────────────────────────────────

/// The wire shape of a fact to be written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TripleInput {
    pub subject_id: String,
    pub predicate: String,
    pub object_value: String,
    pub object_type: ObjectType,
}

impl TripleInput {
    pub fn new(
        subject_id: impl Into<String>,
        predicate: impl Into<String>,
        object_value: impl Into<String>,
        object_type: ObjectType,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            predicate: predicate.into(),
            object_value: object_value.into(),
            object_type,
        }
    }

    /// Check the structural shape of the triple: a `prefix:id` subject and a
    /// non-empty predicate. Schema conformance is not checked here.
    pub fn check_structure(&self) -> Result<EntityId, FreshGraphError> {
        let subject = EntityId::parse(&self.subject_id)?;
        if self.predicate.trim().is_empty() {
            return Err(FreshGraphError::MalformedTriple(format!(
                "empty predicate for subject {}",
                self.subject_id
            )));
        }
        Ok(subject)
    }
}

/// A stored fact. At most one live triple exists per `(subject_id, predicate)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Triple {
    pub subject_id: String,
    pub predicate: String,
    pub object_value: String,
    pub object_type: ObjectType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Triple {
    /// Build a fresh triple from an input, stamped with `now`.
    pub fn from_input(input: TripleInput, now: DateTime<Utc>) -> Self {
        Self {
            subject_id: input.subject_id,
            predicate: input.predicate,
            object_value: input.object_value,
            object_type: input.object_type,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn subject_prefix(&self) -> &str {
        prefix_of(&self.subject_id)
    }
}

/// Optional equality filters over triple fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripleFilter {
    pub subject_id: Option<String>,
    pub predicate: Option<String>,
    pub object_value: Option<String>,
    pub object_type: Option<ObjectType>,
}

impl TripleFilter {
    pub fn matches(&self, triple: &Triple) -> bool {
        if let Some(s) = &self.subject_id {
            if &triple.subject_id != s {
                return false;
            }
        }
        if let Some(p) = &self.predicate {
            if &triple.predicate != p {
                return false;
            }
        }
        if let Some(v) = &self.object_value {
            if &triple.object_value != v {
                return false;
            }
        }
        if let Some(t) = &self.object_type {
            if &triple.object_type != t {
                return false;
            }
        }
        true
    }
}

// ── Ontology ──────────────────────────────────────────────────────

/// A class in the ontology. Classes form a forest through `parent_class_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OntologyClass {
    pub id: i64,
    pub class_name: String,
    pub prefix: String,
    pub description: Option<String>,
    pub parent_class_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A property (predicate) in the ontology.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OntologyProperty {
    pub id: i64,
    pub prop_name: String,
    pub domain_class_id: i64,
    pub range_kind: ObjectType,
    /// Set iff `range_kind` is `entity_ref`.
    pub range_class_id: Option<i64>,
    /// Declared only; storage keeps one live value per predicate regardless.
    pub is_multi_valued: bool,
    pub is_required: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The complete exported ontology.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OntologySchema {
    pub classes: Vec<OntologyClass>,
    pub properties: Vec<OntologyProperty>,
}
