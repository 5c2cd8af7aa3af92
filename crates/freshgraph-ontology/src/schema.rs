//! In-memory ontology schema store.
//!
//! Enforces table-level constraints only: unique class prefix, unique class
//! name, unique property name, referenced classes exist at write time, and
//! `range_class_id` set iff the range is `entity_ref`. Deletes do not cascade,
//! so later lookups must tolerate dangling ids.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use freshgraph_core::{ObjectType, OntologyClass, OntologyProperty, OntologySchema};

use crate::error::{OntologyError, Result};

// ── Inputs ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClass {
    pub class_name: String,
    pub prefix: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_class_id: Option<i64>,
}

impl NewClass {
    pub fn new(class_name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            prefix: prefix.into(),
            description: None,
            parent_class_id: None,
        }
    }

    pub fn with_parent(mut self, parent_class_id: i64) -> Self {
        self.parent_class_id = Some(parent_class_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial class update. `parent_class_id: Some(None)` clears the parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassUpdate {
    pub class_name: Option<String>,
    pub description: Option<String>,
    pub parent_class_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProperty {
    pub prop_name: String,
    pub domain_class_id: i64,
    pub range_kind: ObjectType,
    #[serde(default)]
    pub range_class_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_multi_valued: bool,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

impl NewProperty {
    /// A literal-valued property.
    pub fn literal(prop_name: impl Into<String>, domain_class_id: i64, range: ObjectType) -> Self {
        Self {
            prop_name: prop_name.into(),
            domain_class_id,
            range_kind: range,
            range_class_id: None,
            is_multi_valued: true,
            is_required: false,
            description: None,
        }
    }

    /// An `entity_ref` property pointing at `range_class_id`.
    pub fn link(prop_name: impl Into<String>, domain_class_id: i64, range_class_id: i64) -> Self {
        Self {
            range_class_id: Some(range_class_id),
            ..Self::literal(prop_name, domain_class_id, ObjectType::EntityRef)
        }
    }

    pub fn single(mut self) -> Self {
        self.is_multi_valued = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }
}

/// Partial property update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub description: Option<String>,
    pub is_multi_valued: Option<bool>,
    pub is_required: Option<bool>,
}

// ── Store ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Ontology {
    classes: BTreeMap<i64, OntologyClass>,
    properties: BTreeMap<i64, OntologyProperty>,
    next_class_id: i64,
    next_property_id: i64,
}

impl Ontology {
    pub fn new() -> Self {
        Self {
            classes: BTreeMap::new(),
            properties: BTreeMap::new(),
            next_class_id: 1,
            next_property_id: 1,
        }
    }

    // ── Class lookups ────────────────────────────────────────────

    pub fn class(&self, id: i64) -> Option<&OntologyClass> {
        self.classes.get(&id)
    }

    pub fn class_by_name(&self, class_name: &str) -> Option<&OntologyClass> {
        self.classes.values().find(|c| c.class_name == class_name)
    }

    pub fn class_by_prefix(&self, prefix: &str) -> Option<&OntologyClass> {
        self.classes.values().find(|c| c.prefix == prefix)
    }

    /// All classes ordered by name.
    pub fn list_classes(&self) -> Vec<&OntologyClass> {
        let mut classes: Vec<_> = self.classes.values().collect();
        classes.sort_by(|a, b| a.class_name.cmp(&b.class_name));
        classes
    }

    // ── Property lookups ─────────────────────────────────────────

    pub fn property(&self, id: i64) -> Option<&OntologyProperty> {
        self.properties.get(&id)
    }

    pub fn property_by_name(&self, prop_name: &str) -> Option<&OntologyProperty> {
        self.properties.values().find(|p| p.prop_name == prop_name)
    }

    /// Properties ordered by name, optionally restricted to one domain class.
    pub fn list_properties(&self, domain_class_id: Option<i64>) -> Vec<&OntologyProperty> {
        let mut props: Vec<_> = self
            .properties
            .values()
            .filter(|p| domain_class_id.map_or(true, |d| p.domain_class_id == d))
            .collect();
        props.sort_by(|a, b| a.prop_name.cmp(&b.prop_name));
        props
    }

    // ── Hierarchy ────────────────────────────────────────────────

    /// Whether `class_id` equals `ancestor_id` or descends from it.
    ///
    /// Walks `parent_class_id` upward. A parent that no longer resolves ends
    /// the walk with `false`; revisiting a class is a `CyclicHierarchy`.
    pub fn is_subclass_or_self(&self, class_id: i64, ancestor_id: i64) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut current = Some(class_id);
        while let Some(id) = current {
            if id == ancestor_id {
                return Ok(true);
            }
            if !visited.insert(id) {
                return Err(OntologyError::CyclicHierarchy { class_id });
            }
            current = self.classes.get(&id).and_then(|c| c.parent_class_id);
        }
        Ok(false)
    }

    // ── Class CRUD ───────────────────────────────────────────────

    pub fn create_class(&mut self, new: NewClass) -> Result<OntologyClass> {
        if self.class_by_prefix(&new.prefix).is_some() {
            return Err(OntologyError::DuplicatePrefix(new.prefix));
        }
        if self.class_by_name(&new.class_name).is_some() {
            return Err(OntologyError::DuplicateClassName(new.class_name));
        }
        if let Some(parent) = new.parent_class_id {
            self.require_class(parent)?;
        }

        let now = Utc::now();
        let class = OntologyClass {
            id: self.next_class_id,
            class_name: new.class_name,
            prefix: new.prefix,
            description: new.description,
            parent_class_id: new.parent_class_id,
            created_at: now,
            updated_at: now,
        };
        self.next_class_id += 1;
        self.classes.insert(class.id, class.clone());

        tracing::debug!(class = %class.class_name, prefix = %class.prefix, "Class created");
        Ok(class)
    }

    pub fn update_class(&mut self, id: i64, update: ClassUpdate) -> Result<OntologyClass> {
        self.require_class(id)?;
        if let Some(name) = &update.class_name {
            if self
                .class_by_name(name)
                .is_some_and(|other| other.id != id)
            {
                return Err(OntologyError::DuplicateClassName(name.clone()));
            }
        }
        if let Some(Some(parent)) = update.parent_class_id {
            self.require_class(parent)?;
        }

        let class = self
            .classes
            .get_mut(&id)
            .ok_or(OntologyError::ClassNotFound(id))?;
        if let Some(name) = update.class_name {
            class.class_name = name;
        }
        if let Some(description) = update.description {
            class.description = Some(description);
        }
        if let Some(parent) = update.parent_class_id {
            class.parent_class_id = parent;
        }
        class.updated_at = Utc::now();
        Ok(class.clone())
    }

    /// Remove a class. Subclasses and properties that reference it are left
    /// in place.
    pub fn delete_class(&mut self, id: i64) -> Result<OntologyClass> {
        self.classes
            .remove(&id)
            .ok_or(OntologyError::ClassNotFound(id))
    }

    // ── Property CRUD ────────────────────────────────────────────

    pub fn create_property(&mut self, new: NewProperty) -> Result<OntologyProperty> {
        if self.property_by_name(&new.prop_name).is_some() {
            return Err(OntologyError::DuplicateProperty(new.prop_name));
        }
        self.require_class(new.domain_class_id)?;
        match (new.range_kind, new.range_class_id) {
            (ObjectType::EntityRef, Some(range)) => self.require_class(range)?,
            (ObjectType::EntityRef, None) => {
                return Err(OntologyError::InvalidRange {
                    prop_name: new.prop_name,
                    reason: "entity_ref range requires range_class_id".to_string(),
                })
            }
            (_, Some(_)) => {
                return Err(OntologyError::InvalidRange {
                    prop_name: new.prop_name,
                    reason: format!(
                        "range_class_id is only valid for entity_ref, not {}",
                        new.range_kind
                    ),
                })
            }
            (_, None) => {}
        }

        let now = Utc::now();
        let prop = OntologyProperty {
            id: self.next_property_id,
            prop_name: new.prop_name,
            domain_class_id: new.domain_class_id,
            range_kind: new.range_kind,
            range_class_id: new.range_class_id,
            is_multi_valued: new.is_multi_valued,
            is_required: new.is_required,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        self.next_property_id += 1;
        self.properties.insert(prop.id, prop.clone());

        tracing::debug!(property = %prop.prop_name, range = %prop.range_kind, "Property created");
        Ok(prop)
    }

    pub fn update_property(&mut self, id: i64, update: PropertyUpdate) -> Result<OntologyProperty> {
        let prop = self
            .properties
            .get_mut(&id)
            .ok_or(OntologyError::PropertyNotFound(id))?;
        if let Some(description) = update.description {
            prop.description = Some(description);
        }
        if let Some(multi) = update.is_multi_valued {
            prop.is_multi_valued = multi;
        }
        if let Some(required) = update.is_required {
            prop.is_required = required;
        }
        prop.updated_at = Utc::now();
        Ok(prop.clone())
    }

    pub fn delete_property(&mut self, id: i64) -> Result<OntologyProperty> {
        self.properties
            .remove(&id)
            .ok_or(OntologyError::PropertyNotFound(id))
    }

    // ── Import / Export ──────────────────────────────────────────

    /// Export every class and property, ordered by name.
    pub fn full_schema(&self) -> OntologySchema {
        OntologySchema {
            classes: self.list_classes().into_iter().cloned().collect(),
            properties: self.list_properties(None).into_iter().cloned().collect(),
        }
    }

    /// Load an exported schema, keeping its ids.
    ///
    /// Uniqueness is checked; references between rows are not, since an
    /// export may legitimately contain dangling ids.
    pub fn from_schema(schema: OntologySchema) -> Result<Self> {
        let mut ontology = Self::new();
        for class in schema.classes {
            if ontology.class_by_prefix(&class.prefix).is_some() {
                return Err(OntologyError::DuplicatePrefix(class.prefix));
            }
            if ontology.class_by_name(&class.class_name).is_some() {
                return Err(OntologyError::DuplicateClassName(class.class_name));
            }
            ontology.next_class_id = ontology.next_class_id.max(class.id + 1);
            ontology.classes.insert(class.id, class);
        }
        for prop in schema.properties {
            if ontology.property_by_name(&prop.prop_name).is_some() {
                return Err(OntologyError::DuplicateProperty(prop.prop_name));
            }
            ontology.next_property_id = ontology.next_property_id.max(prop.id + 1);
            ontology.properties.insert(prop.id, prop);
        }
        Ok(ontology)
    }

    /// Read an exported schema from a JSON file.
    pub fn load_json(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let schema: OntologySchema = serde_json::from_str(&raw)?;
        Self::from_schema(schema)
    }

    fn require_class(&self, id: i64) -> Result<()> {
        if self.classes.contains_key(&id) {
            Ok(())
        } else {
            Err(OntologyError::ClassNotFound(id))
        }
    }
}

impl Default for Ontology {
    fn default() -> Self {
        Self::new()
    }
}
