//! Target entity schemas and their alias tables.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AliasConflict;
use crate::names::compact_key;

/// Data type of a target field.
///
/// Used as a hint when building the descriptive text that gets embedded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDataType {
    #[default]
    String,
    Number,
    Date,
    Email,
    Phone,
    Boolean,
    List,
    Url,
    #[serde(other)]
    Other,
}

impl FieldDataType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Url => "url",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field of a target entity schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name, unique within its schema.
    pub name: String,
    /// Human-readable label.
    #[serde(default)]
    pub display_label: String,
    #[serde(default)]
    pub data_type: FieldDataType,
    #[serde(default)]
    pub required: bool,
    /// Free text used to enrich the field's embedding.
    #[serde(default)]
    pub description: String,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, data_type: FieldDataType) -> Self {
        Self {
            name: name.into(),
            display_label: String::new(),
            data_type,
            required: false,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.display_label = label.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Label to show for this field, falling back to the name.
    pub fn label(&self) -> &str {
        if self.display_label.trim().is_empty() {
            &self.name
        } else {
            &self.display_label
        }
    }
}

/// A named, ordered collection of target fields (e.g. "candidate").
///
/// Field order is the declaration order from configuration and is the last
/// tie-breaker everywhere candidates are ranked.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    id: String,
    fields: Vec<FieldDefinition>,
    version: String,
    positions: HashMap<String, usize>,
}

impl EntitySchema {
    /// Build a schema. Validation of field names happens in the loader.
    pub fn new(id: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        let id = id.into();
        let version = schema_version(&id, &fields);
        let mut positions = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            positions
                .entry(field.name.to_uppercase())
                .or_insert(idx);
        }
        Self {
            id,
            fields,
            version,
            positions,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Content hash over the id and every field's name, label, type and
    /// description. Changes whenever anything that feeds an embedding changes.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up a field by name, case-insensitively.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.position(name).map(|idx| &self.fields[idx])
    }

    /// Declaration index of a field, case-insensitively.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(&name.to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn schema_version(id: &str, fields: &[FieldDefinition]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(b"\n");
    for field in fields {
        hasher.update(field.name.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(field.display_label.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(field.data_type.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(if field.required { b"1" } else { b"0" });
        hasher.update(b"\x1f");
        hasher.update(field.description.as_bytes());
        hasher.update(b"\x1e");
    }
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Known source-name variants per target field.
///
/// Lookup is case- and format-insensitive: aliases are keyed by their
/// compact normalized form, so `Person-ID` and `personid` are the same alias.
/// Each alias belongs to exactly one target field.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: BTreeMap<String, BTreeSet<String>>,
    by_key: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias` for `target`.
    ///
    /// Returns `Ok(false)` when the alias was already registered for the same
    /// target, and an error when it belongs to a different target.
    pub fn insert(&mut self, target: &str, alias: &str) -> Result<bool, AliasConflict> {
        let key = compact_key(alias);
        if let Some(existing) = self.by_key.get(&key) {
            if existing == target {
                return Ok(false);
            }
            return Err(AliasConflict {
                alias: alias.to_string(),
                existing_target: existing.clone(),
                new_target: target.to_string(),
            });
        }
        self.by_key.insert(key, target.to_string());
        self.entries
            .entry(target.to_string())
            .or_default()
            .insert(alias.trim().to_string());
        Ok(true)
    }

    /// Target field for a raw source name, if it is a registered alias.
    pub fn target_for(&self, raw: &str) -> Option<&str> {
        self.target_for_key(&compact_key(raw))
    }

    /// Target field for an already-normalized compact key.
    pub fn target_for_key(&self, key: &str) -> Option<&str> {
        self.by_key.get(key).map(String::as_str)
    }

    /// Aliases registered for a target field, in sorted order.
    pub fn aliases_for(&self, target: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(target)
            .into_iter()
            .flat_map(|aliases| aliases.iter().map(String::as_str))
    }

    /// Target fields with their aliases, sorted by target name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries
            .iter()
            .map(|(target, aliases)| (target.as_str(), aliases))
    }

    /// Number of registered aliases.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
