//! Schema and alias documents and their validation.
//!
//! A schema document lists the fields of one entity:
//!
//! ```toml
//! [[fields]]
//! name = "EMAIL"
//! display_label = "Email"
//! data_type = "email"
//! description = "Primary email address"
//! ```
//!
//! An alias document maps target field names to source-name variants:
//!
//! ```toml
//! CANDIDATE_ID = ["PersonID", "Applicant Number"]
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use fieldmap_model::{AliasTable, EntitySchema, FieldDefinition, compact_key};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SchemaError};

/// Serialized form of an entity schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// Serialized form of an alias table: target field name to aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasDocument(pub BTreeMap<String, Vec<String>>);

impl AliasDocument {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<I, S>(mut self, target: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(target.into())
            .or_default()
            .extend(aliases.into_iter().map(Into::into));
        self
    }
}

/// On-disk encoding of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Json,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Parse a document of either kind from text.
    pub fn parse<T>(self, path: &Path, text: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self {
            Self::Toml => toml::from_str(text).map_err(|source| SchemaError::Toml {
                path: path.to_path_buf(),
                source,
            }),
            Self::Json => serde_json::from_str(text).map_err(|source| SchemaError::Json {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Validate a schema document and build the schema.
pub fn build_schema(id: &str, document: SchemaDocument) -> Result<EntitySchema> {
    if document.fields.is_empty() {
        return Err(SchemaError::EmptySchema {
            schema: id.to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(document.fields.len());
    let mut fields = Vec::with_capacity(document.fields.len());
    for (index, mut field) in document.fields.into_iter().enumerate() {
        field.name = field.name.trim().to_string();
        if field.name.is_empty() {
            return Err(SchemaError::EmptyFieldName {
                schema: id.to_string(),
                index,
            });
        }
        if !seen.insert(field.name.to_uppercase()) {
            return Err(SchemaError::DuplicateField {
                schema: id.to_string(),
                field: field.name,
            });
        }
        fields.push(field);
    }
    Ok(EntitySchema::new(id, fields))
}

/// Validate an alias document against its schema and build the alias table.
///
/// Targets are matched to schema fields case-insensitively and stored under
/// the field's declared name.
pub fn build_aliases(schema: &EntitySchema, document: AliasDocument) -> Result<AliasTable> {
    let field_keys: HashMap<String, &str> = schema
        .fields()
        .iter()
        .map(|f| (compact_key(&f.name), f.name.as_str()))
        .collect();

    let mut table = AliasTable::new();
    for (target, aliases) in document.0 {
        let Some(field) = schema.field(target.trim()) else {
            return Err(SchemaError::UnknownAliasTarget {
                schema: schema.id().to_string(),
                target,
            });
        };
        for alias in aliases {
            if compact_key(&alias).is_empty() {
                return Err(SchemaError::EmptyAlias {
                    schema: schema.id().to_string(),
                    target: field.name.clone(),
                });
            }
            if let Some(other) = field_keys.get(&compact_key(&alias))
                && *other != field.name
            {
                // Exact matches on field names win over aliases, so this
                // alias can never fire.
                warn!(
                    schema = schema.id(),
                    alias = %alias,
                    target = %field.name,
                    shadowed_by = other,
                    "alias equals another field name"
                );
            }
            table
                .insert(&field.name, &alias)
                .map_err(|source| SchemaError::AliasConflict {
                    schema: schema.id().to_string(),
                    source,
                })?;
        }
    }
    Ok(table)
}
