//! Schema description input.
//!
//! A [`SchemaConfig`] is the declarative description the graph is built
//! from: a mapping of table name to table definition plus a list of
//! declared relationships. It is deserialized from JSON produced by the
//! schema-onboarding layer upstream.
//!
//! `BTreeMap`s keep iteration order a pure function of the input, so
//! graph construction is deterministic and idempotent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::types::RelationshipKind;

/// Errors raised while validating a schema description.
///
/// These are fatal: no graph is produced, and every request against that
/// schema version fails until the description is fixed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse schema description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Table '{0}' has no columns")]
    EmptyTable(String),

    #[error("Table '{table}' declares primary key '{column}' which is not among its columns")]
    UnknownPrimaryKey { table: String, column: String },

    #[error("Relationship references unknown table '{0}'")]
    UnknownRelationshipTable(String),

    #[error("Relationship references unknown column '{table}.{column}'")]
    UnknownRelationshipColumn { table: String, column: String },

    #[error("Duplicate column '{column}' on table '{table}'")]
    DuplicateColumn { table: String, column: String },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A column definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Free-form type string ("bigint", "varchar(64)", ...)
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A table definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub description: Option<String>,
    /// Primary key column name, if the table has one
    #[serde(default)]
    pub primary_key: Option<String>,
    /// Column name → definition
    pub columns: BTreeMap<String, ColumnConfig>,
}

/// A declared relationship between two tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub from_table: String,
    /// Join column on the parent side; optional, see the fallback
    /// convention in [`crate::graph::SchemaGraph::join_path_sql`]
    #[serde(default)]
    pub from_column: Option<String>,
    pub to_table: String,
    #[serde(default)]
    pub to_column: Option<String>,
    pub relationship: RelationshipKind,
}

/// The full schema description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Table name → definition
    pub tables: BTreeMap<String, TableConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
}

impl SchemaConfig {
    /// Parse and validate a schema description from JSON.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SchemaConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the description before graph construction.
    ///
    /// Checks that every table has columns, that primary keys exist, and
    /// that every relationship endpoint names a known table and column.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, table) in &self.tables {
            if table.columns.is_empty() {
                return Err(ConfigError::EmptyTable(name.clone()));
            }
            if let Some(pk) = &table.primary_key {
                if !table.columns.contains_key(pk) {
                    return Err(ConfigError::UnknownPrimaryKey {
                        table: name.clone(),
                        column: pk.clone(),
                    });
                }
            }
        }

        for rel in &self.relationships {
            for (table, column) in [
                (&rel.from_table, &rel.from_column),
                (&rel.to_table, &rel.to_column),
            ] {
                let Some(table_config) = self.tables.get(table) else {
                    return Err(ConfigError::UnknownRelationshipTable(table.clone()));
                };
                if let Some(col) = column {
                    if !table_config.columns.contains_key(col) {
                        return Err(ConfigError::UnknownRelationshipColumn {
                            table: table.clone(),
                            column: col.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
