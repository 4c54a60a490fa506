//! Schema knowledge graph - tables, columns, and declared relationships.
//!
//! The graph is built once per schema version from a [`SchemaConfig`]
//! (see [`builder`]) and is read-only afterwards, so it can be shared
//! across concurrent planning requests without locks.

mod builder;
pub mod query;
pub mod types;

pub use query::TableRelationships;
pub use types::*;

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::config::SchemaConfig;

/// The schema knowledge graph.
///
/// Two node types:
/// - Tables
/// - Columns
///
/// Two edge types:
/// - BELONGS_TO: column → owning table
/// - RELATES: table → table (declared relationship with join keys)
///
/// Invariant: every edge references nodes that exist, and nothing mutates
/// the graph after [`SchemaGraph::build_from_schema`] returns.
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    /// The underlying directed graph
    graph: DiGraph<SchemaNode, SchemaEdge>,

    /// Index: table name → NodeIndex
    table_index: HashMap<String, NodeIndex>,

    /// Index: column qualified name (table.column) → NodeIndex
    column_index: HashMap<String, NodeIndex>,
}

impl SchemaGraph {
    /// Create a new empty graph. Use [`SchemaGraph::build_from_schema`]
    /// to construct a populated one.
    pub(crate) fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            table_index: HashMap::new(),
            column_index: HashMap::new(),
        }
    }

    /// Build the graph from a validated schema description.
    ///
    /// Construction is deterministic and idempotent for identical input.
    /// Malformed descriptions fail with a [`crate::config::ConfigError`]
    /// before any graph is produced.
    pub fn build_from_schema(config: &SchemaConfig) -> crate::config::ConfigResult<Self> {
        builder::build(config)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// True if the graph has a table with this exact name.
    pub fn has_table(&self, name: &str) -> bool {
        self.table_index.contains_key(name)
    }

    /// True if the graph has this exact qualified column.
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.column_index.contains_key(&format!("{}.{}", table, column))
    }

    /// Look up a table node by exact name.
    pub fn table(&self, name: &str) -> Option<&TableNode> {
        let idx = self.table_index.get(name)?;
        match self.graph.node_weight(*idx) {
            Some(SchemaNode::Table(t)) => Some(t),
            _ => None,
        }
    }

    /// Look up a column node by exact table and column name.
    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnNode> {
        let idx = self.column_index.get(&format!("{}.{}", table, column))?;
        match self.graph.node_weight(*idx) {
            Some(SchemaNode::Column(c)) => Some(c),
            _ => None,
        }
    }

    /// All table names, sorted.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table_index.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Column nodes belonging to a table, sorted by column name.
    pub fn columns_of(&self, table: &str) -> Vec<&ColumnNode> {
        let mut columns: Vec<&ColumnNode> = self
            .column_index
            .values()
            .filter_map(|idx| match self.graph.node_weight(*idx) {
                Some(SchemaNode::Column(c)) if c.table == table => Some(c),
                _ => None,
            })
            .collect();
        columns.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        columns
    }

    /// All column nodes in the graph, sorted by qualified name.
    pub fn all_columns(&self) -> Vec<&ColumnNode> {
        let mut columns: Vec<&ColumnNode> = self
            .column_index
            .values()
            .filter_map(|idx| match self.graph.node_weight(*idx) {
                Some(SchemaNode::Column(c)) => Some(c),
                _ => None,
            })
            .collect();
        columns.sort_unstable_by_key(|c| c.qualified_name());
        columns
    }

    /// Canonical table name for a case-insensitive lookup.
    ///
    /// Returns the graph's spelling when exactly one table matches
    /// ignoring case; `None` when there is no match or several.
    pub fn canonical_table(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        let mut found = None;
        for key in self.table_index.keys() {
            if key.to_lowercase() == lower {
                if found.is_some() {
                    return None;
                }
                found = Some(key.as_str());
            }
        }
        found
    }

    /// Canonical column name under a table for a case-insensitive lookup.
    pub fn canonical_column(&self, table: &str, column: &str) -> Option<&str> {
        let lower = column.to_lowercase();
        let mut found = None;
        for col in self.columns_of(table) {
            if col.name.to_lowercase() == lower {
                if found.is_some() {
                    return None;
                }
                found = Some(col.name.as_str());
            }
        }
        found
    }

    // Internal accessors for builder and query modules.

    pub(crate) fn graph_mut(&mut self) -> &mut DiGraph<SchemaNode, SchemaEdge> {
        &mut self.graph
    }

    pub(crate) fn graph_ref(&self) -> &DiGraph<SchemaNode, SchemaEdge> {
        &self.graph
    }

    pub(crate) fn table_index(&self) -> &HashMap<String, NodeIndex> {
        &self.table_index
    }

    pub(crate) fn table_index_mut(&mut self) -> &mut HashMap<String, NodeIndex> {
        &mut self.table_index
    }

    pub(crate) fn column_index_mut(&mut self) -> &mut HashMap<String, NodeIndex> {
        &mut self.column_index
    }
}
