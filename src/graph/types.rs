//! Type definitions for the schema knowledge graph.
//!
//! Nodes are tables and columns; edges are column-membership links and
//! declared table relationships. All types here are immutable once the
//! graph is built.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Supporting Enums
// ============================================================================

/// Kind of a declared relationship between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    /// One row on the parent side maps to many child rows
    OneToMany,
    /// Many rows map to one parent row
    ManyToOne,
    /// Many-to-many (bridge table elided in the declaration)
    ManyToMany,
}

impl RelationshipKind {
    /// Reverse the kind (swap parent/child sides).
    pub fn reverse(self) -> Self {
        match self {
            RelationshipKind::OneToMany => RelationshipKind::ManyToOne,
            RelationshipKind::ManyToOne => RelationshipKind::OneToMany,
            RelationshipKind::ManyToMany => RelationshipKind::ManyToMany,
        }
    }

    /// Returns true if following this edge can multiply rows.
    pub fn causes_fanout(&self) -> bool {
        matches!(
            self,
            RelationshipKind::OneToMany | RelationshipKind::ManyToMany
        )
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipKind::OneToMany => write!(f, "1:N"),
            RelationshipKind::ManyToOne => write!(f, "N:1"),
            RelationshipKind::ManyToMany => write!(f, "N:N"),
        }
    }
}

/// Data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// String/text type
    String,
    /// Integer type
    Integer,
    /// Floating point / decimal type
    Float,
    /// Boolean type
    Boolean,
    /// Date type
    Date,
    /// Timestamp type
    Timestamp,
    /// JSON type
    Json,
    /// Unknown type (default when the description omits it)
    Unknown,
}

impl ColumnType {
    /// Returns true for types that aggregate arithmetic applies to cleanly.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Lenient parse from the free-form type strings schema descriptions use.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return ColumnType::Unknown;
        }
        if lower.contains("int") || lower == "serial" {
            ColumnType::Integer
        } else if lower.contains("float")
            || lower.contains("double")
            || lower.contains("decimal")
            || lower.contains("numeric")
            || lower.contains("real")
            || lower.contains("money")
        {
            ColumnType::Float
        } else if lower.contains("bool") {
            ColumnType::Boolean
        } else if lower.contains("timestamp") || lower.contains("datetime") {
            ColumnType::Timestamp
        } else if lower.contains("date") {
            ColumnType::Date
        } else if lower.contains("json") {
            ColumnType::Json
        } else if lower.contains("char")
            || lower.contains("text")
            || lower == "string"
            || lower == "uuid"
        {
            ColumnType::String
        } else {
            ColumnType::Unknown
        }
    }
}

impl Default for ColumnType {
    fn default() -> Self {
        ColumnType::Unknown
    }
}

// ============================================================================
// Node Types
// ============================================================================

/// Table node.
#[derive(Debug, Clone, PartialEq)]
pub struct TableNode {
    /// Table name (graph identity)
    pub name: String,
    /// Human description from the schema description
    pub description: Option<String>,
    /// Primary key column, if declared
    pub primary_key: Option<String>,
    /// Custom metadata
    pub metadata: HashMap<String, String>,
}

/// Column node.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnNode {
    /// Owning table name
    pub table: String,
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: ColumnType,
    /// Is this column the table's primary key?
    pub primary_key: bool,
    /// Human description
    pub description: Option<String>,
}

impl ColumnNode {
    /// Get fully qualified name (table.column).
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

/// Unified node type for graph storage.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// Table node
    Table(TableNode),
    /// Column node
    Column(ColumnNode),
}

impl SchemaNode {
    /// The node's bare name.
    pub fn name(&self) -> &str {
        match self {
            SchemaNode::Table(n) => &n.name,
            SchemaNode::Column(n) => &n.name,
        }
    }

    /// The node's qualified name (tables: name, columns: table.column).
    pub fn qualified_name(&self) -> String {
        match self {
            SchemaNode::Table(n) => n.name.clone(),
            SchemaNode::Column(n) => n.qualified_name(),
        }
    }

    /// Owning table, if any (None for table nodes).
    pub fn table(&self) -> Option<&str> {
        match self {
            SchemaNode::Table(_) => None,
            SchemaNode::Column(n) => Some(&n.table),
        }
    }
}

// ============================================================================
// Edge Types
// ============================================================================

/// Declared relationship between two tables, carrying its join keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    /// Parent-side table
    pub from_table: String,
    /// Child-side table
    pub to_table: String,
    /// Relationship kind
    pub relationship: RelationshipKind,
    /// Join column on the parent side (absent when undeclared)
    pub from_column: Option<String>,
    /// Join column on the child side (absent when undeclared)
    pub to_column: Option<String>,
}

impl RelationshipEdge {
    /// The same edge oriented in the opposite direction.
    ///
    /// Reachability search traverses edges both ways; a reversed edge keeps
    /// join-clause synthesis uniform for backwards traversal.
    pub fn reversed(&self) -> Self {
        Self {
            from_table: self.to_table.clone(),
            to_table: self.from_table.clone(),
            relationship: self.relationship.reverse(),
            from_column: self.to_column.clone(),
            to_column: self.from_column.clone(),
        }
    }
}

/// BELONGS_TO edge: column node → owning table node.
#[derive(Debug, Clone, PartialEq)]
pub struct BelongsToEdge {
    /// Column qualified name
    pub column: String,
    /// Owning table name
    pub table: String,
}

/// Unified edge type for graph storage.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaEdge {
    /// Column belongs to table
    BelongsTo(BelongsToEdge),
    /// Table relates to table
    Relates(RelationshipEdge),
}

impl SchemaEdge {
    /// Get the edge type as a string.
    pub fn edge_type(&self) -> &'static str {
        match self {
            SchemaEdge::BelongsTo(_) => "BELONGS_TO",
            SchemaEdge::Relates(_) => "RELATES",
        }
    }
}

// ============================================================================
// Paths
// ============================================================================

/// A join path between two tables.
///
/// `tables` lists the visited table names in traversal order; `edges`
/// holds one relationship per hop, oriented along the traversal, so
/// `edges[i]` connects `tables[i]` to `tables[i + 1]`. Paths are simple:
/// no table repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Visited tables, source first
    pub tables: Vec<String>,
    /// Traversal-oriented edges, one per hop
    pub edges: Vec<RelationshipEdge>,
}

impl Path {
    /// Path length in edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True for the degenerate single-table path.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Source table.
    pub fn source(&self) -> Option<&str> {
        self.tables.first().map(|s| s.as_str())
    }

    /// Target table.
    pub fn target(&self) -> Option<&str> {
        self.tables.last().map(|s| s.as_str())
    }
}
