//! Graph construction from a schema description.
//!
//! Construction happens in two phases, matching the read path:
//! - Phase 1: create all nodes (tables, then their columns)
//! - Phase 2: create all edges (column membership, then relationships)
//!
//! The input is validated before any node is created, so a malformed
//! description never yields a partially built graph.

use crate::config::{ConfigError, ConfigResult, SchemaConfig};

use super::types::{
    BelongsToEdge, ColumnNode, ColumnType, RelationshipEdge, SchemaEdge, SchemaNode, TableNode,
};
use super::SchemaGraph;

/// Build a [`SchemaGraph`] from a validated schema description.
pub(super) fn build(config: &SchemaConfig) -> ConfigResult<SchemaGraph> {
    config.validate()?;

    let mut graph = SchemaGraph::new();

    create_table_nodes(&mut graph, config)?;
    create_column_nodes(&mut graph, config)?;
    create_relationship_edges(&mut graph, config)?;

    Ok(graph)
}

/// Phase 1a: one table node per declared table.
///
/// `SchemaConfig.tables` is a `BTreeMap`, so node insertion order is a
/// pure function of the input.
fn create_table_nodes(graph: &mut SchemaGraph, config: &SchemaConfig) -> ConfigResult<()> {
    for (name, table) in &config.tables {
        let node = TableNode {
            name: name.clone(),
            description: table.description.clone(),
            primary_key: table.primary_key.clone(),
            metadata: Default::default(),
        };
        let idx = graph.graph_mut().add_node(SchemaNode::Table(node));
        graph.table_index_mut().insert(name.clone(), idx);
    }
    Ok(())
}

/// Phase 1b + 2a: one column node per declared column, linked to its
/// table with a BELONGS_TO edge.
fn create_column_nodes(graph: &mut SchemaGraph, config: &SchemaConfig) -> ConfigResult<()> {
    for (table_name, table) in &config.tables {
        let table_idx = *graph
            .table_index()
            .get(table_name)
            .ok_or_else(|| ConfigError::UnknownRelationshipTable(table_name.clone()))?;

        for (column_name, column) in &table.columns {
            let qualified = format!("{}.{}", table_name, column_name);

            let data_type = column
                .data_type
                .as_deref()
                .map(ColumnType::parse)
                .unwrap_or_default();

            let node = ColumnNode {
                table: table_name.clone(),
                name: column_name.clone(),
                data_type,
                primary_key: table.primary_key.as_deref() == Some(column_name),
                description: column.description.clone(),
            };

            let col_idx = graph.graph_mut().add_node(SchemaNode::Column(node));
            if graph
                .column_index_mut()
                .insert(qualified.clone(), col_idx)
                .is_some()
            {
                return Err(ConfigError::DuplicateColumn {
                    table: table_name.clone(),
                    column: column_name.clone(),
                });
            }

            let edge = SchemaEdge::BelongsTo(BelongsToEdge {
                column: qualified,
                table: table_name.clone(),
            });
            graph.graph_mut().add_edge(col_idx, table_idx, edge);
        }
    }
    Ok(())
}

/// Phase 2b: one RELATES edge per declared relationship.
///
/// Endpoints were checked by `SchemaConfig::validate`. Edge insertion
/// order follows the declaration list, which fixes the shortest-path
/// tie-break for a given description.
fn create_relationship_edges(graph: &mut SchemaGraph, config: &SchemaConfig) -> ConfigResult<()> {
    for rel in &config.relationships {
        let from_idx = *graph
            .table_index()
            .get(&rel.from_table)
            .ok_or_else(|| ConfigError::UnknownRelationshipTable(rel.from_table.clone()))?;
        let to_idx = *graph
            .table_index()
            .get(&rel.to_table)
            .ok_or_else(|| ConfigError::UnknownRelationshipTable(rel.to_table.clone()))?;

        let edge = SchemaEdge::Relates(RelationshipEdge {
            from_table: rel.from_table.clone(),
            to_table: rel.to_table.clone(),
            relationship: rel.relationship,
            from_column: rel.from_column.clone(),
            to_column: rel.to_column.clone(),
        });
        graph.graph_mut().add_edge(from_idx, to_idx, edge);
    }
    Ok(())
}
