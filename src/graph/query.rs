//! Query interface for the schema knowledge graph.
//!
//! Path search runs over table nodes only - column nodes never take part
//! in traversal. Relationship edges are directional in meaning but
//! traversable both ways for reachability, with the edge re-oriented
//! along the traversal so join-clause synthesis stays uniform.

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

use super::types::{Path, RelationshipEdge, SchemaEdge};
use super::SchemaGraph;

/// Declared relationships touching a table, split by orientation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRelationships {
    /// Edges where the table is the parent side
    pub outgoing: Vec<RelationshipEdge>,
    /// Edges where the table is the child side
    pub incoming: Vec<RelationshipEdge>,
}

impl SchemaGraph {
    /// Find the shortest join path between two tables.
    ///
    /// BFS over relationship edges, both directions. Ties among
    /// equal-length paths go to the first path found, which follows edge
    /// insertion order - deterministic for a given schema description but
    /// not otherwise meaningful. Unknown or unreachable pairs yield
    /// `None`, not an error.
    pub fn find_shortest_path(&self, from: &str, to: &str) -> Option<Path> {
        let from_idx = *self.table_index().get(from)?;
        let to_idx = *self.table_index().get(to)?;

        if from_idx == to_idx {
            return Some(Path {
                tables: vec![from.to_string()],
                edges: vec![],
            });
        }

        // Parent map records how each table was reached: predecessor index
        // plus the traversal-oriented edge.
        let mut parent: HashMap<NodeIndex, (NodeIndex, RelationshipEdge)> = HashMap::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        queue.push_back(from_idx);
        visited.insert(from_idx);

        while let Some(current) = queue.pop_front() {
            if current == to_idx {
                return Some(self.reconstruct_path(from_idx, to_idx, &parent));
            }

            for (neighbor, edge) in self.relationship_neighbors(current) {
                if visited.insert(neighbor) {
                    parent.insert(neighbor, (current, edge));
                    queue.push_back(neighbor);
                }
            }
        }

        None
    }

    /// Enumerate all simple paths between two tables, up to `max_depth`
    /// edges, ordered ascending by length.
    ///
    /// Returns an empty list when no path exists within the bound.
    pub fn find_all_paths(&self, from: &str, to: &str, max_depth: usize) -> Vec<Path> {
        let (Some(&from_idx), Some(&to_idx)) =
            (self.table_index().get(from), self.table_index().get(to))
        else {
            return vec![];
        };

        let mut paths = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(from_idx);
        let mut tables = vec![from.to_string()];
        let mut edges = Vec::new();

        self.collect_paths(
            from_idx,
            to_idx,
            max_depth,
            &mut visited,
            &mut tables,
            &mut edges,
            &mut paths,
        );

        // Stable sort keeps discovery order within each length class.
        paths.sort_by_key(|p| p.len());
        paths
    }

    /// Depth-first enumeration of simple paths. Termination is guaranteed
    /// by the visited set and the depth bound.
    #[allow(clippy::too_many_arguments)]
    fn collect_paths(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        max_depth: usize,
        visited: &mut HashSet<NodeIndex>,
        tables: &mut Vec<String>,
        edges: &mut Vec<RelationshipEdge>,
        paths: &mut Vec<Path>,
    ) {
        if current == target && !edges.is_empty() {
            paths.push(Path {
                tables: tables.clone(),
                edges: edges.clone(),
            });
            return;
        }
        if edges.len() >= max_depth {
            return;
        }

        for (neighbor, edge) in self.relationship_neighbors(current) {
            if visited.contains(&neighbor) {
                continue;
            }
            visited.insert(neighbor);
            tables.push(edge.to_table.clone());
            edges.push(edge);

            self.collect_paths(neighbor, target, max_depth, visited, tables, edges, paths);

            edges.pop();
            tables.pop();
            visited.remove(&neighbor);
        }
    }

    /// One JOIN clause per path edge, in traversal order.
    ///
    /// Edges with declared join columns emit
    /// `JOIN <to> ON <from>.<col> = <to>.<col>`. An edge without them
    /// falls back to the `<from>.id = <to>.<from>_id` naming convention -
    /// a heuristic, not a verified mapping; the validator will still
    /// check the columns it names.
    pub fn join_path_sql(&self, path: &Path) -> Vec<String> {
        path.edges
            .iter()
            .map(|edge| {
                let (from_col, to_col) = match (&edge.from_column, &edge.to_column) {
                    (Some(f), Some(t)) => (f.clone(), t.clone()),
                    _ => ("id".to_string(), format!("{}_id", edge.from_table)),
                };
                format!(
                    "JOIN {} ON {}.{} = {}.{}",
                    edge.to_table, edge.from_table, from_col, edge.to_table, to_col
                )
            })
            .collect()
    }

    /// All declared relationships where `table` is the parent (outgoing)
    /// or the child (incoming) side. Uses declaration orientation, not
    /// traversal orientation.
    pub fn table_relationships(&self, table: &str) -> TableRelationships {
        let mut rels = TableRelationships::default();
        for edge_ref in self.graph_ref().edge_references() {
            if let SchemaEdge::Relates(rel) = edge_ref.weight() {
                if rel.from_table == table {
                    rels.outgoing.push(rel.clone());
                }
                if rel.to_table == table {
                    rels.incoming.push(rel.clone());
                }
            }
        }
        rels
    }

    /// Relationship-edge neighbors of a table node, with each edge
    /// oriented along the traversal direction.
    fn relationship_neighbors(
        &self,
        current: NodeIndex,
    ) -> impl Iterator<Item = (NodeIndex, RelationshipEdge)> + '_ {
        let forward = self
            .graph_ref()
            .edges_directed(current, Direction::Outgoing)
            .filter_map(|e| match e.weight() {
                SchemaEdge::Relates(rel) => Some((e.target(), rel.clone())),
                _ => None,
            });
        let backward = self
            .graph_ref()
            .edges_directed(current, Direction::Incoming)
            .filter_map(|e| match e.weight() {
                SchemaEdge::Relates(rel) => Some((e.source(), rel.reversed())),
                _ => None,
            });
        forward.chain(backward)
    }

    /// Rebuild the path from the BFS parent map.
    fn reconstruct_path(
        &self,
        from_idx: NodeIndex,
        to_idx: NodeIndex,
        parent: &HashMap<NodeIndex, (NodeIndex, RelationshipEdge)>,
    ) -> Path {
        let mut edges = Vec::new();
        let mut current = to_idx;

        while current != from_idx {
            let Some((prev, edge)) = parent.get(&current) else {
                break;
            };
            edges.push(edge.clone());
            current = *prev;
        }
        edges.reverse();

        let mut tables = Vec::with_capacity(edges.len() + 1);
        if let Some(first) = edges.first() {
            tables.push(first.from_table.clone());
        }
        for edge in &edges {
            tables.push(edge.to_table.clone());
        }

        Path { tables, edges }
    }
}
