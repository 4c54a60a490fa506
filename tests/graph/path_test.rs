use std::collections::BTreeMap;
use std::collections::HashSet;

use trellis::config::{ColumnConfig, RelationshipConfig, SchemaConfig, TableConfig};
use trellis::graph::{RelationshipKind, SchemaGraph};

fn table(columns: &[&str], pk: Option<&str>) -> TableConfig {
    TableConfig {
        description: None,
        primary_key: pk.map(String::from),
        columns: columns
            .iter()
            .map(|c| (c.to_string(), ColumnConfig::default()))
            .collect(),
    }
}

fn relationship(from: (&str, &str), to: (&str, &str), kind: RelationshipKind) -> RelationshipConfig {
    RelationshipConfig {
        from_table: from.0.into(),
        from_column: Some(from.1.into()),
        to_table: to.0.into(),
        to_column: Some(to.1.into()),
        relationship: kind,
    }
}

/// clients ─< funds ─< holdings >─ securities, plus a direct
/// clients ─< fund_managers edge and funds ─< fund_managers so two routes
/// reach fund_managers. benchmarks is isolated.
fn fund_graph() -> SchemaGraph {
    let mut tables = BTreeMap::new();
    tables.insert("clients".into(), table(&["id", "client_name", "client_type"], Some("id")));
    tables.insert(
        "funds".into(),
        table(&["id", "name", "client_id", "total_aum"], Some("id")),
    );
    tables.insert(
        "holdings".into(),
        table(&["id", "fund_id", "security_id", "market_value"], Some("id")),
    );
    tables.insert("securities".into(), table(&["id", "ticker"], Some("id")));
    tables.insert(
        "fund_managers".into(),
        table(&["id", "client_id", "fund_id", "manager_name"], Some("id")),
    );
    tables.insert("benchmarks".into(), table(&["id", "name"], Some("id")));

    let config = SchemaConfig {
        tables,
        relationships: vec![
            relationship(("funds", "id"), ("holdings", "fund_id"), RelationshipKind::OneToMany),
            relationship(("clients", "id"), ("funds", "client_id"), RelationshipKind::OneToMany),
            relationship(
                ("securities", "id"),
                ("holdings", "security_id"),
                RelationshipKind::OneToMany,
            ),
            relationship(
                ("clients", "id"),
                ("fund_managers", "client_id"),
                RelationshipKind::OneToMany,
            ),
            relationship(
                ("funds", "id"),
                ("fund_managers", "fund_id"),
                RelationshipKind::OneToMany,
            ),
        ],
    };
    SchemaGraph::build_from_schema(&config).unwrap()
}

#[test]
fn test_shortest_path_single_hop() {
    let graph = fund_graph();
    let path = graph.find_shortest_path("funds", "holdings").unwrap();
    assert_eq!(path.len(), 1);
    assert_eq!(path.tables, vec!["funds", "holdings"]);
}

#[test]
fn test_shortest_path_multi_hop() {
    let graph = fund_graph();
    let path = graph.find_shortest_path("clients", "holdings").unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(path.tables, vec!["clients", "funds", "holdings"]);

    // Three hops to securities, traversing the last edge backwards
    let path = graph.find_shortest_path("clients", "securities").unwrap();
    assert_eq!(path.len(), 3);
    assert_eq!(path.tables, vec!["clients", "funds", "holdings", "securities"]);
    let last = &path.edges[2];
    assert_eq!(last.from_table, "holdings");
    assert_eq!(last.to_table, "securities");
    assert_eq!(last.relationship, RelationshipKind::ManyToOne);
}

#[test]
fn test_shortest_path_prefers_direct_edge() {
    let graph = fund_graph();
    // Both clients→fund_managers (direct) and clients→funds→fund_managers exist
    let path = graph.find_shortest_path("clients", "fund_managers").unwrap();
    assert_eq!(path.len(), 1);
}

#[test]
fn test_shortest_path_same_table_is_empty() {
    let graph = fund_graph();
    let path = graph.find_shortest_path("funds", "funds").unwrap();
    assert_eq!(path.len(), 0);
    assert!(path.is_empty());
    assert_eq!(path.tables, vec!["funds"]);
}

#[test]
fn test_unreachable_and_unknown_pairs_return_none() {
    let graph = fund_graph();
    assert!(graph.find_shortest_path("funds", "benchmarks").is_none());
    assert!(graph.find_shortest_path("funds", "nonexistent").is_none());
    assert!(graph.find_all_paths("funds", "benchmarks", 5).is_empty());
    assert!(graph.find_all_paths("nonexistent", "funds", 5).is_empty());
}

#[test]
fn test_all_paths_are_simple_bounded_and_sorted() {
    let graph = fund_graph();
    let paths = graph.find_all_paths("clients", "fund_managers", 4);
    assert!(paths.len() >= 2);

    // Ascending by length, shortest first
    for window in paths.windows(2) {
        assert!(window[0].len() <= window[1].len());
    }
    assert_eq!(paths[0].len(), 1);

    for path in &paths {
        assert!(path.len() <= 4);
        let unique: HashSet<&String> = path.tables.iter().collect();
        assert_eq!(unique.len(), path.tables.len(), "path repeats a table");
        assert_eq!(path.tables.len(), path.edges.len() + 1);
    }
}

#[test]
fn test_all_paths_respects_depth_bound() {
    let graph = fund_graph();
    let shallow = graph.find_all_paths("clients", "securities", 2);
    assert!(shallow.is_empty());
    let deep = graph.find_all_paths("clients", "securities", 3);
    assert_eq!(deep.len(), 1);
    assert_eq!(deep[0].len(), 3);
}

#[test]
fn test_join_path_sql_exact_clause() {
    let graph = fund_graph();
    let path = graph.find_shortest_path("funds", "holdings").unwrap();
    assert_eq!(
        graph.join_path_sql(&path),
        vec!["JOIN holdings ON funds.id = holdings.fund_id"]
    );
}

#[test]
fn test_join_path_sql_multi_hop_in_order() {
    let graph = fund_graph();
    let path = graph.find_shortest_path("clients", "holdings").unwrap();
    assert_eq!(
        graph.join_path_sql(&path),
        vec![
            "JOIN funds ON clients.id = funds.client_id",
            "JOIN holdings ON funds.id = holdings.fund_id",
        ]
    );
}

#[test]
fn test_join_path_sql_fallback_convention() {
    let mut tables = BTreeMap::new();
    tables.insert("funds".into(), table(&["id"], Some("id")));
    tables.insert("holdings".into(), table(&["id", "funds_id"], Some("id")));
    let config = SchemaConfig {
        tables,
        relationships: vec![RelationshipConfig {
            from_table: "funds".into(),
            from_column: None,
            to_table: "holdings".into(),
            to_column: None,
            relationship: RelationshipKind::OneToMany,
        }],
    };
    let graph = SchemaGraph::build_from_schema(&config).unwrap();
    let path = graph.find_shortest_path("funds", "holdings").unwrap();
    assert_eq!(
        graph.join_path_sql(&path),
        vec!["JOIN holdings ON funds.id = holdings.funds_id"]
    );
}
