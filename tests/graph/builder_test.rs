use trellis::config::{ConfigError, SchemaConfig};
use trellis::graph::{ColumnType, SchemaGraph};

fn fund_schema_json() -> &'static str {
    r#"{
        "tables": {
            "clients": {
                "description": "Institutional clients",
                "primary_key": "id",
                "columns": {
                    "id": {"data_type": "bigint"},
                    "client_name": {"data_type": "varchar(128)"},
                    "client_type": {"data_type": "varchar(32)"}
                }
            },
            "funds": {
                "primary_key": "id",
                "columns": {
                    "id": {"data_type": "bigint"},
                    "name": {"data_type": "varchar(128)"},
                    "client_id": {"data_type": "bigint"},
                    "total_aum": {"data_type": "decimal(18,2)"}
                }
            },
            "holdings": {
                "primary_key": "id",
                "columns": {
                    "id": {"data_type": "bigint"},
                    "fund_id": {"data_type": "bigint"},
                    "market_value": {"data_type": "decimal(18,2)"},
                    "sector": {"data_type": "varchar(64)"}
                }
            }
        },
        "relationships": [
            {
                "from_table": "funds",
                "from_column": "id",
                "to_table": "holdings",
                "to_column": "fund_id",
                "relationship": "one-to-many"
            },
            {
                "from_table": "clients",
                "from_column": "id",
                "to_table": "funds",
                "to_column": "client_id",
                "relationship": "one-to-many"
            }
        ]
    }"#
}

#[test]
fn test_build_from_json_schema() {
    let config = SchemaConfig::from_json(fund_schema_json()).unwrap();
    let graph = SchemaGraph::build_from_schema(&config).unwrap();

    assert_eq!(graph.table_names(), vec!["clients", "funds", "holdings"]);
    assert!(graph.has_column("holdings", "market_value"));
    assert!(!graph.has_column("clients", "market_value"));

    let aum = graph.column("funds", "total_aum").unwrap();
    assert_eq!(aum.data_type, ColumnType::Float);
    assert!(!aum.primary_key);
    assert!(graph.column("funds", "id").unwrap().primary_key);

    let clients = graph.table("clients").unwrap();
    assert_eq!(clients.description.as_deref(), Some("Institutional clients"));
    assert_eq!(clients.primary_key.as_deref(), Some("id"));
}

#[test]
fn test_build_is_idempotent_for_identical_input() {
    let config = SchemaConfig::from_json(fund_schema_json()).unwrap();
    let first = SchemaGraph::build_from_schema(&config).unwrap();
    let second = SchemaGraph::build_from_schema(&config).unwrap();

    assert_eq!(first.table_names(), second.table_names());
    let qualified = |g: &SchemaGraph| {
        g.all_columns()
            .iter()
            .map(|c| c.qualified_name())
            .collect::<Vec<_>>()
    };
    assert_eq!(qualified(&first), qualified(&second));

    let rels_first = first.table_relationships("funds");
    let rels_second = second.table_relationships("funds");
    assert_eq!(rels_first, rels_second);
}

#[test]
fn test_malformed_schema_fails_before_graph_is_produced() {
    // Relationship to an undeclared table
    let json = r#"{
        "tables": {
            "funds": {"columns": {"id": {"data_type": "bigint"}}}
        },
        "relationships": [
            {"from_table": "funds", "to_table": "positions", "relationship": "one-to-many"}
        ]
    }"#;
    let err = SchemaConfig::from_json(json).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownRelationshipTable(t) if t == "positions"));

    // Table with no columns
    let json = r#"{"tables": {"ghost": {"columns": {}}}}"#;
    let err = SchemaConfig::from_json(json).unwrap_err();
    assert!(matches!(err, ConfigError::EmptyTable(t) if t == "ghost"));

    // Relationship join column that does not exist
    let json = r#"{
        "tables": {
            "funds": {"columns": {"id": {}}},
            "holdings": {"columns": {"id": {}}}
        },
        "relationships": [
            {
                "from_table": "funds",
                "from_column": "id",
                "to_table": "holdings",
                "to_column": "fund_id",
                "relationship": "one-to-many"
            }
        ]
    }"#;
    let err = SchemaConfig::from_json(json).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownRelationshipColumn { .. }));
}

#[test]
fn test_table_relationships_orientation() {
    let config = SchemaConfig::from_json(fund_schema_json()).unwrap();
    let graph = SchemaGraph::build_from_schema(&config).unwrap();

    let funds = graph.table_relationships("funds");
    assert_eq!(funds.outgoing.len(), 1);
    assert_eq!(funds.outgoing[0].to_table, "holdings");
    assert_eq!(funds.incoming.len(), 1);
    assert_eq!(funds.incoming[0].from_table, "clients");

    let clients = graph.table_relationships("clients");
    assert_eq!(clients.outgoing.len(), 1);
    assert!(clients.incoming.is_empty());
}

#[test]
fn test_canonical_lookups_are_case_insensitive() {
    let config = SchemaConfig::from_json(fund_schema_json()).unwrap();
    let graph = SchemaGraph::build_from_schema(&config).unwrap();

    assert_eq!(graph.canonical_table("Funds"), Some("funds"));
    assert_eq!(graph.canonical_table("FUNDS"), Some("funds"));
    assert_eq!(graph.canonical_table("fonds"), None);
    assert_eq!(
        graph.canonical_column("holdings", "Market_Value"),
        Some("market_value")
    );
    assert_eq!(graph.canonical_column("holdings", "marketvalue"), None);
}
