use trellis::cache::{MemoryCache, NoopCache};
use trellis::config::SchemaConfig;
use trellis::entity::{AggregateFn, Aggregation, IntentType, Ordering, QueryIntent};
use trellis::graph::SchemaGraph;
use trellis::planner::{
    columns_from_entities, sql_with_cache, PlanBuilder, PlanError, SqlColumn,
};

fn fund_graph() -> SchemaGraph {
    let json = r#"{
        "tables": {
            "funds": {
                "primary_key": "id",
                "columns": {
                    "id": {"data_type": "bigint"},
                    "name": {"data_type": "varchar(128)"},
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
            }
        ]
    }"#;
    let config = SchemaConfig::from_json(json).unwrap();
    SchemaGraph::build_from_schema(&config).unwrap()
}

#[test]
fn test_plain_list_query_never_gets_a_cte() {
    let graph = fund_graph();
    let plan = PlanBuilder::new(&graph)
        .primary_table("funds")
        .columns(vec![
            SqlColumn::plain("funds", "name"),
            SqlColumn::plain("funds", "total_aum"),
        ])
        .intent(IntentType::List)
        .build()
        .unwrap();

    assert!(!plan.uses_cte);
    let sql = plan.to_sql();
    assert!(!sql.contains("WITH"));
    assert!(sql.contains("funds.name"));
    assert!(sql.contains("FROM funds"));
    assert!(!sql.contains("GROUP BY"));
}

#[test]
fn test_top_n_with_aggregation_wraps_in_cte() {
    let graph = fund_graph();
    let path = graph.find_shortest_path("funds", "holdings").unwrap();
    let plan = PlanBuilder::new(&graph)
        .primary_table("funds")
        .columns(vec![
            SqlColumn::plain("funds", "name"),
            SqlColumn::aggregated("holdings", "market_value", AggregateFn::Sum),
        ])
        .join_path(path)
        .order_by(vec![Ordering {
            column: "market_value".into(),
            descending: true,
        }])
        .limit(10)
        .intent(IntentType::TopN)
        .build()
        .unwrap();

    assert!(plan.uses_cte);
    let sql = plan.to_sql();
    assert_eq!(sql.matches("WITH").count(), 1);
    assert!(sql.contains("aggregated AS ("));
    assert!(sql.contains("SUM(holdings.market_value) AS sum_market_value"));
    assert!(sql.contains("JOIN holdings ON funds.id = holdings.fund_id"));
    assert!(sql.contains("GROUP BY funds.name"));
    assert!(sql.contains("FROM aggregated"));
    assert!(sql.contains("ORDER BY sum_market_value DESC"));
    assert!(sql.contains("LIMIT 10"));

    // The WITH clause precedes the outer SELECT
    assert!(sql.find("WITH").unwrap() < sql.rfind("SELECT").unwrap());
}

#[test]
fn test_aggregate_dependent_filter_triggers_cte() {
    let graph = fund_graph();
    let path = graph.find_shortest_path("funds", "holdings").unwrap();
    let plan = PlanBuilder::new(&graph)
        .primary_table("funds")
        .columns(vec![
            SqlColumn::plain("funds", "name"),
            SqlColumn::aggregated("holdings", "market_value", AggregateFn::Sum),
        ])
        .join_path(path)
        .predicates(vec![
            "holdings.sector = 'equity'".into(),
            "sum_market_value > 100000000".into(),
        ])
        .intent(IntentType::Aggregate)
        .build()
        .unwrap();

    assert!(plan.uses_cte);
    let sql = plan.to_sql();

    // Plain filter stays inside the CTE, aggregate filter moves outside it
    let cte_end = sql.find("FROM aggregated").unwrap();
    let plain = sql.find("holdings.sector = 'equity'").unwrap();
    let aggregate = sql.find("sum_market_value > 100000000").unwrap();
    assert!(plain < cte_end);
    assert!(aggregate > cte_end);
}

#[test]
fn test_aggregation_without_ranking_or_aggregate_filter_stays_flat() {
    let graph = fund_graph();
    let path = graph.find_shortest_path("funds", "holdings").unwrap();
    let plan = PlanBuilder::new(&graph)
        .primary_table("funds")
        .columns(vec![
            SqlColumn::plain("funds", "name"),
            SqlColumn::aggregated("holdings", "market_value", AggregateFn::Sum),
        ])
        .join_path(path)
        .predicates(vec!["holdings.sector = 'equity'".into()])
        .intent(IntentType::Aggregate)
        .build()
        .unwrap();

    assert!(!plan.uses_cte);
    let sql = plan.to_sql();
    assert!(!sql.contains("WITH"));
    assert!(sql.contains("GROUP BY funds.name"));
    assert!(sql.contains("WHERE holdings.sector = 'equity'"));
}

#[test]
fn test_predicates_are_and_joined() {
    let graph = fund_graph();
    let plan = PlanBuilder::new(&graph)
        .primary_table("holdings")
        .columns(vec![SqlColumn::plain("holdings", "market_value")])
        .predicates(vec![
            "holdings.sector = 'equity'".into(),
            "holdings.market_value > 1500".into(),
        ])
        .build()
        .unwrap();

    let sql = plan.to_sql();
    assert!(sql
        .contains("WHERE holdings.sector = 'equity' AND holdings.market_value > 1500"));
}

#[test]
fn test_missing_primary_table_is_an_error() {
    let graph = fund_graph();
    let err = PlanBuilder::new(&graph)
        .columns(vec![SqlColumn::plain("funds", "name")])
        .build()
        .unwrap_err();
    assert_eq!(err, PlanError::MissingPrimaryTable);
}

#[test]
fn test_unknown_primary_table_is_an_error() {
    let graph = fund_graph();
    let err = PlanBuilder::new(&graph)
        .primary_table("positions")
        .columns(vec![SqlColumn::plain("positions", "id")])
        .build()
        .unwrap_err();
    assert_eq!(err, PlanError::UnknownTable("positions".into()));
}

#[test]
fn test_cte_name_collision_is_an_error() {
    let graph = fund_graph();
    let err = PlanBuilder::new(&graph)
        .primary_table("funds")
        .columns(vec![
            SqlColumn::plain("funds", "name"),
            SqlColumn::aggregated("holdings", "market_value", AggregateFn::Sum),
        ])
        .limit(5)
        .intent(IntentType::TopN)
        .cte_name("holdings")
        .build()
        .unwrap_err();
    assert_eq!(err, PlanError::CteNameCollision("holdings".into()));
}

#[test]
fn test_sql_with_cache_round_trip() {
    let graph = fund_graph();
    let cache = MemoryCache::new();

    let build = || {
        PlanBuilder::new(&graph)
            .primary_table("funds")
            .columns(vec![SqlColumn::plain("funds", "name")])
            .limit(5)
    };

    let first = sql_with_cache(&cache, build()).unwrap();
    assert_eq!(cache.len(), 1);
    let second = sql_with_cache(&cache, build()).unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);

    // A noop cache never stores, but planning still succeeds
    let uncached = sql_with_cache(&NoopCache, build()).unwrap();
    assert_eq!(uncached, first);
}

#[test]
fn test_columns_from_entities_prefers_optimal_source() {
    use trellis::entity::{EnrichedEntity, EntityType};

    let entities = vec![
        EnrichedEntity {
            text: "value".into(),
            entity_type: EntityType::Column,
            table: Some("legacy_positions".into()),
            column: Some("value".into()),
            value: None,
            confidence: 0.8,
            priority: 1,
            optimal_source: false,
            provenance: Some("legacy feed".into()),
        },
        EnrichedEntity {
            text: "value".into(),
            entity_type: EntityType::Column,
            table: Some("holdings".into()),
            column: Some("market_value".into()),
            value: None,
            confidence: 0.7,
            priority: 0,
            optimal_source: true,
            provenance: Some("primary feed".into()),
        },
    ];
    let intent = QueryIntent {
        intent_type: IntentType::Aggregate,
        aggregations: vec![Aggregation {
            function: AggregateFn::Sum,
            column: "market_value".into(),
            alias: None,
        }],
        filters: vec![],
        order_by: vec![],
        limit: None,
    };

    let columns = columns_from_entities(&entities, &intent);
    // Optimal source is ranked first, and the aggregation attaches to it
    assert_eq!(columns[0].table, "holdings");
    assert_eq!(columns[0].column, "market_value");
    assert_eq!(columns[0].aggregate, Some(AggregateFn::Sum));
}
