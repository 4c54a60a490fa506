use trellis::config::SchemaConfig;
use trellis::entity::{EnrichedEntity, EntityType};
use trellis::graph::SchemaGraph;
use trellis::validator::SchemaValidator;

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
fn test_valid_statement_passes() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let result = validator.validate(
        "SELECT funds.name, holdings.market_value \
         FROM funds JOIN holdings ON funds.id = holdings.fund_id \
         WHERE holdings.sector = 'equity'",
        None,
        &[],
    );
    assert!(result.is_valid, "errors: {:?}", result.errors);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
    assert!(result.corrected_sql.is_none());
}

#[test]
fn test_missing_column_is_an_error_naming_it() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let result = validator.validate("SELECT funds.missing_col FROM funds", None, &[]);
    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("missing_col"));
    assert!(result.errors[0].contains("funds"));
}

#[test]
fn test_missing_column_gets_a_suggestion() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let result = validator.validate("SELECT holdings.market_val FROM holdings", None, &[]);
    assert!(!result.is_valid);
    assert!(result.errors[0].contains("did you mean 'holdings.market_value'"));
}

#[test]
fn test_unknown_table_is_an_error() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let result = validator.validate("SELECT positions.id FROM positions", None, &[]);
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.contains("Unknown table 'positions'")));
}

#[test]
fn test_non_numeric_aggregation_is_a_warning_not_an_error() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let result = validator.validate("SELECT SUM(holdings.sector) FROM holdings", None, &[]);
    assert!(result.is_valid);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("SUM(holdings.sector)"));

    // Numeric aggregation stays silent
    let result = validator.validate("SELECT SUM(holdings.market_value) FROM holdings", None, &[]);
    assert!(result.is_valid);
    assert!(result.warnings.is_empty());

    // MIN/MAX are order-based and fine on text
    let result = validator.validate("SELECT MAX(holdings.sector) FROM holdings", None, &[]);
    assert!(result.is_valid);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_arithmetic_on_text_column_is_a_warning() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let result = validator.validate(
        "SELECT holdings.sector + 1 FROM holdings",
        None,
        &[],
    );
    assert!(result.is_valid);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("arithmetic"));
}

#[test]
fn test_case_only_mismatch_is_auto_corrected() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let result = validator.validate(
        "SELECT Funds.Name FROM Funds JOIN holdings ON Funds.id = holdings.fund_id",
        None,
        &[],
    );
    assert!(result.is_valid, "errors: {:?}", result.errors);
    assert_eq!(result.corrections_applied.len(), 2);
    let corrected = result.corrected_sql.unwrap();
    assert!(corrected.contains("funds.name"));
    assert!(corrected.contains("FROM funds"));
    assert!(!corrected.contains("Funds"));
}

#[test]
fn test_alias_qualified_columns_resolve_through_the_alias() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let result = validator.validate(
        "SELECT h.market_value FROM holdings AS h WHERE h.sector = 'equity'",
        None,
        &[],
    );
    assert!(result.is_valid, "errors: {:?}", result.errors);

    let result = validator.validate("SELECT h.absent FROM holdings AS h", None, &[]);
    assert!(!result.is_valid);
    assert!(result.errors[0].contains("absent"));
}

#[test]
fn test_cte_names_are_exempt_from_table_checks() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let sql = "WITH aggregated AS (\
                 SELECT funds.name AS name, SUM(holdings.market_value) AS total \
                 FROM funds JOIN holdings ON funds.id = holdings.fund_id \
                 GROUP BY funds.name) \
               SELECT name, total FROM aggregated ORDER BY total DESC LIMIT 10";
    let result = validator.validate(sql, None, &[]);
    assert!(result.is_valid, "errors: {:?}", result.errors);
}

#[test]
fn test_parse_failure_is_a_structured_error() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let result = validator.validate("SELEC whatever FORM funds", None, &[]);
    assert!(!result.is_valid);
    assert!(result.errors[0].contains("parse"));
}

#[test]
fn test_entities_scope_suggestions() {
    let graph = fund_graph();
    let validator = SchemaValidator::new(&graph);
    let entities = vec![EnrichedEntity {
        text: "aum".into(),
        entity_type: EntityType::Column,
        table: Some("funds".into()),
        column: Some("total_aum".into()),
        value: None,
        confidence: 0.9,
        priority: 0,
        optimal_source: true,
        provenance: None,
    }];
    // total_aum lives on funds, not holdings; the entity's table widens
    // the suggestion scope
    let result = validator.validate("SELECT holdings.total_aun FROM holdings", None, &entities);
    assert!(!result.is_valid);
    assert!(result.errors[0].contains("did you mean 'funds.total_aum'"));
}
