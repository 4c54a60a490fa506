//! Per-request inputs produced by the upstream entity-resolution and
//! intent-analysis collaborators.
//!
//! These are consumed, not owned: the planning core reads them to
//! disambiguate references and shape the plan, and discards them after
//! SQL emission. Required fields are validated at the serde boundary;
//! everything situational is an explicit `Option`.

use serde::{Deserialize, Serialize};

use crate::sql::SortDir;

/// What kind of schema object an entity resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Table,
    Column,
    Value,
}

/// A resolved entity with confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEntity {
    /// The surface text this entity was resolved from
    pub text: String,
    pub entity_type: EntityType,
    /// Table the entity maps to (owning table for columns)
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    /// Literal value, for value entities
    #[serde(default)]
    pub value: Option<String>,
    /// Resolution confidence in [0, 1]
    pub confidence: f64,
    /// Relative priority among competing candidates (higher wins)
    #[serde(default)]
    pub priority: i32,
    /// Marks the preferred source when several entities cover the same
    /// concept
    #[serde(default)]
    pub optimal_source: bool,
    /// Free-form notes on where the resolution came from
    #[serde(default)]
    pub provenance: Option<String>,
}

impl EnrichedEntity {
    /// Qualified `table.column` name, when both parts are present.
    pub fn qualified_column(&self) -> Option<String> {
        match (&self.table, &self.column) {
            (Some(t), Some(c)) => Some(format!("{}.{}", t, c)),
            _ => None,
        }
    }
}

/// High-level shape of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    /// Plain listing/filtering
    List,
    /// Aggregate rollup
    Aggregate,
    /// Ranking / top-N over an aggregate or measure
    TopN,
}

/// Aggregation function requested by the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    /// SQL function name.
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }

    /// Default alias for the aggregated column (`sum_market_value`).
    pub fn default_alias(&self, column: &str) -> String {
        format!("{}_{}", self.sql_name().to_lowercase(), column)
    }
}

/// An aggregation request: function over a column reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFn,
    /// Column reference; resolved to `table.column` before planning
    pub column: String,
    #[serde(default)]
    pub alias: Option<String>,
}

/// Requested ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

impl Ordering {
    pub fn direction(&self) -> SortDir {
        if self.descending {
            SortDir::Desc
        } else {
            SortDir::Asc
        }
    }
}

/// Parsed intent descriptor for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub intent_type: IntentType,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
    /// Free-text filter predicates, normalized by the resolver before
    /// planning
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<Ordering>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl QueryIntent {
    /// A bare listing intent with no aggregations or filters.
    pub fn list() -> Self {
        Self {
            intent_type: IntentType::List,
            aggregations: vec![],
            filters: vec![],
            order_by: vec![],
            limit: None,
        }
    }
}
