//! SQL plan assembly.
//!
//! [`PlanBuilder`] turns a primary table, selected columns, a join path,
//! normalized predicates, and intent metadata into a [`SqlPlan`] - a
//! serializable query object, CTE-wrapped when the request mixes
//! aggregation with ranking or aggregate-dependent filtering.
//!
//! Plan assembly is pure: errors are raised before any SQL is emitted,
//! and nothing here touches the graph after the read-only lookups.

use thiserror::Error;
use tracing::debug;

use crate::cache::{cache_key, PlanCache};
use crate::entity::{AggregateFn, EnrichedEntity, EntityType, IntentType, Ordering, QueryIntent};
use crate::graph::{Path, SchemaGraph};
use crate::sql::{
    col, raw, table_col, Cte, Expr, ExprExt, OrderByExpr, Query, SelectExpr, TableRef,
};

/// Aggregation call syntax that marks a predicate as aggregate-dependent.
const AGGREGATE_MARKERS: [&str; 5] = ["sum(", "avg(", "count(", "min(", "max("];

/// Default name for the generated aggregation CTE.
const DEFAULT_CTE_NAME: &str = "aggregated";

/// Errors raised during plan assembly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Plan has no primary table")]
    MissingPrimaryTable,

    #[error("Unknown table: '{0}' is not in the schema graph")]
    UnknownTable(String),

    #[error("CTE name '{0}' collides with an existing table or earlier CTE")]
    CteNameCollision(String),

    #[error("Invalid CTE structure in '{name}': {reason}")]
    InvalidCteStructure { name: String, reason: String },
}

/// Result type for plan assembly.
pub type PlanResult<T> = Result<T, PlanError>;

/// A column selected by the plan, optionally aggregated and aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlColumn {
    pub table: String,
    pub column: String,
    pub aggregate: Option<AggregateFn>,
    pub alias: Option<String>,
}

impl SqlColumn {
    /// Plain column selection.
    pub fn plain(table: &str, column: &str) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            aggregate: None,
            alias: None,
        }
    }

    /// Aggregated column selection with the default alias.
    pub fn aggregated(table: &str, column: &str, function: AggregateFn) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            aggregate: Some(function),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The output column name this selection produces.
    pub fn output_name(&self) -> String {
        match (&self.alias, &self.aggregate) {
            (Some(alias), _) => alias.clone(),
            (None, Some(function)) => function.default_alias(&self.column),
            (None, None) => self.column.clone(),
        }
    }

    /// SELECT list item: `table.column` or `AGG(table.column) AS alias`.
    fn to_select_expr(&self) -> SelectExpr {
        let base = table_col(&self.table, &self.column);
        match self.aggregate {
            Some(function) => crate::sql::func(function.sql_name(), vec![base])
                .alias(&self.output_name()),
            None => SelectExpr::new(base),
        }
    }
}

/// A finished plan: the query object plus CTE metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPlan {
    pub query: Query,
    /// True when the plan wrapped aggregation in a CTE
    pub uses_cte: bool,
}

impl SqlPlan {
    /// Serialize the plan to SQL text.
    pub fn to_sql(&self) -> String {
        self.query.to_sql()
    }
}

/// Fluent builder assembling a [`SqlPlan`] over a schema graph.
#[must_use = "builders have no effect until built"]
pub struct PlanBuilder<'g> {
    graph: &'g SchemaGraph,
    primary_table: Option<String>,
    columns: Vec<SqlColumn>,
    join_path: Option<Path>,
    predicates: Vec<String>,
    group_by: Vec<(String, String)>,
    order_by: Vec<Ordering>,
    limit: Option<u64>,
    intent: IntentType,
    cte_name: String,
}

impl<'g> PlanBuilder<'g> {
    pub fn new(graph: &'g SchemaGraph) -> Self {
        Self {
            graph,
            primary_table: None,
            columns: vec![],
            join_path: None,
            predicates: vec![],
            group_by: vec![],
            order_by: vec![],
            limit: None,
            intent: IntentType::List,
            cte_name: DEFAULT_CTE_NAME.into(),
        }
    }

    pub fn primary_table(mut self, table: &str) -> Self {
        self.primary_table = Some(table.into());
        self
    }

    pub fn columns(mut self, columns: Vec<SqlColumn>) -> Self {
        self.columns = columns;
        self
    }

    /// Join path from the graph; joins are emitted in path order.
    pub fn join_path(mut self, path: Path) -> Self {
        self.join_path = Some(path);
        self
    }

    /// Normalized filter predicates, AND-joined in the WHERE clause.
    pub fn predicates(mut self, predicates: Vec<String>) -> Self {
        self.predicates = predicates;
        self
    }

    /// Explicit GROUP BY columns; defaults to all non-aggregated
    /// selections when aggregates are present.
    pub fn group_by(mut self, columns: Vec<(String, String)>) -> Self {
        self.group_by = columns;
        self
    }

    pub fn order_by(mut self, order_by: Vec<Ordering>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn intent(mut self, intent: IntentType) -> Self {
        self.intent = intent;
        self
    }

    /// Override the generated CTE's name.
    pub fn cte_name(mut self, name: &str) -> Self {
        self.cte_name = name.into();
        self
    }

    /// Assemble the plan.
    pub fn build(self) -> PlanResult<SqlPlan> {
        let primary = self
            .primary_table
            .clone()
            .ok_or(PlanError::MissingPrimaryTable)?;
        if !self.graph.has_table(&primary) {
            return Err(PlanError::UnknownTable(primary));
        }
        if let Some(path) = &self.join_path {
            for table in &path.tables {
                if !self.graph.has_table(table) {
                    return Err(PlanError::UnknownTable(table.clone()));
                }
            }
        }

        let plan = if self.needs_cte() {
            self.build_with_cte(&primary)?
        } else {
            self.build_flat(&primary)
        };

        plan.query
            .check_cte_invariants()
            .map_err(|(name, reason)| PlanError::InvalidCteStructure { name, reason })?;

        Ok(plan)
    }

    /// Whether the plan needs a CTE wrapper.
    ///
    /// Either condition triggers one; plain list/filter queries lacking
    /// both never receive a CTE:
    /// - ranking intent combined with at least one aggregation
    ///   (aggregate first, then order and limit the aggregate);
    /// - a predicate that depends on an aggregated quantity.
    fn needs_cte(&self) -> bool {
        let has_aggregation = self.columns.iter().any(|c| c.aggregate.is_some());
        if self.intent == IntentType::TopN && has_aggregation {
            return true;
        }
        self.predicates.iter().any(|p| self.is_aggregate_predicate(p))
    }

    /// A predicate depends on an aggregate when it spells out an
    /// aggregation call or compares against an aggregate alias.
    fn is_aggregate_predicate(&self, predicate: &str) -> bool {
        let lower = predicate.to_lowercase();
        if AGGREGATE_MARKERS.iter().any(|m| lower.contains(m)) {
            return true;
        }
        self.columns
            .iter()
            .filter(|c| c.aggregate.is_some())
            .any(|c| lower.contains(&c.output_name().to_lowercase()))
    }

    /// Single-level query: no CTE.
    fn build_flat(&self, primary: &str) -> SqlPlan {
        let mut query = Query::new()
            .select(self.columns.iter().map(|c| c.to_select_expr()).collect::<Vec<_>>())
            .from(TableRef::new(primary));

        query = self.attach_joins(query);

        for predicate in &self.predicates {
            query = query.filter(raw(predicate));
        }

        query = query.group_by(self.grouping_exprs());

        let order_exprs = self
            .order_by
            .iter()
            .map(|o| self.order_expr(o, false))
            .collect::<Vec<_>>();
        query = query.order_by(order_exprs);

        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }

        SqlPlan {
            query,
            uses_cte: false,
        }
    }

    /// CTE-wrapped query: aggregate inside, rank and filter outside.
    fn build_with_cte(&self, primary: &str) -> PlanResult<SqlPlan> {
        if self.graph.has_table(&self.cte_name) {
            return Err(PlanError::CteNameCollision(self.cte_name.clone()));
        }

        let (aggregate_predicates, plain_predicates): (Vec<&String>, Vec<&String>) = self
            .predicates
            .iter()
            .partition(|p| self.is_aggregate_predicate(p));

        // Inner query: joins, plain filters, aggregation.
        let mut inner = Query::new()
            .select(self.columns.iter().map(|c| c.to_select_expr()).collect::<Vec<_>>())
            .from(TableRef::new(primary));
        inner = self.attach_joins(inner);
        for predicate in plain_predicates {
            inner = inner.filter(raw(predicate));
        }
        inner = inner.group_by(self.grouping_exprs());

        // Outer query: select the CTE's output columns by name, apply
        // aggregate-dependent filters, then order and limit.
        let mut outer = Query::new()
            .with_cte(Cte::new(&self.cte_name, inner))
            .select(
                self.columns
                    .iter()
                    .map(|c| SelectExpr::new(col(&c.output_name())))
                    .collect::<Vec<_>>(),
            )
            .from(TableRef::new(&self.cte_name));

        for predicate in aggregate_predicates {
            outer = outer.filter(raw(predicate));
        }

        let order_exprs = self
            .order_by
            .iter()
            .map(|o| self.order_expr(o, true))
            .collect::<Vec<_>>();
        outer = outer.order_by(order_exprs);

        if let Some(limit) = self.limit {
            outer = outer.limit(limit);
        }

        debug!(cte = %self.cte_name, "wrapped aggregation in CTE");

        Ok(SqlPlan {
            query: outer,
            uses_cte: true,
        })
    }

    /// GROUP BY expressions: explicit columns, else every non-aggregated
    /// selection when any aggregate is present.
    fn grouping_exprs(&self) -> Vec<Expr> {
        if !self.group_by.is_empty() {
            return self
                .group_by
                .iter()
                .map(|(table, column)| table_col(table, column))
                .collect();
        }
        if self.columns.iter().any(|c| c.aggregate.is_some()) {
            self.columns
                .iter()
                .filter(|c| c.aggregate.is_none())
                .map(|c| table_col(&c.table, &c.column))
                .collect()
        } else {
            vec![]
        }
    }

    /// Joins in path order.
    fn attach_joins(&self, mut query: Query) -> Query {
        let Some(path) = &self.join_path else {
            return query;
        };
        for edge in &path.edges {
            let (from_col, to_col) = match (&edge.from_column, &edge.to_column) {
                (Some(f), Some(t)) => (f.clone(), t.clone()),
                // Fallback join-key convention; see SchemaGraph::join_path_sql.
                _ => ("id".to_string(), format!("{}_id", edge.from_table)),
            };
            query = query.inner_join(
                TableRef::new(&edge.to_table),
                table_col(&edge.from_table, &from_col).eq(table_col(&edge.to_table, &to_col)),
            );
        }
        query
    }

    /// ORDER BY expression for one ordering request.
    ///
    /// Inside a CTE-wrapped plan the outer query sees the CTE's output
    /// names, so table qualifiers are dropped and aggregated columns are
    /// referenced by alias.
    fn order_expr(&self, ordering: &Ordering, over_cte: bool) -> OrderByExpr {
        let name = ordering.column.as_str();
        let expr = if over_cte {
            let bare = name.rsplit('.').next().unwrap_or(name);
            let resolved = self
                .columns
                .iter()
                .filter(|c| c.aggregate.is_some())
                .find(|c| c.column == bare || c.output_name() == bare)
                .map(|c| c.output_name())
                .unwrap_or_else(|| bare.to_string());
            col(&resolved)
        } else if let Some((table, column)) = name.split_once('.') {
            table_col(table, column)
        } else if let Some(aggregated) = self
            .columns
            .iter()
            .filter(|c| c.aggregate.is_some())
            .find(|c| c.column == name || c.output_name() == name)
        {
            col(&aggregated.output_name())
        } else {
            col(name)
        };

        match ordering.direction() {
            crate::sql::SortDir::Desc => OrderByExpr::desc(expr),
            crate::sql::SortDir::Asc => OrderByExpr::asc(expr),
        }
    }

    /// Deterministic description of this request for cache keying.
    fn cache_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("intent={:?}", self.intent),
            format!("table={}", self.primary_table.as_deref().unwrap_or("")),
            format!("limit={:?}", self.limit),
            format!("cte={}", self.cte_name),
        ];
        for column in &self.columns {
            args.push(format!(
                "col={}.{}:{:?}:{}",
                column.table,
                column.column,
                column.aggregate,
                column.output_name()
            ));
        }
        if let Some(path) = &self.join_path {
            args.push(format!("path={}", path.tables.join(">")));
        }
        for predicate in &self.predicates {
            args.push(format!("where={}", predicate));
        }
        for (table, column) in &self.group_by {
            args.push(format!("group={}.{}", table, column));
        }
        for ordering in &self.order_by {
            args.push(format!("order={}:{}", ordering.column, ordering.descending));
        }
        args
    }
}

/// Build the plan's SQL through an externally supplied cache handle.
///
/// The key is a deterministic hash of the request; the core holds no
/// cache state of its own.
pub fn sql_with_cache(cache: &dyn PlanCache, builder: PlanBuilder<'_>) -> PlanResult<String> {
    let key = cache_key("plan", &builder.cache_args());
    if let Some(sql) = cache.get(&key) {
        debug!(%key, "plan cache hit");
        return Ok(sql);
    }
    let sql = builder.build()?.to_sql();
    cache.put(&key, sql.clone());
    Ok(sql)
}

/// Derive plan columns from resolved entities and the intent.
///
/// Column entities become plain selections (optimal-source entities win
/// conflicts on the same qualified column); intent aggregations upgrade
/// the matching selection or add one of their own.
pub fn columns_from_entities(
    entities: &[EnrichedEntity],
    intent: &QueryIntent,
) -> Vec<SqlColumn> {
    let mut ranked: Vec<&EnrichedEntity> = entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Column)
        .filter(|e| e.table.is_some() && e.column.is_some())
        .collect();
    ranked.sort_by(|a, b| {
        b.optimal_source
            .cmp(&a.optimal_source)
            .then(b.priority.cmp(&a.priority))
            .then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let mut columns: Vec<SqlColumn> = Vec::new();
    for entity in ranked {
        let (table, column) = (
            entity.table.as_deref().unwrap_or_default(),
            entity.column.as_deref().unwrap_or_default(),
        );
        if !columns.iter().any(|c| c.table == table && c.column == column) {
            columns.push(SqlColumn::plain(table, column));
        }
    }

    for aggregation in &intent.aggregations {
        let bare = aggregation
            .column
            .rsplit('.')
            .next()
            .unwrap_or(&aggregation.column);
        if let Some(existing) = columns.iter_mut().find(|c| c.column == bare) {
            existing.aggregate = Some(aggregation.function);
            existing.alias = aggregation.alias.clone();
        } else if let Some((table, column)) = aggregation.column.split_once('.') {
            let mut sql_column = SqlColumn::aggregated(table, column, aggregation.function);
            sql_column.alias = aggregation.alias.clone();
            columns.push(sql_column);
        }
    }

    columns
}
