//! Schema validation of generated SQL.
//!
//! Parses a SQL statement with `sqlparser`, collects the tables and
//! qualified columns it touches, and checks them against the schema
//! graph. Case-only mismatches are auto-corrected when unambiguous;
//! aggregation or arithmetic over non-numeric columns is reported as a
//! warning only, since several dialects coerce implicitly.
//!
//! Validation never mutates the input plan; corrections come back as a
//! separate SQL string for the caller to adopt or ignore.

use std::collections::{HashMap, HashSet};

use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Join, JoinConstraint,
    JoinOperator, Query as AstQuery, Select, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::entity::EnrichedEntity;
use crate::graph::SchemaGraph;
use crate::planner::SqlPlan;

/// Aggregates that expect numeric input; MIN/MAX/COUNT are fine on text.
const NUMERIC_AGGREGATES: [&str; 2] = ["SUM", "AVG"];

/// Similarity floor for did-you-mean hints on missing columns.
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// Outcome of validating one SQL statement against the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Re-rendered SQL with case-only corrections applied, when any
    pub corrected_sql: Option<String>,
    /// Human-readable record of each applied correction
    pub corrections_applied: Vec<String>,
}

/// Validates generated SQL against the schema graph.
pub struct SchemaValidator<'g> {
    graph: &'g SchemaGraph,
}

impl<'g> SchemaValidator<'g> {
    pub fn new(graph: &'g SchemaGraph) -> Self {
        Self { graph }
    }

    /// Validate a SQL string.
    ///
    /// `plan` contributes its CTE names (virtual tables exempt from graph
    /// checks); `entities` scope the did-you-mean hints for missing
    /// columns.
    pub fn validate(
        &self,
        sql: &str,
        plan: Option<&SqlPlan>,
        entities: &[EnrichedEntity],
    ) -> ValidationResult {
        let mut result = ValidationResult {
            is_valid: true,
            ..Default::default()
        };

        let statements = match Parser::parse_sql(&GenericDialect {}, sql) {
            Ok(statements) => statements,
            Err(e) => {
                result.is_valid = false;
                result.errors.push(format!("SQL parse error: {}", e));
                return result;
            }
        };

        let mut surface = SqlSurface::default();
        if let Some(plan) = plan {
            for cte in &plan.query.with {
                surface.ctes.insert(cte.name.to_lowercase());
            }
        }
        for statement in &statements {
            if let Statement::Query(query) = statement {
                walk_query(query, &mut surface);
            }
        }

        // Table checks: spelled name → canonical graph name.
        let mut table_fixes: HashMap<String, String> = HashMap::new();
        let mut seen_relations: HashSet<&str> = HashSet::new();
        for relation in &surface.relations {
            if !seen_relations.insert(relation) {
                continue;
            }
            let lower = relation.to_lowercase();
            if surface.ctes.contains(&lower) || surface.aliases.contains_key(&lower) {
                continue;
            }
            if self.graph.has_table(relation) {
                continue;
            }
            match self.graph.canonical_table(relation) {
                Some(canonical) => {
                    result.corrections_applied.push(format!(
                        "table '{}' corrected to '{}'",
                        relation, canonical
                    ));
                    table_fixes.insert(relation.clone(), canonical.to_string());
                }
                None => {
                    result
                        .errors
                        .push(format!("Unknown table '{}'", relation));
                }
            }
        }

        // Column checks, resolving aliases and case-corrected tables first.
        let mut column_fixes: HashMap<String, String> = HashMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for (qualifier, column) in &surface.columns {
            if !seen.insert((qualifier.clone(), column.clone())) {
                continue;
            }
            let Some(table) = self.effective_table(qualifier, &surface, &table_fixes) else {
                continue;
            };
            if self.graph.has_column(&table, column) {
                continue;
            }
            match self.graph.canonical_column(&table, column) {
                Some(canonical) => {
                    result.corrections_applied.push(format!(
                        "column '{}.{}' corrected to '{}.{}'",
                        qualifier, column, table, canonical
                    ));
                    column_fixes.insert(column.clone(), canonical.to_string());
                }
                None => {
                    let mut message =
                        format!("Column '{}' does not exist on table '{}'", column, table);
                    if let Some(suggestion) = self.suggest_column(&table, column, entities) {
                        message.push_str(&format!(" (did you mean '{}'?)", suggestion));
                    }
                    result.errors.push(message);
                }
            }
        }

        // Type checks: numeric aggregation and arithmetic.
        for (function, qualifier, column) in &surface.aggregates {
            if let Some(warning) =
                self.non_numeric_warning(qualifier, column, &surface, &table_fixes, || {
                    format!("{}({}.{})", function, qualifier, column)
                })
            {
                result.warnings.push(warning);
            }
        }
        for (qualifier, column) in &surface.arithmetic {
            if let Some(warning) =
                self.non_numeric_warning(qualifier, column, &surface, &table_fixes, || {
                    format!("arithmetic on {}.{}", qualifier, column)
                })
            {
                result.warnings.push(warning);
            }
        }

        if !result.corrections_applied.is_empty() {
            result.corrected_sql = Some(apply_fixes(sql, &table_fixes, &column_fixes));
            debug!(
                corrections = result.corrections_applied.len(),
                "applied case corrections to generated SQL"
            );
        }

        result.is_valid = result.errors.is_empty();
        result
    }

    /// Resolve a column qualifier to a graph table name, through aliases
    /// and table case-corrections. `None` when the qualifier is a CTE or
    /// an unknown table (already reported).
    fn effective_table(
        &self,
        qualifier: &str,
        surface: &SqlSurface,
        table_fixes: &HashMap<String, String>,
    ) -> Option<String> {
        let lower = qualifier.to_lowercase();
        if surface.ctes.contains(&lower) {
            return None;
        }
        let spelled = surface
            .aliases
            .get(&lower)
            .map(|t| t.as_str())
            .unwrap_or(qualifier);
        if let Some(fixed) = table_fixes.get(spelled) {
            return Some(fixed.clone());
        }
        if self.graph.has_table(spelled) {
            Some(spelled.to_string())
        } else {
            None
        }
    }

    /// Warning for SUM/AVG or arithmetic over a non-numeric column.
    fn non_numeric_warning(
        &self,
        qualifier: &str,
        column: &str,
        surface: &SqlSurface,
        table_fixes: &HashMap<String, String>,
        describe: impl Fn() -> String,
    ) -> Option<String> {
        let table = self.effective_table(qualifier, surface, table_fixes)?;
        let node = self.graph.column(&table, column)?;
        if node.data_type.is_numeric() {
            return None;
        }
        Some(format!(
            "{} applies a numeric operation to non-numeric column type {:?}; \
             the database may coerce or reject it",
            describe(),
            node.data_type
        ))
    }

    /// Closest column name on the owning table (then on the entities'
    /// tables) above the similarity floor.
    fn suggest_column(
        &self,
        table: &str,
        column: &str,
        entities: &[EnrichedEntity],
    ) -> Option<String> {
        let needle = column.to_lowercase();
        let mut tables: Vec<&str> = vec![table];
        for entity in entities {
            if let Some(t) = &entity.table {
                if !tables.contains(&t.as_str()) {
                    tables.push(t);
                }
            }
        }

        let mut best: Option<(f64, String)> = None;
        for t in tables {
            for candidate in self.graph.columns_of(t) {
                let score = strsim::jaro_winkler(&needle, &candidate.name.to_lowercase());
                if score > SUGGESTION_THRESHOLD
                    && best.as_ref().map(|(s, _)| score > *s).unwrap_or(true)
                {
                    best = Some((score, candidate.qualified_name()));
                }
            }
        }
        best.map(|(_, name)| name)
    }
}

/// Everything a statement touches, collected in one walk.
#[derive(Debug, Default)]
struct SqlSurface {
    /// Base relations from FROM/JOIN, as spelled
    relations: Vec<String>,
    /// Qualified column references (qualifier, column), as spelled
    columns: Vec<(String, String)>,
    /// Columns inside SUM/AVG calls (function, qualifier, column)
    aggregates: Vec<(String, String, String)>,
    /// Columns under +, -, *, / operators
    arithmetic: Vec<(String, String)>,
    /// CTE names, lowercased
    ctes: HashSet<String>,
    /// Table aliases, lowercased alias → spelled table
    aliases: HashMap<String, String>,
}

/// Expression context: enclosing aggregate call and arithmetic position.
#[derive(Debug, Clone, Copy, Default)]
struct ExprCtx<'a> {
    aggregate: Option<&'a str>,
    arithmetic: bool,
}

fn walk_query(query: &AstQuery, surface: &mut SqlSurface) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            surface.ctes.insert(cte.alias.name.value.to_lowercase());
            walk_query(&cte.query, surface);
        }
    }
    walk_set_expr(&query.body, surface);
    if let Some(order_by) = &query.order_by {
        for expr in &order_by.exprs {
            walk_expr(&expr.expr, surface, ExprCtx::default());
        }
    }
}

fn walk_set_expr(set_expr: &SetExpr, surface: &mut SqlSurface) {
    match set_expr {
        SetExpr::Select(select) => walk_select(select, surface),
        SetExpr::Query(query) => walk_query(query, surface),
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr(left, surface);
            walk_set_expr(right, surface);
        }
        _ => {}
    }
}

fn walk_select(select: &Select, surface: &mut SqlSurface) {
    for table_with_joins in &select.from {
        walk_table_with_joins(table_with_joins, surface);
    }
    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                walk_expr(expr, surface, ExprCtx::default());
            }
            _ => {}
        }
    }
    if let Some(selection) = &select.selection {
        walk_expr(selection, surface, ExprCtx::default());
    }
    if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
        for expr in exprs {
            walk_expr(expr, surface, ExprCtx::default());
        }
    }
    if let Some(having) = &select.having {
        walk_expr(having, surface, ExprCtx::default());
    }
}

fn walk_table_with_joins(table_with_joins: &TableWithJoins, surface: &mut SqlSurface) {
    walk_table_factor(&table_with_joins.relation, surface);
    for join in &table_with_joins.joins {
        walk_join(join, surface);
    }
}

fn walk_join(join: &Join, surface: &mut SqlSurface) {
    walk_table_factor(&join.relation, surface);
    let constraint = match &join.join_operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => Some(c),
        _ => None,
    };
    if let Some(JoinConstraint::On(expr)) = constraint {
        walk_expr(expr, surface, ExprCtx::default());
    }
}

fn walk_table_factor(factor: &TableFactor, surface: &mut SqlSurface) {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            if let Some(ident) = name.0.last() {
                surface.relations.push(ident.value.clone());
                if let Some(alias) = alias {
                    surface
                        .aliases
                        .insert(alias.name.value.to_lowercase(), ident.value.clone());
                }
            }
        }
        TableFactor::Derived {
            subquery, alias, ..
        } => {
            walk_query(subquery, surface);
            if let Some(alias) = alias {
                // Derived-table output is opaque to the graph.
                surface.ctes.insert(alias.name.value.to_lowercase());
            }
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            walk_table_with_joins(table_with_joins, surface);
        }
        _ => {}
    }
}

fn walk_expr(expr: &Expr, surface: &mut SqlSurface, ctx: ExprCtx<'_>) {
    match expr {
        Expr::CompoundIdentifier(idents) if idents.len() == 2 => {
            let qualifier = idents[0].value.clone();
            let column = idents[1].value.clone();
            if let Some(function) = ctx.aggregate {
                surface
                    .aggregates
                    .push((function.to_string(), qualifier.clone(), column.clone()));
            }
            if ctx.arithmetic {
                surface.arithmetic.push((qualifier.clone(), column.clone()));
            }
            surface.columns.push((qualifier, column));
        }
        Expr::BinaryOp { left, op, right } => {
            use sqlparser::ast::BinaryOperator::*;
            let arithmetic =
                ctx.arithmetic || matches!(op, Plus | Minus | Multiply | Divide | Modulo);
            let inner = ExprCtx {
                aggregate: ctx.aggregate,
                arithmetic,
            };
            walk_expr(left, surface, inner);
            walk_expr(right, surface, inner);
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => {
            walk_expr(expr, surface, ctx);
        }
        Expr::Function(function) => {
            let name = function
                .name
                .0
                .last()
                .map(|i| i.value.to_uppercase())
                .unwrap_or_default();
            let aggregate = if NUMERIC_AGGREGATES.contains(&name.as_str()) {
                Some(name.as_str())
            } else {
                None
            };
            if let FunctionArguments::List(list) = &function.args {
                for arg in &list.args {
                    if let FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                    | FunctionArg::Named {
                        arg: FunctionArgExpr::Expr(expr),
                        ..
                    } = arg
                    {
                        walk_expr(
                            expr,
                            surface,
                            ExprCtx {
                                aggregate,
                                arithmetic: ctx.arithmetic,
                            },
                        );
                    }
                }
            }
        }
        Expr::InList { expr, list, .. } => {
            walk_expr(expr, surface, ctx);
            for item in list {
                walk_expr(item, surface, ctx);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            walk_expr(expr, surface, ctx);
            walk_expr(low, surface, ctx);
            walk_expr(high, surface, ctx);
        }
        Expr::IsNull(expr) | Expr::IsNotNull(expr) => {
            walk_expr(expr, surface, ctx);
        }
        Expr::Cast { expr, .. } => {
            walk_expr(expr, surface, ctx);
        }
        Expr::Subquery(query) | Expr::InSubquery {
            subquery: query, ..
        } => {
            walk_query(query, surface);
        }
        _ => {}
    }
}

/// Apply case-only name fixes to the SQL text with whole-word
/// replacement.
fn apply_fixes(
    sql: &str,
    table_fixes: &HashMap<String, String>,
    column_fixes: &HashMap<String, String>,
) -> String {
    let mut corrected = sql.to_string();
    for (wrong, canonical) in table_fixes.iter().chain(column_fixes.iter()) {
        if let Ok(pattern) = regex::Regex::new(&format!(r"\b{}\b", regex::escape(wrong))) {
            corrected = pattern.replace_all(&corrected, canonical.as_str()).into_owned();
        }
    }
    corrected
}
