//! Column reference resolution.
//!
//! Maps free-text column references to canonical `table.column` names
//! using the resolved entities for the request, the schema graph, and
//! bounded fuzzy matching. Resolution never fails hard: a reference that
//! cannot be mapped is returned unchanged and the validator surfaces the
//! error downstream.
//!
//! Fuzzy matches are gated by the *active table set* - the tables the
//! request's entities already point at. A similar-looking column on an
//! unrelated table is rejected and logged, never silently substituted.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::entity::{EnrichedEntity, EntityType};
use crate::graph::SchemaGraph;

static MAGNITUDE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+(?:\.[0-9]+)?)([kKmMbBtT])$").expect("valid suffix regex"));

/// Tunable resolution policy.
///
/// The similarity threshold and the active-table restriction are policy,
/// not algorithmic necessities; they are exposed here so tests and
/// callers can tighten or relax them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverPolicy {
    /// Minimum Jaro-Winkler similarity for a fuzzy candidate
    pub fuzzy_threshold: f64,
    /// Maximum fuzzy candidates considered, best first
    pub max_fuzzy_candidates: usize,
    /// Accept fuzzy candidates only from tables in the active set
    pub restrict_to_active_tables: bool,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.7,
            max_fuzzy_candidates: 3,
            restrict_to_active_tables: true,
        }
    }
}

/// Resolves ambiguous column references against the schema graph.
pub struct ColumnReferenceResolver<'g> {
    graph: &'g SchemaGraph,
    policy: ResolverPolicy,
}

impl<'g> ColumnReferenceResolver<'g> {
    /// Resolver with the default policy.
    pub fn new(graph: &'g SchemaGraph) -> Self {
        Self {
            graph,
            policy: ResolverPolicy::default(),
        }
    }

    /// Resolver with an explicit policy.
    pub fn with_policy(graph: &'g SchemaGraph, policy: ResolverPolicy) -> Self {
        Self { graph, policy }
    }

    /// Tables already referenced by the request's resolved entities.
    pub fn active_tables(entities: &[EnrichedEntity]) -> BTreeSet<String> {
        entities
            .iter()
            .filter_map(|e| e.table.clone())
            .collect()
    }

    /// Map a raw reference to a canonical `table.column`.
    ///
    /// Tries, in order, first match wins:
    /// 1. already qualified - substitute the table when it is an entity's
    ///    display text, else pass through;
    /// 2. exact (case-insensitive) entity text match;
    /// 3. exact (case-insensitive) bare column name in the graph;
    /// 4. fuzzy column-name match above the policy threshold, capped;
    /// 5. fuzzy candidates outside the active table set are rejected;
    /// 6. otherwise the input comes back unchanged - the caller must
    ///    treat that as unresolved.
    pub fn resolve(&self, reference: &str, entities: &[EnrichedEntity]) -> String {
        let reference = reference.trim();

        // Step 1: already table.column
        if let Some((table_part, column_part)) = reference.split_once('.') {
            for entity in entities {
                if entity.text.eq_ignore_ascii_case(table_part) {
                    if let Some(real_table) = &entity.table {
                        return format!("{}.{}", real_table, column_part);
                    }
                }
            }
            return reference.to_string();
        }

        // Step 2: whole reference matches an entity's display text
        for entity in entities {
            if !entity.text.eq_ignore_ascii_case(reference) {
                continue;
            }
            match entity.entity_type {
                EntityType::Column => {
                    if let Some(qualified) = entity.qualified_column() {
                        return qualified;
                    }
                }
                EntityType::Table => {
                    if let Some(table) = &entity.table {
                        return table.clone();
                    }
                }
                EntityType::Value => {}
            }
        }

        let active = Self::active_tables(entities);

        // Step 3: exact bare column name in the graph
        let exact: Vec<&crate::graph::ColumnNode> = self
            .graph
            .all_columns()
            .into_iter()
            .filter(|c| c.name.eq_ignore_ascii_case(reference))
            .collect();
        if let Some(column) = exact
            .iter()
            .find(|c| active.contains(&c.table))
            .or_else(|| exact.first())
        {
            return column.qualified_name();
        }

        // Steps 4-5: bounded fuzzy match, gated by the active table set
        if let Some(resolved) = self.resolve_fuzzy(reference, &active) {
            return resolved;
        }

        debug!(reference, "column reference left unresolved");
        reference.to_string()
    }

    /// Fuzzy candidate search over all column names.
    fn resolve_fuzzy(&self, reference: &str, active: &BTreeSet<String>) -> Option<String> {
        let needle = reference.to_lowercase();

        let mut candidates: Vec<(f64, String, String)> = self
            .graph
            .all_columns()
            .into_iter()
            .filter_map(|column| {
                let score = strsim::jaro_winkler(&needle, &column.name.to_lowercase());
                if score > self.policy.fuzzy_threshold {
                    Some((score, column.table.clone(), column.name.clone()))
                } else {
                    None
                }
            })
            .collect();

        // Best first; all_columns() is sorted, so ties stay deterministic.
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(self.policy.max_fuzzy_candidates);

        for (score, table, column) in &candidates {
            if !self.policy.restrict_to_active_tables || active.contains(table) {
                debug!(
                    reference,
                    resolved = format!("{}.{}", table, column),
                    score,
                    "fuzzy-resolved column reference"
                );
                return Some(format!("{}.{}", table, column));
            }
            warn!(
                reference,
                candidate = format!("{}.{}", table, column),
                score,
                "rejected fuzzy match outside the active table set"
            );
        }

        None
    }
}

/// Expand shorthand magnitude suffixes in a filter value.
///
/// A numeric literal immediately followed by K/M/B/T (case-insensitive,
/// optional decimal point) expands to its full value; every other input -
/// quoted strings, plain numbers, booleans - passes through unchanged.
pub fn normalize_filter_value(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(captures) = MAGNITUDE_SUFFIX.captures(trimmed) else {
        return raw.to_string();
    };

    let Ok(number) = captures[1].parse::<f64>() else {
        return raw.to_string();
    };
    let multiplier = match &captures[2] {
        "k" | "K" => 1e3,
        "m" | "M" => 1e6,
        "b" | "B" => 1e9,
        _ => 1e12,
    };

    let expanded = number * multiplier;
    if !expanded.is_finite() {
        return raw.to_string();
    }
    if expanded.fract() == 0.0 && expanded.abs() < i64::MAX as f64 {
        format!("{}", expanded as i64)
    } else {
        format!("{}", expanded)
    }
}
