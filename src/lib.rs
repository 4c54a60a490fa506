//! # Trellis
//!
//! A schema-relationship graph and SQL join-path planning core.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Schema description (tables, columns,          │
//! │                 declared relationships)                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [graph builder, once per schema version]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SchemaGraph (immutable, shared, read-only)        │
//! │     path search · join synthesis · relationship queries  │
//! └─────────────────────────────────────────────────────────┘
//!            │                                │
//!            ▼ [per request]                  ▼ [per request]
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │ ColumnReferenceResolver  │   │       PlanBuilder        │
//! │  entities + fuzzy match  │──▶│  columns, joins, CTEs    │
//! └──────────────────────────┘   └──────────────────────────┘
//!                                             │
//!                                             ▼ [checks output]
//!                                ┌──────────────────────────┐
//!                                │     SchemaValidator      │
//!                                └──────────────────────────┘
//! ```
//!
//! The graph is built once per schema version and shared read-only
//! across arbitrarily many concurrent requests; resolution, planning,
//! and validation are pure request-local computations with no I/O.

pub mod cache;
pub mod config;
pub mod entity;
pub mod graph;
pub mod planner;
pub mod resolver;
pub mod sql;
pub mod validator;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::cache::{cache_key, MemoryCache, NoopCache, PlanCache};
    pub use crate::config::{ConfigError, SchemaConfig};
    pub use crate::entity::{
        AggregateFn, Aggregation, EnrichedEntity, EntityType, IntentType, Ordering, QueryIntent,
    };
    pub use crate::graph::{
        ColumnType, Path, RelationshipEdge, RelationshipKind, SchemaGraph, TableRelationships,
    };
    pub use crate::planner::{
        columns_from_entities, sql_with_cache, PlanBuilder, PlanError, SqlColumn, SqlPlan,
    };
    pub use crate::resolver::{normalize_filter_value, ColumnReferenceResolver, ResolverPolicy};
    pub use crate::sql::{
        col, table_col, Expr, ExprExt, OrderByExpr, Query, SelectExpr, SortDir, TableRef,
    };
    pub use crate::validator::{SchemaValidator, ValidationResult};
}

// Also export the main entry points at the crate root
pub use config::SchemaConfig;
pub use graph::SchemaGraph;
pub use planner::{PlanBuilder, SqlPlan};
pub use resolver::ColumnReferenceResolver;
pub use validator::SchemaValidator;
