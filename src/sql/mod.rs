//! SQL generation module.
//!
//! A type-safe SQL builder: expressions and queries are assembled as
//! typed ASTs and serialized through a token stream, so clause ordering
//! and escaping are enforced structurally rather than by string pasting.
//!
//! - [`query`] - SELECT query builder with CTE support
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL serialization

pub mod expr;
pub mod query;
pub mod token;

// Re-export commonly used types at the sql module level
pub use expr::{
    avg, col, count, count_star, func, lit_bool, lit_float, lit_int, lit_null, lit_str, max, min,
    raw, star, sum, table_col, BinaryOperator, Expr, ExprExt, Literal,
};
pub use query::{
    Cte, Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, SortDir, TableRef,
};
pub use token::{quote_identifier, Token, TokenStream};
