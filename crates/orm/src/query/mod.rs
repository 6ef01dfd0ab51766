//! Query Builder Module - fluent, allow-list validated statement builder

pub mod builder;
pub mod dml;
pub mod execution;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::{delete, insert_into, select, update, QueryBuilder};
pub use types::{JoinClause, JoinType, OrderDirection, Predicate, QueryKind, QueryOperator};
