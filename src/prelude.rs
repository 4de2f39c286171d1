//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::client::{Client, DatabaseExecutor};
pub use crate::config::{ConnectionDescriptor, PoolSettings, TlsMode};
pub use crate::error::{DbError, DbResult, Operation};
pub use crate::pool::{ConnectionPool, PoolStatus};
pub use crate::query_builder::{Predicate, QueryIntent, SortOrder};
pub use crate::results::{DbRow, ResultSet};
pub use crate::types::{Record, RowValues, SqlStatement};
