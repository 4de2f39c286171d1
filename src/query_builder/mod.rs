//! Fluent per-table query builder.
//!
//! A [`TableQuery`] accumulates a [`QueryIntent`] through chained calls and is consumed by
//! exactly one terminal call: [`TableQuery::execute`], [`TableQuery::insert`],
//! [`TableQuery::update`] or [`TableQuery::delete`]. Rendering happens before a connection
//! is borrowed, so malformed or unsafe requests never reach the database.

mod dml;
mod predicate;
mod select;

use std::fmt;

use crate::error::{DbError, DbResult, Operation};
use crate::pool::{ConnectionManager, ConnectionPool};
use crate::types::RowValues;

pub use dml::InsertPayload;
pub use predicate::{Comparison, Predicate};
pub(crate) use predicate::Binder;

/// Direction of the single ORDER BY clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortOrder,
}

/// Everything a builder has accumulated for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryIntent {
    table: String,
    columns: String,
    predicates: Vec<Predicate>,
    order: Option<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryIntent {
    /// Intent selecting every column of `table` with no filter.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            predicates: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn columns(&self) -> &str {
        &self.columns
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    #[must_use]
    pub fn order(&self) -> Option<&OrderBy> {
        self.order.as_ref()
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Append a predicate; predicates render (and bind) in the order they were added.
    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub(crate) fn check_table(&self, operation: Operation) -> DbResult<()> {
        check_identifier(operation, &self.table, "table name", &self.table)
    }

    /// Every predicate needs a column name, including an empty `IN` list that renders to
    /// `FALSE` without it.
    pub(crate) fn check_predicates(&self, operation: Operation) -> DbResult<()> {
        for predicate in &self.predicates {
            check_identifier(operation, &self.table, "column name", predicate.column())?;
        }
        Ok(())
    }

    /// UPDATE and DELETE refuse to run without at least one predicate.
    pub(crate) fn require_filter(&self, operation: Operation) -> DbResult<()> {
        if self.predicates.is_empty() {
            return Err(DbError::SafetyViolation {
                operation,
                table: self.table.clone(),
            });
        }
        Ok(())
    }
}

pub(crate) fn check_identifier(
    operation: Operation,
    target: &str,
    kind: &str,
    name: &str,
) -> DbResult<()> {
    if name.trim().is_empty() {
        let target = if target.trim().is_empty() {
            "<unnamed>"
        } else {
            target
        };
        return Err(DbError::render(operation, target, format!("empty {kind}")));
    }
    Ok(())
}

/// Chainable query builder bound to one table of a client's pool.
///
/// ```rust,ignore
/// let rows = client
///     .table("settings")
///     .select("key, value")
///     .eq("category", "rag")
///     .order("key", SortOrder::Asc)
///     .limit(10)
///     .execute()
///     .await?;
/// ```
#[must_use = "a TableQuery does nothing until a terminal call"]
pub struct TableQuery<'c, M: ConnectionManager> {
    pub(crate) pool: &'c ConnectionPool<M>,
    pub(crate) intent: QueryIntent,
}

impl<'c, M: ConnectionManager> TableQuery<'c, M> {
    pub(crate) fn new(pool: &'c ConnectionPool<M>, table: impl Into<String>) -> Self {
        Self {
            pool,
            intent: QueryIntent::new(table),
        }
    }

    /// The accumulated intent.
    pub fn intent(&self) -> &QueryIntent {
        &self.intent
    }

    fn compare(mut self, column: impl Into<String>, op: Comparison, value: RowValues) -> Self {
        self.intent.push(Predicate::Compare {
            column: column.into(),
            op,
            value,
        });
        self
    }

    /// Column expression for SELECT (default `*`).
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.intent.columns = columns.into();
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.compare(column, Comparison::Eq, value.into())
    }

    pub fn neq(self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.compare(column, Comparison::Neq, value.into())
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.compare(column, Comparison::Gt, value.into())
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.compare(column, Comparison::Gte, value.into())
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.compare(column, Comparison::Lt, value.into())
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.compare(column, Comparison::Lte, value.into())
    }

    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.compare(column, Comparison::Like, RowValues::Text(pattern.into()))
    }

    /// Case-insensitive LIKE.
    pub fn ilike(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.compare(column, Comparison::ILike, RowValues::Text(pattern.into()))
    }

    /// `column IN (...)`. An empty list matches no rows (renders `FALSE`).
    ///
    /// The column name is validated even when the list is empty, so `in_("", [])` is a
    /// render error like any other predicate on an empty column.
    pub fn in_<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        self.intent.push(Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn is_null(mut self, column: impl Into<String>) -> Self {
        self.intent.push(Predicate::IsNull {
            column: column.into(),
        });
        self
    }

    pub fn is_not_null(mut self, column: impl Into<String>) -> Self {
        self.intent.push(Predicate::IsNotNull {
            column: column.into(),
        });
        self
    }

    /// Null-safe equality: `IS NULL` for a null value, `IS NOT DISTINCT FROM $n` otherwise.
    pub fn is_value(mut self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.intent.push(Predicate::IsValue {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Set the ORDER BY clause; a later call replaces an earlier one.
    pub fn order(mut self, column: impl Into<String>, direction: SortOrder) -> Self {
        self.intent.order = Some(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.intent.limit = Some(count);
        self
    }

    pub fn offset(mut self, count: u64) -> Self {
        self.intent.offset = Some(count);
        self
    }
}
