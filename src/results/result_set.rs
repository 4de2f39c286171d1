use std::sync::Arc;

use serde::Serialize;

use super::row::{ColumnIndex, DbRow};
use crate::types::RowValues;

/// A result set from a database operation
///
/// Every terminal call (SELECT, INSERT/UPDATE/DELETE with `RETURNING *`, RPC) produces this
/// shape. `count` always equals `rows.len()`. Serializes as `{"data": [...], "count": n}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultSet {
    /// The rows returned by the statement(s)
    #[serde(rename = "data")]
    pub rows: Vec<DbRow>,
    /// The number of rows in `rows`
    pub count: usize,
    #[serde(skip)]
    columns: Option<Arc<ColumnIndex>>,
}

impl ResultSet {
    /// An empty result with no columns.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            rows: Vec::with_capacity(capacity),
            count: 0,
            columns: None,
        }
    }

    /// Set the column names shared by rows added afterwards through [`ResultSet::add_row_values`].
    pub fn set_column_names(&mut self, column_names: Vec<String>) {
        self.columns = Some(ColumnIndex::new(column_names));
    }

    #[must_use]
    pub fn column_names(&self) -> Option<&[String]> {
        self.columns.as_deref().map(|c| c.names.as_slice())
    }

    /// Add a row using the column names set on this result set.
    ///
    /// Rows added before any column names were set get an empty column list.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        let columns = self
            .columns
            .get_or_insert_with(|| ColumnIndex::new(Vec::new()))
            .clone();
        self.rows.push(DbRow::with_index(columns, row_values));
        self.count += 1;
    }

    pub fn add_row(&mut self, row: DbRow) {
        self.rows.push(row);
        self.count += 1;
    }

    /// Move every row of `other` to the end of this result set.
    pub fn append(&mut self, mut other: ResultSet) {
        if self.columns.is_none() {
            self.columns = other.columns.take();
        }
        self.count += other.rows.len();
        self.rows.append(&mut other.rows);
    }

    #[must_use]
    pub fn first(&self) -> Option<&DbRow> {
        self.rows.first()
    }

    #[must_use]
    pub fn into_first(self) -> Option<DbRow> {
        self.rows.into_iter().next()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<DbRow> {
        self.rows
    }

    /// Render as the `{"data": [...], "count": n}` JSON document.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "data": self.rows, "count": self.count })
    }
}

impl PartialEq for ResultSet {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.rows == other.rows
    }
}
