use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::types::RowValues;

/// Column metadata shared by every row of one result set.
#[derive(Debug)]
pub(crate) struct ColumnIndex {
    pub(crate) names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub(crate) fn new(names: Vec<String>) -> Arc<Self> {
        let mut positions = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // first occurrence wins for duplicated column names
            positions.entry(name.clone()).or_insert(i);
        }
        Arc::new(Self { names, positions })
    }
}

/// A row from a database query result
///
/// Values are addressed by column name or position; column names are shared across all rows
/// of the result set they came from.
#[derive(Debug, Clone)]
pub struct DbRow {
    columns: Arc<ColumnIndex>,
    values: Vec<RowValues>,
}

impl DbRow {
    /// Create a standalone row from column names and values.
    #[must_use]
    pub fn new(column_names: Vec<String>, values: Vec<RowValues>) -> Self {
        Self {
            columns: ColumnIndex::new(column_names),
            values,
        }
    }

    pub(crate) fn with_index(columns: Arc<ColumnIndex>, values: Vec<RowValues>) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns.names
    }

    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.positions.get(column_name).copied()
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    /// Column/value pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.columns
            .names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PartialEq for DbRow {
    fn eq(&self, other: &Self) -> bool {
        self.columns.names == other.columns.names && self.values == other.values
    }
}

impl Serialize for DbRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
