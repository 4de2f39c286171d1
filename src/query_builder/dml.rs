use tracing::debug;

use crate::error::{DbError, DbResult, Operation, OperationContext};
use crate::pool::ConnectionManager;
use crate::results::ResultSet;
use crate::transaction::TransactionScope;
use crate::types::{Record, SqlStatement};

use super::predicate::{Binder, render_where};
use super::{QueryIntent, TableQuery, check_identifier};

/// Rows handed to [`TableQuery::insert`]: a single record or an ordered batch.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertPayload {
    One(Record),
    Many(Vec<Record>),
}

impl InsertPayload {
    fn into_records(self) -> Vec<Record> {
        match self {
            InsertPayload::One(record) => vec![record],
            InsertPayload::Many(records) => records,
        }
    }
}

impl From<Record> for InsertPayload {
    fn from(record: Record) -> Self {
        InsertPayload::One(record)
    }
}

impl From<Vec<Record>> for InsertPayload {
    fn from(records: Vec<Record>) -> Self {
        InsertPayload::Many(records)
    }
}

impl<const N: usize> From<[Record; N]> for InsertPayload {
    fn from(records: [Record; N]) -> Self {
        InsertPayload::Many(records.into())
    }
}

impl QueryIntent {
    /// One `INSERT ... RETURNING *` per record.
    ///
    /// The column list comes from the first record; every other record must carry exactly
    /// the same columns. Values are bound in the first record's column order.
    ///
    /// # Errors
    /// `DbError::Render` for an empty table or column name, or a record whose column set
    /// differs from the first record's.
    pub fn render_inserts(&self, records: &[Record]) -> DbResult<Vec<SqlStatement>> {
        let op = Operation::Insert;
        self.check_table(op)?;
        let Some(first) = records.first() else {
            return Ok(Vec::new());
        };

        let columns: Vec<&str> = first.columns().collect();
        for column in &columns {
            check_identifier(op, &self.table, "column name", column)?;
        }

        if columns.is_empty() {
            if let Some(index) = records.iter().position(|r| !r.is_empty()) {
                return Err(DbError::render(
                    op,
                    &self.table,
                    format!("record {index} has columns but record 0 has none"),
                ));
            }
            let sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING *", self.table);
            return Ok(records
                .iter()
                .map(|_| SqlStatement::new(sql.clone(), Vec::new()))
                .collect());
        }

        let column_list = columns.join(", ");
        let mut statements = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if record.len() != columns.len() {
                return Err(DbError::render(
                    op,
                    &self.table,
                    format!(
                        "record {index} has {} columns, expected {}",
                        record.len(),
                        columns.len()
                    ),
                ));
            }
            let mut binder = Binder::new();
            let mut placeholders = Vec::with_capacity(columns.len());
            for column in &columns {
                let Some(value) = record.get(column) else {
                    return Err(DbError::render(
                        op,
                        &self.table,
                        format!("record {index} is missing column {column}"),
                    ));
                };
                placeholders.push(binder.bind(value.clone()));
            }
            let sql = format!(
                "INSERT INTO {} ({column_list}) VALUES ({}) RETURNING *",
                self.table,
                placeholders.join(", ")
            );
            statements.push(SqlStatement::new(sql, binder.into_params()));
        }
        Ok(statements)
    }

    /// `UPDATE <table> SET ... WHERE ... RETURNING *`; patch values bind before predicate
    /// values.
    ///
    /// # Errors
    /// `DbError::SafetyViolation` without predicates, `DbError::Render` for an empty patch
    /// or identifier.
    pub fn render_update(&self, patch: &Record) -> DbResult<SqlStatement> {
        let op = Operation::Update;
        self.require_filter(op)?;
        self.check_table(op)?;
        self.check_predicates(op)?;
        if patch.is_empty() {
            return Err(DbError::render(op, &self.table, "empty patch"));
        }

        let mut binder = Binder::new();
        let mut assignments = Vec::with_capacity(patch.len());
        for (column, value) in patch.iter() {
            check_identifier(op, &self.table, "column name", column)?;
            assignments.push(format!("{column} = {}", binder.bind(value.clone())));
        }
        let filter = render_where(&self.predicates, &mut binder);
        let sql = format!(
            "UPDATE {} SET {} WHERE {filter} RETURNING *",
            self.table,
            assignments.join(", ")
        );
        Ok(SqlStatement::new(sql, binder.into_params()))
    }

    /// `DELETE FROM <table> WHERE ... RETURNING *`.
    ///
    /// # Errors
    /// `DbError::SafetyViolation` without predicates, `DbError::Render` for an empty
    /// identifier.
    pub fn render_delete(&self) -> DbResult<SqlStatement> {
        let op = Operation::Delete;
        self.require_filter(op)?;
        self.check_table(op)?;
        self.check_predicates(op)?;

        let mut binder = Binder::new();
        let filter = render_where(&self.predicates, &mut binder);
        let sql = format!("DELETE FROM {} WHERE {filter} RETURNING *", self.table);
        Ok(SqlStatement::new(sql, binder.into_params()))
    }
}

impl<M: ConnectionManager> TableQuery<'_, M> {
    /// Insert one record or a batch. Each record runs as its own statement inside a single
    /// transaction; the returned rows follow input order.
    ///
    /// An empty batch returns an empty result without borrowing a connection.
    ///
    /// # Errors
    /// `DbError::Render` before execution, pool errors, or `DbError::QueryExecution`.
    pub async fn insert(self, payload: impl Into<InsertPayload>) -> DbResult<ResultSet> {
        let records = payload.into().into_records();
        let statements = self.intent.render_inserts(&records)?;
        if statements.is_empty() {
            return Ok(ResultSet::empty());
        }

        let context = OperationContext::new(Operation::Insert, self.intent.table());
        let scope = TransactionScope::begin(self.pool, context).await?;
        let outcome = async {
            let mut inserted = ResultSet::with_capacity(statements.len());
            for statement in &statements {
                inserted.append(scope.query(&statement.sql, &statement.params).await?);
            }
            Ok::<_, DbError>(inserted)
        }
        .await;
        let inserted = scope.finish(outcome).await?;
        debug!(table = self.intent.table(), rows = inserted.count, "insert complete");
        Ok(inserted)
    }

    /// Update the filtered rows and return them.
    ///
    /// # Errors
    /// `DbError::SafetyViolation` without predicates (no connection is borrowed),
    /// `DbError::Render`, pool errors, or `DbError::QueryExecution`.
    pub async fn update(self, patch: Record) -> DbResult<ResultSet> {
        let statement = self.intent.render_update(&patch)?;
        self.run(Operation::Update, statement).await
    }

    /// Delete the filtered rows and return them.
    ///
    /// # Errors
    /// `DbError::SafetyViolation` without predicates (no connection is borrowed),
    /// `DbError::Render`, pool errors, or `DbError::QueryExecution`.
    pub async fn delete(self) -> DbResult<ResultSet> {
        let statement = self.intent.render_delete()?;
        self.run(Operation::Delete, statement).await
    }

    async fn run(self, operation: Operation, statement: SqlStatement) -> DbResult<ResultSet> {
        let context = OperationContext::new(operation, self.intent.table());
        let scope = TransactionScope::begin(self.pool, context).await?;
        let outcome = scope.query(&statement.sql, &statement.params).await;
        scope.finish(outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::Predicate;
    use crate::query_builder::predicate::Comparison;
    use crate::types::RowValues;

    fn filtered(table: &str) -> QueryIntent {
        let mut intent = QueryIntent::new(table);
        intent.push(Predicate::Compare {
            column: "id".into(),
            op: Comparison::Eq,
            value: 7.into(),
        });
        intent
    }

    #[test]
    fn inserts_bind_in_first_record_order() {
        let records = vec![
            Record::new().with("a", 1).with("b", 2),
            Record::new().with("b", 4).with("a", 3),
        ];
        let stmts = QueryIntent::new("t").render_inserts(&records).unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[0].sql,
            "INSERT INTO t (a, b) VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(stmts[1].sql, stmts[0].sql);
        assert_eq!(stmts[1].params, vec![RowValues::Int(3), RowValues::Int(4)]);
    }

    #[test]
    fn mismatched_records_are_render_errors() {
        let intent = QueryIntent::new("t");

        let extra = vec![
            Record::new().with("a", 1),
            Record::new().with("a", 2).with("b", 3),
        ];
        assert!(matches!(
            intent.render_inserts(&extra),
            Err(DbError::Render { .. })
        ));

        let renamed = vec![Record::new().with("a", 1), Record::new().with("z", 2)];
        let err = intent.render_inserts(&renamed).unwrap_err();
        assert!(err.to_string().contains("missing column a"), "{err}");
    }

    #[test]
    fn empty_record_uses_default_values() {
        let stmts = QueryIntent::new("events")
            .render_inserts(&[Record::new()])
            .unwrap();
        assert_eq!(stmts[0].sql, "INSERT INTO events DEFAULT VALUES RETURNING *");
        assert!(stmts[0].params.is_empty());
    }

    #[test]
    fn no_records_render_no_statements() {
        assert!(QueryIntent::new("t").render_inserts(&[]).unwrap().is_empty());
    }

    #[test]
    fn update_binds_patch_before_filter() {
        let patch = Record::new().with("value", "v2").with("note", None::<String>);
        let stmt = filtered("settings").render_update(&patch).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE settings SET value = $1, note = $2 WHERE id = $3 RETURNING *"
        );
        assert_eq!(
            stmt.params,
            vec![
                RowValues::Text("v2".into()),
                RowValues::Null,
                RowValues::Int(7)
            ]
        );
    }

    #[test]
    fn unfiltered_update_and_delete_are_refused() {
        let intent = QueryIntent::new("settings");
        let err = intent
            .render_update(&Record::new().with("value", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::SafetyViolation {
                operation: Operation::Update,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "UPDATE without a filter is refused (table: settings)"
        );

        assert!(matches!(
            intent.render_delete(),
            Err(DbError::SafetyViolation {
                operation: Operation::Delete,
                ..
            })
        ));
    }

    #[test]
    fn empty_patch_is_render_error() {
        assert!(matches!(
            filtered("t").render_update(&Record::new()),
            Err(DbError::Render { .. })
        ));
    }

    #[test]
    fn delete_renders_returning() {
        let stmt = filtered("settings").render_delete().unwrap();
        assert_eq!(stmt.sql, "DELETE FROM settings WHERE id = $1 RETURNING *");
        assert_eq!(stmt.params, vec![RowValues::Int(7)]);
    }
}
