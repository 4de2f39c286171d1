use crate::error::{DbResult, Operation, OperationContext};
use crate::pool::ConnectionManager;
use crate::results::ResultSet;
use crate::transaction::TransactionScope;
use crate::types::SqlStatement;

use super::predicate::{Binder, render_where};
use super::{QueryIntent, TableQuery, check_identifier};

impl QueryIntent {
    /// `SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n] [OFFSET n]`.
    ///
    /// # Errors
    /// `DbError::Render` for an empty table, column list or column name.
    pub fn render_select(&self) -> DbResult<SqlStatement> {
        let op = Operation::Select;
        self.check_table(op)?;
        check_identifier(op, &self.table, "column list", &self.columns)?;
        self.check_predicates(op)?;

        let mut binder = Binder::new();
        let mut sql = format!("SELECT {} FROM {}", self.columns, self.table);

        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&render_where(&self.predicates, &mut binder));
        }
        if let Some(order) = &self.order {
            check_identifier(op, &self.table, "order column", &order.column)?;
            sql.push_str(&format!(" ORDER BY {} {}", order.column, order.direction));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(SqlStatement::new(sql, binder.into_params()))
    }
}

impl<M: ConnectionManager> TableQuery<'_, M> {
    /// Render the SELECT without running it.
    ///
    /// # Errors
    /// See [`QueryIntent::render_select`].
    pub fn render_select(&self) -> DbResult<SqlStatement> {
        self.intent.render_select()
    }

    /// Run the SELECT in its own transaction.
    ///
    /// # Errors
    /// `DbError::Render` before execution, pool errors, or `DbError::QueryExecution`.
    pub async fn execute(self) -> DbResult<ResultSet> {
        let statement = self.intent.render_select()?;
        let context = OperationContext::new(Operation::Select, self.intent.table());

        let scope = TransactionScope::begin(self.pool, context).await?;
        let outcome = scope.query(&statement.sql, &statement.params).await;
        scope.finish(outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::{OrderBy, Predicate, SortOrder};
    use crate::query_builder::predicate::Comparison;
    use crate::types::RowValues;

    fn intent_with(predicates: Vec<Predicate>) -> QueryIntent {
        let mut intent = QueryIntent::new("t");
        for p in predicates {
            intent.push(p);
        }
        intent
    }

    #[test]
    fn bare_select() {
        let stmt = QueryIntent::new("archon_settings").render_select().unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM archon_settings");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn predicates_bind_in_addition_order() {
        let stmt = intent_with(vec![
            Predicate::Compare {
                column: "a".into(),
                op: Comparison::Eq,
                value: 1.into(),
            },
            Predicate::Compare {
                column: "b".into(),
                op: Comparison::Gt,
                value: 2.into(),
            },
        ])
        .render_select()
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = $1 AND b > $2");
        assert_eq!(stmt.params, vec![RowValues::Int(1), RowValues::Int(2)]);
    }

    #[test]
    fn order_limit_offset_follow_where() {
        let mut intent = intent_with(vec![Predicate::IsNull {
            column: "deleted_at".into(),
        }]);
        intent.columns = "id, key".into();
        intent.order = Some(OrderBy {
            column: "id".into(),
            direction: SortOrder::Desc,
        });
        intent.limit = Some(5);
        intent.offset = Some(10);
        let stmt = intent.render_select().unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT id, key FROM t WHERE deleted_at IS NULL ORDER BY id DESC LIMIT 5 OFFSET 10"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn offset_without_limit() {
        let mut intent = QueryIntent::new("t");
        intent.offset = Some(3);
        assert_eq!(
            intent.render_select().unwrap().sql,
            "SELECT * FROM t OFFSET 3"
        );
    }

    #[test]
    fn empty_identifiers_are_render_errors() {
        assert!(matches!(
            QueryIntent::new(" ").render_select(),
            Err(crate::DbError::Render { .. })
        ));

        let mut intent = QueryIntent::new("t");
        intent.columns = String::new();
        assert!(intent.render_select().is_err());

        let intent = intent_with(vec![Predicate::IsNull { column: "".into() }]);
        let err = intent.render_select().unwrap_err();
        assert!(err.to_string().contains("empty column name"), "{err}");
    }

    #[test]
    fn empty_in_list_still_needs_a_column() {
        let named = intent_with(vec![Predicate::In {
            column: "id".into(),
            values: Vec::new(),
        }]);
        assert_eq!(
            named.render_select().unwrap().sql,
            "SELECT * FROM t WHERE FALSE"
        );

        let unnamed = intent_with(vec![Predicate::In {
            column: String::new(),
            values: Vec::new(),
        }]);
        assert!(matches!(
            unnamed.render_select(),
            Err(crate::DbError::Render { .. })
        ));
    }
}
