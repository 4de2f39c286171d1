use std::collections::HashSet;

use crate::error::{DbError, DbResult, Operation, OperationContext};
use crate::pool::{ConnectionManager, ConnectionPool};
use crate::query_builder::{Binder, check_identifier};
use crate::results::ResultSet;
use crate::transaction::TransactionScope;
use crate::types::{RowValues, SqlStatement};

/// Call of a server-side function with named arguments.
///
/// Renders `SELECT * FROM name(arg => $1, ...)`. Each placeholder is produced as its value is
/// bound, so the pairing of argument name and value does not depend on how the caller's
/// collection iterates.
#[must_use = "a ProcedureCall does nothing until executed"]
pub struct ProcedureCall<'c, M: ConnectionManager> {
    pool: &'c ConnectionPool<M>,
    name: String,
    args: Vec<(String, RowValues)>,
}

impl<'c, M: ConnectionManager> ProcedureCall<'c, M> {
    pub(crate) fn new(pool: &'c ConnectionPool<M>, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Add a named argument.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    /// Add every `(name, value)` pair of `args`.
    pub fn args<I, K, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        self.args
            .extend(args.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// # Errors
    /// `DbError::Render` for an empty procedure or argument name, or a repeated argument.
    pub fn render(&self) -> DbResult<SqlStatement> {
        render_call(&self.name, &self.args)
    }

    /// Run the call in its own transaction and return the rows it produced.
    ///
    /// # Errors
    /// `DbError::Render` before execution, pool errors, or `DbError::QueryExecution`.
    pub async fn execute(self) -> DbResult<ResultSet> {
        let statement = self.render()?;
        let context = OperationContext::new(Operation::Rpc, &self.name);
        let scope = TransactionScope::begin(self.pool, context).await?;
        let outcome = scope.query(&statement.sql, &statement.params).await;
        scope.finish(outcome).await
    }
}

pub(crate) fn render_call(name: &str, args: &[(String, RowValues)]) -> DbResult<SqlStatement> {
    let op = Operation::Rpc;
    check_identifier(op, name, "procedure name", name)?;

    let mut seen = HashSet::with_capacity(args.len());
    let mut binder = Binder::new();
    let mut rendered = Vec::with_capacity(args.len());
    for (arg, value) in args {
        check_identifier(op, name, "argument name", arg)?;
        if !seen.insert(arg.as_str()) {
            return Err(DbError::render(
                op,
                name,
                format!("argument {arg} given more than once"),
            ));
        }
        rendered.push(format!("{arg} => {}", binder.bind(value.clone())));
    }

    let sql = format!("SELECT * FROM {name}({})", rendered.join(", "));
    Ok(SqlStatement::new(sql, binder.into_params()))
}
