use tracing::{debug, error, warn};

use crate::connection::SqlConnection;
use crate::error::{DbError, DbResult, OperationContext, redacted_cause};
use crate::pool::{ConnectionManager, ConnectionPool, PooledConnection};
use crate::results::ResultSet;
use crate::types::RowValues;

/// One borrowed connection inside `BEGIN` … `COMMIT`/`ROLLBACK`.
///
/// ```rust,ignore
/// let scope = TransactionScope::begin(&pool, ctx).await?;
/// let outcome = scope.query(sql, &params).await;
/// let rows = scope.finish(outcome).await?;
/// ```
///
/// [`TransactionScope::finish`] commits an `Ok` outcome and rolls back an `Err` one, then
/// hands the connection back to the pool. A scope dropped without `finish` discards its
/// connection rather than returning it mid-transaction.
pub struct TransactionScope<'p, M: ConnectionManager> {
    pool: &'p ConnectionPool<M>,
    conn: Option<PooledConnection<M>>,
    context: OperationContext,
}

impl<'p, M: ConnectionManager> TransactionScope<'p, M> {
    /// Acquire a connection and issue `BEGIN`.
    ///
    /// # Errors
    /// Pool errors from [`ConnectionPool::acquire`], or `DbError::QueryExecution` if `BEGIN`
    /// fails (the connection is discarded in that case).
    pub async fn begin(pool: &'p ConnectionPool<M>, context: OperationContext) -> DbResult<Self> {
        let conn = pool.acquire().await?;
        if let Err(e) = conn.batch_execute("BEGIN").await {
            pool.discard(conn);
            return Err(context.failure(e));
        }
        debug!(context = %context, "transaction started");
        Ok(Self {
            pool,
            conn: Some(conn),
            context,
        })
    }

    #[must_use]
    pub fn context(&self) -> &OperationContext {
        &self.context
    }

    fn conn(&self) -> DbResult<&PooledConnection<M>> {
        self.conn.as_ref().ok_or_else(|| {
            DbError::Connection(format!("{}: transaction already finished", self.context))
        })
    }

    /// Run a statement inside the transaction and collect its rows.
    ///
    /// # Errors
    /// `DbError::QueryExecution` wrapping the driver error.
    pub async fn query(&self, sql: &str, params: &[RowValues]) -> DbResult<ResultSet> {
        debug!(context = %self.context, sql, params = params.len(), "query");
        self.conn()?
            .query(sql, params)
            .await
            .map_err(|e| self.context.failure(e))
    }

    /// Run a statement inside the transaction and return the affected row count.
    ///
    /// # Errors
    /// `DbError::QueryExecution` wrapping the driver error.
    pub async fn execute(&self, sql: &str, params: &[RowValues]) -> DbResult<u64> {
        debug!(context = %self.context, sql, params = params.len(), "execute");
        self.conn()?
            .execute(sql, params)
            .await
            .map_err(|e| self.context.failure(e))
    }

    /// Commit on `Ok`, roll back on `Err`, and return the connection to the pool.
    ///
    /// # Errors
    /// The original error for an `Err` outcome; `DbError::QueryExecution` if `COMMIT` fails.
    pub async fn finish<T>(mut self, outcome: DbResult<T>) -> DbResult<T> {
        let Some(conn) = self.conn.take() else {
            return outcome;
        };
        match outcome {
            Ok(value) => match conn.batch_execute("COMMIT").await {
                Ok(()) => {
                    self.pool.release(conn);
                    debug!(context = %self.context, "transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    error!(
                        context = %self.context,
                        cause = %redacted_cause(e.as_ref()),
                        "commit failed"
                    );
                    self.rollback_and_release(conn).await;
                    Err(self.context.failure(e))
                }
            },
            Err(err) => {
                error!(context = %self.context, error = %err, "operation failed, rolling back");
                self.rollback_and_release(conn).await;
                Err(err)
            }
        }
    }

    async fn rollback_and_release(&self, conn: PooledConnection<M>) {
        if conn.is_broken() {
            self.pool.discard(conn);
            return;
        }
        match conn.batch_execute("ROLLBACK").await {
            Ok(()) => self.pool.release(conn),
            Err(e) => {
                warn!(
                    context = %self.context,
                    cause = %redacted_cause(e.as_ref()),
                    "rollback failed, discarding connection"
                );
                self.pool.discard(conn);
            }
        }
    }
}

impl<M: ConnectionManager> Drop for TransactionScope<'_, M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(context = %self.context, "transaction scope dropped while open");
            self.pool.discard(conn);
        }
    }
}
