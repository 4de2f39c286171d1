use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{ConnectionDescriptor, PoolSettings};
use crate::error::{DbResult, OperationContext};
use crate::pool::{ConnectionManager, ConnectionPool, PoolStatus};
use crate::postgres::{self, PgManager};
use crate::procedure::ProcedureCall;
use crate::query_builder::TableQuery;
use crate::results::DbRow;
use crate::transaction::TransactionScope;
use crate::types::RowValues;

/// The capability set every backend offers: table builders, procedure calls, raw SQL and
/// shutdown.
///
/// Values are always bound through the driver; implementations never format them into the
/// SQL text. The trait is object safe once the manager is named, e.g.
/// `Arc<dyn DatabaseExecutor<Manager = PgManager>>`.
#[async_trait]
pub trait DatabaseExecutor: Send + Sync {
    /// Connection manager behind the builders this executor hands out.
    type Manager: ConnectionManager;

    /// Start a query against `name`.
    fn table(&self, name: &str) -> TableQuery<'_, Self::Manager>;

    /// Prepare a call of the server-side function `name` with named arguments.
    fn rpc(&self, name: &str, params: Vec<(String, RowValues)>) -> ProcedureCall<'_, Self::Manager>;

    /// Run `sql` and return every row.
    async fn execute_all(&self, sql: &str, params: &[RowValues]) -> DbResult<Vec<DbRow>>;

    /// Run `sql` and return the first row, if any.
    async fn execute_one(&self, sql: &str, params: &[RowValues]) -> DbResult<Option<DbRow>>;

    /// Run a statement without `RETURNING` and return the affected row count.
    async fn execute_mutate(&self, sql: &str, params: &[RowValues]) -> DbResult<u64>;

    /// Stop accepting work and close connections as they come back.
    fn close(&self);
}

/// Entry point for callers: owns the connection pool and hands out builders.
///
/// Cloning is cheap and every clone shares the same pool.
///
/// ```rust,no_run
/// # use table_middleware::prelude::*;
/// # async fn demo() -> Result<(), DbError> {
/// let client = Client::from_env().await?;
/// let rows = client.table("archon_settings").eq("key", "OPENAI_API_KEY").execute().await?;
/// let hits = client
///     .rpc("match_documents", [("match_count", RowValues::Int(5))])
///     .execute()
///     .await?;
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct Client<M: ConnectionManager = PgManager> {
    pool: ConnectionPool<M>,
}

impl<M: ConnectionManager> Clone for Client<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<M: ConnectionManager> std::fmt::Debug for Client<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("pool", &self.pool).finish()
    }
}

impl Client<PgManager> {
    /// Connect to PostgreSQL and establish the pool's minimum connections.
    ///
    /// # Errors
    /// `DbError::Config` for unusable settings or TLS material, `DbError::PoolInitialization`
    /// when the first connections cannot be opened.
    pub async fn connect(
        descriptor: &ConnectionDescriptor,
        settings: PoolSettings,
    ) -> DbResult<Self> {
        info!(database = %descriptor, "connecting");
        let manager = postgres::manager(descriptor)?;
        Self::with_manager(manager, settings).await
    }

    /// Connect using `POSTGRES_URL` (or the individual `POSTGRES_*` variables) and the
    /// `POSTGRES_POOL_*` settings.
    ///
    /// # Errors
    /// See [`ConnectionDescriptor::from_env`], [`PoolSettings::from_env`] and
    /// [`Client::connect`].
    pub async fn from_env() -> DbResult<Self> {
        let descriptor = ConnectionDescriptor::from_env()?;
        let settings = PoolSettings::from_env()?;
        Self::connect(&descriptor, settings).await
    }
}

impl<M: ConnectionManager> Client<M> {
    /// Build a client over any connection manager.
    ///
    /// # Errors
    /// See [`ConnectionPool::new`].
    pub async fn with_manager(manager: M, settings: PoolSettings) -> DbResult<Self> {
        Ok(Self::from_pool(ConnectionPool::new(manager, settings).await?))
    }

    #[must_use]
    pub fn from_pool(pool: ConnectionPool<M>) -> Self {
        Self { pool }
    }

    /// Start a query against `name`.
    pub fn table(&self, name: impl Into<String>) -> TableQuery<'_, M> {
        TableQuery::new(&self.pool, name)
    }

    /// Prepare a call of the server-side function `name` with named arguments.
    pub fn rpc<I, K, V>(&self, name: impl Into<String>, params: I) -> ProcedureCall<'_, M>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        ProcedureCall::new(&self.pool, name).args(params)
    }

    /// Run `sql` in its own transaction and return every row.
    ///
    /// # Errors
    /// Pool errors or `DbError::QueryExecution`.
    pub async fn execute_all(&self, sql: &str, params: &[RowValues]) -> DbResult<Vec<DbRow>> {
        let scope = TransactionScope::begin(&self.pool, OperationContext::raw()).await?;
        let outcome = scope.query(sql, params).await;
        Ok(scope.finish(outcome).await?.into_rows())
    }

    /// Run `sql` in its own transaction and return the first row, if any.
    ///
    /// # Errors
    /// Pool errors or `DbError::QueryExecution`.
    pub async fn execute_one(&self, sql: &str, params: &[RowValues]) -> DbResult<Option<DbRow>> {
        let scope = TransactionScope::begin(&self.pool, OperationContext::raw()).await?;
        let outcome = scope.query(sql, params).await;
        Ok(scope.finish(outcome).await?.into_first())
    }

    /// Run a statement in its own transaction and return the affected row count.
    ///
    /// # Errors
    /// Pool errors or `DbError::QueryExecution`.
    pub async fn execute_mutate(&self, sql: &str, params: &[RowValues]) -> DbResult<u64> {
        let scope = TransactionScope::begin(&self.pool, OperationContext::raw()).await?;
        let outcome = scope.execute(sql, params).await;
        let affected = scope.finish(outcome).await?;
        debug!(affected, "raw mutation complete");
        Ok(affected)
    }

    /// Close the pool. Safe to call more than once.
    pub fn close(&self) {
        self.pool.close_all();
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    #[must_use]
    pub fn pool(&self) -> &ConnectionPool<M> {
        &self.pool
    }
}

#[async_trait]
impl<M: ConnectionManager> DatabaseExecutor for Client<M> {
    type Manager = M;

    fn table(&self, name: &str) -> TableQuery<'_, M> {
        Client::table(self, name)
    }

    fn rpc(&self, name: &str, params: Vec<(String, RowValues)>) -> ProcedureCall<'_, M> {
        Client::rpc(self, name, params)
    }

    async fn execute_all(&self, sql: &str, params: &[RowValues]) -> DbResult<Vec<DbRow>> {
        Client::execute_all(self, sql, params).await
    }

    async fn execute_one(&self, sql: &str, params: &[RowValues]) -> DbResult<Option<DbRow>> {
        Client::execute_one(self, sql, params).await
    }

    async fn execute_mutate(&self, sql: &str, params: &[RowValues]) -> DbResult<u64> {
        Client::execute_mutate(self, sql, params).await
    }

    fn close(&self) {
        Client::close(self);
    }
}
