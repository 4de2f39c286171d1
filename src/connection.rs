use async_trait::async_trait;

use crate::error::BoxError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// One physical database connection as seen by the pool and the transaction scope.
///
/// Parameters are always handed to the driver's binding mechanism; implementations must
/// never splice them into the SQL text.
#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// Run one or more statements without parameters (used for `BEGIN`/`COMMIT`/`ROLLBACK`).
    async fn batch_execute(&self, sql: &str) -> Result<(), BoxError>;

    /// Run a parameterized statement and collect every row it returns.
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, BoxError>;

    /// Run a parameterized statement and return the number of rows it affected.
    async fn execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, BoxError>;

    /// True once the connection can no longer be used (closed socket, fatal protocol error).
    fn is_broken(&self) -> bool;
}
