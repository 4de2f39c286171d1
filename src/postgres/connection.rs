use async_trait::async_trait;
use deadpool_postgres::{ClientWrapper, Manager, ManagerConfig, RecyclingMethod};
use tokio_postgres::{Client, NoTls};
use tracing::debug;

use crate::config::{ConnectionDescriptor, TlsMode};
use crate::connection::SqlConnection;
use crate::error::{BoxError, DbResult};
use crate::results::ResultSet;
use crate::types::RowValues;

use super::params::param_refs;
use super::query::build_result_set_from_statement;
use super::tls;

/// Build the deadpool-postgres manager for `descriptor`.
///
/// Idle connections are recycled with a liveness check only; a closed client is dropped
/// and replaced.
///
/// # Errors
/// `DbError::Config` if the TLS mode or TLS material cannot be honoured.
pub fn manager(descriptor: &ConnectionDescriptor) -> DbResult<Manager> {
    let pg_config = descriptor.to_pg_config();
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    debug!(database = %descriptor, "building postgres connection manager");
    if descriptor.tls_mode() == TlsMode::Disable {
        return Ok(Manager::from_config(pg_config, NoTls, manager_config));
    }
    tls::manager_with_tls(descriptor, pg_config, manager_config)
}

// Statements go through `prepare_cached`, so repeated builder shapes reuse one server-side
// prepared statement per connection.
#[async_trait]
impl SqlConnection for ClientWrapper {
    async fn batch_execute(&self, sql: &str) -> Result<(), BoxError> {
        let client: &Client = self;
        client.batch_execute(sql).await?;
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, BoxError> {
        let stmt = self.prepare_cached(sql).await?;
        let client: &Client = self;
        let rows = client.query(&stmt, &param_refs(params)).await?;
        Ok(build_result_set_from_statement(&stmt, &rows)?)
    }

    async fn execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, BoxError> {
        let stmt = self.prepare_cached(sql).await?;
        let client: &Client = self;
        Ok(client.execute(&stmt, &param_refs(params)).await?)
    }

    fn is_broken(&self) -> bool {
        let client: &Client = self;
        client.is_closed()
    }
}
