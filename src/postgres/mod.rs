//! PostgreSQL backend: deadpool-postgres manager, parameter binding and row extraction.

mod connection;
pub mod params;
pub mod query;
mod tls;

pub use connection::manager;
pub use deadpool_postgres::Manager as PgManager;

/// Pool of PostgreSQL connections.
pub type PgPool = crate::pool::ConnectionPool<PgManager>;
