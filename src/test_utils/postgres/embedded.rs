use postgresql_embedded::PostgreSQL;

use crate::config::{ConnectionDescriptor, TlsMode};

/// Represents a running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    /// Descriptor for the test database, TLS disabled
    pub descriptor: ConnectionDescriptor,
}

impl EmbeddedPostgres {
    /// Stop the server. Errors while stopping are ignored.
    pub async fn stop(self) {
        let _ = self.postgresql.stop().await;
    }
}

/// Set up and start an embedded `PostgreSQL` instance and create `db_name` in it.
///
/// # Errors
/// Returns an error if the bundled server cannot be set up or started, or the database
/// cannot be created.
pub async fn setup_postgres_embedded(
    db_name: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error + Send + Sync>> {
    let mut postgresql = PostgreSQL::default();
    postgresql.setup().await?;
    postgresql.start().await?;
    postgresql.create_database(db_name).await?;

    let settings = postgresql.settings();
    let descriptor = ConnectionDescriptor::new(
        settings.host.clone(),
        db_name,
        settings.username.clone(),
        settings.password.clone(),
    )?
    .with_port(settings.port)?
    .with_tls_mode(TlsMode::Disable);

    tracing::info!(database = %descriptor, "embedded postgres started");
    Ok(EmbeddedPostgres {
        postgresql,
        descriptor,
    })
}
