use deadpool_postgres::{Manager, ManagerConfig};

use crate::config::ConnectionDescriptor;
use crate::error::{DbError, DbResult};

#[cfg(not(feature = "tls-native"))]
pub(super) fn manager_with_tls(
    descriptor: &ConnectionDescriptor,
    pg_config: tokio_postgres::Config,
    manager_config: ManagerConfig,
) -> DbResult<Manager> {
    if descriptor.tls_mode().requires_tls() {
        return Err(DbError::Config(format!(
            "sslmode={} needs the tls-native feature",
            descriptor.tls_mode()
        )));
    }
    // prefer without a TLS backend falls back to plaintext
    Ok(Manager::from_config(
        pg_config,
        tokio_postgres::NoTls,
        manager_config,
    ))
}

#[cfg(feature = "tls-native")]
pub(super) fn manager_with_tls(
    descriptor: &ConnectionDescriptor,
    pg_config: tokio_postgres::Config,
    manager_config: ManagerConfig,
) -> DbResult<Manager> {
    let connector = postgres_native_tls::MakeTlsConnector::new(connector(descriptor)?);
    Ok(Manager::from_config(pg_config, connector, manager_config))
}

#[cfg(feature = "tls-native")]
fn read_pem(kind: &str, path: &std::path::Path) -> DbResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| DbError::Config(format!("cannot read {kind} {}: {e}", path.display())))
}

/// libpq semantics: `prefer` and `require` skip verification unless a root certificate is
/// given, `verify-ca` checks the chain only, `verify-full` also checks the host name.
#[cfg(feature = "tls-native")]
fn connector(descriptor: &ConnectionDescriptor) -> DbResult<native_tls::TlsConnector> {
    use crate::config::TlsMode;
    use native_tls::{Certificate, Identity, TlsConnector};

    let mut builder = TlsConnector::builder();

    let root = descriptor.tls_root_cert();
    if let Some(path) = root {
        let pem = read_pem("root certificate", path)?;
        let cert = Certificate::from_pem(&pem)
            .map_err(|e| DbError::Config(format!("invalid root certificate: {e}")))?;
        builder.add_root_certificate(cert);
    }

    match (descriptor.tls_cert(), descriptor.tls_key()) {
        (Some(cert), Some(key)) => {
            let cert = read_pem("client certificate", cert)?;
            let key = read_pem("client key", key)?;
            let identity = Identity::from_pkcs8(&cert, &key)
                .map_err(|e| DbError::Config(format!("invalid client certificate: {e}")))?;
            builder.identity(identity);
        }
        (None, None) => {}
        _ => {
            return Err(DbError::Config(
                "sslcert and sslkey must be given together".to_string(),
            ));
        }
    }

    match descriptor.tls_mode() {
        TlsMode::Prefer | TlsMode::Require if root.is_none() => {
            builder.danger_accept_invalid_certs(true);
        }
        TlsMode::Prefer | TlsMode::Require | TlsMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        TlsMode::VerifyFull | TlsMode::Disable => {}
    }

    builder
        .build()
        .map_err(|e| DbError::Config(format!("TLS connector: {e}")))
}
