use bb8::{Pool, PooledConnection};
use bb8_postgres::PostgresConnectionManager;
use error_stack::{Result, ResultExt};
use native_tls::{Certificate, TlsConnector};
use postgres_native_tls::MakeTlsConnector;
use tracing::info;

use crate::{
    configuration::{SinkPostgresConfiguration, TlsConfiguration},
    sink::SinkPostgresError,
};

pub type PgPool = Pool<PostgresConnectionManager<MakeTlsConnector>>;
pub type PgConnection = PooledConnection<'static, PostgresConnectionManager<MakeTlsConnector>>;

/// Create the connection pool.
///
/// Connections without TLS use the same connector with `sslmode=disable`, so that both
/// configurations share the pool type.
pub async fn connect_pool(
    configuration: &SinkPostgresConfiguration,
) -> Result<PgPool, SinkPostgresError> {
    let connector = match &configuration.tls {
        TlsConfiguration::NoTls => {
            info!("using insecure connection");
            TlsConnector::new()
                .change_context(SinkPostgresError)
                .attach_printable("failed to build tls connector")?
        }
        TlsConfiguration::Tls {
            certificate,
            accept_invalid_certificates,
            disable_system_roots,
            accept_invalid_hostnames,
            use_sni,
        } => {
            info!("configure tls connection");
            let mut builder = TlsConnector::builder();

            if let Some(certificate) = certificate {
                let pem = tokio::fs::read(certificate)
                    .await
                    .change_context(SinkPostgresError)
                    .attach_printable_lazy(|| {
                        format!("failed to read tls certificate at {certificate:?}")
                    })?;
                let certificate = Certificate::from_pem(&pem)
                    .change_context(SinkPostgresError)
                    .attach_printable("failed to build certificate from PEM file")?;
                builder.add_root_certificate(certificate);
            }

            if let Some(accept_invalid_certificates) = accept_invalid_certificates {
                builder.danger_accept_invalid_certs(*accept_invalid_certificates);
            }

            if let Some(disable_system_roots) = disable_system_roots {
                builder.disable_built_in_roots(*disable_system_roots);
            }

            if let Some(accept_invalid_hostnames) = accept_invalid_hostnames {
                builder.danger_accept_invalid_hostnames(*accept_invalid_hostnames);
            }

            if let Some(use_sni) = use_sni {
                builder.use_sni(*use_sni);
            }

            builder
                .build()
                .change_context(SinkPostgresError)
                .attach_printable("failed to build tls connector")?
        }
    };

    let manager =
        PostgresConnectionManager::new(configuration.pg.clone(), MakeTlsConnector::new(connector));

    let pool = Pool::builder()
        .max_size(configuration.max_connections)
        .build(manager)
        .await
        .change_context(SinkPostgresError)
        .attach_printable("failed to connect to postgres")?;

    info!(
        max_connections = configuration.max_connections,
        "database pool connected"
    );

    Ok(pool)
}
