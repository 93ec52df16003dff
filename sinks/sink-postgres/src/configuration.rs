use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Args;
use error_stack::Result;
use geo_sink_common::{SinkError, SinkErrorResultExt};
use tokio_postgres::{config::SslMode, Config};

use crate::ipfs::{IpfsFetcherOptions, DEFAULT_IPFS_GATEWAY};

#[derive(Debug, Clone, PartialEq)]
pub enum TlsConfiguration {
    NoTls,
    Tls {
        certificate: Option<PathBuf>,
        accept_invalid_certificates: Option<bool>,
        disable_system_roots: Option<bool>,
        accept_invalid_hostnames: Option<bool>,
        use_sni: Option<bool>,
    },
}

#[derive(Debug)]
pub struct SinkPostgresConfiguration {
    pub pg: Config,
    pub tls: TlsConfiguration,
    pub max_connections: u32,
    pub ipfs: IpfsFetcherOptions,
}

#[derive(Debug, Args, Clone)]
pub struct SinkPostgresOptions {
    /// Connection string to the PostgreSQL server.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
    /// Disable TLS when connecting to the PostgreSQL server.
    #[arg(long, env = "POSTGRES_NO_TLS")]
    pub no_tls: Option<bool>,
    /// Path to the PEM-formatted X509 TLS certificate file.
    #[arg(long, env = "POSTGRES_TLS_CERTIFICATE")]
    pub tls_certificate: Option<String>,
    /// Disable system root certificates.
    #[arg(long, env = "POSTGRES_TLS_DISABLE_SYSTEM_ROOTS")]
    pub tls_disable_system_roots: Option<bool>,
    /// Disable certificate validation.
    #[arg(long, env = "POSTGRES_TLS_ACCEPT_INVALID_CERTIFICATES")]
    pub tls_accept_invalid_certificates: Option<bool>,
    /// Disable hostname validation.
    #[arg(long, env = "POSTGRES_TLS_ACCEPT_INVALID_HOSTNAMES")]
    pub tls_accept_invalid_hostnames: Option<bool>,
    /// Use Server Name Indication (SNI).
    #[arg(long, env = "POSTGRES_TLS_USE_SNI")]
    pub tls_use_sni: Option<bool>,
    /// Maximum number of connections in the database pool.
    #[arg(long, env, default_value_t = 100)]
    pub max_connections: u32,
    /// Gateway used to fetch IPFS content. The content id is appended to it.
    #[arg(long, env, default_value = DEFAULT_IPFS_GATEWAY)]
    pub ipfs_gateway: String,
    /// Number of times a failed IPFS request is retried.
    #[arg(long, env, default_value_t = 5)]
    pub ipfs_max_retries: u32,
    /// Timeout of a single IPFS request, in seconds.
    #[arg(long, env, default_value_t = 60)]
    pub ipfs_timeout_seconds: u64,
}

impl SinkPostgresOptions {
    pub fn to_postgres_configuration(self) -> Result<SinkPostgresConfiguration, SinkError> {
        let mut pg = Config::from_str(&self.database_url)
            .configuration("failed to build postgres config from connection string")?;

        if self.max_connections == 0 {
            return Err(SinkError::configuration(
                "max connections must be greater than zero",
            ));
        }

        let tls = if self.no_tls.unwrap_or(false) {
            pg.ssl_mode(SslMode::Disable);
            TlsConfiguration::NoTls
        } else {
            TlsConfiguration::Tls {
                certificate: self.tls_certificate.map(PathBuf::from),
                accept_invalid_certificates: self.tls_accept_invalid_certificates,
                disable_system_roots: self.tls_disable_system_roots,
                accept_invalid_hostnames: self.tls_accept_invalid_hostnames,
                use_sni: self.tls_use_sni,
            }
        };

        let ipfs = IpfsFetcherOptions {
            gateway: self.ipfs_gateway,
            max_retries: self.ipfs_max_retries,
            timeout: Duration::from_secs(self.ipfs_timeout_seconds),
            ..IpfsFetcherOptions::default()
        };

        Ok(SinkPostgresConfiguration {
            pg,
            tls,
            max_connections: self.max_connections,
            ipfs,
        })
    }
}
