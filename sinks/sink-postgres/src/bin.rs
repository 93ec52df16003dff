use std::process::ExitCode;

use clap::{error::ErrorKind, Parser};
use error_stack::Result;
use geo_observability::TelemetryOptions;
use geo_sink_common::{
    initialize_sink, load_dotenv, run_sink_connector, BoxedPersistenceClient, ConnectorOptions,
    ReportExt, SinkError, SinkErrorReportExt, SinkErrorResultExt,
};
use geo_sink_postgres::{
    db::{connect_pool, run_migrations, PostgresPersistence, PostgresStorage},
    ipfs::IpfsFetcher,
    GeoSink, GeoSinkOptions, SinkPostgresOptions,
};
use tokio_util::sync::CancellationToken;

#[cfg(not(windows))]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Token used to authenticate with the telemetry collector.
    #[arg(long, env)]
    telemetry_token: String,
    #[command(flatten)]
    connector: ConnectorOptions,
    #[command(flatten)]
    postgres: SinkPostgresOptions,
}

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                // Missing or invalid configuration.
                _ => ExitCode::from(78),
            };
        }
    };

    run_with_args(args).await.to_exit_code()
}

async fn run_with_args(args: Cli) -> Result<(), SinkError> {
    let ct = CancellationToken::new();
    let telemetry = TelemetryOptions {
        token: Some(args.telemetry_token),
    };
    initialize_sink(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        telemetry,
        ct.clone(),
    )?;

    let configuration = args.postgres.to_postgres_configuration()?;
    let pool = connect_pool(&configuration)
        .await
        .map_err(|err| err.temporary("failed to connect to database"))?;

    {
        let conn = pool
            .get()
            .await
            .temporary("failed to get database connection")?;
        run_migrations(&conn)
            .await
            .map_err(|err| err.fatal("failed to migrate database"))?;
    }

    let persistence: BoxedPersistenceClient = Box::new(PostgresPersistence::new(pool.clone()));
    let options = GeoSinkOptions {
        pool,
        ipfs: configuration.ipfs,
    };

    run_sink_connector::<GeoSink<PostgresStorage, IpfsFetcher>>(
        args.connector,
        options,
        persistence,
        ct,
    )
    .await
}
