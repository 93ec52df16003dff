//! Shared building blocks for substreams sinks.
//!
//! The connector streams blocks from a substreams endpoint and hands the module output of each
//! block to a [Sink]. It persists the cursor after every block, handles undo signals and
//! restarts the stream on temporary errors.
mod cli;
mod configuration;
mod connector;
mod cursor;
mod error;
pub mod persistence;
mod sink;
mod status;

use error_stack::{Result, ResultExt};
use tokio_util::sync::CancellationToken;

pub use self::cli::*;
pub use self::configuration::*;
pub use self::connector::*;
pub use self::cursor::{Cursor, DisplayCursor};
pub use self::error::*;
pub use self::persistence::{BoxedPersistenceClient, PersistenceClient};
pub use self::sink::*;
pub use self::status::*;

/// Run `S` until the stream ends or `ct` is cancelled.
///
/// The cursor is stored with `persistence`.
pub async fn run_sink_connector<S>(
    connector_options: ConnectorOptions,
    sink_options: S::Options,
    persistence: BoxedPersistenceClient,
    ct: CancellationToken,
) -> Result<(), SinkError>
where
    S: Sink + Send + Sync,
{
    let sink = S::from_options(sink_options)
        .await
        .map_err(|err| err.configuration("invalid sink options"))?;

    let stream = connector_options
        .stream
        .to_stream_configuration()
        .map_err(|err| err.configuration("invalid stream options"))?;

    let status_server = connector_options
        .status_server
        .to_status_server()
        .map_err(|err| err.configuration("invalid status server options"))?;

    let backoff = connector_options.backoff.to_backoff();

    let sink_connector_options = SinkConnectorOptions {
        stream,
        persistence,
        status_server,
        backoff,
    };

    let connector = SinkConnector::new(sink, sink_connector_options);

    connector
        .consume_stream(ct)
        .await
        .attach_printable("error while streaming data")?;

    Ok(())
}
