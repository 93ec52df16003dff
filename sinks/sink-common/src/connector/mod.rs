mod default;
mod progress;
mod sink;
mod state;
mod stream;

use std::time::Duration;

use bytesize::ByteSize;
use error_stack::Result;
use exponential_backoff::Backoff;
use tokio_util::sync::CancellationToken;
use tonic::{metadata::MetadataMap, transport::Uri};
use tracing::{info, warn};

use crate::{
    connector::{state::StateManager, stream::StreamClientFactory},
    error::SinkError,
    persistence::BoxedPersistenceClient,
    sink::Sink,
    status::StatusServer,
};

pub use self::{
    default::DefaultConnector,
    sink::{Handled, SinkWithBackoff},
    stream::StreamAction,
};

#[derive(Debug)]
pub struct StreamConfiguration {
    pub stream_url: Uri,
    pub max_message_size_bytes: ByteSize,
    pub metadata: MetadataMap,
    pub bearer_token: Option<String>,
    pub timeout_duration: Duration,
    /// Name of the map module to stream.
    pub output_module: String,
    /// Encoded modules graph, forwarded as is to the server.
    pub modules: Vec<u8>,
    /// Block to start from when no cursor is stored.
    pub starting_block: u64,
    pub starting_block_hash: String,
    pub ending_block: Option<u64>,
}

pub struct SinkConnectorOptions {
    pub stream: StreamConfiguration,
    pub persistence: BoxedPersistenceClient,
    pub status_server: StatusServer,
    pub backoff: Backoff,
}

pub struct SinkConnector<S>
where
    S: Sink + Send + Sync,
{
    sink: S,
    stream_configuration: StreamConfiguration,
    backoff: Backoff,
    persistence: BoxedPersistenceClient,
    status_server: StatusServer,
}

impl<S> SinkConnector<S>
where
    S: Sink + Send + Sync,
{
    pub fn new(sink: S, options: SinkConnectorOptions) -> Self {
        Self {
            sink,
            backoff: options.backoff,
            stream_configuration: options.stream,
            persistence: options.persistence,
            status_server: options.status_server,
        }
    }

    /// Start consuming the stream, restarting it on temporary errors.
    pub async fn consume_stream(self, ct: CancellationToken) -> Result<(), SinkError> {
        let stream_client_factory = StreamClientFactory::new(self.stream_configuration);

        let (state_manager, state_manager_fut) =
            StateManager::start(self.persistence, self.status_server, ct.clone())?;
        let mut state_manager_fut = Box::pin(state_manager_fut);

        let sink = SinkWithBackoff::new(self.sink, self.backoff);

        let mut inner = DefaultConnector::new(sink, stream_client_factory, state_manager);

        loop {
            let inner_fut = inner.start(ct.clone());
            tokio::select! {
                status_ret = &mut state_manager_fut => {
                    info!("status server stopped");
                    status_ret?;
                    break;
                }
                _ = ct.cancelled() => {
                    break;
                }
                ret = inner_fut => {
                    match ret {
                        Ok(_) => {
                            info!("connector stopped.");
                            break;
                        }
                        Err(err) => {
                            match err.downcast_ref::<SinkError>() {
                                Some(SinkError::Temporary) => {
                                    warn!(err = ?err, "connector failed. restarting.");
                                }
                                _ => {
                                    return Err(err);
                                }
                            };
                        }
                    }
                }
            };

            // Wait before restarting.
            tokio::select! {
                _ = ct.cancelled() => {
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(10)) => {
                    // continue
                }
            }
        }

        Ok(())
    }
}

pub fn default_backoff() -> Backoff {
    let retries = 10;
    let min_delay = Duration::from_secs(3);
    let max_delay = Duration::from_secs(60);
    let mut backoff = Backoff::new(retries, min_delay, Some(max_delay));
    backoff.set_factor(3);
    backoff
}
