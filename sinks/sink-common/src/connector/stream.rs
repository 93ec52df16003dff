use bytesize::ByteSize;
use error_stack::Result;
use geo_protocol::client::{StreamClient, StreamClientBuilder};

use crate::{error::SinkError, SinkErrorReportExt, StreamConfiguration};

/// Action to take after handling a stream message.
#[derive(Debug, PartialEq)]
pub enum StreamAction {
    /// Continue streaming.
    Continue,
    /// Stop streaming.
    Stop,
}

pub struct StreamClientFactory {
    stream_configuration: StreamConfiguration,
}

impl StreamClientFactory {
    pub fn new(stream_configuration: StreamConfiguration) -> Self {
        Self {
            stream_configuration,
        }
    }

    pub fn configuration(&self) -> &StreamConfiguration {
        &self.stream_configuration
    }

    pub async fn new_stream_client(&self) -> Result<StreamClient, SinkError> {
        let max_message_size = self.stream_configuration.max_message_size_bytes;
        let client = StreamClientBuilder::default()
            .with_max_message_size(as_usize(max_message_size))
            .with_metadata(self.stream_configuration.metadata.clone())
            .with_timeout(self.stream_configuration.timeout_duration)
            .with_bearer_token(self.stream_configuration.bearer_token.clone())
            .connect(self.stream_configuration.stream_url.clone())
            .await
            .map_err(|err| err.temporary("failed to connect to stream"))?;

        Ok(client)
    }
}

fn as_usize(size: ByteSize) -> usize {
    usize::try_from(size.as_u64()).unwrap_or(usize::MAX)
}
