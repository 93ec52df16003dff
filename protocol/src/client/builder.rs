use std::time::Duration;

use error_stack::{Result, ResultExt};
use tonic::{
    metadata::MetadataMap,
    transport::{Channel, ClientTlsConfig, Uri},
};

use crate::substreams::rpc::v2::stream_client::StreamClient as SubstreamsClient;

use super::{client::StreamClient, MetadataInterceptor, StreamClientError};

/// A builder for the substreams stream client.
pub struct StreamClientBuilder {
    token: Option<String>,
    max_message_size: Option<usize>,
    metadata: MetadataMap,
    timeout: Duration,
}

impl StreamClientBuilder {
    /// Use the given `token` to authenticate with the server.
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Use the given `metadata` when connecting to the server.
    ///
    /// Notice: metadata will be merged with the authentication header if any.
    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the maximum time to wait for a message from the server.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum message size that the client can receive.
    pub fn with_max_message_size(mut self, message_size: usize) -> Self {
        self.max_message_size = Some(message_size);
        self
    }

    /// Create and connect to the stream at the given url.
    ///
    /// Urls with the `https` scheme use TLS with the system root certificates.
    pub async fn connect(self, url: Uri) -> Result<StreamClient, StreamClientError> {
        let use_tls = url.scheme_str() == Some("https");

        let mut endpoint = Channel::builder(url);
        if use_tls {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .change_context(StreamClientError)
                .attach_printable("failed to configure tls")?;
        }

        let channel = endpoint
            .connect()
            .await
            .change_context(StreamClientError)
            .attach_printable("failed to connect to the substreams endpoint")?;

        let mut interceptor = MetadataInterceptor::with_metadata(self.metadata);
        if let Some(token) = self.token {
            interceptor
                .insert_bearer_token(token)
                .change_context(StreamClientError)
                .attach_printable("failed to insert bearer token into metadata")?;
        }

        let mut default_client = SubstreamsClient::with_interceptor(channel, interceptor);
        default_client = if let Some(max_message_size) = self.max_message_size {
            default_client.max_decoding_message_size(max_message_size)
        } else {
            default_client
        };

        Ok(StreamClient::new(default_client, self.timeout))
    }
}

impl Default for StreamClientBuilder {
    fn default() -> Self {
        Self {
            token: None,
            max_message_size: None,
            metadata: MetadataMap::new(),
            timeout: Duration::from_secs(300),
        }
    }
}
